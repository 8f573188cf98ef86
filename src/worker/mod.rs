//! Worker Module
//!
//! Runs a cachemap behind a request/response boundary: an in-process tokio
//! task driven by [`WorkerCachemap`], or the HTTP `POST /rpc` endpoint.
//! Both execute messages through [`dispatch`].

mod message;
mod proxy;

pub use message::{Message, Reply};
pub use proxy::{dispatch, WorkerCachemap};
