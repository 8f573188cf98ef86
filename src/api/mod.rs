//! API Module
//!
//! HTTP handlers and routing for the cachemap server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value with optional cache headers
//! - `GET /get/:key` - Retrieve a value by key
//! - `GET /has/:key` - Freshness of a stored entry
//! - `DELETE /del/:key` - Delete a key
//! - `DELETE /clear` - Remove every entry
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint
//! - `POST /rpc` - Worker protocol endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
