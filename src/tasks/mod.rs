//! Background Tasks Module
//!
//! Contains the reaper, which culls cache entries in the background.
//!
//! # Tasks
//! - Reaper: culls victim chunks on demand and sweeps expired or
//!   over-threshold entries at a configured interval

mod reaper;

pub use reaper::{
    Reaper, ReaperCallbacks, ReaperOptions, ReaperPolicy, DEFAULT_REAPER_INTERVAL,
};
