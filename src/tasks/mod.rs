//! Background Tasks Module
//!
//! Contains background tasks that run alongside a store.
//!
//! # Tasks
//! - Expiry reaper: removes expired entries at a fixed interval

mod reaper;

pub use reaper::spawn_reaper_task;
