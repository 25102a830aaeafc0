//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a store is alive.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries at configured intervals

mod sweep;

pub use sweep::{spawn_sweep_task, ExpirySweep};
