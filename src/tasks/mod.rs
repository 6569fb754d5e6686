//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - TTL Cleanup: Sweeps expired records at configured intervals
//! - Snapshot: Writes the cache to disk when it changed

mod cleanup;
mod persist;

pub use cleanup::spawn_cleanup_task;
pub use persist::spawn_persist_task;
