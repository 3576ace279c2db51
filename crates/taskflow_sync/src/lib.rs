//! Synchronization controller for the taskflow engine.
//!
//! [`SyncController`] applies commands to a local view immediately, sends the
//! resulting changes to a [`taskflow_store::TaskStore`] one entity at a time and
//! falls back to a full re-fetch when the store refuses a change or another
//! client writes.

pub mod config;
mod controller;
mod dispatch;
pub mod entity;
pub mod error;
pub mod events;
mod reconcile;

pub use config::SyncConfig;
pub use controller::SyncController;
pub use entity::EntityState;
pub use error::{Result, SyncError};
pub use events::{EventRx, EventTx, SAVE_FAILED_MESSAGE, SyncEvent, event_bus};
