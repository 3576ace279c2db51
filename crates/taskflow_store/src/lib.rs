//! Authoritative store access for taskflow.
//!
//! Defines the [`TaskStore`] seam, an in-memory implementation, JSON snapshot
//! files and the TTL cache that sits in front of a store.

pub mod cache;
pub mod config;
pub mod error;
pub mod file;
pub mod identity;
pub mod memory;
pub mod store;

pub use cache::{CacheEntry, CacheMetrics, Clock, ManualClock, SnapshotCache, SystemClock, TtlCache};
pub use config::CacheConfig;
pub use error::{Result, StoreError};
pub use file::{read_snapshot, write_snapshot};
pub use identity::{Identity, Permission, Scope};
pub use memory::{LoggedChange, MemoryStore};
pub use store::{Ack, ChangeNotice, ClientId, TaskStore};
