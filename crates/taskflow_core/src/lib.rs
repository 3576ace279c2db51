//! Task hierarchy and progress engine.
//!
//! Pure data and algorithms: order keys, the task tree, weighted progress,
//! local validation and the [`TaskGraph`] view that plans commands into
//! changes. Nothing here performs I/O.

pub mod change;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod ids;
pub mod order_key;
pub mod progress;
pub mod snapshot;
pub mod stats;
pub mod task;
pub mod validate;

pub use change::{Change, Command, DeleteMode, EntityKey, Resource};
pub use error::{Result, TaskError};
pub use graph::TaskGraph;
pub use hierarchy::{Placement, TaskTree, TreeNode};
pub use ids::{ActionId, TaskId};
pub use order_key::OrderKey;
pub use progress::{Derived, ProgressTracker, Trigger};
pub use snapshot::Snapshot;
pub use stats::TaskStats;
pub use task::{
    Action, DateRange, DependencyEdge, DependencyKind, NewTask, Priority, Task, TaskStatus,
};
pub use validate::DependencyGraph;
