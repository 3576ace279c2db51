use serde::{Deserialize, Serialize};

use crate::task::{Action, DependencyEdge, Task};

/// Flat record set as exchanged with the authoritative store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEdge>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.actions.is_empty() && self.dependencies.is_empty()
    }
}
