//! Commands issued by callers and the fully-resolved changes they plan into.
//!
//! A [`Command`] states intent ("toggle this action"). Planning it against the
//! current view yields a [`Change`] that carries concrete results (ids, keys,
//! placements), so the local view and the authoritative store apply identical
//! edits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hierarchy::Placement;
use crate::ids::{ActionId, TaskId};
use crate::task::{Action, DateRange, DependencyEdge, NewTask, Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Remove the whole subtree.
    #[default]
    Cascade,
    /// Remove only the task; children move up one level.
    Detach,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CreateTask {
        task: NewTask,
    },
    CreateSubtask {
        parent_id: TaskId,
        task: NewTask,
    },
    /// New subtask plus one action per title, sharing the weight equally.
    CreateSubtaskWithActions {
        parent_id: TaskId,
        task: NewTask,
        actions: Vec<String>,
    },
    ToggleAction {
        action_id: ActionId,
    },
    ReparentTask {
        task_id: TaskId,
        new_parent_id: Option<TaskId>,
        position_hint: Option<usize>,
    },
    SetDateRange {
        task_id: TaskId,
        dates: DateRange,
    },
    SetStatus {
        task_id: TaskId,
        status: TaskStatus,
    },
    SetProgress {
        task_id: TaskId,
        progress: u8,
    },
    DeleteTask {
        task_id: TaskId,
        mode: DeleteMode,
    },
    DuplicateTask {
        task_id: TaskId,
    },
    AddDependency {
        edge: DependencyEdge,
    },
    RemoveDependency {
        edge: DependencyEdge,
    },
    AddAction {
        task_id: TaskId,
        title: String,
        /// `None` spreads the weight equally over all actions of the task,
        /// the new one included.
        #[serde(default)]
        weight: Option<f64>,
    },
    RemoveAction {
        action_id: ActionId,
    },
    RenameAction {
        action_id: ActionId,
        title: String,
    },
    DistributeWeights {
        task_id: TaskId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateTask { .. } => "create_task",
            Command::CreateSubtask { .. } => "create_subtask",
            Command::CreateSubtaskWithActions { .. } => "create_subtask_with_actions",
            Command::ToggleAction { .. } => "toggle_action",
            Command::ReparentTask { .. } => "reparent_task",
            Command::SetDateRange { .. } => "set_date_range",
            Command::SetStatus { .. } => "set_status",
            Command::SetProgress { .. } => "set_progress",
            Command::DeleteTask { .. } => "delete_task",
            Command::DuplicateTask { .. } => "duplicate_task",
            Command::AddDependency { .. } => "add_dependency",
            Command::RemoveDependency { .. } => "remove_dependency",
            Command::AddAction { .. } => "add_action",
            Command::RemoveAction { .. } => "remove_action",
            Command::RenameAction { .. } => "rename_action",
            Command::DistributeWeights { .. } => "distribute_weights",
        }
    }
}

/// Logical entity a change is serialized against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    Task(TaskId),
    Action(ActionId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Task(id) => write!(f, "task:{id}"),
            EntityKey::Action(id) => write!(f, "action:{id}"),
        }
    }
}

/// Collections held by the authoritative store. Also the unit of cache invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Tasks,
    Actions,
    Dependencies,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Tasks, Resource::Actions, Resource::Dependencies];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Tasks => "tasks",
            Resource::Actions => "actions",
            Resource::Dependencies => "dependencies",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    InsertTask {
        task: Task,
        #[serde(default)]
        actions: Vec<Action>,
    },
    MoveTasks {
        placements: Vec<Placement>,
    },
    UpdateDates {
        task_id: TaskId,
        dates: DateRange,
    },
    UpdateProgress {
        task_id: TaskId,
        progress: u8,
        status: TaskStatus,
    },
    /// Sets `done` to an absolute value, so replaying is harmless.
    ToggleAction {
        task_id: TaskId,
        action_id: ActionId,
        done: bool,
    },
    DeleteTasks {
        task_ids: Vec<TaskId>,
        /// Children promoted out of the deleted task, applied before removal.
        #[serde(default)]
        placements: Vec<Placement>,
    },
    InsertDependency {
        edge: DependencyEdge,
    },
    DeleteDependency {
        edge: DependencyEdge,
    },
    ReplaceActions {
        task_id: TaskId,
        actions: Vec<Action>,
    },
    RenameAction {
        task_id: TaskId,
        action_id: ActionId,
        title: String,
    },
}

impl Change {
    pub fn entity(&self) -> EntityKey {
        match self {
            Change::InsertTask { task, .. } => EntityKey::Task(task.id.clone()),
            Change::MoveTasks { placements } => match placements.first() {
                Some(p) => EntityKey::Task(p.task_id.clone()),
                None => EntityKey::Task(TaskId::from("")),
            },
            Change::UpdateDates { task_id, .. }
            | Change::UpdateProgress { task_id, .. }
            | Change::ToggleAction { task_id, .. }
            | Change::ReplaceActions { task_id, .. } => EntityKey::Task(task_id.clone()),
            Change::DeleteTasks { task_ids, .. } => match task_ids.first() {
                Some(id) => EntityKey::Task(id.clone()),
                None => EntityKey::Task(TaskId::from("")),
            },
            Change::InsertDependency { edge } | Change::DeleteDependency { edge } => {
                EntityKey::Task(edge.from_task_id.clone())
            }
            Change::RenameAction { action_id, .. } => EntityKey::Action(action_id.clone()),
        }
    }

    /// Collections whose cached copies this change makes stale.
    pub fn resources(&self) -> Vec<Resource> {
        match self {
            Change::InsertTask { actions, .. } if actions.is_empty() => vec![Resource::Tasks],
            Change::InsertTask { .. } => vec![Resource::Tasks, Resource::Actions],
            Change::MoveTasks { .. }
            | Change::UpdateDates { .. }
            | Change::UpdateProgress { .. } => vec![Resource::Tasks],
            Change::ToggleAction { .. } | Change::ReplaceActions { .. } => {
                vec![Resource::Tasks, Resource::Actions]
            }
            Change::RenameAction { .. } => vec![Resource::Actions],
            Change::DeleteTasks { .. } => Resource::ALL.to_vec(),
            Change::InsertDependency { .. } | Change::DeleteDependency { .. } => {
                vec![Resource::Dependencies]
            }
        }
    }

    /// True when the change edits `task_id` itself, its actions, a dependency
    /// it takes part in, or its placement in the tree.
    pub fn touches(&self, task_id: &TaskId) -> bool {
        match self {
            Change::InsertTask { task, .. } => &task.id == task_id,
            Change::MoveTasks { placements } => placements.iter().any(|p| &p.task_id == task_id),
            Change::UpdateDates { task_id: id, .. }
            | Change::UpdateProgress { task_id: id, .. }
            | Change::ToggleAction { task_id: id, .. }
            | Change::ReplaceActions { task_id: id, .. }
            | Change::RenameAction { task_id: id, .. } => id == task_id,
            Change::DeleteTasks {
                task_ids,
                placements,
            } => task_ids.contains(task_id) || placements.iter().any(|p| &p.task_id == task_id),
            Change::InsertDependency { edge } | Change::DeleteDependency { edge } => {
                &edge.from_task_id == task_id || &edge.to_task_id == task_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Change::InsertTask { .. } => "insert_task",
            Change::MoveTasks { .. } => "move_tasks",
            Change::UpdateDates { .. } => "update_dates",
            Change::UpdateProgress { .. } => "update_progress",
            Change::ToggleAction { .. } => "toggle_action",
            Change::DeleteTasks { .. } => "delete_tasks",
            Change::InsertDependency { .. } => "insert_dependency",
            Change::DeleteDependency { .. } => "delete_dependency",
            Change::ReplaceActions { .. } => "replace_actions",
            Change::RenameAction { .. } => "rename_action",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::DependencyKind;

    #[test]
    fn test_touches_both_ends_of_an_edge() {
        let edge = DependencyEdge::new("a", "b", DependencyKind::Blocks);
        let change = Change::InsertDependency { edge };
        assert!(change.touches(&"a".into()));
        assert!(change.touches(&"b".into()));
        assert!(!change.touches(&"c".into()));

        let rename = Change::RenameAction {
            task_id: "t1".into(),
            action_id: "a1".into(),
            title: "x".into(),
        };
        assert!(rename.touches(&"t1".into()));
        assert!(!rename.touches(&"a1".into()));
    }

    #[test]
    fn test_toggle_is_keyed_to_owning_task() {
        let change = Change::ToggleAction {
            task_id: "t1".into(),
            action_id: "a1".into(),
            done: true,
        };
        assert_eq!(change.entity(), EntityKey::Task("t1".into()));
        assert_eq!(change.resources(), vec![Resource::Tasks, Resource::Actions]);
    }

    #[test]
    fn test_rename_is_keyed_to_action() {
        let change = Change::RenameAction {
            task_id: "t1".into(),
            action_id: "a1".into(),
            title: "Review".into(),
        };
        assert_eq!(change.entity(), EntityKey::Action("a1".into()));
        assert_eq!(change.entity().to_string(), "action:a1");
    }

    #[test]
    fn test_change_wire_format() {
        let change = Change::InsertDependency {
            edge: DependencyEdge::new("a", "b", DependencyKind::Blocks),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "insert_dependency");
        assert_eq!(json["edge"]["kind"], "blocks");
        let back: Change = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);
    }

    #[test]
    fn test_command_from_json() {
        let json = serde_json::json!({
            "type": "reparent_task",
            "task_id": "c",
            "new_parent_id": "b",
            "position_hint": null
        });
        let cmd: Command = serde_json::from_value(json).unwrap();
        assert_eq!(cmd.name(), "reparent_task");
    }
}
