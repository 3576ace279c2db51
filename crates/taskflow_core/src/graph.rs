//! In-memory view of one scope: the task tree, the actions of every task with
//! their running progress sums, and the dependency graph.
//!
//! Planning ([`TaskGraph::plan`]) is read-only and runs every local validation.
//! Applying ([`TaskGraph::apply`]) checks that referenced records still exist and
//! leaves the view untouched when they do not.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::change::{Change, Command, DeleteMode};
use crate::error::{Result, TaskError};
use crate::hierarchy::{TaskTree, TreeNode};
use crate::ids::{ActionId, TaskId};
use crate::order_key::next_key;
use crate::progress::{self, Derived, ProgressTracker, Trigger, derive_status};
use crate::snapshot::Snapshot;
use crate::stats::TaskStats;
use crate::task::{Action, DependencyEdge, Task, TaskStatus};
use crate::validate::{DependencyGraph, check_date_containment};

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tree: TaskTree,
    actions: HashMap<TaskId, Vec<Action>>,
    action_owner: HashMap<ActionId, TaskId>,
    trackers: HashMap<TaskId, ProgressTracker>,
    dependencies: DependencyGraph,
}

fn check_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TaskError::validation("title is required"));
    }
    Ok(())
}

fn check_weight(weight: f64) -> Result<()> {
    if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
        return Err(TaskError::validation(format!(
            "action weight must be between 0 and 100, got {weight}"
        )));
    }
    Ok(())
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot. Actions and edges pointing at unknown tasks are dropped.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut graph = TaskGraph {
            tree: TaskTree::build(snapshot.tasks),
            ..Default::default()
        };

        let mut grouped: HashMap<TaskId, Vec<Action>> = HashMap::new();
        for action in snapshot.actions {
            if !graph.tree.contains(&action.task_id) {
                warn!(action_id = %action.id, task_id = %action.task_id, "action references unknown task, dropped");
                continue;
            }
            grouped.entry(action.task_id.clone()).or_default().push(action);
        }
        for (task_id, actions) in grouped {
            graph.set_actions(&task_id, actions);
        }

        let edges = snapshot
            .dependencies
            .into_iter()
            .filter(|edge| {
                let known = graph.tree.contains(&edge.from_task_id)
                    && graph.tree.contains(&edge.to_task_id);
                if !known {
                    warn!(from = %edge.from_task_id, to = %edge.to_task_id, "dependency references unknown task, dropped");
                }
                known
            })
            .collect();
        graph.dependencies = DependencyGraph::from_edges(edges);
        graph
    }

    /// Flat records in display order.
    pub fn to_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for (_, task) in self.tree.walk() {
            snapshot.tasks.push(task.clone());
            snapshot
                .actions
                .extend(self.actions(&task.id).iter().cloned());
        }
        snapshot.dependencies = self.dependencies.edges().to_vec();
        snapshot
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tree.get(id)
    }

    pub fn forest(&self) -> Vec<TreeNode> {
        self.tree.forest()
    }

    /// Actions of `task_id`, ordered by position.
    pub fn actions(&self, task_id: &TaskId) -> &[Action] {
        self.actions
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn action(&self, id: &ActionId) -> Option<&Action> {
        let owner = self.action_owner.get(id)?;
        self.actions(owner).iter().find(|a| &a.id == id)
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    pub fn derived(&self, task_id: &TaskId) -> Option<Derived> {
        self.task(task_id).map(|t| Derived {
            progress: t.progress,
            status: t.status,
        })
    }

    pub fn stats(&self, today: NaiveDate) -> TaskStats {
        TaskStats::compute(&self.tree, self.actions.values().flatten(), today)
    }

    fn require_action(&self, id: &ActionId) -> Result<&Action> {
        self.action(id)
            .ok_or_else(|| TaskError::ActionNotFound(id.clone()))
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        self.tree
            .task_mut(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))
    }

    /// Validates `command` against the view and resolves it into a [`Change`].
    pub fn plan(&self, command: &Command, today: NaiveDate) -> Result<Change> {
        match command {
            Command::CreateTask { task } => Ok(Change::InsertTask {
                task: self.tree.plan_root(task, today)?,
                actions: Vec::new(),
            }),
            Command::CreateSubtask { parent_id, task } => Ok(Change::InsertTask {
                task: self.tree.plan_subtask(parent_id, task)?,
                actions: Vec::new(),
            }),
            Command::CreateSubtaskWithActions {
                parent_id,
                task,
                actions: titles,
            } => {
                let task = self.tree.plan_subtask(parent_id, task)?;
                let mut actions = Vec::with_capacity(titles.len());
                for (position, title) in (1..).zip(titles) {
                    check_title(title)?;
                    actions.push(Action::new(task.id.clone(), title.trim(), 0.0, position));
                }
                progress::distribute_equal_weights(&mut actions);
                Ok(Change::InsertTask { task, actions })
            }
            Command::ToggleAction { action_id } => {
                let action = self.require_action(action_id)?;
                Ok(Change::ToggleAction {
                    task_id: action.task_id.clone(),
                    action_id: action_id.clone(),
                    done: !action.done,
                })
            }
            Command::ReparentTask {
                task_id,
                new_parent_id,
                position_hint,
            } => {
                let placements =
                    self.tree
                        .plan_reparent(task_id, new_parent_id.as_ref(), *position_hint)?;
                if let Some(parent) = new_parent_id.as_ref().and_then(|p| self.tree.get(p)) {
                    check_date_containment(parent, &self.tree.require(task_id)?.dates)?;
                }
                Ok(Change::MoveTasks { placements })
            }
            Command::SetDateRange { task_id, dates } => {
                self.tree.require(task_id)?;
                if let Some(parent) = self.tree.parent_of(task_id).and_then(|p| self.tree.get(p)) {
                    check_date_containment(parent, dates)?;
                }
                Ok(Change::UpdateDates {
                    task_id: task_id.clone(),
                    dates: *dates,
                })
            }
            Command::SetStatus { task_id, status } => {
                let task = self.tree.require(task_id)?;
                Ok(Change::UpdateProgress {
                    task_id: task_id.clone(),
                    progress: task.progress,
                    status: *status,
                })
            }
            Command::SetProgress { task_id, progress } => {
                let task = self.tree.require(task_id)?;
                if *progress > 100 {
                    return Err(TaskError::validation(format!(
                        "progress must be between 0 and 100, got {progress}"
                    )));
                }
                if !self.actions(task_id).is_empty() {
                    return Err(TaskError::validation(format!(
                        "progress of task {task_id} is derived from its actions"
                    )));
                }
                Ok(Change::UpdateProgress {
                    task_id: task_id.clone(),
                    progress: *progress,
                    status: derive_status(*progress, task.status, Trigger::Recalc),
                })
            }
            Command::DeleteTask { task_id, mode } => {
                self.tree.require(task_id)?;
                match mode {
                    DeleteMode::Cascade => {
                        let mut task_ids = vec![task_id.clone()];
                        task_ids.extend(self.tree.descendants(task_id));
                        Ok(Change::DeleteTasks {
                            task_ids,
                            placements: Vec::new(),
                        })
                    }
                    DeleteMode::Detach => Ok(Change::DeleteTasks {
                        task_ids: vec![task_id.clone()],
                        placements: self.tree.plan_detach(task_id)?,
                    }),
                }
            }
            Command::DuplicateTask { task_id } => self.plan_duplicate(task_id),
            Command::AddDependency { edge } => {
                self.tree.require(&edge.from_task_id)?;
                self.tree.require(&edge.to_task_id)?;
                self.dependencies.check_insert(edge)?;
                Ok(Change::InsertDependency { edge: edge.clone() })
            }
            Command::RemoveDependency { edge } => {
                if !self.dependencies.contains(edge) {
                    return Err(not_found_edge(edge));
                }
                Ok(Change::DeleteDependency { edge: edge.clone() })
            }
            Command::AddAction {
                task_id,
                title,
                weight,
            } => {
                self.tree.require(task_id)?;
                check_title(title)?;
                if let Some(weight) = weight {
                    check_weight(*weight)?;
                }
                let mut actions = self.actions(task_id).to_vec();
                let position = actions
                    .iter()
                    .map(|a| a.position)
                    .max()
                    .map_or(1, |p| p + 1);
                actions.push(Action::new(
                    task_id.clone(),
                    title.trim(),
                    weight.unwrap_or_default(),
                    position,
                ));
                if weight.is_none() {
                    progress::distribute_equal_weights(&mut actions);
                }
                Ok(Change::ReplaceActions {
                    task_id: task_id.clone(),
                    actions,
                })
            }
            Command::RemoveAction { action_id } => {
                let task_id = self.require_action(action_id)?.task_id.clone();
                let actions = self
                    .actions(&task_id)
                    .iter()
                    .filter(|a| &a.id != action_id)
                    .cloned()
                    .collect();
                Ok(Change::ReplaceActions { task_id, actions })
            }
            Command::RenameAction { action_id, title } => {
                check_title(title)?;
                let action = self.require_action(action_id)?;
                Ok(Change::RenameAction {
                    task_id: action.task_id.clone(),
                    action_id: action_id.clone(),
                    title: title.trim().to_string(),
                })
            }
            Command::DistributeWeights { task_id } => {
                self.tree.require(task_id)?;
                let mut actions = self.actions(task_id).to_vec();
                if actions.is_empty() {
                    return Err(TaskError::validation(format!(
                        "task {task_id} has no actions"
                    )));
                }
                progress::distribute_equal_weights(&mut actions);
                Ok(Change::ReplaceActions {
                    task_id: task_id.clone(),
                    actions,
                })
            }
        }
    }

    fn plan_duplicate(&self, task_id: &TaskId) -> Result<Change> {
        let source = self.tree.require(task_id)?;
        let parent = self.tree.parent_of(task_id).and_then(|p| self.tree.get(p));
        let keys = self
            .tree
            .siblings_under(parent.map(|p| &p.id))
            .iter()
            .filter_map(|id| self.tree.get(id))
            .map(|t| &t.order_key);
        let order_key = next_key(parent.map(|p| &p.order_key), keys)?;

        let id = TaskId::new();
        let task = Task {
            id: id.clone(),
            title: format!("{} (copy)", source.title),
            parent_id: parent.map(|p| p.id.clone()),
            level: parent.map_or(0, |p| p.level + 1),
            order_key,
            status: TaskStatus::Todo,
            progress: 0,
            priority: source.priority,
            dates: source.dates,
            effort_estimate_h: source.effort_estimate_h,
            assignee: source.assignee.clone(),
        };
        let actions = self
            .actions(task_id)
            .iter()
            .map(|a| Action {
                id: ActionId::new(),
                task_id: id.clone(),
                done: false,
                ..a.clone()
            })
            .collect();
        Ok(Change::InsertTask { task, actions })
    }

    /// Applies a planned change.
    pub fn apply(&mut self, change: &Change) -> Result<()> {
        debug!(kind = change.kind(), entity = %change.entity(), "applying change");
        match change {
            Change::InsertTask { task, actions } => {
                if let Some(pid) = &task.parent_id {
                    if !self.tree.contains(pid) {
                        return Err(TaskError::ParentNotFound(pid.clone()));
                    }
                }
                self.tree.insert(task.clone())?;
                self.set_actions(&task.id, actions.clone());
            }
            Change::MoveTasks { placements } => {
                for placement in placements {
                    if let Some(pid) = &placement.parent_id {
                        if !self.tree.contains(pid) {
                            return Err(TaskError::ParentNotFound(pid.clone()));
                        }
                    }
                }
                self.tree.apply_placements(placements)?;
            }
            Change::UpdateDates { task_id, dates } => {
                self.task_mut(task_id)?.dates = *dates;
            }
            Change::UpdateProgress {
                task_id,
                progress,
                status,
            } => {
                let task = self.task_mut(task_id)?;
                task.progress = *progress;
                task.status = *status;
            }
            Change::ToggleAction {
                task_id,
                action_id,
                done,
            } => self.apply_toggle(task_id, action_id, *done)?,
            Change::DeleteTasks {
                task_ids,
                placements,
            } => {
                for id in task_ids {
                    self.tree.require(id)?;
                }
                if !placements.is_empty() {
                    self.tree.apply_placements(placements)?;
                }
                self.tree.remove(task_ids);
                for id in task_ids {
                    self.set_actions(id, Vec::new());
                }
                let removed: HashSet<TaskId> = task_ids.iter().cloned().collect();
                self.dependencies.remove_tasks(&removed);
            }
            Change::InsertDependency { edge } => {
                self.tree.require(&edge.from_task_id)?;
                self.tree.require(&edge.to_task_id)?;
                self.dependencies.insert(edge.clone())?;
            }
            Change::DeleteDependency { edge } => {
                if !self.dependencies.remove(edge) {
                    return Err(not_found_edge(edge));
                }
            }
            Change::ReplaceActions { task_id, actions } => {
                self.tree.require(task_id)?;
                self.set_actions(task_id, actions.clone());
                self.rederive(task_id, Trigger::Recalc)?;
            }
            Change::RenameAction {
                task_id,
                action_id,
                title,
            } => {
                let action = self
                    .actions
                    .get_mut(task_id)
                    .and_then(|list| list.iter_mut().find(|a| &a.id == action_id))
                    .ok_or_else(|| TaskError::ActionNotFound(action_id.clone()))?;
                action.title = title.clone();
            }
        }
        Ok(())
    }

    fn apply_toggle(&mut self, task_id: &TaskId, action_id: &ActionId, done: bool) -> Result<()> {
        self.tree.require(task_id)?;
        let action = self
            .actions
            .get_mut(task_id)
            .and_then(|list| list.iter_mut().find(|a| &a.id == action_id))
            .ok_or_else(|| TaskError::ActionNotFound(action_id.clone()))?;
        if action.done != done {
            action.done = done;
            let weight = action.weight;
            self.trackers
                .entry(task_id.clone())
                .or_default()
                .toggle(weight, done);
        }
        let progress = self
            .trackers
            .get(task_id)
            .map(ProgressTracker::progress)
            .unwrap_or_default();
        let task = self.task_mut(task_id)?;
        task.progress = progress;
        task.status = derive_status(progress, task.status, Trigger::Toggle);
        Ok(())
    }

    fn set_actions(&mut self, task_id: &TaskId, mut actions: Vec<Action>) {
        if let Some(old) = self.actions.remove(task_id) {
            for action in old {
                self.action_owner.remove(&action.id);
            }
        }
        self.trackers.remove(task_id);
        if actions.is_empty() {
            return;
        }
        actions.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        for action in &actions {
            self.action_owner
                .insert(action.id.clone(), task_id.clone());
        }
        self.trackers
            .insert(task_id.clone(), ProgressTracker::from_actions(&actions));
        self.actions.insert(task_id.clone(), actions);
    }

    fn rederive(&mut self, task_id: &TaskId, trigger: Trigger) -> Result<()> {
        let current = self
            .derived(task_id)
            .ok_or_else(|| TaskError::TaskNotFound(task_id.clone()))?;
        let next = progress::derive(self.actions(task_id), current, trigger);
        let task = self.task_mut(task_id)?;
        task.progress = next.progress;
        task.status = next.status;
        Ok(())
    }
}

fn not_found_edge(edge: &DependencyEdge) -> TaskError {
    TaskError::validation(format!(
        "dependency {} -> {} not found",
        edge.from_task_id, edge.to_task_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::EntityKey;
    use crate::task::{DateRange, DependencyKind, NewTask};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        day(2024, 1, 1)
    }

    fn run(graph: &mut TaskGraph, command: Command) -> Change {
        let change = graph.plan(&command, today()).unwrap();
        graph.apply(&change).unwrap();
        change
    }

    fn create(graph: &mut TaskGraph, id: &str, parent: Option<&str>) {
        let task = NewTask::new(id.to_uppercase()).with_id(id);
        let command = match parent {
            Some(p) => Command::CreateSubtask {
                parent_id: p.into(),
                task,
            },
            None => Command::CreateTask {
                task: task.with_dates(DateRange::new(day(2024, 1, 1), day(2024, 1, 31)).unwrap()),
            },
        };
        run(graph, command);
    }

    fn add_action(graph: &mut TaskGraph, task: &str, weight: f64) -> ActionId {
        run(
            graph,
            Command::AddAction {
                task_id: task.into(),
                title: "step".into(),
                weight: Some(weight),
            },
        );
        graph.actions(&task.into()).last().unwrap().id.clone()
    }

    fn key(graph: &TaskGraph, id: &str) -> String {
        graph.task(&id.into()).unwrap().order_key.to_string()
    }

    #[test]
    fn test_reparent_scenario() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        create(&mut graph, "b", Some("a"));
        create(&mut graph, "c", Some("a"));
        assert_eq!(key(&graph, "a"), "1");
        assert_eq!(key(&graph, "b"), "1.1");
        assert_eq!(key(&graph, "c"), "1.2");

        run(
            &mut graph,
            Command::ReparentTask {
                task_id: "c".into(),
                new_parent_id: Some("b".into()),
                position_hint: None,
            },
        );
        assert_eq!(key(&graph, "c"), "1.1.1");
        assert_eq!(graph.task(&"c".into()).unwrap().level, 2);
    }

    #[test]
    fn test_rejected_reparent_leaves_view_unchanged() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        create(&mut graph, "b", Some("a"));
        let before = graph.to_snapshot();
        let err = graph
            .plan(
                &Command::ReparentTask {
                    task_id: "a".into(),
                    new_parent_id: Some("b".into()),
                    position_hint: None,
                },
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::CycleDetected { .. }));
        assert_eq!(graph.to_snapshot(), before);
    }

    #[test]
    fn test_reparent_must_fit_new_parent_dates() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        run(
            &mut graph,
            Command::CreateTask {
                task: NewTask::new("Z")
                    .with_id("z")
                    .with_dates(DateRange::new(day(2024, 3, 1), day(2024, 3, 31)).unwrap()),
            },
        );
        create(&mut graph, "c", Some("z"));
        let before = graph.to_snapshot();

        let err = graph
            .plan(
                &Command::ReparentTask {
                    task_id: "c".into(),
                    new_parent_id: Some("a".into()),
                    position_hint: None,
                },
                today(),
            )
            .unwrap_err();
        match err {
            TaskError::DateRangeConflict {
                parent, suggested, ..
            } => {
                assert_eq!(parent.start(), day(2024, 1, 1));
                assert!(parent.contains(&suggested));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(graph.to_snapshot(), before);

        // Moving to the top level has no range to respect.
        run(
            &mut graph,
            Command::ReparentTask {
                task_id: "c".into(),
                new_parent_id: None,
                position_hint: None,
            },
        );
        assert_eq!(graph.task(&"c".into()).unwrap().level, 0);
    }

    #[test]
    fn test_toggle_updates_progress_and_twice_restores() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        let first = add_action(&mut graph, "a", 40.0);
        add_action(&mut graph, "a", 60.0);

        run(&mut graph, Command::ToggleAction { action_id: first.clone() });
        let derived = graph.derived(&"a".into()).unwrap();
        assert_eq!(derived.progress, 40);
        assert_eq!(derived.status, TaskStatus::Doing);

        run(&mut graph, Command::ToggleAction { action_id: first });
        let derived = graph.derived(&"a".into()).unwrap();
        assert_eq!(derived.progress, 0);
        assert_eq!(derived.status, TaskStatus::Todo);
    }

    #[test]
    fn test_blocked_survives_action_edit_until_toggle() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        let first = add_action(&mut graph, "a", 50.0);
        run(
            &mut graph,
            Command::SetStatus {
                task_id: "a".into(),
                status: TaskStatus::Blocked,
            },
        );
        add_action(&mut graph, "a", 50.0);
        assert_eq!(graph.derived(&"a".into()).unwrap().status, TaskStatus::Blocked);

        run(&mut graph, Command::ToggleAction { action_id: first });
        assert_eq!(graph.derived(&"a".into()).unwrap().status, TaskStatus::Doing);
    }

    #[test]
    fn test_set_progress_rejected_with_actions() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        create(&mut graph, "b", None);
        run(
            &mut graph,
            Command::SetProgress {
                task_id: "b".into(),
                progress: 100,
            },
        );
        assert_eq!(graph.derived(&"b".into()).unwrap().status, TaskStatus::Done);

        add_action(&mut graph, "a", 100.0);
        let err = graph
            .plan(
                &Command::SetProgress {
                    task_id: "a".into(),
                    progress: 20,
                },
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
    }

    #[test]
    fn test_date_range_checked_against_parent() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        create(&mut graph, "b", Some("a"));
        let bad = DateRange::new(day(2024, 1, 15), day(2024, 2, 5)).unwrap();
        let err = graph
            .plan(
                &Command::SetDateRange {
                    task_id: "b".into(),
                    dates: bad,
                },
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::DateRangeConflict { .. }));

        let good = DateRange::new(day(2024, 1, 15), day(2024, 1, 20)).unwrap();
        run(
            &mut graph,
            Command::SetDateRange {
                task_id: "b".into(),
                dates: good,
            },
        );
        assert_eq!(graph.task(&"b".into()).unwrap().dates, good);
    }

    #[test]
    fn test_cascade_delete_drops_actions_and_edges() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        create(&mut graph, "b", Some("a"));
        create(&mut graph, "z", None);
        let action = add_action(&mut graph, "b", 100.0);
        run(
            &mut graph,
            Command::AddDependency {
                edge: DependencyEdge::new("b", "z", DependencyKind::Blocks),
            },
        );
        run(
            &mut graph,
            Command::DeleteTask {
                task_id: "a".into(),
                mode: DeleteMode::Cascade,
            },
        );
        assert_eq!(graph.tree().len(), 1);
        assert!(graph.action(&action).is_none());
        assert!(graph.dependencies().is_empty());
    }

    #[test]
    fn test_detach_delete_promotes_children() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        create(&mut graph, "b", Some("a"));
        create(&mut graph, "c", Some("b"));
        run(
            &mut graph,
            Command::DeleteTask {
                task_id: "b".into(),
                mode: DeleteMode::Detach,
            },
        );
        let c = graph.task(&"c".into()).unwrap();
        assert_eq!(c.parent_id, Some("a".into()));
        assert_eq!(c.level, 1);
        assert_eq!(c.order_key.to_string(), "1.1");
    }

    #[test]
    fn test_duplicate_copies_actions_undone() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        create(&mut graph, "b", Some("a"));
        let action = add_action(&mut graph, "b", 100.0);
        run(&mut graph, Command::ToggleAction { action_id: action });

        let change = run(&mut graph, Command::DuplicateTask { task_id: "b".into() });
        let Change::InsertTask { task, actions } = change else {
            panic!("unexpected change");
        };
        let copy = graph.task(&task.id).unwrap();
        assert_eq!(copy.title, "B (copy)");
        assert_eq!(copy.order_key.to_string(), "1.2");
        assert_eq!(copy.status, TaskStatus::Todo);
        assert_eq!(copy.progress, 0);
        assert_eq!(actions.len(), 1);
        assert!(!graph.actions(&task.id)[0].done);
    }

    #[test]
    fn test_dependency_cycle_and_removal() {
        let mut graph = TaskGraph::new();
        for id in ["a", "b", "c"] {
            create(&mut graph, id, None);
        }
        let ab = DependencyEdge::new("a", "b", DependencyKind::Blocks);
        run(&mut graph, Command::AddDependency { edge: ab.clone() });
        run(
            &mut graph,
            Command::AddDependency {
                edge: DependencyEdge::new("c", "b", DependencyKind::DependsOn),
            },
        );
        let err = graph
            .plan(
                &Command::AddDependency {
                    edge: DependencyEdge::new("c", "a", DependencyKind::Blocks),
                },
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::CycleDetected { .. }));

        run(&mut graph, Command::RemoveDependency { edge: ab.clone() });
        assert!(graph
            .plan(&Command::RemoveDependency { edge: ab }, today())
            .is_err());
    }

    #[test]
    fn test_distribute_and_remove_action() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        let first = add_action(&mut graph, "a", 10.0);
        add_action(&mut graph, "a", 10.0);
        add_action(&mut graph, "a", 10.0);
        run(&mut graph, Command::DistributeWeights { task_id: "a".into() });
        let weights: Vec<f64> = graph.actions(&"a".into()).iter().map(|a| a.weight).collect();
        assert_eq!(weights, vec![33.33, 33.33, 33.34]);

        run(&mut graph, Command::ToggleAction { action_id: first.clone() });
        assert_eq!(graph.derived(&"a".into()).unwrap().progress, 33);
        run(&mut graph, Command::RemoveAction { action_id: first });
        assert_eq!(graph.actions(&"a".into()).len(), 2);
        assert_eq!(graph.derived(&"a".into()).unwrap().progress, 0);
    }

    #[test]
    fn test_add_action_positions_and_weight_check() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        add_action(&mut graph, "a", 20.0);
        add_action(&mut graph, "a", 20.0);
        let positions: Vec<u32> = graph.actions(&"a".into()).iter().map(|a| a.position).collect();
        assert_eq!(positions, vec![1, 2]);
        let err = graph
            .plan(
                &Command::AddAction {
                    task_id: "a".into(),
                    title: "x".into(),
                    weight: Some(120.0),
                },
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
    }

    #[test]
    fn test_add_action_without_weight_spreads_equally() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        let first = add_action(&mut graph, "a", 100.0);
        run(&mut graph, Command::ToggleAction { action_id: first });
        assert_eq!(graph.derived(&"a".into()).unwrap().progress, 100);

        for title in ["second", "third"] {
            run(
                &mut graph,
                Command::AddAction {
                    task_id: "a".into(),
                    title: title.into(),
                    weight: None,
                },
            );
        }
        let weights: Vec<f64> = graph.actions(&"a".into()).iter().map(|a| a.weight).collect();
        assert_eq!(weights, vec![33.33, 33.33, 33.34]);
        assert_eq!(graph.derived(&"a".into()).unwrap().progress, 33);
        assert_eq!(graph.derived(&"a".into()).unwrap().status, TaskStatus::Doing);
    }

    #[test]
    fn test_create_subtask_with_actions() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        let change = run(
            &mut graph,
            Command::CreateSubtaskWithActions {
                parent_id: "a".into(),
                task: NewTask::new("Launch").with_id("launch"),
                actions: vec!["Draft".into(), " Review ".into(), "Publish".into(), "Announce".into()],
            },
        );
        assert_eq!(change.entity(), EntityKey::Task("launch".into()));

        let actions = graph.actions(&"launch".into());
        let titles: Vec<&str> = actions.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Draft", "Review", "Publish", "Announce"]);
        assert!(actions.iter().all(|a| a.weight == 25.0 && !a.done));
        assert_eq!(actions.iter().map(|a| a.position).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(key(&graph, "launch"), "1.1");

        let before = graph.to_snapshot();
        let err = graph
            .plan(
                &Command::CreateSubtaskWithActions {
                    parent_id: "a".into(),
                    task: NewTask::new("Empty step"),
                    actions: vec!["ok".into(), "  ".into()],
                },
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(graph.to_snapshot(), before);
    }

    #[test]
    fn test_apply_against_stale_view_fails_without_mutation() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        let before = graph.to_snapshot();
        let err = graph
            .apply(&Change::UpdateDates {
                task_id: "gone".into(),
                dates: DateRange::new(day(2024, 1, 1), day(2024, 1, 2)).unwrap(),
            })
            .unwrap_err();
        assert_eq!(err, TaskError::TaskNotFound("gone".into()));
        assert_eq!(graph.to_snapshot(), before);
    }

    #[test]
    fn test_snapshot_round_trip_drops_dangling_actions() {
        let mut graph = TaskGraph::new();
        create(&mut graph, "a", None);
        add_action(&mut graph, "a", 50.0);
        let mut snapshot = graph.to_snapshot();
        snapshot
            .actions
            .push(Action::new("ghost".into(), "orphan", 10.0, 1));
        let reloaded = TaskGraph::from_snapshot(snapshot);
        assert_eq!(reloaded.to_snapshot(), graph.to_snapshot());
    }
}
