//! Parent/child tree over tasks.
//!
//! Nodes live in a flat arena keyed by id; parent and child links are ids, never
//! references. Siblings are kept sorted by order key, so a pre-order walk yields the
//! display order.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TaskError};
use crate::ids::TaskId;
use crate::order_key::{OrderKey, next_key};
use crate::task::{DateRange, NewTask, Task, TaskStatus};
use crate::validate::check_date_containment;

/// Days covered by a root task created without explicit dates.
pub const DEFAULT_ROOT_SPAN_DAYS: u64 = 7;

/// Default effort for a subtask created without an estimate.
pub const DEFAULT_SUBTASK_EFFORT_H: f64 = 1.0;

#[derive(Debug, Clone)]
struct Node {
    task: Task,
    /// Parent actually linked in the tree. `None` for roots and promoted orphans.
    linked_parent: Option<TaskId>,
    children: Vec<TaskId>,
}

/// New structural position for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub level: u32,
    pub order_key: OrderKey,
}

/// Nested projection used for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub task: Task,
    pub depth: usize,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskTree {
    nodes: HashMap<TaskId, Node>,
    roots: Vec<TaskId>,
}

fn sibling_order(nodes: &HashMap<TaskId, Node>, a: &TaskId, b: &TaskId) -> Ordering {
    match (nodes.get(a), nodes.get(b)) {
        (Some(x), Some(y)) => x
            .task
            .order_key
            .cmp(&y.task.order_key)
            .then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

impl TaskTree {
    /// Builds the tree from a flat list.
    ///
    /// A task whose parent is missing is shown as a root and logged. Parent cycles in
    /// stored data are broken the same way.
    pub fn build(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut tree = TaskTree::default();
        for task in tasks {
            let id = task.id.clone();
            let previous = tree.nodes.insert(
                id.clone(),
                Node {
                    task,
                    linked_parent: None,
                    children: Vec::new(),
                },
            );
            if previous.is_some() {
                warn!(task_id = %id, "duplicate task id, keeping the last record");
            }
        }
        tree.relink();
        tree
    }

    fn relink(&mut self) {
        self.roots.clear();
        for node in self.nodes.values_mut() {
            node.children.clear();
            node.linked_parent = None;
        }

        let mut ids: Vec<TaskId> = self.nodes.keys().cloned().collect();
        ids.sort();
        for id in &ids {
            let parent = self.nodes.get(id).and_then(|n| n.task.parent_id.clone());
            match parent {
                Some(pid) if pid != *id && self.nodes.contains_key(&pid) => {
                    if let Some(p) = self.nodes.get_mut(&pid) {
                        p.children.push(id.clone());
                    }
                    if let Some(n) = self.nodes.get_mut(id) {
                        n.linked_parent = Some(pid);
                    }
                }
                Some(pid) => {
                    warn!(task_id = %id, parent_id = %pid, "parent not found, showing task as root");
                    self.roots.push(id.clone());
                }
                None => self.roots.push(id.clone()),
            }
        }

        let mut reached = HashSet::new();
        for root in self.roots.clone() {
            self.mark_reached(&root, &mut reached);
        }
        for id in &ids {
            if reached.contains(id) {
                continue;
            }
            warn!(task_id = %id, "parent cycle in stored data, showing task as root");
            let parent = self.nodes.get_mut(id).and_then(|n| n.linked_parent.take());
            if let Some(pid) = parent {
                if let Some(p) = self.nodes.get_mut(&pid) {
                    p.children.retain(|c| c != id);
                }
            }
            self.roots.push(id.clone());
            self.mark_reached(id, &mut reached);
        }

        let nodes = &self.nodes;
        self.roots.sort_by(|a, b| sibling_order(nodes, a, b));
        for pid in &ids {
            let mut children = match self.nodes.get_mut(pid) {
                Some(n) if !n.children.is_empty() => std::mem::take(&mut n.children),
                _ => continue,
            };
            children.sort_by(|a, b| sibling_order(&self.nodes, a, b));
            if let Some(n) = self.nodes.get_mut(pid) {
                n.children = children;
            }
        }
    }

    fn mark_reached(&self, start: &TaskId, reached: &mut HashSet<TaskId>) {
        let mut stack = vec![start.clone()];
        while let Some(id) = stack.pop() {
            if !reached.insert(id.clone()) {
                continue;
            }
            stack.extend(self.children(&id).iter().cloned());
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.nodes.get(id).map(|n| &n.task)
    }

    /// Mutable access for non-structural fields. Changing `parent_id` or `order_key`
    /// through this handle leaves the tree stale; use [`Self::apply_placements`].
    pub(crate) fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.nodes.get_mut(id).map(|n| &mut n.task)
    }

    pub fn require(&self, id: &TaskId) -> Result<&Task> {
        self.get(id).ok_or_else(|| TaskError::TaskNotFound(id.clone()))
    }

    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    pub fn children(&self, id: &TaskId) -> &[TaskId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Children of `parent`, or the roots when `parent` is `None`.
    pub fn siblings_under(&self, parent: Option<&TaskId>) -> &[TaskId] {
        match parent {
            Some(pid) => self.children(pid),
            None => &self.roots,
        }
    }

    pub fn parent_of(&self, id: &TaskId) -> Option<&TaskId> {
        self.nodes.get(id).and_then(|n| n.linked_parent.as_ref())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.nodes.values().map(|n| &n.task)
    }

    /// Pre-order walk with depth, in display order.
    pub fn walk(&self) -> Vec<(usize, &Task)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, &TaskId)> = self.roots.iter().rev().map(|id| (0, id)).collect();
        while let Some((depth, id)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            out.push((depth, &node.task));
            stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }

    pub fn forest(&self) -> Vec<TreeNode> {
        self.roots
            .iter()
            .filter_map(|id| self.subtree(id, 0))
            .collect()
    }

    fn subtree(&self, id: &TaskId, depth: usize) -> Option<TreeNode> {
        let node = self.nodes.get(id)?;
        Some(TreeNode {
            task: node.task.clone(),
            depth,
            children: node
                .children
                .iter()
                .filter_map(|c| self.subtree(c, depth + 1))
                .collect(),
        })
    }

    /// All descendants of `id` in pre-order, excluding `id`.
    pub fn descendants(&self, id: &TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut stack: Vec<&TaskId> = self.children(id).iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// True when `candidate` sits somewhere below `ancestor`. Walks up, O(depth).
    pub fn is_descendant(&self, ancestor: &TaskId, candidate: &TaskId) -> bool {
        let mut cursor = self.parent_of(candidate);
        while let Some(pid) = cursor {
            if pid == ancestor {
                return true;
            }
            cursor = self.parent_of(pid);
        }
        false
    }

    /// Tree depth of `id`, counting roots as 0.
    pub fn depth(&self, id: &TaskId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent_of(id);
        while let Some(pid) = cursor {
            depth += 1;
            cursor = self.parent_of(pid);
        }
        depth
    }

    fn claim_id(&self, new: &NewTask) -> Result<TaskId> {
        match &new.id {
            Some(id) if self.contains(id) => Err(TaskError::validation(format!(
                "task id {id} already exists"
            ))),
            Some(id) => Ok(id.clone()),
            None => Ok(TaskId::new()),
        }
    }

    /// Task record for a new root, appended after the existing roots.
    pub fn plan_root(&self, new: &NewTask, today: NaiveDate) -> Result<Task> {
        new.validate()?;
        let id = self.claim_id(new)?;
        let keys = self.roots.iter().filter_map(|r| self.get(r)).map(|t| &t.order_key);
        Ok(Task {
            id,
            title: new.title.trim().to_string(),
            parent_id: None,
            level: 0,
            order_key: next_key(None, keys)?,
            status: TaskStatus::Todo,
            progress: 0,
            priority: new.priority.unwrap_or_default(),
            dates: new
                .dates
                .unwrap_or_else(|| DateRange::starting(today, DEFAULT_ROOT_SPAN_DAYS)),
            effort_estimate_h: new.effort_estimate_h.unwrap_or(0.0),
            assignee: new.assignee.clone(),
        })
    }

    /// Task record for a new last child of `parent_id`.
    ///
    /// Dates, priority and assignee default to the parent's. Explicit dates must fit
    /// inside the parent's range.
    pub fn plan_subtask(&self, parent_id: &TaskId, new: &NewTask) -> Result<Task> {
        new.validate()?;
        let parent = self
            .get(parent_id)
            .ok_or_else(|| TaskError::ParentNotFound(parent_id.clone()))?;
        let dates = match new.dates {
            Some(dates) => {
                check_date_containment(parent, &dates)?;
                dates
            }
            None => parent.dates,
        };
        let id = self.claim_id(new)?;
        let keys = self
            .children(parent_id)
            .iter()
            .filter_map(|c| self.get(c))
            .map(|t| &t.order_key);
        Ok(Task {
            id,
            title: new.title.trim().to_string(),
            parent_id: Some(parent_id.clone()),
            level: parent.level + 1,
            order_key: next_key(Some(&parent.order_key), keys)?,
            status: TaskStatus::Todo,
            progress: 0,
            priority: new.priority.unwrap_or(parent.priority),
            dates,
            effort_estimate_h: new.effort_estimate_h.unwrap_or(DEFAULT_SUBTASK_EFFORT_H),
            assignee: new.assignee.clone().or_else(|| parent.assignee.clone()),
        })
    }

    /// Placements that move `task_id` under `new_parent` (or to the top level).
    ///
    /// Without a hint, or with a hint past the end, the task is appended after the
    /// last sibling. `Some(i)` inserts it at index `i` of the sibling list (the list
    /// without the moved task) and renumbers the siblings that follow. Descendants
    /// keep their last segment under the new prefix and get fresh levels.
    ///
    /// The first placement always belongs to `task_id`.
    pub fn plan_reparent(
        &self,
        task_id: &TaskId,
        new_parent: Option<&TaskId>,
        position_hint: Option<usize>,
    ) -> Result<Vec<Placement>> {
        self.require(task_id)?;
        let (parent_key, level) = match new_parent {
            Some(pid) => {
                if pid == task_id || self.is_descendant(task_id, pid) {
                    return Err(TaskError::CycleDetected {
                        path: self.cycle_path(task_id, pid),
                    });
                }
                let parent = self.require(pid)?;
                (Some(parent.order_key.clone()), parent.level + 1)
            }
            None => (None, 0),
        };

        let siblings: Vec<&TaskId> = self
            .siblings_under(new_parent)
            .iter()
            .filter(|id| *id != task_id)
            .collect();
        let mut placements = Vec::new();

        match position_hint.filter(|&i| i < siblings.len()) {
            None => {
                let keys = siblings
                    .iter()
                    .filter_map(|id| self.get(id))
                    .map(|t| &t.order_key);
                let key = next_key(parent_key.as_ref(), keys)?;
                self.place_subtree(task_id, new_parent, level, key, &mut placements)?;
            }
            Some(index) => {
                let mut segment = match index {
                    0 => 0,
                    _ => self
                        .get(siblings[index - 1])
                        .map(|t| t.order_key.last_segment())
                        .unwrap_or(0),
                };
                let mut sequence = siblings.clone();
                sequence.insert(index, task_id);
                for id in &sequence[index..] {
                    segment = segment
                        .checked_add(1)
                        .ok_or_else(|| TaskError::validation("order key segment overflow"))?;
                    let key = match &parent_key {
                        Some(p) => p.child(segment)?,
                        None => OrderKey::root(segment)?,
                    };
                    let unchanged = *id != task_id
                        && self.get(id).is_some_and(|t| t.order_key == key);
                    if !unchanged {
                        self.place_subtree(id, new_parent, level, key, &mut placements)?;
                    }
                }
                // Keep the moved task first.
                if let Some(pos) = placements.iter().position(|p| &p.task_id == task_id) {
                    let moved = placements.remove(pos);
                    placements.insert(0, moved);
                }
            }
        }
        Ok(placements)
    }

    /// Placements that promote the children of `task_id` one level up, appended
    /// after the siblings of `task_id`. Used when deleting without cascade.
    pub fn plan_detach(&self, task_id: &TaskId) -> Result<Vec<Placement>> {
        self.require(task_id)?;
        let parent_id = self.parent_of(task_id);
        let (parent_key, level) = match parent_id.and_then(|p| self.get(p)) {
            Some(parent) => (Some(parent.order_key.clone()), parent.level + 1),
            None => (None, 0),
        };
        let mut keys: Vec<OrderKey> = self
            .siblings_under(parent_id)
            .iter()
            .filter(|id| *id != task_id)
            .filter_map(|id| self.get(id))
            .map(|t| t.order_key.clone())
            .collect();
        let mut placements = Vec::new();
        for child in self.children(task_id) {
            let key = next_key(parent_key.as_ref(), &keys)?;
            keys.push(key.clone());
            self.place_subtree(child, parent_id, level, key, &mut placements)?;
        }
        Ok(placements)
    }

    fn place_subtree(
        &self,
        id: &TaskId,
        parent_id: Option<&TaskId>,
        level: u32,
        key: OrderKey,
        out: &mut Vec<Placement>,
    ) -> Result<()> {
        out.push(Placement {
            task_id: id.clone(),
            parent_id: parent_id.cloned(),
            level,
            order_key: key.clone(),
        });
        for child in self.children(id) {
            let segment = self.require(child)?.order_key.last_segment();
            self.place_subtree(child, Some(id), level + 1, key.child(segment)?, out)?;
        }
        Ok(())
    }

    fn cycle_path(&self, task_id: &TaskId, target: &TaskId) -> Vec<TaskId> {
        if task_id == target {
            return vec![task_id.clone(), task_id.clone()];
        }
        let mut path = vec![target.clone()];
        let mut cursor = self.parent_of(target);
        while let Some(pid) = cursor {
            if pid == task_id || path.len() > self.nodes.len() {
                break;
            }
            path.push(pid.clone());
            cursor = self.parent_of(pid);
        }
        path.push(task_id.clone());
        path.reverse();
        path.push(task_id.clone());
        path
    }

    /// Moves `task_id` and returns its new order key.
    pub fn reparent(
        &mut self,
        task_id: &TaskId,
        new_parent: Option<&TaskId>,
        position_hint: Option<usize>,
    ) -> Result<OrderKey> {
        let placements = self.plan_reparent(task_id, new_parent, position_hint)?;
        let key = placements
            .first()
            .map(|p| p.order_key.clone())
            .ok_or_else(|| TaskError::TaskNotFound(task_id.clone()))?;
        self.apply_placements(&placements)?;
        Ok(key)
    }

    pub fn insert(&mut self, task: Task) -> Result<()> {
        if self.contains(&task.id) {
            return Err(TaskError::validation(format!(
                "task id {} already exists",
                task.id
            )));
        }
        self.nodes.insert(
            task.id.clone(),
            Node {
                task,
                linked_parent: None,
                children: Vec::new(),
            },
        );
        self.relink();
        Ok(())
    }

    /// Removes the listed tasks; returns the records that were present.
    pub fn remove(&mut self, ids: &[TaskId]) -> Vec<Task> {
        let removed: Vec<Task> = ids
            .iter()
            .filter_map(|id| self.nodes.remove(id))
            .map(|n| n.task)
            .collect();
        if !removed.is_empty() {
            self.relink();
        }
        removed
    }

    /// Writes placements and relinks. Every placed task must exist.
    pub fn apply_placements(&mut self, placements: &[Placement]) -> Result<()> {
        if let Some(missing) = placements.iter().find(|p| !self.contains(&p.task_id)) {
            return Err(TaskError::TaskNotFound(missing.task_id.clone()));
        }
        for placement in placements {
            if let Some(task) = self.task_mut(&placement.task_id) {
                task.parent_id = placement.parent_id.clone();
                task.level = placement.level;
                task.order_key = placement.order_key.clone();
            }
        }
        self.relink();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: &str, parent: Option<&str>, key: &str) -> Task {
        Task {
            id: id.into(),
            title: id.to_uppercase(),
            parent_id: parent.map(TaskId::from),
            level: key.split('.').count() as u32 - 1,
            order_key: key.parse().unwrap(),
            status: TaskStatus::Todo,
            progress: 0,
            priority: Priority::Medium,
            dates: DateRange::new(day(2024, 1, 1), day(2024, 1, 31)).unwrap(),
            effort_estimate_h: 0.0,
            assignee: None,
        }
    }

    fn keys(tree: &TaskTree) -> Vec<String> {
        tree.walk()
            .into_iter()
            .map(|(_, t)| t.order_key.to_string())
            .collect()
    }

    #[test]
    fn test_build_orders_siblings_numerically() {
        let tree = TaskTree::build(vec![
            task("a", None, "1"),
            task("j", Some("a"), "1.10"),
            task("b", Some("a"), "1.2"),
            task("c", None, "2"),
        ]);
        assert_eq!(keys(&tree), vec!["1", "1.2", "1.10", "2"]);
        assert_eq!(tree.depth(&"j".into()), 1);
    }

    #[test]
    fn test_orphan_is_shown_as_root() {
        let tree = TaskTree::build(vec![task("a", None, "1"), task("x", Some("gone"), "7.1")]);
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.parent_of(&"x".into()), None);
        assert_eq!(tree.forest().len(), 2);
    }

    #[test]
    fn test_stored_parent_cycle_is_broken() {
        let tree = TaskTree::build(vec![task("a", Some("b"), "1.1"), task("b", Some("a"), "1.1.1")]);
        assert_eq!(tree.walk().len(), 2);
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn test_reparent_appends_under_new_parent() {
        let mut tree = TaskTree::build(vec![
            task("a", None, "1"),
            task("b", Some("a"), "1.1"),
            task("c", Some("a"), "1.2"),
        ]);
        let key = tree.reparent(&"c".into(), Some(&"b".into()), None).unwrap();
        assert_eq!(key.to_string(), "1.1.1");
        let c = tree.get(&"c".into()).unwrap();
        assert_eq!(c.level, 2);
        assert_eq!(c.parent_id, Some("b".into()));
        assert_eq!(tree.children(&"b".into()), &["c".into()]);
    }

    #[test]
    fn test_reparent_rebases_descendants() {
        let mut tree = TaskTree::build(vec![
            task("a", None, "1"),
            task("b", Some("a"), "1.1"),
            task("b1", Some("b"), "1.1.3"),
            task("b2", Some("b1"), "1.1.3.1"),
            task("z", None, "2"),
        ]);
        let placements = tree.plan_reparent(&"b".into(), Some(&"z".into()), None).unwrap();
        assert_eq!(placements[0].task_id, "b".into());
        assert_eq!(placements.len(), 3);
        tree.apply_placements(&placements).unwrap();
        let b2 = tree.get(&"b2".into()).unwrap();
        assert_eq!(b2.order_key.to_string(), "2.1.3.1");
        assert_eq!(b2.level, 3);
        assert_eq!(keys(&tree), vec!["1", "2", "2.1", "2.1.3", "2.1.3.1"]);
    }

    #[test]
    fn test_reparent_into_own_descendant_is_cycle() {
        let tree = TaskTree::build(vec![
            task("a", None, "1"),
            task("b", Some("a"), "1.1"),
            task("c", Some("b"), "1.1.1"),
        ]);
        let err = tree.plan_reparent(&"a".into(), Some(&"c".into()), None).unwrap_err();
        assert_eq!(
            err,
            TaskError::CycleDetected {
                path: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }
        );
        assert!(matches!(
            tree.plan_reparent(&"a".into(), Some(&"a".into()), None),
            Err(TaskError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_reparent_missing_ids() {
        let tree = TaskTree::build(vec![task("a", None, "1")]);
        assert_eq!(
            tree.plan_reparent(&"nope".into(), None, None).unwrap_err(),
            TaskError::TaskNotFound("nope".into())
        );
        assert_eq!(
            tree.plan_reparent(&"a".into(), Some(&"nope".into()), None)
                .unwrap_err(),
            TaskError::TaskNotFound("nope".into())
        );
    }

    #[test]
    fn test_reparent_with_position_renumbers_followers() {
        let mut tree = TaskTree::build(vec![
            task("p", None, "1"),
            task("x", Some("p"), "1.1"),
            task("y", Some("p"), "1.2"),
            task("m", None, "2"),
        ]);
        tree.reparent(&"m".into(), Some(&"p".into()), Some(1)).unwrap();
        let order: Vec<&str> = tree
            .children(&"p".into())
            .iter()
            .map(TaskId::as_str)
            .collect();
        assert_eq!(order, vec!["x", "m", "y"]);
        assert_eq!(tree.get(&"m".into()).unwrap().order_key.to_string(), "1.2");
        assert_eq!(tree.get(&"y".into()).unwrap().order_key.to_string(), "1.3");
        assert_eq!(tree.get(&"x".into()).unwrap().order_key.to_string(), "1.1");
    }

    #[test]
    fn test_position_past_end_appends() {
        let tree = TaskTree::build(vec![
            task("p", None, "1"),
            task("x", Some("p"), "1.4"),
            task("m", None, "2"),
        ]);
        let placements = tree.plan_reparent(&"m".into(), Some(&"p".into()), Some(9)).unwrap();
        assert_eq!(placements[0].order_key.to_string(), "1.5");
    }

    #[test]
    fn test_subtask_inherits_parent_fields() {
        let mut parent = task("a", None, "1");
        parent.priority = Priority::High;
        parent.assignee = Some("sam".into());
        let tree = TaskTree::build(vec![parent, task("b", Some("a"), "1.1")]);
        let sub = tree.plan_subtask(&"a".into(), &NewTask::new("Write tests")).unwrap();
        assert_eq!(sub.order_key.to_string(), "1.2");
        assert_eq!(sub.level, 1);
        assert_eq!(sub.priority, Priority::High);
        assert_eq!(sub.assignee.as_deref(), Some("sam"));
        assert_eq!(sub.dates, tree.get(&"a".into()).unwrap().dates);
        assert_eq!(sub.effort_estimate_h, DEFAULT_SUBTASK_EFFORT_H);
    }

    #[test]
    fn test_subtask_errors() {
        let tree = TaskTree::build(vec![task("a", None, "1")]);
        assert_eq!(
            tree.plan_subtask(&"zz".into(), &NewTask::new("x")).unwrap_err(),
            TaskError::ParentNotFound("zz".into())
        );
        let late = DateRange::new(day(2024, 1, 20), day(2024, 2, 10)).unwrap();
        let err = tree
            .plan_subtask(&"a".into(), &NewTask::new("x").with_dates(late))
            .unwrap_err();
        assert!(matches!(err, TaskError::DateRangeConflict { .. }));
        assert!(tree.plan_subtask(&"a".into(), &NewTask::new(" ")).is_err());
        assert!(tree
            .plan_subtask(&"a".into(), &NewTask::new("x").with_id("a"))
            .is_err());
    }

    #[test]
    fn test_root_defaults_to_one_week() {
        let tree = TaskTree::build(vec![task("a", None, "1"), task("b", None, "3")]);
        let root = tree.plan_root(&NewTask::new("Ship"), day(2024, 5, 1)).unwrap();
        assert_eq!(root.order_key.to_string(), "4");
        assert_eq!(root.dates.start(), day(2024, 5, 1));
        assert_eq!(root.dates.due(), day(2024, 5, 8));
        assert_eq!(root.level, 0);
    }

    #[test]
    fn test_detach_promotes_children() {
        let tree = TaskTree::build(vec![
            task("a", None, "1"),
            task("b", Some("a"), "1.1"),
            task("c", Some("a"), "1.2"),
            task("c1", Some("c"), "1.2.1"),
            task("c2", Some("c"), "1.2.2"),
            task("c2x", Some("c2"), "1.2.2.1"),
        ]);
        let placements = tree.plan_detach(&"c".into()).unwrap();
        let find = |id: &str| placements.iter().find(|p| p.task_id.as_str() == id).unwrap();
        assert_eq!(find("c1").order_key.to_string(), "1.2");
        assert_eq!(find("c2").order_key.to_string(), "1.3");
        assert_eq!(find("c2x").order_key.to_string(), "1.3.1");
        assert_eq!(find("c2x").level, 2);
        assert_eq!(find("c1").parent_id, Some("a".into()));
    }

    #[test]
    fn test_is_descendant_and_remove() {
        let mut tree = TaskTree::build(vec![
            task("a", None, "1"),
            task("b", Some("a"), "1.1"),
            task("c", Some("b"), "1.1.1"),
        ]);
        assert!(tree.is_descendant(&"a".into(), &"c".into()));
        assert!(!tree.is_descendant(&"c".into(), &"a".into()));
        assert_eq!(tree.descendants(&"a".into()), vec!["b".into(), "c".into()]);
        let removed = tree.remove(&["b".into(), "c".into()]);
        assert_eq!(removed.len(), 2);
        assert_eq!(tree.len(), 1);
        assert!(tree.children(&"a".into()).is_empty());
    }
}
