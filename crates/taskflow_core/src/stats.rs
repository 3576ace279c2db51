//! Summary counters over the task view.

use chrono::NaiveDate;
use serde::Serialize;

use crate::hierarchy::TaskTree;
use crate::task::{Action, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub roots: usize,
    pub subtasks: usize,
    pub max_depth: usize,
    /// `todo` or `doing`.
    pub active: usize,
    pub blocked: usize,
    pub done: usize,
    /// Due before the reference day and not done.
    pub overdue: usize,
    pub actions: usize,
    pub actions_done: usize,
}

impl TaskStats {
    pub fn compute<'a>(
        tree: &TaskTree,
        actions: impl IntoIterator<Item = &'a Action>,
        today: NaiveDate,
    ) -> Self {
        let mut stats = TaskStats {
            roots: tree.roots().len(),
            ..Default::default()
        };
        for (depth, task) in tree.walk() {
            stats.total += 1;
            stats.max_depth = stats.max_depth.max(depth);
            if depth > 0 {
                stats.subtasks += 1;
            }
            if task.status.is_active() {
                stats.active += 1;
            }
            match task.status {
                TaskStatus::Done => stats.done += 1,
                TaskStatus::Blocked => stats.blocked += 1,
                _ => {}
            }
            if task.is_overdue(today) {
                stats.overdue += 1;
            }
        }
        for action in actions {
            stats.actions += 1;
            if action.done {
                stats.actions_done += 1;
            }
        }
        stats
    }

    /// Share of tasks marked done, in percent.
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.done as f64 * 100.0 / self.total as f64
    }
}
