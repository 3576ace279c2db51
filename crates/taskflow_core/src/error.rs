use thiserror::Error;

use crate::ids::{ActionId, TaskId};
use crate::task::DateRange;

/// Local validation failures. All of them block a command before anything is applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(
        "date range {child} falls outside {parent} of parent task '{parent_title}' (suggested: {suggested})"
    )]
    DateRangeConflict {
        child: DateRange,
        parent: DateRange,
        parent_title: String,
        suggested: DateRange,
    },

    #[error("cycle detected: {}", join_path(.path))]
    CycleDetected { path: Vec<TaskId> },

    #[error("parent task not found: {0}")]
    ParentNotFound(TaskId),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("action not found: {0}")]
    ActionNotFound(ActionId),
}

impl TaskError {
    pub fn validation(message: impl Into<String>) -> Self {
        TaskError::Validation(message.into())
    }

    /// Corrective range carried by a date conflict. Advisory only.
    pub fn suggestion(&self) -> Option<&DateRange> {
        match self {
            TaskError::DateRangeConflict { suggested, .. } => Some(suggested),
            _ => None,
        }
    }
}

fn join_path(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validation_error() {
        let err = TaskError::validation("malformed order key '1..2'");
        assert_eq!(err.to_string(), "validation error: malformed order key '1..2'");
    }

    #[test]
    fn test_cycle_error_lists_path() {
        let err = TaskError::CycleDetected {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cycle detected: a -> b -> a");
    }

    #[test]
    fn test_date_conflict_carries_suggestion() {
        let parent = DateRange::new(day(2024, 1, 1), day(2024, 1, 31)).unwrap();
        let child = DateRange::new(day(2024, 1, 15), day(2024, 2, 5)).unwrap();
        let suggested = DateRange::new(day(2024, 1, 15), day(2024, 1, 31)).unwrap();
        let err = TaskError::DateRangeConflict {
            child,
            parent,
            parent_title: "Launch".into(),
            suggested,
        };
        assert_eq!(err.suggestion(), Some(&suggested));
        assert!(err.to_string().contains("'Launch'"));
        assert!(err.to_string().contains("2024-01-15..2024-01-31"));
    }
}
