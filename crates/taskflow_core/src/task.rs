//! Task, action and dependency records.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};
use crate::ids::{ActionId, TaskId};
use crate::order_key::OrderKey;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Blocked,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }

    /// Counted as open work in statistics.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Todo | TaskStatus::Doing)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "doing" | "in_progress" => Ok(TaskStatus::Doing),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            other => Err(TaskError::validation(format!("unknown status '{other}'"))),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(TaskError::validation(format!("unknown priority '{other}'"))),
        }
    }
}

/// Inclusive calendar range with `due_date >= start_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start_date: NaiveDate,
    due_date: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start_date: NaiveDate,
    due_date: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = TaskError;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        DateRange::new(raw.start_date, raw.due_date)
    }
}

impl DateRange {
    pub fn new(start_date: NaiveDate, due_date: NaiveDate) -> Result<Self> {
        if due_date < start_date {
            return Err(TaskError::validation(format!(
                "due date {due_date} is before start date {start_date}"
            )));
        }
        Ok(Self {
            start_date,
            due_date,
        })
    }

    /// `start` plus `days` days. Saturates at the calendar maximum.
    pub fn starting(start: NaiveDate, days: u64) -> Self {
        let due_date = start.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
        Self {
            start_date: start,
            due_date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start_date
    }

    pub fn due(&self) -> NaiveDate {
        self.due_date
    }

    pub fn contains(&self, other: &DateRange) -> bool {
        self.start_date <= other.start_date && other.due_date <= self.due_date
    }

    /// Closest range to `self` that fits inside `bounds`.
    pub fn clamp_to(&self, bounds: &DateRange) -> DateRange {
        let start_date = self.start_date.clamp(bounds.start_date, bounds.due_date);
        let due_date = self.due_date.clamp(start_date, bounds.due_date);
        DateRange {
            start_date,
            due_date,
        }
    }

    pub fn duration_days(&self) -> i64 {
        (self.due_date - self.start_date).num_days()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start_date, self.due_date)
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub level: u32,
    pub order_key: OrderKey,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub priority: Priority,
    #[serde(flatten)]
    pub dates: DateRange,
    #[serde(default)]
    pub effort_estimate_h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl Task {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.dates.due() < today && self.status != TaskStatus::Done
    }
}

/// Weighted checklist item. Owned by exactly one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub task_id: TaskId,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    pub weight: f64,
    #[serde(default)]
    pub position: u32,
}

impl Action {
    pub fn new(task_id: TaskId, title: impl Into<String>, weight: f64, position: u32) -> Self {
        Self {
            id: ActionId::new(),
            task_id,
            title: title.into(),
            done: false,
            weight,
            position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Blocks,
    DependsOn,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Blocks => "blocks",
            DependencyKind::DependsOn => "depends_on",
        }
    }
}

/// Directed relation between two tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from_task_id: TaskId,
    pub to_task_id: TaskId,
    pub kind: DependencyKind,
}

impl DependencyEdge {
    pub fn new(from: impl Into<TaskId>, to: impl Into<TaskId>, kind: DependencyKind) -> Self {
        Self {
            from_task_id: from.into(),
            to_task_id: to.into(),
            kind,
        }
    }

    /// `(before, after)` in execution order.
    pub fn precedence(&self) -> (&TaskId, &TaskId) {
        match self.kind {
            DependencyKind::Blocks => (&self.from_task_id, &self.to_task_id),
            DependencyKind::DependsOn => (&self.to_task_id, &self.from_task_id),
        }
    }

    pub fn touches(&self, id: &TaskId) -> bool {
        &self.from_task_id == id || &self.to_task_id == id
    }
}

/// Attributes for a task that does not exist yet.
///
/// Unset fields are filled from the parent (subtasks) or from defaults (root tasks).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_estimate_h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_dates(mut self, dates: DateRange) -> Self {
        self.dates = Some(dates);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_effort(mut self, hours: f64) -> Self {
        self.effort_estimate_h = Some(hours);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(TaskError::validation("title is required"));
        }
        if let Some(h) = self.effort_estimate_h {
            if !h.is_finite() || h < 0.0 {
                return Err(TaskError::validation(format!(
                    "effort estimate must be a non-negative number, got {h}"
                )));
            }
        }
        Ok(())
    }
}
