//! Task-level writes: create, move, reschedule, status and dependencies.

use std::path::Path;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use taskflow_core::{
    Change, DateRange, DeleteMode, DependencyEdge, DependencyKind, NewTask, TaskId, TaskStatus,
};

use super::describe;
use crate::cli::TaskArgs;
use crate::output;
use crate::session::{self, Session};

pub async fn init(path: &Path, force: bool) -> Result<()> {
    session::init_file(path, force).await?;
    output::success(&format!("Created {}", path.display()));
    Ok(())
}

fn new_task(args: TaskArgs) -> Result<NewTask> {
    let mut task = NewTask::new(args.title);
    if let Some(id) = args.id {
        task = task.with_id(id);
    }
    match (args.start, args.due) {
        (Some(start), Some(due)) => task = task.with_dates(DateRange::new(start, due)?),
        (None, None) => {}
        _ => bail!("--start and --due must be given together"),
    }
    if let Some(priority) = args.priority {
        task = task.with_priority(priority);
    }
    if let Some(hours) = args.effort {
        task = task.with_effort(hours);
    }
    if let Some(assignee) = args.assignee {
        task = task.with_assignee(assignee);
    }
    Ok(task)
}

fn report(change: &Change) -> bool {
    output::success(&describe(change));
    output::data("change", change);
    true
}

pub fn add(session: &Session, args: TaskArgs) -> Result<bool> {
    let change = session.controller().create_task(new_task(args)?)?;
    Ok(report(&change))
}

pub fn subtask(
    session: &Session,
    parent: &str,
    args: TaskArgs,
    actions: Vec<String>,
) -> Result<bool> {
    let parent = TaskId::from(parent);
    let task = new_task(args)?;
    let change = if actions.is_empty() {
        session.controller().create_subtask(&parent, task)?
    } else {
        session
            .controller()
            .create_subtask_with_actions(&parent, task, actions)?
    };
    Ok(report(&change))
}

pub fn reparent(
    session: &Session,
    task: &str,
    parent: Option<&str>,
    position: Option<usize>,
) -> Result<bool> {
    let parent = parent.map(TaskId::from);
    let change = session
        .controller()
        .reparent_task(&TaskId::from(task), parent.as_ref(), position)?;
    Ok(report(&change))
}

pub fn dates(session: &Session, task: &str, start: NaiveDate, due: NaiveDate) -> Result<bool> {
    let change = session
        .controller()
        .set_date_range(&TaskId::from(task), DateRange::new(start, due)?)?;
    Ok(report(&change))
}

pub fn status(session: &Session, task: &str, status: TaskStatus) -> Result<bool> {
    let change = session.controller().set_status(&TaskId::from(task), status)?;
    Ok(report(&change))
}

pub fn progress(session: &Session, task: &str, value: u8) -> Result<bool> {
    let change = session.controller().set_progress(&TaskId::from(task), value)?;
    Ok(report(&change))
}

pub fn depend(
    session: &Session,
    from: &str,
    to: &str,
    kind: DependencyKind,
    remove: bool,
) -> Result<bool> {
    let edge = DependencyEdge::new(from, to, kind);
    let change = if remove {
        session.controller().remove_dependency(edge)?
    } else {
        session.controller().add_dependency(edge)?
    };
    Ok(report(&change))
}

pub fn delete(session: &Session, task: &str, detach: bool) -> Result<bool> {
    let mode = if detach {
        DeleteMode::Detach
    } else {
        DeleteMode::Cascade
    };
    let change = session.controller().delete_task(&TaskId::from(task), mode)?;
    Ok(report(&change))
}

pub fn duplicate(session: &Session, task: &str) -> Result<bool> {
    let change = session.controller().duplicate_task(&TaskId::from(task))?;
    Ok(report(&change))
}
