//! Command dispatch.

pub mod actions;
pub mod tasks;
pub mod view;

use anyhow::Result;
use taskflow_core::Change;

use crate::cli::{Cli, Command};
use crate::session::Session;

pub async fn handle(cli: Cli) -> Result<()> {
    let path = cli.data_path();
    let command = match cli.command {
        Command::Init { force } => return tasks::init(&path, force).await,
        command => command,
    };

    let session = Session::open(&path).await?;
    let writes = match command {
        // Handled before the session opens.
        Command::Init { .. } => false,
        Command::Tree => {
            view::tree(&session);
            false
        }
        Command::Show { task } => {
            view::show(&session, &task)?;
            false
        }
        Command::Stats => {
            view::stats(&session);
            false
        }
        Command::Add(args) => tasks::add(&session, args)?,
        Command::Subtask {
            parent,
            task,
            actions,
        } => tasks::subtask(&session, &parent, task, actions)?,
        Command::Toggle { action } => actions::toggle(&session, &action)?,
        Command::Reparent {
            task,
            parent,
            position,
        } => tasks::reparent(&session, &task, parent.as_deref(), position)?,
        Command::Dates { task, start, due } => tasks::dates(&session, &task, start, due)?,
        Command::Status { task, status } => tasks::status(&session, &task, status)?,
        Command::Progress { task, value } => tasks::progress(&session, &task, value)?,
        Command::Depend {
            from,
            to,
            kind,
            remove,
        } => tasks::depend(&session, &from, &to, kind.into(), remove)?,
        Command::Action { action } => actions::handle(&session, action)?,
        Command::Delete { task, detach } => tasks::delete(&session, &task, detach)?,
        Command::Duplicate { task } => tasks::duplicate(&session, &task)?,
    };

    if writes {
        session.save().await
    } else {
        session.close();
        Ok(())
    }
}

/// One-line summary of a planned change.
pub fn describe(change: &Change) -> String {
    match change {
        Change::InsertTask { task, actions } if actions.is_empty() => {
            format!("created '{}' ({})", task.title, task.id)
        }
        Change::InsertTask { task, actions } => format!(
            "created '{}' ({}) with {} actions",
            task.title,
            task.id,
            actions.len()
        ),
        Change::MoveTasks { placements } => match placements.first() {
            Some(p) => format!(
                "moved {} to {} ({} tasks renumbered)",
                p.task_id,
                p.order_key,
                placements.len()
            ),
            None => "nothing to move".to_string(),
        },
        Change::UpdateDates { task_id, dates } => format!("{task_id} now runs {dates}"),
        Change::UpdateProgress {
            task_id,
            progress,
            status,
        } => format!("{task_id} at {progress}% ({status})"),
        Change::ToggleAction { action_id, done, .. } => {
            let state = if *done { "done" } else { "not done" };
            format!("action {action_id} marked {state}")
        }
        Change::DeleteTasks { task_ids, .. } => format!("deleted {} tasks", task_ids.len()),
        Change::InsertDependency { edge } => format!(
            "{} now {} {}",
            edge.from_task_id,
            edge.kind.as_str(),
            edge.to_task_id
        ),
        Change::DeleteDependency { edge } => format!(
            "removed {} {} {}",
            edge.from_task_id,
            edge.kind.as_str(),
            edge.to_task_id
        ),
        Change::ReplaceActions { task_id, actions } => {
            format!("{task_id} has {} actions", actions.len())
        }
        Change::RenameAction {
            action_id, title, ..
        } => format!("action {action_id} renamed to '{title}'"),
    }
}
