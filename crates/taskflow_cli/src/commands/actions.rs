//! `taskflow action` subcommands and `taskflow toggle`.

use anyhow::{Result, bail};
use comfy_table::Cell;
use taskflow_core::{ActionId, Change, TaskId};

use super::describe;
use crate::cli::ActionCommand;
use crate::output;
use crate::session::Session;

pub fn handle(session: &Session, action: ActionCommand) -> Result<bool> {
    match action {
        ActionCommand::List { task } => {
            list(session, &task)?;
            Ok(false)
        }
        ActionCommand::Add {
            task,
            title,
            weight,
        } => add(session, &task, &title, weight),
        ActionCommand::Remove { action } => {
            let change = session.controller().remove_action(&ActionId::from(action))?;
            Ok(report(session, &change))
        }
        ActionCommand::Rename { action, title } => {
            let change = session
                .controller()
                .rename_action(&ActionId::from(action), title)?;
            Ok(report(session, &change))
        }
        ActionCommand::Spread { task } => {
            let change = session
                .controller()
                .distribute_weights(&TaskId::from(task))?;
            Ok(report(session, &change))
        }
    }
}

fn list(session: &Session, task: &str) -> Result<()> {
    let task_id = TaskId::from(task);
    let Some(owner) = session.controller().task(&task_id) else {
        bail!("task not found: {task}");
    };
    let actions = session.controller().actions(&task_id);

    if output::is_json() {
        output::data("actions", &actions);
        return Ok(());
    }

    output::header(&format!("{} ({}%)", owner.title, owner.progress));
    if actions.is_empty() {
        output::dim("No actions.");
        return Ok(());
    }
    let mut table = output::table(&["Id", "Done", "Weight", "Title"]);
    for action in &actions {
        let done = if action.done { "x" } else { "" };
        table.add_row(vec![
            Cell::new(action.id.as_str()),
            Cell::new(done),
            Cell::new(format!("{:.1}", action.weight)),
            Cell::new(&action.title),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn add(session: &Session, task: &str, title: &str, weight: Option<f64>) -> Result<bool> {
    let change = session
        .controller()
        .add_action(&TaskId::from(task), title, weight)?;
    Ok(report(session, &change))
}

pub fn toggle(session: &Session, action: &str) -> Result<bool> {
    let change = session.controller().toggle_action(&ActionId::from(action))?;
    Ok(report(session, &change))
}

/// Prints the change plus the owning task's new progress.
fn report(session: &Session, change: &Change) -> bool {
    output::success(&describe(change));
    output::data("change", change);

    let owner = match change {
        Change::ToggleAction { task_id, .. }
        | Change::ReplaceActions { task_id, .. }
        | Change::RenameAction { task_id, .. } => Some(task_id),
        _ => None,
    };
    if let Some(derived) = owner.and_then(|id| session.controller().derived(id)) {
        if output::is_json() {
            output::data("progress", &derived);
        } else {
            output::kv("progress", &format!("{}% ({})", derived.progress, derived.status));
        }
    }
    true
}
