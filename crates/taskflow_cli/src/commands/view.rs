//! Read-only views: tree, show and stats.

use anyhow::{Result, bail};
use comfy_table::{Cell, Table};
use serde::Serialize;
use taskflow_core::{Action, DependencyEdge, Task, TaskId, TreeNode};

use crate::output;
use crate::session::Session;

pub fn tree(session: &Session) {
    let forest = session.controller().forest();
    if output::is_json() {
        output::data("tree", &forest);
        return;
    }
    if forest.is_empty() {
        output::dim("No tasks yet. Add one with `taskflow add <title>`.");
        return;
    }
    let mut table = output::table(&["Key", "Title", "Status", "Progress", "Dates", "Id"]);
    for node in &forest {
        add_rows(&mut table, node);
    }
    println!("{table}");
}

fn add_rows(table: &mut Table, node: &TreeNode) {
    let task = &node.task;
    table.add_row(vec![
        Cell::new(&task.order_key),
        Cell::new(format!("{}{}", "  ".repeat(node.depth), task.title)),
        output::status_cell(task.status),
        Cell::new(output::progress_bar(task.progress)),
        Cell::new(task.dates),
        Cell::new(task.id.as_str()),
    ]);
    for child in &node.children {
        add_rows(table, child);
    }
}

#[derive(Serialize)]
struct TaskDetail<'a> {
    task: &'a Task,
    actions: &'a [Action],
    dependencies: Vec<&'a DependencyEdge>,
}

pub fn show(session: &Session, id: &str) -> Result<()> {
    let task_id = TaskId::from(id);
    let Some(task) = session.controller().task(&task_id) else {
        bail!("task not found: {id}");
    };
    let actions = session.controller().actions(&task_id);
    let edges = session.controller().dependencies();
    let dependencies: Vec<&DependencyEdge> =
        edges.iter().filter(|e| e.touches(&task_id)).collect();

    if output::is_json() {
        output::data(
            "task",
            &TaskDetail {
                task: &task,
                actions: &actions,
                dependencies,
            },
        );
        return Ok(());
    }

    output::header(&task.title);
    output::kv("id", task.id.as_str());
    output::kv("key", &task.order_key.to_string());
    if let Some(parent) = &task.parent_id {
        output::kv("parent", parent.as_str());
    }
    output::kv("status", task.status.as_str());
    output::kv("progress", &output::progress_bar(task.progress));
    output::kv("priority", task.priority.as_str());
    output::kv("dates", &task.dates.to_string());
    output::kv("effort", &format!("{}h", task.effort_estimate_h));
    if let Some(assignee) = &task.assignee {
        output::kv("assignee", assignee);
    }

    for action in &actions {
        let mark = if action.done { "[x]" } else { "[ ]" };
        output::kv(mark, &format!("{} ({:.1}) {}", action.title, action.weight, action.id));
    }
    for edge in dependencies {
        output::kv(
            edge.kind.as_str(),
            &format!("{} -> {}", edge.from_task_id, edge.to_task_id),
        );
    }
    Ok(())
}

pub fn stats(session: &Session) {
    let stats = session.controller().stats();
    if output::is_json() {
        output::data("stats", &stats);
        return;
    }
    output::header("Tasks");
    output::kv("total", &stats.total.to_string());
    output::kv("roots", &stats.roots.to_string());
    output::kv("subtasks", &stats.subtasks.to_string());
    output::kv("max depth", &stats.max_depth.to_string());
    output::kv("active", &stats.active.to_string());
    output::kv("blocked", &stats.blocked.to_string());
    output::kv("done", &stats.done.to_string());
    output::kv("overdue", &stats.overdue.to_string());
    output::kv(
        "actions",
        &format!("{}/{} done", stats.actions_done, stats.actions),
    );
    output::kv(
        "completion",
        &format!("{:.0}%", stats.completion_rate()),
    );
}
