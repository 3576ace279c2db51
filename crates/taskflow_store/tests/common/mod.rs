//! Shared fixtures for store tests.

use chrono::NaiveDate;
use taskflow_core::{
    Change, Command, DependencyEdge, DependencyKind, NewTask, Snapshot, TaskGraph,
};
use taskflow_store::{MemoryStore, Scope};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

pub fn scope() -> Scope {
    Scope::new("acme", "alice")
}

/// Plans and applies `command`, returning the change.
pub fn run(graph: &mut TaskGraph, command: Command) -> Change {
    let change = graph
        .plan(&command, today())
        .unwrap_or_else(|e| panic!("{} failed: {e}", command.name()));
    graph.apply(&change).unwrap();
    change
}

/// `plan` with subtasks `design` and `build`; `design` has two actions and blocks `build`.
pub fn sample_graph() -> TaskGraph {
    let mut graph = TaskGraph::new();
    run(
        &mut graph,
        Command::CreateTask {
            task: NewTask::new("Plan").with_id("plan"),
        },
    );
    for id in ["design", "build"] {
        run(
            &mut graph,
            Command::CreateSubtask {
                parent_id: "plan".into(),
                task: NewTask::new(id).with_id(id),
            },
        );
    }
    for title in ["Sketch", "Review"] {
        run(
            &mut graph,
            Command::AddAction {
                task_id: "design".into(),
                title: title.into(),
                weight: Some(50.0),
            },
        );
    }
    run(
        &mut graph,
        Command::AddDependency {
            edge: DependencyEdge::new("design", "build", DependencyKind::Blocks),
        },
    );
    graph
}

#[allow(dead_code)]
pub fn sample_snapshot() -> Snapshot {
    sample_graph().to_snapshot()
}

#[allow(dead_code)]
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.load(&scope(), sample_snapshot()).await;
    store
}
