//! Shared fixtures for controller tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use taskflow_core::{
    ActionId, Change, Command, DependencyEdge, DependencyKind, NewTask, Snapshot, TaskGraph,
};
use taskflow_store::{Ack, ChangeNotice, ClientId, MemoryStore, Scope, TaskStore};
use tokio::sync::broadcast;
use taskflow_sync::{EventRx, SyncConfig, SyncController, SyncEvent};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

pub fn scope() -> Scope {
    Scope::new("acme", "alice")
}

/// Short debounce so tests settle quickly.
pub fn config() -> SyncConfig {
    SyncConfig::new()
        .with_debounce(Duration::from_millis(20))
        .with_reference_day(today())
}

pub fn run(graph: &mut TaskGraph, command: Command) -> Change {
    let change = graph.plan(&command, today()).unwrap();
    graph.apply(&change).unwrap();
    change
}

/// `plan` with subtasks `design` and `build`; `design` has actions
/// `Sketch` and `Review`, added without weights so they share 50/50, and
/// blocks `build`.
pub fn sample_snapshot() -> Snapshot {
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
                weight: None,
            },
        );
    }
    run(
        &mut graph,
        Command::AddDependency {
            edge: DependencyEdge::new("design", "build", DependencyKind::Blocks),
        },
    );
    graph.to_snapshot()
}

pub async fn seeded_store(latency: Duration) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new().with_latency(latency));
    store.load(&scope(), sample_snapshot()).await;
    store
}

/// Controller over `store`, already loaded.
pub async fn loaded(store: &Arc<MemoryStore>, config: SyncConfig) -> SyncController {
    let controller = SyncController::start(store.clone(), scope(), config);
    controller.load().await.unwrap();
    controller
}

#[allow(dead_code)]
pub fn action_id(controller: &SyncController, title: &str) -> ActionId {
    controller
        .actions(&"design".into())
        .into_iter()
        .find(|a| a.title == title)
        .map(|a| a.id)
        .unwrap()
}

/// Reads from `inner` right away but answers only after `delay`, so a write
/// can commit while an older fetch result is still on its way.
#[allow(dead_code)]
pub struct SlowReads {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[allow(dead_code)]
impl SlowReads {
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl TaskStore for SlowReads {
    async fn fetch(&self, scope: &Scope) -> taskflow_store::Result<Snapshot> {
        let read = self.inner.fetch(scope).await;
        tokio::time::sleep(self.delay).await;
        read
    }

    async fn mutate(
        &self,
        scope: &Scope,
        change: &Change,
        origin: Option<&ClientId>,
    ) -> taskflow_store::Result<Ack> {
        self.inner.mutate(scope, change, origin).await
    }

    fn subscribe(&self, scope: &Scope) -> broadcast::Receiver<ChangeNotice> {
        self.inner.subscribe(scope)
    }
}

/// Root-task change planned against the store's current data, as another
/// client would send it.
#[allow(dead_code)]
pub async fn foreign_root(store: &MemoryStore, id: &str) -> Change {
    let mut graph = TaskGraph::from_snapshot(store.snapshot(&scope()).await);
    run(
        &mut graph,
        Command::CreateTask {
            task: NewTask::new(id).with_id(id),
        },
    )
}

/// Events up to and including the first one matching `pred`.
#[allow(dead_code)]
pub async fn wait_for(rx: &mut EventRx, pred: impl Fn(&SyncEvent) -> bool) -> Vec<SyncEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let hit = pred(&event);
                    seen.push(event);
                    if hit {
                        return;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event");
    seen
}

#[allow(dead_code)]
pub fn drain(rx: &mut EventRx) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}
