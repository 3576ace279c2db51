//! The synchronization controller.
//!
//! Owns the local [`TaskGraph`] view, the snapshot cache and the per-entity
//! dispatch table. Commands are planned and applied to the view synchronously,
//! then dispatched to the store in the background. Store refusals and change-feed
//! notices lead to a full re-fetch that replaces the view.
//!
//! The view lock is a `std::sync::Mutex` and is never held across an await.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use taskflow_core::{
    Action, ActionId, Change, Command, DateRange, DeleteMode, Derived, DependencyEdge,
    EntityKey, NewTask, Snapshot, Task, TaskGraph, TaskId, TaskStats, TaskStatus, TreeNode,
};
use taskflow_observability::store_span;
use taskflow_store::{
    CacheMetrics, ClientId, Clock, Scope, SnapshotCache, SystemClock, TaskStore,
};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info};

use crate::config::SyncConfig;
use crate::dispatch;
use crate::entity::{EntityState, EntityTable, Queued};
use crate::error::{Result, SyncError};
use crate::events::{EventRx, EventTx, SyncEvent, event_bus};
use crate::reconcile::{self, ReconcileTrigger};

pub(crate) struct ViewState {
    pub view: TaskGraph,
    pub entities: EntityTable,
    /// Bumped every time the view is replaced by fetched data
    pub view_version: u64,
    /// Generation of the store fetch currently running, if any
    pub fetching: Option<u64>,
    /// A change was acknowledged after `fetching` started reading.
    pub acked_during_fetch: bool,
}

/// Result of [`Inner::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Installed {
    Current,
    /// Replaced, but a change was acknowledged while the fetch ran and may be
    /// missing. A follow-up fetch is already queued.
    Behind,
    /// A newer fetch started; the view was left alone.
    Superseded,
}

pub(crate) struct Inner {
    pub store: Arc<dyn TaskStore>,
    pub scope: Scope,
    pub client_id: ClientId,
    pub config: SyncConfig,
    pub cache: SnapshotCache,
    pub events: EventTx,
    pub cancel: CancellationToken,
    state: Mutex<ViewState>,
    triggers: mpsc::UnboundedSender<ReconcileTrigger>,
    /// Running dispatchers plus reconciliation triggers not yet served
    outstanding: AtomicUsize,
    settle: Notify,
    fetch_generation: AtomicU64,
}

impl Inner {
    pub fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn begin_work(&self, n: usize) {
        self.outstanding.fetch_add(n, Ordering::SeqCst);
    }

    pub fn finish_work(&self, n: usize) {
        if self.outstanding.fetch_sub(n, Ordering::SeqCst) == n {
            self.settle.notify_waiters();
        }
    }

    pub fn trigger(&self, trigger: ReconcileTrigger) {
        self.begin_work(1);
        if self.triggers.send(trigger).is_err() {
            self.finish_work(1);
        }
    }

    /// Starts a fetch. Only the result of the latest generation may be installed.
    pub fn next_generation(&self) -> u64 {
        self.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Like [`Inner::next_generation`] for a fetch that reads the store.
    /// Acknowledgements arriving before it resolves are tracked.
    pub fn begin_fetch(&self) -> u64 {
        let mut state = self.lock();
        let generation = self.next_generation();
        state.fetching = Some(generation);
        state.acked_during_fetch = false;
        generation
    }

    /// Marks a fetch that failed or was dropped as no longer running.
    pub fn end_fetch(&self, generation: u64) {
        let mut state = self.lock();
        if state.fetching == Some(generation) {
            state.fetching = None;
        }
    }

    /// Records an acknowledged change: invalidates the cached collections it
    /// touched and confirms it in the entity table. Returns the number of
    /// changes still queued for `entity` and whether the view may be missing
    /// the change, which is the case when a fetch is running or the view was
    /// replaced since the change was applied.
    pub fn acknowledge(&self, entity: &EntityKey, queued: &Queued) -> (usize, bool) {
        let mut state = self.lock();
        // Under the view lock so a fetch finishing now cannot cache the old data after this.
        self.cache.invalidate(&self.scope, &queued.change.resources());
        let remaining = state.entities.confirm(entity);
        let fetching = state.fetching.is_some();
        if fetching {
            state.acked_during_fetch = true;
        }
        (remaining, fetching || state.view_version != queued.view_version)
    }

    /// Replaces the view wholesale. Fetched data is written to the cache
    /// unless it may predate an acknowledged change.
    pub fn install(&self, generation: u64, snapshot: Snapshot, fetched: bool) -> Installed {
        let mut state = self.lock();
        if self.fetch_generation.load(Ordering::SeqCst) != generation {
            return Installed::Superseded;
        }
        let behind = state.fetching == Some(generation) && state.acked_during_fetch;
        if state.fetching == Some(generation) {
            state.fetching = None;
            state.acked_during_fetch = false;
        }
        if fetched && !behind {
            self.cache.put(&self.scope, &snapshot);
        }
        state.view = TaskGraph::from_snapshot(snapshot);
        state.view_version += 1;
        let cleared = state.entities.settle_rolled_back();
        debug!(
            generation,
            view_version = state.view_version,
            cleared,
            behind,
            "view replaced"
        );
        if behind {
            Installed::Behind
        } else {
            Installed::Current
        }
    }
}

/// Client-side owner of the task view for one scope.
///
/// Must be started inside a Tokio runtime. Dropping the controller stops its
/// background tasks.
pub struct SyncController {
    inner: Arc<Inner>,
}

impl SyncController {
    pub fn start(store: Arc<dyn TaskStore>, scope: Scope, config: SyncConfig) -> Self {
        Self::start_with_clock(store, scope, config, Arc::new(SystemClock))
    }

    /// Like [`SyncController::start`] with the cache reading time from `clock`.
    pub fn start_with_clock(
        store: Arc<dyn TaskStore>,
        scope: Scope,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = event_bus(config.event_capacity);
        let (triggers, trigger_rx) = mpsc::unbounded_channel();
        let feed = store.subscribe(&scope);
        let client_id = ClientId::new();

        let inner = Arc::new(Inner {
            cache: SnapshotCache::new(config.cache.clone(), clock),
            store,
            scope,
            client_id,
            config,
            events,
            cancel: CancellationToken::new(),
            state: Mutex::new(ViewState {
                view: TaskGraph::new(),
                entities: EntityTable::default(),
                view_version: 0,
                fetching: None,
                acked_during_fetch: false,
            }),
            triggers,
            outstanding: AtomicUsize::new(0),
            settle: Notify::new(),
            fetch_generation: AtomicU64::new(0),
        });

        tokio::spawn(reconcile::run(Arc::clone(&inner), trigger_rx));
        tokio::spawn(reconcile::listen(Arc::clone(&inner), feed));

        info!(
            scope = %inner.scope,
            client = %inner.client_id,
            "sync controller started"
        );
        Self { inner }
    }

    /// Fills the view from the cache, or from the store when any cached
    /// collection is missing or expired.
    pub async fn load(&self) -> Result<()> {
        let inner = &self.inner;
        if let Some(snapshot) = inner.cache.get(&inner.scope) {
            let generation = inner.next_generation();
            inner.install(generation, snapshot, false);
            debug!(scope = %inner.scope, "view loaded from cache");
            return Ok(());
        }

        let generation = inner.begin_fetch();
        let span = store_span!("controller", "load", inner.scope.tenant_id.as_str());
        let snapshot = match inner.store.fetch(&inner.scope).instrument(span).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                inner.end_fetch(generation);
                return Err(e.into());
            }
        };
        let tasks = snapshot.tasks.len();
        if inner.install(generation, snapshot, true) != Installed::Superseded {
            info!(scope = %inner.scope, tasks, "view loaded from store");
        }
        Ok(())
    }

    /// True when the cached copy of any collection is missing or expired.
    pub fn is_stale(&self) -> bool {
        self.inner.cache.is_stale(&self.inner.scope)
    }

    /// Validates and applies `command` to the local view, then queues the
    /// resulting change for the store. Never waits for the store.
    ///
    /// A rejected command leaves the view untouched and dispatches nothing.
    pub fn apply_optimistic(&self, command: Command) -> Result<Change> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(SyncError::Shutdown);
        }
        let today = inner.config.today();

        let (change, start) = {
            let mut state = inner.lock();
            let change = match state.view.plan(&command, today) {
                Ok(change) => change,
                Err(e) => {
                    debug!(command = command.name(), error = %e, "command rejected");
                    return Err(e.into());
                }
            };
            state.view.apply(&change)?;
            let queued = Queued {
                change: change.clone(),
                view_version: state.view_version,
            };
            let start = state.entities.enqueue(change.entity(), queued);
            (change, start)
        };

        let entity = change.entity();
        debug!(entity = %entity, change = change.kind(), "applied optimistically");
        inner.emit(SyncEvent::applied(&entity, change.kind()));
        if start {
            dispatch::spawn(Arc::clone(inner), entity);
        }
        Ok(change)
    }

    pub fn create_task(&self, task: NewTask) -> Result<Change> {
        self.apply_optimistic(Command::CreateTask { task })
    }

    pub fn create_subtask(&self, parent_id: &TaskId, task: NewTask) -> Result<Change> {
        self.apply_optimistic(Command::CreateSubtask {
            parent_id: parent_id.clone(),
            task,
        })
    }

    /// Subtask with one action per title, weights spread equally.
    pub fn create_subtask_with_actions(
        &self,
        parent_id: &TaskId,
        task: NewTask,
        actions: Vec<String>,
    ) -> Result<Change> {
        self.apply_optimistic(Command::CreateSubtaskWithActions {
            parent_id: parent_id.clone(),
            task,
            actions,
        })
    }

    pub fn duplicate_task(&self, task_id: &TaskId) -> Result<Change> {
        self.apply_optimistic(Command::DuplicateTask {
            task_id: task_id.clone(),
        })
    }

    pub fn toggle_action(&self, action_id: &ActionId) -> Result<Change> {
        self.apply_optimistic(Command::ToggleAction {
            action_id: action_id.clone(),
        })
    }

    /// Appends an action. Without `weight`, every action of the task ends up
    /// with an equal share.
    pub fn add_action(
        &self,
        task_id: &TaskId,
        title: impl Into<String>,
        weight: Option<f64>,
    ) -> Result<Change> {
        self.apply_optimistic(Command::AddAction {
            task_id: task_id.clone(),
            title: title.into(),
            weight,
        })
    }

    pub fn remove_action(&self, action_id: &ActionId) -> Result<Change> {
        self.apply_optimistic(Command::RemoveAction {
            action_id: action_id.clone(),
        })
    }

    pub fn rename_action(&self, action_id: &ActionId, title: impl Into<String>) -> Result<Change> {
        self.apply_optimistic(Command::RenameAction {
            action_id: action_id.clone(),
            title: title.into(),
        })
    }

    pub fn distribute_weights(&self, task_id: &TaskId) -> Result<Change> {
        self.apply_optimistic(Command::DistributeWeights {
            task_id: task_id.clone(),
        })
    }

    pub fn reparent_task(
        &self,
        task_id: &TaskId,
        new_parent_id: Option<&TaskId>,
        position_hint: Option<usize>,
    ) -> Result<Change> {
        self.apply_optimistic(Command::ReparentTask {
            task_id: task_id.clone(),
            new_parent_id: new_parent_id.cloned(),
            position_hint,
        })
    }

    pub fn set_date_range(&self, task_id: &TaskId, dates: DateRange) -> Result<Change> {
        self.apply_optimistic(Command::SetDateRange {
            task_id: task_id.clone(),
            dates,
        })
    }

    pub fn set_status(&self, task_id: &TaskId, status: TaskStatus) -> Result<Change> {
        self.apply_optimistic(Command::SetStatus {
            task_id: task_id.clone(),
            status,
        })
    }

    pub fn set_progress(&self, task_id: &TaskId, progress: u8) -> Result<Change> {
        self.apply_optimistic(Command::SetProgress {
            task_id: task_id.clone(),
            progress,
        })
    }

    pub fn delete_task(&self, task_id: &TaskId, mode: DeleteMode) -> Result<Change> {
        self.apply_optimistic(Command::DeleteTask {
            task_id: task_id.clone(),
            mode,
        })
    }

    pub fn add_dependency(&self, edge: DependencyEdge) -> Result<Change> {
        self.apply_optimistic(Command::AddDependency { edge })
    }

    pub fn remove_dependency(&self, edge: DependencyEdge) -> Result<Change> {
        self.apply_optimistic(Command::RemoveDependency { edge })
    }

    /// Asks for a full re-fetch, subject to the debounce window.
    pub fn request_reconcile(&self) {
        self.inner.trigger(ReconcileTrigger::Requested);
    }

    /// Resolves once no dispatch or reconciliation is outstanding, or the
    /// controller has shut down.
    pub async fn settled(&self) {
        let inner = &self.inner;
        loop {
            let notified = inner.settle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if inner.outstanding.load(Ordering::SeqCst) == 0 || inner.cancel.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = inner.cancel.cancelled() => return,
            }
        }
    }

    pub fn forest(&self) -> Vec<TreeNode> {
        self.inner.lock().view.forest()
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.inner.lock().view.task(id).cloned()
    }

    pub fn actions(&self, task_id: &TaskId) -> Vec<Action> {
        self.inner.lock().view.actions(task_id).to_vec()
    }

    /// Current `(progress, status)` of a task.
    pub fn derived(&self, task_id: &TaskId) -> Option<Derived> {
        self.inner.lock().view.derived(task_id)
    }

    pub fn dependencies(&self) -> Vec<DependencyEdge> {
        self.inner.lock().view.dependencies().edges().to_vec()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().view.to_snapshot()
    }

    pub fn stats(&self) -> TaskStats {
        let today = self.inner.config.today();
        self.inner.lock().view.stats(today)
    }

    pub fn entity_state(&self, key: &EntityKey) -> EntityState {
        self.inner.lock().entities.state(key)
    }

    /// Entities that are not clean.
    pub fn entity_states(&self) -> Vec<(EntityKey, EntityState)> {
        self.inner.lock().entities.states()
    }

    /// Changes applied locally that have not been sent yet.
    pub fn queued_changes(&self) -> usize {
        self.inner.lock().entities.outstanding()
    }

    pub fn subscribe(&self) -> EventRx {
        self.inner.events.subscribe()
    }

    pub fn client_id(&self) -> &ClientId {
        &self.inner.client_id
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.inner.cache.inner().metrics()
    }

    /// Stops background work. Queued changes are not sent.
    pub fn shutdown(&self) {
        if !self.inner.cancel.is_cancelled() {
            self.inner.cancel.cancel();
            info!(scope = %self.inner.scope, "sync controller stopped");
        }
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("scope", &self.inner.scope)
            .field("client_id", &self.inner.client_id)
            .field("outstanding", &self.inner.outstanding.load(Ordering::SeqCst))
            .finish()
    }
}
