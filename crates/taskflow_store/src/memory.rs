//! In-process authoritative store.
//!
//! Holds one [`TaskGraph`] per tenant and a version counter. Every accepted change
//! bumps the version and is announced on the change feed. Changes that no longer
//! apply (missing task, duplicate id) are rejected as concurrency conflicts.
//!
//! Latency and one-shot faults can be injected to exercise the client side.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskflow_core::{Change, Snapshot, TaskGraph, TaskId};
use taskflow_observability::{record_error, store_span};
use tokio::sync::{RwLock, broadcast};
use tracing::{Instrument, debug};

use crate::error::{Result, StoreError};
use crate::identity::Scope;
use crate::store::{Ack, ChangeNotice, ClientId, TaskStore};

const FEED_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct TenantState {
    graph: TaskGraph,
    version: u64,
}

/// A change accepted by the store, in commit order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedChange {
    pub tenant_id: String,
    /// Store version the change produced
    pub version: u64,
    /// Principal that wrote it
    pub principal_id: String,
    pub origin: Option<ClientId>,
    pub changed_at: DateTime<Utc>,
    pub change: Change,
}

#[derive(Debug)]
pub struct MemoryStore {
    tenants: RwLock<HashMap<String, TenantState>>,
    feed: broadcast::Sender<ChangeNotice>,
    mutation_faults: Mutex<VecDeque<StoreError>>,
    fetch_faults: Mutex<VecDeque<StoreError>>,
    latency: Mutex<Duration>,
    fetches: AtomicUsize,
    log: Mutex<Vec<LoggedChange>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn take_fault(queue: &Mutex<VecDeque<StoreError>>) -> Option<StoreError> {
    queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            tenants: RwLock::new(HashMap::new()),
            feed,
            mutation_faults: Mutex::new(VecDeque::new()),
            fetch_faults: Mutex::new(VecDeque::new()),
            latency: Mutex::new(Duration::ZERO),
            fetches: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Delay applied to every `fetch` and `mutate` call.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Queues an error returned by the next `mutate` call instead of applying it.
    pub fn fail_next_mutation(&self, error: StoreError) {
        self.mutation_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
    }

    /// Queues an error returned by the next `fetch` call.
    pub fn fail_next_fetch(&self, error: StoreError) {
        self.fetch_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
    }

    /// Replaces the tenant's data. No notice is sent.
    pub async fn load(&self, scope: &Scope, snapshot: Snapshot) {
        let mut tenants = self.tenants.write().await;
        let state = tenants.entry(scope.tenant_id.clone()).or_default();
        state.graph = TaskGraph::from_snapshot(snapshot);
        state.version += 1;
    }

    pub async fn snapshot(&self, scope: &Scope) -> Snapshot {
        let tenants = self.tenants.read().await;
        tenants
            .get(&scope.tenant_id)
            .map(|s| s.graph.to_snapshot())
            .unwrap_or_default()
    }

    pub async fn version(&self, scope: &Scope) -> u64 {
        let tenants = self.tenants.read().await;
        tenants.get(&scope.tenant_id).map_or(0, |s| s.version)
    }

    /// Number of `fetch` calls served or failed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Every accepted change, all tenants.
    pub fn mutation_log(&self) -> Vec<LoggedChange> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Changes that touched `task_id` in the tenant of `scope`, oldest first.
    pub fn history(&self, scope: &Scope, task_id: &TaskId) -> Vec<LoggedChange> {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|logged| logged.tenant_id == scope.tenant_id && logged.change.touches(task_id))
            .cloned()
            .collect()
    }

    /// Applies a change as another client would: no latency, no injected faults,
    /// and a notice without origin.
    pub async fn apply_external(&self, scope: &Scope, change: &Change) -> Result<Ack> {
        self.commit(scope, change, None).await
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    async fn commit(
        &self,
        scope: &Scope,
        change: &Change,
        origin: Option<&ClientId>,
    ) -> Result<Ack> {
        let ack = {
            let mut tenants = self.tenants.write().await;
            let state = tenants.entry(scope.tenant_id.clone()).or_default();
            let mut next = state.graph.clone();
            next.apply(change)
                .map_err(|e| StoreError::Concurrency(e.to_string()))?;
            state.graph = next;
            state.version += 1;
            Ack {
                version: state.version,
            }
        };

        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(LoggedChange {
                tenant_id: scope.tenant_id.clone(),
                version: ack.version,
                principal_id: scope.principal_id.clone(),
                origin: origin.cloned(),
                changed_at: Utc::now(),
                change: change.clone(),
            });

        // No receivers is fine.
        let _ = self.feed.send(ChangeNotice {
            tenant_id: scope.tenant_id.clone(),
            version: ack.version,
            origin: origin.cloned(),
            resources: change.resources(),
        });
        debug!(
            tenant = %scope.tenant_id,
            version = ack.version,
            kind = change.kind(),
            "change committed"
        );
        Ok(ack)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn fetch(&self, scope: &Scope) -> Result<Snapshot> {
        let span = store_span!("memory", "fetch", scope.tenant_id.as_str());
        async move {
            self.delay().await;
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = take_fault(&self.fetch_faults) {
                record_error(&err);
                return Err(err);
            }
            Ok(self.snapshot(scope).await)
        }
        .instrument(span)
        .await
    }

    async fn mutate(
        &self,
        scope: &Scope,
        change: &Change,
        origin: Option<&ClientId>,
    ) -> Result<Ack> {
        let span = store_span!("memory", change.kind(), scope.tenant_id.as_str());
        async move {
            self.delay().await;
            if let Some(err) = take_fault(&self.mutation_faults) {
                record_error(&err);
                return Err(err);
            }
            if !scope.can_write {
                return Err(StoreError::Permission(format!(
                    "principal {} cannot write in tenant {}",
                    scope.principal_id, scope.tenant_id
                )));
            }
            self.commit(scope, change, origin).await
        }
        .instrument(span)
        .await
    }

    fn subscribe(&self, _scope: &Scope) -> broadcast::Receiver<ChangeNotice> {
        self.feed.subscribe()
    }
}
