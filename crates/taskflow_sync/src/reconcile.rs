//! Debounced full reconciliation and the change-feed listener.
//!
//! Triggers arriving within the debounce window share one fetch. A trigger that
//! arrives while the fetch is in flight drops that fetch and starts a new window,
//! so only the latest result is installed. A fetch that fails with a retryable
//! error is tried again with backoff, keeping the batch and its failures.

use std::sync::Arc;

use taskflow_core::{EntityKey, Snapshot};
use taskflow_observability::sync_span;
use taskflow_store::{ChangeNotice, StoreError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::controller::{Inner, Installed};
use crate::events::SyncEvent;

#[derive(Debug, Clone)]
pub(crate) enum ReconcileTrigger {
    /// Another client changed the tenant's data.
    Notice { version: u64 },
    /// The store refused one of our changes.
    Failure { entity: EntityKey, error: String },
    Requested,
}

#[derive(Debug, Default)]
struct Batch {
    triggers: usize,
    /// Highest store version announced by the feed
    notice_version: u64,
    failures: Vec<(EntityKey, String)>,
}

impl Batch {
    fn push(&mut self, trigger: ReconcileTrigger) {
        self.triggers += 1;
        match trigger {
            ReconcileTrigger::Notice { version } => {
                self.notice_version = self.notice_version.max(version);
            }
            ReconcileTrigger::Failure { entity, error } => self.failures.push((entity, error)),
            ReconcileTrigger::Requested => {}
        }
    }

    fn is_empty(&self) -> bool {
        self.triggers == 0
    }
}

pub(crate) async fn run(inner: Arc<Inner>, mut triggers: mpsc::UnboundedReceiver<ReconcileTrigger>) {
    let mut batch = Batch::default();
    let mut attempt = 0u32;
    loop {
        if batch.is_empty() {
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => return,
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => batch.push(trigger),
                    None => return,
                },
            }
        }

        let wait = if attempt == 0 {
            inner.config.debounce
        } else {
            inner.config.retry_delay(attempt)
        };
        let window = tokio::time::sleep(wait);
        tokio::pin!(window);
        loop {
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => return,
                _ = &mut window => break,
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => batch.push(trigger),
                    None => return,
                },
            }
        }

        let generation = inner.begin_fetch();
        debug!(
            generation,
            attempt,
            triggers = batch.triggers,
            notice_version = batch.notice_version,
            "reconciling"
        );
        let outcome = {
            let fetch = inner.store.fetch(&inner.scope);
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => return,
                result = fetch => Some(result),
                trigger = triggers.recv() => {
                    if let Some(trigger) = trigger {
                        batch.push(trigger);
                    }
                    None
                }
            }
        };

        match outcome {
            None => {
                inner.end_fetch(generation);
                debug!(generation, "reconciliation superseded");
                inner.emit(SyncEvent::reconcile_superseded(generation));
            }
            Some(Err(err)) if err.is_retryable() && attempt < inner.config.fetch_retries => {
                inner.end_fetch(generation);
                attempt += 1;
                taskflow_observability::record_error(&err);
                warn!(
                    generation,
                    attempt,
                    pending_failures = batch.failures.len(),
                    error = %err,
                    "reconciliation fetch failed, retrying"
                );
            }
            Some(result) => {
                attempt = 0;
                let served = std::mem::take(&mut batch);
                finish(&inner, generation, result, served.failures);
                inner.finish_work(served.triggers);
            }
        }
    }
}

fn finish(
    inner: &Inner,
    generation: u64,
    result: Result<Snapshot, StoreError>,
    failures: Vec<(EntityKey, String)>,
) {
    let span = sync_span!(&inner.scope, "reconcile");
    let _enter = span.enter();
    match result {
        Ok(snapshot) => {
            let tasks = snapshot.tasks.len();
            match inner.install(generation, snapshot, true) {
                Installed::Superseded => {
                    debug!(generation, "newer fetch started, result discarded");
                    inner.emit(SyncEvent::reconcile_superseded(generation));
                }
                installed => {
                    if installed == Installed::Behind {
                        debug!(generation, "change acknowledged during fetch, not cached");
                    }
                    info!(generation, tasks, "view reconciled");
                    inner.emit(SyncEvent::reconciled(generation, tasks));
                }
            }
        }
        Err(err) => {
            inner.end_fetch(generation);
            taskflow_observability::record_error(&err);
            warn!(generation, pending_failures = failures.len(), "reconciliation fetch failed");
            inner.emit(SyncEvent::reconcile_failed(generation, err.to_string()));
        }
    }
    // Refusals are reported whether or not the refetch worked.
    for (entity, error) in failures {
        inner.emit(SyncEvent::save_failed(&entity, error));
    }
}

/// Turns change-feed notices from other clients into reconciliation triggers.
pub(crate) async fn listen(inner: Arc<Inner>, mut feed: broadcast::Receiver<ChangeNotice>) {
    loop {
        let received = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => return,
            received = feed.recv() => received,
        };
        match received {
            Ok(notice) => {
                if !notice.concerns(&inner.scope) {
                    continue;
                }
                if notice.is_from(&inner.client_id) {
                    debug!(version = notice.version, "own change notice ignored");
                    continue;
                }
                debug!(
                    version = notice.version,
                    resources = ?notice.resources,
                    "change notice received"
                );
                inner.cache.invalidate(&inner.scope, &notice.resources);
                inner.trigger(ReconcileTrigger::Notice {
                    version: notice.version,
                });
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "change feed lagged, reconciling");
                inner.trigger(ReconcileTrigger::Requested);
            }
            Err(RecvError::Closed) => {
                debug!("change feed closed");
                return;
            }
        }
    }
}
