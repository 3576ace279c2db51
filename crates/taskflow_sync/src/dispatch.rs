//! Per-entity dispatcher: sends queued changes to the store one at a time.

use std::sync::Arc;
use std::time::Instant;

use taskflow_core::EntityKey;
use taskflow_observability::{record_duration, record_error, sync_span};
use tracing::{Instrument, debug, warn};

use crate::controller::Inner;
use crate::events::SyncEvent;
use crate::reconcile::ReconcileTrigger;

/// Spawns the dispatcher for `entity`. The caller must have just claimed the
/// entity's in-flight slot.
pub(crate) fn spawn(inner: Arc<Inner>, entity: EntityKey) {
    inner.begin_work(1);
    tokio::spawn(async move {
        run(&inner, &entity).await;
        inner.finish_work(1);
    });
}

async fn run(inner: &Inner, entity: &EntityKey) {
    loop {
        let Some(queued) = inner.lock().entities.next(entity) else {
            break;
        };
        let change = &queued.change;
        let span = sync_span!(entity, change.kind());
        let started = Instant::now();

        let mutate = inner
            .store
            .mutate(&inner.scope, change, Some(&inner.client_id))
            .instrument(span.clone());
        let result = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => {
                debug!(entity = %entity, "dispatch cancelled");
                return;
            }
            result = mutate => result,
        };

        match result {
            Ok(ack) => {
                let (remaining, view_may_miss) = inner.acknowledge(entity, &queued);
                span.in_scope(|| {
                    record_duration("duration_ms", started.elapsed());
                    debug!(version = ack.version, remaining, view_may_miss, "change confirmed");
                });
                inner.emit(SyncEvent::confirmed(entity, ack.version));
                if view_may_miss {
                    inner.trigger(ReconcileTrigger::Requested);
                }
            }
            Err(err) => {
                let discarded = inner.lock().entities.roll_back(entity);
                span.in_scope(|| {
                    record_error(&err);
                    warn!(discarded, "change refused, rolling back");
                });
                inner.emit(SyncEvent::rolled_back(
                    entity,
                    err.to_string(),
                    err.is_retryable(),
                    discarded,
                ));
                inner.trigger(ReconcileTrigger::Failure {
                    entity: entity.clone(),
                    error: err.to_string(),
                });
                return;
            }
        }
    }
}
