//! Controller events, broadcast to any number of observers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Shown to users when a write was refused and the view was reloaded.
pub const SAVE_FAILED_MESSAGE: &str = "changes could not be saved, data refreshed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A command changed the local view and was queued for the store.
    Applied { entity: String, change: String },

    Confirmed { entity: String, version: u64 },

    RolledBack {
        entity: String,
        error: String,
        retryable: bool,
        discarded: usize,
    },

    /// The view was replaced with the store's data.
    Reconciled { generation: u64, tasks: usize },

    /// A newer trigger arrived while the fetch was in flight.
    ReconcileSuperseded { generation: u64 },

    ReconcileFailed { generation: u64, error: String },

    /// Reported after the reconciliation that followed a refused write.
    SaveFailed {
        entity: String,
        error: String,
        message: String,
    },
}

impl SyncEvent {
    pub fn applied(entity: impl ToString, change: impl Into<String>) -> Self {
        SyncEvent::Applied {
            entity: entity.to_string(),
            change: change.into(),
        }
    }

    pub fn confirmed(entity: impl ToString, version: u64) -> Self {
        SyncEvent::Confirmed {
            entity: entity.to_string(),
            version,
        }
    }

    pub fn rolled_back(
        entity: impl ToString,
        error: impl Into<String>,
        retryable: bool,
        discarded: usize,
    ) -> Self {
        SyncEvent::RolledBack {
            entity: entity.to_string(),
            error: error.into(),
            retryable,
            discarded,
        }
    }

    pub fn reconciled(generation: u64, tasks: usize) -> Self {
        SyncEvent::Reconciled { generation, tasks }
    }

    pub fn reconcile_superseded(generation: u64) -> Self {
        SyncEvent::ReconcileSuperseded { generation }
    }

    pub fn reconcile_failed(generation: u64, error: impl Into<String>) -> Self {
        SyncEvent::ReconcileFailed {
            generation,
            error: error.into(),
        }
    }

    pub fn save_failed(entity: impl ToString, error: impl Into<String>) -> Self {
        SyncEvent::SaveFailed {
            entity: entity.to_string(),
            error: error.into(),
            message: SAVE_FAILED_MESSAGE.to_string(),
        }
    }
}

pub type EventTx = broadcast::Sender<SyncEvent>;
pub type EventRx = broadcast::Receiver<SyncEvent>;

pub fn event_bus(capacity: usize) -> (EventTx, EventRx) {
    broadcast::channel(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_failed_carries_user_message() {
        let event = SyncEvent::save_failed("task:t1", "concurrency conflict: stale");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"save_failed""#));
        assert!(json.contains(SAVE_FAILED_MESSAGE));
    }

    #[test]
    fn test_rolled_back_wire_format() {
        let event = SyncEvent::rolled_back("task:t1", "network error: reset", true, 2);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "rolled_back");
        assert_eq!(json["discarded"], 2);
        assert_eq!(json["retryable"], true);
    }

    #[tokio::test]
    async fn test_event_bus_fans_out() {
        let (tx, mut rx) = event_bus(8);
        let mut second = tx.subscribe();
        tx.send(SyncEvent::reconciled(1, 3)).unwrap();
        assert_eq!(rx.recv().await.unwrap(), SyncEvent::reconciled(1, 3));
        assert_eq!(second.recv().await.unwrap(), SyncEvent::reconciled(1, 3));
    }
}
