//! Per-entity dispatch state.
//!
//! Each entity owns a FIFO of changes that were applied locally and still have to
//! reach the store. At most one change per entity is in flight; the dispatcher
//! for an entity pops the next change only after the previous one resolved.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use taskflow_core::{Change, EntityKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Nothing outstanding
    #[default]
    Clean,
    /// Applied locally, not yet acknowledged
    Pending,
    /// Last change acknowledged, more queued behind it
    Confirmed,
    /// Store refused a change; waiting for reconciliation
    RolledBack,
}

/// A change waiting for its turn, tagged with the view it was applied to.
#[derive(Debug, Clone)]
pub(crate) struct Queued {
    pub change: Change,
    pub view_version: u64,
}

#[derive(Debug, Default)]
struct Slot {
    state: EntityState,
    queue: VecDeque<Queued>,
    in_flight: bool,
}

#[derive(Debug, Default)]
pub(crate) struct EntityTable {
    slots: HashMap<EntityKey, Slot>,
}

impl EntityTable {
    pub fn state(&self, key: &EntityKey) -> EntityState {
        self.slots.get(key).map(|s| s.state).unwrap_or_default()
    }

    /// Queues `queued`. Returns true when no dispatcher is running for `key`
    /// and the caller has to start one.
    pub fn enqueue(&mut self, key: EntityKey, queued: Queued) -> bool {
        let slot = self.slots.entry(key).or_default();
        slot.state = EntityState::Pending;
        slot.queue.push_back(queued);
        if slot.in_flight {
            false
        } else {
            slot.in_flight = true;
            true
        }
    }

    /// Next change for the dispatcher of `key`. `None` ends the dispatcher.
    ///
    /// This is the only place a running dispatcher gives up the slot, so a
    /// change enqueued after the last acknowledgement is still picked up here.
    pub fn next(&mut self, key: &EntityKey) -> Option<Queued> {
        let slot = self.slots.get_mut(key)?;
        if let Some(queued) = slot.queue.pop_front() {
            slot.state = EntityState::Pending;
            return Some(queued);
        }
        slot.in_flight = false;
        if slot.state != EntityState::RolledBack {
            self.slots.remove(key);
        }
        None
    }

    /// Records an acknowledgement. Returns how many changes are still queued.
    ///
    /// The dispatcher keeps the slot until its next call to [`EntityTable::next`].
    pub fn confirm(&mut self, key: &EntityKey) -> usize {
        let Some(slot) = self.slots.get_mut(key) else {
            return 0;
        };
        slot.state = if slot.queue.is_empty() {
            EntityState::Clean
        } else {
            EntityState::Confirmed
        };
        slot.queue.len()
    }

    /// Drops everything queued behind a failed change and stops the dispatcher.
    /// Returns the number of discarded changes.
    pub fn roll_back(&mut self, key: &EntityKey) -> usize {
        let slot = self.slots.entry(key.clone()).or_default();
        let discarded = slot.queue.len();
        slot.queue.clear();
        slot.in_flight = false;
        slot.state = EntityState::RolledBack;
        discarded
    }

    /// Clears rolled-back entities once the view has been replaced.
    pub fn settle_rolled_back(&mut self) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| slot.state != EntityState::RolledBack);
        before - self.slots.len()
    }

    /// Changes applied locally but not acknowledged, in per-entity order.
    pub fn outstanding(&self) -> usize {
        self.slots.values().map(|s| s.queue.len()).sum()
    }

    /// Entities that are not clean.
    pub fn states(&self) -> Vec<(EntityKey, EntityState)> {
        let mut states: Vec<_> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.state != EntityState::Clean)
            .map(|(key, slot)| (key.clone(), slot.state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
