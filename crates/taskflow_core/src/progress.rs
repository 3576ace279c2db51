//! Weighted-action progress and status derivation.
//!
//! Progress is the sum of the weights of completed actions, rounded once and
//! clamped to `[0, 100]`. The sum is kept in millionths of a weight point, so
//! repeated toggles never drift and any weight with up to six decimals is summed
//! exactly.

use serde::{Deserialize, Serialize};

use crate::task::{Action, TaskStatus};

/// What caused a recomputation. Only toggles may clear a sticky `blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Toggle,
    Recalc,
}

/// Derived `(progress, status)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derived {
    pub progress: u8,
    pub status: TaskStatus,
}

/// Maps progress to status, honouring a prior explicit `blocked`.
pub fn derive_status(progress: u8, prior: TaskStatus, trigger: Trigger) -> TaskStatus {
    if prior == TaskStatus::Blocked && trigger == Trigger::Recalc {
        return TaskStatus::Blocked;
    }
    match progress {
        0 => TaskStatus::Todo,
        p if p >= 100 => TaskStatus::Done,
        _ => TaskStatus::Doing,
    }
}

/// Full derivation over an action list.
///
/// With no actions the current pair is returned untouched: an explicitly set
/// progress stays authoritative.
pub fn derive(actions: &[Action], current: Derived, trigger: Trigger) -> Derived {
    if actions.is_empty() {
        return current;
    }
    let tracker = ProgressTracker::from_actions(actions);
    let progress = tracker.progress();
    Derived {
        progress,
        status: derive_status(progress, current.status, trigger),
    }
}

const UNITS_PER_POINT: i64 = 1_000_000;

fn units(weight: f64) -> i64 {
    if weight.is_finite() {
        (weight * UNITS_PER_POINT as f64).round() as i64
    } else {
        0
    }
}

/// Running weighted sum for one task, so a toggle is O(1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    done_units: i64,
    actions: usize,
}

impl ProgressTracker {
    pub fn from_actions(actions: &[Action]) -> Self {
        let done_units = actions
            .iter()
            .filter(|a| a.done)
            .map(|a| units(a.weight))
            .sum();
        Self {
            done_units,
            actions: actions.len(),
        }
    }

    pub fn has_actions(&self) -> bool {
        self.actions > 0
    }

    /// Rounded, clamped progress.
    pub fn progress(&self) -> u8 {
        let rounded = (self.done_units + UNITS_PER_POINT / 2).div_euclid(UNITS_PER_POINT);
        rounded.clamp(0, 100) as u8
    }

    /// Accounts for one action flipping to `now_done`.
    pub fn toggle(&mut self, weight: f64, now_done: bool) {
        if now_done {
            self.done_units += units(weight);
        } else {
            self.done_units -= units(weight);
        }
    }

    /// Pair that a toggle of `action` would produce, without mutating.
    pub fn preview_toggle(&self, action: &Action, prior: TaskStatus) -> (bool, Derived) {
        let mut next = *self;
        let now_done = !action.done;
        next.toggle(action.weight, now_done);
        let progress = next.progress();
        (
            now_done,
            Derived {
                progress,
                status: derive_status(progress, prior, Trigger::Toggle),
            },
        )
    }
}

/// Rewrites weights to `100 / n`; the last action absorbs the rounding remainder
/// so the weights sum to exactly 100.
pub fn distribute_equal_weights(actions: &mut [Action]) {
    let n = actions.len();
    if n == 0 {
        return;
    }
    let share = (10_000 / n as i64) as f64 / 100.0;
    let remainder = 100.0 - share * (n as f64 - 1.0);
    for (i, action) in actions.iter_mut().enumerate() {
        action.weight = if i + 1 == n {
            (remainder * 100.0).round() / 100.0
        } else {
            share
        };
    }
}
