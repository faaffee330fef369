//! Per-sample phase transitions.
//!
//! Only the most recent sample is compared against the new one; there is no
//! smoothing over a window.

use tracing::debug;

use crate::config::Thresholds;
use crate::models::Position;
use crate::state::RidePhase;

/// Outcome of evaluating a new sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: RidePhase,
    /// Set only on the `Idle` to `Tracking` edge.
    pub started_ride: bool,
}

impl Transition {
    const fn to(next: RidePhase) -> Self {
        Self { next, started_ride: false }
    }
}

/// Decide the next phase from the distance moved since `last`.
///
/// Without a previous sample nothing can be measured, so the result is always
/// `Idle`.
#[must_use]
pub fn evaluate_transition(
    phase: RidePhase, last: Option<&Position>, current: &Position, thresholds: &Thresholds,
) -> Transition {
    let Some(last) = last else {
        return Transition::to(RidePhase::Idle);
    };

    let distance = last.distance_to(current);
    debug!(%phase, distance, "evaluating transition");

    match phase {
        RidePhase::Idle if distance >= thresholds.start_distance => {
            Transition { next: RidePhase::Tracking, started_ride: true }
        }
        RidePhase::Idle => Transition::to(RidePhase::Idle),
        RidePhase::Tracking if distance < thresholds.static_distance => {
            Transition::to(RidePhase::Paused)
        }
        RidePhase::Tracking => Transition::to(RidePhase::Tracking),
        RidePhase::Paused if distance >= thresholds.start_distance => {
            Transition::to(RidePhase::Tracking)
        }
        RidePhase::Paused => Transition::to(RidePhase::Paused),
    }
}
