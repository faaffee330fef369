use std::fmt::{self, Display};

use chrono::{DateTime, Utc};

use crate::config::Thresholds;
use crate::state::RidePhase;

/// Why an open ride is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// No sample arrived within the general inactivity window.
    GeneralInactivity,
    /// The ride stayed paused for longer than the static window.
    StaticTimeout,
}

impl Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeneralInactivity => write!(f, "general inactivity"),
            Self::StaticTimeout => write!(f, "static timeout"),
        }
    }
}

/// Returns the reason the open ride should end at `now`, if any.
#[must_use]
pub fn end_reason(
    phase: RidePhase, last_update: DateTime<Utc>, paused_since: Option<DateTime<Utc>>,
    thresholds: &Thresholds, now: DateTime<Utc>,
) -> Option<EndReason> {
    if !phase.is_active() {
        return None;
    }
    if now - last_update > thresholds.general_inactivity {
        return Some(EndReason::GeneralInactivity);
    }
    if phase == RidePhase::Paused
        && let Some(paused_since) = paused_since
        && now - paused_since > thresholds.static_duration
    {
        return Some(EndReason::StaticTimeout);
    }
    None
}

#[must_use]
pub fn should_end_ride(
    phase: RidePhase, last_update: DateTime<Utc>, paused_since: Option<DateTime<Utc>>,
    thresholds: &Thresholds, now: DateTime<Utc>,
) -> bool {
    end_reason(phase, last_update, paused_since, thresholds, now).is_some()
}
