use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use realtime::bad_request;
use serde::{Deserialize, Serialize};

use crate::models::{Position, RideId};

/// Where the vehicle is in the ride lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RidePhase {
    #[default]
    Idle,
    Tracking,
    Paused,
}

impl RidePhase {
    /// A ride is open in every phase except `Idle`.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl Display for RidePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Tracking => write!(f, "TRACKING"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Security state of the vehicle. Motion while `Locked` raises a theft alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockStatus {
    Locked,
    #[default]
    Unlocked,
}

impl Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "LOCKED"),
            Self::Unlocked => write!(f, "UNLOCKED"),
        }
    }
}

impl FromStr for LockStatus {
    type Err = realtime::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCKED" => Ok(Self::Locked),
            "UNLOCKED" => Ok(Self::Unlocked),
            other => Err(bad_request!("invalid lock status: {}", other)),
        }
    }
}

/// Lifecycle aggregate owned by the ride manager.
///
/// `active_ride_id` is set exactly when the phase is not `Idle`, and
/// `paused_since` exactly when the phase is `Paused`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RideManagerState {
    pub phase: RidePhase,
    pub active_ride_id: Option<RideId>,
    pub last_position: Option<Position>,
    pub ride_start_time: Option<DateTime<Utc>>,
    pub paused_since: Option<DateTime<Utc>>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub lock_status: LockStatus,
}

impl RideManagerState {
    /// Forget the open ride and return to `Idle`. Lock status and the last
    /// sample survive.
    pub fn reset_ride(&mut self) {
        self.phase = RidePhase::Idle;
        self.active_ride_id = None;
        self.ride_start_time = None;
        self.paused_since = None;
    }
}
