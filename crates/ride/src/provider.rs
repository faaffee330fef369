//! # Provider
//!
//! Collaborators the ride manager depends on. Implementations live in the
//! hosting service; tests supply a recording mock.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::events::RideEvent;
use crate::models::{Position, RideDetail, RideId, RideSummary};

/// Persistence of ride records written by the manager.
#[async_trait]
pub trait RideStore: Send + Sync {
    /// Open a new ride and return its id.
    async fn create_ride(&self, name: &str, start_time: DateTime<Utc>) -> Result<RideId>;

    async fn append_position(&self, ride_id: RideId, position: &Position) -> Result<()>;

    async fn close_ride(&self, ride_id: RideId, end_time: DateTime<Utc>) -> Result<()>;
}

/// Read-only access to recorded rides.
#[async_trait]
pub trait RideQuery: Send + Sync {
    /// Rides ordered by start time, newest first. `page` is 1-based and
    /// `date` restricts results to rides starting on that UTC day.
    async fn rides(
        &self, page: usize, limit: usize, date: Option<NaiveDate>,
    ) -> Result<Vec<RideSummary>>;

    /// Ride with its positions ordered by timestamp, or `None` if unknown.
    async fn ride(&self, ride_id: RideId) -> Result<Option<RideDetail>>;
}

/// Fire-and-forget delivery of events to live observers. Must not block.
pub trait Broadcaster: Send + Sync {
    /// Offer `event` to observers, stamped with `sent_at`.
    fn broadcast(&self, event: &RideEvent, sent_at: DateTime<Utc>);
}

/// Raised when the vehicle moves while locked.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Zone rides are named in.
    fn timezone(&self) -> Tz;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    #[must_use]
    pub const fn from_timezone(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// Everything the ride manager needs from its host.
pub trait Provider: RideStore + Broadcaster + Alerter + Clock {}
