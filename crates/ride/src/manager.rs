//! # Ride lifecycle manager
//!
//! Owns the [`RideManagerState`] for one vehicle. Both entry points, sample
//! handling and the inactivity check, hold the state lock for their whole
//! sequence including calls out to the provider, so their effects never
//! interleave. Collaborator failures are logged and never returned.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Thresholds;
use crate::events::RideEvent;
use crate::inactivity::end_reason;
use crate::models::{Position, RideId};
use crate::naming::determine_ride_name;
use crate::provider::Provider;
use crate::state::{LockStatus, RideManagerState, RidePhase};
use crate::transition::evaluate_transition;

pub struct RideManager<P: Provider> {
    provider: P,
    thresholds: Thresholds,
    state: Mutex<RideManagerState>,
}

impl<P: Provider> RideManager<P> {
    /// Create a manager in the `Idle` phase.
    pub fn new(thresholds: Thresholds, provider: P) -> Self {
        Self { provider, thresholds, state: Mutex::new(RideManagerState::default()) }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Process one position sample.
    pub async fn handle_sample(&self, sample: Position) {
        let mut state = self.state.lock().await;
        let now = self.provider.now_utc();

        // a ride that went stale before this sample arrived ends first
        if let Some(last_update) = state.last_update_time
            && let Some(reason) = end_reason(
                state.phase,
                last_update,
                state.paused_since,
                &self.thresholds,
                now,
            )
        {
            info!(%reason, ride_id = ?state.active_ride_id, "ride expired before new sample");
            self.end_ride(&mut state, last_update).await;
        }

        if let Some(last) = state.last_update_time
            && sample.timestamp < last
        {
            warn!(timestamp = %sample.timestamp, last_update = %last, "sample is older than last update");
        }
        state.last_update_time = Some(sample.timestamp);
        self.provider.broadcast(&RideEvent::current_location(&sample), now);

        let previous = state.phase;
        let transition =
            evaluate_transition(previous, state.last_position.as_ref(), &sample, &self.thresholds);
        state.phase = transition.next;

        let opened = if transition.started_ride {
            if state.lock_status == LockStatus::Locked {
                self.report_theft(&mut state, sample).await;
                return;
            }
            self.start_ride(&mut state, &sample).await
        } else {
            false
        };

        // the opening sample is already recorded as the ride's first point
        if !opened
            && state.phase.is_active()
            && let Some(ride_id) = state.active_ride_id
            && self.record_position(ride_id, &sample).await
        {
            self.provider.broadcast(&RideEvent::position_added(ride_id, &sample), now);
        }

        if state.phase == RidePhase::Paused {
            if previous != RidePhase::Paused {
                state.paused_since = Some(now);
                info!(ride_id = ?state.active_ride_id, "ride paused");
            }
            if let Some(paused_since) = state.paused_since
                && now - paused_since > self.thresholds.static_duration
            {
                info!(ride_id = ?state.active_ride_id, "ride static for too long");
                self.end_ride(&mut state, sample.timestamp).await;
            }
        } else if previous == RidePhase::Paused && state.phase == RidePhase::Tracking {
            state.paused_since = None;
            info!(ride_id = ?state.active_ride_id, "ride resumed");
        }

        state.last_position = Some(sample);
        debug!(monotonic_counter.samples_processed = 1, phase = %state.phase, "sample processed");
    }

    /// End the open ride if it has outlived its inactivity budget.
    ///
    /// Returns `true` when a ride was ended.
    pub async fn check_inactivity(&self) -> bool {
        let mut state = self.state.lock().await;
        let Some(last_update) = state.last_update_time else {
            return false;
        };
        let now = self.provider.now_utc();
        let Some(reason) =
            end_reason(state.phase, last_update, state.paused_since, &self.thresholds, now)
        else {
            return false;
        };

        info!(%reason, ride_id = ?state.active_ride_id, "ending inactive ride");
        self.end_ride(&mut state, last_update).await;
        true
    }

    pub async fn set_lock_status(&self, status: LockStatus) {
        let mut state = self.state.lock().await;
        if state.lock_status != status {
            info!(from = %state.lock_status, to = %status, "lock status changed");
        }
        state.lock_status = status;
    }

    pub async fn lock_status(&self) -> LockStatus {
        self.state.lock().await.lock_status
    }

    /// Copy of the current lifecycle state.
    pub async fn snapshot(&self) -> RideManagerState {
        self.state.lock().await.clone()
    }

    async fn report_theft(&self, state: &mut RideManagerState, sample: Position) {
        warn!(
            latitude = sample.latitude,
            longitude = sample.longitude,
            "movement while locked; not starting a ride"
        );
        state.phase = RidePhase::Idle;
        if let Err(err) =
            self.provider.alert(sample.latitude, sample.longitude, sample.timestamp).await
        {
            error!(error = %err, "failed to send theft alert");
        }
        state.last_position = Some(sample);
    }

    async fn start_ride(&self, state: &mut RideManagerState, sample: &Position) -> bool {
        let name = determine_ride_name(sample.timestamp, self.provider.timezone());
        let ride_id = match self.provider.create_ride(name, sample.timestamp).await {
            Ok(ride_id) => ride_id,
            Err(err) => {
                error!(
                    monotonic_counter.persistence_errors = 1,
                    error = %err,
                    "failed to create ride"
                );
                state.reset_ride();
                return false;
            }
        };

        state.phase = RidePhase::Tracking;
        state.active_ride_id = Some(ride_id);
        state.ride_start_time = Some(sample.timestamp);
        state.paused_since = None;
        info!(
            monotonic_counter.rides_started = 1,
            ride_id,
            name,
            start_time = %sample.timestamp,
            "ride started"
        );

        self.record_position(ride_id, sample).await;
        let event = RideEvent::ride_started(ride_id, name, sample);
        self.provider.broadcast(&event, self.provider.now_utc());
        true
    }

    async fn record_position(&self, ride_id: RideId, sample: &Position) -> bool {
        match self.provider.append_position(ride_id, sample).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    monotonic_counter.persistence_errors = 1,
                    ride_id,
                    error = %err,
                    "failed to append position"
                );
                false
            }
        }
    }

    async fn end_ride(&self, state: &mut RideManagerState, end_time: DateTime<Utc>) {
        if let Some(ride_id) = state.active_ride_id {
            match self.provider.close_ride(ride_id, end_time).await {
                Ok(()) => info!(monotonic_counter.rides_ended = 1, ride_id, %end_time, "ride ended"),
                Err(err) => error!(
                    monotonic_counter.persistence_errors = 1,
                    ride_id,
                    error = %err,
                    "failed to close ride"
                ),
            }
            let event = RideEvent::ride_ended(ride_id, end_time);
            self.provider.broadcast(&event, self.provider.now_utc());
        } else {
            warn!(phase = %state.phase, "no open ride to end");
        }
        state.reset_ride();
    }
}
