//! Wiring of the ride manager's collaborators for the running service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use realtime::{Message, Publisher};
use ride::alert::PublishingAlerter;
use ride::store::MemoryStore;
use ride::{
    Alerter, Broadcaster, Clock, Hub, LockStatus, Position, Provider, RideDetail, RideEvent,
    RideId, RideQuery, RideStore, RideSummary, SystemClock,
};
use serde_json::json;
use tracing::info;

use crate::config::Config;

/// Publisher that writes messages to the log instead of a broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    async fn send(&self, topic: &str, message: &Message) -> Result<()> {
        info!(
            monotonic_counter.messages_published = 1,
            topic,
            subject = ?message.headers.get("subject"),
            payload = %String::from_utf8_lossy(&message.payload),
            "published message"
        );
        Ok(())
    }
}

pub struct AppContext<P: Publisher> {
    store: MemoryStore,
    hub: Hub,
    alerter: PublishingAlerter<P>,
    publisher: P,
    clock: SystemClock,
    shadow_update_topic: String,
}

impl<P: Publisher + Clone> AppContext<P> {
    pub fn new(ride_config: &ride::Config, config: &Config, publisher: P) -> Self {
        Self {
            store: MemoryStore::new(),
            hub: Hub::new(ride_config.observer_buffer),
            alerter: PublishingAlerter::new(
                publisher.clone(),
                config.alert_topic.clone(),
                config.alerts_enabled,
            ),
            publisher,
            clock: SystemClock::from_timezone(ride_config.timezone),
            shadow_update_topic: config.shadow_update_topic.clone(),
        }
    }
}

impl<P: Publisher> AppContext<P> {
    pub const fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Forward a device-reported crash to the alert topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert could not be published.
    pub async fn crash_alert(&self, latitude: f64, longitude: f64, at: DateTime<Utc>) -> Result<()> {
        self.alerter.crash(latitude, longitude, at).await
    }

    /// Ask the device to adopt `status` through its shadow document.
    ///
    /// # Errors
    ///
    /// Returns an error if the shadow update could not be published.
    pub async fn publish_lock_status(&self, status: LockStatus) -> Result<()> {
        let update = json!({"state": {"desired": {"lock_status": status}}});
        let payload = serde_json::to_vec(&update).context("serializing shadow update")?;
        self.publisher
            .send(&self.shadow_update_topic, &Message::new(&payload))
            .await
            .context("publishing shadow update")
    }
}

impl<P: Publisher> Provider for AppContext<P> {}

#[async_trait]
impl<P: Publisher> RideStore for AppContext<P> {
    async fn create_ride(&self, name: &str, start_time: DateTime<Utc>) -> Result<RideId> {
        self.store.create_ride(name, start_time).await
    }

    async fn append_position(&self, ride_id: RideId, position: &Position) -> Result<()> {
        self.store.append_position(ride_id, position).await
    }

    async fn close_ride(&self, ride_id: RideId, end_time: DateTime<Utc>) -> Result<()> {
        self.store.close_ride(ride_id, end_time).await
    }
}

#[async_trait]
impl<P: Publisher> RideQuery for AppContext<P> {
    async fn rides(
        &self, page: usize, limit: usize, date: Option<NaiveDate>,
    ) -> Result<Vec<RideSummary>> {
        self.store.rides(page, limit, date).await
    }

    async fn ride(&self, ride_id: RideId) -> Result<Option<RideDetail>> {
        self.store.ride(ride_id).await
    }
}

impl<P: Publisher> Broadcaster for AppContext<P> {
    fn broadcast(&self, event: &RideEvent, sent_at: DateTime<Utc>) {
        self.hub.broadcast(event, sent_at);
    }
}

#[async_trait]
impl<P: Publisher> Alerter for AppContext<P> {
    async fn alert(&self, latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Result<()> {
        self.alerter.alert(latitude, longitude, timestamp).await
    }
}

impl<P: Publisher> Clock for AppContext<P> {
    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    fn timezone(&self) -> Tz {
        self.clock.timezone()
    }
}
