//! Theft and crash alerts published to an external topic.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use realtime::{Message, Publisher};
use tracing::{info, warn};

use crate::provider::Alerter;

#[must_use]
pub fn theft_message(latitude: f64, longitude: f64, at: DateTime<Utc>) -> String {
    format!(
        "THEFT ALERT\n\nMovement detected while the bike is locked at {}.\nLocation: lat {latitude:.6}, lon {longitude:.6}.\n\n{}",
        at.to_rfc2822(),
        maps_link(latitude, longitude)
    )
}

#[must_use]
pub fn crash_message(latitude: f64, longitude: f64, at: DateTime<Utc>) -> String {
    format!(
        "CRASH DETECTED\n\nThe device reported a possible crash at {}.\nLocation: lat {latitude:.6}, lon {longitude:.6}.\n\n{}",
        at.to_rfc2822(),
        maps_link(latitude, longitude)
    )
}

fn maps_link(latitude: f64, longitude: f64) -> String {
    format!("https://maps.google.com/?q={latitude:.6},{longitude:.6}")
}

/// Publishes alert messages on a topic. When disabled, alerts are only logged.
pub struct PublishingAlerter<P: Publisher> {
    publisher: P,
    topic: String,
    enabled: bool,
}

impl<P: Publisher> PublishingAlerter<P> {
    pub fn new(publisher: P, topic: impl Into<String>, enabled: bool) -> Self {
        Self { publisher, topic: topic.into(), enabled }
    }

    /// Report a crash flagged by the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be published.
    pub async fn crash(&self, latitude: f64, longitude: f64, at: DateTime<Utc>) -> Result<()> {
        warn!(monotonic_counter.crash_alerts = 1, latitude, longitude, %at, "crash detected");
        self.publish("Crash detected", crash_message(latitude, longitude, at)).await
    }

    async fn publish(&self, subject: &str, body: String) -> Result<()> {
        if !self.enabled {
            info!(subject, "alerting disabled; not publishing");
            return Ok(());
        }

        let message = Message::new(body.as_bytes()).with_header("subject", subject);
        self.publisher
            .send(&self.topic, &message)
            .await
            .with_context(|| format!("publishing alert to {}", self.topic))
    }
}

#[async_trait]
impl<P: Publisher> Alerter for PublishingAlerter<P> {
    async fn alert(&self, latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Result<()> {
        warn!(monotonic_counter.theft_alerts = 1, latitude, longitude, %timestamp, "theft alert");
        self.publish("Theft alert", theft_message(latitude, longitude, timestamp)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use realtime::{Message, Publisher};

    use super::{PublishingAlerter, theft_message};
    use crate::provider::Alerter;

    #[derive(Clone, Default)]
    struct Sent(Arc<Mutex<Vec<(String, Message)>>>);

    impl Publisher for Sent {
        async fn send(&self, topic: &str, message: &Message) -> Result<()> {
            self.0.lock().unwrap().push((topic.to_string(), message.clone()));
            Ok(())
        }
    }

    #[test]
    fn theft_message_has_time_and_link() {
        let at = Utc.with_ymd_and_hms(2025, 2, 13, 4, 5, 6).unwrap();
        let message = theft_message(37.7749, -122.4194, at);

        assert!(message.starts_with("THEFT ALERT"));
        assert!(message.contains("Thu, 13 Feb 2025 04:05:06 +0000"), "{message}");
        assert!(message.contains("https://maps.google.com/?q=37.774900,-122.419400"));
    }

    #[tokio::test]
    async fn publishes_when_enabled() {
        let sent = Sent::default();
        let alerter = PublishingAlerter::new(sent.clone(), "alerts", true);
        let at = Utc.with_ymd_and_hms(2025, 2, 13, 4, 5, 6).unwrap();

        alerter.alert(1.0, 2.0, at).await.unwrap();
        alerter.crash(1.0, 2.0, at).await.unwrap();

        let sent = sent.0.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "alerts");
        assert_eq!(sent[0].1.headers.get("subject").map(String::as_str), Some("Theft alert"));
        assert!(String::from_utf8_lossy(&sent[1].1.payload).starts_with("CRASH DETECTED"));
    }

    #[tokio::test]
    async fn disabled_alerter_publishes_nothing() {
        let sent = Sent::default();
        let alerter = PublishingAlerter::new(sent.clone(), "alerts", false);
        let at = Utc.with_ymd_and_hms(2025, 2, 13, 4, 5, 6).unwrap();

        alerter.alert(1.0, 2.0, at).await.unwrap();
        assert!(sent.0.lock().unwrap().is_empty());
    }
}
