//! Device shadow feed.
//!
//! The tracked device reports through a shadow document whose `desired`
//! section carries the latest GPS fix, a crash flag and the lock state. Each
//! document is decoded here and turned into manager calls.

use std::fmt::Display;

use chrono::{DateTime, NaiveTime, Utc};
use futures::{Stream, StreamExt};
use realtime::{Error, Publisher, Result};
use ride::{LockStatus, Position, RideManager};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::provider::AppContext;

const CRASH_DETECTED: &str = "CRASH_DETECTED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowDocument {
    #[serde(default)]
    pub state: ShadowState,
    /// Unix seconds at which the document was written.
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowState {
    #[serde(default)]
    pub desired: Desired,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Desired {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_knots: Option<f64>,
    /// Time of day of the fix as `HHMMSS[.ff]`, UTC.
    pub timestamp: String,
    pub valid_fix: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_status: Option<String>,
}

impl ShadowDocument {
    pub fn document_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }

    /// Time of the fix: the document's UTC date combined with the reported
    /// time of day, or the document time when that cannot be parsed.
    pub fn event_time(&self) -> DateTime<Utc> {
        let base = self.document_time();
        combine_date_time(base, &self.state.desired.timestamp).unwrap_or_else(|err| {
            warn!(error = %err, "using document timestamp for fix");
            base
        })
    }
}

/// Place an `HHMMSS[.fff]` time of day on `base`'s UTC date.
///
/// Fractions are read as decimal seconds, so `.25` is 250 ms and `.250` is
/// 250 ms too.
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] if `time` is not in that form.
pub fn combine_date_time(base: DateTime<Utc>, time: &str) -> Result<DateTime<Utc>> {
    let invalid = |reason: &dyn Display| {
        Error::InvalidTimestamp(format!("invalid time of day {time:?}: {reason}"))
    };

    // chrono accepts single-digit fields, the device always sends six
    let hms = time.split_once('.').map_or(time, |(hms, _)| hms);
    if hms.len() != 6 {
        return Err(invalid(&"expected HHMMSS"));
    }
    let time_of_day = NaiveTime::parse_from_str(time, "%H%M%S%.f").map_err(|err| invalid(&err))?;

    Ok(base.date_naive().and_time(time_of_day).and_utc())
}

/// What a feed message turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// The device flagged a crash; no sample was processed.
    Crash,
    /// No usable fix in the document.
    Skipped,
    Sample(Position),
}

/// Apply one shadow document to the manager.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if the payload is not a shadow document.
pub async fn handle_message<P: Publisher>(
    manager: &RideManager<AppContext<P>>, payload: &[u8],
) -> Result<Handled> {
    let document: ShadowDocument = serde_json::from_slice(payload)?;
    let desired = &document.state.desired;

    if let Some(lock_status) = desired.lock_status.as_deref() {
        match lock_status.parse::<LockStatus>() {
            Ok(status) => manager.set_lock_status(status).await,
            Err(err) => warn!(error = %err, "ignoring lock status from device"),
        }
    }

    if desired.status.as_deref() == Some(CRASH_DETECTED) {
        let at = document.document_time();
        let alert = manager.provider().crash_alert(desired.latitude, desired.longitude, at);
        if let Err(err) = alert.await {
            error!(error = %err, "failed to send crash alert");
        }
        return Ok(Handled::Crash);
    }

    if desired.timestamp.is_empty() || !desired.valid_fix {
        debug!(valid_fix = desired.valid_fix, "no usable fix in document");
        return Ok(Handled::Skipped);
    }

    let mut sample = Position::new(desired.latitude, desired.longitude, document.event_time());
    sample.speed = desired.speed_knots;
    manager.handle_sample(sample).await;

    Ok(Handled::Sample(sample))
}

/// Process feed payloads in delivery order until the stream completes or
/// yields a transport error.
pub async fn run_feed<P, S, E>(manager: &RideManager<AppContext<P>>, feed: S)
where
    P: Publisher,
    S: Stream<Item = std::result::Result<Vec<u8>, E>>,
    E: Display,
{
    let mut feed = std::pin::pin!(feed);

    while let Some(item) = feed.next().await {
        let payload = match item {
            Ok(payload) => payload,
            Err(err) => {
                error!(monotonic_counter.feed_errors = 1, error = %err, "feed transport failed");
                return;
            }
        };
        match handle_message(manager, &payload).await {
            Ok(handled) => debug!(?handled, "feed message handled"),
            Err(err) => {
                warn!(monotonic_counter.feed_errors = 1, error = %err, "dropping feed message");
            }
        }
    }

    info!("feed completed");
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use futures::stream;
    use pretty_assertions::assert_eq;
    use realtime::{Message, Publisher};
    use ride::{LockStatus, RideManager, RidePhase};

    use super::{Handled, ShadowDocument, combine_date_time, handle_message, run_feed};
    use crate::config::Config;
    use crate::provider::AppContext;

    #[derive(Clone, Default)]
    struct Recorded(Arc<Mutex<Vec<(String, Message)>>>);

    impl Publisher for Recorded {
        async fn send(&self, topic: &str, message: &Message) -> anyhow::Result<()> {
            self.0.lock().unwrap().push((topic.to_string(), message.clone()));
            Ok(())
        }
    }

    fn manager(published: &Recorded) -> RideManager<AppContext<Recorded>> {
        let ride_config = ride::Config {
            thresholds: ride::Thresholds::default(),
            timezone: chrono_tz::UTC,
            inactivity_check_interval: std::time::Duration::from_secs(30),
            observer_buffer: 16,
        };
        let config = Config {
            server_address: "127.0.0.1:0".to_string(),
            alert_topic: "alerts".to_string(),
            shadow_update_topic: "shadow/update".to_string(),
            alerts_enabled: true,
            test_mode: true,
        };
        let context = AppContext::new(&ride_config, &config, published.clone());
        RideManager::new(ride_config.thresholds, context)
    }

    fn document(latitude: f64, time: &str) -> Vec<u8> {
        // 2025-06-02T00:00:00Z
        let doc = serde_json::json!({
            "state": {"desired": {
                "latitude": latitude,
                "longitude": -122.0,
                "speed_knots": 1.5,
                "timestamp": time,
                "valid_fix": true
            }},
            "timestamp": 1_748_822_400
        });
        serde_json::to_vec(&doc).unwrap()
    }

    #[test]
    fn combines_fraction_forms() {
        let base = Utc.with_ymd_and_hms(2025, 6, 2, 23, 59, 0).unwrap();

        let at = combine_date_time(base, "123456.25").unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 6, 2, 12, 34, 56).unwrap();
        assert_eq!(at, expected + chrono::Duration::milliseconds(250));

        let at = combine_date_time(base, "123456.125").unwrap();
        assert_eq!(at.timestamp_subsec_millis(), 125);

        let at = combine_date_time(base, "000001").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 1).unwrap());

        let at = combine_date_time(base, "123456.1234").unwrap();
        assert_eq!(at.timestamp_subsec_micros(), 123_400);
    }

    #[test]
    fn rejects_bad_time_of_day() {
        let base = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        for bad in ["", "12345", "1234567", "12a456", "250000", "126000", "123456.", "123456.x"] {
            let err = combine_date_time(base, bad).unwrap_err();
            assert!(matches!(err, realtime::Error::InvalidTimestamp(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn event_time_falls_back_to_document() {
        let doc: ShadowDocument = serde_json::from_slice(&document(1.0, "bogus")).unwrap();
        assert_eq!(doc.event_time(), Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn fix_becomes_sample() {
        let published = Recorded::default();
        let manager = manager(&published);

        let handled = handle_message(&manager, &document(37.0, "081500.00")).await.unwrap();
        let Handled::Sample(sample) = handled.clone() else {
            panic!("expected a sample, got {handled:?}");
        };
        assert_eq!(sample.timestamp, Utc.with_ymd_and_hms(2025, 6, 2, 8, 15, 0).unwrap());
        assert_eq!(sample.speed, Some(1.5));

        let state = manager.snapshot().await;
        assert_eq!(state.last_position, Some(sample));
    }

    #[tokio::test]
    async fn invalid_fix_is_skipped() {
        let manager = manager(&Recorded::default());
        let payload = br#"{"state":{"desired":{"latitude":1.0,"longitude":2.0,"timestamp":"081500.00","valid_fix":false}},"timestamp":1748822400}"#;

        assert_eq!(handle_message(&manager, payload).await.unwrap(), Handled::Skipped);
        assert_eq!(manager.snapshot().await.last_position, None);
    }

    #[tokio::test]
    async fn crash_alerts_and_skips_sample() {
        let published = Recorded::default();
        let manager = manager(&published);
        let payload = br#"{"state":{"desired":{"latitude":1.0,"longitude":2.0,"timestamp":"081500.00","valid_fix":true,"status":"CRASH_DETECTED"}},"timestamp":1748822400}"#;

        assert_eq!(handle_message(&manager, payload).await.unwrap(), Handled::Crash);
        assert_eq!(manager.snapshot().await.last_position, None);

        let published = published.0.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "alerts");
        assert!(String::from_utf8_lossy(&published[0].1.payload).contains("CRASH DETECTED"));
    }

    #[tokio::test]
    async fn lock_status_applies_before_fix() {
        let manager = manager(&Recorded::default());
        let payload = br#"{"state":{"desired":{"lock_status":"LOCKED"}}}"#;

        assert_eq!(handle_message(&manager, payload).await.unwrap(), Handled::Skipped);
        assert_eq!(manager.lock_status().await, LockStatus::Locked);

        let payload = br#"{"state":{"desired":{"lock_status":"OPEN"}}}"#;
        handle_message(&manager, payload).await.unwrap();
        assert_eq!(manager.lock_status().await, LockStatus::Locked);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let manager = manager(&Recorded::default());
        let err = handle_message(&manager, b"not json").await.unwrap_err();
        assert!(matches!(err, realtime::Error::InvalidFormat(_)));
    }

    #[tokio::test]
    async fn feed_skips_bad_messages_and_stops_on_error() {
        let manager = manager(&Recorded::default());
        let feed = stream::iter(vec![
            Ok(document(0.0, "080000.00")),
            Ok(b"garbage".to_vec()),
            Ok(document(0.0001, "080005.00")),
            Err(anyhow!("connection lost")),
            Ok(document(0.0002, "080010.00")),
        ]);

        run_feed(&manager, feed).await;

        let state = manager.snapshot().await;
        assert_eq!(state.phase, RidePhase::Tracking);
        let last_update = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 5).unwrap();
        assert_eq!(state.last_update_time, Some(last_update));
    }

    #[tokio::test]
    async fn feed_runs_to_completion() {
        let manager = manager(&Recorded::default());
        let feed = stream::iter(vec![Ok::<_, Infallible>(document(0.0, "080000.00"))]);

        run_feed(&manager, feed).await;
        assert!(manager.snapshot().await.last_position.is_some());
    }
}
