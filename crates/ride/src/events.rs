//! Events pushed to live observers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Position, RideId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_knots: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideEventPayload {
    pub ride_id: RideId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Lifecycle and location events emitted by the ride manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RideEvent {
    CurrentLocation(LocationPayload),
    RideStarted(RideEventPayload),
    PositionAdded(RideEventPayload),
    RideEnded(RideEventPayload),
}

impl RideEvent {
    #[must_use]
    pub const fn current_location(position: &Position) -> Self {
        Self::CurrentLocation(LocationPayload {
            latitude: position.latitude,
            longitude: position.longitude,
            timestamp: position.timestamp,
            speed_knots: position.speed,
        })
    }

    #[must_use]
    pub fn ride_started(ride_id: RideId, name: &str, position: &Position) -> Self {
        Self::RideStarted(RideEventPayload {
            ride_id,
            ride_name: Some(name.to_string()),
            timestamp: position.timestamp,
            position: Some(*position),
        })
    }

    #[must_use]
    pub const fn position_added(ride_id: RideId, position: &Position) -> Self {
        Self::PositionAdded(RideEventPayload {
            ride_id,
            ride_name: None,
            timestamp: position.timestamp,
            position: Some(*position),
        })
    }

    #[must_use]
    pub const fn ride_ended(ride_id: RideId, end_time: DateTime<Utc>) -> Self {
        Self::RideEnded(RideEventPayload {
            ride_id,
            ride_name: None,
            timestamp: end_time,
            position: None,
        })
    }

    /// Event type as it appears on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CurrentLocation(_) => "current_location",
            Self::RideStarted(_) => "RIDE_STARTED",
            Self::PositionAdded(_) => "RIDE_POSITION_UPDATE",
            Self::RideEnded(_) => "RIDE_ENDED",
        }
    }

    /// Ride the event belongs to. Location events are not tied to a ride.
    #[must_use]
    pub const fn ride_id(&self) -> Option<RideId> {
        match self {
            Self::CurrentLocation(_) => None,
            Self::RideStarted(p) | Self::PositionAdded(p) | Self::RideEnded(p) => Some(p.ride_id),
        }
    }

    /// Serialize as a `{"type", "payload", "timestamp"}` frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_frame(&self, sent_at: DateTime<Utc>) -> serde_json::Result<String> {
        serde_json::to_string(&Frame { kind: self.kind(), payload: self, timestamp: sent_at })
    }
}

#[derive(Serialize)]
struct Frame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a RideEvent,
    timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::RideEvent;
    use crate::models::Position;

    #[test]
    fn ride_started_frame() {
        let at = Utc.with_ymd_and_hms(2025, 5, 4, 7, 30, 0).unwrap();
        let position = Position::new(37.5, -122.25, at);
        let event = RideEvent::ride_started(3, "Morning Ride", &position);

        let frame: Value = serde_json::from_str(&event.to_frame(at).unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({
                "type": "RIDE_STARTED",
                "payload": {
                    "ride_id": 3,
                    "ride_name": "Morning Ride",
                    "timestamp": "2025-05-04T07:30:00Z",
                    "position": {
                        "latitude": 37.5,
                        "longitude": -122.25,
                        "timestamp": "2025-05-04T07:30:00Z"
                    }
                },
                "timestamp": "2025-05-04T07:30:00Z"
            })
        );
    }

    #[test]
    fn location_frame_carries_speed() {
        let at = Utc.with_ymd_and_hms(2025, 5, 4, 7, 30, 0).unwrap();
        let event = RideEvent::current_location(&Position::new(1.0, 2.0, at).with_speed(4.0));

        assert_eq!(event.kind(), "current_location");
        assert_eq!(event.ride_id(), None);
        let frame: Value = serde_json::from_str(&event.to_frame(at).unwrap()).unwrap();
        assert_eq!(frame["payload"]["speed_knots"], json!(4.0));
    }

    #[test]
    fn ride_ended_has_no_position() {
        let at = Utc.with_ymd_and_hms(2025, 5, 4, 8, 0, 0).unwrap();
        let event = RideEvent::ride_ended(9, at);

        assert_eq!(event.kind(), "RIDE_ENDED");
        let frame: Value = serde_json::from_str(&event.to_frame(at).unwrap()).unwrap();
        assert_eq!(frame["payload"], json!({"ride_id": 9, "timestamp": "2025-05-04T08:00:00Z"}));
    }
}
