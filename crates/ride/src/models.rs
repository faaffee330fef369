use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo;

/// Identifier assigned to a ride by the store.
pub type RideId = i64;

/// A single position sample reported by the tracked vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in knots, when the device reports one.
    #[serde(rename = "speed_knots", default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self { latitude, longitude, speed: None, timestamp }
    }

    #[must_use]
    pub const fn with_speed(mut self, knots: f64) -> Self {
        self.speed = Some(knots);
        self
    }

    /// Great-circle distance to `other`, in meters.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        geo::distance_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Ride as listed by the query API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideSummary {
    pub id: RideId,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Ride together with its recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideDetail {
    pub id: RideId,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub positions: Vec<Position>,
}

impl RideDetail {
    #[must_use]
    pub fn summary(&self) -> RideSummary {
        RideSummary {
            id: self.id,
            name: self.name.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::Position;

    #[test]
    fn speed_serializes_as_knots() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();

        let value = serde_json::to_value(Position::new(1.0, 2.0, at).with_speed(3.5)).unwrap();
        assert_eq!(value["speed_knots"], json!(3.5));

        let value = serde_json::to_value(Position::new(1.0, 2.0, at)).unwrap();
        assert!(value.get("speed_knots").is_none());
    }
}
