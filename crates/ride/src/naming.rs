use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

/// Labels a ride by the local time of day it started in `timezone`.
#[must_use]
pub fn determine_ride_name(start: DateTime<Utc>, timezone: Tz) -> &'static str {
    match start.with_timezone(&timezone).hour() {
        6..=11 => "Morning Ride",
        12..=17 => "Afternoon Ride",
        18..=21 => "Evening Ride",
        _ => "Night Ride",
    }
}
