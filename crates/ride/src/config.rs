use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;
use chrono_tz::Tz;
use tracing::warn;

/// Timezone used when `TIMEZONE` does not name a known zone (fixed UTC-7).
const FALLBACK_TIMEZONE: Tz = chrono_tz::Etc::GMTPlus7;
const FALLBACK_CHECK_SECONDS: u64 = 30;

/// Distance and time limits that drive the ride lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum movement in meters that starts or resumes a ride.
    pub start_distance: f64,
    /// Movement in meters below which a tracking ride is considered paused.
    pub static_distance: f64,
    /// Time without any sample after which an open ride ends.
    pub general_inactivity: Duration,
    /// Time spent paused after which a ride ends.
    pub static_duration: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            start_distance: 8.0,
            static_distance: 8.0,
            general_inactivity: Duration::seconds(120),
            static_duration: Duration::seconds(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub thresholds: Thresholds,
    /// Zone used to name rides by their local start time.
    pub timezone: Tz,
    /// Period of the background inactivity check.
    pub inactivity_check_interval: StdDuration,
    /// Per-observer buffer size in the fan-out hub.
    pub observer_buffer: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let thresholds = Thresholds {
            start_distance: env_distance("RIDE_START_DISTANCE_METERS", 8.0),
            static_distance: env_distance("RIDE_END_STATIC_DIST_METERS", 8.0),
            general_inactivity: env_window("RIDE_END_INACTIVITY_SECONDS", 120),
            static_duration: env_window("RIDE_END_STATIC_SECONDS", 120),
        };

        let timezone = match env::var("TIMEZONE") {
            Ok(value) => value.parse::<Tz>().unwrap_or_else(|err| {
                warn!(timezone = %value, error = %err, "invalid timezone; using fixed UTC-7");
                FALLBACK_TIMEZONE
            }),
            Err(_) => chrono_tz::America::Los_Angeles,
        };

        let check_seconds = env_i64("INACTIVITY_CHECK_SECONDS")
            .unwrap_or_else(|| thresholds.static_duration.num_seconds());
        let inactivity_check_interval = check_interval(check_seconds);

        let observer_buffer = env::var("OBSERVER_BUFFER")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(256);

        Self { thresholds, timezone, inactivity_check_interval, observer_buffer }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn check_interval(seconds: i64) -> StdDuration {
    let seconds = u64::try_from(seconds).ok().filter(|s| *s > 0).unwrap_or(FALLBACK_CHECK_SECONDS);
    StdDuration::from_secs(seconds)
}

fn env_distance(key: &str, default: f64) -> f64 {
    distance(key, env_f64(key), default)
}

fn env_window(key: &str, default: i64) -> Duration {
    window(key, env_i64(key), default)
}

/// Non-negative distance in meters, or `default`.
fn distance(key: &str, meters: Option<f64>, default: f64) -> f64 {
    match meters {
        Some(meters) if meters.is_finite() && meters >= 0.0 => meters,
        Some(meters) => {
            warn!(key, meters, default, "distance must be a non-negative number; using default");
            default
        }
        None => default,
    }
}

/// Non-negative time window, or `default` seconds.
fn window(key: &str, seconds: Option<i64>, default: i64) -> Duration {
    let fallback = Duration::seconds(default);
    let Some(seconds) = seconds else {
        return fallback;
    };
    match Duration::try_seconds(seconds).filter(|_| seconds >= 0) {
        Some(window) => window,
        None => {
            warn!(key, seconds, default, "time window out of range; using default");
            fallback
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|value| value.parse::<f64>().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|value| value.parse::<i64>().ok())
}
