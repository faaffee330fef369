use std::env;

/// Service level settings. Ride thresholds live in [`ride::Config`].
#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub alert_topic: String,
    pub shadow_update_topic: String,
    pub alerts_enabled: bool,
    /// Enables the endpoint that injects shadow documents into the feed.
    pub test_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_address: get_server_address(),
            alert_topic: get_alert_topic(),
            shadow_update_topic: get_shadow_update_topic(),
            alerts_enabled: env_bool("ALERTS_ENABLED", false),
            test_mode: env_bool("TEST_MODE", false),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

pub fn get_server_address() -> String {
    if let Ok(address) = env::var("SERVER_ADDRESS") {
        return listen_address(&address);
    }
    let port = env::var("PORT").unwrap_or_else(|_| {
        tracing::trace!("PORT not set, using default: 8080");
        "8080".to_string()
    });
    listen_address(&port)
}

pub fn get_alert_topic() -> String {
    env::var("ALERT_TOPIC").unwrap_or_else(|_| {
        let default = "ride-alerts".to_string();
        tracing::trace!("ALERT_TOPIC not set, using default: {default}");
        default
    })
}

pub fn get_shadow_update_topic() -> String {
    env::var("SHADOW_UPDATE_TOPIC").unwrap_or_else(|_| {
        let default = "device/shadow/update".to_string();
        tracing::trace!("SHADOW_UPDATE_TOPIC not set, using default: {default}");
        default
    })
}

// ":8080" and "8080" both bind every interface
fn listen_address(value: &str) -> String {
    let value = value.trim();
    if let Some(port) = value.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if value.parse::<u16>().is_ok() {
        format!("0.0.0.0:{value}")
    } else {
        value.to_string()
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}
