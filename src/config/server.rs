//! HTTP server configuration types.

use super::defaults::{
    default_channel_capacity, default_cors_origins, default_room_cleanup_interval_secs,
    default_session_idle_timeout_secs,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Server configuration for the HTTP and event stream surface.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Comma-separated list of allowed origins, or `*` for any
    #[serde(
        default = "default_cors_origins",
        deserialize_with = "comma_separated"
    )]
    pub cors_origins: String,
    /// Events buffered per room channel before slow subscribers lag
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Seconds between sweeps that close channels of expired rooms; 0 disables
    #[serde(default = "default_room_cleanup_interval_secs")]
    pub room_cleanup_interval_secs: u64,
    /// Anonymous sessions unused for this long are dropped by the sweep; 0 keeps them
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            channel_capacity: default_channel_capacity(),
            room_cleanup_interval_secs: default_room_cleanup_interval_secs(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn room_cleanup_interval(&self) -> Option<Duration> {
        (self.room_cleanup_interval_secs > 0)
            .then(|| Duration::from_secs(self.room_cleanup_interval_secs))
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        (self.session_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.session_idle_timeout_secs))
    }
}

/// Environment overrides containing commas arrive as arrays; join them back.
fn comma_separated<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Origins {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Origins::deserialize(deserializer)? {
        Origins::One(origins) => origins,
        Origins::Many(origins) => origins.join(","),
    })
}
