//! Configuration module for the castlink server.
//!
//! Configuration is assembled from JSON files, an inline JSON environment
//! variable, per-field `CASTLINK__*` overrides and compiled-in defaults.
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: HTTP surface and room channel settings
//! - [`matchmaking`]: Lock budget, room codes and room lifetime
//! - [`game`]: Seed media and search limits
//! - [`media`]: Metadata provider selection
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod game;
pub mod loader;
pub mod logging;
pub mod matchmaking;
pub mod media;
pub mod server;
pub mod types;
pub mod validation;

pub use game::GameConfig;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use matchmaking::MatchmakingConfig;

pub use media::{MediaConfig, MediaProviderKind};

pub use server::ServerConfig;

pub use types::Config;

pub use validation::validate_config;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3536);
        assert_eq!(
            config.server.cors_origins,
            "http://localhost:3000,http://localhost:5173"
        );
        assert_eq!(config.server.channel_capacity, 64);

        assert_eq!(config.matchmaking.lock_attempts, 10);
        assert_eq!(config.matchmaking.lock_retry_delay_ms, 100);
        assert_eq!(config.matchmaking.lock_lease_ms, 5000);
        assert_eq!(config.matchmaking.room_code_length, 12);
        assert_eq!(
            config.matchmaking.room_ttl(),
            Some(Duration::from_secs(21600))
        );

        assert!(config.game.seed.is_none());
        assert_eq!(config.game.max_search_results, 5);

        assert_eq!(config.media.provider, MediaProviderKind::Tmdb);
        assert_eq!(config.media.tmdb_base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.media.request_timeout(), Duration::from_secs(5));

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "server.log");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"matchmaking": {"room_ttl_secs": 0}, "port": 9000}"#)
                .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.matchmaking.room_ttl(), None);
        assert_eq!(config.matchmaking.lock_attempts, 10);
        assert_eq!(config.media.provider, MediaProviderKind::Tmdb);
    }

    #[test]
    fn test_lock_policy_from_config() {
        let config = MatchmakingConfig {
            lock_attempts: 3,
            lock_retry_delay_ms: 25,
            lock_lease_ms: 1000,
            ..Default::default()
        };
        let policy = config.lock_policy();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(25));
        assert_eq!(policy.lease, Duration::from_secs(1));
        assert_eq!(config.settings().room_code_length, 12);
    }
}
