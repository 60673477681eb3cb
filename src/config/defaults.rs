//! Default value functions for configuration fields.
//!
//! Used by serde's `#[serde(default = ...)]` attributes throughout the
//! configuration tree.

use super::logging::LogFormat;
use super::media::MediaProviderKind;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3536
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:5173".to_string()
}

pub const fn default_channel_capacity() -> usize {
    64
}

pub const fn default_room_cleanup_interval_secs() -> u64 {
    60
}

pub const fn default_session_idle_timeout_secs() -> u64 {
    86_400 // 24 hours
}

// =============================================================================
// Matchmaking Defaults
// =============================================================================

pub const fn default_lock_attempts() -> u32 {
    10
}

pub const fn default_lock_retry_delay_ms() -> u64 {
    100
}

/// Lease on the matchmaking lock; a crashed holder blocks joins at most this long.
pub const fn default_lock_lease_ms() -> u64 {
    5_000
}

pub const fn default_room_code_length() -> usize {
    12
}

pub const fn default_room_ttl_secs() -> u64 {
    21_600 // 6 hours
}

// =============================================================================
// Game Defaults
// =============================================================================

pub const fn default_max_search_results() -> usize {
    5
}

// =============================================================================
// Media Provider Defaults
// =============================================================================

pub const fn default_media_provider() -> MediaProviderKind {
    MediaProviderKind::Tmdb
}

pub fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

pub const fn default_request_timeout_ms() -> u64 {
    5_000
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
