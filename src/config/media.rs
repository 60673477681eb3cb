//! Media metadata provider configuration types.

use super::defaults::{default_media_provider, default_request_timeout_ms, default_tmdb_base_url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaProviderKind {
    /// TMDB v3 HTTP API
    Tmdb,
    /// Local JSON catalog
    Static,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MediaConfig {
    #[serde(default = "default_media_provider")]
    pub provider: MediaProviderKind,
    #[serde(default = "default_tmdb_base_url")]
    pub tmdb_base_url: String,
    /// TMDB API read access token
    #[serde(default)]
    pub tmdb_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Catalog file for the static provider
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            provider: default_media_provider(),
            tmdb_base_url: default_tmdb_base_url(),
            tmdb_token: None,
            request_timeout_ms: default_request_timeout_ms(),
            catalog_path: None,
        }
    }
}

impl MediaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
