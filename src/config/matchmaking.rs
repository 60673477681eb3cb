//! Matchmaking configuration types.

use super::defaults::{
    default_lock_attempts, default_lock_lease_ms, default_lock_retry_delay_ms,
    default_room_code_length, default_room_ttl_secs,
};
use crate::coordination::MatchmakingSettings;
use crate::distributed::LockRetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Room assignment and lock behavior.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MatchmakingConfig {
    /// Attempts at the matchmaking lock before a join fails as unavailable
    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,
    /// Fixed delay between lock attempts (milliseconds)
    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,
    /// Lease on the lock so a crashed holder cannot block joins (milliseconds)
    #[serde(default = "default_lock_lease_ms")]
    pub lock_lease_ms: u64,
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// Lifetime of idle room state (seconds); 0 disables expiry
    #[serde(default = "default_room_ttl_secs")]
    pub room_ttl_secs: u64,
    /// Seed for the first-mover coin flip; random when unset
    #[serde(default)]
    pub turn_order_seed: Option<u64>,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            lock_attempts: default_lock_attempts(),
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
            lock_lease_ms: default_lock_lease_ms(),
            room_code_length: default_room_code_length(),
            room_ttl_secs: default_room_ttl_secs(),
            turn_order_seed: None,
        }
    }
}

impl MatchmakingConfig {
    pub fn room_ttl(&self) -> Option<Duration> {
        (self.room_ttl_secs > 0).then(|| Duration::from_secs(self.room_ttl_secs))
    }

    pub fn lock_policy(&self) -> LockRetryPolicy {
        LockRetryPolicy {
            attempts: self.lock_attempts,
            delay: Duration::from_millis(self.lock_retry_delay_ms),
            lease: Duration::from_millis(self.lock_lease_ms),
        }
    }

    pub fn settings(&self) -> MatchmakingSettings {
        MatchmakingSettings {
            lock_policy: self.lock_policy(),
            room_code_length: self.room_code_length,
            room_ttl: self.room_ttl(),
        }
    }
}
