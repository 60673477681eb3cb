use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the matchmaking and game paths, exposed at `/metrics`.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Session metrics
    pub sessions_issued: AtomicU64,
    pub authentication_failures: AtomicU64,

    // Room operation metrics
    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub rooms_closed: AtomicU64,
    pub stale_open_rooms: AtomicU64,
    pub room_code_collisions: AtomicU64,

    // Distributed lock metrics
    pub lock_acquisitions: AtomicU64,
    pub lock_unavailable: AtomicU64,
    pub lock_release_failures: AtomicU64,

    // Retry metrics
    pub retry_attempts: AtomicU64,
    pub retry_successes: AtomicU64,

    // Game metrics
    pub answers_accepted: AtomicU64,
    pub answers_rejected: AtomicU64,
    pub searches: AtomicU64,
    pub upstream_failures: AtomicU64,

    // Broadcast metrics
    pub events_published: AtomicU64,
    pub events_undelivered: AtomicU64,
    pub active_subscribers: AtomicU64,

    // Error tracking
    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub sessions_issued: u64,
    pub authentication_failures: u64,
    pub rooms: RoomMetrics,
    pub locks: LockMetrics,
    pub retry_attempts: u64,
    pub retry_successes: u64,
    pub retry_success_rate: f64,
    pub game: GameMetrics,
    pub broadcast: BroadcastMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoomMetrics {
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub rooms_closed: u64,
    pub stale_open_rooms: u64,
    pub room_code_collisions: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LockMetrics {
    pub acquisitions: u64,
    pub unavailable: u64,
    pub release_failures: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameMetrics {
    pub answers_accepted: u64,
    pub answers_rejected: u64,
    pub searches: u64,
    pub upstream_failures: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BroadcastMetrics {
    pub events_published: u64,
    pub events_undelivered: u64,
    pub active_subscribers: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorMetrics {
    pub validation_errors: u64,
    pub internal_errors: u64,
    pub total_errors: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_sessions_issued(&self) {
        self.sessions_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_authentication_failures(&self) {
        self.authentication_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_joined(&self) {
        self.rooms_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_closed(&self) {
        self.rooms_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale_open_rooms(&self) {
        self.stale_open_rooms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_room_code_collisions(&self) {
        self.room_code_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lock_acquisitions(&self) {
        self.lock_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lock_unavailable(&self) {
        self.lock_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lock_release_failures(&self) {
        self.lock_release_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_attempts(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_successes(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_answers_accepted(&self) {
        self.answers_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_answers_rejected(&self) {
        self.answers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_searches(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upstream_failures(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_events_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_events_undelivered(&self) {
        self.events_undelivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_active_subscribers(&self) {
        self.active_subscribers.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturating decrement; a stray disconnect must not wrap the gauge.
    pub fn decrement_active_subscribers(&self) {
        let _ = self
            .active_subscribers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(1))
            });
    }

    pub fn increment_validation_errors(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let retry_attempts = self.retry_attempts.load(Ordering::Relaxed);
        let retry_successes = self.retry_successes.load(Ordering::Relaxed);
        let retry_success_rate = if retry_attempts > 0 {
            (retry_successes as f64) / (retry_attempts as f64)
        } else {
            1.0
        };

        let validation_errors = self.validation_errors.load(Ordering::Relaxed);
        let internal_errors = self.internal_errors.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            sessions_issued: self.sessions_issued.load(Ordering::Relaxed),
            authentication_failures: self.authentication_failures.load(Ordering::Relaxed),
            rooms: RoomMetrics {
                rooms_created: self.rooms_created.load(Ordering::Relaxed),
                rooms_joined: self.rooms_joined.load(Ordering::Relaxed),
                rooms_closed: self.rooms_closed.load(Ordering::Relaxed),
                stale_open_rooms: self.stale_open_rooms.load(Ordering::Relaxed),
                room_code_collisions: self.room_code_collisions.load(Ordering::Relaxed),
            },
            locks: LockMetrics {
                acquisitions: self.lock_acquisitions.load(Ordering::Relaxed),
                unavailable: self.lock_unavailable.load(Ordering::Relaxed),
                release_failures: self.lock_release_failures.load(Ordering::Relaxed),
            },
            retry_attempts,
            retry_successes,
            retry_success_rate,
            game: GameMetrics {
                answers_accepted: self.answers_accepted.load(Ordering::Relaxed),
                answers_rejected: self.answers_rejected.load(Ordering::Relaxed),
                searches: self.searches.load(Ordering::Relaxed),
                upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            },
            broadcast: BroadcastMetrics {
                events_published: self.events_published.load(Ordering::Relaxed),
                events_undelivered: self.events_undelivered.load(Ordering::Relaxed),
                active_subscribers: self.active_subscribers.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                validation_errors,
                internal_errors,
                total_errors: validation_errors + internal_errors,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_start_at_zero() {
        let snapshot = ServerMetrics::new().snapshot();
        assert_eq!(snapshot.rooms.rooms_created, 0);
        assert_eq!(snapshot.locks.acquisitions, 0);
        assert_eq!(snapshot.retry_success_rate, 1.0);
    }

    #[test]
    fn active_subscribers_never_underflow() {
        let metrics = ServerMetrics::new();
        metrics.decrement_active_subscribers();
        assert_eq!(metrics.snapshot().broadcast.active_subscribers, 0);
        metrics.increment_active_subscribers();
        metrics.increment_active_subscribers();
        metrics.decrement_active_subscribers();
        assert_eq!(metrics.snapshot().broadcast.active_subscribers, 1);
    }

    #[test]
    fn error_totals_are_summed() {
        let metrics = ServerMetrics::new();
        metrics.increment_validation_errors();
        metrics.increment_internal_errors();
        metrics.increment_internal_errors();
        let errors = metrics.snapshot().errors;
        assert_eq!(errors.total_errors, 3);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let metrics = Arc::new(ServerMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_rooms_joined();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().rooms.rooms_joined, 8000);
    }
}
