//! Store-backed distributed lock
//!
//! A lease is a `lock:{resource}` key set only-if-absent with a TTL and a
//! random token as its value. Release deletes the key only while it still
//! holds the caller's token, so an expired lease re-acquired by another
//! instance is never released by the previous holder.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::ServerMetrics;
use crate::retry::{RetryConfig, RetryExecutor};
use crate::store::{keys, KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock `{resource}` is held by another owner")]
    Busy { resource: String },
    #[error("lock `{resource}` unavailable after {attempts} attempts")]
    Unavailable { resource: String, attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How hard to try for a lock and how long to hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub lease: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
            lease: Duration::from_secs(5),
        }
    }
}

/// Proof of a held lease. Consumed by release.
#[derive(Debug)]
pub struct LockHandle {
    pub resource: String,
    pub token: Uuid,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
    pub lease: Duration,
}

impl LockHandle {
    pub fn new(resource: impl Into<String>, lease: Duration) -> Self {
        Self {
            resource: resource.into(),
            token: Uuid::new_v4(),
            acquired_at: chrono::Utc::now(),
            lease,
        }
    }
}

/// Distributed lock interface for cross-instance coordination
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try once; `None` when another owner holds the lease.
    async fn try_acquire(
        &self,
        resource: &str,
        lease: Duration,
    ) -> Result<Option<LockHandle>, LockError>;

    /// Release a lease. Returns false when it had already expired or been taken over.
    async fn release(&self, handle: LockHandle) -> Result<bool, LockError>;

    async fn is_locked(&self, resource: &str) -> Result<bool, LockError>;
}

/// Lock whose leases live in the shared store.
pub struct StoreDistributedLock {
    store: Arc<dyn KeyValueStore>,
}

impl StoreDistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DistributedLock for StoreDistributedLock {
    async fn try_acquire(
        &self,
        resource: &str,
        lease: Duration,
    ) -> Result<Option<LockHandle>, LockError> {
        let handle = LockHandle::new(resource, lease);
        let acquired = self
            .store
            .set_if_absent(&keys::lock(resource), handle.token.to_string(), Some(lease))
            .await?;
        Ok(acquired.then_some(handle))
    }

    async fn release(&self, handle: LockHandle) -> Result<bool, LockError> {
        let released = self
            .store
            .delete_if_equals(&keys::lock(&handle.resource), &handle.token.to_string())
            .await?;
        Ok(released)
    }

    async fn is_locked(&self, resource: &str) -> Result<bool, LockError> {
        Ok(self.store.get(&keys::lock(resource)).await?.is_some())
    }
}

/// Acquire `resource`, retrying a busy lease up to `policy.attempts` times.
pub async fn acquire(
    lock: &dyn DistributedLock,
    resource: &str,
    policy: &LockRetryPolicy,
    metrics: Option<&Arc<ServerMetrics>>,
) -> Result<LockHandle, LockError> {
    let config = RetryConfig::fixed(policy.attempts, policy.delay);
    let executor = match metrics {
        Some(metrics) => RetryExecutor::with_metrics(config, metrics.clone()),
        None => RetryExecutor::new(config),
    };

    let result = executor
        .execute_with_condition(
            "distributed_lock_acquire",
            || async move {
                lock.try_acquire(resource, policy.lease)
                    .await?
                    .ok_or_else(|| LockError::Busy {
                        resource: resource.to_string(),
                    })
            },
            |error| matches!(error, LockError::Busy { .. }),
        )
        .await;

    match result {
        Ok(handle) => {
            if let Some(metrics) = metrics {
                metrics.increment_lock_acquisitions();
            }
            Ok(handle)
        }
        Err(LockError::Busy { resource }) => {
            if let Some(metrics) = metrics {
                metrics.increment_lock_unavailable();
            }
            Err(LockError::Unavailable {
                resource,
                attempts: executor.config().max_attempts,
            })
        }
        Err(error) => Err(error),
    }
}

/// Run `section` while holding `resource`. The lease is released on every
/// outcome; a failed release is logged and left to expire.
pub async fn with_lock<T, E, F, Fut>(
    lock: &dyn DistributedLock,
    resource: &str,
    policy: &LockRetryPolicy,
    metrics: Option<&Arc<ServerMetrics>>,
    section: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let handle = acquire(lock, resource, policy, metrics).await?;
    let token = handle.token;
    let outcome = section().await;

    match lock.release(handle).await {
        Ok(true) => debug!(resource, %token, "Released lock"),
        Ok(false) => {
            warn!(resource, %token, "Lock lease expired before release");
            if let Some(metrics) = metrics {
                metrics.increment_lock_release_failures();
            }
        }
        Err(error) => {
            warn!(resource, %token, %error, "Failed to release lock");
            if let Some(metrics) = metrics {
                metrics.increment_lock_release_failures();
            }
        }
    }

    outcome
}
