//! Shared key-value store abstraction
//!
//! All cross-request state (game states, player index, the open-room pointer
//! and lock leases) lives behind [`KeyValueStore`]. Values are JSON encoded;
//! typed reads go through [`decode_or_absent`] so a malformed value is treated
//! exactly like a missing one.
//!
//! Multi-key updates are expressed as a [`Batch`] and executed atomically by
//! [`KeyValueStore::execute_batch`].

pub mod keys;
mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("value at `{key}` holds the wrong type (expected {expected})")]
    WrongType { key: String, expected: &'static str },
    #[error("failed to encode value for `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("value at `{key}` changed since it was read")]
    Conflict { key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One command inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Del {
        key: String,
    },
    DeleteIfEquals {
        key: String,
        expected: String,
    },
    /// Overwrite `key` only while it still holds `expected`; otherwise the
    /// whole batch fails with [`StoreError::Conflict`].
    SetIfEquals {
        key: String,
        expected: String,
        value: String,
        ttl: Option<Duration>,
    },
    LPush {
        key: String,
        value: String,
    },
    RPush {
        key: String,
        value: String,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
}

impl StoreCommand {
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::Del { key }
            | Self::DeleteIfEquals { key, .. }
            | Self::SetIfEquals { key, .. }
            | Self::LPush { key, .. }
            | Self::RPush { key, .. }
            | Self::Expire { key, .. } => key,
        }
    }
}

/// Reply to one batched command, in command order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    Ok,
    /// Whether a delete or expire touched an existing key.
    Applied(bool),
    /// List length after a push.
    Length(usize),
}

/// Ordered list of commands applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    commands: Vec<StoreCommand>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_json<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<&mut Self, StoreError> {
        let key = key.into();
        let value = encode(&key, value)?;
        self.commands.push(StoreCommand::Set { key, value, ttl });
        Ok(self)
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(StoreCommand::Del { key: key.into() });
        self
    }

    pub fn delete_if_equals<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        expected: &T,
    ) -> Result<&mut Self, StoreError> {
        let key = key.into();
        let expected = encode(&key, expected)?;
        self.commands
            .push(StoreCommand::DeleteIfEquals { key, expected });
        Ok(self)
    }

    /// Compare-and-set against the raw value previously read from `key`.
    pub fn set_if_equals_json<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        expected: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<&mut Self, StoreError> {
        let key = key.into();
        let value = encode(&key, value)?;
        self.commands.push(StoreCommand::SetIfEquals {
            key,
            expected: expected.into(),
            value,
            ttl,
        });
        Ok(self)
    }

    pub fn lpush_json<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, StoreError> {
        let key = key.into();
        let value = encode(&key, value)?;
        self.commands.push(StoreCommand::LPush { key, value });
        Ok(self)
    }

    pub fn rpush_json<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, StoreError> {
        let key = key.into();
        let value = encode(&key, value)?;
        self.commands.push(StoreCommand::RPush { key, value });
        Ok(self)
    }

    pub fn expire(&mut self, key: impl Into<String>, ttl: Duration) -> &mut Self {
        self.commands.push(StoreCommand::Expire {
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[StoreCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<StoreCommand> {
        self.commands
    }
}

/// Access contract for the shared store (string and list values with TTLs).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Set only if the key is absent (or expired). Returns whether it was set.
    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    async fn mset(&self, entries: Vec<(String, String)>) -> Result<(), StoreError>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Delete `key` only while it still holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    async fn lpush(&self, key: &str, value: String) -> Result<usize, StoreError>;

    async fn rpush(&self, key: &str, value: String) -> Result<usize, StoreError>;

    /// Inclusive range with negative indices counting from the tail.
    async fn lrange(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, StoreError>;

    async fn lindex(&self, key: &str, index: isize) -> Result<Option<String>, StoreError>;

    async fn llen(&self, key: &str) -> Result<usize, StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Apply every command or none of them.
    async fn execute_batch(&self, batch: Batch) -> Result<Vec<CommandReply>, StoreError>;

    async fn health_check(&self) -> bool;
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

/// Decode a raw store value, treating malformed values as absent.
pub fn decode_or_absent<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key, %error, "Discarding malformed store value");
            None
        }
    }
}

/// Typed `get` through [`decode_or_absent`].
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let raw = store.get(key).await?;
    Ok(decode_or_absent(key, raw))
}

/// Typed `get` that also returns the raw value, for a later
/// [`Batch::set_if_equals_json`].
pub async fn get_json_versioned<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<(String, T)>, StoreError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    Ok(decode_or_absent(key, Some(raw.clone())).map(|value| (raw, value)))
}

/// Typed `set` with JSON encoding.
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    store.set(key, encode(key, value)?, ttl).await
}

/// Typed `lrange` over the whole list; malformed elements are skipped.
pub async fn list_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Vec<T>, StoreError> {
    let raw = store.lrange(key, 0, -1).await?;
    Ok(raw
        .into_iter()
        .filter_map(|value| decode_or_absent(key, Some(value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn decode_or_absent_handles_missing_and_malformed_alike() {
        assert_eq!(decode_or_absent::<Sample>("k", None), None);
        assert_eq!(
            decode_or_absent::<Sample>("k", Some("not json".to_string())),
            None
        );
        assert_eq!(
            decode_or_absent::<Sample>("k", Some(r#"{"name":"x"}"#.to_string())),
            None
        );
        assert_eq!(
            decode_or_absent::<Sample>("k", Some(r#"{"name":"x","count":2}"#.to_string())),
            Some(Sample {
                name: "x".to_string(),
                count: 2
            })
        );
    }

    #[test]
    fn batch_builder_encodes_values_as_json() {
        let mut batch = Batch::new();
        batch
            .set_json("a", "code", None)
            .unwrap()
            .del("b")
            .expire("c", Duration::from_secs(5));
        assert_eq!(batch.len(), 3);
        assert_eq!(
            batch.commands()[0],
            StoreCommand::Set {
                key: "a".to_string(),
                value: "\"code\"".to_string(),
                ttl: None
            }
        );
        assert_eq!(batch.commands()[1].key(), "b");
    }

    #[tokio::test]
    async fn typed_helpers_round_trip_through_store() {
        let store = InMemoryStore::new();
        let value = Sample {
            name: "room".to_string(),
            count: 1,
        };
        set_json(&store, "sample", &value, None).await.unwrap();
        let loaded: Option<Sample> = get_json(&store, "sample").await.unwrap();
        assert_eq!(loaded, Some(value));

        store.set("broken", "{".to_string(), None).await.unwrap();
        let broken: Option<Sample> = get_json(&store, "broken").await.unwrap();
        assert_eq!(broken, None);
    }

    #[tokio::test]
    async fn list_json_skips_malformed_elements() {
        let store = InMemoryStore::new();
        store.rpush("ids", "1".to_string()).await.unwrap();
        store.rpush("ids", "oops".to_string()).await.unwrap();
        store.rpush("ids", "3".to_string()).await.unwrap();
        let ids: Vec<u32> = list_json(&store, "ids").await.unwrap();
        assert_eq!(ids, vec![1, 3]);
    }
}
