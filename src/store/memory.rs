use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{Batch, CommandReply, KeyValueStore, StoreCommand, StoreError};

#[derive(Debug, Clone)]
enum StoredValue {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type Entries = HashMap<String, Entry>;

/// In-memory store for single-instance deployments and tests.
///
/// Expired entries are dropped lazily on access. A batch runs under one write
/// lock and is rolled back from an undo log if any command fails.
pub struct InMemoryStore {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live keys (expired entries excluded).
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `key` holds a live value of any type.
    pub async fn contains_key(&self, key: &str) -> bool {
        live(&*self.entries.read().await, key, Instant::now()).is_some()
    }

    /// Drop every expired entry; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn live<'a>(entries: &'a Entries, key: &str, now: Instant) -> Option<&'a Entry> {
    entries.get(key).filter(|entry| entry.is_live(now))
}

fn live_mut<'a>(entries: &'a mut Entries, key: &str, now: Instant) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn deadline(ttl: Option<Duration>, now: Instant) -> Option<Instant> {
    ttl.map(|ttl| now + ttl)
}

fn read_string(entry: Option<&Entry>, key: &str) -> Result<Option<String>, StoreError> {
    match entry.map(|entry| &entry.value) {
        None => Ok(None),
        Some(StoredValue::Str(value)) => Ok(Some(value.clone())),
        Some(StoredValue::List(_)) => Err(StoreError::WrongType {
            key: key.to_string(),
            expected: "string",
        }),
    }
}

fn read_list<'a>(
    entry: Option<&'a Entry>,
    key: &str,
) -> Result<Option<&'a VecDeque<String>>, StoreError> {
    match entry.map(|entry| &entry.value) {
        None => Ok(None),
        Some(StoredValue::List(list)) => Ok(Some(list)),
        Some(StoredValue::Str(_)) => Err(StoreError::WrongType {
            key: key.to_string(),
            expected: "list",
        }),
    }
}

/// Resolve a possibly negative index against a list of `len` elements.
fn resolve_index(index: isize, len: usize) -> Option<usize> {
    let len = isize::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    (0..len)
        .contains(&resolved)
        .then(|| usize::try_from(resolved).ok())
        .flatten()
}

fn range_bounds(start: isize, stop: isize, len: usize) -> Option<(usize, usize)> {
    let len_i = isize::try_from(len).ok()?;
    let start = if start < 0 { (len_i + start).max(0) } else { start };
    let stop = if stop < 0 { len_i + stop } else { stop.min(len_i - 1) };
    if len == 0 || start > stop || start >= len_i {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn push(
    entries: &mut Entries,
    key: &str,
    value: String,
    front: bool,
    now: Instant,
) -> Result<usize, StoreError> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
        value: StoredValue::List(VecDeque::new()),
        expires_at: None,
    });
    match &mut entry.value {
        StoredValue::List(list) => {
            if front {
                list.push_front(value);
            } else {
                list.push_back(value);
            }
            Ok(list.len())
        }
        StoredValue::Str(_) => Err(StoreError::WrongType {
            key: key.to_string(),
            expected: "list",
        }),
    }
}

fn apply(
    entries: &mut Entries,
    command: StoreCommand,
    now: Instant,
) -> Result<CommandReply, StoreError> {
    match command {
        StoreCommand::Set { key, value, ttl } => {
            entries.insert(
                key,
                Entry {
                    value: StoredValue::Str(value),
                    expires_at: deadline(ttl, now),
                },
            );
            Ok(CommandReply::Ok)
        }
        StoreCommand::Del { key } => {
            let existed = live(entries, &key, now).is_some();
            entries.remove(&key);
            Ok(CommandReply::Applied(existed))
        }
        StoreCommand::DeleteIfEquals { key, expected } => {
            let matches = matches!(
                live(entries, &key, now).map(|entry| &entry.value),
                Some(StoredValue::Str(current)) if *current == expected
            );
            if matches {
                entries.remove(&key);
            }
            Ok(CommandReply::Applied(matches))
        }
        StoreCommand::SetIfEquals {
            key,
            expected,
            value,
            ttl,
        } => {
            let matches = matches!(
                live(entries, &key, now).map(|entry| &entry.value),
                Some(StoredValue::Str(current)) if *current == expected
            );
            if !matches {
                return Err(StoreError::Conflict { key });
            }
            entries.insert(
                key,
                Entry {
                    value: StoredValue::Str(value),
                    expires_at: deadline(ttl, now),
                },
            );
            Ok(CommandReply::Ok)
        }
        StoreCommand::LPush { key, value } => {
            push(entries, &key, value, true, now).map(CommandReply::Length)
        }
        StoreCommand::RPush { key, value } => {
            push(entries, &key, value, false, now).map(CommandReply::Length)
        }
        StoreCommand::Expire { key, ttl } => match live_mut(entries, &key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(CommandReply::Applied(true))
            }
            None => Ok(CommandReply::Applied(false)),
        },
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        read_string(live(&entries, key, Instant::now()), key)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        apply(
            &mut entries,
            StoreCommand::Set {
                key: key.to_string(),
                value,
                ttl,
            },
            Instant::now(),
        )
        .map(|_| ())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if live_mut(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: StoredValue::Str(value),
                expires_at: deadline(ttl, now),
            },
        );
        Ok(true)
    }

    async fn mset(&self, pairs: Vec<(String, String)>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        for (key, value) in pairs {
            entries.insert(
                key,
                Entry {
                    value: StoredValue::Str(value),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let reply = apply(
            &mut entries,
            StoreCommand::DeleteIfEquals {
                key: key.to_string(),
                expected: expected.to_string(),
            },
            Instant::now(),
        )?;
        Ok(matches!(reply, CommandReply::Applied(true)))
    }

    async fn lpush(&self, key: &str, value: String) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        push(&mut entries, key, value, true, Instant::now())
    }

    async fn rpush(&self, key: &str, value: String) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        push(&mut entries, key, value, false, Instant::now())
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().await;
        let Some(list) = read_list(live(&entries, key, Instant::now()), key)? else {
            return Ok(Vec::new());
        };
        Ok(match range_bounds(start, stop, list.len()) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn lindex(&self, key: &str, index: isize) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        let Some(list) = read_list(live(&entries, key, Instant::now()), key)? else {
            return Ok(None);
        };
        Ok(resolve_index(index, list.len()).and_then(|idx| list.get(idx).cloned()))
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let entries = self.entries.read().await;
        Ok(read_list(live(&entries, key, Instant::now()), key)?.map_or(0, VecDeque::len))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let reply = apply(
            &mut entries,
            StoreCommand::Expire {
                key: key.to_string(),
                ttl,
            },
            Instant::now(),
        )?;
        Ok(matches!(reply, CommandReply::Applied(true)))
    }

    async fn execute_batch(&self, batch: Batch) -> Result<Vec<CommandReply>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut undo: HashMap<String, Option<Entry>> = HashMap::new();
        let mut replies = Vec::with_capacity(batch.len());

        for command in batch.into_commands() {
            undo.entry(command.key().to_string())
                .or_insert_with(|| entries.get(command.key()).cloned());

            match apply(&mut entries, command, now) {
                Ok(reply) => replies.push(reply),
                Err(error) => {
                    for (key, previous) in undo {
                        match previous {
                            Some(entry) => {
                                entries.insert(key, entry);
                            }
                            None => {
                                entries.remove(&key);
                            }
                        }
                    }
                    if matches!(error, StoreError::Conflict { .. }) {
                        tracing::debug!(%error, "Store batch rolled back");
                    } else {
                        tracing::warn!(%error, "Store batch rolled back");
                    }
                    return Err(error);
                }
            }
        }

        Ok(replies)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
