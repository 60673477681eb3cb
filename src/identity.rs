//! Player identity
//!
//! Sessions map an opaque bearer token to a [`Player`]. The in-memory provider
//! issues anonymous sessions; a deployment backed by a real account system
//! implements [`IdentityProvider`] instead.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::GameError;
use crate::protocol::PlayerId;

pub const MAX_DISPLAY_NAME_LENGTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub player: Player,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token; `None` for unknown tokens.
    async fn authenticate(&self, token: &str) -> Option<Player>;

    async fn display_name(&self, player_id: &PlayerId) -> Option<String>;
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    player_id: PlayerId,
    last_seen: Instant,
}

/// Anonymous sessions kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityProvider {
    sessions: Arc<DashMap<String, SessionEntry>>,
    players: Arc<DashMap<PlayerId, Player>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a session for a new anonymous player.
    pub fn issue_session(&self, name: &str) -> Result<Session, GameError> {
        let name = normalize_name(name)?;
        let player = Player {
            id: Uuid::new_v4(),
            name,
        };
        let token = Uuid::new_v4().simple().to_string();
        self.players.insert(player.id, player.clone());
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                player_id: player.id,
                last_seen: Instant::now(),
            },
        );
        tracing::info!(player_id = %player.id, "Issued anonymous session");
        Ok(Session { token, player })
    }

    /// Register a known player without issuing a token.
    pub fn register(&self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn forget(&self, player_id: &PlayerId) {
        self.players.remove(player_id);
        self.sessions.retain(|_, entry| entry.player_id != *player_id);
    }

    /// Drop sessions not used for `max_idle`, and players left without one.
    /// Returns the number of sessions removed.
    pub fn expire_idle(&self, max_idle: Duration) -> usize {
        let mut orphaned = HashSet::new();
        let mut removed = 0;
        self.sessions.retain(|_, entry| {
            let keep = entry.last_seen.elapsed() < max_idle;
            if !keep {
                orphaned.insert(entry.player_id);
                removed += 1;
            }
            keep
        });
        for entry in self.sessions.iter() {
            orphaned.remove(&entry.player_id);
        }
        for player_id in &orphaned {
            self.players.remove(player_id);
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn authenticate(&self, token: &str) -> Option<Player> {
        let player_id = {
            let mut entry = self.sessions.get_mut(token)?;
            entry.last_seen = Instant::now();
            entry.player_id
        };
        self.players.get(&player_id).map(|entry| entry.clone())
    }

    async fn display_name(&self, player_id: &PlayerId) -> Option<String> {
        self.players.get(player_id).map(|entry| entry.name.clone())
    }
}

fn normalize_name(name: &str) -> Result<String, GameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GameError::InvalidInput(
            "display name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GameError::InvalidInput(
            "display name must not contain control characters".to_string(),
        ));
    }
    Ok(trimmed.chars().take(MAX_DISPLAY_NAME_LENGTH).collect())
}
