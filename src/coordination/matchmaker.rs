//! Room matchmaking
//!
//! At most one room waits for a second player at any time; its code is kept
//! at [`keys::OPEN_ROOM`]. Reading and changing that pointer happens only
//! while holding the matchmaking lock, so concurrent joins are totally ordered:
//! the first creates a room, the next fills it, the third creates again.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::turn_order::TurnOrder;
use crate::broadcast::{publish_best_effort, EventPublisher};
use crate::distributed::{with_lock, DistributedLock, LockRetryPolicy};
use crate::error::GameError;
use crate::identity::IdentityProvider;
use crate::metrics::ServerMetrics;
use crate::protocol::room_codes::generate_room_code;
use crate::protocol::{
    EndGamePayload, EndGameReason, GameSeed, GameState, JoinResponse, OpponentInfo, PlayerId,
    RoomCode, RoomEvent, DEFAULT_ROOM_CODE_LENGTH,
};
use crate::store::{
    get_json, get_json_versioned, keys, list_json, Batch, KeyValueStore, StoreError,
};

/// Fresh codes tried before giving up on a collision streak.
const MAX_ROOM_CODE_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone)]
pub struct MatchmakingSettings {
    pub lock_policy: LockRetryPolicy,
    pub room_code_length: usize,
    /// Lifetime of room state and index entries; refreshed on every move.
    pub room_ttl: Option<Duration>,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            lock_policy: LockRetryPolicy::default(),
            room_code_length: DEFAULT_ROOM_CODE_LENGTH,
            room_ttl: Some(Duration::from_secs(6 * 60 * 60)),
        }
    }
}

enum Assignment {
    Created { room_code: RoomCode, state: GameState },
    Filled { room_code: RoomCode, state: GameState },
}

/// Collaborators of [`RoomCoordinator`].
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub lock: Arc<dyn DistributedLock>,
    pub publisher: Arc<dyn EventPublisher>,
    pub identity: Arc<dyn IdentityProvider>,
    pub turn_order: Arc<dyn TurnOrder>,
    pub metrics: Arc<ServerMetrics>,
}

pub struct RoomCoordinator {
    store: Arc<dyn KeyValueStore>,
    lock: Arc<dyn DistributedLock>,
    publisher: Arc<dyn EventPublisher>,
    identity: Arc<dyn IdentityProvider>,
    turn_order: Arc<dyn TurnOrder>,
    metrics: Arc<ServerMetrics>,
    settings: MatchmakingSettings,
}

impl RoomCoordinator {
    pub fn new(deps: CoordinatorDeps, settings: MatchmakingSettings) -> Self {
        Self {
            store: deps.store,
            lock: deps.lock,
            publisher: deps.publisher,
            identity: deps.identity,
            turn_order: deps.turn_order,
            metrics: deps.metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &MatchmakingSettings {
        &self.settings
    }

    /// Seat `player_id` in a room, creating one when none is open.
    ///
    /// A player who already has a live room gets it back unchanged.
    pub async fn join(&self, player_id: PlayerId) -> Result<JoinResponse, GameError> {
        if let Some(room_code) = room_of(self.store.as_ref(), &player_id).await? {
            match load_state(self.store.as_ref(), &room_code).await? {
                Some(state) if state.contains_player(&player_id) => {
                    debug!(%room_code, %player_id, "Player rejoined existing room");
                    return Ok(JoinResponse {
                        room_code,
                        game_state: state,
                    });
                }
                _ => {
                    self.store
                        .delete_if_equals(&keys::player_room(&player_id), &json_string(&room_code))
                        .await?;
                    info!(%room_code, %player_id, "Dropped stale room index entry");
                }
            }
        }

        let assignment = with_lock(
            self.lock.as_ref(),
            keys::MATCHMAKING_RESOURCE,
            &self.settings.lock_policy,
            Some(&self.metrics),
            || self.assign_seat(player_id),
        )
        .await?;

        match assignment {
            Assignment::Created { room_code, state } => {
                self.metrics.increment_rooms_created();
                info!(%room_code, %player_id, "Opened room");
                Ok(JoinResponse {
                    room_code,
                    game_state: state,
                })
            }
            Assignment::Filled { room_code, state } => {
                self.metrics.increment_rooms_joined();
                info!(%room_code, %player_id, players = ?state.players, "Filled room");
                publish_best_effort(
                    self.publisher.as_ref(),
                    &self.metrics,
                    &room_code,
                    RoomEvent::Join(player_id),
                )
                .await;
                publish_best_effort(
                    self.publisher.as_ref(),
                    &self.metrics,
                    &room_code,
                    RoomEvent::Update(Box::new(state.clone())),
                )
                .await;
                Ok(JoinResponse {
                    room_code,
                    game_state: state,
                })
            }
        }
    }

    /// End the player's game and delete the room. No-op outside a room.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(), GameError> {
        let Some(room_code) = room_of(self.store.as_ref(), &player_id).await? else {
            debug!(%player_id, "Leave without a room");
            return Ok(());
        };

        publish_best_effort(
            self.publisher.as_ref(),
            &self.metrics,
            &room_code,
            RoomEvent::EndGame(EndGamePayload {
                reason: EndGameReason::PlayerLeft,
                actor: Some(player_id),
            }),
        )
        .await;

        let mut members: Vec<PlayerId> =
            list_json(self.store.as_ref(), &keys::room_players(&room_code)).await?;
        if let Some(state) = load_state(self.store.as_ref(), &room_code).await? {
            members.extend(state.players);
        }
        members.sort_unstable();
        members.dedup();

        let mut batch = Batch::new();
        batch.del(keys::player_room(&player_id));
        for member in members.iter().filter(|member| **member != player_id) {
            batch.delete_if_equals(keys::player_room(member), &room_code)?;
        }
        batch
            .del(keys::game_state(&room_code))
            .del(keys::room_players(&room_code))
            .delete_if_equals(keys::OPEN_ROOM, &room_code)?;
        self.store.execute_batch(batch).await?;

        self.metrics.increment_rooms_closed();
        info!(%room_code, %player_id, "Closed room");
        Ok(())
    }

    /// Display name of the other player, `None` while waiting for one.
    pub async fn get_opponent(&self, player_id: PlayerId) -> Result<OpponentInfo, GameError> {
        let (room_code, state) = resolve_room(self.store.as_ref(), player_id).await?;
        let Some(opponent) = state.opponent_of(&player_id) else {
            return Ok(OpponentInfo { name: None });
        };
        let name = self.identity.display_name(&opponent).await.ok_or(
            GameError::ReferentialInconsistency {
                room_code,
                player_id: opponent,
            },
        )?;
        Ok(OpponentInfo { name: Some(name) })
    }

    /// Ordered player ids of the caller's room; empty when unassigned.
    pub async fn get_players(&self, player_id: PlayerId) -> Result<Vec<PlayerId>, GameError> {
        let Some(room_code) = room_of(self.store.as_ref(), &player_id).await? else {
            return Ok(Vec::new());
        };
        Ok(list_json(self.store.as_ref(), &keys::room_players(&room_code)).await?)
    }

    async fn assign_seat(&self, player_id: PlayerId) -> Result<Assignment, GameError> {
        let open: Option<RoomCode> = get_json(self.store.as_ref(), keys::OPEN_ROOM).await?;
        if let Some(room_code) = open {
            let current =
                get_json_versioned::<GameState>(self.store.as_ref(), &keys::game_state(&room_code))
                    .await?;
            match current {
                Some((version, state))
                    if !state.is_full() && !state.contains_player(&player_id) =>
                {
                    match self.fill_room(&room_code, &version, state, player_id).await {
                        Err(GameError::Store(StoreError::Conflict { .. })) => {
                            self.metrics.increment_stale_open_rooms();
                            warn!(%room_code, "Open room closed while filling, opening a new room");
                        }
                        filled => return filled,
                    }
                }
                _ => {
                    self.metrics.increment_stale_open_rooms();
                    warn!(%room_code, "Open room pointer is stale, opening a new room");
                }
            }
        }
        self.create_room(player_id).await
    }

    async fn create_room(&self, player_id: PlayerId) -> Result<Assignment, GameError> {
        let seed: GameSeed = get_json(self.store.as_ref(), keys::GAME_SEED)
            .await?
            .ok_or(GameError::ConfigurationMissing { what: "game seed" })?;
        let room_code = self.unused_room_code().await?;
        let state = GameState::new(player_id, &seed);
        let ttl = self.settings.room_ttl;

        let mut batch = Batch::new();
        batch
            .set_json(keys::game_state(&room_code), &state, ttl)?
            .rpush_json(keys::room_players(&room_code), &player_id)?
            .set_json(keys::player_room(&player_id), &room_code, ttl)?
            .set_json(keys::OPEN_ROOM, &room_code, ttl)?;
        if let Some(ttl) = ttl {
            batch.expire(keys::room_players(&room_code), ttl);
        }
        self.store.execute_batch(batch).await?;

        Ok(Assignment::Created { room_code, state })
    }

    /// Seat the second player. The state write only lands over `version`, so
    /// a room its creator left in the meantime is never brought back.
    async fn fill_room(
        &self,
        room_code: &str,
        version: &str,
        mut state: GameState,
        player_id: PlayerId,
    ) -> Result<Assignment, GameError> {
        let joiner_first = self.turn_order.joiner_moves_first();
        let seated = if joiner_first {
            state.players.try_insert(0, player_id)
        } else {
            state.players.try_push(player_id)
        };
        if seated.is_err() {
            return self.create_room(player_id).await;
        }
        let ttl = self.settings.room_ttl;

        let mut batch = Batch::new();
        batch
            .set_if_equals_json(keys::game_state(room_code), version, &state, ttl)?
            .del(keys::OPEN_ROOM);
        if joiner_first {
            batch.lpush_json(keys::room_players(room_code), &player_id)?;
        } else {
            batch.rpush_json(keys::room_players(room_code), &player_id)?;
        }
        batch.set_json(keys::player_room(&player_id), room_code, ttl)?;
        if let Some(ttl) = ttl {
            batch.expire(keys::room_players(room_code), ttl);
            for seated in &state.players {
                batch.expire(keys::player_room(seated), ttl);
            }
        }
        self.store.execute_batch(batch).await?;

        debug!(%room_code, %player_id, joiner_first, "Seated second player");
        Ok(Assignment::Filled {
            room_code: room_code.to_string(),
            state,
        })
    }

    async fn unused_room_code(&self) -> Result<RoomCode, GameError> {
        for _ in 0..MAX_ROOM_CODE_ATTEMPTS {
            let candidate = generate_room_code(self.settings.room_code_length);
            if self
                .store
                .get(&keys::game_state(&candidate))
                .await?
                .is_none()
            {
                return Ok(candidate);
            }
            self.metrics.increment_room_code_collisions();
            warn!(room_code = %candidate, "Room code collision");
        }
        Err(GameError::CoordinationUnavailable {
            resource: "room-code".to_string(),
            attempts: MAX_ROOM_CODE_ATTEMPTS,
        })
    }
}

/// Room code the player is indexed under, if any.
pub async fn room_of(
    store: &dyn KeyValueStore,
    player_id: &PlayerId,
) -> Result<Option<RoomCode>, GameError> {
    Ok(get_json(store, &keys::player_room(player_id)).await?)
}

pub async fn load_state(
    store: &dyn KeyValueStore,
    room_code: &str,
) -> Result<Option<GameState>, GameError> {
    Ok(get_json(store, &keys::game_state(room_code)).await?)
}

/// The caller's room and its state, or `NotInRoom` / `StateNotFound`.
pub async fn resolve_room(
    store: &dyn KeyValueStore,
    player_id: PlayerId,
) -> Result<(RoomCode, GameState), GameError> {
    let room_code = room_of(store, &player_id)
        .await?
        .ok_or(GameError::NotInRoom { player_id })?;
    let state = load_state(store, &room_code)
        .await?
        .ok_or_else(|| GameError::StateNotFound {
            room_code: room_code.clone(),
        })?;
    Ok((room_code, state))
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
