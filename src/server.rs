use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::{publish_best_effort, ChannelHub};
use crate::config::{Config, MediaProviderKind};
use crate::coordination::{
    load_state, CoordinatorDeps, MatchmakingSettings, RandomTurnOrder, RoomCoordinator, TurnOrder,
};
use crate::distributed::StoreDistributedLock;
use crate::error::GameError;
use crate::game::{GameDeps, GameService, GameSettings};
use crate::identity::InMemoryIdentityProvider;
use crate::media::{MediaMetadataProvider, StaticCatalog, TmdbClient};
use crate::metrics::ServerMetrics;
use crate::protocol::{EndGamePayload, EndGameReason, GameSeed, RoomEvent};
use crate::store::{get_json, keys, set_json, InMemoryStore, KeyValueStore, StoreError};

/// Runtime settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub matchmaking: MatchmakingSettings,
    pub game: GameSettings,
    /// `None` disables the cleanup sweep
    pub room_cleanup_interval: Option<Duration>,
    /// `None` keeps idle sessions forever
    pub session_idle_timeout: Option<Duration>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            matchmaking: MatchmakingSettings::default(),
            game: GameSettings::default(),
            room_cleanup_interval: Some(Duration::from_secs(60)),
            session_idle_timeout: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

impl ServerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            matchmaking: config.matchmaking.settings(),
            game: GameSettings {
                max_search_results: config.game.max_search_results,
                room_ttl: config.matchmaking.room_ttl(),
            },
            room_cleanup_interval: config.server.room_cleanup_interval(),
            session_idle_timeout: config.server.session_idle_timeout(),
        }
    }
}

/// Collaborators the server is assembled from.
#[derive(Clone)]
pub struct ServerComponents {
    pub store: Arc<dyn KeyValueStore>,
    pub provider: Arc<dyn MediaMetadataProvider>,
    pub turn_order: Arc<dyn TurnOrder>,
    pub identity: Arc<InMemoryIdentityProvider>,
    pub hub: Arc<ChannelHub>,
    pub metrics: Arc<ServerMetrics>,
}

impl ServerComponents {
    /// In-process store, sessions and channels around the given provider.
    pub fn in_memory(
        provider: Arc<dyn MediaMetadataProvider>,
        turn_order: Arc<dyn TurnOrder>,
    ) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            provider,
            turn_order,
            identity: Arc::new(InMemoryIdentityProvider::new()),
            hub: Arc::new(ChannelHub::default()),
            metrics: Arc::new(ServerMetrics::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub seed_installed: bool,
    pub uptime_secs: u64,
    pub open_channels: usize,
    pub sessions: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// Matchmaking and game services wired to one store, hub and identity provider.
pub struct CastlinkServer {
    store: Arc<dyn KeyValueStore>,
    hub: Arc<ChannelHub>,
    identity: Arc<InMemoryIdentityProvider>,
    coordinator: RoomCoordinator,
    game: GameService,
    metrics: Arc<ServerMetrics>,
    settings: ServerSettings,
    started_at: Instant,
}

impl CastlinkServer {
    pub fn new(components: ServerComponents, settings: ServerSettings) -> Arc<Self> {
        let ServerComponents {
            store,
            provider,
            turn_order,
            identity,
            hub,
            metrics,
        } = components;

        let coordinator = RoomCoordinator::new(
            CoordinatorDeps {
                store: store.clone(),
                lock: Arc::new(StoreDistributedLock::new(store.clone())),
                publisher: hub.clone(),
                identity: identity.clone(),
                turn_order,
                metrics: metrics.clone(),
            },
            settings.matchmaking.clone(),
        );
        let game = GameService::new(
            GameDeps {
                store: store.clone(),
                provider,
                publisher: hub.clone(),
                metrics: metrics.clone(),
            },
            settings.game.clone(),
        );

        Arc::new(Self {
            store,
            hub,
            identity,
            coordinator,
            game,
            metrics,
            settings,
            started_at: Instant::now(),
        })
    }

    /// Build the server described by `config` and install its seed, if any.
    pub async fn from_config(config: &Config) -> anyhow::Result<Arc<Self>> {
        let provider = build_provider(config)?;
        let turn_order: Arc<dyn TurnOrder> = match config.matchmaking.turn_order_seed {
            Some(seed) => Arc::new(RandomTurnOrder::seeded(seed)),
            None => Arc::new(RandomTurnOrder::new()),
        };

        let mut components = ServerComponents::in_memory(provider, turn_order);
        components.hub = Arc::new(ChannelHub::new(config.server.channel_capacity));
        let server = Self::new(components, ServerSettings::from_config(config));

        match &config.game.seed {
            Some(seed) => server
                .install_seed(seed)
                .await
                .context("failed to install game seed")?,
            None => tracing::warn!("No game seed configured; joins fail until one is installed"),
        }

        Ok(server)
    }

    /// Make `seed` the starting media for rooms opened from now on.
    pub async fn install_seed(&self, seed: &GameSeed) -> Result<(), GameError> {
        set_json(self.store.as_ref(), keys::GAME_SEED, seed, None).await?;
        tracing::info!(
            key = %seed.key,
            label = %seed.label,
            credits = seed.credits.len(),
            "Installed game seed"
        );
        Ok(())
    }

    pub fn coordinator(&self) -> &RoomCoordinator {
        &self.coordinator
    }

    pub fn game(&self) -> &GameService {
        &self.game
    }

    pub fn identity(&self) -> &InMemoryIdentityProvider {
        &self.identity
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub async fn health_check(&self) -> HealthReport {
        let seed = if self.store.health_check().await {
            get_json::<GameSeed>(self.store.as_ref(), keys::GAME_SEED).await
        } else {
            Err(StoreError::Unavailable("store health check failed".into()))
        };
        let (status, seed_installed) = match seed {
            Ok(Some(_)) => ("ok", true),
            Ok(None) => ("degraded", false),
            Err(error) => {
                tracing::warn!(%error, "Health check could not read the store");
                ("unavailable", false)
            }
        };
        HealthReport {
            status,
            seed_installed,
            uptime_secs: self.started_at.elapsed().as_secs(),
            open_channels: self.hub.channel_count(),
            sessions: self.identity.session_count(),
        }
    }

    /// Tell subscribers of rooms whose state expired that the game is over,
    /// and drop channels nobody listens to. Returns the number of rooms closed.
    pub async fn close_expired_rooms(&self) -> usize {
        let mut closed = 0;
        for room_code in self.hub.room_codes() {
            match load_state(self.store.as_ref(), &room_code).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    publish_best_effort(
                        self.hub.as_ref(),
                        &self.metrics,
                        &room_code,
                        RoomEvent::EndGame(EndGamePayload {
                            reason: EndGameReason::Timeout,
                            actor: None,
                        }),
                    )
                    .await;
                    self.metrics.increment_rooms_closed();
                    tracing::info!(%room_code, "Closed expired room");
                    closed += 1;
                }
                Err(error) => {
                    tracing::warn!(%room_code, %error, "Skipping room during cleanup");
                    continue;
                }
            }
            self.hub.prune(&room_code);
        }
        closed
    }

    /// Drop anonymous sessions idle for longer than the configured timeout.
    pub fn expire_idle_sessions(&self) -> usize {
        let Some(max_idle) = self.settings.session_idle_timeout else {
            return 0;
        };
        let expired = self.identity.expire_idle(max_idle);
        if expired > 0 {
            tracing::info!(expired, "Expired idle sessions");
        }
        expired
    }

    /// Periodic sweep; returns immediately when the interval is disabled.
    pub async fn cleanup_task(self: Arc<Self>) {
        let Some(period) = self.settings.room_cleanup_interval else {
            return;
        };
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let closed = self.close_expired_rooms().await;
            let expired = self.expire_idle_sessions();
            if closed > 0 || expired > 0 {
                tracing::debug!(closed, expired, "Cleanup pass finished");
            }
        }
    }
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn MediaMetadataProvider>> {
    let media = &config.media;
    match media.provider {
        MediaProviderKind::Tmdb => {
            let token = media
                .tmdb_token
                .as_deref()
                .filter(|token| !token.trim().is_empty())
                .context("media.tmdb_token is required for the tmdb provider")?;
            let client = TmdbClient::new(&media.tmdb_base_url, token, media.request_timeout())?;
            tracing::info!(base_url = %media.tmdb_base_url, "Using TMDB media provider");
            Ok(Arc::new(client))
        }
        MediaProviderKind::Static => {
            let path = media
                .catalog_path
                .as_deref()
                .context("media.catalog_path is required for the static provider")?;
            let catalog = StaticCatalog::load(path)?;
            tracing::info!(path, titles = catalog.len(), "Using static media catalog");
            Ok(Arc::new(catalog))
        }
    }
}
