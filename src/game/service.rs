use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::rules::{apply_move, check_turn, check_unplayed, find_links};
use crate::broadcast::{publish_best_effort, EventPublisher};
use crate::coordination::resolve_room;
use crate::error::GameError;
use crate::media::{shape_results, MediaMetadataProvider};
use crate::metrics::ServerMetrics;
use crate::protocol::{
    GameState, MediaCandidate, PersonLink, PlayerId, RejectionReason, RoomEvent, SubmitOutcome,
};
use crate::store::{get_json_versioned, keys, Batch, KeyValueStore, StoreError};

pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 5;

/// Re-checks of a move whose commit lost a race before giving up.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub max_search_results: usize,
    pub room_ttl: Option<Duration>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            room_ttl: Some(Duration::from_secs(6 * 60 * 60)),
        }
    }
}

#[derive(Clone)]
pub struct GameDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub provider: Arc<dyn MediaMetadataProvider>,
    pub publisher: Arc<dyn EventPublisher>,
    pub metrics: Arc<ServerMetrics>,
}

/// Turn validation and state transitions for seated players.
pub struct GameService {
    store: Arc<dyn KeyValueStore>,
    provider: Arc<dyn MediaMetadataProvider>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<ServerMetrics>,
    settings: GameSettings,
}

impl GameService {
    pub fn new(deps: GameDeps, settings: GameSettings) -> Self {
        Self {
            store: deps.store,
            provider: deps.provider,
            publisher: deps.publisher,
            metrics: deps.metrics,
            settings,
        }
    }

    /// Validate and apply `candidate` as the caller's move.
    ///
    /// Rule violations come back as a rejected [`SubmitOutcome`] and leave the
    /// state untouched; only missing rooms, storage and provider failures are
    /// errors. The write only lands over the exact state the move was checked
    /// against; if another commit got there first the move is re-checked
    /// against the fresh state.
    pub async fn submit_answer(
        &self,
        player_id: PlayerId,
        candidate: MediaCandidate,
    ) -> Result<SubmitOutcome, GameError> {
        validate_candidate(&candidate)?;
        let (room_code, _) = resolve_room(self.store.as_ref(), player_id).await?;
        let mut fetched_people: Option<Vec<PersonLink>> = None;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let (version, mut state) = self.read_state(&room_code).await?;

            let checked = check_turn(&state, &player_id)
                .and_then(|()| check_unplayed(&state, &candidate.key));
            if let Err(reason) = checked {
                self.metrics.increment_answers_rejected();
                debug!(%room_code, %player_id, ?reason, key = %candidate.key, "Rejected answer");
                return Ok(SubmitOutcome::rejected(reason));
            }

            // Credits do not change between attempts.
            let people = match &fetched_people {
                Some(people) => people.clone(),
                None => {
                    let people = self
                        .linkable_people(&room_code, player_id, &candidate)
                        .await?;
                    fetched_people = Some(people.clone());
                    people
                }
            };
            let links = find_links(&state.current_credit_pool, &people);
            if links.is_empty() {
                self.metrics.increment_answers_rejected();
                debug!(%room_code, %player_id, key = %candidate.key, "No links found");
                return Ok(SubmitOutcome::rejected(RejectionReason::NoLinksFound));
            }

            apply_move(&mut state, &candidate, links.clone(), &people);
            match self.persist(&room_code, &version, &state).await {
                Ok(()) => {}
                Err(StoreError::Conflict { .. }) => {
                    debug!(
                        %room_code,
                        %player_id,
                        attempt,
                        "Game state changed during move, re-checking"
                    );
                    continue;
                }
                Err(error) => return Err(error.into()),
            }

            self.metrics.increment_answers_accepted();
            info!(
                %room_code,
                %player_id,
                key = %candidate.key,
                links = links.len(),
                moves = state.media.len(),
                "Accepted answer"
            );
            publish_best_effort(
                self.publisher.as_ref(),
                &self.metrics,
                &room_code,
                RoomEvent::Update(Box::new(state)),
            )
            .await;
            return Ok(SubmitOutcome::accepted(links));
        }

        warn!(%room_code, %player_id, "Gave up committing move after repeated conflicts");
        Err(GameError::CoordinationUnavailable {
            resource: keys::game_state(&room_code),
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    /// Board candidates for `query`; an empty query never reaches the provider.
    pub async fn search(&self, query: &str) -> Result<Vec<MediaCandidate>, GameError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.metrics.increment_searches();
        let hits = self.provider.search(query).await.inspect_err(|error| {
            self.metrics.increment_upstream_failures();
            warn!(%query, %error, "Search failed");
        })?;
        Ok(shape_results(hits, self.settings.max_search_results))
    }

    pub async fn board_state(&self, player_id: PlayerId) -> Result<GameState, GameError> {
        let (_, state) = resolve_room(self.store.as_ref(), player_id).await?;
        Ok(state)
    }

    /// Current state of `room_code` with the raw value it was decoded from.
    async fn read_state(&self, room_code: &str) -> Result<(String, GameState), GameError> {
        get_json_versioned(self.store.as_ref(), &keys::game_state(room_code))
            .await?
            .ok_or_else(|| GameError::StateNotFound {
                room_code: room_code.to_string(),
            })
    }

    async fn linkable_people(
        &self,
        room_code: &str,
        player_id: PlayerId,
        candidate: &MediaCandidate,
    ) -> Result<Vec<PersonLink>, GameError> {
        let credits = self
            .provider
            .credits(candidate.id, candidate.media_type)
            .await
            .inspect_err(|error| {
                self.metrics.increment_upstream_failures();
                warn!(%room_code, %player_id, key = %candidate.key, %error, "Credit lookup failed");
            })?;
        Ok(credits.linkable_people())
    }

    /// Single commit point of a move. Fails with [`StoreError::Conflict`]
    /// when the stored state no longer equals `version`, including when the
    /// room was deleted in the meantime.
    async fn persist(
        &self,
        room_code: &str,
        version: &str,
        state: &GameState,
    ) -> Result<(), StoreError> {
        let ttl = self.settings.room_ttl;
        let mut batch = Batch::new();
        batch.set_if_equals_json(keys::game_state(room_code), version, state, ttl)?;
        if let Some(ttl) = ttl {
            batch.expire(keys::room_players(room_code), ttl);
            for player in &state.players {
                batch.expire(keys::player_room(player), ttl);
            }
        }
        self.store.execute_batch(batch).await?;
        Ok(())
    }
}

/// The key must be the canonical `{mediaType}-{id}` form so duplicate
/// detection cannot be sidestepped with an alias key.
fn validate_candidate(candidate: &MediaCandidate) -> Result<(), GameError> {
    let expected = candidate.media_type.board_key(candidate.id);
    if candidate.key != expected {
        return Err(GameError::InvalidInput(format!(
            "answer key `{}` does not match `{expected}`",
            candidate.key
        )));
    }
    if candidate.label.trim().is_empty() {
        return Err(GameError::InvalidInput("answer label is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChannelHub;
    use crate::media::{CatalogEntry, Credits, CrewCredit, ProviderError, SearchHit, StaticCatalog};
    use crate::protocol::{GameSeed, MediaType, PersonLink};
    use crate::store::{get_json, set_json, InMemoryStore};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            CatalogEntry {
                id: 157336,
                media_type: MediaType::Movie,
                title: "Interstellar".into(),
                date: Some("2014-11-05".into()),
                cast: vec![
                    PersonLink { id: 20, name: "Michael Caine".into() },
                    PersonLink { id: 99, name: "Matt Damon".into() },
                ],
                crew: vec![CrewCredit {
                    id: 150,
                    name: "Hans Zimmer".into(),
                    jobs: vec!["Original Music Composer".into()],
                }],
            },
            CatalogEntry {
                id: 1,
                media_type: MediaType::Movie,
                title: "Unrelated".into(),
                date: Some("1990-01-01".into()),
                cast: vec![PersonLink { id: 7, name: "Nobody".into() }],
                crew: vec![],
            },
        ])
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: GameService,
        a: PlayerId,
        b: PlayerId,
        room_code: String,
    }

    /// Catalog whose credit lookups take `delay`.
    struct SlowCatalog {
        inner: StaticCatalog,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl MediaMetadataProvider for SlowCatalog {
        async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
            self.inner.search(query).await
        }

        async fn credits(&self, id: u64, media_type: MediaType) -> Result<Credits, ProviderError> {
            tokio::time::sleep(self.delay).await;
            self.inner.credits(id, media_type).await
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_provider(Arc::new(catalog())).await
    }

    async fn fixture_with_provider(provider: Arc<dyn MediaMetadataProvider>) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let seed = GameSeed {
            key: "movie-27205".into(),
            label: "Inception (2010)".into(),
            credits: BTreeSet::from([10, 20, 30]),
        };
        let mut state = GameState::new(a, &seed);
        state.players.push(b);
        let room_code = "ROOM".to_string();
        set_json(store.as_ref(), &keys::game_state(&room_code), &state, None)
            .await
            .unwrap();
        for player in [a, b] {
            set_json(store.as_ref(), &keys::player_room(&player), &room_code, None)
                .await
                .unwrap();
        }
        let service = GameService::new(
            GameDeps {
                store: store.clone(),
                provider,
                publisher: Arc::new(ChannelHub::default()),
                metrics: Arc::new(ServerMetrics::new()),
            },
            GameSettings::default(),
        );
        Fixture {
            store,
            service,
            a,
            b,
            room_code,
        }
    }

    fn interstellar() -> MediaCandidate {
        MediaCandidate {
            key: "movie-157336".into(),
            id: 157336,
            label: "Interstellar (2014)".into(),
            media_type: MediaType::Movie,
        }
    }

    #[tokio::test]
    async fn accepted_answer_is_persisted() {
        let fx = fixture().await;
        let outcome = fx.service.submit_answer(fx.a, interstellar()).await.unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.links.len(), 1);
        assert_eq!(outcome.links[0].id, 20);

        let stored: GameState = get_json(fx.store.as_ref(), &keys::game_state(&fx.room_code))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.current_credit_pool, BTreeSet::from([20, 99, 150]));
        assert_eq!(stored.media[0].label, "Interstellar (2014)");
    }

    #[tokio::test]
    async fn out_of_turn_answer_is_rejected_without_mutation() {
        let fx = fixture().await;
        let outcome = fx.service.submit_answer(fx.b, interstellar()).await.unwrap();
        assert_eq!(outcome.reason, Some(RejectionReason::NotYourTurn));
        let state = fx.service.board_state(fx.a).await.unwrap();
        assert!(state.media.is_empty());
    }

    #[tokio::test]
    async fn unlinked_answer_is_rejected() {
        let fx = fixture().await;
        let outcome = fx
            .service
            .submit_answer(
                fx.a,
                MediaCandidate {
                    key: "movie-1".into(),
                    id: 1,
                    label: "Unrelated (1990)".into(),
                    media_type: MediaType::Movie,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.reason, Some(RejectionReason::NoLinksFound));
        assert_eq!(outcome.message.as_deref(), Some("No links found"));
    }

    #[tokio::test]
    async fn unknown_title_is_upstream_fault() {
        let fx = fixture().await;
        let error = fx
            .service
            .submit_answer(
                fx.a,
                MediaCandidate {
                    key: "tv-5".into(),
                    id: 5,
                    label: "Missing (2001)".into(),
                    media_type: MediaType::Tv,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(error, GameError::UpstreamFault(_)));
    }

    #[tokio::test]
    async fn mismatched_key_is_invalid_input() {
        let fx = fixture().await;
        let mut candidate = interstellar();
        candidate.key = "movie-27205-alias".into();
        assert!(matches!(
            fx.service.submit_answer(fx.a, candidate).await,
            Err(GameError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn answer_outside_room_is_not_in_room() {
        let fx = fixture().await;
        assert!(matches!(
            fx.service.submit_answer(Uuid::new_v4(), interstellar()).await,
            Err(GameError::NotInRoom { .. })
        ));
    }

    #[tokio::test]
    async fn expired_state_is_state_not_found() {
        let fx = fixture().await;
        fx.store
            .del(&[keys::game_state(&fx.room_code)])
            .await
            .unwrap();
        assert!(matches!(
            fx.service.submit_answer(fx.a, interstellar()).await,
            Err(GameError::StateNotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submissions_commit_one_move() {
        let fx = fixture_with_provider(Arc::new(SlowCatalog {
            inner: catalog(),
            delay: Duration::from_millis(50),
        }))
        .await;

        let (first, second) = tokio::join!(
            fx.service.submit_answer(fx.a, interstellar()),
            fx.service.submit_answer(fx.a, interstellar()),
        );
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(outcomes.iter().filter(|outcome| outcome.accepted).count(), 1);
        let rejected = outcomes.iter().find(|outcome| !outcome.accepted).unwrap();
        assert_eq!(rejected.reason, Some(RejectionReason::NotYourTurn));
        let state = fx.service.board_state(fx.b).await.unwrap();
        assert_eq!(state.media.len(), 1);
        assert_eq!(state.player_to_move(), Some(fx.b));
    }

    #[tokio::test(start_paused = true)]
    async fn move_does_not_resurrect_deleted_room() {
        let fx = fixture_with_provider(Arc::new(SlowCatalog {
            inner: catalog(),
            delay: Duration::from_millis(50),
        }))
        .await;
        let doomed = [
            keys::game_state(&fx.room_code),
            keys::player_room(&fx.a),
            keys::player_room(&fx.b),
        ];

        let (outcome, ()) = tokio::join!(
            fx.service.submit_answer(fx.a, interstellar()),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                fx.store.del(&doomed).await.unwrap();
            },
        );

        assert!(matches!(outcome, Err(GameError::StateNotFound { .. })));
        assert!(!fx.store.contains_key(&keys::game_state(&fx.room_code)).await);
    }

    #[tokio::test]
    async fn search_shapes_catalog_hits() {
        let fx = fixture().await;
        assert!(fx.service.search("").await.unwrap().is_empty());
        let results = fx.service.search("inter").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, "Interstellar (2014)");
        assert_eq!(results[0].key, "movie-157336");
    }
}
