use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AuthenticatedPlayer;
use crate::error::GameError;
use crate::metrics::{MetricsSnapshot, ServerMetrics};
use crate::protocol::{
    GameState, JoinResponse, OpponentInfo, PlayersResponse, SearchResponse, SessionRequest,
    SessionResponse, SubmitAnswerRequest, SubmitOutcome,
};
use crate::server::{CastlinkServer, HealthReport};

type ApiResult<T> = Result<T, GameError>;

/// Count a failed request as a client or server error.
fn record_error(metrics: &ServerMetrics, error: &GameError) {
    if error.status_code().is_server_error() {
        metrics.increment_internal_errors();
    } else {
        metrics.increment_validation_errors();
    }
}

pub async fn create_session(
    State(server): State<Arc<CastlinkServer>>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let result = payload
        .map_err(|rejection| GameError::InvalidInput(rejection.body_text()))
        .and_then(|Json(request)| server.identity().issue_session(&request.name));
    let session = result.inspect_err(|error| record_error(&server.metrics(), error))?;
    server.metrics().increment_sessions_issued();
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token: session.token,
            player_id: session.player.id,
            name: session.player.name,
        }),
    ))
}

pub async fn join_room(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
) -> ApiResult<Json<JoinResponse>> {
    server
        .coordinator()
        .join(player.id)
        .await
        .map(Json)
        .inspect_err(|error| record_error(&server.metrics(), error))
}

pub async fn leave_room(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
) -> ApiResult<StatusCode> {
    server
        .coordinator()
        .leave(player.id)
        .await
        .inspect_err(|error| record_error(&server.metrics(), error))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_opponent(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
) -> ApiResult<Json<OpponentInfo>> {
    server
        .coordinator()
        .get_opponent(player.id)
        .await
        .map(Json)
        .inspect_err(|error| record_error(&server.metrics(), error))
}

pub async fn get_players(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
) -> ApiResult<Json<PlayersResponse>> {
    let ids = server
        .coordinator()
        .get_players(player.id)
        .await
        .inspect_err(|error| record_error(&server.metrics(), error))?;
    Ok(Json(PlayersResponse { ids }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

pub async fn search(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(_player): AuthenticatedPlayer,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Query(SearchQuery { query }) = query
        .map_err(|rejection| GameError::InvalidInput(rejection.body_text()))
        .inspect_err(|error| record_error(&server.metrics(), error))?;
    let results = server
        .game()
        .search(&query)
        .await
        .inspect_err(|error| record_error(&server.metrics(), error))?;
    Ok(Json(SearchResponse { results }))
}

pub async fn submit_answer(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
    payload: Result<Json<SubmitAnswerRequest>, JsonRejection>,
) -> ApiResult<Json<SubmitOutcome>> {
    let Json(request) = payload
        .map_err(|rejection| GameError::InvalidInput(rejection.body_text()))
        .inspect_err(|error| record_error(&server.metrics(), error))?;
    server
        .game()
        .submit_answer(player.id, request.answer)
        .await
        .map(Json)
        .inspect_err(|error| record_error(&server.metrics(), error))
}

pub async fn board_state(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
) -> ApiResult<Json<GameState>> {
    server
        .game()
        .board_state(player.id)
        .await
        .map(Json)
        .inspect_err(|error| record_error(&server.metrics(), error))
}

/// 200 while the store answers, 503 otherwise. A missing seed is reported
/// in the body but does not fail the probe.
pub async fn health_check(
    State(server): State<Arc<CastlinkServer>>,
) -> (StatusCode, Json<HealthReport>) {
    let report = server.health_check().await;
    let status = if report.status == "unavailable" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

pub async fn metrics_handler(State(server): State<Arc<CastlinkServer>>) -> Json<MetricsSnapshot> {
    Json(server.metrics().snapshot())
}
