use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::events::room_events;
use super::handlers::{
    board_state, create_session, get_opponent, get_players, health_check, join_room, leave_room,
    metrics_handler, search, submit_answer,
};
use crate::server::CastlinkServer;

/// Build the application router. `cors_origins` is `*` or a comma-separated list.
pub fn create_router(cors_origins: &str) -> Router<Arc<CastlinkServer>> {
    Router::new()
        .route("/v1/session", post(create_session))
        .route("/v1/room/join", post(join_room))
        .route("/v1/room/leave", post(leave_room))
        .route("/v1/room/opponent", get(get_opponent))
        .route("/v1/room/players", get(get_players))
        .route("/v1/game/search", get(search))
        .route("/v1/game/answer", post(submit_answer))
        .route("/v1/game/board", get(board_state))
        .route("/v1/rooms/{code}/events", get(room_events))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(cors_origins: &str) -> CorsLayer {
    if cors_origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = cors_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured, using permissive CORS");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::FixedTurnOrder;
    use crate::media::StaticCatalog;
    use crate::server::{ServerComponents, ServerSettings};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn app(cors_origins: &str) -> Router {
        let server = CastlinkServer::new(
            ServerComponents::in_memory(
                Arc::new(StaticCatalog::default()),
                Arc::new(FixedTurnOrder(false)),
            ),
            ServerSettings::default(),
        );
        create_router(cors_origins).with_state(server)
    }

    #[tokio::test]
    async fn configured_origin_is_echoed() {
        let response = app("https://play.example")
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "https://play.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://play.example"))
        );
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_cors_header() {
        let response = app("https://play.example")
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn event_stream_requires_session() {
        let response = app("*")
            .oneshot(
                Request::get("/v1/rooms/ABCDEF/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
