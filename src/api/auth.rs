use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;

use crate::error::GameError;
use crate::identity::{IdentityProvider, Player};
use crate::server::CastlinkServer;

/// The player behind the request's session token.
///
/// The token comes from `Authorization: Bearer <token>`, or from a `token`
/// query parameter for WebSocket clients that cannot set headers.
#[derive(Debug, Clone)]
pub struct AuthenticatedPlayer(pub Player);

impl FromRequestParts<Arc<CastlinkServer>> for AuthenticatedPlayer {
    type Rejection = GameError;

    async fn from_request_parts(
        parts: &mut Parts,
        server: &Arc<CastlinkServer>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) =
            bearer_token(&parts.headers).or_else(|| query_token(parts.uri.query()))
        else {
            server.metrics().increment_authentication_failures();
            tracing::debug!(path = %parts.uri.path(), "Request without session token");
            return Err(GameError::Unauthorized);
        };

        match server.identity().authenticate(&token).await {
            Some(player) => Ok(Self(player)),
            None => {
                server.metrics().increment_authentication_failures();
                tracing::warn!(path = %parts.uri.path(), "Session token rejected");
                Err(GameError::Unauthorized)
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_scheme_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn token_query_parameter() {
        assert_eq!(
            query_token(Some("a=1&token=xyz%21")).as_deref(),
            Some("xyz!")
        );
        assert_eq!(query_token(Some("token=")), None);
        assert_eq!(query_token(None), None);
    }
}
