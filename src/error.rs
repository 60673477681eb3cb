use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::distributed::LockError;
use crate::media::ProviderError;
use crate::protocol::{ErrorBody, ErrorCode, PlayerId, RoomCode};
use crate::store::StoreError;

/// Failures of matchmaking and game operations.
///
/// Rule violations during a move (wrong turn, replayed media, no shared
/// credits) are not errors; they are reported through `SubmitOutcome`.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("configuration missing: {what}")]
    ConfigurationMissing { what: &'static str },

    #[error("coordination unavailable: lock `{resource}` not acquired after {attempts} attempts")]
    CoordinationUnavailable { resource: String, attempts: u32 },

    #[error("game state for room {room_code} not found")]
    StateNotFound { room_code: RoomCode },

    #[error("player {player_id} is not in a room")]
    NotInRoom { player_id: PlayerId },

    #[error("media provider failed: {0}")]
    UpstreamFault(#[from] ProviderError),

    #[error("room {room_code} refers to unknown player {player_id}")]
    ReferentialInconsistency {
        room_code: RoomCode,
        player_id: PlayerId,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl GameError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConfigurationMissing { .. } => ErrorCode::ConfigurationMissing,
            Self::CoordinationUnavailable { .. } => ErrorCode::CoordinationUnavailable,
            Self::StateNotFound { .. } => ErrorCode::StateNotFound,
            Self::NotInRoom { .. } => ErrorCode::NotInRoom,
            Self::UpstreamFault(_) => ErrorCode::UpstreamFault,
            Self::ReferentialInconsistency { .. } => ErrorCode::ReferentialInconsistency,
            Self::Store(_) => ErrorCode::StorageError,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::Unauthorized => ErrorCode::Unauthorized,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigurationMissing { .. }
            | Self::ReferentialInconsistency { .. }
            | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CoordinationUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::StateNotFound { .. } => StatusCode::NOT_FOUND,
            Self::NotInRoom { .. } => StatusCode::CONFLICT,
            Self::UpstreamFault(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Transient failures the client may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CoordinationUnavailable { .. } | Self::UpstreamFault(_)
        )
    }
}

impl From<LockError> for GameError {
    fn from(error: LockError) -> Self {
        match error {
            LockError::Busy { resource } => Self::CoordinationUnavailable {
                resource,
                attempts: 1,
            },
            LockError::Unavailable { resource, attempts } => {
                Self::CoordinationUnavailable { resource, attempts }
            }
            LockError::Store(error) => Self::Store(error),
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = %self.error_code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = %self.error_code(), "Request rejected");
        }
        let body = ErrorBody {
            error: self.to_string(),
            error_code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}
