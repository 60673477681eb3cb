use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request errors
    Unauthorized,
    InvalidInput,

    // Room errors
    NotInRoom,
    StateNotFound,

    // Coordination errors
    CoordinationUnavailable,
    ReferentialInconsistency,

    // Server errors
    ConfigurationMissing,
    UpstreamFault,
    StorageError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unauthorized => {
                "Access denied. The session token is missing or was not issued by this server."
            }
            Self::InvalidInput => {
                "The provided input is invalid or malformed. Check your request parameters."
            }
            Self::NotInRoom => "You are not in a room. Join a room before playing.",
            Self::StateNotFound => {
                "The room's game state has expired or was removed. Join again to start a new game."
            }
            Self::CoordinationUnavailable => {
                "Matchmaking is busy right now. Please retry the request in a moment."
            }
            Self::ReferentialInconsistency => {
                "The room refers to a player that no longer exists. This is a server fault."
            }
            Self::ConfigurationMissing => {
                "The server has no starting media configured. An operator must provide a game seed."
            }
            Self::UpstreamFault => {
                "The media metadata service failed to answer. Please try another title or retry later."
            }
            Self::StorageError => {
                "A storage error occurred while processing your request. Please try again."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_error_codes_have_descriptions() {
        let error_codes = [
            ErrorCode::Unauthorized,
            ErrorCode::InvalidInput,
            ErrorCode::NotInRoom,
            ErrorCode::StateNotFound,
            ErrorCode::CoordinationUnavailable,
            ErrorCode::ReferentialInconsistency,
            ErrorCode::ConfigurationMissing,
            ErrorCode::UpstreamFault,
            ErrorCode::StorageError,
        ];

        for error_code in &error_codes {
            let description = error_code.description();
            assert!(
                description.len() > 10,
                "ErrorCode::{error_code:?} has suspiciously short description: '{description}'"
            );
        }
    }

    #[test]
    fn test_display_uses_description() {
        let error = ErrorCode::NotInRoom;
        assert_eq!(format!("{error}"), error.description());
    }

    #[test]
    fn test_serialization_format() {
        let json = serde_json::to_string(&ErrorCode::CoordinationUnavailable).unwrap();
        assert_eq!(json, "\"COORDINATION_UNAVAILABLE\"");
    }
}
