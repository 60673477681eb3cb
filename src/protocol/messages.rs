use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{GameState, MediaCandidate, PersonLink, PlayerId, RoomCode};

/// Why a game ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndGameReason {
    PlayerLeft,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndGamePayload {
    pub reason: EndGameReason,
    /// Player who ended the game; absent when the room timed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<PlayerId>,
}

/// Events published on a room's channel.
///
/// On the wire: `{"event": "join" | "update" | "end-game", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RoomEvent {
    /// A second player took the open seat.
    Join(PlayerId),
    /// The room's state changed; clients replace their copy.
    Update(Box<GameState>),
    /// The game is over; clients stop playing.
    EndGame(EndGamePayload),
}

impl RoomEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Update(_) => "update",
            Self::EndGame(_) => "end-game",
        }
    }
}

/// Policy violations reported inline rather than as request failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    NotYourTurn,
    WaitingForOpponent,
    AlreadyPlayed,
    NoLinksFound,
}

impl RejectionReason {
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NotYourTurn => "It is not your turn",
            Self::WaitingForOpponent => "Waiting for an opponent",
            Self::AlreadyPlayed => "This media has already been played",
            Self::NoLinksFound => "No links found",
        }
    }
}

/// Result of `submitAnswer`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub links: Vec<PersonLink>,
}

impl SubmitOutcome {
    pub fn accepted(links: Vec<PersonLink>) -> Self {
        Self {
            accepted: true,
            reason: None,
            message: None,
            links,
        }
    }

    pub fn rejected(reason: RejectionReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            message: Some(reason.message().to_string()),
            links: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub room_code: RoomCode,
    pub game_state: GameState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpponentInfo {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayersResponse {
    pub ids: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub results: Vec<MediaCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer: MediaCandidate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub player_id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub error_code: ErrorCode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn room_events_use_channel_names() {
        let actor = Uuid::new_v4();
        let event = RoomEvent::EndGame(EndGamePayload {
            reason: EndGameReason::PlayerLeft,
            actor: Some(actor),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "end-game");
        assert_eq!(json["data"]["reason"], "PLAYER_LEFT");
        assert_eq!(json["data"]["actor"], actor.to_string());
        assert_eq!(event.name(), "end-game");

        let join = serde_json::to_value(RoomEvent::Join(actor)).unwrap();
        assert_eq!(join["event"], "join");
    }

    #[test]
    fn rejected_outcome_carries_message() {
        let outcome = SubmitOutcome::rejected(RejectionReason::AlreadyPlayed);
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.message.as_deref(),
            Some("This media has already been played")
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["reason"], "ALREADY_PLAYED");
    }

    #[test]
    fn accepted_outcome_omits_reason() {
        let outcome = SubmitOutcome::accepted(vec![PersonLink {
            id: 20,
            name: "Michael Caine".into(),
        }]);
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("reason").is_none());
        assert_eq!(json["links"][0]["id"], 20);
    }
}
