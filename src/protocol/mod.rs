// Protocol module: shared data model, wire payloads and room codes

pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod types;

pub use error_codes::ErrorCode;

pub use types::{
    BoardItem, GameSeed, GameState, MediaCandidate, MediaType, PersonId, PersonLink, PlayerId,
    RoomCode, DEFAULT_ROOM_CODE_LENGTH, ROOM_CAPACITY,
};

pub use messages::{
    EndGamePayload, EndGameReason, ErrorBody, JoinResponse, OpponentInfo, PlayersResponse,
    RejectionReason, RoomEvent, SearchResponse, SessionRequest, SessionResponse,
    SubmitAnswerRequest, SubmitOutcome,
};
