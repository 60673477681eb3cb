use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Default length of generated room codes.
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 12;
/// A room seats exactly two players.
pub const ROOM_CAPACITY: usize = 2;

/// Stable identifier issued by the identity provider
pub type PlayerId = Uuid;
/// Generated room code, also used as the room's broadcast channel name
pub type RoomCode = String;
/// Person identifier as issued by the media metadata provider
pub type PersonId = u64;

/// Kind of media that can be played on the board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }

    /// Stable board key for a media id, e.g. `movie-157336`.
    pub fn board_key(&self, id: u64) -> String {
        format!("{}-{id}", self.as_str())
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person linking two consecutive moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonLink {
    pub id: PersonId,
    pub name: String,
}

/// One accepted move.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardItem {
    pub key: String,
    pub label: String,
    pub links: Vec<PersonLink>,
}

/// Media a player proposes as their next move (as returned by search).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaCandidate {
    pub key: String,
    pub id: u64,
    pub label: String,
    pub media_type: MediaType,
}

/// Initial media every new room starts from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSeed {
    pub key: String,
    pub label: String,
    pub credits: BTreeSet<PersonId>,
}

/// Shared state of one room.
///
/// `media` is newest-first. The player at `players[media.len() % 2]` moves
/// next, so `players[0]` always opens the game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: ArrayVec<PlayerId, ROOM_CAPACITY>,
    pub initial_key: String,
    pub initial_label: String,
    pub media: Vec<BoardItem>,
    pub current_credit_pool: BTreeSet<PersonId>,
}

impl GameState {
    /// Fresh state for a room opened by `creator`.
    pub fn new(creator: PlayerId, seed: &GameSeed) -> Self {
        let mut players = ArrayVec::new();
        players.push(creator);
        Self {
            players,
            initial_key: seed.key.clone(),
            initial_label: seed.label.clone(),
            media: Vec::new(),
            current_credit_pool: seed.credits.clone(),
        }
    }

    pub fn turn_index(&self) -> usize {
        self.media.len() % ROOM_CAPACITY
    }

    /// Player expected to submit the next move, if seated.
    pub fn player_to_move(&self) -> Option<PlayerId> {
        self.players.get(self.turn_index()).copied()
    }

    pub fn is_full(&self) -> bool {
        self.players.is_full()
    }

    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains(player_id)
    }

    pub fn opponent_of(&self, player_id: &PlayerId) -> Option<PlayerId> {
        self.players.iter().copied().find(|id| id != player_id)
    }

    /// Whether `key` is the seed or any move already on the board.
    pub fn has_played(&self, key: &str) -> bool {
        self.initial_key == key || self.media.iter().any(|item| item.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> GameSeed {
        GameSeed {
            key: "movie-27205".to_string(),
            label: "Inception (2010)".to_string(),
            credits: [10, 20, 30].into_iter().collect(),
        }
    }

    #[test]
    fn new_state_seats_creator_first() {
        let creator = Uuid::new_v4();
        let state = GameState::new(creator, &seed());
        assert_eq!(state.players.as_slice(), &[creator]);
        assert_eq!(state.player_to_move(), Some(creator));
        assert!(!state.is_full());
        assert!(state.media.is_empty());
        assert_eq!(state.current_credit_pool.len(), 3);
    }

    #[test]
    fn turn_alternates_with_move_count() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut state = GameState::new(a, &seed());
        state.players.push(b);
        assert_eq!(state.player_to_move(), Some(a));
        state.media.push(BoardItem {
            key: "movie-1".into(),
            label: "One".into(),
            links: vec![],
        });
        assert_eq!(state.player_to_move(), Some(b));
        state.media.push(BoardItem {
            key: "movie-2".into(),
            label: "Two".into(),
            links: vec![],
        });
        assert_eq!(state.player_to_move(), Some(a));
    }

    #[test]
    fn has_played_covers_seed_and_board() {
        let mut state = GameState::new(Uuid::new_v4(), &seed());
        assert!(state.has_played("movie-27205"));
        assert!(!state.has_played("movie-1"));
        state.media.push(BoardItem {
            key: "movie-1".into(),
            label: "One".into(),
            links: vec![],
        });
        assert!(state.has_played("movie-1"));
    }

    #[test]
    fn oversized_player_list_is_rejected_on_decode() {
        let json = serde_json::json!({
            "players": [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()],
            "initialKey": "movie-1",
            "initialLabel": "One",
            "media": [],
            "currentCreditPool": []
        });
        assert!(serde_json::from_value::<GameState>(json).is_err());
    }

    #[test]
    fn board_key_uses_media_type_prefix() {
        assert_eq!(MediaType::Movie.board_key(157336), "movie-157336");
        assert_eq!(MediaType::Tv.board_key(1399), "tv-1399");
    }
}
