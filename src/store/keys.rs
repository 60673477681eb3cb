//! Well-known store key layout.

use crate::protocol::PlayerId;

/// Names the single room currently waiting for its second player.
pub const OPEN_ROOM: &str = "room-code:open";

/// Initial media every new room is seeded from.
pub const GAME_SEED: &str = "game:seed";

/// Resource name of the matchmaking lock.
pub const MATCHMAKING_RESOURCE: &str = "room";

pub fn player_room(player_id: &PlayerId) -> String {
    format!("player:{player_id}:room-code")
}

pub fn game_state(room_code: &str) -> String {
    format!("room:{room_code}:game-state")
}

pub fn room_players(room_code: &str) -> String {
    format!("room:{room_code}:players")
}

pub fn lock(resource: &str) -> String {
    format!("lock:{resource}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn keys_are_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            player_room(&id),
            "player:00000000-0000-0000-0000-000000000000:room-code"
        );
        assert_eq!(game_state("ABC"), "room:ABC:game-state");
        assert_eq!(room_players("ABC"), "room:ABC:players");
        assert_eq!(lock(MATCHMAKING_RESOURCE), "lock:room");
    }
}
