//! Room assignment and room lookups
//!
//! - `matchmaker`: lock-guarded pairing of players into two-seat rooms
//! - `turn_order`: the once-per-room decision of who moves first

pub mod matchmaker;
pub mod turn_order;

pub use matchmaker::{
    load_state, resolve_room, room_of, CoordinatorDeps, MatchmakingSettings, RoomCoordinator,
};
pub use turn_order::{FixedTurnOrder, RandomTurnOrder, TurnOrder};
