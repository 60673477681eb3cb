//! Chain-linking game
//!
//! Each move must share at least one cast or whitelisted crew member with the
//! previous one. `rules` holds the pure checks and transitions; `service`
//! loads state from the store, consults the media provider, and commits.

pub mod rules;
pub mod service;

pub use service::{GameDeps, GameService, GameSettings, DEFAULT_MAX_SEARCH_RESULTS};
