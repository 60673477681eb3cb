#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::similar_names
)]

//! # Castlink Server
//!
//! Pairs anonymous players into two-person rooms and runs a turn-based
//! chain-linking game: every move must share a cast or crew member with the
//! one before it. Room state lives in a key-value store, room assignment is
//! serialized by a store-backed lock, and state changes are pushed to players
//! over per-room channels.

/// HTTP routes, handlers and the room event stream
pub mod api;

/// Per-room event channels
pub mod broadcast;

/// Server configuration and environment variables
pub mod config;

/// Room matchmaking and turn order
pub mod coordination;

/// Store-backed distributed locking
pub mod distributed;

/// Error types and their HTTP mapping
pub mod error;

/// Move validation and game state transitions
pub mod game;

/// Anonymous player sessions
pub mod identity;

/// Structured logging configuration
pub mod logging;

/// Media search and credit lookup providers
pub mod media;

/// Metrics collection and reporting
pub mod metrics;

/// Shared data model and wire payloads
pub mod protocol;

/// Retry logic utilities
pub mod retry;

/// Server assembly and maintenance
pub mod server;

/// Key-value store abstraction
pub mod store;
