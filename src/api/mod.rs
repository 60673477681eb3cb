//! HTTP and WebSocket surface.
//!
//! Every `/v1` route except session issuance resolves the caller through
//! [`AuthenticatedPlayer`]. Errors render as `{error, errorCode}` with the
//! status from [`crate::error::GameError::status_code`].

mod auth;
mod events;
mod handlers;
mod routes;

pub use auth::AuthenticatedPlayer;
pub use routes::create_router;
