use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use super::auth::AuthenticatedPlayer;
use crate::broadcast::BroadcastMessage;
use crate::coordination::room_of;
use crate::error::GameError;
use crate::protocol::room_codes::is_valid_room_code;
use crate::protocol::{RoomCode, RoomEvent};
use crate::server::CastlinkServer;

/// Stream a room's channel to one of its players.
///
/// The subscription is taken before the upgrade so nothing published in
/// between is lost. Only a player currently seated in the room may listen.
pub async fn room_events(
    State(server): State<Arc<CastlinkServer>>,
    AuthenticatedPlayer(player): AuthenticatedPlayer,
    Path(room_code): Path<RoomCode>,
    ws: WebSocketUpgrade,
) -> Result<Response, GameError> {
    if !is_valid_room_code(&room_code) {
        return Err(GameError::InvalidInput(format!(
            "`{room_code}` is not a room code"
        )));
    }
    let current = room_of(server.store(), &player.id).await?;
    if current.as_deref() != Some(room_code.as_str()) {
        tracing::debug!(%room_code, player_id = %player.id, "Event stream refused for non-member");
        return Err(GameError::NotInRoom {
            player_id: player.id,
        });
    }

    let events = server.hub().subscribe(&room_code);
    tracing::info!(%room_code, player_id = %player.id, "Event stream opened");
    Ok(ws.on_upgrade(move |socket| forward_events(socket, server, room_code, events)))
}

async fn forward_events(
    socket: WebSocket,
    server: Arc<CastlinkServer>,
    room_code: RoomCode,
    mut events: Receiver<BroadcastMessage>,
) {
    let metrics = server.metrics();
    metrics.increment_active_subscribers();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => {
                    let game_over = matches!(message.event(), RoomEvent::EndGame(_));
                    let frame = Message::Text(message.json().to_string().into());
                    if let Err(error) = sender.send(frame).await {
                        tracing::debug!(%room_code, %error, "Event stream send failed");
                        break;
                    }
                    if game_over {
                        break;
                    }
                }
                // Clients re-fetch the board, so skipped events are not replayed.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%room_code, skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if let Err(error) = sender.close().await {
        tracing::debug!(%room_code, %error, "Event stream close failed");
    }
    drop(events);
    server.hub().prune(&room_code);
    metrics.decrement_active_subscribers();
    tracing::info!(%room_code, "Event stream closed");
}
