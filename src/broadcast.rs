//! Per-room event broadcast
//!
//! Every room code doubles as a channel name. Events are serialized once in
//! [`BroadcastMessage`] and fanned out to subscribers as a shared `Arc<str>`.
//! Delivery is best effort: state in the store is authoritative and clients
//! re-fetch it when they miss an event.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::metrics::ServerMetrics;
use crate::protocol::{RoomCode, RoomEvent};

/// Default per-channel buffer before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A room event with its JSON encoding computed up front.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    inner: Arc<RoomEvent>,
    json: Arc<str>,
}

impl BroadcastMessage {
    pub fn new(event: RoomEvent) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(&event)?;
        Ok(Self {
            inner: Arc::new(event),
            json: json.into(),
        })
    }

    #[inline]
    pub fn event(&self) -> &RoomEvent {
        &self.inner
    }

    #[inline]
    pub fn json(&self) -> &Arc<str> {
        &self.json
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish to `room_code`'s channel. Returns how many subscribers received it.
    async fn publish(&self, room_code: &str, event: RoomEvent) -> anyhow::Result<usize>;
}

/// Publish and swallow failures; a committed write is never undone by a lost event.
pub async fn publish_best_effort(
    publisher: &dyn EventPublisher,
    metrics: &ServerMetrics,
    room_code: &str,
    event: RoomEvent,
) {
    let name = event.name();
    match publisher.publish(room_code, event).await {
        Ok(0) => {
            metrics.increment_events_published();
            tracing::debug!(%room_code, event = name, "Published event with no subscribers");
        }
        Ok(delivered) => {
            metrics.increment_events_published();
            tracing::debug!(%room_code, event = name, delivered, "Published event");
        }
        Err(error) => {
            metrics.increment_events_undelivered();
            tracing::warn!(%room_code, event = name, %error, "Failed to publish event");
        }
    }
}

/// In-process channels keyed by room code, created lazily on first subscribe.
#[derive(Debug)]
pub struct ChannelHub {
    channels: DashMap<RoomCode, broadcast::Sender<BroadcastMessage>>,
    capacity: usize,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, room_code: &str) -> broadcast::Receiver<BroadcastMessage> {
        self.channels
            .entry(room_code.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drop the channel once nobody listens. Returns whether it was removed.
    pub fn prune(&self, room_code: &str) -> bool {
        self.channels
            .remove_if(room_code, |_, sender| sender.receiver_count() == 0)
            .is_some()
    }

    pub fn subscriber_count(&self, room_code: &str) -> usize {
        self.channels
            .get(room_code)
            .map_or(0, |sender| sender.receiver_count())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Codes of every room that currently has a channel.
    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[async_trait]
impl EventPublisher for ChannelHub {
    async fn publish(&self, room_code: &str, event: RoomEvent) -> anyhow::Result<usize> {
        let Some(sender) = self.channels.get(room_code) else {
            return Ok(0);
        };
        let message = BroadcastMessage::new(event)?;
        // send only fails when every receiver is gone
        Ok(sender.send(message).unwrap_or(0))
    }
}
