//! Per-room broadcast hub backed by `tokio::sync::broadcast` channels.
//!
//! One channel per room, created lazily and torn down via [`RoomBroadcaster::close`]
//! when the aggregate behind the room reaches a terminal state. Designed to
//! be shared via `Arc<RoomBroadcaster>` across all engines.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{broadcast, RwLock};

use quizlive_core::types::DbId;

use crate::payload::RoomEvent;

/// Default buffer capacity for each room channel.
///
/// When a room's buffer is full, the oldest un-consumed events are dropped
/// and slow receivers observe a `RecvError::Lagged`.
pub const DEFAULT_ROOM_CAPACITY: usize = 256;

/// Typed key of a broadcast room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// One room per live game session, keyed by pin.
    Game(String),
    /// One room per battle.
    Battle(DbId),
    /// One room per tournament.
    Tournament(DbId),
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Game rooms are addressed by the bare pin.
            RoomId::Game(pin) => write!(f, "{pin}"),
            RoomId::Battle(id) => write!(f, "battle-{id}"),
            RoomId::Tournament(id) => write!(f, "tournament-{id}"),
        }
    }
}

/// Room-scoped fan-out: every subscriber of a room independently receives
/// every event published to it.
pub struct RoomBroadcaster {
    capacity: usize,
    rooms: RwLock<HashMap<RoomId, broadcast::Sender<RoomEvent>>>,
}

impl RoomBroadcaster {
    /// Create a broadcaster whose rooms buffer `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a room, creating its channel on first use.
    pub async fn subscribe(&self, room: RoomId) -> broadcast::Receiver<RoomEvent> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to a room. Returns the number of subscribers the
    /// event reached; an event published to a room nobody subscribed to is
    /// dropped.
    pub async fn publish(&self, room: &RoomId, event: RoomEvent) -> usize {
        let rooms = self.rooms.read().await;
        match rooms.get(room) {
            // Ignore the SendError — it only means there are zero receivers.
            Some(sender) => sender.send(event).unwrap_or(0),
            None => {
                tracing::trace!(room = %room, "Dropping event for room without subscribers");
                0
            }
        }
    }

    /// Tear down a room's channel. Subscribers drain buffered events and
    /// then observe a closed stream. Idempotent.
    pub async fn close(&self, room: &RoomId) {
        self.rooms.write().await.remove(room);
    }

    /// Number of rooms with a live channel.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}
