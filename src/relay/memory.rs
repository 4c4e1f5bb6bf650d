//! In-process relay hub.
//!
//! DESIGN
//! ======
//! Behaves like the room server: assigns connection ids, answers a fresh
//! connection with `init-room`, tracks room membership in join order, and
//! fans broadcasts out to the other occupants. Every broadcast is also
//! recorded so callers can inspect exactly what crossed the wire, unless
//! the relay was built `without_log`.
//!
//! Delivery is synchronous `try_send` into each connection's event channel.
//! A full channel drops volatile traffic and logs reliable drops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    EVENT_CHANNEL_CAPACITY, Outbound, RelayConnection, RelayConnector, RelayEvent, RelayLink,
    TransportError,
};
use crate::crypto::IV_LENGTH_BYTES;

/// One broadcast as the relay saw it: routing data plus opaque ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedBroadcast {
    pub from: String,
    pub room_id: String,
    pub volatile: bool,
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LENGTH_BYTES],
}

#[derive(Default)]
struct Hub {
    connections: HashMap<String, mpsc::Sender<RelayEvent>>,
    /// Room id → member connection ids in join order.
    rooms: HashMap<String, Vec<String>>,
    log: Vec<RelayedBroadcast>,
    unlogged: bool,
}

impl Hub {
    fn deliver(&self, socket_id: &str, event: RelayEvent, volatile: bool) {
        let Some(tx) = self.connections.get(socket_id) else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) if !volatile => {
                warn!(%socket_id, event = event.name(), "relay: reliable delivery dropped, channel full");
            }
            Err(_) => debug!(%socket_id, "relay: delivery skipped"),
        }
    }

    fn announce_roster(&self, room_id: &str) {
        let Some(members) = self.rooms.get(room_id) else {
            return;
        };
        for member in members {
            self.deliver(member, RelayEvent::RoomUserChange { socket_ids: members.clone() }, false);
        }
    }

    fn join(&mut self, socket_id: &str, room_id: &str) {
        let members = self.rooms.entry(room_id.to_owned()).or_default();
        if members.iter().any(|m| m == socket_id) {
            return;
        }
        members.push(socket_id.to_owned());
        let members = members.clone();
        info!(%room_id, %socket_id, occupants = members.len(), "relay: joined room");

        if members.len() == 1 {
            self.deliver(socket_id, RelayEvent::FirstInRoom, false);
        } else {
            for member in members.iter().filter(|m| *m != socket_id) {
                self.deliver(member, RelayEvent::NewUser { socket_id: socket_id.to_owned() }, false);
            }
        }
        self.announce_roster(room_id);
    }

    fn broadcast(&mut self, from: &str, room_id: &str, volatile: bool, ciphertext: Vec<u8>, iv: [u8; IV_LENGTH_BYTES]) {
        let Some(members) = self.rooms.get(room_id) else {
            warn!(%room_id, %from, "relay: broadcast to unknown room");
            return;
        };
        if !members.iter().any(|m| m == from) {
            warn!(%room_id, %from, "relay: broadcast from non-member");
            return;
        }
        for member in members.iter().filter(|m| *m != from) {
            let event = RelayEvent::ClientBroadcast { ciphertext: ciphertext.clone(), iv: iv.to_vec() };
            self.deliver(member, event, volatile);
        }
        if !self.unlogged {
            self.log.push(RelayedBroadcast { from: from.to_owned(), room_id: room_id.to_owned(), volatile, ciphertext, iv });
        }
    }

    fn disconnect(&mut self, socket_id: &str) {
        self.connections.remove(socket_id);
        let mut touched = Vec::new();
        for (room_id, members) in &mut self.rooms {
            let before = members.len();
            members.retain(|m| m != socket_id);
            if members.len() != before {
                touched.push(room_id.clone());
            }
        }
        self.rooms.retain(|_, members| !members.is_empty());
        for room_id in touched {
            self.announce_roster(&room_id);
        }
        info!(%socket_id, "relay: connection closed");
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Shared handle to one in-process relay. Clones talk to the same hub.
#[derive(Clone)]
pub struct MemoryRelay {
    hub: Arc<Mutex<Hub>>,
    volatile: bool,
    available: bool,
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRelay {
    #[must_use]
    pub fn new() -> Self {
        Self { hub: Arc::new(Mutex::new(Hub::default())), volatile: true, available: true }
    }

    /// A relay whose connections only offer reliable delivery.
    #[must_use]
    pub fn without_volatile(mut self) -> Self {
        self.volatile = false;
        self
    }

    /// Stop recording broadcasts. Long-running relays use this.
    #[must_use]
    pub fn without_log(self) -> Self {
        self.hub().unlogged = true;
        self
    }

    /// A relay that refuses every connection.
    #[must_use]
    pub fn offline() -> Self {
        Self { available: false, ..Self::new() }
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Members of a room in join order.
    #[must_use]
    pub fn room_members(&self, room_id: &str) -> Vec<String> {
        self.hub().rooms.get(room_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.hub().connections.len()
    }

    /// Every broadcast relayed so far, oldest first.
    #[must_use]
    pub fn broadcasts(&self) -> Vec<RelayedBroadcast> {
        self.hub().log.clone()
    }

    /// Open a connection directly, outside any session.
    #[must_use]
    pub fn open(&self) -> RelayLink {
        let socket_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        {
            let mut hub = self.hub();
            hub.connections.insert(socket_id.clone(), tx);
            hub.deliver(&socket_id, RelayEvent::Connected { socket_id: socket_id.clone() }, false);
            hub.deliver(&socket_id, RelayEvent::InitRoom, false);
        }
        debug!(%socket_id, "relay: connection opened");
        let connection =
            MemoryConnection { hub: Arc::clone(&self.hub), socket_id, volatile: self.volatile, closed: false };
        RelayLink { connection: Box::new(connection), events: rx }
    }
}

#[async_trait]
impl RelayConnector for MemoryRelay {
    async fn connect(&self) -> Result<RelayLink, TransportError> {
        if !self.available {
            return Err(TransportError::Unavailable("in-process relay is offline".into()));
        }
        Ok(self.open())
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

struct MemoryConnection {
    hub: Arc<Mutex<Hub>>,
    socket_id: String,
    volatile: bool,
    closed: bool,
}

impl RelayConnection for MemoryConnection {
    fn send(&self, outbound: Outbound) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound {
            Outbound::JoinRoom { room_id } => hub.join(&self.socket_id, &room_id),
            Outbound::Broadcast { room_id, volatile, ciphertext, iv } => {
                hub.broadcast(&self.socket_id, &room_id, volatile && self.volatile, ciphertext, iv);
            }
        }
        Ok(())
    }

    fn supports_volatile(&self) -> bool {
        self.volatile
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.hub.lock().unwrap_or_else(PoisonError::into_inner).disconnect(&self.socket_id);
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
