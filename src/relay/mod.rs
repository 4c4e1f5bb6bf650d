//! Relay transport: the untrusted room server between peers.
//!
//! DESIGN
//! ======
//! The relay only ever sees room ids and opaque ciphertext. It assigns each
//! connection a transient id, tracks room membership, and fans broadcasts
//! out to the other occupants. This module fixes the event vocabulary and
//! the two seams the portal talks through:
//!
//! - `RelayConnector`: opens a connection (async, may fail).
//! - `RelayConnection`: fire-and-forget sends plus explicit close.
//!
//! Inbound events arrive on a bounded channel handed back with the
//! connection. Dropping the receiver is how a closed session stops hearing
//! about a socket it no longer owns.
//!
//! Implementations: `ws` (websocket relay client) and `memory` (in-process
//! hub for tests and offline runs). `server` puts the hub behind a
//! websocket listener speaking the `ws` frame protocol.

pub mod memory;
pub mod server;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::crypto::IV_LENGTH_BYTES;

// =============================================================================
// EVENT NAMES
// =============================================================================

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_INIT_ROOM: &str = "init-room";
pub const EVENT_JOIN_ROOM: &str = "join-room";
pub const EVENT_FIRST_IN_ROOM: &str = "first-in-room";
pub const EVENT_NEW_USER: &str = "new-user";
pub const EVENT_ROOM_USER_CHANGE: &str = "room-user-change";
pub const EVENT_CLIENT_BROADCAST: &str = "client-broadcast";
pub const EVENT_SERVER_BROADCAST: &str = "server-broadcast";
pub const EVENT_SERVER_VOLATILE_BROADCAST: &str = "server-volatile-broadcast";

/// Inbound event buffer per connection.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("relay unavailable: {0}")]
    Unavailable(String),
    #[error("relay connection closed")]
    Closed,
    #[error("relay send buffer full")]
    Backpressure,
    #[error("relay frame encoding failed: {0}")]
    Encode(String),
}

impl crate::ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        "E_TRANSPORT"
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Backpressure)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Relay → client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Connection established; the relay's id for this socket.
    Connected { socket_id: String },
    /// Relay is ready for a `join-room`.
    InitRoom,
    /// Joined a room with no other occupants.
    FirstInRoom,
    /// Another connection joined the room.
    NewUser { socket_id: String },
    /// Full roster of the room, self included.
    RoomUserChange { socket_ids: Vec<String> },
    /// Encrypted message from a peer.
    ClientBroadcast { ciphertext: Vec<u8>, iv: Vec<u8> },
    /// The socket went away.
    Disconnected,
}

impl RelayEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => EVENT_CONNECTED,
            Self::InitRoom => EVENT_INIT_ROOM,
            Self::FirstInRoom => EVENT_FIRST_IN_ROOM,
            Self::NewUser { .. } => EVENT_NEW_USER,
            Self::RoomUserChange { .. } => EVENT_ROOM_USER_CHANGE,
            Self::ClientBroadcast { .. } => EVENT_CLIENT_BROADCAST,
            Self::Disconnected => "disconnected",
        }
    }
}

/// Client → relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    JoinRoom { room_id: String },
    Broadcast { room_id: String, volatile: bool, ciphertext: Vec<u8>, iv: [u8; IV_LENGTH_BYTES] },
}

impl Outbound {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => EVENT_JOIN_ROOM,
            Self::Broadcast { volatile: false, .. } => EVENT_SERVER_BROADCAST,
            Self::Broadcast { volatile: true, .. } => EVENT_SERVER_VOLATILE_BROADCAST,
        }
    }

    /// Loss-tolerant traffic that may be dropped under pressure.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        matches!(self, Self::Broadcast { volatile: true, .. })
    }
}

// =============================================================================
// SEAMS
// =============================================================================

/// One live relay connection. Sends never block the caller.
pub trait RelayConnection: Send {
    /// Queue an outbound event.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after close, and
    /// [`TransportError::Backpressure`] when a reliable send cannot be queued.
    /// Volatile sends are dropped silently under pressure.
    fn send(&self, outbound: Outbound) -> Result<(), TransportError>;

    /// Whether the relay offers a best-effort channel.
    fn supports_volatile(&self) -> bool;

    /// Leave every room and release the socket. Idempotent.
    fn close(&mut self);
}

/// A connection plus its inbound event stream.
pub struct RelayLink {
    pub connection: Box<dyn RelayConnection>,
    pub events: mpsc::Receiver<RelayEvent>,
}

#[async_trait]
pub trait RelayConnector: Send + Sync {
    /// Open a new connection to the relay.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unavailable`] when the relay cannot be reached.
    async fn connect(&self) -> Result<RelayLink, TransportError>;
}
