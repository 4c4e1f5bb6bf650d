//! Portal: one encrypted relay connection bound to one room.
//!
//! DESIGN
//! ======
//! The portal is the only place that touches keys and sockets. Outbound it
//! frames (`WireMessage` → JSON → AES-GCM) and picks a channel; inbound it
//! decrypts and parses, so the session only ever sees typed messages.
//!
//! States: `Closed → Connecting → Open → Closed`.
//! - `open` stores credentials and the connection (`Connecting`).
//! - relay `init-room` → portal answers `join-room` (`Open`).
//! - `close` releases everything; calling it twice is harmless.
//!
//! Broadcasts are gated on `is_open`: open, initialized by the session, and
//! holding credentials. Anything sent earlier is silently skipped.
//!
//! DELTA FILTERING
//! ===============
//! The portal remembers the last version it broadcast per element id.
//! Reliable `SCENE_UPDATE` deltas carry only new or advanced elements.
//! `SCENE_INIT` and volatile full resyncs carry every syncable element and
//! refresh the memory.
//!
//! ERROR HANDLING
//! ==============
//! Inbound failures come back as `PortalError` so the session can decide
//! between a user-visible warning (decryption) and a quiet drop (unknown
//! message type). Nothing here is fatal to the session.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::ErrorCode;
use crate::crypto::{self, CipherKey, CryptoError, KeyUsage};
use crate::element::{Element, syncable_elements};
use crate::idle::UserIdleState;
use crate::message::{
    self, IdleStatusPayload, MessageError, MouseLocationPayload, Pointer, PointerButton, SceneKind,
    SelectedElementIds, WireMessage,
};
use crate::relay::{Outbound, RelayConnection, RelayEvent, TransportError};
use crate::room::RoomAddress;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ErrorCode for PortalError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Crypto(e) => e.error_code(),
            Self::Message(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.retryable())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalState {
    Closed,
    Connecting,
    Open,
}

/// What an inbound relay event means to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum PortalEvent {
    /// The portal joined its room.
    Joined,
    /// No other occupants.
    FirstInRoom,
    /// A peer arrived and needs the current scene.
    NewUser { socket_id: String },
    /// Room roster, self included.
    RosterChanged { socket_ids: Vec<String> },
    /// Decrypted peer message.
    Message(WireMessage),
    /// The relay connection dropped.
    Disconnected,
}

struct Credentials {
    room_id: String,
    encrypt: CipherKey,
    decrypt: CipherKey,
}

pub struct Portal {
    state: PortalState,
    connection: Option<Box<dyn RelayConnection>>,
    credentials: Option<Credentials>,
    socket_id: Option<String>,
    initialized: bool,
    broadcasted_versions: HashMap<String, u64>,
}

impl Default for Portal {
    fn default() -> Self {
        Self::new()
    }
}

impl Portal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PortalState::Closed,
            connection: None,
            credentials: None,
            socket_id: None,
            initialized: false,
            broadcasted_versions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> PortalState {
        self.state
    }

    /// Relay-assigned id of this connection, once known.
    #[must_use]
    pub fn socket_id(&self) -> Option<&str> {
        self.socket_id.as_deref()
    }

    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.room_id.as_str())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The handshake is over; broadcasts may flow.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Ready to broadcast: open, initialized, and holding credentials.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == PortalState::Open && self.initialized && self.credentials.is_some()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Bind a fresh connection to a room. Returns `false` (and drops the
    /// connection) if the portal is already in use.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Crypto`] if the room key cannot be imported.
    pub fn open(&mut self, connection: Box<dyn RelayConnection>, address: &RoomAddress) -> Result<bool, PortalError> {
        if self.state != PortalState::Closed {
            debug!("portal: open ignored, already connected");
            return Ok(false);
        }
        let credentials = Credentials {
            room_id: address.room_id.clone(),
            encrypt: address.room_key.import(KeyUsage::Encrypt)?,
            decrypt: address.room_key.import(KeyUsage::Decrypt)?,
        };
        info!(room_id = %credentials.room_id, "portal: opening");
        self.credentials = Some(credentials);
        self.connection = Some(connection);
        self.state = PortalState::Connecting;
        Ok(true)
    }

    /// Leave the room and release the connection.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            info!(room_id = ?self.room_id(), "portal: closed");
        }
        self.state = PortalState::Closed;
        self.credentials = None;
        self.socket_id = None;
        self.initialized = false;
        self.broadcasted_versions.clear();
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Interpret one relay event. `Ok(None)` means nothing for the session.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Crypto`] for a broadcast that fails to decrypt,
    /// [`PortalError::Message`] for plaintext that is not a known message,
    /// and [`PortalError::Transport`] if the `join-room` answer cannot be sent.
    pub fn receive(&mut self, event: RelayEvent) -> Result<Option<PortalEvent>, PortalError> {
        if self.state == PortalState::Closed {
            debug!(event = event.name(), "portal: event after close ignored");
            return Ok(None);
        }
        match event {
            RelayEvent::Connected { socket_id } => {
                debug!(%socket_id, "portal: socket id assigned");
                self.socket_id = Some(socket_id);
                Ok(None)
            }
            RelayEvent::InitRoom => {
                let (Some(connection), Some(credentials)) = (&self.connection, &self.credentials) else {
                    return Ok(None);
                };
                connection.send(Outbound::JoinRoom { room_id: credentials.room_id.clone() })?;
                self.state = PortalState::Open;
                info!(room_id = %credentials.room_id, "portal: joined room");
                Ok(Some(PortalEvent::Joined))
            }
            RelayEvent::FirstInRoom => Ok(Some(PortalEvent::FirstInRoom)),
            RelayEvent::NewUser { socket_id } => Ok(Some(PortalEvent::NewUser { socket_id })),
            RelayEvent::RoomUserChange { socket_ids } => Ok(Some(PortalEvent::RosterChanged { socket_ids })),
            RelayEvent::ClientBroadcast { ciphertext, iv } => {
                let Some(credentials) = &self.credentials else {
                    return Ok(None);
                };
                let plaintext = crypto::decrypt(&credentials.decrypt, &ciphertext, &iv)?;
                let message = message::decode_message(&plaintext)?;
                debug!(kind = message.type_name(), "portal: recv");
                Ok(Some(PortalEvent::Message(message)))
            }
            RelayEvent::Disconnected => {
                warn!(room_id = ?self.room_id(), "portal: relay disconnected");
                Ok(Some(PortalEvent::Disconnected))
            }
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Broadcast a scene. Returns the number of elements sent, or `None` if
    /// nothing went out (portal not open, or an empty delta).
    ///
    /// `allow_volatile` marks a full resync: every syncable element is sent
    /// on the best-effort channel when the relay has one.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError`] if framing, encryption, or the send fails.
    pub fn broadcast_scene(
        &mut self,
        kind: SceneKind,
        elements: &[Element],
        allow_volatile: bool,
    ) -> Result<Option<usize>, PortalError> {
        if !self.is_open() {
            return Ok(None);
        }
        let full = kind == SceneKind::Init || allow_volatile;
        let syncable: Vec<Element> = syncable_elements(elements)
            .into_iter()
            .filter(|el| full || self.broadcasted_versions.get(&el.id).is_none_or(|v| el.version > *v))
            .collect();
        if syncable.is_empty() && !full {
            return Ok(None);
        }
        let sent: Vec<(String, u64)> = syncable.iter().map(|el| (el.id.clone(), el.version)).collect();
        let count = sent.len();
        self.send(&kind.message(syncable), allow_volatile)?;
        // Recorded only once the send went through.
        self.broadcasted_versions.extend(sent);
        Ok(Some(count))
    }

    /// Volatile pointer broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError`] if framing, encryption, or the send fails.
    pub fn broadcast_mouse_location(
        &mut self,
        pointer: Pointer,
        button: PointerButton,
        selected_element_ids: SelectedElementIds,
        username: &str,
    ) -> Result<bool, PortalError> {
        let Some(socket_id) = self.broadcast_socket_id() else {
            return Ok(false);
        };
        let message = WireMessage::MouseLocation(MouseLocationPayload {
            socket_id,
            pointer,
            button,
            selected_element_ids,
            username: username.to_owned(),
        });
        self.send(&message, true)?;
        Ok(true)
    }

    /// Volatile idle-state broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError`] if framing, encryption, or the send fails.
    pub fn broadcast_idle_change(&mut self, user_state: UserIdleState, username: &str) -> Result<bool, PortalError> {
        let Some(socket_id) = self.broadcast_socket_id() else {
            return Ok(false);
        };
        let message =
            WireMessage::IdleStatus(IdleStatusPayload { socket_id, user_state, username: username.to_owned() });
        self.send(&message, true)?;
        Ok(true)
    }

    fn broadcast_socket_id(&self) -> Option<String> {
        if !self.is_open() {
            return None;
        }
        self.socket_id.clone()
    }

    fn send(&self, message: &WireMessage, allow_volatile: bool) -> Result<(), PortalError> {
        let (Some(connection), Some(credentials)) = (&self.connection, &self.credentials) else {
            return Ok(());
        };
        let plaintext = message::encode_message(message)?;
        let encrypted = crypto::encrypt(&credentials.encrypt, &plaintext)?;
        let volatile = allow_volatile && connection.supports_volatile();
        connection.send(Outbound::Broadcast {
            room_id: credentials.room_id.clone(),
            volatile,
            ciphertext: encrypted.ciphertext,
            iv: encrypted.iv,
        })?;
        debug!(kind = message.type_name(), volatile, bytes = plaintext.len(), "portal: send");
        Ok(())
    }
}

#[cfg(test)]
#[path = "portal_test.rs"]
mod tests;
