//! Websocket relay client and the frame protocol both relay ends share.
//!
//! DESIGN
//! ======
//! Each relay event travels as one JSON text frame:
//! `{ "event": "<name>", "data": ... }`. Binary payloads (ciphertext, iv)
//! are standard base64 strings inside `data`. This is the relay contract of
//! this crate, served by `relay::server`; it is not socket.io, so the
//! drawing editor's hosted socket.io relay cannot be used as an endpoint.
//!
//! `connect` splits the socket into a reader task and a writer task:
//! - reader: text frame → `RelayEvent` → bounded event channel
//! - writer: bounded outbound channel → socket
//!
//! `send` is a `try_send` onto the outbound channel, so the portal never
//! waits on the network. A full channel drops volatile traffic and reports
//! backpressure for reliable traffic.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::crypto::IV_LENGTH_BYTES;

use super::{
    EVENT_CHANNEL_CAPACITY, Outbound, RelayConnection, RelayConnector, RelayEvent, RelayLink,
    TransportError,
};

const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// FRAMES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub(crate) enum RelayFrame {
    Connected(ConnectedData),
    InitRoom,
    JoinRoom(String),
    FirstInRoom,
    NewUser(String),
    RoomUserChange(Vec<String>),
    ClientBroadcast(BroadcastData),
    ServerBroadcast(RoomBroadcastData),
    ServerVolatileBroadcast(RoomBroadcastData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConnectedData {
    pub socket_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BroadcastData {
    pub ciphertext: String,
    pub iv: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomBroadcastData {
    pub room_id: String,
    pub ciphertext: String,
    pub iv: String,
}

/// Parse one inbound text frame.
///
/// Returns `Ok(None)` for well-formed frames that only flow client → relay.
pub(crate) fn decode_frame(text: &str) -> Result<Option<RelayEvent>, TransportError> {
    let frame: RelayFrame =
        serde_json::from_str(text).map_err(|e| TransportError::Encode(e.to_string()))?;
    frame_to_event(frame)
}

pub(crate) fn frame_to_event(frame: RelayFrame) -> Result<Option<RelayEvent>, TransportError> {
    let event = match frame {
        RelayFrame::Connected(data) => RelayEvent::Connected { socket_id: data.socket_id },
        RelayFrame::InitRoom => RelayEvent::InitRoom,
        RelayFrame::FirstInRoom => RelayEvent::FirstInRoom,
        RelayFrame::NewUser(socket_id) => RelayEvent::NewUser { socket_id },
        RelayFrame::RoomUserChange(socket_ids) => RelayEvent::RoomUserChange { socket_ids },
        RelayFrame::ClientBroadcast(data) => RelayEvent::ClientBroadcast {
            ciphertext: decode_base64(&data.ciphertext)?,
            iv: decode_base64(&data.iv)?,
        },
        RelayFrame::JoinRoom(_)
        | RelayFrame::ServerBroadcast(_)
        | RelayFrame::ServerVolatileBroadcast(_) => return Ok(None),
    };
    Ok(Some(event))
}

pub(crate) fn outbound_to_frame(outbound: &Outbound) -> RelayFrame {
    match outbound {
        Outbound::JoinRoom { room_id } => RelayFrame::JoinRoom(room_id.clone()),
        Outbound::Broadcast { room_id, volatile, ciphertext, iv } => {
            let data = RoomBroadcastData {
                room_id: room_id.clone(),
                ciphertext: STANDARD.encode(ciphertext),
                iv: STANDARD.encode(iv),
            };
            if *volatile {
                RelayFrame::ServerVolatileBroadcast(data)
            } else {
                RelayFrame::ServerBroadcast(data)
            }
        }
    }
}

pub(crate) fn encode_outbound(outbound: &Outbound) -> Result<String, TransportError> {
    serde_json::to_string(&outbound_to_frame(outbound)).map_err(|e| TransportError::Encode(e.to_string()))
}

/// The frame a relay writes for one hub event. `Disconnected` never
/// crosses the wire.
pub(crate) fn event_to_frame(event: &RelayEvent) -> Option<RelayFrame> {
    let frame = match event {
        RelayEvent::Connected { socket_id } => {
            RelayFrame::Connected(ConnectedData { socket_id: socket_id.clone() })
        }
        RelayEvent::InitRoom => RelayFrame::InitRoom,
        RelayEvent::FirstInRoom => RelayFrame::FirstInRoom,
        RelayEvent::NewUser { socket_id } => RelayFrame::NewUser(socket_id.clone()),
        RelayEvent::RoomUserChange { socket_ids } => RelayFrame::RoomUserChange(socket_ids.clone()),
        RelayEvent::ClientBroadcast { ciphertext, iv } => RelayFrame::ClientBroadcast(BroadcastData {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(iv),
        }),
        RelayEvent::Disconnected => return None,
    };
    Some(frame)
}

pub(crate) fn encode_event(event: &RelayEvent) -> Result<Option<String>, TransportError> {
    event_to_frame(event)
        .map(|frame| serde_json::to_string(&frame).map_err(|e| TransportError::Encode(e.to_string())))
        .transpose()
}

/// Parse one client frame on the relay side.
///
/// Returns `Ok(None)` for well-formed frames that only flow relay → client.
pub(crate) fn decode_outbound(text: &str) -> Result<Option<Outbound>, TransportError> {
    let frame: RelayFrame =
        serde_json::from_str(text).map_err(|e| TransportError::Encode(e.to_string()))?;
    let (data, volatile) = match frame {
        RelayFrame::JoinRoom(room_id) => return Ok(Some(Outbound::JoinRoom { room_id })),
        RelayFrame::ServerBroadcast(data) => (data, false),
        RelayFrame::ServerVolatileBroadcast(data) => (data, true),
        RelayFrame::Connected(_)
        | RelayFrame::InitRoom
        | RelayFrame::FirstInRoom
        | RelayFrame::NewUser(_)
        | RelayFrame::RoomUserChange(_)
        | RelayFrame::ClientBroadcast(_) => return Ok(None),
    };
    let iv: [u8; IV_LENGTH_BYTES] = decode_base64(&data.iv)?.try_into().map_err(|raw: Vec<u8>| {
        TransportError::Encode(format!("iv must be {IV_LENGTH_BYTES} bytes, got {}", raw.len()))
    })?;
    Ok(Some(Outbound::Broadcast {
        room_id: data.room_id,
        volatile,
        ciphertext: decode_base64(&data.ciphertext)?,
        iv,
    }))
}

fn decode_base64(raw: &str) -> Result<Vec<u8>, TransportError> {
    STANDARD
        .decode(raw)
        .map_err(|e| TransportError::Encode(format!("invalid base64 payload: {e}")))
}

// =============================================================================
// CONNECTOR
// =============================================================================

pub struct WsConnector {
    url: String,
}

impl WsConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RelayConnector for WsConnector {
    async fn connect(&self) -> Result<RelayLink, TransportError> {
        let (socket, _) = connect_async(self.url.as_str()).await.map_err(|e| {
            error!(url = %self.url, error = %e, "relay: connect failed");
            TransportError::Unavailable(e.to_string())
        })?;
        info!(url = %self.url, "relay: connected");

        let (mut sink, mut stream) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RelayEvent>(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "relay: write failed");
                    break;
                }
            }
            if let Err(e) = sink.close().await {
                debug!(error = %e, "relay: close handshake failed");
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(error = %e, "relay: read failed");
                        break;
                    }
                };
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                match decode_frame(text.as_str()) {
                    Ok(Some(event)) => {
                        debug!(event = event.name(), "relay: recv");
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "relay: invalid inbound frame"),
                }
            }
            if event_tx.send(RelayEvent::Disconnected).await.is_err() {
                debug!("relay: disconnect after receiver dropped");
            }
        });

        let connection = WsConnection { outbound: Some(out_tx), reader: Some(reader) };
        Ok(RelayLink { connection: Box::new(connection), events: event_rx })
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

struct WsConnection {
    outbound: Option<mpsc::Sender<Message>>,
    reader: Option<JoinHandle<()>>,
}

impl RelayConnection for WsConnection {
    fn send(&self, outbound: Outbound) -> Result<(), TransportError> {
        let Some(tx) = &self.outbound else {
            return Err(TransportError::Closed);
        };
        let text = encode_outbound(&outbound)?;
        match tx.try_send(Message::Text(text.into())) {
            Ok(()) => {
                debug!(event = outbound.name(), "relay: send");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) if outbound.is_volatile() => {
                debug!(event = outbound.name(), "relay: volatile send dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(TransportError::Backpressure),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    fn supports_volatile(&self) -> bool {
        true
    }

    fn close(&mut self) {
        // Dropping the sender lets the writer flush and send a close frame.
        if self.outbound.take().is_some() {
            info!("relay: closing connection");
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
