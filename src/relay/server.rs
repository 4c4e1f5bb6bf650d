//! Websocket relay server.
//!
//! DESIGN
//! ======
//! Puts a [`MemoryRelay`] hub behind a TCP listener and speaks the `ws`
//! frame protocol, so `WsConnector` clients on other machines can share
//! rooms. Each accepted socket opens one hub connection and enters a
//! `select!` loop:
//! - client text frame → `Outbound` → hub
//! - hub event → text frame → client
//!
//! LIFECYCLE
//! =========
//! 1. Accept → websocket handshake → hub sends `connected`, `init-room`
//! 2. Client joins and broadcasts; hub fans out to room peers
//! 3. Close or socket error → hub connection closes, peers get a new roster

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::memory::MemoryRelay;
use super::ws::{decode_outbound, encode_event};
use super::{RelayLink, TransportError};

/// Accept websocket clients until the task is dropped.
///
/// # Errors
///
/// Returns [`TransportError::Unavailable`] when the listener has no local
/// address. Per-socket failures are logged and never end the loop.
pub async fn serve(listener: TcpListener, relay: MemoryRelay) -> Result<(), TransportError> {
    let local = listener.local_addr().map_err(|e| TransportError::Unavailable(e.to_string()))?;
    info!(%local, "relay: listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "relay: accept failed");
                continue;
            }
        };
        let relay = relay.clone();
        tokio::spawn(async move {
            debug!(%peer, "relay: peer accepted");
            handle_socket(stream, relay).await;
            debug!(%peer, "relay: peer gone");
        });
    }
}

async fn handle_socket(stream: TcpStream, relay: MemoryRelay) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "relay: websocket handshake failed");
            return;
        }
    };
    let (mut sink, mut source) = socket.split();
    let RelayLink { mut connection, mut events } = relay.open();

    loop {
        tokio::select! {
            message = source.next() => {
                let Some(Ok(message)) = message else { break };
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                match decode_outbound(text.as_str()) {
                    Ok(Some(outbound)) => {
                        if let Err(e) = connection.send(outbound) {
                            warn!(error = %e, "relay: hub refused client frame");
                            break;
                        }
                    }
                    Ok(None) => debug!("relay: ignoring relay-bound frame from client"),
                    Err(e) => warn!(error = %e, "relay: invalid client frame"),
                }
            }
            Some(event) = events.recv() => {
                let text = match encode_event(&event) {
                    Ok(Some(text)) => text,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(error = %e, event = event.name(), "relay: event encoding failed");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "relay: write failed");
                    break;
                }
            }
        }
    }

    connection.close();
    if let Err(e) = sink.close().await {
        debug!(error = %e, "relay: close handshake failed");
    }
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
