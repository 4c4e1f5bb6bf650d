//! End-to-end encrypted real-time collaboration core for a vector drawing
//! editor.
//!
//! Peers share a room through a link whose fragment carries the room id and
//! an AES-GCM key. Every scene and presence message is encrypted before it
//! reaches the relay, so the relay only ever routes opaque ciphertext.
//! Concurrent edits converge through a deterministic per-element merge.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`crypto`] | Room keys, AES-GCM encrypt/decrypt |
//! | [`room`] | Room addresses and collaboration links |
//! | [`element`] | Replicated element model and scene version |
//! | [`reconcile`] | Remote/local scene merge |
//! | [`message`] | Wire envelope (`SCENE_INIT`, `SCENE_UPDATE`, presence) |
//! | [`relay`] | Relay transport: websocket client, in-process hub and relay server |
//! | [`portal`] | Encrypted room channel over one relay connection |
//! | [`presence`] | Per-peer pointer, selection and idle state |
//! | [`throttle`] | Full-resync throttle |
//! | [`idle`] | Local idle detection |
//! | [`editor`] | Editor and host-shell contracts plus in-memory doubles |
//! | [`session`] | Session lifecycle, handshake and broadcast scheduling |
//! | [`config`] | Environment-driven session settings |

pub mod config;
pub mod crypto;
pub mod editor;
pub mod element;
pub mod idle;
pub mod message;
pub mod portal;
pub mod presence;
pub mod reconcile;
pub mod relay;
pub mod room;
pub mod session;
pub mod throttle;

pub use config::SessionConfig;
pub use element::Element;
pub use room::RoomAddress;
pub use session::{CollabError, CollabSession, InitialScene, InitialSceneHandle, SessionPhase};

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for errors surfaced to the user.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
