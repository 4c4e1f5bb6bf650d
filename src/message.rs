//! Wire envelope: the JSON shape every peer encrypts and relays.
//!
//! DESIGN
//! ======
//! Post-decryption every message is `{ "type": ..., "payload": {...} }`.
//! The relay never sees this layer. Anything whose `type` is not one of the
//! four known kinds is an `INVALID_RESPONSE` locally and gets dropped; a
//! peer running a newer protocol must not be able to break this one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::Element;
use crate::idle::UserIdleState;

pub const SCENE_INIT: &str = "SCENE_INIT";
pub const SCENE_UPDATE: &str = "SCENE_UPDATE";
pub const MOUSE_LOCATION: &str = "MOUSE_LOCATION";
pub const IDLE_STATUS: &str = "IDLE_STATUS";

/// Local label for anything undecryptable or of an unknown kind.
pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";

const KNOWN_TYPES: [&str; 4] = [SCENE_INIT, SCENE_UPDATE, MOUSE_LOCATION, IDLE_STATUS];

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed message json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized message type: {0}")]
    UnknownType(String),
}

impl crate::ErrorCode for MessageError {
    fn error_code(&self) -> &'static str {
        "E_INVALID_RESPONSE"
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Selected element ids in the editor's `{ id: true }` form.
pub type SelectedElementIds = BTreeMap<String, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Init,
    Update,
}

impl SceneKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => SCENE_INIT,
            Self::Update => SCENE_UPDATE,
        }
    }

    #[must_use]
    pub fn message(self, elements: Vec<Element>) -> WireMessage {
        let payload = ScenePayload { elements };
        match self {
            Self::Init => WireMessage::SceneInit(payload),
            Self::Update => WireMessage::SceneUpdate(payload),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WireMessage {
    #[serde(rename = "SCENE_INIT")]
    SceneInit(ScenePayload),
    #[serde(rename = "SCENE_UPDATE")]
    SceneUpdate(ScenePayload),
    #[serde(rename = "MOUSE_LOCATION")]
    MouseLocation(MouseLocationPayload),
    #[serde(rename = "IDLE_STATUS")]
    IdleStatus(IdleStatusPayload),
}

impl WireMessage {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SceneInit(_) => SCENE_INIT,
            Self::SceneUpdate(_) => SCENE_UPDATE,
            Self::MouseLocation(_) => MOUSE_LOCATION,
            Self::IdleStatus(_) => IDLE_STATUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePayload {
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Down,
    #[default]
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseLocationPayload {
    /// Older clients spelled this `socketID`.
    #[serde(alias = "socketID")]
    pub socket_id: String,
    pub pointer: Pointer,
    #[serde(default)]
    pub button: PointerButton,
    #[serde(default)]
    pub selected_element_ids: SelectedElementIds,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleStatusPayload {
    #[serde(alias = "socketID")]
    pub socket_id: String,
    pub user_state: UserIdleState,
    #[serde(default)]
    pub username: String,
}

// =============================================================================
// CODEC
// =============================================================================

/// Serialize a message to the plaintext that gets encrypted.
///
/// # Errors
///
/// Returns [`MessageError::Json`] if serialization fails.
pub fn encode_message(message: &WireMessage) -> Result<Vec<u8>, MessageError> {
    Ok(serde_json::to_vec(message)?)
}

/// Parse decrypted plaintext.
///
/// # Errors
///
/// Returns [`MessageError::UnknownType`] for a well-formed envelope of a
/// kind this client does not know, and [`MessageError::Json`] for anything
/// else that does not parse.
pub fn decode_message(plaintext: &[u8]) -> Result<WireMessage, MessageError> {
    let value: Value = serde_json::from_slice(plaintext)?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or(INVALID_RESPONSE);
    if !KNOWN_TYPES.contains(&kind) {
        return Err(MessageError::UnknownType(kind.to_owned()));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
