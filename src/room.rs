//! Room addressing: room id + key carried in a shareable link fragment.
//!
//! DESIGN
//! ======
//! A collaboration link is the page URL with `#room=<roomId>,<roomKey>`
//! appended. The fragment never reaches the web server, so possession of the
//! link is the only thing granting access to the room. Both parts use the
//! URL-safe alphabet `[A-Za-z0-9_-]`.
//!
//! A key that is present but not exactly 22 characters is rejected outright:
//! a truncated link must disable collaboration rather than join a room that
//! can never decrypt anything.

use rand::Rng;

use crate::crypto::{CryptoError, ROOM_KEY_LENGTH, RoomKey};

const FRAGMENT_PREFIX: &str = "#room=";
const ROOM_ID_LENGTH_BYTES: usize = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomLinkError {
    #[error("Encryption key must be of {ROOM_KEY_LENGTH} characters. Live collaboration is disabled")]
    InvalidKeyLength(usize),
    #[error("Encryption key is malformed. Live collaboration is disabled")]
    InvalidKey,
}

impl crate::ErrorCode for RoomLinkError {
    fn error_code(&self) -> &'static str {
        "E_ROOM_KEY"
    }
}

/// Credentials for one collaboration room. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAddress {
    pub room_id: String,
    pub room_key: RoomKey,
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a random 20-hex-char room id.
#[must_use]
pub fn generate_room_id() -> String {
    let bytes: [u8; ROOM_ID_LENGTH_BYTES] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Fresh credentials for a room this client is about to host.
#[must_use]
pub fn generate_room_address() -> RoomAddress {
    RoomAddress { room_id: generate_room_id(), room_key: RoomKey::generate() }
}

/// Build the shareable link for `address` on top of the current page location.
///
/// Any existing query string or fragment on `location` is dropped.
#[must_use]
pub fn collaboration_link(location: &str, address: &RoomAddress) -> String {
    format!(
        "{}{FRAGMENT_PREFIX}{},{}",
        page_base(location),
        address.room_id,
        address.room_key.as_str()
    )
}

/// Parse the room fragment out of a link.
///
/// Returns `Ok(None)` when the link carries no (well-formed) room fragment.
///
/// # Errors
///
/// Returns [`RoomLinkError::InvalidKeyLength`] when a room fragment is
/// present but its key is not exactly 22 characters, and
/// [`RoomLinkError::InvalidKey`] when the key does not decode.
pub fn parse_collaboration_link(link: &str) -> Result<Option<RoomAddress>, RoomLinkError> {
    let Some(hash_at) = link.find('#') else {
        return Ok(None);
    };
    let Some(body) = link[hash_at..].strip_prefix(FRAGMENT_PREFIX) else {
        return Ok(None);
    };
    let Some((room_id, room_key)) = body.split_once(',') else {
        return Ok(None);
    };
    if !is_url_safe(room_id) || !is_url_safe(room_key) {
        return Ok(None);
    }
    if room_key.len() != ROOM_KEY_LENGTH {
        return Err(RoomLinkError::InvalidKeyLength(room_key.len()));
    }
    let room_key = RoomKey::parse(room_key).map_err(|e| match e {
        CryptoError::InvalidKeyLength(n) => RoomLinkError::InvalidKeyLength(n),
        _ => RoomLinkError::InvalidKey,
    })?;
    Ok(Some(RoomAddress { room_id: room_id.to_owned(), room_key }))
}

/// `scheme://host[:port]` of a location, or the whole input if it has no authority.
#[must_use]
pub fn page_origin(location: &str) -> &str {
    let base = page_base(location);
    let Some(scheme_end) = base.find("://") else {
        return base;
    };
    let authority_start = scheme_end + 3;
    match base[authority_start..].find('/') {
        Some(path_start) => &base[..authority_start + path_start],
        None => base,
    }
}

/// Origin + path, without query or fragment.
fn page_base(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    &location[..end]
}

fn is_url_safe(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
