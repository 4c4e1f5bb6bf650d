//! Room encryption: AES-128-GCM over every relayed payload.
//!
//! DESIGN
//! ======
//! A room key is 16 random bytes serialized as unpadded base64url, which is
//! exactly 22 characters and safe to embed in a link fragment. The relay only
//! ever sees ciphertext plus the 96-bit IV that travels next to it.
//!
//! Every `encrypt` call draws a fresh random IV. Keys are imported once per
//! usage into a `CipherKey` handle so the hot path does not re-parse the
//! serialized form.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

/// Raw key length in bytes (128 bits).
pub const KEY_LENGTH_BYTES: usize = 16;

/// Serialized key length in characters.
pub const ROOM_KEY_LENGTH: usize = 22;

/// IV length in bytes (96 bits).
pub const IV_LENGTH_BYTES: usize = 12;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("room key must be {ROOM_KEY_LENGTH} characters, got {0}")]
    InvalidKeyLength(usize),
    #[error("room key is not valid base64url")]
    InvalidKeyEncoding,
    #[error("iv must be {IV_LENGTH_BYTES} bytes, got {0}")]
    InvalidIv(usize),
    #[error("key was imported for {0:?} only")]
    WrongUsage(KeyUsage),
    #[error("couldn't encrypt payload")]
    Encryption,
    #[error("couldn't decrypt data")]
    Decryption,
}

impl crate::ErrorCode for CryptoError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidKeyLength(_) | Self::InvalidKeyEncoding => "E_ROOM_KEY",
            Self::InvalidIv(_) | Self::Decryption => "E_DECRYPT",
            Self::WrongUsage(_) | Self::Encryption => "E_ENCRYPT",
        }
    }
}

// =============================================================================
// KEYS
// =============================================================================

/// Serialized room key, always [`ROOM_KEY_LENGTH`] base64url characters.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RoomKey(String);

impl RoomKey {
    /// Generate a fresh random 128-bit key.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; KEY_LENGTH_BYTES] = rand::rng().random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Validate a serialized key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless the key is exactly
    /// 22 characters, and [`CryptoError::InvalidKeyEncoding`] if it does not
    /// decode to 16 bytes.
    pub fn parse(raw: &str) -> Result<Self, CryptoError> {
        if raw.len() != ROOM_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength(raw.chars().count()));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| CryptoError::InvalidKeyEncoding)?;
        if bytes.len() != KEY_LENGTH_BYTES {
            return Err(CryptoError::InvalidKeyEncoding);
        }
        Ok(Self(raw.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Import this key for one usage.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyEncoding`] if the stored form no
    /// longer decodes, which cannot happen for keys built through
    /// [`RoomKey::generate`] or [`RoomKey::parse`].
    pub fn import(&self, usage: KeyUsage) -> Result<CipherKey, CryptoError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|_| CryptoError::InvalidKeyEncoding)?;
        let cipher = Aes128Gcm::new_from_slice(&bytes).map_err(|_| CryptoError::InvalidKeyEncoding)?;
        Ok(CipherKey { cipher, usage })
    }
}

// Keys are secrets; never print them in logs.
impl std::fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RoomKey(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
}

/// Imported key bound to a single usage.
#[derive(Clone)]
pub struct CipherKey {
    cipher: Aes128Gcm,
    usage: KeyUsage,
}

impl CipherKey {
    #[must_use]
    pub fn usage(&self) -> KeyUsage {
        self.usage
    }
}

// =============================================================================
// ENCRYPT / DECRYPT
// =============================================================================

/// Ciphertext (with appended auth tag) plus the IV it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encrypted {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LENGTH_BYTES],
}

/// Fresh random 96-bit IV.
#[must_use]
pub fn create_iv() -> [u8; IV_LENGTH_BYTES] {
    rand::rng().random()
}

/// Seal `plaintext` under a fresh IV.
///
/// # Errors
///
/// Returns [`CryptoError::WrongUsage`] for a decrypt-only key.
pub fn encrypt(key: &CipherKey, plaintext: &[u8]) -> Result<Encrypted, CryptoError> {
    if key.usage != KeyUsage::Encrypt {
        return Err(CryptoError::WrongUsage(key.usage));
    }
    let iv = create_iv();
    let ciphertext = key
        .cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Encryption)?;
    Ok(Encrypted { ciphertext, iv })
}

/// Open `ciphertext` sealed under `iv`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidIv`] for a malformed IV and
/// [`CryptoError::Decryption`] when the tag does not verify (wrong key,
/// tampered or truncated ciphertext).
pub fn decrypt(key: &CipherKey, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.usage != KeyUsage::Decrypt {
        return Err(CryptoError::WrongUsage(key.usage));
    }
    if iv.len() != IV_LENGTH_BYTES {
        return Err(CryptoError::InvalidIv(iv.len()));
    }
    key.cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
#[path = "crypto_test.rs"]
mod tests;
