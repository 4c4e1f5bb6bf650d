use super::*;

fn keys() -> (CipherKey, CipherKey) {
    let key = RoomKey::generate();
    (key.import(KeyUsage::Encrypt).unwrap(), key.import(KeyUsage::Decrypt).unwrap())
}

// =============================================================================
// RoomKey
// =============================================================================

#[test]
fn generated_key_is_22_url_safe_chars() {
    let key = RoomKey::generate();
    assert_eq!(key.as_str().len(), ROOM_KEY_LENGTH);
    assert!(
        key.as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
}

#[test]
fn generated_keys_differ() {
    assert_ne!(RoomKey::generate(), RoomKey::generate());
}

#[test]
fn parse_accepts_generated_key() {
    let key = RoomKey::generate();
    let parsed = RoomKey::parse(key.as_str()).unwrap();
    assert_eq!(parsed, key);
}

#[test]
fn parse_rejects_short_key() {
    assert_eq!(RoomKey::parse("abcdefghij"), Err(CryptoError::InvalidKeyLength(10)));
}

#[test]
fn parse_rejects_long_key() {
    let raw = "a".repeat(23);
    assert_eq!(RoomKey::parse(&raw), Err(CryptoError::InvalidKeyLength(23)));
}

#[test]
fn parse_rejects_non_base64_key() {
    let raw = "!".repeat(ROOM_KEY_LENGTH);
    assert_eq!(RoomKey::parse(&raw), Err(CryptoError::InvalidKeyEncoding));
}

#[test]
fn debug_output_hides_key_material() {
    let key = RoomKey::generate();
    let debug = format!("{key:?}");
    assert!(!debug.contains(key.as_str()));
}

// =============================================================================
// encrypt / decrypt
// =============================================================================

#[test]
fn round_trip_restores_plaintext() {
    let (enc, dec) = keys();
    let sealed = encrypt(&enc, b"{\"type\":\"SCENE_UPDATE\"}").unwrap();
    let opened = decrypt(&dec, &sealed.ciphertext, &sealed.iv).unwrap();
    assert_eq!(opened, b"{\"type\":\"SCENE_UPDATE\"}");
}

#[test]
fn round_trip_handles_arbitrary_bytes() {
    let (enc, dec) = keys();
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let sealed = encrypt(&enc, &payload).unwrap();
    assert_eq!(decrypt(&dec, &sealed.ciphertext, &sealed.iv).unwrap(), payload);
}

#[test]
fn round_trip_handles_empty_payload() {
    let (enc, dec) = keys();
    let sealed = encrypt(&enc, &[]).unwrap();
    assert!(decrypt(&dec, &sealed.ciphertext, &sealed.iv).unwrap().is_empty());
}

#[test]
fn each_encrypt_uses_fresh_iv() {
    let (enc, _) = keys();
    let a = encrypt(&enc, b"same").unwrap();
    let b = encrypt(&enc, b"same").unwrap();
    assert_ne!(a.iv, b.iv);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn wrong_key_fails_with_decryption_error() {
    let (enc, _) = keys();
    let (_, other_dec) = keys();
    let sealed = encrypt(&enc, b"secret").unwrap();
    assert_eq!(decrypt(&other_dec, &sealed.ciphertext, &sealed.iv), Err(CryptoError::Decryption));
}

#[test]
fn tampered_ciphertext_fails() {
    let (enc, dec) = keys();
    let mut sealed = encrypt(&enc, b"secret").unwrap();
    sealed.ciphertext[0] ^= 0x01;
    assert_eq!(decrypt(&dec, &sealed.ciphertext, &sealed.iv), Err(CryptoError::Decryption));
}

#[test]
fn truncated_ciphertext_fails() {
    let (enc, dec) = keys();
    let sealed = encrypt(&enc, b"secret").unwrap();
    assert_eq!(decrypt(&dec, &sealed.ciphertext[..4], &sealed.iv), Err(CryptoError::Decryption));
}

#[test]
fn tampered_iv_fails() {
    let (enc, dec) = keys();
    let mut sealed = encrypt(&enc, b"secret").unwrap();
    sealed.iv[3] ^= 0xff;
    assert_eq!(decrypt(&dec, &sealed.ciphertext, &sealed.iv), Err(CryptoError::Decryption));
}

#[test]
fn malformed_iv_length_is_rejected() {
    let (enc, dec) = keys();
    let sealed = encrypt(&enc, b"secret").unwrap();
    assert_eq!(decrypt(&dec, &sealed.ciphertext, &sealed.iv[..8]), Err(CryptoError::InvalidIv(8)));
}

#[test]
fn usage_is_enforced() {
    let (enc, dec) = keys();
    assert_eq!(encrypt(&dec, b"x"), Err(CryptoError::WrongUsage(KeyUsage::Decrypt)));
    let sealed = encrypt(&enc, b"x").unwrap();
    assert_eq!(decrypt(&enc, &sealed.ciphertext, &sealed.iv), Err(CryptoError::WrongUsage(KeyUsage::Encrypt)));
}

#[test]
fn error_codes_are_grepable() {
    use crate::ErrorCode;
    assert_eq!(CryptoError::Decryption.error_code(), "E_DECRYPT");
    assert_eq!(CryptoError::InvalidKeyLength(10).error_code(), "E_ROOM_KEY");
}
