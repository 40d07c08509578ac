//! Backend key file: base64 of the 32 raw key bytes, surrounding whitespace ignored

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blindtag_core::{BlindtagError, BlindtagResult};
use blindtag_crypto::BackendKey;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

pub fn load_key(path: &Path) -> BlindtagResult<BackendKey> {
    let encoded = std::fs::read_to_string(path)
        .map(SecretString::from)
        .map_err(|e| BlindtagError::Config(format!("reading key file {}: {e}", path.display())))?;
    parse_key(&encoded)
}

pub fn parse_key(encoded: &SecretString) -> BlindtagResult<BackendKey> {
    let raw = STANDARD
        .decode(encoded.expose_secret().trim())
        .map(Zeroizing::new)
        .map_err(|e| BlindtagError::InvalidKey(format!("key file is not valid base64: {e}")))?;
    Ok(BackendKey::from_slice(&raw)?)
}
