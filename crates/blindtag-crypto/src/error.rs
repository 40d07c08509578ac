use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: {len} bytes (expected {expected})", expected = crate::KEY_SIZE)]
    InvalidKey { len: usize },

    #[error("invalid nonce length: {len} bytes (expected {expected})", expected = crate::NONCE_SIZE)]
    InvalidNonce { len: usize },

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: wrong key or corrupted data")]
    Decrypt,
}
