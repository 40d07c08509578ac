//! XChaCha20-Poly1305 encryption under the backend key
//!
//! The nonce travels next to the ciphertext (as its own wire field), so the
//! ciphertext format here is just:
//! ```text
//! [N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};

use crate::{BackendKey, CryptoError, Nonce, TAG_SIZE};

/// Authenticated encryption under a fixed key with a caller-supplied nonce.
///
/// The registry and codec only ever see this trait, so tests can swap in a
/// cipher bound to a different key.
pub trait Cipher: Send + Sync {
    /// Encrypt, binding `aad` into the authentication tag.
    fn encrypt_with_aad(
        &self,
        plaintext: &[u8],
        aad: &[u8],
        nonce: &Nonce,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt and authenticate against `aad`. Never returns unauthenticated plaintext.
    fn decrypt_with_aad(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
        nonce: &Nonce,
    ) -> Result<Vec<u8>, CryptoError>;

    fn encrypt(&self, plaintext: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
        self.encrypt_with_aad(plaintext, &[], nonce)
    }

    fn decrypt(&self, ciphertext: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
        self.decrypt_with_aad(ciphertext, &[], nonce)
    }
}

/// [`Cipher`] backed by XChaCha20-Poly1305 and a [`BackendKey`].
pub struct XChaCha20Cipher {
    key: BackendKey,
}

impl XChaCha20Cipher {
    pub fn new(key: BackendKey) -> Self {
        Self { key }
    }
}

impl std::fmt::Debug for XChaCha20Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XChaCha20Cipher")
            .field("key", &self.key)
            .finish()
    }
}

impl Cipher for XChaCha20Cipher {
    fn encrypt_with_aad(
        &self,
        plaintext: &[u8],
        aad: &[u8],
        nonce: &Nonce,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());
        cipher
            .encrypt(
                XNonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Encrypt)
    }

    fn decrypt_with_aad(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
        nonce: &Nonce,
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < TAG_SIZE {
            tracing::debug!(len = ciphertext.len(), "ciphertext shorter than auth tag");
            return Err(CryptoError::Decrypt);
        }

        let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());
        cipher
            .decrypt(
                XNonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Decrypt)
    }
}
