//! The backend key: the only secret a blindtag client holds

use zeroize::Zeroize;

use crate::{CryptoError, KEY_SIZE};

/// A 256-bit symmetric key used for every row body and tag pair.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct BackendKey {
    bytes: [u8; KEY_SIZE],
}

impl BackendKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build a key from raw key material of unknown length.
    pub fn from_slice(raw: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidKey { len: raw.len() })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for BackendKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for BackendKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
