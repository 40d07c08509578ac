//! blindtag-crypto: client-side encryption for blindtag
//!
//! Everything the remote store sees is produced here:
//!
//! ```text
//! Backend Key (256-bit, held by the client, never transmitted)
//!   ├── Row body:    XChaCha20-Poly1305 (key=backend key, nonce=random_192bit)
//!   ├── Plain tag:   XChaCha20-Poly1305 (key=backend key, nonce=random_192bit)
//!   └── Random tag:  160 random bits, hex (independent of the plain tag)
//! ```

pub mod cipher;
pub mod error;
pub mod key;
pub mod nonce;
pub mod random_tag;

pub use cipher::{Cipher, XChaCha20Cipher};
pub use error::CryptoError;
pub use key::BackendKey;
pub use nonce::Nonce;
pub use random_tag::random_tag;

/// Size of a backend key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Number of random bytes behind each random tag (hex doubles the length)
pub const RANDOM_TAG_BYTES: usize = 20;
