//! blindtag-client: searchable encrypted storage over an untrusted store
//!
//! Save path:
//!   plaintext row → registry (plain tag → random tag, creating pairs) → codec (encrypt body) → store
//!
//! Read path:
//!   store → wire rows → codec (decrypt bodies) → registry (random tag → plain tag) → plaintext rows
//!
//! The store only ever sees ciphertext and random tags. It can still tell
//! which rows share a random tag (co-occurrence); that is inherent to a blind
//! index and is not hidden here.

pub mod backend;
pub mod cache;
pub mod codec;
pub mod registry;

pub use backend::Backend;
pub use cache::TagPairCache;
pub use codec::RowCodec;
pub use registry::TagPairRegistry;
