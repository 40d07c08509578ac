//! blindtag-store: moves wire rows and tag pairs to and from the remote store
//!
//! Nothing in this crate sees plaintext. [`HttpStore`] speaks JSON over HTTP;
//! [`MemoryStore`] keeps everything in-process with the same query semantics.

pub mod http;
pub mod memory;
pub mod traits;

pub use http::HttpStore;
pub use memory::{MemoryStore, RequestCounts};
pub use traits::TagStore;
