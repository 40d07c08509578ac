pub mod config;
pub mod error;
pub mod types;

pub use error::{BlindtagError, BlindtagResult};
pub use types::{Row, TagPair};
