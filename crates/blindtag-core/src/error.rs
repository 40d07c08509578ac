use blindtag_crypto::CryptoError;
use thiserror::Error;

pub type BlindtagResult<T> = Result<T, BlindtagError>;

#[derive(Debug, Error)]
pub enum BlindtagError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("store returned HTTP {status}: `{body}`")]
    Store { status: u16, body: String },

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("unresolvable random tag: {0}")]
    TagResolution(String),

    #[error("no tag pairs found for plain tags {0:?}")]
    NotFound(Vec<String>),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CryptoError> for BlindtagError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidKey { .. } => BlindtagError::InvalidKey(e.to_string()),
            CryptoError::InvalidNonce { .. } => BlindtagError::Serialization(e.to_string()),
            CryptoError::Encrypt => BlindtagError::Encryption(e.to_string()),
            CryptoError::Decrypt => BlindtagError::Decryption(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for BlindtagError {
    fn from(e: serde_json::Error) -> Self {
        BlindtagError::Serialization(e.to_string())
    }
}
