use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{BlindtagError, BlindtagResult};

/// Top-level client configuration (loaded from blindtag.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlindtagConfig {
    pub backend: BackendConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the remote store (default: http://localhost:7777)
    pub base_url: String,
    /// File holding the base64-encoded 32-byte backend key
    pub key_file: Option<PathBuf>,
    /// Per-request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Keep decrypted tag pairs in memory between calls (default: true)
    pub cache_tag_pairs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7777".into(),
            key_file: None,
            timeout_secs: 30,
            cache_tag_pairs: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoints(&self) -> BlindtagResult<Endpoints> {
        Endpoints::new(&self.base_url)
    }
}

/// The two store endpoints derived from a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base: String,
    pub rows: String,
    pub tags: String,
}

impl Endpoints {
    /// Validate `base_url` and derive `<base>/rows` and `<base>/tags`.
    ///
    /// Trailing `/` separators are stripped first.
    pub fn new(base_url: &str) -> BlindtagResult<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(BlindtagError::Config(format!(
                "invalid base URL `{base_url}`"
            )));
        }
        url::Url::parse(base)
            .map_err(|e| BlindtagError::Config(format!("invalid base URL `{base_url}`: {e}")))?;

        Ok(Self {
            base: base.to_string(),
            rows: format!("{base}/rows"),
            tags: format!("{base}/tags"),
        })
    }
}

impl BlindtagConfig {
    /// Load configuration from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> BlindtagResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| BlindtagError::Config(format!("parsing config {}: {e}", path.display())))
    }
}
