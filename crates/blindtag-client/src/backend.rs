//! Backend facade: the public face of the client
//!
//! A `Backend` owns one key and one store. Several backends with different
//! keys can live in the same process; nothing here is global.

use std::sync::Arc;

use blindtag_core::config::{BackendConfig, Endpoints};
use blindtag_core::{BlindtagError, BlindtagResult, Row, TagPair};
use blindtag_crypto::{BackendKey, Cipher, XChaCha20Cipher};
use blindtag_store::{HttpStore, TagStore};
use tracing::{debug, info};

use crate::{RowCodec, TagPairRegistry};

pub struct Backend {
    cipher: Arc<dyn Cipher>,
    store: Arc<dyn TagStore>,
    registry: Arc<TagPairRegistry>,
    codec: RowCodec,
}

impl Backend {
    /// Connect to the HTTP store at `base_url` with raw key material.
    ///
    /// The URL is validated before the key.
    pub fn new(key: &[u8], base_url: &str) -> BlindtagResult<Self> {
        Endpoints::new(base_url)?;
        let key = BackendKey::from_slice(key)?;
        let store = HttpStore::new(base_url)?;
        Ok(Self::with_store(key, Arc::new(store)))
    }

    /// Build from a loaded `[backend]` config section.
    pub fn from_config(config: &BackendConfig, key: BackendKey) -> BlindtagResult<Self> {
        let store = HttpStore::with_timeout(&config.base_url, config.timeout())?;
        info!(
            url = %store.endpoints().base,
            timeout_secs = config.timeout_secs,
            cache = config.cache_tag_pairs,
            "backend configured"
        );
        Ok(Self::with_store(key, Arc::new(store)).with_tag_pair_cache(config.cache_tag_pairs))
    }

    /// Use any store implementation (tests pass a `MemoryStore`).
    pub fn with_store(key: BackendKey, store: Arc<dyn TagStore>) -> Self {
        let cipher: Arc<dyn Cipher> = Arc::new(XChaCha20Cipher::new(key));
        Self::assemble(cipher, store, false)
    }

    /// Enable or disable the process-local tag pair cache.
    pub fn with_tag_pair_cache(self, enabled: bool) -> Self {
        Self::assemble(self.cipher, self.store, enabled)
    }

    fn assemble(cipher: Arc<dyn Cipher>, store: Arc<dyn TagStore>, cache: bool) -> Self {
        let mut registry = TagPairRegistry::new(cipher.clone(), store.clone());
        if cache {
            registry = registry.with_cache();
        }
        let registry = Arc::new(registry);
        let codec = RowCodec::new(cipher.clone(), registry.clone());
        Self {
            cipher,
            store,
            registry,
            codec,
        }
    }

    pub fn registry(&self) -> &TagPairRegistry {
        &self.registry
    }

    /// Every tag pair at the store, decrypted.
    pub async fn all_tag_pairs(&self) -> BlindtagResult<Vec<TagPair>> {
        self.registry.all_tag_pairs().await
    }

    /// Encrypt and store a row; returns the stored row, hydrated.
    pub async fn save_row(&self, row: &Row) -> BlindtagResult<Row> {
        let wire = self.codec.prepare_for_save(row).await?;
        let mut stored = self.store.post_row(&wire).await?;
        self.codec.hydrate(&mut stored).await?;
        info!(tags = stored.random_tags.len(), "row saved");
        Ok(stored)
    }

    /// Store an already sealed tag pair.
    pub async fn save_tag_pair(&self, pair: &TagPair) -> BlindtagResult<TagPair> {
        self.store.post_tag_pair(pair).await?;
        if let (Some(cache), Some(plain)) = (self.registry.cache(), pair.plain()) {
            cache.insert(plain, &pair.random);
        }
        debug!(random = %pair.random, "tag pair saved");
        Ok(pair.clone())
    }

    /// Fetch and decrypt the pairs for the given random tags.
    pub async fn tag_pairs_from_random_tags(&self, random_tags: &[String]) -> BlindtagResult<Vec<TagPair>> {
        if random_tags.is_empty() {
            return Err(BlindtagError::InvalidArgument(
                "at least one random tag is required".into(),
            ));
        }
        self.registry.tag_pairs_for_random(random_tags).await
    }

    /// Rows carrying the given plain tags, hydrated.
    ///
    /// When none of the plain tags has ever been seen, no row can carry them:
    /// the result is empty and the row endpoint is not contacted.
    pub async fn rows_from_plain_tags(&self, plain_tags: &[String]) -> BlindtagResult<Vec<Row>> {
        if plain_tags.is_empty() {
            return Err(BlindtagError::InvalidArgument(
                "at least one plain tag is required".into(),
            ));
        }

        let random_tags = match self.registry.resolve_plain_to_random(plain_tags).await {
            Ok(random_tags) => random_tags,
            Err(BlindtagError::NotFound(missing)) => {
                debug!(missing = missing.len(), "no plain tag resolved, skipping row fetch");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut rows = self.store.fetch_rows(&random_tags).await?;
        self.codec.hydrate_all(&mut rows).await?;
        debug!(rows = rows.len(), tags = random_tags.len(), "rows fetched");
        Ok(rows)
    }
}
