//! Tag pair registry: plain tag ↔ random tag resolution
//!
//! Pairs live at the store, encrypted. Resolving a plain tag means fetching
//! pairs and decrypting them until the plain tag turns up; resolving random
//! tags means a filtered fetch by random tag. New pairs are persisted as soon
//! as they are created so any session holding the key can resolve them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use blindtag_core::{BlindtagError, BlindtagResult, TagPair};
use blindtag_crypto::Cipher;
use blindtag_store::TagStore;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::TagPairCache;

pub struct TagPairRegistry {
    cipher: Arc<dyn Cipher>,
    store: Arc<dyn TagStore>,
    cache: Option<TagPairCache>,
}

impl TagPairRegistry {
    pub fn new(cipher: Arc<dyn Cipher>, store: Arc<dyn TagStore>) -> Self {
        Self {
            cipher,
            store,
            cache: None,
        }
    }

    /// Keep decrypted pairs in a process-local cache between calls.
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(TagPairCache::new());
        self
    }

    pub fn cache(&self) -> Option<&TagPairCache> {
        self.cache.as_ref()
    }

    /// Fetch and decrypt every tag pair at the store.
    pub async fn all_tag_pairs(&self) -> BlindtagResult<Vec<TagPair>> {
        let pairs = self.store.fetch_tag_pairs(None).await?;
        let pairs = self.open_all(pairs)?;
        debug!(pairs = pairs.len(), "fetched all tag pairs");
        Ok(pairs)
    }

    /// Fetch and decrypt the pairs for the given random tags.
    pub async fn tag_pairs_for_random(&self, random_tags: &[String]) -> BlindtagResult<Vec<TagPair>> {
        let pairs = self.store.fetch_tag_pairs(Some(random_tags)).await?;
        self.open_all(pairs)
    }

    /// Map plain tags to every random tag the store indexes them under.
    ///
    /// Input order and duplicates do not matter. When only some of the plain
    /// tags are known, the random tags for those are returned; when none are,
    /// this fails with `NotFound`. An empty input yields an empty result.
    ///
    /// Always reads the store: an alias created by another session must
    /// not be missed. The fetch refreshes the cache.
    pub async fn resolve_plain_to_random(&self, plain_tags: &[String]) -> BlindtagResult<Vec<String>> {
        let wanted: BTreeSet<&str> = plain_tags.iter().map(String::as_str).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let pairs = self.all_tag_pairs().await?;
        let mut by_plain: HashMap<&str, Vec<&str>> = HashMap::new();
        for pair in &pairs {
            if let Some(plain) = pair.plain() {
                if wanted.contains(plain) {
                    by_plain.entry(plain).or_default().push(pair.random.as_str());
                }
            }
        }

        if by_plain.is_empty() {
            return Err(BlindtagError::NotFound(
                wanted.iter().map(|s| s.to_string()).collect(),
            ));
        }
        let unresolved = wanted.len() - by_plain.len();
        if unresolved > 0 {
            debug!(unresolved, resolved = by_plain.len(), "partial plain tag resolution");
        }

        Ok(wanted
            .iter()
            .filter_map(|plain| by_plain.get(plain))
            .flatten()
            .map(|random| random.to_string())
            .collect())
    }

    /// Map random tags back to their plain tags.
    ///
    /// Unknown random tags are simply absent from the result; deciding
    /// whether that is an error is up to the caller.
    pub async fn resolve_random_to_plain(
        &self,
        random_tags: &[String],
    ) -> BlindtagResult<HashMap<String, String>> {
        let wanted: BTreeSet<&String> = random_tags.iter().collect();
        let mut resolved = HashMap::with_capacity(wanted.len());
        let mut misses = Vec::new();

        for random in wanted {
            match self.cache.as_ref().and_then(|c| c.plain_for(random)) {
                Some(plain) => {
                    resolved.insert(random.clone(), plain);
                }
                None => misses.push(random.clone()),
            }
        }
        if misses.is_empty() {
            return Ok(resolved);
        }

        for pair in self.tag_pairs_for_random(&misses).await? {
            if let Some(plain) = pair.plain() {
                resolved.insert(pair.random.clone(), plain.to_string());
            }
        }
        Ok(resolved)
    }

    /// Create a pair for `plain_tag` with a fresh random tag and persist it.
    pub async fn create_and_persist(&self, plain_tag: &str) -> BlindtagResult<TagPair> {
        let pair = TagPair::seal(plain_tag, self.cipher.as_ref())?;
        self.store.post_tag_pair(&pair).await?;
        if let Some(cache) = &self.cache {
            cache.insert(plain_tag, &pair.random);
        }
        info!(random = %pair.random, "created tag pair");
        Ok(pair)
    }

    /// One random tag per plain tag, creating pairs for any plain tag not seen before.
    ///
    /// Repeated calls with the same plain tag return the same random tag.
    /// When aliases exist, the first pair recorded for the plain tag wins.
    pub async fn find_or_create(&self, plain_tags: &[String]) -> BlindtagResult<Vec<String>> {
        let wanted: BTreeSet<&str> = plain_tags.iter().map(String::as_str).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(hit) = self.cached_random_tags(&wanted) {
            return Ok(hit);
        }

        let pairs = self.all_tag_pairs().await?;
        let mut existing: HashMap<&str, &str> = HashMap::new();
        for pair in &pairs {
            if let Some(plain) = pair.plain() {
                existing.entry(plain).or_insert(pair.random.as_str());
            }
        }

        let mut random_tags = Vec::with_capacity(wanted.len());
        for plain in wanted {
            match existing.get(plain) {
                Some(random) => random_tags.push(random.to_string()),
                None => random_tags.push(self.create_and_persist(plain).await?.random),
            }
        }
        Ok(random_tags)
    }

    /// One cached random tag per entry of `wanted`, or `None` if any plain tag misses.
    fn cached_random_tags(&self, wanted: &BTreeSet<&str>) -> Option<Vec<String>> {
        let cache = self.cache.as_ref()?;
        wanted
            .iter()
            .map(|plain| cache.first_random_for(plain))
            .collect()
    }

    /// Decrypt a batch of pairs in parallel; any failure fails the batch.
    fn open_all(&self, mut pairs: Vec<TagPair>) -> BlindtagResult<Vec<TagPair>> {
        let cipher = self.cipher.as_ref();
        pairs
            .par_iter_mut()
            .try_for_each(|pair| pair.open(cipher).map(|_| ()))?;
        if let Some(cache) = &self.cache {
            cache.insert_pairs(&pairs);
        }
        Ok(pairs)
    }
}
