//! Row codec: hydrated row ↔ wire row
//!
//! Before save the plain tags become random tags (creating pairs as needed)
//! and the body is encrypted under a fresh nonce. After fetch the body is
//! decrypted and every random tag is mapped back. Either step succeeds as a
//! whole or leaves its input untouched.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use blindtag_core::{BlindtagError, BlindtagResult, Row};
use blindtag_crypto::{Cipher, Nonce};
use rayon::prelude::*;
use tracing::debug;

use crate::TagPairRegistry;

pub struct RowCodec {
    cipher: Arc<dyn Cipher>,
    registry: Arc<TagPairRegistry>,
}

impl RowCodec {
    pub fn new(cipher: Arc<dyn Cipher>, registry: Arc<TagPairRegistry>) -> Self {
        Self { cipher, registry }
    }

    /// Produce the wire form of a hydrated row.
    pub async fn prepare_for_save(&self, row: &Row) -> BlindtagResult<Row> {
        let body = row.body().ok_or_else(|| {
            BlindtagError::InvalidArgument("row has no plaintext body to encrypt".into())
        })?;

        let random_tags = self.registry.find_or_create(row.plain_tags()).await?;
        let nonce = Nonce::generate();
        let encrypted = self.cipher.encrypt(body, &nonce)?;

        debug!(
            tags = random_tags.len(),
            encrypted_bytes = encrypted.len(),
            "row prepared for save"
        );
        Ok(Row::wire(encrypted, nonce, random_tags))
    }

    /// Decrypt a fetched row and resolve its random tags, in place.
    pub async fn hydrate(&self, row: &mut Row) -> BlindtagResult<()> {
        self.hydrate_all(std::slice::from_mut(row)).await
    }

    /// Hydrate a batch of fetched rows.
    ///
    /// Bodies are decrypted in parallel; tags are resolved with a single
    /// registry lookup covering every row. The first failure aborts the whole
    /// batch and no row is modified.
    pub async fn hydrate_all(&self, rows: &mut [Row]) -> BlindtagResult<()> {
        let cipher = self.cipher.as_ref();
        let bodies = rows
            .par_iter()
            .map(|row| decrypt_body(cipher, row))
            .collect::<BlindtagResult<Vec<Vec<u8>>>>()?;

        let all_random: BTreeSet<&String> = rows.iter().flat_map(|r| &r.random_tags).collect();
        let all_random: Vec<String> = all_random.into_iter().cloned().collect();
        let resolved = self.registry.resolve_random_to_plain(&all_random).await?;

        let plain_tags = rows
            .iter()
            .map(|row| {
                row.random_tags
                    .iter()
                    .map(|random| {
                        resolved
                            .get(random)
                            .cloned()
                            .ok_or_else(|| BlindtagError::TagResolution(random.clone()))
                    })
                    .collect::<BlindtagResult<Vec<String>>>()
                    .map(dedup_in_order)
            })
            .collect::<BlindtagResult<Vec<Vec<String>>>>()?;

        for ((row, body), tags) in rows.iter_mut().zip(bodies).zip(plain_tags) {
            row.set_plaintext(body, tags);
        }
        debug!(rows = rows.len(), tags = all_random.len(), "rows hydrated");
        Ok(())
    }
}

/// Aliases of one plain tag on the same row collapse to a single entry.
fn dedup_in_order(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

fn decrypt_body(cipher: &dyn Cipher, row: &Row) -> BlindtagResult<Vec<u8>> {
    let nonce = row
        .nonce
        .ok_or_else(|| BlindtagError::Serialization("row has no nonce".into()))?;
    cipher
        .decrypt(&row.encrypted, &nonce)
        .map_err(|e| BlindtagError::Decryption(format!("row body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindtag_crypto::{BackendKey, XChaCha20Cipher};
    use blindtag_store::MemoryStore;
    use proptest::prelude::*;

    fn test_cipher(byte: u8) -> Arc<dyn Cipher> {
        Arc::new(XChaCha20Cipher::new(BackendKey::from_bytes([byte; 32])))
    }

    fn codec_with(store: &Arc<MemoryStore>, key: u8) -> RowCodec {
        let cipher = test_cipher(key);
        let registry = Arc::new(TagPairRegistry::new(cipher.clone(), store.clone()));
        RowCodec::new(cipher, registry)
    }

    /// Simulate a store echoing back exactly what it was given.
    fn echo(row: &Row) -> Row {
        Row::from_bytes(&row.to_bytes().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_prepare_for_save_produces_wire_row() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let row = Row::new(b"{\"note\":\"hi\"}".to_vec(), ["project", "urgent"]);

        let wire = codec.prepare_for_save(&row).await.unwrap();

        assert!(!wire.is_hydrated());
        assert!(wire.nonce.is_some());
        assert_eq!(wire.random_tags.len(), 2);
        assert_ne!(wire.encrypted, b"{\"note\":\"hi\"}".to_vec());
        assert_eq!(store.tag_pairs().len(), 2, "pairs persisted before save");
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let row = Row::new(b"body bytes".to_vec(), ["b", "a"]);

        let mut fetched = echo(&codec.prepare_for_save(&row).await.unwrap());
        codec.hydrate(&mut fetched).await.unwrap();

        assert_eq!(fetched.body(), Some(&b"body bytes"[..]));
        assert_eq!(fetched.plain_tag_set(), row.plain_tag_set());
    }

    #[tokio::test]
    async fn test_roundtrip_zero_tags() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let row = Row::new(b"untagged".to_vec(), Vec::<String>::new());

        let wire = codec.prepare_for_save(&row).await.unwrap();
        assert!(wire.random_tags.is_empty());

        let mut fetched = echo(&wire);
        codec.hydrate(&mut fetched).await.unwrap();
        assert_eq!(fetched.body(), Some(&b"untagged"[..]));
        assert!(fetched.plain_tags().is_empty());
        assert_eq!(store.request_counts().total(), 0, "no tags, no registry traffic");
    }

    #[tokio::test]
    async fn test_prepare_for_save_requires_body() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let wire_only = Row::wire(vec![1], Nonce::generate(), vec![]);

        let err = codec.prepare_for_save(&wire_only).await.unwrap_err();
        assert!(matches!(err, BlindtagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_tampered_body_fails_decryption() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let row = Row::new(b"do not touch".to_vec(), ["x"]);

        let mut fetched = echo(&codec.prepare_for_save(&row).await.unwrap());
        fetched.encrypted[0] ^= 0xFF;

        let err = codec.hydrate(&mut fetched).await.unwrap_err();
        assert!(matches!(err, BlindtagError::Decryption(_)));
        assert!(!fetched.is_hydrated(), "no garbage plaintext on failure");
    }

    #[tokio::test]
    async fn test_missing_nonce() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let mut row = Row::default();

        let err = codec.hydrate(&mut row).await.unwrap_err();
        assert!(matches!(err, BlindtagError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_dangling_random_tag_is_error() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let row = Row::new(b"body".to_vec(), ["known"]);

        let mut fetched = echo(&codec.prepare_for_save(&row).await.unwrap());
        fetched.random_tags.push("deadbeef".into());

        let err = codec.hydrate(&mut fetched).await.unwrap_err();
        assert!(matches!(err, BlindtagError::TagResolution(ref t) if t == "deadbeef"));
        assert!(!fetched.is_hydrated());
    }

    #[tokio::test]
    async fn test_hydrate_all_is_all_or_nothing() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);

        let mut rows = Vec::new();
        for i in 0..8 {
            let row = Row::new(format!("row {i}").into_bytes(), ["shared"]);
            rows.push(echo(&codec.prepare_for_save(&row).await.unwrap()));
        }
        rows[5].encrypted[3] ^= 0x10;

        let err = codec.hydrate_all(&mut rows).await.unwrap_err();
        assert!(matches!(err, BlindtagError::Decryption(_)));
        assert!(rows.iter().all(|r| !r.is_hydrated()));
    }

    #[tokio::test]
    async fn test_hydrate_all_single_tag_lookup() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);

        let mut rows = Vec::new();
        for tags in [["a", "b"], ["b", "c"], ["c", "a"]] {
            let row = Row::new(b"x".to_vec(), tags);
            rows.push(echo(&codec.prepare_for_save(&row).await.unwrap()));
        }
        let before = store.request_counts().tag_pair_fetches;

        codec.hydrate_all(&mut rows).await.unwrap();
        assert_eq!(store.request_counts().tag_pair_fetches, before + 1);
        assert_eq!(rows[1].plain_tag_set(), ["b", "c"].into_iter().collect());
    }

    #[tokio::test]
    async fn test_aliases_on_one_row_hydrate_to_one_plain_tag() {
        let store = Arc::new(MemoryStore::new());
        let codec = codec_with(&store, 42);
        let first = codec.registry.create_and_persist("race").await.unwrap();
        let alias = codec.registry.create_and_persist("race").await.unwrap();

        let nonce = Nonce::generate();
        let mut row = Row::wire(
            codec.cipher.encrypt(b"x", &nonce).unwrap(),
            nonce,
            vec![first.random, alias.random],
        );
        codec.hydrate(&mut row).await.unwrap();
        assert_eq!(row.plain_tags(), ["race"]);
    }

    #[tokio::test]
    async fn test_wrong_key_cannot_hydrate() {
        let store = Arc::new(MemoryStore::new());
        let writer = codec_with(&store, 1);
        let reader = codec_with(&store, 2);

        let row = Row::new(b"for key 1 only".to_vec(), ["t"]);
        let mut fetched = echo(&writer.prepare_for_save(&row).await.unwrap());

        let err = reader.hydrate(&mut fetched).await.unwrap_err();
        assert!(matches!(err, BlindtagError::Decryption(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip_any_body_and_tags(
            body in proptest::collection::vec(any::<u8>(), 0..512),
            tags in proptest::collection::btree_set("[a-z0-9-]{1,12}", 0..6),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = Arc::new(MemoryStore::new());
            let codec = codec_with(&store, 9);

            // Reverse the input order: resolution must not depend on it
            let row = Row::new(body.clone(), tags.iter().rev().cloned());
            let hydrated = rt.block_on(async {
                let mut fetched = echo(&codec.prepare_for_save(&row).await.unwrap());
                codec.hydrate(&mut fetched).await.unwrap();
                fetched
            });

            prop_assert_eq!(hydrated.body(), Some(body.as_slice()));
            let expected: BTreeSet<&str> = tags.iter().map(String::as_str).collect();
            prop_assert_eq!(hydrated.plain_tag_set(), expected);
        }
    }
}
