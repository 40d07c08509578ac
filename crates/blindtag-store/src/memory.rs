//! In-process store with the same query semantics as the HTTP server.
//!
//! Rows and pairs pass through their JSON wire form on the way in, so
//! nothing client-side (plaintext bodies, plain tags) survives in here.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use blindtag_core::{BlindtagError, BlindtagResult, Row, TagPair};

use crate::TagStore;

/// Per-operation request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub row_fetches: usize,
    pub tag_pair_fetches: usize,
    pub row_posts: usize,
    pub tag_pair_posts: usize,
}

impl RequestCounts {
    pub fn total(&self) -> usize {
        self.row_fetches + self.tag_pair_fetches + self.row_posts + self.tag_pair_posts
    }
}

#[derive(Default)]
struct Inner {
    rows: Vec<Row>,
    tag_pairs: Vec<TagPair>,
    counts: RequestCounts,
    fail_next_save: Option<(u16, String)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a row directly, bypassing request counting.
    pub fn insert_row(&self, row: &Row) -> BlindtagResult<()> {
        let stored = to_wire_row(row)?;
        self.lock().rows.push(stored);
        Ok(())
    }

    /// Insert a tag pair directly, bypassing request counting.
    pub fn insert_tag_pair(&self, pair: &TagPair) -> BlindtagResult<()> {
        let stored = to_wire_pair(pair)?;
        self.lock().tag_pairs.push(stored);
        Ok(())
    }

    pub fn rows(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }

    pub fn tag_pairs(&self) -> Vec<TagPair> {
        self.lock().tag_pairs.clone()
    }

    /// Mutate stored rows in place (tamper simulation).
    pub fn update_rows(&self, f: impl FnOnce(&mut Vec<Row>)) {
        f(&mut self.lock().rows);
    }

    /// Mutate stored tag pairs in place (tamper simulation).
    pub fn update_tag_pairs(&self, f: impl FnOnce(&mut Vec<TagPair>)) {
        f(&mut self.lock().tag_pairs);
    }

    /// Make the next `post_row` fail with the given HTTP status and body.
    pub fn fail_next_save(&self, status: u16, body: &str) {
        self.lock().fail_next_save = Some((status, body.to_string()));
    }

    pub fn request_counts(&self) -> RequestCounts {
        self.lock().counts
    }
}

fn to_wire_row(row: &Row) -> BlindtagResult<Row> {
    Row::from_bytes(&row.to_bytes()?)
}

fn to_wire_pair(pair: &TagPair) -> BlindtagResult<TagPair> {
    TagPair::from_bytes(&pair.to_bytes()?)
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn fetch_rows(&self, random_tags: &[String]) -> BlindtagResult<Vec<Row>> {
        let mut inner = self.lock();
        inner.counts.row_fetches += 1;
        // A row matches when it carries any requested tag, so aliases of one
        // plain tag all hit
        Ok(inner
            .rows
            .iter()
            .filter(|row| random_tags.iter().any(|t| row.random_tags.contains(t)))
            .cloned()
            .collect())
    }

    async fn fetch_tag_pairs(&self, filter: Option<&[String]>) -> BlindtagResult<Vec<TagPair>> {
        let mut inner = self.lock();
        inner.counts.tag_pair_fetches += 1;
        Ok(inner
            .tag_pairs
            .iter()
            .filter(|pair| filter.map_or(true, |tags| tags.contains(&pair.random)))
            .cloned()
            .collect())
    }

    async fn post_row(&self, row: &Row) -> BlindtagResult<Row> {
        let stored = to_wire_row(row)?;
        let mut inner = self.lock();
        inner.counts.row_posts += 1;
        if let Some((status, body)) = inner.fail_next_save.take() {
            return Err(BlindtagError::Store { status, body });
        }
        inner.rows.push(stored.clone());
        Ok(stored)
    }

    async fn post_tag_pair(&self, pair: &TagPair) -> BlindtagResult<()> {
        let stored = to_wire_pair(pair)?;
        let mut inner = self.lock();
        inner.counts.tag_pair_posts += 1;
        inner.tag_pairs.push(stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindtag_crypto::{BackendKey, Nonce, XChaCha20Cipher};

    fn wire(tags: &[&str]) -> Row {
        Row::wire(
            vec![0xAA; 20],
            Nonce::generate(),
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_fetch_rows_matches_any_tag() {
        let store = MemoryStore::new();
        store.insert_row(&wire(&["r1", "r2"])).unwrap();
        store.insert_row(&wire(&["r1"])).unwrap();
        store.insert_row(&wire(&["r3"])).unwrap();

        let either = store
            .fetch_rows(&["r2".to_string(), "r3".to_string()])
            .await
            .unwrap();
        assert_eq!(either.len(), 2);

        let r1 = store.fetch_rows(&["r1".to_string()]).await.unwrap();
        assert_eq!(r1.len(), 2);

        assert_eq!(store.request_counts().row_fetches, 2);
    }

    #[tokio::test]
    async fn test_fetch_tag_pairs_filter() {
        let cipher = XChaCha20Cipher::new(BackendKey::from_bytes([5u8; 32]));
        let a = TagPair::seal("a", &cipher).unwrap();
        let b = TagPair::seal("b", &cipher).unwrap();

        let store = MemoryStore::new();
        store.post_tag_pair(&a).await.unwrap();
        store.post_tag_pair(&b).await.unwrap();

        assert_eq!(store.fetch_tag_pairs(None).await.unwrap().len(), 2);
        let only_a = store
            .fetch_tag_pairs(Some(&[a.random.clone()]))
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].random, a.random);
        assert_eq!(only_a[0].plain(), None, "stored pairs are wire-only");

        assert_eq!(
            store.request_counts(),
            RequestCounts {
                tag_pair_fetches: 2,
                tag_pair_posts: 2,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_post_row_strips_plaintext() {
        let store = MemoryStore::new();
        let mut row = wire(&["r1"]);
        row.set_plaintext(b"secret".to_vec(), vec!["plain".into()]);

        let stored = store.post_row(&row).await.unwrap();
        assert!(!stored.is_hydrated());
        assert!(stored.plain_tags().is_empty());
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_save_fires_once() {
        let store = MemoryStore::new();
        store.fail_next_save(500, "boom");

        let err = store.post_row(&wire(&[])).await.unwrap_err();
        assert!(matches!(err, BlindtagError::Store { status: 500, .. }));
        assert!(store.rows().is_empty());

        store.post_row(&wire(&[])).await.unwrap();
        assert_eq!(store.rows().len(), 1);
    }
}
