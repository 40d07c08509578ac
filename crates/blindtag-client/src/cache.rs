//! Tag pair cache: remembers decrypted plain/random associations between calls.
//!
//! Tag pairs are never mutated or deleted, so a random → plain entry is
//! always correct. The plain → random side can be incomplete: another
//! session may have added an alias (a second random tag for the same plain
//! tag) since it was filled. It is good enough for picking a random tag to
//! save under, but queries that need every alias must go to the store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use blindtag_core::TagPair;

#[derive(Default)]
struct Entries {
    /// plain tag → every random tag known for it (more than one only for aliases)
    by_plain: HashMap<String, Vec<String>>,
    /// random tag → plain tag
    by_random: HashMap<String, String>,
}

/// Thread-safe plain/random tag cache.
#[derive(Default)]
pub struct TagPairCache {
    entries: Mutex<Entries>,
}

impl TagPairCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an association. Re-inserting a known pair is a no-op.
    pub fn insert(&self, plain: &str, random: &str) {
        let mut entries = self.lock();
        if entries.by_random.contains_key(random) {
            return;
        }
        entries
            .by_random
            .insert(random.to_string(), plain.to_string());
        entries
            .by_plain
            .entry(plain.to_string())
            .or_default()
            .push(random.to_string());
    }

    /// Record every opened pair; unopened pairs are skipped.
    pub fn insert_pairs(&self, pairs: &[TagPair]) {
        for pair in pairs {
            if let Some(plain) = pair.plain() {
                self.insert(plain, &pair.random);
            }
        }
    }

    pub fn random_tags_for(&self, plain: &str) -> Option<Vec<String>> {
        self.lock().by_plain.get(plain).cloned()
    }

    /// The first random tag recorded for `plain`.
    pub fn first_random_for(&self, plain: &str) -> Option<String> {
        self.lock().by_plain.get(plain)?.first().cloned()
    }

    pub fn plain_for(&self, random: &str) -> Option<String> {
        self.lock().by_random.get(random).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().by_random.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn insert_and_lookup_both_directions() {
        let cache = TagPairCache::new();
        assert!(cache.is_empty());

        cache.insert("project", "r1");
        assert_eq!(cache.random_tags_for("project"), Some(vec!["r1".to_string()]));
        assert_eq!(cache.plain_for("r1"), Some("project".to_string()));
        assert_eq!(cache.plain_for("r2"), None);
        assert_eq!(cache.random_tags_for("urgent"), None);
    }

    #[test]
    fn reinsert_is_noop() {
        let cache = TagPairCache::new();
        cache.insert("project", "r1");
        cache.insert("project", "r1");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.random_tags_for("project").unwrap().len(), 1);
    }

    #[test]
    fn aliases_accumulate() {
        let cache = TagPairCache::new();
        cache.insert("project", "r1");
        cache.insert("project", "r3");
        assert_eq!(
            cache.random_tags_for("project"),
            Some(vec!["r1".to_string(), "r3".to_string()])
        );
    }

    #[test]
    fn first_random_is_stable_across_aliases() {
        let cache = TagPairCache::new();
        assert_eq!(cache.first_random_for("project"), None);
        cache.insert("project", "r1");
        cache.insert("project", "r3");
        assert_eq!(cache.first_random_for("project"), Some("r1".to_string()));
    }

    #[test]
    fn concurrent_inserts() {
        let cache = Arc::new(TagPairCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        cache.insert(&format!("plain-{t}-{i}"), &format!("random-{t}-{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 800);
    }
}
