//! Random tags: the server-visible half of a tag pair
//!
//! A random tag is drawn from the CSPRNG and is independent of the plain tag
//! it stands for. The store can filter by it and see which rows share it,
//! but learns nothing about what it means.

use rand::RngCore;

use crate::RANDOM_TAG_BYTES;

/// Generate a fresh random tag (lowercase hex, safe inside a comma-separated query string).
pub fn random_tag() -> String {
    let mut bytes = [0u8; RANDOM_TAG_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_tag_format() {
        let tag = random_tag();
        assert_eq!(tag.len(), RANDOM_TAG_BYTES * 2);
        assert!(tag
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_random_tags_unique() {
        const N: usize = 10_000;
        let tags: HashSet<String> = (0..N).map(|_| random_tag()).collect();
        assert_eq!(tags.len(), N, "random tags must not collide");
    }
}
