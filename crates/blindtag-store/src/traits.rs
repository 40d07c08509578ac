use async_trait::async_trait;
use blindtag_core::{BlindtagResult, Row, TagPair};

/// The remote store, as seen by the client.
///
/// Implementations move wire forms only: rows arrive encrypted and leave
/// encrypted.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Rows carrying the given random tags (`GET <base>/rows?tags=a,b`).
    async fn fetch_rows(&self, random_tags: &[String]) -> BlindtagResult<Vec<Row>>;

    /// Tag pairs, optionally filtered by random tag (`GET <base>/tags[?tags=a,b]`).
    async fn fetch_tag_pairs(&self, filter: Option<&[String]>) -> BlindtagResult<Vec<TagPair>>;

    /// Store a wire row and return the store's representation of it.
    async fn post_row(&self, row: &Row) -> BlindtagResult<Row>;

    async fn post_tag_pair(&self, pair: &TagPair) -> BlindtagResult<()>;
}
