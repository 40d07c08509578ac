//! JSON-over-HTTP store client
//!
//! Endpoints (relative to the configured base URL):
//!   POST /rows              wire row in, stored row out (HTTP 200 required)
//!   GET  /rows?tags=a,b     JSON array of wire rows
//!   POST /tags              tag pair in, response body ignored (HTTP 200 required)
//!   GET  /tags[?tags=a,b]   JSON array of tag pairs
//!
//! Every request is bounded by a fixed timeout. Nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use blindtag_core::config::Endpoints;
use blindtag_core::{BlindtagError, BlindtagResult, Row, TagPair};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::TagStore;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`TagStore`] backed by a blindtag-compatible HTTP server.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    endpoints: Endpoints,
    timeout: Duration,
}

impl HttpStore {
    pub fn new(base_url: &str) -> BlindtagResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> BlindtagResult<Self> {
        let endpoints = Endpoints::new(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlindtagError::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoints,
            timeout,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> BlindtagError {
        if e.is_timeout() {
            BlindtagError::Timeout(self.timeout)
        } else {
            BlindtagError::Transport(format!("request to {url} failed: {e}"))
        }
    }

    /// Send `request`, require HTTP 200, and return the raw body.
    async fn send(&self, url: &str, request: RequestBuilder) -> BlindtagResult<Vec<u8>> {
        let resp = request
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        if status != StatusCode::OK {
            return Err(BlindtagError::Store {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        filter: Option<&[String]>,
    ) -> BlindtagResult<T> {
        // Random tags are hex, so the comma-joined list goes on the URL as is
        let url = match filter {
            Some(tags) => format!("{url}?tags={}", tags.join(",")),
            None => url.to_string(),
        };
        debug!(url = %url, filter = filter.map(<[String]>::len), "GET");

        let request = self.client.get(&url);
        let body = self.send(&url, request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_json(&self, url: &str, payload: Vec<u8>) -> BlindtagResult<Vec<u8>> {
        debug!(url = %url, bytes = payload.len(), "POST");
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        self.send(url, request).await
    }
}

#[async_trait]
impl TagStore for HttpStore {
    async fn fetch_rows(&self, random_tags: &[String]) -> BlindtagResult<Vec<Row>> {
        self.get_json(&self.endpoints.rows, Some(random_tags)).await
    }

    async fn fetch_tag_pairs(&self, filter: Option<&[String]>) -> BlindtagResult<Vec<TagPair>> {
        self.get_json(&self.endpoints.tags, filter).await
    }

    async fn post_row(&self, row: &Row) -> BlindtagResult<Row> {
        let body = self.post_json(&self.endpoints.rows, row.to_bytes()?).await?;
        Row::from_bytes(&body)
    }

    async fn post_tag_pair(&self, pair: &TagPair) -> BlindtagResult<()> {
        self.post_json(&self.endpoints.tags, pair.to_bytes()?).await?;
        debug!(random = %pair.random, "tag pair stored");
        Ok(())
    }
}
