//! Rows and tag pairs, in both their wire and hydrated forms
//!
//! Wire JSON (what the store sees):
//! ```text
//! Row:     {"data": "<base64 ciphertext>", "nonce": "<base64>", "tags": ["<random>", ...]}
//! TagPair: {"random": "<random>", "plain_encrypted": "<base64 ciphertext>", "nonce": "<base64>"}
//! ```
//!
//! The plaintext fields (`body`, `plain_tags`, `plain`) are client-only and
//! never serialized.

use std::collections::BTreeSet;

use blindtag_crypto::{random_tag, Cipher, Nonce};
use serde::{Deserialize, Serialize};

use crate::{BlindtagError, BlindtagResult};

/// A record stored at the remote store.
///
/// A row is created hydrated (plaintext body + plain tags), turned into its
/// wire form before save, and hydrated again after every fetch.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Row {
    /// Encrypted body
    #[serde(rename = "data", with = "base64_bytes", default)]
    pub encrypted: Vec<u8>,
    /// Nonce the body was encrypted under (absent until the row is prepared)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,
    /// Server-visible random tags
    #[serde(rename = "tags", default)]
    pub random_tags: Vec<String>,

    #[serde(skip)]
    body: Option<Vec<u8>>,
    #[serde(skip)]
    plain_tags: Vec<String>,
}

impl Row {
    /// A new hydrated row, ready to be saved.
    pub fn new<I, S>(body: impl Into<Vec<u8>>, plain_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            body: Some(body.into()),
            plain_tags: plain_tags.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// A wire row carrying only encrypted fields.
    pub fn wire(encrypted: Vec<u8>, nonce: Nonce, random_tags: Vec<String>) -> Self {
        Self {
            encrypted,
            nonce: Some(nonce),
            random_tags,
            ..Default::default()
        }
    }

    /// Populate the plaintext side from decrypted data.
    pub fn set_plaintext(&mut self, body: Vec<u8>, plain_tags: Vec<String>) {
        self.body = Some(body);
        self.plain_tags = plain_tags;
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn plain_tags(&self) -> &[String] {
        &self.plain_tags
    }

    /// Plain tags as a set; tag order carries no meaning.
    pub fn plain_tag_set(&self) -> BTreeSet<&str> {
        self.plain_tags.iter().map(String::as_str).collect()
    }

    pub fn random_tag_set(&self) -> BTreeSet<&str> {
        self.random_tags.iter().map(String::as_str).collect()
    }

    pub fn is_hydrated(&self) -> bool {
        self.body.is_some()
    }

    pub fn from_bytes(data: &[u8]) -> BlindtagResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_bytes(&self) -> BlindtagResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("encrypted_len", &self.encrypted.len())
            .field("nonce", &self.nonce)
            .field("random_tags", &self.random_tags)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("plain_tags", &self.plain_tags.len())
            .finish()
    }
}

/// The encrypted association between one plain tag and one random tag.
#[derive(Clone, Serialize, Deserialize)]
pub struct TagPair {
    /// Server-visible lookup key
    pub random: String,
    /// The plain tag, encrypted under the backend key
    #[serde(with = "base64_bytes")]
    pub plain_encrypted: Vec<u8>,
    pub nonce: Nonce,

    #[serde(skip)]
    plain: Option<String>,
}

impl TagPair {
    /// Create a new pair for `plain` with a fresh random tag and nonce.
    ///
    /// The random tag is authenticated as associated data, so a pair whose
    /// `random` field was swapped or edited fails to open.
    pub fn seal(plain: &str, cipher: &dyn Cipher) -> BlindtagResult<Self> {
        let random = random_tag();
        let nonce = Nonce::generate();
        let plain_encrypted = cipher.encrypt_with_aad(plain.as_bytes(), random.as_bytes(), &nonce)?;
        Ok(Self {
            random,
            plain_encrypted,
            nonce,
            plain: Some(plain.to_string()),
        })
    }

    /// Decrypt the plain tag in place.
    pub fn open(&mut self, cipher: &dyn Cipher) -> BlindtagResult<&str> {
        let decrypted = cipher
            .decrypt_with_aad(&self.plain_encrypted, self.random.as_bytes(), &self.nonce)
            .map_err(|e| BlindtagError::Decryption(format!("tag pair {}: {e}", self.random)))?;
        let plain = String::from_utf8(decrypted).map_err(|e| {
            BlindtagError::Serialization(format!("tag pair {}: plain tag is not UTF-8: {e}", self.random))
        })?;
        Ok(self.plain.insert(plain).as_str())
    }

    /// The decrypted plain tag, if [`open`](Self::open) has run.
    pub fn plain(&self) -> Option<&str> {
        self.plain.as_deref()
    }

    pub fn from_bytes(data: &[u8]) -> BlindtagResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_bytes(&self) -> BlindtagResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl std::fmt::Debug for TagPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagPair")
            .field("random", &self.random)
            .field("plain_encrypted_len", &self.plain_encrypted.len())
            .field("opened", &self.plain.is_some())
            .finish()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("base64 decode: {e}")))
    }
}
