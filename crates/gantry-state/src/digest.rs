#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Claimed SHA-256 digest of an artifact's contents.
///
/// Stored and compared as 64 lowercase hex characters; uppercase input
/// is folded on parse so comparison is case-insensitive by
/// construction. The digest is trusted metadata from the desired-state
/// author; it is recomputed and checked by the verifier, not here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageSha256(String);

impl ImageSha256 {
    pub fn new(digest: impl Into<String>) -> Result<Self, StateError> {
        let digest = digest.into();
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StateError::InvalidDigest(digest));
        }
        Ok(Self(digest.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImageSha256 {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageSha256> for String {
    fn from(digest: ImageSha256) -> Self {
        digest.0
    }
}

impl fmt::Display for ImageSha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
