//! FrameId: the first 12 hex characters of a frame's SHA-256 digest.
//!
//! Ids are lowercase hex so they can be dropped into URLs and filenames
//! without escaping. Every deployment uses this one encoding; ids are
//! persisted as filenames and handed out in links, so changing it would
//! orphan every stored frame.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A frame identifier - 12 lowercase hex chars (48 bits) of SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

/// Errors from parsing an externally supplied id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid frame id length: expected 12 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in frame id")]
    InvalidHex,
}

impl FrameId {
    /// Number of hex characters kept from the digest.
    pub const LEN: usize = 12;

    /// Fingerprint frame content.
    pub fn from_content(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Fingerprint raw bytes. `from_content` is this over the UTF-8 encoding.
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        // 12 hex chars = first 6 bytes of the digest
        Self(hex::encode(&digest[..Self::LEN / 2]))
    }

    /// Create from an existing id string (validates format).
    pub fn from_str_checked(s: &str) -> Result<Self, IdError> {
        if s.len() != Self::LEN {
            return Err(IdError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compute the id of a piece of frame content.
pub fn fingerprint(content: &str) -> FrameId {
    FrameId::from_content(content)
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FrameId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl AsRef<str> for FrameId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
