//! Document identifiers.
//!
//! A `DocumentId` wraps 16 random bytes (UUIDv4). On the command line and in
//! logs it renders as an automerge-repo URL: `automerge:` followed by the
//! base58check encoding of the bytes. The bare base58 form is used as the
//! storage key.

use std::fmt;
use std::str::FromStr;

use crate::error::RepoError;

/// Scheme prefix shared by every document URL.
pub const URL_PREFIX: &str = "automerge:";

/// A document identifier (UUIDv4 bytes).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct DocumentId([u8; 16]);

impl DocumentId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Parse a document URL, with or without the `automerge:` prefix.
    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let encoded = s.strip_prefix(URL_PREFIX).unwrap_or(s);
        let bytes = bs58::decode(encoded)
            .with_check(None)
            .into_vec()
            .map_err(|e| RepoError::InvalidUrl {
                url: s.to_string(),
                reason: e.to_string(),
            })?;
        let arr: [u8; 16] = bytes.try_into().map_err(|b: Vec<u8>| RepoError::InvalidUrl {
            url: s.to_string(),
            reason: format!("expected 16 id bytes, got {}", b.len()),
        })?;
        Ok(Self(arr))
    }

    /// The bare base58check encoding, used as the storage key.
    pub fn encoded(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    /// The full `automerge:` URL.
    pub fn to_url(&self) -> String {
        format!("{URL_PREFIX}{}", self.encoded())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.encoded())
    }
}

impl FromStr for DocumentId {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
