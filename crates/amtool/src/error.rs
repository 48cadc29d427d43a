//! Error tiers for the command boundary.
//!
//! [`DomainError`] is expected misuse: the boundary reports it as a one-line
//! `error:` message. Anything else travels as a plain `anyhow::Error` and is
//! not handled along the way.

use thiserror::Error;

/// A recognized, user-facing failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DomainError(pub String);

impl DomainError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn raw_value_not_text() -> Self {
        Self::new("value must be a string or bytes to copy in raw mode")
    }

    pub fn root_not_object() -> Self {
        Self::new("only an object can be written to a document root")
    }

    pub fn raw_document_to_document() -> Self {
        Self::new("raw copy from automerge to automerge doesn't really make sense")
    }

    pub fn document_not_found(url: &str) -> Self {
        Self::new(format!("document {url} not found"))
    }
}

/// Request to end the process with `code` once the error has been reported.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("exiting with status {code}")]
pub struct Halt {
    pub code: u8,
}

impl Halt {
    pub fn failure() -> Self {
        Self { code: 1 }
    }
}
