//! Error types for repository operations.

use thiserror::Error;

/// Errors that can occur while reading, changing, or watching documents.
#[derive(Error, Debug)]
pub enum RepoError {
    /// The token could not be decoded as a document URL.
    #[error("invalid document url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The document has no stored state.
    #[error("document {0} not found")]
    NotFound(String),

    /// A path step tried to index into a value that has no keys.
    #[error("cannot read key {key:?} of a {kind} value")]
    NotIndexable { key: String, kind: &'static str },

    /// A path step named a key that does not exist.
    #[error("cannot set key {key:?}: parent key {parent:?} is missing")]
    MissingKey { key: String, parent: String },

    /// A list was indexed with something other than an in-range position.
    #[error("invalid list index {index:?} for list of length {len}")]
    BadIndex { index: String, len: usize },

    /// SQLite persistence error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Automerge rejected an operation or a saved document.
    #[error("automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    /// File watcher setup failed.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
