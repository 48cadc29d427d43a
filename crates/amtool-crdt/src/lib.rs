//! Automerge document repository for amtool.
//!
//! This crate is the document engine the `amt` command talks to. It exposes a
//! small set of capabilities and nothing else:
//!
//! - [`Repo::create`], [`Repo::find`], [`Repo::delete`]
//! - [`DocHandle::snapshot`]: the current root as a [`Value`]
//! - [`DocHandle::change`]: one atomic mutation through [`DocumentMut`]
//! - [`DocHandle::subscribe`]: a [`DocumentChanges`] stream
//!
//! # Storage
//!
//! Documents are saved whole into a SQLite database. Processes that share the
//! database see each other's changes: every change reloads the stored
//! document before applying the mutation, and subscribers watch the database
//! file for writes from elsewhere.
//!
//! # Document URLs
//!
//! Ids are 16 random bytes rendered as `automerge:<base58check>`, the same
//! shape automerge-repo uses, so URLs can be pasted between tools.

mod changes;
mod document;
mod error;
pub mod ids;
mod repo;
mod store;
mod value;

pub use changes::{DocumentChanges, DocumentUpdate};
pub use document::DocumentMut;
pub use error::RepoError;
pub use ids::{DocumentId, URL_PREFIX};
pub use repo::{
    DEFAULT_SYNC_URL, DocHandle, DocumentEvent, DocumentState, Repo, RepoConfig, Storage,
};
pub use value::Value;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
