//! The document repository: create, find, change, and delete documents.
//!
//! # Concurrency Model
//!
//! - One SQLite connection behind a `parking_lot::Mutex`
//! - Every change reloads the stored document, applies one automerge
//!   transaction, and saves, all under the store's write lock
//! - In-process changes are broadcast so subscribers wake without waiting
//!   for the filesystem watcher

use std::path::{Path, PathBuf};
use std::sync::Arc;

use automerge::{ActorId, Automerge, ChangeHash};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::changes::DocumentChanges;
use crate::document::{DocumentMut, materialize_root};
use crate::error::RepoError;
use crate::ids::DocumentId;
use crate::store::DocStore;
use crate::value::Value;

/// Default sync server endpoint.
pub const DEFAULT_SYNC_URL: &str = "wss://sync.automerge.org";

/// Where the repository keeps its documents.
#[derive(Clone, Debug)]
pub enum Storage {
    /// SQLite database at this path.
    File(PathBuf),
    /// Ephemeral in-memory database.
    Memory,
}

/// Repository settings, resolved once at startup.
#[derive(Clone, Debug)]
pub struct RepoConfig {
    pub storage: Storage,
    /// Sync server endpoint, for the network transport.
    pub sync_url: String,
}

impl RepoConfig {
    pub fn in_memory() -> Self {
        Self {
            storage: Storage::Memory,
            sync_url: DEFAULT_SYNC_URL.to_string(),
        }
    }
}

/// Events broadcast when documents change in this process.
#[derive(Clone, Debug)]
pub enum DocumentEvent {
    Created(DocumentId),
    Changed(DocumentId),
    Deleted(DocumentId),
}

impl DocumentEvent {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            DocumentEvent::Created(id)
            | DocumentEvent::Changed(id)
            | DocumentEvent::Deleted(id) => id,
        }
    }
}

/// A loaded document state: its heads and materialized root.
#[derive(Clone, Debug)]
pub struct DocumentState {
    pub heads: Vec<ChangeHash>,
    pub root: Value,
}

pub(crate) struct RepoInner {
    store: Mutex<DocStore>,
    actor: ActorId,
    events: broadcast::Sender<DocumentEvent>,
    config: RepoConfig,
}

/// Shared handle to the document repository.
#[derive(Clone)]
pub struct Repo {
    inner: Arc<RepoInner>,
}

impl Repo {
    /// Open the repository described by `config`.
    pub fn open(config: RepoConfig) -> Result<Self, RepoError> {
        let store = match &config.storage {
            Storage::File(path) => DocStore::open(path)?,
            Storage::Memory => DocStore::in_memory()?,
        };
        let (events, _) = broadcast::channel(1024);
        tracing::debug!(
            storage = ?config.storage,
            sync_url = %config.sync_url,
            "opened document repo"
        );
        Ok(Self {
            inner: Arc::new(RepoInner {
                store: Mutex::new(store),
                actor: ActorId::random(),
                events,
                config,
            }),
        })
    }

    /// Open an ephemeral repository (for testing).
    pub fn in_memory() -> Result<Self, RepoError> {
        Self::open(RepoConfig::in_memory())
    }

    /// Create a new, empty document.
    pub fn create(&self) -> Result<DocHandle, RepoError> {
        let id = DocumentId::generate();
        let mut doc = Automerge::new();
        doc.set_actor(self.inner.actor.clone());
        self.inner.store.lock().insert(&id, &doc.save())?;
        tracing::debug!(doc = %id, "created document");
        let _ = self.inner.events.send(DocumentEvent::Created(id));
        Ok(self.handle(id))
    }

    /// Get a handle for a document URL. Does not check that it exists.
    pub fn find(&self, url: &str) -> Result<DocHandle, RepoError> {
        let id = DocumentId::parse(url)?;
        Ok(self.handle(id))
    }

    /// Delete a document. Deleting a missing document is not an error.
    pub fn delete(&self, url: &str) -> Result<(), RepoError> {
        let id = DocumentId::parse(url)?;
        let removed = self.inner.store.lock().delete(&id)?;
        tracing::debug!(doc = %id, removed, "deleted document");
        let _ = self.inner.events.send(DocumentEvent::Deleted(id));
        Ok(())
    }

    /// Subscribe to in-process document events.
    pub fn events(&self) -> broadcast::Receiver<DocumentEvent> {
        self.inner.events.subscribe()
    }

    /// Path of the backing database, if it lives on disk.
    pub fn database_path(&self) -> Option<&Path> {
        match &self.inner.config.storage {
            Storage::File(path) => Some(path),
            Storage::Memory => None,
        }
    }

    fn handle(&self, id: DocumentId) -> DocHandle {
        DocHandle {
            id,
            repo: self.clone(),
        }
    }

    fn load(&self, id: &DocumentId) -> Result<Option<DocumentState>, RepoError> {
        let Some(bytes) = self.inner.store.lock().load(id)? else {
            return Ok(None);
        };
        let doc = Automerge::load(&bytes)?;
        Ok(Some(DocumentState {
            heads: doc.get_heads(),
            root: materialize_root(&doc)?,
        }))
    }
}

/// A capability for one document: read, change, subscribe.
#[derive(Clone)]
pub struct DocHandle {
    id: DocumentId,
    repo: Repo,
}

impl DocHandle {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn url(&self) -> String {
        self.id.to_url()
    }

    /// The current root value, or `None` if the document does not exist.
    pub fn snapshot(&self) -> Result<Option<Value>, RepoError> {
        Ok(self.state()?.map(|state| state.root))
    }

    /// The current heads and root, or `None` if the document does not exist.
    pub fn state(&self) -> Result<Option<DocumentState>, RepoError> {
        self.repo.load(&self.id)
    }

    /// Apply `mutator` as one atomic change.
    ///
    /// Fails with [`RepoError::NotFound`] if the document does not exist. If
    /// the mutator fails, nothing is recorded and its error is returned.
    pub fn change<F, O, E>(&self, mutator: F) -> Result<O, E>
    where
        F: FnOnce(&mut DocumentMut<'_, '_>) -> Result<O, E>,
        E: From<RepoError>,
    {
        let actor = self.repo.inner.actor.clone();
        let output = self.repo.inner.store.lock().update(&self.id, |bytes| {
            let mut doc = Automerge::load(&bytes).map_err(RepoError::from)?;
            doc.set_actor(actor);
            let output = doc
                .transact(|tx| mutator(&mut DocumentMut::new(tx)))
                .map(|success| success.result)
                .map_err(|failure| failure.error)?;
            Ok::<_, E>((doc.save(), output))
        })?;

        match output {
            Some(output) => {
                tracing::trace!(doc = %self.id, "applied change");
                let _ = self.repo.inner.events.send(DocumentEvent::Changed(self.id));
                Ok(output)
            }
            None => Err(RepoError::NotFound(self.url()).into()),
        }
    }

    /// Watch this document for changes.
    pub fn subscribe(&self) -> Result<DocumentChanges, RepoError> {
        DocumentChanges::new(self.clone())
    }

    pub(crate) fn repo(&self) -> &Repo {
        &self.repo
    }
}
