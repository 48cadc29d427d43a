//! Change subscriptions for a single document.
//!
//! Two wake-up sources feed a [`DocumentChanges`] stream:
//!
//! - the repo's in-process broadcast, for changes made through this process
//! - a `notify` watcher on the database directory, for changes made by other
//!   processes sharing the same database
//!
//! Either source only triggers a reload. An update is yielded when the
//! document's heads differ from the last ones delivered, so duplicate wake-ups
//! (including the watcher echoing our own writes) are dropped.

use std::path::Path;

use automerge::ChangeHash;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::error::RepoError;
use crate::repo::{DocHandle, DocumentEvent};
use crate::value::Value;

/// One observation of a watched document.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentUpdate {
    /// The document exists; this is its root.
    Changed(Value),
    /// The document does not exist (never created, or deleted).
    Missing,
}

#[derive(PartialEq)]
enum Seen {
    Heads(Vec<ChangeHash>),
    Missing,
}

/// Stream of updates for one document.
pub struct DocumentChanges {
    handle: DocHandle,
    events: broadcast::Receiver<DocumentEvent>,
    external: mpsc::Receiver<()>,
    /// Keeps `external` open when there is no watcher.
    _external_tx: mpsc::Sender<()>,
    _watcher: Option<RecommendedWatcher>,
    last: Option<Seen>,
}

impl DocumentChanges {
    pub(crate) fn new(handle: DocHandle) -> Result<Self, RepoError> {
        let events = handle.repo().events();
        let (external_tx, external) = mpsc::channel(16);
        let watcher = match handle.repo().database_path() {
            Some(path) => Some(watch_database(path, external_tx.clone())?),
            None => None,
        };
        Ok(Self {
            handle,
            events,
            external,
            _external_tx: external_tx,
            _watcher: watcher,
            last: None,
        })
    }

    /// Wait for the next update.
    ///
    /// The first call returns the current state right away; later calls wait
    /// until the document changes.
    pub async fn next(&mut self) -> Result<DocumentUpdate, RepoError> {
        loop {
            if self.last.is_some() {
                self.wait().await;
            }

            let (seen, update) = match self.handle.state()? {
                Some(state) => (Seen::Heads(state.heads), DocumentUpdate::Changed(state.root)),
                None => (Seen::Missing, DocumentUpdate::Missing),
            };
            if self.last.as_ref() == Some(&seen) {
                continue;
            }
            self.last = Some(seen);
            return Ok(update);
        }
    }

    async fn wait(&mut self) {
        let id = *self.handle.id();
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Ok(event) if *event.document_id() == id => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(doc = %id, skipped = n, "document events lagged");
                        break;
                    }
                    // The handle keeps the repo, and with it the sender, alive.
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(()) = self.external.recv() => break,
            }
        }
        while self.external.try_recv().is_ok() {}
    }
}

fn watch_database(path: &Path, tx: mpsc::Sender<()>) -> Result<RecommendedWatcher, RepoError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            let Ok(event) = result else {
                return;
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            // Matches the database file and its -journal / -wal siblings.
            let touches_db = event.paths.iter().any(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(name.as_str()))
            });
            if touches_db {
                let _ = tx.try_send(());
            }
        },
        notify::Config::default(),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(dir = %dir.display(), "watching document database");
    Ok(watcher)
}
