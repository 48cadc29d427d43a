//! Change notifications for a single file.
//!
//! The watcher sits on the file's parent directory and filters events down to
//! the file name, so saves that replace the file by rename are still seen.
//! Only creations and modifications count; a removed file is left alone until
//! it comes back.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A running watch on one file.
pub struct FileWatch {
    rx: mpsc::Receiver<()>,
    _watcher: RecommendedWatcher,
}

impl FileWatch {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name: OsString = path
            .file_name()
            .with_context(|| format!("{} does not name a file", path.display()))?
            .to_os_string();

        let (tx, rx) = mpsc::channel(16);
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "file watch error");
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                if event.paths.iter().any(|p| p.file_name() == Some(name.as_os_str())) {
                    // A full channel already holds a pending wake-up.
                    let _ = tx.try_send(());
                }
            },
            notify::Config::default().with_poll_interval(Duration::from_millis(500)),
        )?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {}", dir.display()))?;
        tracing::debug!(file = %path.display(), dir = %dir.display(), "watching file");

        Ok(Self {
            rx,
            _watcher: watcher,
        })
    }

    /// Wait until the file has changed. Signals that arrived in the meantime
    /// are folded into this one.
    pub async fn changed(&mut self) -> Option<()> {
        self.rx.recv().await?;
        while self.rx.try_recv().is_ok() {}
        Some(())
    }
}
