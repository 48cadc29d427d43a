//! Runtime configuration, resolved from the command line and environment.

use std::path::PathBuf;

use amtool_crdt::{RepoConfig, Storage};
use anyhow::Context as _;

/// Database file name inside the storage directory.
const DATABASE_FILE: &str = "documents.db";

#[derive(Clone, Debug)]
pub struct Config {
    pub storage: PathBuf,
    pub sync_url: String,
}

impl Config {
    /// Settle defaults and make sure the database directory exists.
    pub fn resolve(storage: Option<PathBuf>, sync_url: String) -> anyhow::Result<Self> {
        let storage = storage.unwrap_or_else(default_storage);
        if let Some(parent) = storage.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tracing::debug!(storage = %storage.display(), sync_url = %sync_url, "resolved config");
        Ok(Self { storage, sync_url })
    }

    pub fn repo_config(&self) -> RepoConfig {
        RepoConfig {
            storage: Storage::File(self.storage.clone()),
            sync_url: self.sync_url.clone(),
        }
    }
}

/// `<data dir>/amtool/documents.db`, or `./amtool/documents.db` when the
/// platform has no data directory.
pub fn default_storage() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("amtool")
        .join(DATABASE_FILE)
}
