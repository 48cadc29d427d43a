//! Command-line interface.

use std::path::PathBuf;

use amtool_crdt::DEFAULT_SYNC_URL;
use clap::{Parser, Subcommand};

use crate::location::Location;

/// Copy values between automerge documents, files, and pipes.
#[derive(Parser, Debug)]
#[command(name = "amt", version)]
#[command(about = "Copy values between automerge documents, files, and pipes")]
pub struct Cli {
    /// Sync server endpoint
    #[arg(long, global = true, env = "AM_REPO", default_value = DEFAULT_SYNC_URL)]
    pub sync_url: String,

    /// Document database [default: <data dir>/amtool/documents.db]
    #[arg(long, global = true, env = "AMT_STORAGE")]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy a value from one location to another.
    ///
    /// A location is `-` for stdin/stdout, `automerge:<id>[/<key>...]` for a
    /// value inside a document, or a file path.
    Cp {
        /// Where to read from
        src: Location,

        /// Where to write to
        dst: Location,

        /// Keep copying whenever the source changes
        #[arg(short, long)]
        watch: bool,

        /// Copy strings verbatim instead of as JSON
        #[arg(short, long)]
        raw: bool,
    },

    /// Create an empty document and print its URL
    Mk,

    /// Delete a document
    Rm {
        /// Document URL
        doc: String,
    },
}

impl Command {
    /// Whether this command keeps running until interrupted.
    pub fn is_watch(&self) -> bool {
        matches!(self, Command::Cp { watch: true, .. })
    }
}
