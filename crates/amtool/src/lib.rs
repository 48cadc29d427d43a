//! `amt`: copy values between automerge documents, files, and pipes.
//!
//! ```text
//! amt mk                                  # prints automerge:<id>
//! echo '{"title":"x"}' | amt cp - automerge:<id>
//! amt cp automerge:<id>/title out.txt --raw
//! amt cp notes.json automerge:<id>/notes --watch
//! amt rm automerge:<id>
//! ```
//!
//! A copy parses its two [`location`]s, reads the source value, and hands it
//! to the [`writer`]. With `--watch` the [`copy`] dispatcher keeps copying as
//! the source changes. Errors the user can fix are [`error::DomainError`]s,
//! reported by the [`guard`] boundary as `error: <message>`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod copy;
pub mod error;
pub mod file_watch;
pub mod guard;
pub mod location;
pub mod path;
pub mod writer;

pub use context::{Context, Streams};
pub use error::{DomainError, Halt};
pub use location::Location;
