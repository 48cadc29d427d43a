//! Location tokens: where a copy reads from or writes to.
//!
//! A token is one of:
//!
//! - `-`: standard input as a source, standard output as a destination
//! - `automerge:<id>[/<key>...]`: a path into a document
//! - anything else: a file path
//!
//! Parsing never fails. A mistyped document URL that loses its prefix is
//! taken as a file name.

use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use amtool_crdt::URL_PREFIX;

/// Token naming the standard streams.
pub const STREAM_TOKEN: &str = "-";

/// An addressable endpoint for a copy. Carries no live handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// A document URL and a key path into its root.
    Document { url: String, path: Vec<String> },
    /// A filesystem path.
    File { path: PathBuf },
    /// Stdin or stdout, depending on argument position.
    Stream,
}

impl Location {
    pub fn parse(token: &str) -> Self {
        if token == STREAM_TOKEN {
            Location::Stream
        } else if token.starts_with(URL_PREFIX) {
            let mut segments = token.split('/').map(str::to_string);
            let url = segments.next().unwrap_or_default();
            Location::Document {
                url,
                path: segments.collect(),
            }
        } else {
            Location::File {
                path: PathBuf::from(token),
            }
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Location::Stream)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Document { url, path } => {
                f.write_str(url)?;
                for key in path {
                    write!(f, "/{key}")?;
                }
                Ok(())
            }
            Location::File { path } => write!(f, "{}", path.display()),
            Location::Stream => f.write_str(STREAM_TOKEN),
        }
    }
}

impl FromStr for Location {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
