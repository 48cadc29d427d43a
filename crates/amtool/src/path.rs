//! Reading a value at a key path inside a [`Value`] tree.
//!
//! Keys are raw strings. On a list, a decimal key addresses an element;
//! anything else reads as absent. Writing at a path happens inside the
//! document itself, through [`amtool_crdt::DocumentMut::put_at`].

use amtool_crdt::Value;
use thiserror::Error;

/// A path could not be walked. Not a user-facing domain error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("cannot read key {key:?} of a {kind} value")]
    NotIndexable { key: String, kind: &'static str },
}

/// The value at `path`, or `None` if some key along the way is absent.
///
/// Indexing into a scalar is an error.
pub fn get<'a>(root: &'a Value, path: &[String]) -> Result<Option<&'a Value>, PathError> {
    let mut current = root;
    for key in path {
        let next = match current {
            Value::Map(map) => map.get(key),
            Value::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => {
                return Err(PathError::NotIndexable {
                    key: key.clone(),
                    kind: other.kind(),
                });
            }
        };
        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
