//! Writing a value into a destination location.
//!
//! | destination  | structured                          | raw                          |
//! |--------------|-------------------------------------|------------------------------|
//! | file         | pretty JSON + newline               | string or bytes, verbatim    |
//! | stream       | compact JSON + newline              | string or bytes, verbatim    |
//! | document     | assign at path / merge into root    | same as structured           |
//!
//! JSON output renders bytes as base64 strings. Writes to one destination are
//! serialized through the process-wide [`WriteLocks`] in the [`Context`]: each
//! write holds its destination's lock until the bytes have landed.

use std::collections::BTreeMap;
use std::sync::Arc;

use amtool_crdt::Value;
use anyhow::Context as _;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;

use crate::context::Context;
use crate::error::DomainError;
use crate::location::Location;

/// JSON view of a [`Value`], with bytes as base64.
pub struct Json<'a>(pub &'a Value);

impl Serialize for Json<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::F64(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
            Value::List(items) => serializer.collect_seq(items.iter().map(Json)),
            Value::Map(map) => serializer.collect_map(map.iter().map(|(k, v)| (k, Json(v)))),
        }
    }
}

#[derive(Clone, Copy)]
enum Layout {
    Pretty,
    Compact,
}

/// Bytes to put in a file or on stdout.
fn encode(value: &Value, raw: bool, layout: Layout) -> anyhow::Result<Vec<u8>> {
    if raw {
        return match value {
            Value::Str(s) => Ok(s.clone().into_bytes()),
            Value::Bytes(b) => Ok(b.clone()),
            _ => Err(DomainError::raw_value_not_text().into()),
        };
    }
    let mut bytes = match layout {
        Layout::Pretty => serde_json::to_vec_pretty(&Json(value))?,
        Layout::Compact => serde_json::to_vec(&Json(value))?,
    };
    bytes.push(b'\n');
    Ok(bytes)
}

/// Entries to merge into a document root.
fn root_entries(value: &Value) -> Result<BTreeMap<String, Value>, DomainError> {
    match value {
        Value::Map(map) => Ok(map.clone()),
        Value::List(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item.clone()))
            .collect()),
        _ => Err(DomainError::root_not_object()),
    }
}

/// One async lock per rendered destination, shared by every writer in the
/// process.
#[derive(Default)]
pub struct WriteLocks(DashMap<String, Arc<Mutex<()>>>);

impl WriteLocks {
    pub fn for_destination(&self, destination: &Location) -> Arc<Mutex<()>> {
        self.0.entry(destination.to_string()).or_default().clone()
    }
}

/// Writes values to destinations, one write per destination at a time.
pub struct Writer<'c> {
    ctx: &'c Context,
}

impl<'c> Writer<'c> {
    pub fn new(ctx: &'c Context) -> Self {
        Self { ctx }
    }

    /// Write `value` to `destination`, returning once it has landed.
    pub async fn write(
        &self,
        destination: &Location,
        value: &Value,
        raw: bool,
    ) -> anyhow::Result<()> {
        let lock = self.ctx.write_locks.for_destination(destination);
        let _guard = lock.lock().await;

        match destination {
            Location::File { path } => {
                let bytes = encode(value, raw, Layout::Pretty)?;
                tokio::fs::write(path, bytes)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            Location::Stream => {
                let bytes = encode(value, raw, Layout::Compact)?;
                self.ctx.streams.write_stdout(&bytes).await?;
            }
            Location::Document { url, path } => self.write_document(url, path, value)?,
        }
        tracing::trace!(destination = %destination, raw, "wrote value");
        Ok(())
    }

    fn write_document(&self, url: &str, path: &[String], value: &Value) -> anyhow::Result<()> {
        let handle = self.ctx.repo.find(url)?;
        if handle.snapshot()?.is_none() {
            return Err(DomainError::document_not_found(url).into());
        }

        match path.split_last() {
            None => {
                let entries = root_entries(value)?;
                handle.change(|doc| doc.merge_into_root(&entries))?;
            }
            Some((leaf, parents)) => {
                handle.change(|doc| doc.put_at(parents, leaf, value))?;
            }
        }
        Ok(())
    }
}
