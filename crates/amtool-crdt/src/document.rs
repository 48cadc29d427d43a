//! Conversion between automerge documents and [`Value`] trees.
//!
//! Reads materialize an automerge object into a `Value`. Writes go through
//! [`DocumentMut`], a thin view over one automerge transaction: everything a
//! mutator does inside a single `change` call commits or rolls back together.

use std::collections::BTreeMap;

use automerge::transaction::{Transactable, Transaction};
use automerge::{ObjId, ObjType, Prop, ROOT, ReadDoc, ScalarValue};

use crate::error::RepoError;
use crate::value::Value;

/// Materialize the whole document root.
pub(crate) fn materialize_root<R: ReadDoc>(doc: &R) -> Result<Value, RepoError> {
    materialize(doc, &ROOT)
}

fn materialize<R: ReadDoc>(doc: &R, obj: &ObjId) -> Result<Value, RepoError> {
    match doc.object_type(obj)? {
        ObjType::Map | ObjType::Table => {
            let mut map = BTreeMap::new();
            for key in doc.keys(obj) {
                if let Some((value, id)) = doc.get(obj, key.as_str())? {
                    let value = read_entry(doc, value, &id)?;
                    map.insert(key, value);
                }
            }
            Ok(Value::Map(map))
        }
        ObjType::List => {
            let len = doc.length(obj);
            let mut items = Vec::with_capacity(len);
            for index in 0..len {
                if let Some((value, id)) = doc.get(obj, index)? {
                    items.push(read_entry(doc, value, &id)?);
                }
            }
            Ok(Value::List(items))
        }
        ObjType::Text => Ok(Value::Str(doc.text(obj)?)),
    }
}

fn read_entry<R: ReadDoc>(
    doc: &R,
    value: automerge::Value<'_>,
    id: &ObjId,
) -> Result<Value, RepoError> {
    match value {
        automerge::Value::Object(_) => materialize(doc, id),
        automerge::Value::Scalar(scalar) => Ok(from_scalar(&scalar)),
    }
}

fn from_scalar(scalar: &ScalarValue) -> Value {
    match scalar {
        ScalarValue::Bytes(b) => Value::Bytes(b.clone()),
        ScalarValue::Str(s) => Value::Str(s.to_string()),
        ScalarValue::Int(i) => Value::Int(*i),
        ScalarValue::Uint(u) => Value::Uint(*u),
        ScalarValue::F64(f) => Value::F64(*f),
        ScalarValue::Boolean(b) => Value::Bool(*b),
        ScalarValue::Counter(_) | ScalarValue::Timestamp(_) => {
            scalar.to_i64().map(Value::Int).unwrap_or(Value::Null)
        }
        ScalarValue::Null => Value::Null,
        _ => Value::Null,
    }
}

/// How a value is laid out in automerge: a scalar, or an object to fill.
enum Shape {
    Scalar(ScalarValue),
    Object(ObjType),
}

fn shape(value: &Value) -> Shape {
    match value {
        Value::Null => Shape::Scalar(ScalarValue::Null),
        Value::Bool(b) => Shape::Scalar(ScalarValue::Boolean(*b)),
        Value::Int(i) => Shape::Scalar(ScalarValue::Int(*i)),
        Value::Uint(u) => Shape::Scalar(ScalarValue::Uint(*u)),
        Value::F64(f) => Shape::Scalar(ScalarValue::F64(*f)),
        Value::Bytes(b) => Shape::Scalar(ScalarValue::Bytes(b.clone())),
        Value::Str(_) => Shape::Object(ObjType::Text),
        Value::List(_) => Shape::Object(ObjType::List),
        Value::Map(_) => Shape::Object(ObjType::Map),
    }
}

fn put_value<T: Transactable>(
    tx: &mut T,
    obj: &ObjId,
    prop: Prop,
    value: &Value,
) -> Result<(), RepoError> {
    match shape(value) {
        Shape::Scalar(scalar) => tx.put(obj, prop, scalar)?,
        Shape::Object(kind) => {
            let child = tx.put_object(obj, prop, kind)?;
            fill(tx, &child, value)?;
        }
    }
    Ok(())
}

fn insert_value<T: Transactable>(
    tx: &mut T,
    obj: &ObjId,
    index: usize,
    value: &Value,
) -> Result<(), RepoError> {
    match shape(value) {
        Shape::Scalar(scalar) => tx.insert(obj, index, scalar)?,
        Shape::Object(kind) => {
            let child = tx.insert_object(obj, index, kind)?;
            fill(tx, &child, value)?;
        }
    }
    Ok(())
}

fn fill<T: Transactable>(tx: &mut T, obj: &ObjId, value: &Value) -> Result<(), RepoError> {
    match value {
        Value::Map(map) => {
            for (key, item) in map {
                put_value(tx, obj, Prop::from(key.as_str()), item)?;
            }
        }
        Value::List(items) => {
            for (index, item) in items.iter().enumerate() {
                insert_value(tx, obj, index, item)?;
            }
        }
        Value::Str(s) => tx.splice_text(obj, 0, 0, s)?,
        _ => {}
    }
    Ok(())
}

/// Result of indexing one step into a document.
enum Child {
    /// A map or list that can be indexed further.
    Container(ObjId),
    /// Anything else: a scalar or a text object.
    Leaf(&'static str),
}

/// Mutable view of a document inside one atomic change.
pub struct DocumentMut<'a, 'tx> {
    tx: &'a mut Transaction<'tx>,
}

impl<'a, 'tx> DocumentMut<'a, 'tx> {
    pub(crate) fn new(tx: &'a mut Transaction<'tx>) -> Self {
        Self { tx }
    }

    /// The document root as it stands inside this change.
    pub fn snapshot(&self) -> Result<Value, RepoError> {
        materialize_root(&*self.tx)
    }

    /// Put each entry onto the document root, leaving other root keys alone.
    pub fn merge_into_root(&mut self, entries: &BTreeMap<String, Value>) -> Result<(), RepoError> {
        for (key, value) in entries {
            put_value(&mut *self.tx, &ROOT, Prop::from(key.as_str()), value)?;
        }
        Ok(())
    }

    /// Walk `parents` from the root and assign `leaf` on the container found.
    ///
    /// Every parent key must already exist and hold a map or list. On a list,
    /// `leaf` must be a decimal index no greater than the list length; the
    /// length itself appends.
    pub fn put_at(
        &mut self,
        parents: &[String],
        leaf: &str,
        value: &Value,
    ) -> Result<(), RepoError> {
        let container = self.container(parents, leaf)?;
        let tx = &mut *self.tx;
        match tx.object_type(&container)? {
            ObjType::Map | ObjType::Table => put_value(tx, &container, Prop::from(leaf), value),
            ObjType::List => {
                let len = tx.length(&container);
                match leaf.parse::<usize>() {
                    Ok(index) if index < len => put_value(tx, &container, Prop::Seq(index), value),
                    Ok(index) if index == len => insert_value(tx, &container, index, value),
                    _ => Err(RepoError::BadIndex {
                        index: leaf.to_string(),
                        len,
                    }),
                }
            }
            ObjType::Text => Err(RepoError::NotIndexable {
                key: leaf.to_string(),
                kind: "string",
            }),
        }
    }

    fn container(&self, parents: &[String], leaf: &str) -> Result<ObjId, RepoError> {
        let mut obj = ROOT;
        for (i, key) in parents.iter().enumerate() {
            let next = parents.get(i + 1).map(String::as_str).unwrap_or(leaf);
            match self.child(&obj, key)? {
                Some(Child::Container(id)) => obj = id,
                Some(Child::Leaf(kind)) => {
                    return Err(RepoError::NotIndexable {
                        key: next.to_string(),
                        kind,
                    });
                }
                None => {
                    return Err(RepoError::MissingKey {
                        key: next.to_string(),
                        parent: key.clone(),
                    });
                }
            }
        }
        Ok(obj)
    }

    fn child(&self, obj: &ObjId, key: &str) -> Result<Option<Child>, RepoError> {
        let entry = match self.tx.object_type(obj)? {
            ObjType::Map | ObjType::Table => self.tx.get(obj, key)?,
            ObjType::List => match key.parse::<usize>() {
                Ok(index) if index < self.tx.length(obj) => self.tx.get(obj, index)?,
                _ => None,
            },
            ObjType::Text => {
                return Err(RepoError::NotIndexable {
                    key: key.to_string(),
                    kind: "string",
                });
            }
        };
        Ok(entry.map(|(value, id)| match value {
            automerge::Value::Object(ObjType::Text) => Child::Leaf("string"),
            automerge::Value::Object(_) => Child::Container(id),
            automerge::Value::Scalar(scalar) => Child::Leaf(from_scalar(&scalar).kind()),
        }))
    }
}
