//! Caller-facing record model for the document store adapter.
//!
//! Callers see records carrying `id` and `rev`; the store sees documents
//! carrying `_id` and `_rev`. This crate owns that translation, the query
//! descriptor, and the deep-merge used for partial updates.

mod merge;
mod query;
mod schema;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use self::{merge::*, query::*, schema::*};

/// The caller-facing identifier field.
pub const ID: &str = "id";
/// The caller-facing revision field.
pub const REV: &str = "rev";
/// The store-native identifier field.
pub const STORE_ID: &str = "_id";
/// The store-native revision field.
pub const STORE_REV: &str = "_rev";

/// Returns the store-native name for a caller-facing field.
pub fn store_field_name(field: &str) -> &str {
  match field {
    ID => STORE_ID,
    REV => STORE_REV,
    other => other,
  }
}

/// A document key in the store.
///
/// Store keys are strings. Numeric identifiers are rendered in decimal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
  /// Creates a new [`DocId`].
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// Interprets a JSON value as a document key. Only strings and numbers
  /// qualify.
  pub fn from_value(value: &Value) -> Option<Self> {
    match value {
      Value::String(s) => Some(Self(s.clone())),
      Value::Number(n) => Some(Self(n.to_string())),
      _ => None,
    }
  }

  /// Returns the key as a string slice.
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DocId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for DocId {
  fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<String> for DocId {
  fn from(value: String) -> Self { Self(value) }
}

/// A caller-facing record: field name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
  /// Creates an empty record.
  pub fn new() -> Self { Self(Map::new()) }

  /// Gets a field.
  pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

  /// Sets a field, returning the previous value.
  pub fn insert(
    &mut self,
    field: impl Into<String>,
    value: impl Into<Value>,
  ) -> Option<Value> {
    self.0.insert(field.into(), value.into())
  }

  /// Builder-style [`Record::insert`].
  pub fn with(
    mut self,
    field: impl Into<String>,
    value: impl Into<Value>,
  ) -> Self {
    self.insert(field, value);
    self
  }

  /// The record's identifier, if it has a usable one.
  pub fn id(&self) -> Option<DocId> {
    self.0.get(ID).and_then(DocId::from_value)
  }

  /// The record's revision token, if persisted.
  pub fn rev(&self) -> Option<&str> {
    self.0.get(REV).and_then(Value::as_str)
  }

  /// Converts the record to a store-native document (ingestion).
  ///
  /// `id` becomes `_id` (numbers rendered as strings) and `rev` becomes
  /// `_rev`. Null identifiers and revisions are dropped.
  pub fn into_document(self) -> Map<String, Value> {
    let mut doc = self.0;
    if let Some(id) = doc.remove(ID) {
      if let Some(id) = DocId::from_value(&id) {
        doc.insert(STORE_ID.to_owned(), Value::String(id.0));
      } else if !id.is_null() {
        doc.insert(STORE_ID.to_owned(), id);
      }
    }
    if let Some(rev) = doc.remove(REV) {
      if !rev.is_null() {
        doc.insert(STORE_REV.to_owned(), rev);
      }
    }
    doc
  }

  /// Converts a store-native document into a caller-facing record (reply).
  pub fn from_document(mut doc: Map<String, Value>) -> Self {
    if let Some(id) = doc.remove(STORE_ID) {
      doc.insert(ID.to_owned(), id);
    }
    if let Some(rev) = doc.remove(STORE_REV) {
      doc.insert(REV.to_owned(), rev);
    }
    Self(doc)
  }

  /// Stamps the store-assigned identifier and revision onto the record.
  pub fn with_receipt(mut self, id: &str, rev: &str) -> Self {
    self.0.insert(ID.to_owned(), Value::String(id.to_owned()));
    self.0.insert(REV.to_owned(), Value::String(rev.to_owned()));
    self
  }
}

impl From<Map<String, Value>> for Record {
  fn from(value: Map<String, Value>) -> Self { Self(value) }
}

impl FromIterator<(String, Value)> for Record {
  fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}
