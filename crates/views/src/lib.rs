//! Deterministic names and definitions for on-demand secondary indices.
//!
//! A query on a non-key field is answered by a view in the
//! [`DESIGN_DOCUMENT`]. The view's name is derived from the set of queried
//! fields, so every query on the same fields reuses the same index.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The design document that holds every generated view.
pub const DESIGN_DOCUMENT: &str = "views";

const NAME_PREFIX: &str = "by_";
const FIELD_SEPARATOR: char = ',';

/// Derives the view name for a set of fields.
///
/// Order and duplicates don't matter. Field names are escaped so that no two
/// distinct sets share a name.
pub fn view_name<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
  let fields: BTreeSet<&str> = fields.into_iter().collect();
  let mut name = String::from(NAME_PREFIX);
  for (i, field) in fields.into_iter().enumerate() {
    if i > 0 {
      name.push(FIELD_SEPARATOR);
    }
    name.push_str(&escape_field(field));
  }
  name
}

fn escape_field(field: &str) -> String {
  let mut escaped = String::with_capacity(field.len());
  for c in field.chars() {
    match c {
      '%' => escaped.push_str("%25"),
      FIELD_SEPARATOR => escaped.push_str("%2C"),
      c => escaped.push(c),
    }
  }
  escaped
}

/// A secondary index that maps each document to `(field value, document)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
  name:   String,
  fields: Vec<String>,
}

impl ViewDefinition {
  /// Builds the definition for an index over the given fields.
  pub fn for_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
    let fields: BTreeSet<&str> = fields.into_iter().collect();
    Self {
      name:   view_name(fields.iter().copied()),
      fields: fields.into_iter().map(str::to_owned).collect(),
    }
  }

  /// The view's name.
  pub fn name(&self) -> &str { &self.name }

  /// The document fields the view emits as its key, sorted.
  pub fn fields(&self) -> &[String] { &self.fields }

  /// Computes the key this view emits for a document.
  ///
  /// A single-field view emits the field's value; a multi-field view emits
  /// the array of values. Missing fields emit `null`.
  pub fn key_for(&self, doc: &serde_json::Map<String, Value>) -> Value {
    let mut values = self
      .fields
      .iter()
      .map(|f| doc.get(f).cloned().unwrap_or(Value::Null));
    match self.fields.len() {
      1 => values.next().unwrap_or(Value::Null),
      _ => Value::Array(values.collect()),
    }
  }

  /// The JavaScript map function the store runs to build the view.
  pub fn map_source(&self) -> String {
    let accessors = self
      .fields
      .iter()
      .map(|f| format!("doc[{}]", Value::String(f.clone())))
      .collect::<Vec<_>>();
    let key = match accessors.as_slice() {
      [single] => single.clone(),
      many => format!("[{}]", many.join(", ")),
    };
    format!("function (doc) {{ emit({key}, doc); }}")
  }

  /// The entry stored under `views.<name>` in the design document.
  pub fn design_entry(&self) -> Value { json!({ "map": self.map_source() }) }
}
