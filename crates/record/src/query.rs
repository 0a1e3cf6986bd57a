use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DocId, ID};

/// A query shape the adapter refuses to approximate.
#[derive(Debug, Clone, PartialEq, thiserror::Error, miette::Diagnostic)]
pub enum UnsupportedQuery {
  /// The predicate names more than one field.
  #[error("compound predicates are not implemented: {fields:?}")]
  #[diagnostic(help("query on a single field, or on `id` alone"))]
  CompoundPredicate {
    /// The fields named by the predicate.
    fields: Vec<String>,
  },
  /// Updates must target exactly one record by `id`.
  #[error("only updating one record by id is supported")]
  UpdateRequiresId,
  /// The `id` predicate value can't be used as a document key.
  #[error("`id` predicate must be a string, a number, or a list of them")]
  InvalidId,
}

/// Field-to-value equality predicate. A value may be a list, meaning "any of".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(BTreeMap<String, Value>);

impl Predicate {
  /// Creates an empty predicate, matching everything.
  pub fn new() -> Self { Self(BTreeMap::new()) }

  /// Adds a field condition.
  pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
    self.0.insert(field.into(), value.into());
  }

  /// The predicate's field names, sorted.
  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  /// The number of fields in the predicate.
  pub fn len(&self) -> usize { self.0.len() }

  /// Whether the predicate is empty.
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Gets the condition on a field.
  pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }
}

/// A record query: predicate plus pagination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
  /// Equality conditions. Absent or null means "everything".
  #[serde(rename = "where", default, deserialize_with = "nullable_predicate")]
  pub predicate: Predicate,
  /// Maximum number of records to return.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub limit:     Option<u32>,
  /// Number of records to skip.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skip:      Option<u32>,
}

fn nullable_predicate<'de, D>(deserializer: D) -> Result<Predicate, D::Error>
where
  D: serde::Deserializer<'de>,
{
  Ok(Option::<Predicate>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a [`Query`] maps onto store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryShape<'a> {
  /// No predicate: list everything.
  All,
  /// Predicate on `id` alone: direct key lookups.
  ById(Vec<DocId>),
  /// Predicate on one other field: a secondary-index lookup.
  ByField {
    /// The queried field.
    field: &'a str,
    /// The index keys to look up.
    keys:  Vec<Value>,
  },
}

impl Query {
  /// A query matching every record.
  pub fn all() -> Self { Self::default() }

  /// A query matching the record with the given id.
  pub fn by_id(id: impl Into<Value>) -> Self { Self::all().and(ID, id) }

  /// A query on a single field.
  pub fn by_field(field: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::all().and(field, value)
  }

  /// Adds a condition to the predicate.
  pub fn and(
    mut self,
    field: impl Into<String>,
    value: impl Into<Value>,
  ) -> Self {
    self.predicate.insert(field, value);
    self
  }

  /// Sets the limit.
  pub fn limit(mut self, limit: u32) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Sets the skip.
  pub fn skip(mut self, skip: u32) -> Self {
    self.skip = Some(skip);
    self
  }

  /// The effective limit. Zero means "not set".
  pub fn page_limit(&self) -> Option<u32> { self.limit.filter(|l| *l > 0) }

  /// The effective skip. Zero means "not set".
  pub fn page_skip(&self) -> Option<u32> { self.skip.filter(|s| *s > 0) }

  /// Classifies the query.
  pub fn shape(&self) -> Result<QueryShape<'_>, UnsupportedQuery> {
    let mut entries = self.predicate.0.iter();
    let (field, value) = match (entries.next(), entries.next()) {
      (None, _) => return Ok(QueryShape::All),
      (Some(only), None) => only,
      (Some(_), Some(_)) => {
        return Err(UnsupportedQuery::CompoundPredicate {
          fields: self.predicate.fields().map(str::to_owned).collect(),
        })
      }
    };

    if field == ID {
      let ids = key_set(value)
        .iter()
        .map(DocId::from_value)
        .collect::<Option<Vec<_>>>()
        .ok_or(UnsupportedQuery::InvalidId)?;
      return Ok(QueryShape::ById(ids));
    }

    Ok(QueryShape::ByField {
      field,
      keys: key_set(value),
    })
  }

  /// The single record an update may target.
  pub fn update_target(&self) -> Result<DocId, UnsupportedQuery> {
    match self.shape() {
      Ok(QueryShape::ById(mut ids)) if ids.len() == 1 => {
        ids.pop().ok_or(UnsupportedQuery::UpdateRequiresId)
      }
      Err(UnsupportedQuery::InvalidId) => Err(UnsupportedQuery::InvalidId),
      _ => Err(UnsupportedQuery::UpdateRequiresId),
    }
  }
}

/// Normalizes a predicate value into a set of lookup keys.
fn key_set(value: &Value) -> Vec<Value> {
  match value {
    Value::Array(values) => values.clone(),
    scalar => vec![scalar.clone()],
  }
}
