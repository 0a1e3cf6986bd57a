use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A collection's logical schema, as declared by the caller.
///
/// The adapter stores and returns it verbatim; the store itself is
/// schemaless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Map<String, Value>);

impl Schema {
  /// Creates an empty schema.
  pub fn new() -> Self { Self(Map::new()) }

  /// Declares an attribute.
  pub fn with_attribute(
    mut self,
    name: impl Into<String>,
    definition: impl Into<Value>,
  ) -> Self {
    self.0.insert(name.into(), definition.into());
    self
  }

  /// Looks up an attribute definition.
  pub fn attribute(&self, name: &str) -> Option<&Value> { self.0.get(name) }
}
