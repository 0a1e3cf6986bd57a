use docstore::ConnectionConfig;
use record::Schema;
use serde::{Deserialize, Serialize};

/// How the calling framework should sync schemas. Carried, not interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Migrate {
  /// Drop and recreate.
  Drop,
  /// Add and remove attributes as needed.
  Alter,
  /// Change nothing.
  #[default]
  Safe,
}

fn enabled() -> bool { true }

fn string_keys() -> String { "string".to_owned() }

/// Everything needed to register a collection.
///
/// Connection settings sit at the top level, next to the collection's own
/// options. Unrecognized keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
  /// The collection name callers use.
  pub identity:   String,
  /// The backing database. Defaults to the identity.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub database:   Option<String>,
  /// Where the database lives.
  #[serde(flatten)]
  pub connection: ConnectionConfig,
  /// The logical schema returned by [`describe`](crate::Adapter::describe).
  #[serde(default)]
  pub definition: Schema,
  /// Whether the framework should enforce the schema.
  #[serde(default = "enabled")]
  pub schema:     bool,
  /// Whether the framework should sync the schema at startup.
  #[serde(default = "enabled")]
  pub syncable:   bool,
  /// Whether the framework should generate primary keys itself.
  #[serde(rename = "autoPK", default)]
  pub auto_pk:    bool,
  /// The primary key type the framework should assume.
  #[serde(rename = "pkFormat", default = "string_keys")]
  pub pk_format:  String,
  /// Schema sync strategy.
  #[serde(default)]
  pub migrate:    Migrate,
}

impl CollectionConfig {
  /// A config for `identity` with default connection settings.
  pub fn new(identity: impl Into<String>) -> Self {
    Self {
      identity:   identity.into(),
      database:   None,
      connection: ConnectionConfig::default(),
      definition: Schema::default(),
      schema:     true,
      syncable:   true,
      auto_pk:    false,
      pk_format:  string_keys(),
      migrate:    Migrate::default(),
    }
  }

  /// Sets the connection settings.
  pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
    self.connection = connection;
    self
  }

  /// Sets the backing database name.
  pub fn with_database(mut self, database: impl Into<String>) -> Self {
    self.database = Some(database.into());
    self
  }

  /// Sets the logical schema.
  pub fn with_definition(mut self, definition: Schema) -> Self {
    self.definition = definition;
    self
  }

  /// The backing database name.
  pub fn database_name(&self) -> &str {
    self.database.as_deref().unwrap_or(&self.identity)
  }
}
