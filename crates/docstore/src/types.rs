use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A store-native document.
pub type Document = Map<String, Value>;

/// The store's identifier field.
pub const ID_FIELD: &str = "_id";
/// The store's revision field.
pub const REV_FIELD: &str = "_rev";
/// The id prefix of design documents.
pub const DESIGN_PREFIX: &str = "_design/";

/// Whether a document id names a design document.
pub fn is_design_id(id: &str) -> bool { id.starts_with(DESIGN_PREFIX) }

/// The id of a design document.
pub fn design_id(design: &str) -> String { format!("{DESIGN_PREFIX}{design}") }

/// The outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
  /// The written document's id.
  pub id:  String,
  /// The document's new revision.
  pub rev: String,
}

/// Summary of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
  /// The database name.
  pub db_name:   String,
  /// Number of live documents.
  #[serde(default)]
  pub doc_count: u64,
}

/// Pagination for a full listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllDocsOptions {
  /// Maximum number of documents.
  pub limit: Option<u32>,
  /// Number of documents to skip.
  pub skip:  Option<u32>,
}

/// A view lookup by a set of keys.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
  /// The design document holding the view.
  pub design: String,
  /// The view's name.
  pub view:   String,
  /// Keys to look up.
  pub keys:   Vec<Value>,
  /// Maximum number of rows.
  pub limit:  Option<u32>,
  /// Number of rows to skip.
  pub skip:   Option<u32>,
}

/// One row of a view result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
  /// The id of the document that emitted the row.
  #[serde(default)]
  pub id:    Option<String>,
  /// The emitted key.
  pub key:   Value,
  /// The emitted value.
  pub value: Value,
}

/// The reply to a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthReply {
  /// The session token from the `AuthSession` cookie, if one was set.
  pub token: Option<String>,
  /// The authenticated user name.
  pub name:  Option<String>,
  /// The user's roles.
  pub roles: Vec<String>,
}

/// What the store knows about a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
  /// The session's user, or `None` for an anonymous session.
  pub name:              Option<String>,
  /// The user's roles.
  pub roles:             Vec<String>,
  /// The handler that authenticated the session, if any.
  pub authenticated:     Option<String>,
  /// The database holding the user record.
  pub authentication_db: Option<String>,
}
