//! Store-facing interface for CouchDB-style document databases.
//!
//! [`Connector`] opens a [`DocumentServer`] for a [`ConnectionConfig`]; the
//! server hands out [`DocumentStore`] handles for individual databases.
//! Implementations live in their own crates.

mod config;
mod errors;
mod types;

use std::sync::Arc;

pub use views::ViewDefinition;

pub use self::{config::*, errors::*, types::*};

/// A shared [`DocumentServer`] handle.
pub type DynServer = Arc<dyn DocumentServer>;
/// A shared [`DocumentStore`] handle.
pub type DynStore = Arc<dyn DocumentStore>;

/// Opens servers from connection settings.
pub trait Connector: Send + Sync + 'static {
  /// Opens a handle to the server described by `config`. Does not touch the
  /// network.
  fn connect(&self, config: &ConnectionConfig) -> StoreResult<DynServer>;
}

/// Server-level operations.
#[async_trait::async_trait]
pub trait DocumentServer: Send + Sync + 'static {
  /// Fetches a database's info. Fails with [`StoreError::NotFound`] if the
  /// database does not exist.
  async fn database_info(&self, name: &str) -> StoreResult<DatabaseInfo>;
  /// Creates a database. Fails with [`StoreError::AlreadyExists`] if it
  /// exists.
  async fn create_database(&self, name: &str) -> StoreResult<()>;
  /// Destroys a database and everything in it.
  async fn destroy_database(&self, name: &str) -> StoreResult<()>;
  /// Returns a handle to a database. Does not touch the network.
  fn database(&self, name: &str) -> DynStore;
  /// Verifies credentials and opens a cookie session.
  async fn authenticate(
    &self,
    username: &str,
    password: &str,
  ) -> StoreResult<AuthReply>;
  /// Inspects the session identified by a session token.
  async fn session(&self, token: &str) -> StoreResult<SessionInfo>;
}

/// Database-level operations.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
  /// The database's name.
  fn name(&self) -> &str;

  /// Fetches a document by id.
  async fn get(&self, id: &str) -> StoreResult<Document>;
  /// Lists documents, design documents included.
  async fn list(&self, options: &AllDocsOptions) -> StoreResult<Vec<Document>>;
  /// Inserts a document, letting the store assign an id if it has none.
  async fn insert(&self, doc: Document) -> StoreResult<WriteReceipt>;
  /// Writes a document at `id`. An existing document requires a matching
  /// `_rev`.
  async fn put(&self, id: &str, doc: Document) -> StoreResult<WriteReceipt>;
  /// Deletes the revision `rev` of document `id`.
  async fn delete(&self, id: &str, rev: &str) -> StoreResult<WriteReceipt>;
  /// Queries a view. Fails with [`StoreError::NotFound`] if the view does
  /// not exist.
  async fn query_view(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>>;
  /// Adds a view to a design document, creating the design document if
  /// needed.
  async fn save_view(
    &self,
    design: &str,
    view: &ViewDefinition,
  ) -> StoreResult<WriteReceipt>;
}
