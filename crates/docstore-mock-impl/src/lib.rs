//! An in-memory implementation of [`DocumentServer`]. Follows CouchDB
//! semantics around revisions, tombstones, and design documents.

mod counters;

use std::{
  collections::{BTreeMap, HashMap},
  sync::Arc,
};

use docstore::{
  design_id, is_design_id, AllDocsOptions, AuthReply, ConnectionConfig,
  Connector, DatabaseInfo, Document, DocumentServer, DocumentStore, DynServer,
  DynStore, SessionInfo, StoreError, StoreResult, ViewDefinition, ViewQuery,
  ViewRow, WriteReceipt, ID_FIELD, REV_FIELD,
};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

pub use self::counters::CallCounts;
use self::counters::Counters;

/// Hands out the same [`MockServer`] for every connection config.
#[derive(Clone, Default)]
pub struct MockConnector(MockServer);

impl MockConnector {
  /// Creates a connector around `server`.
  pub fn new(server: MockServer) -> Self { Self(server) }

  /// The shared server.
  pub fn server(&self) -> &MockServer { &self.0 }
}

impl Connector for MockConnector {
  fn connect(&self, config: &ConnectionConfig) -> StoreResult<DynServer> {
    tracing::debug!(url = %config.server_url(), "connecting to mock server");
    self.0.inner.counters.bump(|c| &c.connect);
    Ok(Arc::new(self.0.clone()))
  }
}

/// A mock document server.
#[derive(Clone, Default)]
pub struct MockServer {
  inner: Arc<MockServerInner>,
}

#[derive(Default)]
struct MockServerInner {
  state:    RwLock<ServerState>,
  counters: Counters,
}

#[derive(Default)]
struct ServerState {
  databases:         HashMap<String, DatabaseState>,
  users:             HashMap<String, MockUser>,
  sessions:          HashMap<String, String>,
  ignore_view_saves: bool,
}

struct MockUser {
  password: String,
  roles:    Vec<String>,
}

#[derive(Default)]
struct DatabaseState {
  docs:  BTreeMap<String, StoredDoc>,
  views: HashMap<(String, String), ViewDefinition>,
}

struct StoredDoc {
  generation: u64,
  rev:        String,
  body:       Option<Document>,
}

impl StoredDoc {
  fn live_rev(&self) -> Option<&str> {
    self.body.as_ref().map(|_| self.rev.as_str())
  }

  fn render(&self, id: &str) -> Option<Document> {
    let mut doc = self.body.clone()?;
    doc.insert(ID_FIELD.to_owned(), Value::String(id.to_owned()));
    doc.insert(REV_FIELD.to_owned(), Value::String(self.rev.clone()));
    Some(doc)
  }
}

fn next_rev(generation: u64) -> String {
  format!("{generation}-{}", ulid::Ulid::new().to_string().to_lowercase())
}

fn missing_db(name: &str) -> StoreError {
  StoreError::not_found(format!("Database does not exist: {name}"))
}

impl DatabaseState {
  fn write(
    &mut self,
    id: &str,
    mut doc: Document,
  ) -> StoreResult<WriteReceipt> {
    let given_rev = match doc.remove(REV_FIELD) {
      Some(Value::String(rev)) => Some(rev),
      _ => None,
    };
    doc.remove(ID_FIELD);

    let generation = match self.docs.get(id) {
      Some(existing) => {
        let expected = existing.live_rev().map(str::to_owned);
        let accepted = match (&expected, &given_rev) {
          (Some(current), Some(given)) => current == given,
          (Some(_), None) => false,
          // a deleted document may be recreated from scratch or from its
          // tombstone revision
          (None, None) => true,
          (None, Some(given)) => *given == existing.rev,
        };
        if !accepted {
          return Err(StoreError::conflict("Document update conflict."));
        }
        existing.generation + 1
      }
      None if given_rev.is_some() => {
        return Err(StoreError::conflict("Document update conflict."));
      }
      None => 1,
    };

    let rev = next_rev(generation);
    self.docs.insert(id.to_owned(), StoredDoc {
      generation,
      rev: rev.clone(),
      body: Some(doc),
    });
    Ok(WriteReceipt {
      id: id.to_owned(),
      rev,
    })
  }

  fn live_docs(&self) -> impl Iterator<Item = Document> + '_ {
    self.docs.iter().filter_map(|(id, stored)| stored.render(id))
  }
}

impl MockServer {
  /// Creates an empty server.
  pub fn new() -> Self { Self::default() }

  /// Registers a user that can [`authenticate`](DocumentServer::authenticate).
  pub async fn add_user(&self, name: &str, password: &str, roles: &[&str]) {
    self.inner.state.write().await.users.insert(name.to_owned(), MockUser {
      password: password.to_owned(),
      roles:    roles.iter().map(|r| (*r).to_owned()).collect(),
    });
  }

  /// When set, [`save_view`](DocumentStore::save_view) reports success without
  /// making the view queryable. Simulates a store that loses index
  /// definitions.
  pub async fn ignore_view_saves(&self, ignore: bool) {
    self.inner.state.write().await.ignore_view_saves = ignore;
  }

  /// Whether a database exists.
  pub async fn has_database(&self, name: &str) -> bool {
    self.inner.state.read().await.databases.contains_key(name)
  }

  /// Number of live documents in a database, design documents included.
  pub async fn document_count(&self, name: &str) -> usize {
    self
      .inner
      .state
      .read()
      .await
      .databases
      .get(name)
      .map(|db| db.live_docs().count())
      .unwrap_or(0)
  }

  /// A snapshot of how many times each store operation has been called.
  pub fn call_counts(&self) -> CallCounts { self.inner.counters.snapshot() }
}

#[async_trait::async_trait]
impl DocumentServer for MockServer {
  async fn database_info(&self, name: &str) -> StoreResult<DatabaseInfo> {
    self.inner.counters.bump(|c| &c.database_info);
    let state = self.inner.state.read().await;
    let db = state.databases.get(name).ok_or_else(|| missing_db(name))?;
    Ok(DatabaseInfo {
      db_name:   name.to_owned(),
      doc_count: db.live_docs().count() as u64,
    })
  }

  async fn create_database(&self, name: &str) -> StoreResult<()> {
    self.inner.counters.bump(|c| &c.create_database);
    let mut state = self.inner.state.write().await;
    if state.databases.contains_key(name) {
      return Err(StoreError::AlreadyExists {
        reason: "The database could not be created, the file already exists."
          .to_owned(),
      });
    }
    state.databases.insert(name.to_owned(), DatabaseState::default());
    Ok(())
  }

  async fn destroy_database(&self, name: &str) -> StoreResult<()> {
    self.inner.counters.bump(|c| &c.destroy_database);
    let mut state = self.inner.state.write().await;
    state
      .databases
      .remove(name)
      .map(|_| ())
      .ok_or_else(|| missing_db(name))
  }

  fn database(&self, name: &str) -> DynStore {
    Arc::new(MockDatabase {
      server: self.clone(),
      name:   name.to_owned(),
    })
  }

  async fn authenticate(
    &self,
    username: &str,
    password: &str,
  ) -> StoreResult<AuthReply> {
    self.inner.counters.bump(|c| &c.authenticate);
    let mut state = self.inner.state.write().await;
    let roles = match state.users.get(username) {
      Some(user) if user.password == password => user.roles.clone(),
      _ => {
        return Err(StoreError::Rejected {
          status: 401,
          error:  "unauthorized".to_owned(),
          reason: "Name or password is incorrect.".to_owned(),
        })
      }
    };
    let token = ulid::Ulid::new().to_string();
    state.sessions.insert(token.clone(), username.to_owned());
    Ok(AuthReply {
      token: Some(token),
      name: Some(username.to_owned()),
      roles,
    })
  }

  async fn session(&self, token: &str) -> StoreResult<SessionInfo> {
    self.inner.counters.bump(|c| &c.session);
    let state = self.inner.state.read().await;
    let Some(name) = state.sessions.get(token) else {
      return Ok(SessionInfo::default());
    };
    let roles = state
      .users
      .get(name)
      .map(|u| u.roles.clone())
      .unwrap_or_default();
    Ok(SessionInfo {
      name: Some(name.clone()),
      roles,
      authenticated: Some("cookie".to_owned()),
      authentication_db: Some("_users".to_owned()),
    })
  }
}

/// A handle to one database of a [`MockServer`].
pub struct MockDatabase {
  server: MockServer,
  name:   String,
}

impl MockDatabase {
  fn counters(&self) -> &Counters { &self.server.inner.counters }
}

fn paginate<T>(
  items: impl Iterator<Item = T>,
  skip: Option<u32>,
  limit: Option<u32>,
) -> Vec<T> {
  let items = items.skip(skip.unwrap_or(0) as usize);
  match limit {
    Some(limit) => items.take(limit as usize).collect(),
    None => items.collect(),
  }
}

#[async_trait::async_trait]
impl DocumentStore for MockDatabase {
  fn name(&self) -> &str { &self.name }

  async fn get(&self, id: &str) -> StoreResult<Document> {
    self.counters().bump(|c| &c.get);
    let state = self.server.inner.state.read().await;
    let db = state
      .databases
      .get(&self.name)
      .ok_or_else(|| missing_db(&self.name))?;
    match db.docs.get(id) {
      Some(stored) => stored
        .render(id)
        .ok_or_else(|| StoreError::not_found("deleted")),
      None => Err(StoreError::not_found("missing")),
    }
  }

  async fn list(&self, options: &AllDocsOptions) -> StoreResult<Vec<Document>> {
    self.counters().bump(|c| &c.list);
    let state = self.server.inner.state.read().await;
    let db = state
      .databases
      .get(&self.name)
      .ok_or_else(|| missing_db(&self.name))?;
    Ok(paginate(db.live_docs(), options.skip, options.limit))
  }

  async fn insert(&self, doc: Document) -> StoreResult<WriteReceipt> {
    self.counters().bump(|c| &c.insert);
    let id = match doc.get(ID_FIELD) {
      Some(Value::String(id)) => id.clone(),
      _ => ulid::Ulid::new().to_string().to_lowercase(),
    };
    let mut state = self.server.inner.state.write().await;
    let db = state
      .databases
      .get_mut(&self.name)
      .ok_or_else(|| missing_db(&self.name))?;
    db.write(&id, doc)
  }

  async fn put(&self, id: &str, doc: Document) -> StoreResult<WriteReceipt> {
    self.counters().bump(|c| &c.put);
    let mut state = self.server.inner.state.write().await;
    let db = state
      .databases
      .get_mut(&self.name)
      .ok_or_else(|| missing_db(&self.name))?;
    db.write(id, doc)
  }

  async fn delete(&self, id: &str, rev: &str) -> StoreResult<WriteReceipt> {
    self.counters().bump(|c| &c.delete);
    let mut state = self.server.inner.state.write().await;
    let db = state
      .databases
      .get_mut(&self.name)
      .ok_or_else(|| missing_db(&self.name))?;
    let stored = db
      .docs
      .get_mut(id)
      .filter(|stored| stored.body.is_some())
      .ok_or_else(|| StoreError::not_found("missing"))?;
    if stored.rev != rev {
      return Err(StoreError::conflict("Document update conflict."));
    }
    stored.generation += 1;
    stored.rev = next_rev(stored.generation);
    stored.body = None;
    Ok(WriteReceipt {
      id:  id.to_owned(),
      rev: stored.rev.clone(),
    })
  }

  async fn query_view(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>> {
    self.counters().bump(|c| &c.query_view);
    let state = self.server.inner.state.read().await;
    let db = state
      .databases
      .get(&self.name)
      .ok_or_else(|| missing_db(&self.name))?;
    let view = db
      .views
      .get(&(query.design.clone(), query.view.clone()))
      .ok_or_else(|| StoreError::not_found("missing_named_view"))?;

    // rows come back grouped in the order the keys were requested
    let mut rows = Vec::new();
    for key in &query.keys {
      for (id, stored) in &db.docs {
        if is_design_id(id) {
          continue;
        }
        let Some(doc) = stored.render(id) else {
          continue;
        };
        if view.key_for(&doc) == *key {
          rows.push(ViewRow {
            id:    Some(id.clone()),
            key:   key.clone(),
            value: Value::Object(doc),
          });
        }
      }
    }
    Ok(paginate(rows.into_iter(), query.skip, query.limit))
  }

  async fn save_view(
    &self,
    design: &str,
    view: &ViewDefinition,
  ) -> StoreResult<WriteReceipt> {
    self.counters().bump(|c| &c.save_view);
    let mut state = self.server.inner.state.write().await;
    let ignore = state.ignore_view_saves;
    let db = state
      .databases
      .get_mut(&self.name)
      .ok_or_else(|| missing_db(&self.name))?;

    let id = design_id(design);
    let mut design_doc = db
      .docs
      .get(&id)
      .and_then(|stored| stored.render(&id))
      .unwrap_or_else(|| {
        let mut doc = Map::new();
        doc.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
        doc
      });
    let views = design_doc
      .entry("views")
      .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(views) = views {
      views.insert(view.name().to_owned(), view.design_entry());
    }

    let receipt = db.write(&id, design_doc)?;
    if !ignore {
      db.views
        .insert((design.to_owned(), view.name().to_owned()), view.clone());
    }
    Ok(receipt)
  }
}
