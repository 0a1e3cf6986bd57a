use std::sync::Arc;

use docstore::{
  is_design_id, AllDocsOptions, Connector, Document, DynStore, SessionInfo,
  StoreError, ViewDefinition, ViewQuery, ID_FIELD, REV_FIELD,
};
use record::{merge_maps, store_field_name, DocId, Query, QueryShape, Record};
use serde_json::Value;
use tracing::instrument;
use views::DESIGN_DOCUMENT;

use crate::{
  AdapterError, AdapterResult, CollectionBinding, CollectionConfig, Registry,
  Schema,
};

/// How many times a missing view is created before the lookup gives up.
const MAX_INDEX_PROVISIONS: usize = 1;

/// A successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
  /// The session token, if the store issued one.
  pub token:    Option<String>,
  /// The authenticated user.
  pub username: String,
  /// The user's roles.
  pub roles:    Vec<String>,
}

/// Translates record operations into document store operations.
///
/// Register every collection with [`register_collection`] before serving
/// requests; the remaining operations only need `&self`.
///
/// [`register_collection`]: Adapter::register_collection
pub struct Adapter {
  connector: Arc<dyn Connector>,
  registry:  Registry,
}

impl Adapter {
  /// Creates an adapter that opens servers through `connector`.
  pub fn new(connector: impl Connector) -> Self {
    Self {
      connector: Arc::new(connector),
      registry:  Registry::new(),
    }
  }

  /// The registered collections.
  pub fn registry(&self) -> &Registry { &self.registry }

  fn binding(&self, collection: &str) -> AdapterResult<&CollectionBinding> {
    self
      .registry
      .get(collection)
      .ok_or_else(|| AdapterError::UnknownCollection(collection.to_owned()))
  }

  /// Binds a collection to its database, creating the database if the store
  /// doesn't have it.
  ///
  /// Registering the same config twice does nothing the second time.
  #[instrument(skip_all, fields(collection = %config.identity))]
  pub async fn register_collection(
    &mut self,
    config: CollectionConfig,
  ) -> AdapterResult<&CollectionBinding> {
    let unchanged = self
      .registry
      .get(&config.identity)
      .is_some_and(|existing| existing.config() == &config);
    if unchanged {
      tracing::debug!("collection already registered");
      return self.binding(&config.identity);
    }

    let server = self.connector.connect(&config.connection)?;
    let database = config.database_name().to_owned();

    match server.database_info(&database).await {
      Ok(info) => {
        tracing::debug!(%database, docs = info.doc_count, "database exists");
      }
      Err(e) if e.is_not_found() => {
        tracing::warn!(%database, "creating missing database");
        match server.create_database(&database).await {
          Ok(()) | Err(StoreError::AlreadyExists { .. }) => {}
          Err(e) => return Err(e.into()),
        }
      }
      Err(e) => return Err(e.into()),
    }

    let store = server.database(&database);
    Ok(
      self
        .registry
        .insert(CollectionBinding::new(config, server, store)),
    )
  }

  /// Returns the schema a collection was registered with.
  pub fn describe(&self, collection: &str) -> AdapterResult<&Schema> {
    Ok(self.binding(collection)?.schema())
  }

  /// Destroys the collection's database. The collection stays registered.
  #[instrument(skip(self))]
  pub async fn drop_collection(&self, collection: &str) -> AdapterResult<()> {
    let binding = self.binding(collection)?;
    tracing::warn!(database = binding.database(), "destroying database");
    binding.server().destroy_database(binding.database()).await?;
    Ok(())
  }

  /// Finds the records matching `query`.
  #[instrument(skip(self, query))]
  pub async fn find(
    &self,
    collection: &str,
    query: &Query,
  ) -> AdapterResult<Vec<Record>> {
    let store = self.binding(collection)?.store();

    let docs = match query.shape()? {
      QueryShape::All => {
        tracing::debug!("listing all documents");
        list_all(store, query).await?
      }
      QueryShape::ById(ids) => {
        tracing::debug!(count = ids.len(), "fetching documents by id");
        fetch_by_ids(store, &ids).await?
      }
      QueryShape::ByField { field, keys } => {
        tracing::debug!(field, "querying view");
        query_index(store, field, keys, query).await?
      }
    };

    Ok(docs.into_iter().map(Record::from_document).collect())
  }

  /// Inserts a record and returns it with its store-assigned `id` and `rev`.
  #[instrument(skip(self, record))]
  pub async fn create(
    &self,
    collection: &str,
    record: Record,
  ) -> AdapterResult<Record> {
    let store = self.binding(collection)?.store();
    let receipt = store.insert(record.clone().into_document()).await?;
    tracing::debug!(id = %receipt.id, "created record");
    Ok(record.with_receipt(&receipt.id, &receipt.rev))
  }

  /// Replaces the record addressed by `query`, which must select a single
  /// `id`. The record must carry the current `rev`.
  #[instrument(skip(self, query, record))]
  pub async fn update(
    &self,
    collection: &str,
    query: &Query,
    record: Record,
  ) -> AdapterResult<Record> {
    let store = self.binding(collection)?.store();
    let id = query.update_target()?;

    let mut doc = record.into_document();
    doc.remove(ID_FIELD);
    let receipt = store.put(id.as_str(), doc.clone()).await?;
    tracing::debug!(id = %receipt.id, rev = %receipt.rev, "updated record");
    Ok(Record::from_document(doc).with_receipt(&receipt.id, &receipt.rev))
  }

  /// Deletes the records matching `query` and returns them with their
  /// deletion revisions.
  #[instrument(skip(self, query))]
  pub async fn destroy(
    &self,
    collection: &str,
    query: &Query,
  ) -> AdapterResult<Vec<Record>> {
    let matches = self.find(collection, query).await?;
    let store = self.binding(collection)?.store();

    let mut deleted = Vec::with_capacity(matches.len());
    for record in matches {
      let (Some(id), Some(rev)) = (record.id(), record.rev().map(str::to_owned))
      else {
        continue;
      };
      match store.delete(id.as_str(), &rev).await {
        Ok(receipt) => {
          deleted.push(record.with_receipt(&receipt.id, &receipt.rev));
        }
        Err(e) if e.is_not_found() => {
          tracing::debug!(%id, "record vanished before delete");
        }
        Err(e) => return Err(e.into()),
      }
    }
    Ok(deleted)
  }

  /// Logs in against the collection's server.
  #[instrument(skip(self, password))]
  pub async fn authenticate(
    &self,
    collection: &str,
    username: &str,
    password: &str,
  ) -> AdapterResult<AuthSession> {
    let server = self.binding(collection)?.server();
    let reply = server.authenticate(username, password).await?;
    if reply.token.is_none() {
      tracing::warn!("login succeeded without a session cookie");
    }
    Ok(AuthSession {
      token:    reply.token,
      username: reply.name.unwrap_or_else(|| username.to_owned()),
      roles:    reply.roles,
    })
  }

  /// Describes the session identified by `token`.
  #[instrument(skip(self, token))]
  pub async fn session(
    &self,
    collection: &str,
    token: &str,
  ) -> AdapterResult<SessionInfo> {
    let server = self.binding(collection)?.server();
    Ok(server.session(token).await?)
  }

  /// Deep-merges `partial` into the record at `id`, creating it if absent.
  ///
  /// This is a read followed by a write. A concurrent write in between fails
  /// with [`AdapterError::Conflict`].
  #[instrument(skip(self, partial))]
  pub async fn merge(
    &self,
    collection: &str,
    id: &str,
    partial: Record,
  ) -> AdapterResult<Record> {
    let store = self.binding(collection)?.store();

    let mut merged = match store.get(id).await {
      Ok(doc) => doc,
      Err(e) if e.is_not_found() => {
        tracing::debug!("merging into a new record");
        Document::new()
      }
      Err(e) => return Err(e.into()),
    };

    let mut patch = partial.into_document();
    patch.remove(ID_FIELD);
    patch.remove(REV_FIELD);
    merge_maps(&mut merged, patch);
    merged.remove(ID_FIELD);

    let receipt = store.put(id, merged.clone()).await?;
    Ok(Record::from_document(merged).with_receipt(&receipt.id, &receipt.rev))
  }

  /// Releases every collection binding.
  pub fn teardown(&mut self) {
    tracing::debug!(collections = self.registry.len(), "tearing down");
    self.registry.clear();
  }
}

fn is_design_doc(doc: &Document) -> bool {
  doc
    .get(ID_FIELD)
    .and_then(Value::as_str)
    .is_some_and(is_design_id)
}

/// Lists records, leaving out design documents. Pages that lost rows to
/// design documents are topped up with follow-up fetches so `limit` holds.
async fn list_all(
  store: &DynStore,
  query: &Query,
) -> AdapterResult<Vec<Document>> {
  let limit = query.page_limit().map(|limit| limit as usize);
  let mut offset = query.page_skip().unwrap_or(0);
  let mut docs = Vec::new();

  loop {
    let wanted = limit.map(|limit| limit - docs.len());
    let page = store
      .list(&AllDocsOptions {
        limit: wanted.map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
        skip:  Some(offset).filter(|skip| *skip > 0),
      })
      .await?;
    let fetched = page.len();
    docs.extend(page.into_iter().filter(|doc| !is_design_doc(doc)));

    let (Some(limit), Some(wanted)) = (limit, wanted) else {
      return Ok(docs);
    };
    // a short page means the listing is exhausted
    if docs.len() >= limit || fetched < wanted {
      return Ok(docs);
    }
    tracing::debug!(offset, fetched, "topping up a page with design docs");
    let fetched = u32::try_from(fetched).unwrap_or(u32::MAX);
    offset = offset.saturating_add(fetched);
  }
}

async fn fetch_by_ids(
  store: &DynStore,
  ids: &[DocId],
) -> AdapterResult<Vec<Document>> {
  let mut docs = Vec::with_capacity(ids.len());
  for id in ids {
    match store.get(id.as_str()).await {
      Ok(doc) => docs.push(doc),
      Err(e) if e.is_not_found() => {}
      Err(e) => return Err(e.into()),
    }
  }
  Ok(docs)
}

/// Looks `keys` up in the view for `field`, creating the view once if the
/// store doesn't have it.
async fn query_index(
  store: &DynStore,
  field: &str,
  keys: Vec<Value>,
  query: &Query,
) -> AdapterResult<Vec<Document>> {
  let view = ViewDefinition::for_fields([store_field_name(field)]);
  let request = ViewQuery {
    design: DESIGN_DOCUMENT.to_owned(),
    view: view.name().to_owned(),
    keys,
    limit: query.page_limit(),
    skip: query.page_skip(),
  };

  let mut provisions = 0;
  loop {
    let error = match store.query_view(&request).await {
      Ok(rows) => {
        return Ok(
          rows
            .into_iter()
            .filter_map(|row| match row.value {
              Value::Object(doc) => Some(doc),
              other => {
                tracing::warn!(
                  view = view.name(),
                  id = row.id.as_deref().unwrap_or_default(),
                  value = %other,
                  "skipping view row whose value is not a document"
                );
                None
              }
            })
            .collect(),
        )
      }
      Err(e) => e,
    };

    if !error.is_not_found() {
      return Err(error.into());
    }
    if provisions >= MAX_INDEX_PROVISIONS {
      return Err(AdapterError::IndexUnavailable {
        view: view.name().to_owned(),
      });
    }

    tracing::warn!(
      database = store.name(),
      view = view.name(),
      "creating missing view"
    );
    match store.save_view(DESIGN_DOCUMENT, &view).await {
      // someone else updated the design document first
      Ok(_) | Err(StoreError::Conflict { .. }) => {}
      Err(e) => return Err(e.into()),
    }
    provisions += 1;
  }
}
