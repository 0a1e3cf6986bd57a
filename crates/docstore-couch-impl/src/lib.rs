//! CouchDB HTTP implementation of [`DocumentServer`] and [`DocumentStore`].

mod cookie;
mod errors;

use std::sync::Arc;

use docstore::{
  design_id, AllDocsOptions, AuthReply, ConnectionConfig, Connector,
  DatabaseInfo, Document, DocumentServer, DocumentStore, DynServer, DynStore,
  SessionInfo, StoreError, StoreResult, ViewDefinition, ViewQuery, ViewRow,
  WriteReceipt, DESIGN_PREFIX,
};
use reqwest::{header, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::instrument;

use self::errors::{check, read_json, IntoStoreError};

/// Opens [`CouchServer`]s over a shared HTTP client.
#[derive(Clone, Default)]
pub struct CouchConnector {
  client: reqwest::Client,
}

impl CouchConnector {
  /// Creates a connector with a default HTTP client.
  pub fn new() -> Self { Self::default() }

  /// Creates a connector around an existing HTTP client.
  pub fn with_client(client: reqwest::Client) -> Self { Self { client } }
}

impl Connector for CouchConnector {
  fn connect(&self, config: &ConnectionConfig) -> StoreResult<DynServer> {
    Ok(Arc::new(CouchServer::new(self.client.clone(), config)))
  }
}

#[derive(Clone)]
struct Endpoint {
  client: reqwest::Client,
  config: Arc<ConnectionConfig>,
}

impl Endpoint {
  /// A request against a database. The configured credentials ride in the
  /// URL, which reqwest turns into basic auth.
  fn request(
    &self,
    method: Method,
    database: &str,
    rest: &str,
  ) -> RequestBuilder {
    let url = self.config.url(database);
    if rest.is_empty() {
      self.client.request(method, url)
    } else {
      self.client.request(method, format!("{url}/{rest}"))
    }
  }

  /// Session requests authenticate by cookie or by body, never by the
  /// configured credentials.
  fn session_request(&self, method: Method) -> RequestBuilder {
    let url = format!("{}/_session", self.config.server_url());
    self.client.request(method, url)
  }
}

/// A CouchDB server reached over HTTP.
#[derive(Clone)]
pub struct CouchServer(Endpoint);

impl CouchServer {
  /// Creates a server handle. Credentials from `config` are sent as HTTP
  /// basic auth on every database request.
  pub fn new(client: reqwest::Client, config: &ConnectionConfig) -> Self {
    Self(Endpoint {
      client,
      config: Arc::new(config.clone()),
    })
  }
}

#[derive(Deserialize)]
struct AuthBody {
  #[serde(default)]
  name:  Option<String>,
  #[serde(default)]
  roles: Vec<String>,
}

#[derive(Deserialize)]
struct SessionBody {
  #[serde(rename = "userCtx")]
  user_ctx: UserContext,
  #[serde(default)]
  info:     SessionDetails,
}

#[derive(Deserialize)]
struct UserContext {
  #[serde(default)]
  name:  Option<String>,
  #[serde(default)]
  roles: Vec<String>,
}

#[derive(Default, Deserialize)]
struct SessionDetails {
  #[serde(default)]
  authenticated:     Option<String>,
  #[serde(default)]
  authentication_db: Option<String>,
}

#[async_trait::async_trait]
impl DocumentServer for CouchServer {
  #[instrument(skip(self))]
  async fn database_info(&self, name: &str) -> StoreResult<DatabaseInfo> {
    let response = self
      .0
      .request(Method::GET, name, "")
      .send()
      .await
      .to_store_err()?;
    read_json(response).await
  }

  #[instrument(skip(self))]
  async fn create_database(&self, name: &str) -> StoreResult<()> {
    let response = self
      .0
      .request(Method::PUT, name, "")
      .send()
      .await
      .to_store_err()?;
    check(response).await.map(|_| ())
  }

  #[instrument(skip(self))]
  async fn destroy_database(&self, name: &str) -> StoreResult<()> {
    let response = self
      .0
      .request(Method::DELETE, name, "")
      .send()
      .await
      .to_store_err()?;
    check(response).await.map(|_| ())
  }

  fn database(&self, name: &str) -> DynStore {
    Arc::new(CouchDatabase {
      endpoint: self.0.clone(),
      name:     name.to_owned(),
    })
  }

  #[instrument(skip(self, password))]
  async fn authenticate(
    &self,
    username: &str,
    password: &str,
  ) -> StoreResult<AuthReply> {
    let response = self
      .0
      .session_request(Method::POST)
      .json(&json!({ "name": username, "password": password }))
      .send()
      .await
      .to_store_err()?;
    let response = check(response).await?;

    let token = cookie::session_token(
      response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok()),
    );
    if token.is_none() {
      tracing::warn!("login succeeded without a session cookie");
    }
    let body: AuthBody = response.json().await.to_store_err()?;
    Ok(AuthReply {
      token,
      name: body.name.or_else(|| Some(username.to_owned())),
      roles: body.roles,
    })
  }

  #[instrument(skip_all)]
  async fn session(&self, token: &str) -> StoreResult<SessionInfo> {
    let response = self
      .0
      .session_request(Method::GET)
      .header(header::COOKIE, cookie::session_cookie(token))
      .send()
      .await
      .to_store_err()?;
    let body: SessionBody = read_json(response).await?;
    Ok(SessionInfo {
      name:              body.user_ctx.name,
      roles:             body.user_ctx.roles,
      authenticated:     body.info.authenticated,
      authentication_db: body.info.authentication_db,
    })
  }
}

/// One database on a [`CouchServer`].
pub struct CouchDatabase {
  endpoint: Endpoint,
  name:     String,
}

/// Encodes a document id as a path segment. Design document ids keep their
/// slash.
fn doc_path(id: &str) -> String {
  match id.strip_prefix(DESIGN_PREFIX) {
    Some(rest) => format!("{DESIGN_PREFIX}{}", urlencoding::encode(rest)),
    None => urlencoding::encode(id).into_owned(),
  }
}

fn pagination(
  limit: Option<u32>,
  skip: Option<u32>,
) -> Vec<(&'static str, String)> {
  let mut params = Vec::new();
  if let Some(limit) = limit {
    params.push(("limit", limit.to_string()));
  }
  if let Some(skip) = skip {
    params.push(("skip", skip.to_string()));
  }
  params
}

#[derive(Deserialize)]
struct AllDocsBody {
  rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
  #[serde(default)]
  doc: Option<Document>,
}

#[derive(Deserialize)]
struct ViewBody {
  rows: Vec<ViewRow>,
}

#[derive(Deserialize)]
struct WriteBody {
  id:  String,
  rev: String,
}

impl From<WriteBody> for WriteReceipt {
  fn from(body: WriteBody) -> Self {
    WriteReceipt {
      id:  body.id,
      rev: body.rev,
    }
  }
}

impl CouchDatabase {
  fn request(&self, method: Method, rest: &str) -> RequestBuilder {
    self.endpoint.request(method, &self.name, rest)
  }
}

#[async_trait::async_trait]
impl DocumentStore for CouchDatabase {
  fn name(&self) -> &str { &self.name }

  #[instrument(skip(self), fields(db = %self.name))]
  async fn get(&self, id: &str) -> StoreResult<Document> {
    let response = self
      .request(Method::GET, &doc_path(id))
      .send()
      .await
      .to_store_err()?;
    read_json(response).await
  }

  #[instrument(skip(self), fields(db = %self.name))]
  async fn list(&self, options: &AllDocsOptions) -> StoreResult<Vec<Document>> {
    let mut params = pagination(options.limit, options.skip);
    params.push(("include_docs", "true".to_owned()));
    let response = self
      .request(Method::GET, "_all_docs")
      .query(&params)
      .send()
      .await
      .to_store_err()?;
    let body: AllDocsBody = read_json(response).await?;
    Ok(body.rows.into_iter().filter_map(|row| row.doc).collect())
  }

  #[instrument(skip(self, doc), fields(db = %self.name))]
  async fn insert(&self, doc: Document) -> StoreResult<WriteReceipt> {
    let response = self
      .request(Method::POST, "")
      .json(&doc)
      .send()
      .await
      .to_store_err()?;
    read_json::<WriteBody>(response).await.map(Into::into)
  }

  #[instrument(skip(self, doc), fields(db = %self.name))]
  async fn put(&self, id: &str, doc: Document) -> StoreResult<WriteReceipt> {
    let response = self
      .request(Method::PUT, &doc_path(id))
      .json(&doc)
      .send()
      .await
      .to_store_err()?;
    read_json::<WriteBody>(response).await.map(Into::into)
  }

  #[instrument(skip(self), fields(db = %self.name))]
  async fn delete(&self, id: &str, rev: &str) -> StoreResult<WriteReceipt> {
    let response = self
      .request(Method::DELETE, &doc_path(id))
      .query(&[("rev", rev)])
      .send()
      .await
      .to_store_err()?;
    read_json::<WriteBody>(response).await.map(Into::into)
  }

  #[instrument(skip(self, query), fields(db = %self.name, view = %query.view))]
  async fn query_view(&self, query: &ViewQuery) -> StoreResult<Vec<ViewRow>> {
    let path = format!(
      "{}/_view/{}",
      doc_path(&design_id(&query.design)),
      urlencoding::encode(&query.view)
    );
    let response = self
      .request(Method::POST, &path)
      .query(&pagination(query.limit, query.skip))
      .json(&json!({ "keys": query.keys }))
      .send()
      .await
      .to_store_err()?;
    let body: ViewBody = read_json(response).await?;
    Ok(body.rows)
  }

  #[instrument(skip(self, view), fields(db = %self.name, view = %view.name()))]
  async fn save_view(
    &self,
    design: &str,
    view: &ViewDefinition,
  ) -> StoreResult<WriteReceipt> {
    let id = design_id(design);
    let mut design_doc = match self.get(&id).await {
      Ok(doc) => doc,
      Err(StoreError::NotFound { .. }) => Map::new(),
      Err(e) => return Err(e),
    };
    let views = design_doc
      .entry("views")
      .or_insert_with(|| Value::Object(Map::new()));
    if !views.is_object() {
      tracing::warn!(%id, "replacing malformed `views` member");
      *views = Value::Object(Map::new());
    }
    if let Value::Object(views) = views {
      views.insert(view.name().to_owned(), view.design_entry());
    }
    self.put(&id, design_doc).await
  }
}
