use serde::{Deserialize, Serialize};

/// The store's standard port.
pub const DEFAULT_PORT: u16 = 5984;
/// The default host.
pub const DEFAULT_HOST: &str = "localhost";

/// Where a document server lives and how to log in to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
  /// Host name.
  pub host:     String,
  /// TCP port.
  pub port:     u16,
  /// Whether to use TLS.
  pub https:    bool,
  /// Login name. Only used together with `password`.
  pub username: Option<String>,
  /// Password. Only used together with `username`.
  pub password: Option<String>,
}

impl Default for ConnectionConfig {
  fn default() -> Self {
    Self {
      host:     DEFAULT_HOST.to_owned(),
      port:     DEFAULT_PORT,
      https:    false,
      username: None,
      password: None,
    }
  }
}

impl ConnectionConfig {
  /// The URL scheme.
  pub fn scheme(&self) -> &'static str {
    if self.https {
      "https"
    } else {
      "http"
    }
  }

  /// The credentials, if both halves are present.
  pub fn credentials(&self) -> Option<(&str, &str)> {
    match (&self.username, &self.password) {
      (Some(user), Some(pass)) => Some((user, pass)),
      _ => None,
    }
  }

  /// The server URL without credentials: `scheme://host:port`.
  pub fn server_url(&self) -> String {
    format!("{}://{}:{}", self.scheme(), self.host, self.port)
  }

  /// The database URL: `scheme://[user:pass@]host:port/database`.
  ///
  /// Credentials and the database name are percent-encoded. Credentials are
  /// only included when both are set.
  pub fn url(&self, database: &str) -> String {
    let auth = match self.credentials() {
      Some((user, pass)) => format!(
        "{}:{}@",
        urlencoding::encode(user),
        urlencoding::encode(pass)
      ),
      None => String::new(),
    };
    format!(
      "{}://{auth}{}:{}/{}",
      self.scheme(),
      self.host,
      self.port,
      urlencoding::encode(database)
    )
  }
}
