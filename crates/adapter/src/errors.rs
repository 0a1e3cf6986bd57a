use docstore::StoreError;
use record::UnsupportedQuery;

/// An error from an [`Adapter`](crate::Adapter) operation.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AdapterError {
  /// The collection was never registered.
  #[error("collection `{0}` is not registered")]
  #[diagnostic(help("call `register_collection` at startup"))]
  UnknownCollection(String),
  /// The query shape is outside what the adapter supports.
  #[error(transparent)]
  #[diagnostic(transparent)]
  UnsupportedQuery(#[from] UnsupportedQuery),
  /// The store reported a missing database or document.
  #[error("not found: {reason}")]
  NotFound {
    /// The store's explanation.
    reason: String,
  },
  /// The write was based on a stale revision.
  #[error("revision conflict: {reason}")]
  #[diagnostic(help("re-read the record and retry with its current `rev`"))]
  Conflict {
    /// The store's explanation.
    reason: String,
  },
  /// The store still reports the view missing after it was provisioned.
  #[error("view `{view}` is missing even after being created")]
  IndexUnavailable {
    /// The view's name.
    view: String,
  },
  /// Any other store or transport failure, passed through.
  #[error(transparent)]
  #[diagnostic(transparent)]
  Store(StoreError),
}

impl AdapterError {
  /// Whether retrying after re-reading may succeed.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::Conflict { .. }) }
}

impl From<StoreError> for AdapterError {
  fn from(error: StoreError) -> Self {
    match error {
      StoreError::NotFound { reason } => Self::NotFound { reason },
      StoreError::Conflict { reason } => Self::Conflict { reason },
      other => Self::Store(other),
    }
  }
}

/// A result alias for [`AdapterError`].
pub type AdapterResult<T> = Result<T, AdapterError>;
