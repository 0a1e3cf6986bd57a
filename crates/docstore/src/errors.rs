/// An error reported by a document store.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum StoreError {
  /// The database, document, or view does not exist.
  #[error("not found: {reason}")]
  NotFound {
    /// The store's explanation.
    reason: String,
  },
  /// The write was based on a stale or missing revision.
  #[error("document update conflict: {reason}")]
  Conflict {
    /// The store's explanation.
    reason: String,
  },
  /// The resource being created already exists.
  #[error("already exists: {reason}")]
  AlreadyExists {
    /// The store's explanation.
    reason: String,
  },
  /// The store refused the request for another reason.
  #[error("store rejected request ({status} {error}): {reason}")]
  Rejected {
    /// HTTP-style status code.
    status: u16,
    /// Machine-readable error tag.
    error:  String,
    /// The store's explanation.
    reason: String,
  },
  /// The request never produced a store answer.
  #[error("transport error: {0}")]
  Transport(miette::Report),
}

impl StoreError {
  /// Builds a [`StoreError::NotFound`].
  pub fn not_found(reason: impl Into<String>) -> Self {
    Self::NotFound {
      reason: reason.into(),
    }
  }

  /// Builds a [`StoreError::Conflict`].
  pub fn conflict(reason: impl Into<String>) -> Self {
    Self::Conflict {
      reason: reason.into(),
    }
  }

  /// Whether the store reported a missing resource.
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

/// A result alias for [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;
