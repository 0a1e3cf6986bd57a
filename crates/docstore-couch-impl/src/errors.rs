use docstore::{StoreError, StoreResult};
use miette::IntoDiagnostic;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};

#[derive(Default, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  error:  String,
  #[serde(default)]
  reason: String,
}

/// Maps a non-success HTTP reply onto the store error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> StoreError {
  let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
  let reason = if parsed.reason.is_empty() {
    body.to_owned()
  } else {
    parsed.reason
  };
  match status {
    StatusCode::NOT_FOUND => StoreError::NotFound { reason },
    StatusCode::CONFLICT => StoreError::Conflict { reason },
    StatusCode::PRECONDITION_FAILED => StoreError::AlreadyExists { reason },
    _ => StoreError::Rejected {
      status: status.as_u16(),
      error: parsed.error,
      reason,
    },
  }
}

pub(crate) trait IntoStoreError<T> {
  fn to_store_err(self) -> StoreResult<T>;
}

impl<T> IntoStoreError<T> for Result<T, reqwest::Error> {
  fn to_store_err(self) -> StoreResult<T> {
    self.into_diagnostic().map_err(StoreError::Transport)
  }
}

/// Fails on non-success statuses, passing the response through otherwise.
pub(crate) async fn check(
  response: reqwest::Response,
) -> StoreResult<reqwest::Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(status_error(status, &body))
}

/// Fails on non-success statuses, decoding the JSON body otherwise.
pub(crate) async fn read_json<T: DeserializeOwned>(
  response: reqwest::Response,
) -> StoreResult<T> {
  check(response).await?.json::<T>().await.to_store_err()
}
