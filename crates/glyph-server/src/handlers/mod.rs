//! Route handlers, grouped by concern.

pub mod account;
pub mod history;
pub mod models;
pub mod predict;
pub mod share;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::ApiError;

/// Parse a JSON body, reporting malformed input as a 400 with a JSON error.
pub(crate) fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
  serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}
