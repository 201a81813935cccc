//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by a handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Missing or bad HTTP Basic credentials.
  #[error("unauthorized")]
  Unauthorized,

  /// A login attempt with the wrong password.
  #[error("wrong password")]
  WrongPassword,

  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  Unavailable(String),

  #[error("{0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized | ApiError::WrongPassword => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Internal(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<glyph_core::Error> for ApiError {
  fn from(e: glyph_core::Error) -> Self {
    use glyph_core::Error as E;
    match e {
      E::UnsupportedInputType(_) | E::MalformedImage(_) => Self::BadRequest(e.to_string()),
      E::NoBackendAvailable => Self::Unavailable(e.to_string()),
      E::Inference { .. } => Self::Internal(e.to_string()),
    }
  }
}

impl From<glyph_predict::Error> for ApiError {
  fn from(e: glyph_predict::Error) -> Self {
    match e {
      glyph_predict::Error::Core(e) => e.into(),
      glyph_predict::Error::Store(e) => Self::Store(e),
      glyph_predict::Error::Join(e) => Self::Internal(e.to_string()),
    }
  }
}

impl From<glyph_report::Error> for ApiError {
  fn from(e: glyph_report::Error) -> Self { Self::Internal(e.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!("{self}");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"glyph\""),
      );
    }
    res
  }
}
