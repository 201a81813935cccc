//! Error types for `glyph-core`.

use thiserror::Error;

use crate::record::ModelTag;

#[derive(Debug, Error)]
pub enum Error {
  /// The input was none of: raw image bytes, a base64 data-URI, a decoded
  /// image, or a numeric pixel array.
  #[error("unsupported input type: {0}")]
  UnsupportedInputType(String),

  /// The input had a supported type but could not be decoded or resized.
  #[error("malformed image: {0}")]
  MalformedImage(String),

  #[error("no classifier backend is available")]
  NoBackendAvailable,

  #[error("backend {model} failed: {message}")]
  Inference { model: ModelTag, message: String },
}

impl Error {
  pub fn inference(model: &ModelTag, message: impl Into<String>) -> Self {
    Self::Inference { model: model.clone(), message: message.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
