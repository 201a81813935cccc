//! Error type for `glyph-report`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("QR encoding error: {0}")]
  Qr(#[from] qrcode::types::QrError),

  #[error("image encoding error: {0}")]
  Image(#[from] image::ImageError),

  #[error("invalid share secret: {0}")]
  Key(#[from] hmac::digest::InvalidLength),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
