//! Error type for `glyph-onnx`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No file at the configured artifact path. Not fatal: the backend is
  /// treated as unavailable.
  #[error("model artifact not found: {}", .0.display())]
  MissingArtifact(PathBuf),

  #[error("failed to load model {}: {message}", path.display())]
  Load { path: PathBuf, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
