//! Error type for `glyph-store-file`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("failed to replace log file: {0}")]
  Persist(#[from] tempfile::PersistError),

  #[error("blocking task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("log path has no parent directory: {0}")]
  NoParent(std::path::PathBuf),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
