//! Error type for `glyph-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("unreadable row: {0}")]
  BadRow(String),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("stored label {0} is not a valid class index")]
  InvalidLabel(i64),
}

impl Error {
  /// Whether SQLite rejected the file itself as not a database or corrupt.
  pub(crate) fn is_unreadable_database(&self) -> bool {
    let Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))) =
      self
    else {
      return false;
    };
    matches!(e.code, rusqlite::ErrorCode::NotADatabase | rusqlite::ErrorCode::DatabaseCorrupt)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
