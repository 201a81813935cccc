//! [`SqliteStore`]: the SQLite implementation of [`PredictionStore`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, Transaction};

use glyph_core::{
  record::{ModelTag, NewPrediction, PredictionRecord},
  store::{PredictionQuery, PredictionStore},
};

use crate::{
  Result,
  encode::{RawRecord, decode_dt, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A prediction log backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  ///
  /// A file SQLite cannot read as a database is moved aside to
  /// `<path>.corrupt-<micros>` and a fresh store is created in its place.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    match Self::open_file(path).await {
      Err(e) if e.is_unreadable_database() => {
        let aside = quarantine(path)?;
        tracing::warn!(
          "prediction database was unreadable ({e}); moved to {} and starting fresh",
          aside.display(),
        );
        Self::open_file(path).await
      }
      opened => opened,
    }
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn open_file(path: &Path) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `append` in one transaction with the stamp for the new rows.
  ///
  /// Reading the head and inserting happen in one call, so no other insert
  /// can land in between. If `append` fails the transaction rolls back.
  async fn append<T, F>(&self, append: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>, DateTime<Utc>) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let appended = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let head: Option<String> = tx
          .query_row(
            "SELECT time FROM predictions ORDER BY seq DESC LIMIT 1",
            [],
            |r| r.get(0),
          )
          .optional()?;

        let now  = Utc::now();
        let time = head
          .as_deref()
          .and_then(|s| decode_dt(s).ok())
          .map_or(now, |h| h.max(now));

        let appended = append(&tx, time)?;
        tx.commit()?;
        Ok(appended)
      })
      .await?;
    Ok(appended)
  }
}

fn insert_row(tx: &Transaction<'_>, record: &PredictionRecord) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO predictions (time, user_id, filename, pred, confidence, model)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_dt(record.time),
      record.user.as_str(),
      record.filename.as_deref(),
      i64::from(record.pred),
      record.confidence,
      record.model.as_str(),
    ],
  )?;
  Ok(())
}

/// Row-level failures that mean "this row is unreadable", as opposed to the
/// database failing underneath the query.
fn is_bad_row(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::FromSqlConversionFailure(..)
      | rusqlite::Error::InvalidColumnType(..)
      | rusqlite::Error::IntegralValueOutOfRange(..)
  )
}

/// Move an unreadable database (and any WAL sidecars) aside.
fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
  let stamp = Utc::now().timestamp_micros();
  let renamed = |suffix: &str| {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    name.push(format!(".corrupt-{stamp}"));
    path.with_file_name(name)
  };

  let aside = renamed("");
  std::fs::rename(path, &aside)?;
  for sidecar in ["-wal", "-shm"] {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(sidecar);
    let sidecar_path = path.with_file_name(name);
    if sidecar_path.exists() {
      std::fs::rename(&sidecar_path, renamed(sidecar))?;
    }
  }
  Ok(aside)
}

// ─── PredictionStore impl ────────────────────────────────────────────────────

impl PredictionStore for SqliteStore {
  type Error = crate::Error;

  async fn insert(&self, input: NewPrediction) -> Result<PredictionRecord> {
    let record = self
      .append(move |tx, time| {
        let record = input.into_record(time);
        insert_row(tx, &record)?;
        Ok(record)
      })
      .await?;

    tracing::debug!(user = %record.user, model = %record.model, pred = record.pred, "prediction logged");
    Ok(record)
  }

  async fn insert_many(&self, inputs: Vec<NewPrediction>) -> Result<Vec<PredictionRecord>> {
    let records = self
      .append(move |tx, time| {
        let records: Vec<PredictionRecord> =
          inputs.into_iter().map(|input| input.into_record(time)).collect();
        for record in &records {
          insert_row(tx, record)?;
        }
        Ok(records)
      })
      .await?;

    for record in &records {
      tracing::debug!(user = %record.user, model = %record.model, pred = record.pred, "prediction logged");
    }
    Ok(records)
  }

  async fn query(&self, query: &PredictionQuery) -> Result<Vec<PredictionRecord>> {
    let user  = query.user.as_ref().map(ToString::to_string);
    let pred  = query.pred.map(i64::from);
    let model = query.model.as_ref().map(ToString::to_string);
    let limit = query.limit.unwrap_or(usize::MAX);

    // The limit counts readable records, so it is applied while decoding
    // rather than in SQL.
    let records = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT time, user_id, filename, pred, confidence, model
           FROM predictions
           WHERE (?1 IS NULL OR user_id = ?1)
             AND (?2 IS NULL OR pred = ?2)
             AND (?3 IS NULL OR COALESCE(model, ?4) = ?3)
           ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map(
          rusqlite::params![user, pred, model, ModelTag::LEGACY],
          RawRecord::from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
          if records.len() >= limit {
            break;
          }
          let decoded = match row {
            Ok(raw) => raw.into_record(),
            Err(e) if is_bad_row(&e) => Err(crate::Error::BadRow(e.to_string())),
            Err(e) => return Err(e.into()),
          };
          match decoded {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("skipping unreadable prediction row: {e}"),
          }
        }
        Ok(records)
      })
      .await?;

    Ok(records)
  }
}
