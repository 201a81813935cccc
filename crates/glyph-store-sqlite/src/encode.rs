//! Encoding and decoding helpers between Glyph records and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Nullable `model` and
//! `confidence` columns are normalized on read.

use chrono::{DateTime, NaiveDateTime, Utc};
use glyph_core::record::{ModelTag, PredictionRecord, UserIdentity, clamp_confidence};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .or_else(|_| {
      NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
    })
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A `predictions` row as read from SQLite.
pub struct RawRecord {
  pub time:       String,
  pub user_id:    String,
  pub filename:   Option<String>,
  pub pred:       i64,
  pub confidence: Option<f64>,
  pub model:      Option<String>,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      time:       row.get(0)?,
      user_id:    row.get(1)?,
      filename:   row.get(2)?,
      pred:       row.get(3)?,
      confidence: row.get(4)?,
      model:      row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<PredictionRecord> {
    Ok(PredictionRecord {
      time:       decode_dt(&self.time)?,
      user:       UserIdentity::new(self.user_id),
      filename:   self.filename,
      pred:       u8::try_from(self.pred).map_err(|_| Error::InvalidLabel(self.pred))?,
      confidence: clamp_confidence(self.confidence.unwrap_or(0.0)),
      model:      self.model.map(ModelTag::new).unwrap_or_default(),
    })
  }
}
