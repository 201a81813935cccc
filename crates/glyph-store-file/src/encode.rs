//! Decoding of log entries, including entries written by older versions.
//!
//! Normalization happens here, at read time, so historical format drift
//! never requires rewriting the log:
//!
//! * a missing `model` reads as [`ModelTag::LEGACY`];
//! * a missing or `null` `confidence` reads as `0.0`;
//! * timestamps without an offset (`2024-05-01T12:00:00.123456`) are UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use glyph_core::record::{ModelTag, PredictionRecord, UserIdentity, clamp_confidence};
use serde::Deserialize;
use serde_json::Value;

/// A log entry as found on disk, with every drift-prone field optional.
#[derive(Debug, Deserialize)]
pub struct RawRecord {
  pub time:       String,
  pub user:       String,
  pub filename:   Option<String>,
  pub pred:       u8,
  pub confidence: Option<f64>,
  pub model:      Option<String>,
}

impl RawRecord {
  pub fn into_record(self) -> Option<PredictionRecord> {
    Some(PredictionRecord {
      time:       decode_dt(&self.time)?,
      user:       UserIdentity::new(self.user),
      filename:   self.filename,
      pred:       self.pred,
      confidence: clamp_confidence(self.confidence.unwrap_or(0.0)),
      model:      self.model.map(ModelTag::new).unwrap_or_default(),
    })
  }
}

/// Decode one array element; `None` (and a warning) if it is unusable.
pub fn decode_entry(value: &Value) -> Option<PredictionRecord> {
  let record = RawRecord::deserialize(value)
    .ok()
    .and_then(RawRecord::into_record);
  if record.is_none() {
    tracing::warn!("skipping unreadable prediction log entry: {value}");
  }
  record
}

pub fn decode_dt(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
    .or_else(|| {
      NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
    })
}
