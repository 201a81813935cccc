//! Prediction records, the unit of the Glyph history log.
//!
//! A record is an immutable claim that one backend classified one image as a
//! given label at a point in time. Records are never updated or deleted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Whose history a record belongs to.
///
/// Either an authenticated username or an anonymous session identifier. The
/// core never mints or interprets identities; it only compares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for UserIdentity {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

// ─── Model tag ───────────────────────────────────────────────────────────────

/// Names the classifier backend that produced a record (`mlp`, `cnn`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelTag(String);

impl ModelTag {
  /// Tag assigned to records written before multiple backends existed.
  pub const LEGACY: &'static str = "default";

  pub fn new(tag: impl Into<String>) -> Self { Self(tag.into()) }

  pub fn legacy() -> Self { Self(Self::LEGACY.to_owned()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for ModelTag {
  fn default() -> Self { Self::legacy() }
}

impl fmt::Display for ModelTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ModelTag {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One logged classifier invocation.
///
/// Field order is significant: it is the column order of CSV exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
  /// Server-assigned on insert; non-decreasing in insertion order.
  pub time:       DateTime<Utc>,
  pub user:       UserIdentity,
  /// `None` for canvas-drawn input.
  pub filename:   Option<String>,
  pub pred:       u8,
  /// Always within `[0, 1]`.
  pub confidence: f64,
  pub model:      ModelTag,
}

/// Input to [`PredictionStore::insert`](crate::store::PredictionStore::insert).
///
/// Carries everything but the timestamp, which the store assigns while it
/// holds its write lock.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
  pub user:       UserIdentity,
  pub filename:   Option<String>,
  pub pred:       u8,
  pub confidence: f64,
  pub model:      ModelTag,
}

impl NewPrediction {
  /// Stamp this prediction with `time`, clamping confidence into `[0, 1]`.
  pub fn into_record(self, time: DateTime<Utc>) -> PredictionRecord {
    PredictionRecord {
      time,
      user:       self.user,
      filename:   self.filename,
      pred:       self.pred,
      confidence: clamp_confidence(self.confidence),
      model:      self.model,
    }
  }
}

/// Clamp into `[0, 1]`; NaN becomes `0.0`.
pub fn clamp_confidence(c: f64) -> f64 {
  if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }
}
