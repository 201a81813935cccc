//! The `PredictionStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (`glyph-store-file`,
//! `glyph-store-sqlite`). Higher layers depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use serde::Deserialize;

use crate::record::{ModelTag, NewPrediction, PredictionRecord, UserIdentity};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`PredictionStore::query`]. All filters are exact matches;
/// an unset filter matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionQuery {
  pub user:  Option<UserIdentity>,
  pub pred:  Option<u8>,
  pub model: Option<ModelTag>,
  /// Maximum number of records to return; `None` returns all of them.
  pub limit: Option<usize>,
}

impl PredictionQuery {
  /// All of `user`'s records, newest first, up to `limit`.
  pub fn for_user(user: UserIdentity, limit: usize) -> Self {
    Self { user: Some(user), limit: Some(limit), ..Self::default() }
  }

  pub fn matches(&self, record: &PredictionRecord) -> bool {
    self.user.as_ref().is_none_or(|u| *u == record.user)
      && self.pred.is_none_or(|p| p == record.pred)
      && self.model.as_ref().is_none_or(|m| *m == record.model)
  }

  /// Filter an already newest-first sequence and apply the limit.
  pub fn apply<I>(&self, records: I) -> Vec<PredictionRecord>
  where
    I: IntoIterator<Item = PredictionRecord>,
  {
    records
      .into_iter()
      .filter(|r| self.matches(r))
      .take(self.limit.unwrap_or(usize::MAX))
      .collect()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a durable prediction log.
///
/// The log is append-only and ordered newest-first. There is no update or
/// delete operation.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait PredictionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append a prediction at the head of the log and return the stored record.
  ///
  /// The `time` field is assigned by the store while it holds exclusive
  /// access, and is never earlier than the current head's time. Concurrent
  /// inserts never lose one another.
  fn insert(
    &self,
    input: NewPrediction,
  ) -> impl Future<Output = Result<PredictionRecord, Self::Error>> + Send + '_;

  /// Append several predictions as one unit: either every input is stored,
  /// all with the same `time`, or none is. The last input ends up at the
  /// head of the log. Returns the records in input order.
  fn insert_many(
    &self,
    inputs: Vec<NewPrediction>,
  ) -> impl Future<Output = Result<Vec<PredictionRecord>, Self::Error>> + Send + '_;

  /// Records matching `query`, newest first.
  ///
  /// Readers always observe a fully-written snapshot of the log. Records
  /// written by older versions are normalized on the way out: a missing
  /// model tag reads as [`ModelTag::LEGACY`] and a missing confidence as
  /// `0.0`.
  fn query<'a>(
    &'a self,
    query: &'a PredictionQuery,
  ) -> impl Future<Output = Result<Vec<PredictionRecord>, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn record(user: &str, pred: u8, model: &str) -> PredictionRecord {
    NewPrediction {
      user: user.into(),
      filename: None,
      pred,
      confidence: 0.9,
      model: model.into(),
    }
    .into_record(Utc::now())
  }

  #[test]
  fn filters_combine_and_limit_applies_after_filtering() {
    let records = vec![
      record("a", 1, "mlp"),
      record("b", 1, "mlp"),
      record("a", 2, "cnn"),
      record("a", 1, "cnn"),
    ];

    let q = PredictionQuery {
      user: Some("a".into()),
      pred: Some(1),
      ..Default::default()
    };
    let hits = q.apply(records.clone());
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|r| r.user.as_str() == "a" && r.pred == 1));

    let limited = PredictionQuery::for_user("a".into(), 1).apply(records.clone());
    assert_eq!(limited, vec![records[0].clone()]);
  }

  #[test]
  fn unknown_user_matches_nothing() {
    let q = PredictionQuery::for_user("nobody".into(), 50);
    assert!(q.apply(vec![record("a", 3, "mlp")]).is_empty());
  }
}
