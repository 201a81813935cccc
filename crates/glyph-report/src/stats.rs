//! Per-user summary statistics.

use std::collections::BTreeMap;

use glyph_core::record::{ModelTag, PredictionRecord};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
  pub total:    usize,
  /// Record count per predicted label.
  pub by_label: BTreeMap<u8, usize>,
  pub by_model: BTreeMap<ModelTag, ModelSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelSummary {
  pub count:           usize,
  pub mean_confidence: f64,
}

impl Summary {
  pub fn from_records(records: &[PredictionRecord]) -> Self {
    let mut summary = Self { total: records.len(), ..Self::default() };
    let mut confidence_sums: BTreeMap<&ModelTag, f64> = BTreeMap::new();

    for r in records {
      *summary.by_label.entry(r.pred).or_default() += 1;
      summary.by_model.entry(r.model.clone()).or_default().count += 1;
      *confidence_sums.entry(&r.model).or_default() += r.confidence;
    }
    for (model, entry) in &mut summary.by_model {
      let sum = confidence_sums.get(model).copied().unwrap_or(0.0);
      entry.mean_confidence = sum / entry.count as f64;
    }
    summary
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::record;

  #[test]
  fn empty_history() {
    let s = Summary::from_records(&[]);
    assert_eq!(s.total, 0);
    assert!(s.by_label.is_empty() && s.by_model.is_empty());
  }

  #[test]
  fn counts_and_means() {
    let mut records = vec![
      record(3, "mlp", None),
      record(3, "cnn", None),
      record(5, "cnn", None),
    ];
    records[2].confidence = 0.9;

    let s = Summary::from_records(&records);
    assert_eq!(s.total, 3);
    assert_eq!(s.by_label.get(&3), Some(&2));
    assert_eq!(s.by_label.get(&5), Some(&1));

    let cnn = &s.by_model[&ModelTag::from("cnn")];
    assert_eq!(cnn.count, 2);
    assert!((cnn.mean_confidence - 0.7).abs() < 1e-9);
    assert_eq!(s.by_model[&ModelTag::from("mlp")].count, 1);
  }

  #[test]
  fn serializes_with_string_keys() {
    let s = Summary::from_records(&[record(4, "mlp", None)]);
    let v = serde_json::to_value(&s).unwrap();
    assert_eq!(v["total"], 1);
    assert_eq!(v["by_label"]["4"], 1);
    assert_eq!(v["by_model"]["mlp"]["count"], 1);
  }
}
