//! The `Classifier` capability and the registry of loaded backends.
//!
//! Concrete backends (e.g. `glyph-onnx`) implement [`Classifier`]. The server
//! builds one [`BackendRegistry`] at startup from whichever model artifacts
//! are present and hands it to the orchestrator; tests register in-process
//! fakes instead.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
  Result,
  record::ModelTag,
  tensor::{Layout, Tensor},
};

/// Number of labels in the digit domain.
pub const DIGIT_CLASSES: usize = 10;

// ─── Prediction ──────────────────────────────────────────────────────────────

/// The outcome of one classifier call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
  pub label:      u8,
  /// Probability mass at `label`; within `[0, 1]`.
  pub confidence: f64,
}

impl Prediction {
  /// Arg-max over a score vector.
  ///
  /// Scores that are not already a probability distribution (any negative
  /// entry, or a sum outside `1 ± 0.01`) are passed through a softmax first.
  /// Returns `None` for an empty vector, a non-finite score, or more classes
  /// than fit in a `u8` label.
  pub fn from_scores(scores: &[f32]) -> Option<Self> {
    if scores.is_empty()
      || scores.len() > usize::from(u8::MAX) + 1
      || scores.iter().any(|s| !s.is_finite())
    {
      return None;
    }

    let sum: f64 = scores.iter().map(|&s| f64::from(s)).sum();
    let is_distribution =
      scores.iter().all(|&s| s >= 0.0) && (sum - 1.0).abs() <= 0.01;

    let probs: Vec<f64> = if is_distribution {
      scores.iter().map(|&s| f64::from(s)).collect()
    } else {
      softmax(scores)
    };

    let (label, confidence) = probs
      .iter()
      .copied()
      .enumerate()
      .fold((0usize, f64::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

    Some(Self {
      label:      label as u8,
      confidence: confidence.clamp(0.0, 1.0),
    })
  }
}

fn softmax(scores: &[f32]) -> Vec<f64> {
  let max = scores.iter().copied().fold(f32::MIN, f32::max);
  let exps: Vec<f64> = scores.iter().map(|&s| f64::from(s - max).exp()).collect();
  let total: f64 = exps.iter().sum();
  exps.into_iter().map(|e| e / total).collect()
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A loaded, stateless classifier.
///
/// Implementations are invoked synchronously on a blocking thread; they must
/// not hold any per-call mutable state.
pub trait Classifier: Send + Sync {
  /// Tag written into every record this backend produces.
  fn tag(&self) -> &ModelTag;

  /// The tensor layout this backend consumes.
  fn layout(&self) -> Layout;

  /// Size of the label set; labels are `0..num_classes()`.
  fn num_classes(&self) -> usize { DIGIT_CLASSES }

  /// Classify one normalized tensor shaped per [`Classifier::layout`].
  fn predict(&self, tensor: &Tensor) -> Result<Prediction>;
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// The set of backends available to this process.
///
/// Cloning is cheap; backends are reference-counted.
#[derive(Clone, Default)]
pub struct BackendRegistry {
  backends: Vec<Arc<dyn Classifier>>,
}

impl BackendRegistry {
  pub fn new() -> Self { Self::default() }

  /// Add a backend. Returns `false` (and drops it) if its tag is taken.
  pub fn register(&mut self, backend: Arc<dyn Classifier>) -> bool {
    if self.backends.iter().any(|b| b.tag() == backend.tag()) {
      return false;
    }
    self.backends.push(backend);
    true
  }

  pub fn is_empty(&self) -> bool { self.backends.is_empty() }

  pub fn len(&self) -> usize { self.backends.len() }

  /// Backends in registration order.
  pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Classifier>> {
    self.backends.iter()
  }

  /// The distinct layouts the registered backends consume.
  pub fn layouts(&self) -> BTreeSet<Layout> {
    self.backends.iter().map(|b| b.layout()).collect()
  }
}

impl std::fmt::Debug for BackendRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_list()
      .entries(self.backends.iter().map(|b| (b.tag().as_str(), b.layout())))
      .finish()
  }
}
