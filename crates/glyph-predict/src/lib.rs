//! Prediction orchestration for Glyph.
//!
//! [`Orchestrator::run`] takes one raw image and an identity, normalizes the
//! image once per layout the loaded backends need, asks every backend for a
//! label, and appends one record per backend to the store.
//! [`Orchestrator::run_batch`] does the same for many images, isolating
//! per-image failures.

mod error;

pub use error::{Error, Result};

use std::sync::Arc;

use glyph_core::{
  classifier::{BackendRegistry, Prediction},
  record::{ModelTag, NewPrediction, PredictionRecord, UserIdentity},
  store::PredictionStore,
  tensor::IMAGE_SIDE,
};
use glyph_vision::{ImageInput, normalize_layouts};
use serde::Serialize;

// ─── Batch types ─────────────────────────────────────────────────────────────

/// One uploaded file in a batch request.
#[derive(Debug, Clone)]
pub struct BatchItem {
  pub bytes:    Vec<u8>,
  pub filename: Option<String>,
}

/// The outcome for one [`BatchItem`], in request order.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
  Predicted {
    filename: Option<String>,
    records:  Vec<PredictionRecord>,
  },
  Failed {
    filename: Option<String>,
    error:    String,
  },
}

impl BatchEntry {
  pub fn is_failed(&self) -> bool { matches!(self, Self::Failed { .. }) }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Runs images through every available backend and logs the results.
pub struct Orchestrator<S> {
  registry: BackendRegistry,
  store:    Arc<S>,
}

impl<S> Clone for Orchestrator<S> {
  fn clone(&self) -> Self {
    Self { registry: self.registry.clone(), store: Arc::clone(&self.store) }
  }
}

impl<S> Orchestrator<S>
where
  S: PredictionStore,
{
  pub fn new(registry: BackendRegistry, store: Arc<S>) -> Self {
    Self { registry, store }
  }

  pub fn registry(&self) -> &BackendRegistry { &self.registry }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Classify `input` with every backend and log one record per backend.
  ///
  /// Every backend runs before anything is written, and the records are
  /// written in one atomic store call, so a failure leaves no partial set of
  /// records behind.
  pub async fn run(
    &self,
    input:    ImageInput,
    user:     &UserIdentity,
    filename: Option<String>,
  ) -> Result<Vec<PredictionRecord>> {
    if self.registry.is_empty() {
      return Err(glyph_core::Error::NoBackendAvailable.into());
    }

    let registry = self.registry.clone();
    let predictions =
      tokio::task::spawn_blocking(move || classify(&registry, &input)).await??;

    let inputs = predictions
      .into_iter()
      .map(|(model, prediction)| NewPrediction {
        user: user.clone(),
        filename: filename.clone(),
        pred: prediction.label,
        confidence: prediction.confidence,
        model,
      })
      .collect();
    self.store.insert_many(inputs).await.map_err(|e| Error::Store(Box::new(e)))
  }

  /// Run each item independently.
  ///
  /// Only the absence of any backend fails the whole batch; every other
  /// failure is reported inline for the item that caused it.
  pub async fn run_batch(
    &self,
    items: Vec<BatchItem>,
    user:  &UserIdentity,
  ) -> Result<Vec<BatchEntry>> {
    if self.registry.is_empty() {
      return Err(glyph_core::Error::NoBackendAvailable.into());
    }

    let mut entries = Vec::with_capacity(items.len());
    for BatchItem { bytes, filename } in items {
      let entry = match self.run(ImageInput::Bytes(bytes), user, filename.clone()).await {
        Ok(records) => BatchEntry::Predicted { filename, records },
        Err(e) => {
          tracing::info!(user = %user, file = ?filename, "batch item failed: {e}");
          BatchEntry::Failed { filename, error: e.to_string() }
        }
      };
      entries.push(entry);
    }
    Ok(entries)
  }
}

/// Normalize once per needed layout and run every backend. Blocking.
fn classify(
  registry: &BackendRegistry,
  input:    &ImageInput,
) -> glyph_core::Result<Vec<(ModelTag, Prediction)>> {
  let tensors = normalize_layouts(input, IMAGE_SIDE, registry.layouts())?;

  registry
    .iter()
    .map(|backend| {
      let tensor = &tensors[&backend.layout()];
      let prediction = backend.predict(tensor)?;
      if usize::from(prediction.label) >= backend.num_classes()
        || !(0.0..=1.0).contains(&prediction.confidence)
      {
        return Err(glyph_core::Error::inference(
          backend.tag(),
          format!(
            "label {} / confidence {} outside the backend's range",
            prediction.label, prediction.confidence
          ),
        ));
      }
      tracing::debug!(model = %backend.tag(), label = prediction.label, "classified");
      Ok((backend.tag().clone(), prediction))
    })
    .collect()
}

#[cfg(test)]
mod tests;
