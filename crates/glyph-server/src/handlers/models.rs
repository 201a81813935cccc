//! `GET /models`: the backends this process loaded.

use axum::{Json, extract::State};
use glyph_core::{record::ModelTag, store::PredictionStore, tensor::Layout};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ModelInfo {
  pub tag:     ModelTag,
  pub layout:  Layout,
  pub classes: usize,
}

pub async fn list<S>(State(state): State<AppState<S>>) -> Json<Vec<ModelInfo>>
where
  S: PredictionStore + 'static,
{
  let models = state
    .orchestrator
    .registry()
    .iter()
    .map(|b| ModelInfo { tag: b.tag().clone(), layout: b.layout(), classes: b.num_classes() })
    .collect();
  Json(models)
}
