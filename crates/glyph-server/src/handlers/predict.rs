//! Handlers for the prediction routes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/predict` | `{"image": "<data-uri>"}` or `{"pixels": [...], "width"?, "height"?}` |
//! | `POST` | `/predict_batch` | multipart, one `files` part per image |

use axum::{
  Json,
  extract::{Multipart, State},
};
use bytes::Bytes;
use glyph_core::{record::PredictionRecord, store::PredictionStore};
use glyph_predict::{BatchEntry, BatchItem};
use glyph_vision::ImageInput;
use serde_json::Value;

use super::json_body;
use crate::{AppState, auth::Identity, error::ApiError};

// ─── Single ───────────────────────────────────────────────────────────────────

/// `POST /predict`
pub async fn single<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  body: Bytes,
) -> Result<Json<Vec<PredictionRecord>>, ApiError>
where
  S: PredictionStore + 'static,
{
  let payload: Value = json_body(&body)?;
  let input = image_input(&payload)?;
  let records = state.orchestrator.run(input, &user, None).await?;
  Ok(Json(records))
}

/// Pull the image out of a `/predict` body.
fn image_input(payload: &Value) -> Result<ImageInput, ApiError> {
  if let Some(image) = payload.get("image") {
    return Ok(ImageInput::from_json(image)?);
  }

  let Some(pixels) = payload.get("pixels") else {
    return Err(ApiError::BadRequest("no image provided".into()));
  };
  match ImageInput::from_json(pixels)? {
    ImageInput::Pixels { values, width, height } => Ok(ImageInput::Pixels {
      values,
      width:  dimension(payload, "width")?.or(width),
      height: dimension(payload, "height")?.or(height),
    }),
    _ => Err(ApiError::BadRequest("`pixels` must be a numeric array".into())),
  }
}

fn dimension(payload: &Value, key: &str) -> Result<Option<usize>, ApiError> {
  match payload.get(key) {
    None | Some(Value::Null) => Ok(None),
    Some(v) => v
      .as_u64()
      .and_then(|n| usize::try_from(n).ok())
      .map(Some)
      .ok_or_else(|| ApiError::BadRequest(format!("`{key}` must be a non-negative integer"))),
  }
}

// ─── Batch ────────────────────────────────────────────────────────────────────

/// `POST /predict_batch`
pub async fn batch<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  mut multipart: Multipart,
) -> Result<Json<Vec<BatchEntry>>, ApiError>
where
  S: PredictionStore + 'static,
{
  let mut items = Vec::new();
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(e.body_text()))?
  {
    if field.name() != Some("files") {
      continue;
    }
    let filename = field.file_name().filter(|n| !n.is_empty()).map(str::to_owned);
    let bytes = field
      .bytes()
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    items.push(BatchItem { bytes: bytes.to_vec(), filename });
  }

  if items.is_empty() {
    return Err(ApiError::BadRequest("no files provided".into()));
  }

  tracing::debug!(user = %user, files = items.len(), "batch prediction");
  let entries = state.orchestrator.run_batch(items, &user).await?;
  Ok(Json(entries))
}
