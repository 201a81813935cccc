//! Handlers for the requesting user's own history.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/history` | `?limit` (default from config), `?pred`, `?model` |
//! | `GET`  | `/export` | CSV attachment of the whole history |
//! | `GET`  | `/stats` | [`Summary`] of the whole history |

use axum::{
  Json,
  extract::{Query, State},
  http::header,
  response::{IntoResponse, Response},
};
use glyph_core::{
  record::{ModelTag, PredictionRecord, UserIdentity},
  store::{PredictionQuery, PredictionStore},
};
use glyph_report::Summary;
use serde::Deserialize;

use crate::{AppState, auth::Identity, error::ApiError};

pub const EXPORT_FILENAME: &str = "predictions_export.csv";

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub limit: Option<usize>,
  pub pred:  Option<u8>,
  pub model: Option<ModelTag>,
}

/// `GET /history[?limit=50][&pred=7][&model=cnn]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<PredictionRecord>>, ApiError>
where
  S: PredictionStore + 'static,
{
  let query = PredictionQuery {
    user:  Some(user),
    pred:  params.pred,
    model: params.model,
    limit: Some(params.limit.unwrap_or(state.config.history_limit)),
  };
  let records = state.store().query(&query).await.map_err(ApiError::store)?;
  Ok(Json(records))
}

/// `GET /export`
pub async fn export<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
) -> Result<Response, ApiError>
where
  S: PredictionStore + 'static,
{
  let records = everything_for(&state, user).await?;
  let csv = glyph_report::to_csv(&records)?;
  Ok(
    (
      [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{EXPORT_FILENAME}\"")),
      ],
      csv,
    )
      .into_response(),
  )
}

/// `GET /stats`
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
) -> Result<Json<Summary>, ApiError>
where
  S: PredictionStore + 'static,
{
  let records = everything_for(&state, user).await?;
  Ok(Json(Summary::from_records(&records)))
}

async fn everything_for<S>(
  state: &AppState<S>,
  user:  UserIdentity,
) -> Result<Vec<PredictionRecord>, ApiError>
where
  S: PredictionStore,
{
  let query = PredictionQuery { user: Some(user), ..Default::default() };
  state.store().query(&query).await.map_err(ApiError::store)
}
