//! Handlers for the QR summary and the shared history page it links to.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/generate_qr` | `?mode=auto\|json\|url`; PNG |
//! | `GET`  | `/shared/{token}` | HTML table of the token owner's recent records |

use axum::{
  extract::{Path, Query, State},
  http::header,
  response::{Html, IntoResponse, Response},
};
use glyph_core::store::{PredictionQuery, PredictionStore};
use glyph_report::{QrMode, QrPayload, qr::INLINE_RECORD_LIMIT, render_table, share::share_url};
use serde::Deserialize;

use crate::{AppState, auth::Identity, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct QrParams {
  #[serde(default)]
  pub mode: QrMode,
}

/// `GET /generate_qr[?mode=auto]`
pub async fn qr<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Query(params): Query<QrParams>,
) -> Result<Response, ApiError>
where
  S: PredictionStore + 'static,
{
  let records = state
    .store()
    .query(&PredictionQuery::for_user(user.clone(), INLINE_RECORD_LIMIT))
    .await
    .map_err(ApiError::store)?;

  let config = &state.config;
  let token = state.links.token(&user);
  let payload = QrPayload::choose(
    params.mode,
    &records,
    || share_url(&config.base_url, &token),
    config.qr_inline_max_bytes,
    config.qr_ec_level,
  )?;
  if payload.is_url() {
    state.links.remember(&token, &user).await?;
  }
  tracing::debug!(user = %user, url = payload.is_url(), "QR summary");

  let png = payload.render_png(config.qr_ec_level)?;
  Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// `GET /shared/{token}`
pub async fn shared<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
) -> Result<Html<String>, ApiError>
where
  S: PredictionStore + 'static,
{
  let user = state
    .links
    .resolve(&token)
    .await
    .ok_or_else(|| ApiError::NotFound("unknown share link".into()))?;

  let records = state
    .store()
    .query(&PredictionQuery::for_user(user.clone(), state.config.share_limit))
    .await
    .map_err(ApiError::store)?;
  Ok(Html(render_table(&user, &records)))
}
