//! Handlers for `/auth/register` and `/auth/login`.
//!
//! Accounts only name a history; requests authenticate per call with HTTP
//! Basic credentials. `login` checks a password without starting a session.

use axum::{Json, extract::State, http::StatusCode};
use bytes::Bytes;
use glyph_core::store::PredictionStore;
use serde::Deserialize;
use serde_json::{Value, json};

use super::json_body;
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
  pub username: Option<String>,
  pub password: Option<String>,
}

impl CredentialsBody {
  fn required(self) -> Result<(String, String), ApiError> {
    match (self.username, self.password) {
      (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => {
        if u.contains(':') {
          return Err(ApiError::BadRequest("username must not contain ':'".into()));
        }
        Ok((u, p))
      }
      _ => Err(ApiError::BadRequest("username and password are required".into())),
    }
  }
}

/// `POST /auth/register` → 201
pub async fn register<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: PredictionStore + 'static,
{
  let (username, password) = json_body::<CredentialsBody>(&body)?.required()?;
  state.users.register(&username, &password).await?;
  Ok((StatusCode::CREATED, Json(json!({ "user": username }))))
}

/// `POST /auth/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<Value>, ApiError>
where
  S: PredictionStore + 'static,
{
  let (username, password) = json_body::<CredentialsBody>(&body)?.required()?;
  state.users.verify(&username, &password).await?;
  Ok(Json(json!({ "user": username })))
}
