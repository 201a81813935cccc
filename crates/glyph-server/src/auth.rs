//! Registered users, HTTP Basic verification, and the [`Identity`] extractor.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use glyph_core::{record::UserIdentity, store::PredictionStore};
use rand_core::OsRng;
use tokio::sync::RwLock;

use crate::{
  AppState,
  error::ApiError,
  persist,
  session::{ANONYMOUS_PREFIX, SessionId},
};

// ─── User directory ───────────────────────────────────────────────────────────

/// Usernames and their argon2 PHC hashes, persisted as one JSON object.
pub struct UserDirectory {
  path:  PathBuf,
  users: RwLock<BTreeMap<String, String>>,
}

impl UserDirectory {
  /// Load the directory at `path`, creating an empty one if it is missing.
  pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
    let path = path.as_ref().to_path_buf();
    let users: BTreeMap<String, String> = persist::load_or_create(&path)?;
    tracing::info!(users = users.len(), "user directory loaded from {}", path.display());
    Ok(Self { path, users: RwLock::new(users) })
  }

  /// Add `username`. Fails with `Conflict` if it is already taken and with
  /// `BadRequest` if it falls in the anonymous namespace.
  pub async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
    if username.starts_with(ANONYMOUS_PREFIX) {
      return Err(ApiError::BadRequest(format!(
        "usernames starting with {ANONYMOUS_PREFIX:?} are reserved"
      )));
    }
    let hash = hash_password(password)?;

    let mut users = self.users.write().await;
    if users.contains_key(username) {
      return Err(ApiError::Conflict(format!("user {username:?} already exists")));
    }

    let mut updated = users.clone();
    updated.insert(username.to_owned(), hash);
    persist::write_atomic(&self.path, &updated).map_err(ApiError::store)?;
    *users = updated;

    tracing::info!(user = username, "registered");
    Ok(())
  }

  /// Check a password. Unknown users are `NotFound`, bad passwords
  /// `WrongPassword`.
  pub async fn verify(&self, username: &str, password: &str) -> Result<(), ApiError> {
    let users = self.users.read().await;
    let stored = users
      .get(username)
      .ok_or_else(|| ApiError::NotFound(format!("user {username:?} not found")))?;

    let parsed = PasswordHash::new(stored)
      .map_err(|e| ApiError::Internal(format!("stored hash for {username:?}: {e}")))?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .map_err(|_| ApiError::WrongPassword)
  }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

// ─── Basic auth ───────────────────────────────────────────────────────────────

/// Resolve HTTP Basic credentials, if the request carries any.
///
/// `Ok(None)` means no `Authorization` header; any header that does not
/// verify against `users` is `Unauthorized`.
pub async fn verify_basic(
  headers: &HeaderMap,
  users:   &UserDirectory,
) -> Result<Option<UserIdentity>, ApiError> {
  let Some(header_val) = headers.get(axum::http::header::AUTHORIZATION) else {
    return Ok(None);
  };

  let encoded = header_val
    .to_str()
    .ok()
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded.trim()).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  users
    .verify(username, password)
    .await
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(Some(UserIdentity::new(username)))
}

// ─── Extractor ────────────────────────────────────────────────────────────────

/// Whose history a request reads and writes: the Basic-auth username if
/// present, otherwise the identity derived from the anonymous session.
#[derive(Debug, Clone)]
pub struct Identity(pub UserIdentity);

impl<S> FromRequestParts<AppState<S>> for Identity
where
  S: PredictionStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    if let Some(user) = verify_basic(&parts.headers, &state.users).await? {
      return Ok(Identity(user));
    }

    let SessionId(sid) = parts
      .extensions
      .get::<SessionId>()
      .copied()
      .ok_or(ApiError::Unauthorized)?;
    Ok(Identity(state.sessions.identity(sid)))
  }
}
