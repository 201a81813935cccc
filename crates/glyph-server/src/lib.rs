//! HTTP layer for Glyph.
//!
//! Exposes an axum [`Router`] over an [`Orchestrator`] and any
//! [`PredictionStore`]. Identity (Basic credentials or an anonymous session
//! cookie) is resolved here and handed to the core as an opaque
//! [`glyph_core::record::UserIdentity`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod links;
mod persist;
pub mod session;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  middleware,
  routing::{get, post},
};
use glyph_core::store::PredictionStore;
use glyph_onnx::BackendSpec;
use glyph_predict::Orchestrator;
use glyph_report::QrLevel;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::UserDirectory;
use handlers::{account, history, models, predict, share};
use links::ShareLinks;
use session::SessionKey;

/// Largest request body accepted, batch uploads included.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Which medium backs the prediction log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  #[default]
  File,
  Sqlite,
}

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                String,
  #[serde(default = "defaults::port")]
  pub port:                u16,
  #[serde(default = "defaults::base_url")]
  pub base_url:            String,
  #[serde(default)]
  pub store_backend:       StoreBackend,
  #[serde(default = "defaults::store_path")]
  pub store_path:          PathBuf,
  #[serde(default = "defaults::users_path")]
  pub users_path:          PathBuf,
  #[serde(default = "defaults::shares_path")]
  pub shares_path:         PathBuf,
  /// Keys share tokens and anonymous identities.
  pub share_secret:        String,
  #[serde(default = "defaults::history_limit")]
  pub history_limit:       usize,
  #[serde(default = "defaults::share_limit")]
  pub share_limit:         usize,
  #[serde(default = "defaults::qr_inline_max_bytes")]
  pub qr_inline_max_bytes: usize,
  #[serde(default)]
  pub qr_ec_level:         QrLevel,
  #[serde(default)]
  pub backends:            Vec<BackendSpec>,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "0.0.0.0".into() }
  pub fn port() -> u16 { 5000 }
  pub fn base_url() -> String { "http://localhost:5000".into() }
  pub fn store_path() -> PathBuf { "data/predictions.json".into() }
  pub fn users_path() -> PathBuf { "data/users.json".into() }
  pub fn shares_path() -> PathBuf { "data/shares.json".into() }
  pub fn history_limit() -> usize { 50 }
  pub fn share_limit() -> usize { 20 }
  pub fn qr_inline_max_bytes() -> usize { 1200 }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub orchestrator: Orchestrator<S>,
  pub users:        Arc<UserDirectory>,
  pub links:        Arc<ShareLinks>,
  pub sessions:     Arc<SessionKey>,
  pub config:       Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      orchestrator: self.orchestrator.clone(),
      users:        Arc::clone(&self.users),
      links:        Arc::clone(&self.links),
      sessions:     Arc::clone(&self.sessions),
      config:       Arc::clone(&self.config),
    }
  }
}

impl<S> AppState<S>
where
  S: PredictionStore,
{
  pub fn new(
    orchestrator: Orchestrator<S>,
    users:        UserDirectory,
    links:        ShareLinks,
    config:       ServerConfig,
  ) -> anyhow::Result<Self> {
    let sessions = SessionKey::new(&config.share_secret)
      .map_err(|e| anyhow::anyhow!("invalid share_secret: {e}"))?;
    Ok(Self {
      orchestrator,
      users:    Arc::new(users),
      links:    Arc::new(links),
      sessions: Arc::new(sessions),
      config:   Arc::new(config),
    })
  }

  pub fn store(&self) -> &S { self.orchestrator.store() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the prediction service.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: PredictionStore + 'static,
{
  Router::new()
    // Prediction
    .route("/predict",         post(predict::single::<S>))
    .route("/predict_batch",   post(predict::batch::<S>))
    // History views
    .route("/history",         get(history::list::<S>))
    .route("/export",          get(history::export::<S>))
    .route("/stats",           get(history::stats::<S>))
    .route("/generate_qr",     get(share::qr::<S>))
    .route("/shared/{token}",  get(share::shared::<S>))
    // Service info
    .route("/models",          get(models::list::<S>))
    // Accounts
    .route("/auth/register",   post(account::register::<S>))
    .route("/auth/login",      post(account::login::<S>))
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(middleware::from_fn(session::ensure_session))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
