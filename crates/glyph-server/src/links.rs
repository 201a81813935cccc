//! Share links handed out by the QR summary's URL mode.
//!
//! Tokens come from [`ShareSigner`] and carry no user. The token → user map
//! is persisted as one JSON object so links survive restarts.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use glyph_core::record::UserIdentity;
use glyph_report::ShareSigner;
use tokio::sync::RwLock;

use crate::{error::ApiError, persist};

pub struct ShareLinks {
  path:   PathBuf,
  signer: ShareSigner,
  links:  RwLock<BTreeMap<String, UserIdentity>>,
}

impl ShareLinks {
  /// Load the link map at `path`, creating an empty one if it is missing.
  pub fn open(path: impl AsRef<Path>, signer: ShareSigner) -> std::io::Result<Self> {
    let path = path.as_ref().to_path_buf();
    let links: BTreeMap<String, UserIdentity> = persist::load_or_create(&path)?;
    tracing::info!(links = links.len(), "share links loaded from {}", path.display());
    Ok(Self { path, signer, links: RwLock::new(links) })
  }

  pub fn token(&self, user: &UserIdentity) -> String { self.signer.token(user) }

  /// Make `token` resolvable to `user`. Already-known tokens are left alone.
  pub async fn remember(&self, token: &str, user: &UserIdentity) -> Result<(), ApiError> {
    if !self.signer.verify(token, user) {
      return Err(ApiError::Internal("share token does not match its owner".into()));
    }

    let mut links = self.links.write().await;
    if links.contains_key(token) {
      return Ok(());
    }

    let mut updated = links.clone();
    updated.insert(token.to_owned(), user.clone());
    persist::write_atomic(&self.path, &updated).map_err(ApiError::store)?;
    *links = updated;

    tracing::debug!(user = %user, "share link created");
    Ok(())
  }

  /// The owner of `token`, if it was handed out and still verifies under
  /// the current secret.
  pub async fn resolve(&self, token: &str) -> Option<UserIdentity> {
    let links = self.links.read().await;
    let user = links.get(token)?;
    self.signer.verify(token, user).then(|| user.clone())
  }
}
