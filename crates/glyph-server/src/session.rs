//! Anonymous sessions.
//!
//! A request without usable credentials is identified by the UUID in its
//! `glyph_sid` cookie. [`ensure_session`] mints one when the cookie is absent
//! or unparsable and sets it on the response. The cookie value is a bearer
//! credential, so it never becomes a history key itself: [`SessionKey`]
//! derives an `anon-` identity from it.

use axum::{
  extract::Request,
  http::{HeaderMap, HeaderValue, header},
  middleware::Next,
  response::Response,
};
use glyph_core::record::UserIdentity;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "glyph_sid";

/// Prefix of every derived anonymous identity. Registered usernames may not
/// start with it.
pub const ANONYMOUS_PREFIX: &str = "anon-";

type HmacSha256 = Hmac<Sha256>;

const SESSION_DOMAIN: &[u8] = b"session\0";
const IDENTITY_BYTES: usize = 16;

/// Keyed derivation of anonymous identities from session ids.
#[derive(Clone)]
pub struct SessionKey {
  mac: HmacSha256,
}

impl SessionKey {
  pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, hmac::digest::InvalidLength> {
    Ok(Self { mac: HmacSha256::new_from_slice(secret.as_ref())? })
  }

  /// `anon-<hex(hmac(secret, sid))[..32]>`.
  pub fn identity(&self, sid: Uuid) -> UserIdentity {
    let mut mac = self.mac.clone();
    mac.update(SESSION_DOMAIN);
    mac.update(sid.as_bytes());
    let digest = mac.finalize().into_bytes();
    UserIdentity::new(format!("{ANONYMOUS_PREFIX}{}", hex::encode(&digest[..IDENTITY_BYTES])))
  }
}

impl std::fmt::Debug for SessionKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SessionKey").finish_non_exhaustive()
  }
}

/// The session UUID attached to every request by [`ensure_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub Uuid);

pub async fn ensure_session(mut req: Request, next: Next) -> Response {
  let existing = session_from_headers(req.headers());
  let sid = existing.unwrap_or_else(Uuid::new_v4);
  req.extensions_mut().insert(SessionId(sid));

  let mut res = next.run(req).await;

  if existing.is_none() {
    let cookie = format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax");
    match HeaderValue::from_str(&cookie) {
      Ok(v) => {
        res.headers_mut().append(header::SET_COOKIE, v);
      }
      Err(e) => tracing::warn!("could not set session cookie: {e}"),
    }
  }
  res
}

/// The session UUID from the request's cookies, if one is present and valid.
pub fn session_from_headers(headers: &HeaderMap) -> Option<Uuid> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|s| s.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == SESSION_COOKIE)
    .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}
