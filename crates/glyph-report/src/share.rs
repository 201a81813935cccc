//! Opaque share tokens for the QR summary's URL mode.
//!
//! A token is the first 16 bytes of `HMAC-SHA256(secret, "share" ‖ 0 ‖ user)`
//! in lowercase hex. It names no user by itself: whoever serves
//! `/shared/{token}` keeps the token → user mapping and checks each lookup
//! against [`ShareSigner::verify`].

use glyph_core::record::UserIdentity;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::Result;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 16;
const SHARE_DOMAIN: &[u8] = b"share\0";

/// Mints and checks share tokens with one server secret.
#[derive(Clone)]
pub struct ShareSigner {
  mac: HmacSha256,
}

impl ShareSigner {
  pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
    Ok(Self { mac: HmacSha256::new_from_slice(secret.as_ref())? })
  }

  pub fn token(&self, user: &UserIdentity) -> String {
    hex::encode(&self.digest(user)[..TOKEN_BYTES])
  }

  /// Whether `token` was minted for `user` with this secret.
  pub fn verify(&self, token: &str, user: &UserIdentity) -> bool {
    let Ok(presented) = hex::decode(token) else {
      return false;
    };
    if presented.len() != TOKEN_BYTES {
      return false;
    }
    presented.ct_eq(&self.digest(user)[..TOKEN_BYTES]).into()
  }

  fn digest(&self, user: &UserIdentity) -> Vec<u8> {
    let mut mac = self.mac.clone();
    mac.update(SHARE_DOMAIN);
    mac.update(user.as_str().as_bytes());
    mac.finalize().into_bytes().to_vec()
  }
}

impl std::fmt::Debug for ShareSigner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ShareSigner").finish_non_exhaustive()
  }
}

/// `<base_url>/shared/<token>`.
pub fn share_url(base_url: &str, token: &str) -> String {
  format!("{}/shared/{token}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keyed(secret: &str) -> ShareSigner { ShareSigner::new(secret).unwrap() }

  #[test]
  fn token_verifies_for_its_user_only() {
    let signer = keyed("s3cret");
    let alice = UserIdentity::from("alice");
    let token = signer.token(&alice);
    assert!(signer.verify(&token, &alice));
    assert!(!signer.verify(&token, &"bob".into()));
    assert!(!keyed("other").verify(&token, &alice));
  }

  #[test]
  fn token_is_fixed_width_hex_and_carries_no_user() {
    let signer = keyed("s3cret");
    let user = UserIdentity::from("550e8400-e29b-41d4-a716-446655440000");
    let token = signer.token(&user);
    assert_eq!(token.len(), TOKEN_BYTES * 2);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert!(!token.contains("550e8400"));
    assert_eq!(token, signer.token(&user));
  }

  #[test]
  fn malformed_tokens_are_rejected() {
    let signer = keyed("s3cret");
    let alice = UserIdentity::from("alice");
    let token = signer.token(&alice);
    assert!(!signer.verify(&token[..token.len() - 2], &alice));
    assert!(!signer.verify(&format!("{token}00"), &alice));
    assert!(!signer.verify("not hex at all", &alice));
    assert!(!signer.verify("", &alice));
  }

  #[test]
  fn share_url_joins_cleanly() {
    assert_eq!(share_url("http://h:5000/", "ab12"), "http://h:5000/shared/ab12");
    assert_eq!(share_url("http://h:5000", "ab12"), "http://h:5000/shared/ab12");
  }
}
