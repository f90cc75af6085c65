//! Signed session-cookie values.
//!
//! Format: `s:<session id>.<base64url-no-pad(HMAC-SHA256(session id))>`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::keys::KeyBytes;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "s:";

/// Produce the cookie value for `session_id`.
pub fn sign(session_id: &str, key: &KeyBytes) -> String {
    let mut mac = mac_for(key);
    mac.update(session_id.as_bytes());
    let tag = mac.finalize().into_bytes();
    format!("{PREFIX}{session_id}.{}", URL_SAFE_NO_PAD.encode(tag))
}

/// Verify a cookie value and return the session id it carries.
///
/// Returns `None` for anything malformed or carrying a bad signature. The tag
/// comparison is constant-time.
pub fn unsign<'a>(value: &'a str, key: &KeyBytes) -> Option<&'a str> {
    let body = value.strip_prefix(PREFIX)?;
    let (session_id, tag) = body.rsplit_once('.')?;
    if session_id.is_empty() {
        return None;
    }
    let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

    let mut mac = mac_for(key);
    mac.update(session_id.as_bytes());
    mac.verify_slice(&tag).ok()?;
    Some(session_id)
}

fn mac_for(key: &KeyBytes) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes keys of any length"))
}
