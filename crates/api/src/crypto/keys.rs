//! Derivation of the two session keys from `SESSION_SECRET`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::KEY_LEN;

type HmacSha256 = Hmac<Sha256>;

const SIGNING_LABEL: &[u8] = b"matchday/session-cookie/v1";
const SEALING_LABEL: &[u8] = b"matchday/session-store/v1";

/// Fixed-size key buffer, zeroed on drop.
#[derive(Clone)]
pub struct KeyBytes([u8; KEY_LEN]);

impl KeyBytes {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for KeyBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyBytes([REDACTED])")
    }
}

/// Independent keys for cookie signing and record sealing.
///
/// Both are `HMAC-SHA256(secret, label)` with distinct labels, so a leaked
/// signing key reveals nothing about the sealing key and vice versa.
#[derive(Clone, Debug)]
pub struct SessionKeys {
    pub signing: KeyBytes,
    pub sealing: KeyBytes,
}

impl SessionKeys {
    pub fn derive(secret: &str) -> Self {
        Self {
            signing: derive_one(secret.as_bytes(), SIGNING_LABEL),
            sealing: derive_one(secret.as_bytes(), SEALING_LABEL),
        }
    }
}

fn derive_one(secret: &[u8], label: &[u8]) -> KeyBytes {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes keys of any length"));
    mac.update(label);
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    KeyBytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = SessionKeys::derive("a-long-enough-secret");
        let b = SessionKeys::derive("a-long-enough-secret");
        assert_eq!(a.signing.as_bytes(), b.signing.as_bytes());
        assert_eq!(a.sealing.as_bytes(), b.sealing.as_bytes());
    }

    #[test]
    fn signing_and_sealing_keys_differ() {
        let keys = SessionKeys::derive("a-long-enough-secret");
        assert_ne!(keys.signing.as_bytes(), keys.sealing.as_bytes());
    }

    #[test]
    fn different_secrets_give_different_keys() {
        let a = SessionKeys::derive("secret-number-one");
        let b = SessionKeys::derive("secret-number-two");
        assert_ne!(a.signing.as_bytes(), b.signing.as_bytes());
    }

    #[test]
    fn key_bytes_redacted_in_debug() {
        let keys = SessionKeys::derive("a-long-enough-secret");
        assert!(format!("{keys:?}").contains("REDACTED"));
    }
}
