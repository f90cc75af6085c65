//! AES-256-GCM-SIV sealing of session records before they reach the store.
//!
//! Each sealed value binds the session id as associated data, so a sealed
//! payload copied onto another id's row fails authentication.

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

use super::keys::KeyBytes;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Prefix that appears at the start of every sealed value.
pub const VERSION_PREFIX: &str = "v1";

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// AES-GCM-SIV encryption or decryption failed (wrong key, wrong id, or tampering).
    #[error("aead operation failed")]
    AeadFailure,

    /// The sealed string does not match `v1.<nonce>.<ciphertext>`.
    #[error("invalid sealed value format")]
    InvalidFormat,
}

/// Seals and opens records with a single store key.
#[derive(Clone)]
pub struct Sealer {
    cipher: Aes256GcmSiv,
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sealer([REDACTED])")
    }
}

impl Sealer {
    pub fn new(key: &KeyBytes) -> Self {
        Self {
            cipher: Aes256GcmSiv::new(key.as_bytes().into()),
        }
    }

    /// Encrypt `plaintext` for the record identified by `session_id`.
    ///
    /// Output: `v1.<base64url(nonce)>.<base64url(ciphertext+tag)>`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::AeadFailure`] on an internal AEAD error.
    pub fn seal(&self, session_id: &str, plaintext: &[u8]) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: session_id.as_bytes(),
                },
            )
            .map_err(|_| CipherError::AeadFailure)?;

        Ok(format!(
            "{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(ciphertext),
        ))
    }

    /// Decrypt a value produced by [`Sealer::seal`] for the same `session_id`.
    ///
    /// # Errors
    ///
    /// [`CipherError::InvalidFormat`] for malformed input,
    /// [`CipherError::AeadFailure`] when authentication fails.
    pub fn open(&self, session_id: &str, sealed: &str) -> Result<Vec<u8>, CipherError> {
        let mut parts = sealed.splitn(3, '.');
        let (Some(VERSION_PREFIX), Some(nonce), Some(ciphertext)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CipherError::InvalidFormat);
        };

        let nonce = URL_SAFE_NO_PAD
            .decode(nonce)
            .map_err(|_| CipherError::InvalidFormat)?;
        if nonce.len() != NONCE_LEN {
            return Err(CipherError::InvalidFormat);
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|_| CipherError::InvalidFormat)?;

        self.cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: session_id.as_bytes(),
                },
            )
            .map_err(|_| CipherError::AeadFailure)
    }
}
