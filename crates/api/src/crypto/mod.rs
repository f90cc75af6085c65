//! Cryptographic primitives for sessions.
//!
//! This module is free of HTTP and store dependencies. It provides:
//! - key derivation from `SESSION_SECRET` ([`keys`]),
//! - HMAC-SHA256 signed cookie values ([`signing`]),
//! - AES-256-GCM-SIV sealing of records at rest ([`cipher`]).
//!
//! # Sealed format
//!
//! ```text
//! v1.<base64url-no-pad(nonce)>.<base64url-no-pad(ciphertext+tag)>
//! ```

pub mod cipher;
pub mod keys;
pub mod signing;

pub use cipher::Sealer;
pub use keys::SessionKeys;

/// Byte length of every derived key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;
