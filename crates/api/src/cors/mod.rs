//! Cross-origin admission.
//!
//! [`origin::decide`] is the pure decision over (origin, allowlist, mode);
//! [`layer::admit`] applies it to every request ahead of sessions and routing.

pub mod layer;
pub mod origin;

pub use origin::{decide, Allowlist, Decision};
