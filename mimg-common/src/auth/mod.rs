//! Credential hashing and verification
//!
//! Two-tier scheme: a fast SHA-256 digest is used purely as a unique lookup
//! index, while an adaptive salted hash is the actual security boundary.

pub mod hasher;
pub mod verifier;

pub use hasher::{fast_digest, generate_secret, SecretHasher, ADMIN_KEY_PREFIX, USER_KEY_PREFIX};
pub use verifier::{AuthFailure, AuthType, Principal, Verifier};
