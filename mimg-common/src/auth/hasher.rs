//! Secret hashing primitives
//!
//! `fast_digest` gives O(1) row lookup without evaluating the adaptive hash
//! for every stored key; only the matched row's slow hash is then verified.
//! The fast digest is never compared as a credential on its own.

use crate::{Error, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, Params, PasswordHasher, PasswordVerifier};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix for operator-minted admin keys
pub const ADMIN_KEY_PREFIX: &str = "mimg-";
/// Prefix for per-user API keys
pub const USER_KEY_PREFIX: &str = "uimg-";

/// Random bytes per generated secret (hex-encoded in the raw key)
const SECRET_BYTES: usize = 24;

// ========================================
// Fast digest (lookup index)
// ========================================

/// Deterministic SHA-256 digest of a raw secret, as 64 lowercase hex chars.
///
/// Used only as a unique index into the key tables, never as the
/// verification boundary.
///
/// # Examples
///
/// ```
/// use mimg_common::auth::fast_digest;
///
/// let d = fast_digest("mimg-abc123");
/// assert_eq!(d.len(), 64);
/// assert_eq!(d, fast_digest("mimg-abc123"));
/// assert_ne!(d, fast_digest("mimg-abc124"));
/// ```
pub fn fast_digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ========================================
// Slow adaptive hash (security boundary)
// ========================================

/// Adaptive salted hasher (Argon2id) with a configurable work factor
#[derive(Clone)]
pub struct SecretHasher {
    argon2: Argon2<'static>,
}

impl SecretHasher {
    /// Hasher with OWASP minimum parameters: m=19456 KiB, t=2, p=1
    pub fn new() -> Self {
        let params = Params::new(19456, 2, 1, None).expect("valid argon2 params");
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }

    /// Hasher with explicit cost parameters (tests, tuning)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| Error::Hash(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        })
    }

    /// Hash a raw secret with a fresh random salt.
    ///
    /// Output embeds salt and parameters (PHC string); two calls on the same
    /// input produce different strings.
    pub fn slow_hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| Error::Hash(e.to_string()))
    }

    /// Verify a raw secret against a stored slow hash.
    ///
    /// Parameters and salt come from the hash string itself. An unparseable
    /// stored hash verifies as false.
    pub fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self::new()
    }
}

// ========================================
// Key generation
// ========================================

/// Generate a raw secret: `prefix` + 48 hex chars of crypto randomness.
///
/// The raw secret is handed to the caller exactly once; only its fast digest
/// and slow hash are ever persisted.
pub fn generate_secret(prefix: &str) -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut out = String::with_capacity(prefix.len() + SECRET_BYTES * 2);
    out.push_str(prefix);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

// ========================================
// Tests
// ========================================
