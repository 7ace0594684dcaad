//! Password gate for the admin endpoints.

use sha2::{Digest, Sha256};

use crate::config::AdminConfig;

/// Compares digests rather than raw strings so the comparison time does not
/// depend on how much of the password matched.
pub fn check_password(config: &AdminConfig, candidate: &str) -> bool {
    let Some(expected) = config.password.as_deref().filter(|p| !p.is_empty()) else {
        return false;
    };

    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(candidate.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
