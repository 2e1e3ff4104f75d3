// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! One-way salted password hashing (argon2id).

use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;

use super::AuthError;

/// Minimum accepted secret length for newly provisioned credentials.
const MIN_PASSWORD_LEN: usize = 8;

/// Hash a plaintext secret with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    if plain.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AuthError::StoreUnavailable(format!("argon2 hash: {e}")))?
        .to_string();
    Ok(hash)
}

/// Verify a plaintext secret against a stored hash.
///
/// A malformed stored hash is an infrastructure problem, not a wrong
/// password; it surfaces as a distinct error so the caller can fold it
/// without misreporting.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::StoreUnavailable(format!("bad password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong secret", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn short_password_is_rejected() {
        let err = hash_password("short").unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn malformed_stored_hash_is_not_a_wrong_password() {
        let err = verify_password("whatever", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }
}
