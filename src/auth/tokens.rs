// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Bearer token issuance and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with the service key.
//! Verification here is purely cryptographic (signature + expiry + token
//! class); refresh rotation state lives in the
//! [`RefreshTokenStore`](crate::storage::refresh_tokens) and is checked by
//! the session layer.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{self, CLOCK_SKEW_LEEWAY};

use super::claims::{AccessClaims, RefreshClaims};
use super::{AuthError, Role};

/// Token class discriminator values.
const TYP_ACCESS: &str = "access";
const TYP_REFRESH: &str = "refresh";

/// Issues and verifies the portal's bearer tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    /// Create a token service from the HS256 signing secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a short-lived access token embedding the resolved identity.
    pub fn issue_access_token(
        &self,
        user_id: &str,
        role: Role,
        phone: &str,
        token_version: u32,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = AccessClaims {
            sub: user_id.to_string(),
            role,
            phone: phone.to_string(),
            tv: token_version,
            iat: now.timestamp(),
            exp: (now + config::access_token_ttl()).timestamp(),
            typ: TYP_ACCESS.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::StoreUnavailable(format!("token signing: {e}")))
    }

    /// Issue a refresh token with a fresh `jti` correlating it to its
    /// persisted record. Returns `(signed_token, token_id)`.
    pub fn issue_refresh_token(
        &self,
        user_id: &str,
        role: Role,
        token_version: u32,
        now: DateTime<Utc>,
    ) -> Result<(String, String), AuthError> {
        let token_id = Uuid::new_v4().to_string();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            role,
            tv: token_version,
            jti: token_id.clone(),
            iat: now.timestamp(),
            exp: (now + config::refresh_token_ttl()).timestamp(),
            typ: TYP_REFRESH.to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::StoreUnavailable(format!("token signing: {e}")))?;
        Ok((token, token_id))
    }

    /// Verify an access token: signature, expiry and token class.
    ///
    /// Stateless - no store lookup. This is the per-request hot path.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims: AccessClaims = self.decode_checked(token)?;
        if claims.typ != TYP_ACCESS {
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    /// Verify a refresh token's signature, expiry and token class.
    ///
    /// Rotation-state checks (revoked, reused, stale version) are the
    /// session layer's job; this only proves the token was ours.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshClaims = self.decode_checked(token)?;
        if claims.typ != TYP_REFRESH {
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    fn decode_checked<C: serde::de::DeserializeOwned>(
        &self,
        token: &str,
    ) -> Result<C, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;

        decode::<C>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }
}

/// Hex-encoded SHA-256 digest of a token.
///
/// Refresh and reset tokens are stored as digests only; the raw value never
/// touches the database.
pub fn sha256_hex(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Generate a high-entropy opaque token (256-bit, base64url).
///
/// Used for password-reset tokens, which are a separate single-use
/// mechanism from session JWTs.
pub fn new_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}
