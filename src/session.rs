// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Session orchestration: login, refresh, logout and password reset.
//!
//! This layer wires credential resolution, password verification, token
//! issuance, refresh rotation, rate limiting and audit logging into the
//! four operations the HTTP surface exposes. It owns the security policy;
//! the layers below it are mechanism only.
//!
//! ## Enumeration resistance
//!
//! An unknown identifier and a wrong password both produce
//! [`AuthError::InvalidCredentials`]. When no identity resolves, the
//! password is still verified against a fixed dummy hash so the two paths
//! cost roughly the same. Password-reset requests are success-shaped
//! whether or not the identifier exists.
//!
//! ## Reuse detection
//!
//! Presenting a refresh token whose record is already revoked is treated
//! as theft evidence regardless of how it was revoked: the user's token
//! version is bumped and every outstanding session is revoked.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::audit::{SecurityEvent, SecurityEventType, SecurityLog};
use crate::auth::claims::RefreshClaims;
use crate::auth::tokens::{new_opaque_token, sha256_hex, TokenService};
use crate::auth::{password, AuthError, Role};
use crate::config;
use crate::identity::{CredentialResolver, IdentityDirectory, ResolvedIdentity};
use crate::ratelimit::{Decision, RateLimitAction, RateLimiter};
use crate::storage::{RefreshTokenRecord, RefreshTokenStore, RotateOutcome, StoreError};

/// Well-formed argon2id hash matching no password. Verified against when an
/// identifier does not resolve, so both rejection paths do comparable work.
const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$\
MDEyMzQ1Njc4OWFiY2RlZg$WcfTmBFELdX6yWPAyGidEwwmwO5BIhhmY0uWmm8FqzY";

/// Request-scoped client attribution, carried into records and events.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent,
        }
    }
}

/// A freshly issued token pair plus the identity it belongs to.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
}

/// Outcome of a password-reset request.
///
/// Always success-shaped. The raw token is surfaced only in `dev` builds;
/// production delivery goes through [`ResetDelivery`].
#[derive(Debug, Clone, Default)]
pub struct ResetOutcome {
    #[cfg(feature = "dev")]
    pub reset_token: Option<String>,
}

/// Delivery channel for password-reset tokens.
///
/// The default implementation only logs that a token was issued; a real
/// deployment plugs in SMS or email here.
pub trait ResetDelivery: Send + Sync {
    fn deliver(&self, phone: &str, name: &str, token: &str);
}

/// Logs reset issuance without the token itself.
pub struct LogResetDelivery;

impl ResetDelivery for LogResetDelivery {
    fn deliver(&self, phone: &str, _name: &str, _token: &str) {
        info!(phone = %phone, "Password reset token issued");
    }
}

/// The session layer. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct SessionService {
    tokens: Arc<TokenService>,
    resolver: CredentialResolver,
    directory: Arc<IdentityDirectory>,
    refresh_store: RefreshTokenStore,
    limiter: RateLimiter,
    security_log: SecurityLog,
    reset_delivery: Arc<dyn ResetDelivery>,
}

impl SessionService {
    pub fn new(
        tokens: Arc<TokenService>,
        resolver: CredentialResolver,
        directory: Arc<IdentityDirectory>,
        refresh_store: RefreshTokenStore,
        limiter: RateLimiter,
        security_log: SecurityLog,
        reset_delivery: Arc<dyn ResetDelivery>,
    ) -> Self {
        Self {
            tokens,
            resolver,
            directory,
            refresh_store,
            limiter,
            security_log,
            reset_delivery,
        }
    }

    /// Authenticate an identifier/password pair and open a session.
    pub fn login(
        &self,
        identifier: &str,
        secret: &str,
        client: &ClientInfo,
    ) -> Result<SessionTokens, AuthError> {
        self.enforce_limit(RateLimitAction::Login, client)?;

        let resolved = self.resolver.resolve(identifier).map_err(store_err)?;
        let Some(identity) = resolved else {
            // Equalize cost with the wrong-password path.
            let _ = password::verify_password(secret, DUMMY_PASSWORD_HASH);
            self.security_log.log(
                &SecurityEvent::new(SecurityEventType::LoginFailure, &client.ip)
                    .with_agent(client.user_agent.clone())
                    .with_detail("identifier did not resolve"),
            );
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(secret, &identity.password_hash)? {
            self.security_log.log(
                &SecurityEvent::new(SecurityEventType::LoginFailure, &client.ip)
                    .with_user(&identity.user_id, identity.role)
                    .with_agent(client.user_agent.clone())
                    .with_detail("password mismatch"),
            );
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.open_session(&identity, client)?;
        self.security_log.log(
            &SecurityEvent::new(SecurityEventType::LoginSuccess, &client.ip)
                .with_user(&identity.user_id, identity.role)
                .with_agent(client.user_agent.clone()),
        );
        Ok(session)
    }

    /// Rotate a refresh token into a new session token pair.
    pub fn refresh(
        &self,
        raw_refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<SessionTokens, AuthError> {
        let now = Utc::now();
        self.enforce_limit(RateLimitAction::Refresh, client)?;

        let claims = self.tokens.verify_refresh_token(raw_refresh_token)?;
        let presented_hash = sha256_hex(raw_refresh_token);

        // Check the record state before the token version: a replayed token
        // is theft evidence even after a version bump has staled it.
        let record = self
            .refresh_store
            .get(&claims.jti)
            .map_err(store_err)?
            .ok_or_else(|| {
                self.security_log.log(
                    &SecurityEvent::new(SecurityEventType::SuspiciousActivity, &client.ip)
                        .with_user(&claims.sub, claims.role)
                        .with_agent(client.user_agent.clone())
                        .with_detail("refresh token has no matching record"),
                );
                AuthError::TokenInvalid
            })?;
        if record.token_hash != presented_hash {
            self.security_log.log(
                &SecurityEvent::new(SecurityEventType::SuspiciousActivity, &client.ip)
                    .with_user(&claims.sub, claims.role)
                    .with_agent(client.user_agent.clone())
                    .with_detail("refresh token digest mismatch"),
            );
            return Err(AuthError::TokenInvalid);
        }
        if record.revoked_at.is_some() {
            self.respond_to_reuse(&claims, client)?;
            return Err(AuthError::TokenReuseDetected);
        }

        let current_version = self
            .directory
            .read_token_version(&claims.sub, claims.role)
            .map_err(store_err)?
            .ok_or(AuthError::TokenInvalid)?;
        if claims.tv != current_version {
            return Err(AuthError::TokenVersionStale);
        }

        let identity = self
            .directory
            .get(&claims.sub, claims.role)
            .map_err(store_err)?
            .ok_or(AuthError::TokenInvalid)?;

        let (new_refresh, new_token_id) =
            self.tokens
                .issue_refresh_token(&claims.sub, claims.role, current_version, now)?;
        let new_record = RefreshTokenRecord {
            token_id: new_token_id,
            token_hash: sha256_hex(&new_refresh),
            user_id: claims.sub.clone(),
            role: claims.role,
            issued_at: now,
            expires_at: now + config::refresh_token_ttl(),
            revoked_at: None,
            replaced_by: None,
            client_ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
        };

        // The rotation re-checks record state inside one write transaction,
        // so a concurrent racer still loses here with `AlreadyRevoked`.
        let outcome = self
            .refresh_store
            .rotate(&claims.jti, &presented_hash, now, &new_record)
            .map_err(store_err)?;

        match outcome {
            RotateOutcome::Rotated => {
                let access_token = self.tokens.issue_access_token(
                    &claims.sub,
                    claims.role,
                    &identity.phone,
                    current_version,
                    now,
                )?;
                self.security_log.log(
                    &SecurityEvent::new(SecurityEventType::TokenRefresh, &client.ip)
                        .with_user(&claims.sub, claims.role)
                        .with_agent(client.user_agent.clone()),
                );
                Ok(SessionTokens {
                    access_token,
                    refresh_token: new_refresh,
                    user_id: identity.user_id,
                    name: identity.name,
                    phone: identity.phone,
                    role: identity.role,
                })
            }
            RotateOutcome::AlreadyRevoked => {
                self.respond_to_reuse(&claims, client)?;
                Err(AuthError::TokenReuseDetected)
            }
            RotateOutcome::Unknown => {
                self.security_log.log(
                    &SecurityEvent::new(SecurityEventType::SuspiciousActivity, &client.ip)
                        .with_user(&claims.sub, claims.role)
                        .with_agent(client.user_agent.clone())
                        .with_detail("refresh token has no matching record"),
                );
                Err(AuthError::TokenInvalid)
            }
            RotateOutcome::Expired => Err(AuthError::TokenExpired),
        }
    }

    /// Close the session the refresh cookie belongs to.
    ///
    /// Never fails from the caller's view: a missing, invalid or already
    /// revoked token still results in cleared cookies client-side.
    pub fn logout(&self, raw_refresh_token: Option<&str>, client: &ClientInfo) {
        let now = Utc::now();
        let Some(raw) = raw_refresh_token else {
            return;
        };
        let Ok(claims) = self.tokens.verify_refresh_token(raw) else {
            return;
        };

        match self.refresh_store.revoke(&claims.jti, now) {
            Ok(true) => {
                self.security_log.log(
                    &SecurityEvent::new(SecurityEventType::LoggedOut, &client.ip)
                        .with_user(&claims.sub, claims.role)
                        .with_agent(client.user_agent.clone()),
                );
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Logout revocation failed");
            }
        }
    }

    /// Issue a password-reset token if the identifier resolves.
    ///
    /// The outcome is identical either way, so the endpoint cannot be used
    /// to probe which identifiers are registered.
    pub fn password_reset_request(
        &self,
        identifier: &str,
        client: &ClientInfo,
    ) -> Result<ResetOutcome, AuthError> {
        let now = Utc::now();
        self.enforce_limit(RateLimitAction::PasswordReset, client)?;

        let resolved = self.resolver.resolve(identifier).map_err(store_err)?;
        let Some(identity) = resolved else {
            return Ok(ResetOutcome::default());
        };

        let raw_token = new_opaque_token();
        let digest = sha256_hex(&raw_token);
        self.directory
            .store_reset_token(
                &identity.user_id,
                identity.role,
                &digest,
                now + config::reset_token_ttl(),
            )
            .map_err(store_err)?;

        self.reset_delivery
            .deliver(&identity.phone, &identity.name, &raw_token);
        self.security_log.log(
            &SecurityEvent::new(SecurityEventType::PasswordResetRequested, &client.ip)
                .with_user(&identity.user_id, identity.role)
                .with_agent(client.user_agent.clone()),
        );

        #[cfg(feature = "dev")]
        {
            return Ok(ResetOutcome {
                reset_token: Some(raw_token),
            });
        }
        #[cfg(not(feature = "dev"))]
        Ok(ResetOutcome::default())
    }

    /// Issue a token pair for a verified identity and persist the refresh
    /// record.
    fn open_session(
        &self,
        identity: &ResolvedIdentity,
        client: &ClientInfo,
    ) -> Result<SessionTokens, AuthError> {
        let now = Utc::now();
        let access_token = self.tokens.issue_access_token(
            &identity.user_id,
            identity.role,
            &identity.phone,
            identity.token_version,
            now,
        )?;
        let (refresh_token, token_id) = self.tokens.issue_refresh_token(
            &identity.user_id,
            identity.role,
            identity.token_version,
            now,
        )?;

        let record = RefreshTokenRecord {
            token_id,
            token_hash: sha256_hex(&refresh_token),
            user_id: identity.user_id.clone(),
            role: identity.role,
            issued_at: now,
            expires_at: now + config::refresh_token_ttl(),
            revoked_at: None,
            replaced_by: None,
            client_ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
        };
        self.refresh_store.insert(&record).map_err(store_err)?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            user_id: identity.user_id.clone(),
            name: identity.name.clone(),
            phone: identity.phone.clone(),
            role: identity.role,
        })
    }

    /// Theft response: invalidate every token the victim holds.
    fn respond_to_reuse(
        &self,
        claims: &RefreshClaims,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        self.security_log.log(
            &SecurityEvent::new(SecurityEventType::TokenReuseDetected, &client.ip)
                .with_user(&claims.sub, claims.role)
                .with_agent(client.user_agent.clone())
                .with_detail("revoked refresh token presented again"),
        );

        let new_version = self
            .directory
            .bump_token_version(&claims.sub, claims.role)
            .map_err(store_err)?;
        let revoked = self
            .refresh_store
            .revoke_all_for_user(&claims.sub, Utc::now())
            .map_err(store_err)?;

        self.security_log.log(
            &SecurityEvent::new(SecurityEventType::SessionsRevoked, &client.ip)
                .with_user(&claims.sub, claims.role)
                .with_detail(format!(
                    "revoked {revoked} sessions, token version now {new_version}"
                )),
        );
        Ok(())
    }

    fn enforce_limit(
        &self,
        action: RateLimitAction,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        match self.limiter.check(action, &client.ip, Utc::now()) {
            Decision::Allowed => Ok(()),
            Decision::Limited { retry_after } => {
                self.security_log.log(
                    &SecurityEvent::new(SecurityEventType::RateLimited, &client.ip)
                        .with_detail(action.tag()),
                );
                Err(AuthError::RateLimited { retry_after })
            }
        }
    }
}

fn store_err(e: StoreError) -> AuthError {
    tracing::error!(error = %e, "Auth store unavailable");
    AuthError::StoreUnavailable(e.to_string())
}
