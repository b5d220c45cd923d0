use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keystone_core::PrincipalId;

use crate::principal::Principal;

/// Token claims carrying a resolved principal (transport-agnostic).
///
/// Issued once per authentication or refresh; permission checks on later
/// requests read these claims instead of re-resolving roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Effective role names at issue time.
    pub roles: Vec<String>,

    /// Effective permission codes at issue time.
    pub permissions: Vec<String>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl AuthClaims {
    /// Claims valid from `now` for `ttl`.
    ///
    /// A non-positive `ttl` or one that runs past the representable calendar
    /// is refused rather than producing an unusable window.
    pub fn issue(principal: &Principal, now: DateTime<Utc>, ttl: Duration) -> Result<Self, TokenValidationError> {
        if ttl <= Duration::zero() {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenValidationError::LifetimeOutOfRange)?;
        Ok(Self {
            sub: principal.id(),
            roles: principal.roles().to_vec(),
            permissions: principal.permissions().to_vec(),
            issued_at: now,
            expires_at,
        })
    }

    pub fn into_principal(self) -> Principal {
        Principal::new(self.sub, self.roles, self.permissions)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token lifetime is out of range")]
    LifetimeOutOfRange,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate the claim time window.
///
/// Signature verification and decoding happen in a [`JwtValidator`].
pub fn validate_claims(claims: &AuthClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Decodes and verifies a bearer token into claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<AuthClaims, TokenValidationError>;
}
