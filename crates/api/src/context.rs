use chrono::{DateTime, Utc};
use uuid::Uuid;

use keystone_auth::{AuthClaims, Principal};
use keystone_core::PrincipalId;

/// Correlation id assigned to every request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Principal context for a request (identity plus the grants carried by its token).
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    principal: Principal,
    expires_at: DateTime<Utc>,
}

impl PrincipalContext {
    pub fn from_claims(claims: AuthClaims) -> Self {
        let expires_at = claims.expires_at;
        Self {
            principal: claims.into_principal(),
            expires_at,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal.id()
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
