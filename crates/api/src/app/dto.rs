//! Request/response bodies that have no domain counterpart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_auth::{AuthClaims, PrincipalStatus};
use keystone_core::{GroupId, PrincipalId};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct CloneRoleRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPermissionRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertPrincipalRequest {
    pub username: String,
    #[serde(default)]
    pub status: PrincipalStatus,
}

/// `parent_id: null` moves the group to the root.
#[derive(Debug, Deserialize)]
pub struct SetParentRequest {
    pub parent_id: Option<GroupId>,
}

#[derive(Debug, Deserialize)]
pub struct NameAvailableQuery {
    pub name: String,
    pub parent_id: Option<GroupId>,
    pub except: Option<GroupId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMenusQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct PrincipalIdsRequest {
    pub principal_ids: Vec<PrincipalId>,
}

/// `limit` 0 or absent means the default page size.
#[derive(Debug, Default, Deserialize)]
pub struct RoleSearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub principal_id: PrincipalId,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub is_system_admin: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl TokenResponse {
    pub fn new(token: String, claims: AuthClaims) -> Self {
        Self {
            token,
            expires_at: claims.expires_at,
            roles: claims.roles,
            permissions: claims.permissions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionCatalogResponse {
    pub frozen: bool,
    pub permissions: Vec<PermissionEntry>,
}

#[derive(Debug, Serialize)]
pub struct PermissionEntry {
    pub code: String,
    /// `file:line` of each declaring gate.
    pub declared_at: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NameAvailableResponse {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub principal_id: PrincipalId,
    pub permission: String,
    pub granted: bool,
}
