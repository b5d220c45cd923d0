use serde::Serialize;

use keystone_core::{DomainError, PrincipalId};

use crate::principal::Principal;
use crate::roles::{Role, SYSTEM_ADMIN_ROLE};

/// Whether `principal` may use `code`.
///
/// The `system_admin` role grants every code and is checked before set
/// membership. Otherwise membership is case-insensitive. An empty code is
/// trivially granted.
///
/// - No IO
/// - No panics
pub fn has_permission(principal: &Principal, code: &str) -> bool {
    if code.is_empty() {
        return true;
    }
    if principal.is_system_admin() {
        return true;
    }
    principal.holds(code)
}

/// Like [`has_permission`], returning `Forbidden` when denied.
pub fn require_permission(principal: &Principal, code: &str) -> Result<(), DomainError> {
    if has_permission(principal, code) {
        return Ok(());
    }
    Err(DomainError::forbidden(format!("missing permission '{code}'")))
}

/// Returns `Forbidden` unless the principal holds one of `required`.
pub fn require_any_role(principal: &Principal, required: &[&str]) -> Result<(), DomainError> {
    if principal.has_any_role(required) {
        return Ok(());
    }
    Err(DomainError::forbidden(format!(
        "requires one of the roles {required:?}"
    )))
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    pub principal: PrincipalState,
    pub denial_reason: Option<DenialReason>,
}

/// Snapshot of the principal being checked.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub principal_id: PrincipalId,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    pub is_system_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    MissingPermission,
}

/// Explain why `required` is (or would be) granted or denied.
///
/// `known_roles` is the role catalogue used to suggest which roles would grant
/// the missing code; only effective roles are suggested.
pub fn explain_authorization(
    principal: &Principal,
    required: &str,
    known_roles: &[Role],
) -> AuthorizationExplanation {
    let state = PrincipalState {
        principal_id: principal.id(),
        roles: principal.roles().to_vec(),
        effective_permissions: principal.permissions().to_vec(),
        is_system_admin: principal.is_system_admin(),
    };

    if required.is_empty() {
        return AuthorizationExplanation {
            required_permission: String::new(),
            granted: true,
            reason: "No permission is required".to_string(),
            principal: state,
            denial_reason: None,
        };
    }

    if state.is_system_admin {
        return AuthorizationExplanation {
            required_permission: required.to_string(),
            granted: true,
            reason: format!("Principal holds the '{SYSTEM_ADMIN_ROLE}' role, which grants every permission"),
            principal: state,
            denial_reason: None,
        };
    }

    if principal.holds(required) {
        return AuthorizationExplanation {
            required_permission: required.to_string(),
            granted: true,
            reason: format!("Principal has permission '{required}' through an active role"),
            principal: state,
            denial_reason: None,
        };
    }

    let mut granting_roles: Vec<String> = known_roles
        .iter()
        .filter(|r| r.is_effective())
        .filter(|r| r.permissions.iter().any(|p| p.eq_ignore_ascii_case(required)))
        .map(|r| r.name.clone())
        .collect();
    granting_roles.sort();

    let mut suggestions = Vec::new();
    if !granting_roles.is_empty() {
        suggestions.push(format!(
            "Assign one of the roles that grant '{required}': {}",
            granting_roles.join(", ")
        ));
    }
    suggestions.push(format!("Add '{required}' to one of the principal's active roles"));
    suggestions.push(
        "Refresh the token if the role assignment changed after it was issued".to_string(),
    );

    AuthorizationExplanation {
        required_permission: required.to_string(),
        granted: false,
        reason: format!(
            "Principal does not have permission '{required}'. Current permissions: {:?}",
            state.effective_permissions
        ),
        principal: state,
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{required}'"),
            suggestions,
        }),
    }
}
