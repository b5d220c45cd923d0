//! RBAC resolution: from role assignments to an effective permission set.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use keystone_core::{DomainError, PrincipalId};

use crate::principal::{Principal, PrincipalDirectory};
use crate::roles::Role;

/// Role assignments of a principal (persistence collaborator).
///
/// Returns every assigned role, including inactive and soft-deleted ones; the
/// resolver does the filtering.
pub trait RoleAssignments: Send + Sync {
    fn roles_for_principal(&self, principal: PrincipalId) -> Result<Vec<Role>, DomainError>;
}

impl<S> RoleAssignments for Arc<S>
where
    S: RoleAssignments + ?Sized,
{
    fn roles_for_principal(&self, principal: PrincipalId) -> Result<Vec<Role>, DomainError> {
        (**self).roles_for_principal(principal)
    }
}

/// Effective role names and permission codes, both deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveGrants {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Fold assigned roles into grants. Inactive and soft-deleted roles grant
/// nothing; names and codes are trimmed and blanks skipped.
pub fn effective_grants<'a, I>(roles: I) -> EffectiveGrants
where
    I: IntoIterator<Item = &'a Role>,
{
    let mut names = BTreeSet::new();
    let mut codes = BTreeSet::new();

    for role in roles.into_iter().filter(|r| r.is_effective()) {
        let name = role.name.trim();
        if !name.is_empty() {
            names.insert(name.to_string());
        }
        for code in &role.permissions {
            let code = code.trim();
            if !code.is_empty() {
                codes.insert(code.to_string());
            }
        }
    }

    EffectiveGrants {
        roles: names.into_iter().collect(),
        permissions: codes.into_iter().collect(),
    }
}

/// Effective grants of an active principal, read straight from the
/// collaborators.
///
/// Unknown principals are `NotFound`; inactive, locked or pending accounts
/// are `Forbidden`. Every caller that evaluates a principal's current
/// assignments goes through here.
pub fn resolve_active<D, A>(
    directory: &D,
    assignments: &A,
    id: PrincipalId,
) -> Result<EffectiveGrants, DomainError>
where
    D: PrincipalDirectory + ?Sized,
    A: RoleAssignments + ?Sized,
{
    let account = directory
        .account(id)?
        .ok_or_else(|| DomainError::not_found(format!("principal {id}")))?;

    if !account.is_active() {
        tracing::info!(principal_id = %id, status = %account.status, "refusing to resolve inactive principal");
        return Err(DomainError::forbidden(format!(
            "principal {id} is {}",
            account.status
        )));
    }

    let roles = assignments.roles_for_principal(id)?;
    let grants = effective_grants(&roles);
    tracing::debug!(
        principal_id = %id,
        assigned = roles.len(),
        roles = grants.roles.len(),
        permissions = grants.permissions.len(),
        "resolved effective permissions"
    );
    Ok(grants)
}

/// Computes a principal's effective grants at authentication or refresh time.
pub struct PermissionResolver<D, A> {
    directory: D,
    assignments: A,
}

impl<D, A> PermissionResolver<D, A>
where
    D: PrincipalDirectory,
    A: RoleAssignments,
{
    pub fn new(directory: D, assignments: A) -> Self {
        Self {
            directory,
            assignments,
        }
    }

    /// See [`resolve_active`].
    pub fn effective_permissions(&self, id: PrincipalId) -> Result<EffectiveGrants, DomainError> {
        resolve_active(&self.directory, &self.assignments, id)
    }

    /// A fresh [`Principal`] for token issue or refresh.
    pub fn snapshot(&self, id: PrincipalId) -> Result<Principal, DomainError> {
        let grants = self.effective_permissions(id)?;
        Ok(Principal::new(id, grants.roles, grants.permissions))
    }
}
