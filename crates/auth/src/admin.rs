//! Role administration under permission governance.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{BatchOutcome, DomainError, PrincipalId, RoleId, SoftDeletable};

use crate::authorize::has_permission;
use crate::permissions::validate_permission_codes;
use crate::principal::{Principal, PrincipalDirectory};
use crate::registry::PermissionRegistry;
use crate::resolver::{RoleAssignments, resolve_active};
use crate::roles::{Role, RoleStatus};

/// Result cap for [`RoleAdmin::search`] when the caller passes no limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Role persistence (collaborator).
///
/// `find_by_name` and `list(true)` see soft-deleted rows as well.
pub trait RoleRepository: RoleAssignments {
    fn get(&self, id: RoleId) -> Result<Option<Role>, DomainError>;
    fn find_by_name(&self, name: &str) -> Result<Option<Role>, DomainError>;
    fn list(&self, include_deleted: bool) -> Result<Vec<Role>, DomainError>;
    /// Stores a new role and returns it with its assigned id.
    fn insert(&self, role: Role) -> Result<Role, DomainError>;
    fn update(&self, role: &Role) -> Result<(), DomainError>;
    /// Removes the row and its assignments.
    fn purge(&self, id: RoleId) -> Result<(), DomainError>;
    fn assign(&self, principal: PrincipalId, role: RoleId) -> Result<(), DomainError>;
    /// Returns `true` if an assignment was removed.
    fn revoke(&self, principal: PrincipalId, role: RoleId) -> Result<bool, DomainError>;
    fn assignees(&self, role: RoleId) -> Result<Vec<PrincipalId>, DomainError>;
}

impl<S> RoleRepository for Arc<S>
where
    S: RoleRepository + ?Sized,
{
    fn get(&self, id: RoleId) -> Result<Option<Role>, DomainError> {
        (**self).get(id)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Role>, DomainError> {
        (**self).find_by_name(name)
    }

    fn list(&self, include_deleted: bool) -> Result<Vec<Role>, DomainError> {
        (**self).list(include_deleted)
    }

    fn insert(&self, role: Role) -> Result<Role, DomainError> {
        (**self).insert(role)
    }

    fn update(&self, role: &Role) -> Result<(), DomainError> {
        (**self).update(role)
    }

    fn purge(&self, id: RoleId) -> Result<(), DomainError> {
        (**self).purge(id)
    }

    fn assign(&self, principal: PrincipalId, role: RoleId) -> Result<(), DomainError> {
        (**self).assign(principal, role)
    }

    fn revoke(&self, principal: PrincipalId, role: RoleId) -> Result<bool, DomainError> {
        (**self).revoke(principal, role)
    }

    fn assignees(&self, role: RoleId) -> Result<Vec<PrincipalId>, DomainError> {
        (**self).assignees(role)
    }
}

/// How strictly role writes are checked against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceMode {
    /// Codes must be declared in the registry.
    #[default]
    Strict,
    /// Only the `resource:action` syntax is checked.
    Syntax,
}

impl GovernanceMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "syntax" => Some(Self::Syntax),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// Counts over live (not soft-deleted) roles, plus the soft-deleted total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleStatistics {
    pub total_roles: usize,
    pub active_roles: usize,
    pub system_roles: usize,
    pub deleted_roles: usize,
    pub roles_by_status: BTreeMap<RoleStatus, usize>,
}

/// Role lifecycle and assignment service.
pub struct RoleAdmin<R, D> {
    roles: R,
    directory: D,
    registry: Arc<PermissionRegistry>,
    mode: GovernanceMode,
}

impl<R, D> RoleAdmin<R, D>
where
    R: RoleRepository,
    D: PrincipalDirectory,
{
    pub fn new(roles: R, directory: D, registry: Arc<PermissionRegistry>, mode: GovernanceMode) -> Self {
        Self {
            roles,
            directory,
            registry,
            mode,
        }
    }

    pub fn mode(&self) -> GovernanceMode {
        self.mode
    }

    /// Syntax first, then the registry must be frozen and non-empty, then (under
    /// strict governance) every code must be declared.
    pub fn validate_permissions(&self, codes: &[String]) -> Result<(), DomainError> {
        validate_permission_codes(codes.iter().map(String::as_str))?;
        self.registry.freeze_and_validate()?;
        if self.mode == GovernanceMode::Syntax {
            return Ok(());
        }
        if let Some(unknown) = codes.iter().find(|c| !self.registry.contains(c)) {
            tracing::warn!(permission = %unknown, "rejected undeclared permission code");
            return Err(DomainError::forbidden(format!("unknown permission: {unknown}")));
        }
        Ok(())
    }

    pub fn get(&self, id: RoleId) -> Result<Role, DomainError> {
        self.roles
            .get(id)?
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| DomainError::not_found(format!("role {id}")))
    }

    pub fn list(&self) -> Result<Vec<Role>, DomainError> {
        let mut roles = self.roles.list(false)?;
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// Live roles among `ids`, by name. Missing and soft-deleted ids are skipped.
    pub fn get_many(&self, ids: &[RoleId]) -> Result<Vec<Role>, DomainError> {
        let mut roles = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(role) = self.roles.get(id)?.filter(|r| !r.is_deleted()) {
                roles.push(role);
            }
        }
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// Live roles whose status is active.
    pub fn active_roles(&self) -> Result<Vec<Role>, DomainError> {
        let mut roles = self.list()?;
        roles.retain(|r| r.status == RoleStatus::Active);
        Ok(roles)
    }

    /// Case-insensitive substring match on name or description.
    ///
    /// A `limit` of 0 means [`DEFAULT_SEARCH_LIMIT`]; larger limits are capped
    /// at [`MAX_SEARCH_LIMIT`]. A blank keyword matches every live role.
    pub fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Role>, DomainError> {
        let limit = match limit {
            0 => DEFAULT_SEARCH_LIMIT,
            n => n.min(MAX_SEARCH_LIMIT),
        };
        let needle = keyword.trim().to_lowercase();
        let mut roles = self.list()?;
        roles.retain(|r| {
            r.name.to_lowercase().contains(&needle) || r.description.to_lowercase().contains(&needle)
        });
        roles.truncate(limit);
        Ok(roles)
    }

    pub fn statistics(&self) -> Result<RoleStatistics, DomainError> {
        let all = self.roles.list(true)?;
        let mut stats = RoleStatistics::default();
        for role in &all {
            if role.is_deleted() {
                stats.deleted_roles += 1;
                continue;
            }
            stats.total_roles += 1;
            if role.is_system {
                stats.system_roles += 1;
            }
            if role.status == RoleStatus::Active {
                stats.active_roles += 1;
            }
            *stats.roles_by_status.entry(role.status).or_default() += 1;
        }
        Ok(stats)
    }

    pub fn create(&self, input: NewRole, now: DateTime<Utc>) -> Result<Role, DomainError> {
        if input.permissions.is_empty() {
            return Err(DomainError::validation("a role needs at least one permission"));
        }
        let role = Role::new(input.name.trim(), input.permissions, now)
            .with_description(input.description);
        role.validate()?;
        self.ensure_name_free(&role.name, None)?;
        self.validate_permissions(&role.permissions)?;

        let role = self.roles.insert(role)?;
        tracing::info!(role_id = %role.id, role = %role.name, "role created");
        Ok(role)
    }

    pub fn update(&self, id: RoleId, changes: RoleChanges, now: DateTime<Utc>) -> Result<Role, DomainError> {
        let mut role = self.get_mutable(id)?;
        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            self.ensure_name_free(&name, Some(id))?;
            role.name = name;
        }
        if let Some(description) = changes.description {
            role.description = description;
        }
        if let Some(permissions) = changes.permissions {
            if permissions.is_empty() {
                return Err(DomainError::validation("a role needs at least one permission"));
            }
            self.validate_permissions(&permissions)?;
            role.set_permissions(permissions, now);
        }
        role.updated_at = now;
        role.validate()?;
        self.roles.update(&role)?;
        tracing::info!(role_id = %id, "role updated");
        Ok(role)
    }

    /// Soft delete. System roles and roles still assigned are refused.
    pub fn delete(&self, id: RoleId, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut role = self.get_mutable(id)?;
        self.ensure_unassigned(&role)?;
        role.mark_deleted(now);
        self.roles.update(&role)?;
        tracing::info!(role_id = %id, "role deleted");
        Ok(())
    }

    /// Hard delete, including rows that are already soft-deleted.
    pub fn purge(&self, id: RoleId) -> Result<(), DomainError> {
        let role = self
            .roles
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("role {id}")))?;
        if role.is_system {
            return Err(DomainError::forbidden("cannot purge a system role"));
        }
        self.ensure_unassigned(&role)?;
        self.roles.purge(id)?;
        tracing::info!(role_id = %id, "role purged");
        Ok(())
    }

    pub fn clone_role(&self, id: RoleId, name: &str, now: DateTime<Utc>) -> Result<Role, DomainError> {
        let source = self.get(id)?;
        let copy = source.clone_as(name.trim(), now);
        copy.validate()?;
        self.ensure_name_free(&copy.name, None)?;
        self.validate_permissions(&copy.permissions)?;
        let copy = self.roles.insert(copy)?;
        tracing::info!(source_id = %id, role_id = %copy.id, "role cloned");
        Ok(copy)
    }

    pub fn add_permission(&self, id: RoleId, code: &str, now: DateTime<Utc>) -> Result<Role, DomainError> {
        let mut role = self.get_mutable(id)?;
        self.validate_permissions(&[code.to_string()])?;
        if role.add_permission(code, now) {
            self.roles.update(&role)?;
        }
        Ok(role)
    }

    pub fn remove_permission(&self, id: RoleId, code: &str, now: DateTime<Utc>) -> Result<Role, DomainError> {
        let mut role = self.get_mutable(id)?;
        if !role.has_permission(code) {
            return Ok(role);
        }
        if role.permissions.len() == 1 {
            return Err(DomainError::validation("a role needs at least one permission"));
        }
        role.remove_permission(code, now);
        self.roles.update(&role)?;
        Ok(role)
    }

    pub fn activate(&self, id: RoleId, now: DateTime<Utc>) -> Result<Role, DomainError> {
        let mut role = self.get(id)?;
        role.activate(now);
        self.roles.update(&role)?;
        Ok(role)
    }

    pub fn deactivate(&self, id: RoleId, now: DateTime<Utc>) -> Result<Role, DomainError> {
        let mut role = self.get_mutable(id)?;
        role.deactivate(now);
        self.roles.update(&role)?;
        tracing::info!(role_id = %id, "role deactivated");
        Ok(role)
    }

    /// Only active roles can be assigned, and only to known principals.
    pub fn assign(&self, principal: PrincipalId, id: RoleId) -> Result<(), DomainError> {
        if self.directory.account(principal)?.is_none() {
            return Err(DomainError::not_found(format!("principal {principal}")));
        }
        let role = self.get(id)?;
        if !role.is_effective() {
            return Err(DomainError::validation(format!(
                "role '{}' is not active and cannot be assigned",
                role.name
            )));
        }
        self.roles.assign(principal, id)?;
        tracing::info!(principal_id = %principal, role_id = %id, "role assigned");
        Ok(())
    }

    /// Assign `id` to each principal on its own; one failure does not stop the
    /// rest. A missing or inactive role fails the whole call.
    pub fn batch_assign(
        &self,
        id: RoleId,
        principals: &[PrincipalId],
    ) -> Result<BatchOutcome<PrincipalId>, DomainError> {
        let role = self.get(id)?;
        if !role.is_effective() {
            return Err(DomainError::validation(format!(
                "role '{}' is not active and cannot be assigned",
                role.name
            )));
        }
        let mut outcome = BatchOutcome::default();
        for &principal in principals {
            outcome.record(principal, self.assign(principal, id));
        }
        tracing::info!(
            role_id = %id,
            assigned = outcome.success_count,
            failed = outcome.failure_count,
            "batch role assignment"
        );
        Ok(outcome)
    }

    pub fn revoke(&self, principal: PrincipalId, id: RoleId) -> Result<(), DomainError> {
        if !self.roles.revoke(principal, id)? {
            return Err(DomainError::not_found(format!(
                "role {id} is not assigned to principal {principal}"
            )));
        }
        tracing::info!(principal_id = %principal, role_id = %id, "role revoked");
        Ok(())
    }

    pub fn roles_of(&self, principal: PrincipalId) -> Result<Vec<Role>, DomainError> {
        let mut roles: Vec<Role> = self
            .roles
            .roles_for_principal(principal)?
            .into_iter()
            .filter(|r| !r.is_deleted())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// Whether the principal's current assignments grant `code`.
    ///
    /// Resolves exactly as a token refresh would: an unknown principal is
    /// `NotFound` and an inactive, locked or pending one is `Forbidden`.
    pub fn check_permission(&self, principal: PrincipalId, code: &str) -> Result<bool, DomainError> {
        let grants = resolve_active(&self.directory, &self.roles, principal)?;
        let resolved = Principal::new(principal, grants.roles, grants.permissions);
        Ok(has_permission(&resolved, code))
    }

    /// A live, non-system role.
    fn get_mutable(&self, id: RoleId) -> Result<Role, DomainError> {
        let role = self.get(id)?;
        if role.is_system {
            return Err(DomainError::forbidden(format!(
                "system role '{}' cannot be modified",
                role.name
            )));
        }
        Ok(role)
    }

    fn ensure_name_free(&self, name: &str, except: Option<RoleId>) -> Result<(), DomainError> {
        match self.roles.find_by_name(name)? {
            Some(existing) if Some(existing.id) != except => Err(DomainError::validation(format!(
                "role name '{name}' already exists"
            ))),
            _ => Ok(()),
        }
    }

    fn ensure_unassigned(&self, role: &Role) -> Result<(), DomainError> {
        let holders = self.roles.assignees(role.id)?;
        if !holders.is_empty() {
            return Err(DomainError::validation(format!(
                "role '{}' is assigned to {} principal(s)",
                role.name,
                holders.len()
            )));
        }
        Ok(())
    }
}
