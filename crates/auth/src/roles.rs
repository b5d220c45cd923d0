use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, Entity, RoleId, SoftDeletable};

use crate::permissions::builtin;

/// Role name that is granted every permission regardless of its code list.
pub const SYSTEM_ADMIN_ROLE: &str = "system_admin";

/// Role assigned to every newly registered principal.
pub const DEFAULT_USER_ROLE: &str = "user";

pub const MAX_ROLE_NAME_LEN: usize = 50;
pub const MAX_ROLE_DESCRIPTION_LEN: usize = 500;

/// Role activity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    /// Role grants its permissions.
    #[default]
    Active,
    /// Role stays assigned but grants nothing.
    Inactive,
}

impl core::fmt::Display for RoleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RoleStatus::Active => write!(f, "active"),
            RoleStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// RBAC role: a named bundle of permission codes.
///
/// # Invariants
/// - Names are unique across roles (including soft-deleted rows).
/// - System roles cannot be modified, deactivated or deleted.
/// - Roles are soft-deleted; only an explicit purge removes the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub permissions: Vec<String>,
    pub status: RoleStatus,
    pub is_system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// A new, active, non-system role. The id is assigned on insert.
    pub fn new(name: impl Into<String>, permissions: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: RoleId::new(0),
            name: name.into(),
            description: String::new(),
            permissions,
            status: RoleStatus::Active,
            is_system: false,
            deleted_at: None,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Shape checks that do not need storage.
    pub fn validate(&self) -> Result<(), DomainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("role name is required"));
        }
        if name.chars().count() > MAX_ROLE_NAME_LEN {
            return Err(DomainError::validation(format!(
                "role name cannot exceed {MAX_ROLE_NAME_LEN} characters"
            )));
        }
        if self.description.chars().count() > MAX_ROLE_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "role description cannot exceed {MAX_ROLE_DESCRIPTION_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Whether the role currently grants anything.
    pub fn is_effective(&self) -> bool {
        self.status == RoleStatus::Active && !self.is_deleted()
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p == code)
    }

    /// Returns `true` if the code was added.
    pub fn add_permission(&mut self, code: &str, now: DateTime<Utc>) -> bool {
        if self.has_permission(code) {
            return false;
        }
        self.permissions.push(code.to_string());
        self.updated_at = now;
        true
    }

    /// Returns `true` if the code was present.
    pub fn remove_permission(&mut self, code: &str, now: DateTime<Utc>) -> bool {
        let before = self.permissions.len();
        self.permissions.retain(|p| p != code);
        if self.permissions.len() == before {
            return false;
        }
        self.updated_at = now;
        true
    }

    pub fn set_permissions(&mut self, permissions: Vec<String>, now: DateTime<Utc>) {
        self.permissions = permissions;
        self.updated_at = now;
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = RoleStatus::Active;
        self.updated_at = now;
    }

    /// System roles stay active.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.is_system {
            return;
        }
        self.status = RoleStatus::Inactive;
        self.updated_at = now;
    }

    /// Copy of this role under a new name, never a system role.
    pub fn clone_as(&self, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let description = if self.description.is_empty() {
            String::new()
        } else {
            format!("{} (copy)", self.description)
        };
        Self {
            id: RoleId::new(0),
            name: name.into(),
            description,
            permissions: self.permissions.clone(),
            status: self.status,
            is_system: false,
            deleted_at: None,
            updated_at: now,
        }
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> RoleId {
        self.id
    }
}

impl SoftDeletable for Role {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
        self.updated_at = at;
    }

    fn restore(&mut self) {
        self.deleted_at = None;
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Role{{id: {}, name: {}, permissions: {}, system: {}}}",
            self.id,
            self.name,
            self.permissions.len(),
            self.is_system
        )
    }
}

/// The seeded system roles: `system_admin` and `user`.
pub fn system_roles(now: DateTime<Utc>) -> Vec<Role> {
    let mut admin = Role::new(
        SYSTEM_ADMIN_ROLE,
        builtin::ALL.iter().map(|code| code.to_string()).collect(),
        now,
    )
    .with_description("System administrator with every permission");
    admin.is_system = true;

    let mut user = Role::new(
        DEFAULT_USER_ROLE,
        vec![
            builtin::USER_READ_SELF.to_string(),
            builtin::USER_UPDATE_SELF.to_string(),
        ],
        now,
    )
    .with_description("Regular user");
    user.is_system = true;

    vec![admin, user]
}
