use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, PrincipalId};

use crate::roles::SYSTEM_ADMIN_ROLE;

/// Account status of a principal in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalStatus {
    #[default]
    Active,
    Inactive,
    Locked,
    Pending,
}

impl core::fmt::Display for PrincipalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PrincipalStatus::Active => write!(f, "active"),
            PrincipalStatus::Inactive => write!(f, "inactive"),
            PrincipalStatus::Locked => write!(f, "locked"),
            PrincipalStatus::Pending => write!(f, "pending"),
        }
    }
}

/// Directory row behind a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAccount {
    pub id: PrincipalId,
    pub username: String,
    pub status: PrincipalStatus,
}

impl PrincipalAccount {
    pub fn new(id: PrincipalId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            status: PrincipalStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }
}

/// Lookup of principal accounts (persistence collaborator).
pub trait PrincipalDirectory: Send + Sync {
    fn account(&self, id: PrincipalId) -> Result<Option<PrincipalAccount>, DomainError>;
}

impl<S> PrincipalDirectory for Arc<S>
where
    S: PrincipalDirectory + ?Sized,
{
    fn account(&self, id: PrincipalId) -> Result<Option<PrincipalAccount>, DomainError> {
        (**self).account(id)
    }
}

/// Anything that can answer "is this code granted?".
pub trait PermissionCheck {
    fn has_permission(&self, code: &str) -> bool;
}

/// A fully resolved principal for authorization decisions.
///
/// Produced once per authentication or refresh event and immutable afterwards.
/// Role names and codes are deduplicated and sorted; a lowercase copy of the
/// codes backs case-insensitive checks.
#[derive(Debug, Clone)]
pub struct Principal {
    id: PrincipalId,
    roles: Vec<String>,
    permissions: Vec<String>,
    lookup: HashSet<String>,
}

impl Principal {
    pub fn new<R, P>(id: PrincipalId, roles: R, permissions: P) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let roles = normalize(roles);
        let permissions = normalize(permissions);
        let lookup = permissions.iter().map(|p| p.to_lowercase()).collect();
        Self {
            id,
            roles,
            permissions,
            lookup,
        }
    }

    pub fn id(&self) -> PrincipalId {
        self.id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn is_system_admin(&self) -> bool {
        self.has_any_role(&[SYSTEM_ADMIN_ROLE])
    }

    /// Case-insensitive role match; an empty requirement is satisfied.
    pub fn has_any_role(&self, required: &[&str]) -> bool {
        if required.is_empty() {
            return true;
        }
        required
            .iter()
            .any(|need| self.roles.iter().any(|r| r.eq_ignore_ascii_case(need)))
    }

    /// Plain membership in the resolved code set, without the admin override.
    pub fn holds(&self, code: &str) -> bool {
        self.lookup.contains(&code.to_lowercase())
    }
}

impl PermissionCheck for Principal {
    fn has_permission(&self, code: &str) -> bool {
        crate::authorize::has_permission(self, code)
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.roles == other.roles && self.permissions == other.permissions
    }
}

impl Eq for Principal {}

fn normalize<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    items
        .into_iter()
        .map(Into::into)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_dedupes_trims_and_sorts() {
        let p = Principal::new(
            PrincipalId::new(1),
            ["editor", " admin ", "editor"],
            ["menu:write", "group:read", "menu:write", ""],
        );
        assert_eq!(p.roles(), ["admin", "editor"]);
        assert_eq!(p.permissions(), ["group:read", "menu:write"]);
    }

    #[test]
    fn membership_is_case_insensitive() {
        let p = Principal::new(PrincipalId::new(1), ["editor"], ["Menu:Write"]);
        assert!(p.holds("menu:write"));
        assert!(p.holds("MENU:WRITE"));
        assert!(!p.holds("menu:read"));
    }

    #[test]
    fn any_role_matches_ignoring_case() {
        let p = Principal::new(PrincipalId::new(1), ["System_Admin"], Vec::<String>::new());
        assert!(p.is_system_admin());
        assert!(p.has_any_role(&[]));
        assert!(!p.has_any_role(&["auditor"]));
    }

    #[test]
    fn only_active_accounts_are_active() {
        let mut account = PrincipalAccount::new(PrincipalId::new(3), "carol");
        assert!(account.is_active());
        account.status = PrincipalStatus::Locked;
        assert!(!account.is_active());
    }
}
