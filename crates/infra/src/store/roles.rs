use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use keystone_auth::{Role, RoleAssignments, RoleRepository, system_roles};
use keystone_core::{DomainError, PrincipalId, RoleId};

use super::poisoned;

#[derive(Debug, Default)]
struct RoleTables {
    roles: BTreeMap<RoleId, Role>,
    assignments: BTreeSet<(PrincipalId, RoleId)>,
    last_id: i64,
}

impl RoleTables {
    fn store_new(&mut self, mut role: Role) -> Result<Role, DomainError> {
        if self.roles.values().any(|r| r.name == role.name) {
            return Err(DomainError::validation(format!(
                "role name '{}' already exists",
                role.name
            )));
        }
        self.last_id += 1;
        role.id = RoleId::new(self.last_id);
        self.roles.insert(role.id, role.clone());
        Ok(role)
    }
}

/// In-memory roles and role assignments.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    inner: RwLock<RoleTables>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with the `system_admin` and `user` roles.
    pub fn with_system_roles(now: DateTime<Utc>) -> Result<Self, DomainError> {
        let store = Self::new();
        {
            let mut tables = store.inner.write().map_err(poisoned)?;
            for role in system_roles(now) {
                tables.store_new(role)?;
            }
        }
        Ok(store)
    }
}

impl RoleAssignments for InMemoryRoleStore {
    fn roles_for_principal(&self, principal: PrincipalId) -> Result<Vec<Role>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .assignments
            .iter()
            .filter(|(p, _)| *p == principal)
            .filter_map(|(_, r)| tables.roles.get(r).cloned())
            .collect())
    }
}

impl RoleRepository for InMemoryRoleStore {
    fn get(&self, id: RoleId) -> Result<Option<Role>, DomainError> {
        Ok(self.inner.read().map_err(poisoned)?.roles.get(&id).cloned())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Role>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    fn list(&self, include_deleted: bool) -> Result<Vec<Role>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .roles
            .values()
            .filter(|r| include_deleted || r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    fn insert(&self, role: Role) -> Result<Role, DomainError> {
        self.inner.write().map_err(poisoned)?.store_new(role)
    }

    fn update(&self, role: &Role) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        let slot = tables
            .roles
            .get_mut(&role.id)
            .ok_or_else(|| DomainError::not_found(format!("role {}", role.id)))?;
        *slot = role.clone();
        Ok(())
    }

    fn purge(&self, id: RoleId) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        if tables.roles.remove(&id).is_none() {
            return Err(DomainError::not_found(format!("role {id}")));
        }
        tables.assignments.retain(|(_, r)| *r != id);
        Ok(())
    }

    fn assign(&self, principal: PrincipalId, role: RoleId) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        if !tables.roles.contains_key(&role) {
            return Err(DomainError::not_found(format!("role {role}")));
        }
        tables.assignments.insert((principal, role));
        Ok(())
    }

    fn revoke(&self, principal: PrincipalId, role: RoleId) -> Result<bool, DomainError> {
        Ok(self
            .inner
            .write()
            .map_err(poisoned)?
            .assignments
            .remove(&(principal, role)))
    }

    fn assignees(&self, role: RoleId) -> Result<Vec<PrincipalId>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .assignments
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(p, _)| *p)
            .collect())
    }
}
