use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use keystone_core::{DomainError, GroupId, PrincipalId, RoleId};
use keystone_groups::{Group, GroupRepository};

use super::poisoned;

#[derive(Debug, Default)]
struct GroupTables {
    groups: BTreeMap<GroupId, Group>,
    members: BTreeSet<(GroupId, PrincipalId)>,
    default_roles: BTreeSet<(GroupId, RoleId)>,
    last_id: i64,
}

/// In-memory groups, group memberships and default-role bindings.
#[derive(Debug, Default)]
pub struct InMemoryGroupStore {
    inner: RwLock<GroupTables>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row exactly as given, bypassing hierarchy checks.
    ///
    /// Meant for bulk imports and repair tooling; nothing guarantees the row
    /// keeps the tree consistent.
    pub fn import(&self, group: Group) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        tables.last_id = tables.last_id.max(group.id.get());
        tables.groups.insert(group.id, group);
        Ok(())
    }
}

impl GroupRepository for InMemoryGroupStore {
    fn get(&self, id: GroupId) -> Result<Option<Group>, DomainError> {
        Ok(self.inner.read().map_err(poisoned)?.groups.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<Group>, DomainError> {
        Ok(self.inner.read().map_err(poisoned)?.groups.values().cloned().collect())
    }

    fn children(&self, parent: Option<GroupId>) -> Result<Vec<Group>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .groups
            .values()
            .filter(|g| g.parent_id == parent)
            .cloned()
            .collect())
    }

    fn insert(&self, mut group: Group) -> Result<Group, DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        tables.last_id += 1;
        group.id = GroupId::new(tables.last_id);
        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    fn update(&self, group: &Group) -> Result<(), DomainError> {
        self.update_many(std::slice::from_ref(group))
    }

    fn update_many(&self, groups: &[Group]) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        if let Some(missing) = groups.iter().find(|g| !tables.groups.contains_key(&g.id)) {
            return Err(DomainError::not_found(format!("group {}", missing.id)));
        }
        for g in groups {
            tables.groups.insert(g.id, g.clone());
        }
        Ok(())
    }

    fn delete(&self, id: GroupId) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        if tables.groups.remove(&id).is_none() {
            return Err(DomainError::not_found(format!("group {id}")));
        }
        tables.members.retain(|(g, _)| *g != id);
        tables.default_roles.retain(|(g, _)| *g != id);
        Ok(())
    }

    fn add_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError> {
        Ok(self
            .inner
            .write()
            .map_err(poisoned)?
            .members
            .insert((group, principal)))
    }

    fn remove_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError> {
        Ok(self
            .inner
            .write()
            .map_err(poisoned)?
            .members
            .remove(&(group, principal)))
    }

    fn members(&self, group: GroupId) -> Result<Vec<PrincipalId>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .members
            .iter()
            .filter(|(g, _)| *g == group)
            .map(|(_, p)| *p)
            .collect())
    }

    fn add_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError> {
        Ok(self
            .inner
            .write()
            .map_err(poisoned)?
            .default_roles
            .insert((group, role)))
    }

    fn remove_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError> {
        Ok(self
            .inner
            .write()
            .map_err(poisoned)?
            .default_roles
            .remove(&(group, role)))
    }

    fn default_roles(&self, group: GroupId) -> Result<Vec<RoleId>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .default_roles
            .iter()
            .filter(|(g, _)| *g == group)
            .map(|(_, r)| *r)
            .collect())
    }
}
