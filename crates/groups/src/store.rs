//! Hierarchy operations over a [`GroupRepository`].
//!
//! Every structural check (cycle, depth, sibling name) runs before anything is
//! written, and mutations hold a store-wide write gate from the first check to
//! the last write. Reads that walk the graph carry a visited set, so corrupted
//! data (a parent loop written by some other tool) truncates the result instead
//! of looping.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_auth::{PrincipalDirectory, Role};
use keystone_core::{BatchOutcome, DomainError, GroupId, PrincipalId, RoleId};

use crate::group::{DEFAULT_MAX_DEPTH, Group};

/// Group persistence (collaborator).
pub trait GroupRepository: Send + Sync {
    fn get(&self, id: GroupId) -> Result<Option<Group>, DomainError>;
    fn list(&self) -> Result<Vec<Group>, DomainError>;
    /// Children of `parent`, or the roots when `parent` is `None`.
    fn children(&self, parent: Option<GroupId>) -> Result<Vec<Group>, DomainError>;
    /// Stores a new group and returns it with its assigned id.
    fn insert(&self, group: Group) -> Result<Group, DomainError>;
    fn update(&self, group: &Group) -> Result<(), DomainError>;
    /// Writes several rows as one unit.
    fn update_many(&self, groups: &[Group]) -> Result<(), DomainError>;
    fn delete(&self, id: GroupId) -> Result<(), DomainError>;
    /// Returns `true` if the membership is new.
    fn add_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError>;
    /// Returns `true` if a membership was removed.
    fn remove_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError>;
    fn members(&self, group: GroupId) -> Result<Vec<PrincipalId>, DomainError>;
    /// Returns `true` if the binding is new.
    fn add_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError>;
    /// Returns `true` if a binding was removed.
    fn remove_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError>;
    fn default_roles(&self, group: GroupId) -> Result<Vec<RoleId>, DomainError>;
}

impl<S> GroupRepository for Arc<S>
where
    S: GroupRepository + ?Sized,
{
    fn get(&self, id: GroupId) -> Result<Option<Group>, DomainError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Group>, DomainError> {
        (**self).list()
    }

    fn children(&self, parent: Option<GroupId>) -> Result<Vec<Group>, DomainError> {
        (**self).children(parent)
    }

    fn insert(&self, group: Group) -> Result<Group, DomainError> {
        (**self).insert(group)
    }

    fn update(&self, group: &Group) -> Result<(), DomainError> {
        (**self).update(group)
    }

    fn update_many(&self, groups: &[Group]) -> Result<(), DomainError> {
        (**self).update_many(groups)
    }

    fn delete(&self, id: GroupId) -> Result<(), DomainError> {
        (**self).delete(id)
    }

    fn add_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError> {
        (**self).add_member(group, principal)
    }

    fn remove_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError> {
        (**self).remove_member(group, principal)
    }

    fn members(&self, group: GroupId) -> Result<Vec<PrincipalId>, DomainError> {
        (**self).members(group)
    }

    fn add_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError> {
        (**self).add_default_role(group, role)
    }

    fn remove_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError> {
        (**self).remove_default_role(group, role)
    }

    fn default_roles(&self, group: GroupId) -> Result<Vec<RoleId>, DomainError> {
        (**self).default_roles(group)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<GroupId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A group with its member count and sorted children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupNode {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub level: u32,
    pub member_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GroupNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupStatistics {
    pub total_groups: usize,
    pub groups_by_level: BTreeMap<u32, usize>,
}

/// Materialized-path hierarchy service.
pub struct HierarchyStore<R, D> {
    repo: R,
    directory: D,
    max_depth: u32,
    write_gate: Mutex<()>,
}

impl<R, D> HierarchyStore<R, D>
where
    R: GroupRepository,
    D: PrincipalDirectory,
{
    pub fn new(repo: R, directory: D) -> Self {
        Self {
            repo,
            directory,
            max_depth: DEFAULT_MAX_DEPTH,
            write_gate: Mutex::new(()),
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn get(&self, id: GroupId) -> Result<Group, DomainError> {
        self.repo
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("group {id}")))
    }

    /// Insert, then compute the path from the assigned id.
    pub fn create(&self, input: NewGroup, now: DateTime<Utc>) -> Result<Group, DomainError> {
        let _writes = self.lock_writes()?;
        let parent = match input.parent_id {
            Some(pid) => {
                let parent = self
                    .repo
                    .get(pid)?
                    .ok_or_else(|| DomainError::not_found(format!("parent group {pid}")))?;
                if parent.level >= self.max_depth {
                    return Err(DomainError::validation(format!(
                        "group hierarchy cannot exceed {} levels",
                        self.max_depth
                    )));
                }
                Some(parent)
            }
            None => None,
        };

        let draft = Group::draft(input.name.trim(), input.description, parent.as_ref(), now);
        draft.validate()?;
        if !self.name_unique_at_sibling(&draft.name, draft.parent_id, None)? {
            return Err(DomainError::validation(format!(
                "group name '{}' already exists at this level",
                draft.name
            )));
        }

        let mut group = self.repo.insert(draft)?;
        group.place_under(parent.as_ref(), now);
        if let Err(err) = self.repo.update(&group) {
            tracing::warn!(group_id = %group.id, group = %group.name, error = %err, "failed to store group path");
            return Err(err);
        }

        tracing::info!(group_id = %group.id, level = group.level, "group created");
        Ok(group)
    }

    /// Rename and/or re-describe a group. Position in the tree is unchanged.
    pub fn update(&self, id: GroupId, changes: GroupChanges, now: DateTime<Utc>) -> Result<Group, DomainError> {
        let _writes = self.lock_writes()?;
        let mut group = self.get(id)?;
        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            if name != group.name && !self.name_unique_at_sibling(&name, group.parent_id, Some(id))? {
                return Err(DomainError::validation(format!(
                    "group name '{name}' already exists at this level"
                )));
            }
            group.name = name;
        }
        if let Some(description) = changes.description {
            group.description = description;
        }
        group.validate()?;
        group.updated_at = now;
        self.repo.update(&group)?;
        Ok(group)
    }

    /// Blocked while the group has children or members.
    pub fn delete(&self, id: GroupId) -> Result<(), DomainError> {
        let _writes = self.lock_writes()?;
        self.get(id)?;
        if !self.repo.children(Some(id))?.is_empty() {
            return Err(DomainError::validation(
                "cannot delete a group that has child groups",
            ));
        }
        if !self.repo.members(id)?.is_empty() {
            return Err(DomainError::validation("cannot delete a group that has members"));
        }
        self.repo.delete(id)?;
        tracing::info!(group_id = %id, "group deleted");
        Ok(())
    }

    /// Move `id` under `parent` (or to the root), rewriting the whole subtree.
    pub fn set_parent(
        &self,
        id: GroupId,
        parent: Option<GroupId>,
        now: DateTime<Utc>,
    ) -> Result<Group, DomainError> {
        let _writes = self.lock_writes()?;
        let mut unit = self.get(id)?;
        if parent == Some(id) {
            return Err(DomainError::validation("a group cannot be its own parent"));
        }

        let subtree = self.subtree_levels(id)?;
        let parent = match parent {
            Some(pid) => {
                if subtree.iter().any(|(g, _)| g.id == pid) {
                    return Err(DomainError::validation(
                        "cannot move a group under one of its descendants",
                    ));
                }
                Some(self.get(pid)?)
            }
            None => None,
        };

        let new_level = parent.as_ref().map_or(1, |p| p.level + 1);
        let height = subtree.iter().map(|(_, depth)| *depth).max().unwrap_or(0);
        if new_level + height > self.max_depth {
            return Err(DomainError::validation(format!(
                "group hierarchy cannot exceed {} levels",
                self.max_depth
            )));
        }

        let parent_id = parent.as_ref().map(|p| p.id);
        if !self.name_unique_at_sibling(&unit.name, parent_id, Some(id))? {
            return Err(DomainError::validation(format!(
                "group name '{}' already exists at the target level",
                unit.name
            )));
        }

        unit.place_under(parent.as_ref(), now);
        let mut rewritten = vec![unit.clone()];
        let mut placed: HashMap<GroupId, Group> = HashMap::from([(unit.id, unit.clone())]);
        // `subtree` is breadth-first, so parents are placed before children.
        for (mut g, _) in subtree {
            let Some(p) = g.parent_id.and_then(|pid| placed.get(&pid)).cloned() else {
                continue;
            };
            g.place_under(Some(&p), now);
            placed.insert(g.id, g.clone());
            rewritten.push(g);
        }

        self.repo.update_many(&rewritten)?;
        tracing::info!(group_id = %id, parent_id = ?parent_id, moved = rewritten.len(), "group moved");
        Ok(unit)
    }

    /// Root-first chain of ancestors, excluding `id`.
    ///
    /// A missing parent or a revisited id ends the walk; the partial chain is
    /// returned.
    pub fn ancestors(&self, id: GroupId) -> Result<Vec<Group>, DomainError> {
        let unit = self.get(id)?;
        let mut chain = Vec::new();
        let mut seen = HashSet::from([unit.id]);
        let mut next = unit.parent_id;

        while let Some(pid) = next {
            if !seen.insert(pid) {
                tracing::warn!(group_id = %id, at = %pid, "parent loop while walking ancestors");
                break;
            }
            match self.repo.get(pid)? {
                Some(parent) => {
                    next = parent.parent_id;
                    chain.push(parent);
                }
                None => {
                    tracing::warn!(group_id = %id, missing = %pid, "broken ancestor chain");
                    break;
                }
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Every group below `id`, breadth-first, excluding `id`.
    pub fn descendants(&self, id: GroupId) -> Result<Vec<Group>, DomainError> {
        self.get(id)?;
        Ok(self.subtree_levels(id)?.into_iter().map(|(g, _)| g).collect())
    }

    /// Whether `name` is free among the children of `parent` (or the roots).
    pub fn name_unique_at_sibling(
        &self,
        name: &str,
        parent: Option<GroupId>,
        except: Option<GroupId>,
    ) -> Result<bool, DomainError> {
        let taken = self
            .repo
            .children(parent)?
            .iter()
            .any(|g| g.name == name && Some(g.id) != except);
        Ok(!taken)
    }

    pub fn add_member(&self, group: GroupId, principal: PrincipalId) -> Result<(), DomainError> {
        let _writes = self.lock_writes()?;
        self.get(group)?;
        self.add_member_to(group, principal)
    }

    /// Add each principal on its own; one failure does not stop the rest.
    ///
    /// A missing group fails the whole call.
    pub fn batch_add_members(
        &self,
        group: GroupId,
        principals: &[PrincipalId],
    ) -> Result<BatchOutcome<PrincipalId>, DomainError> {
        let _writes = self.lock_writes()?;
        self.get(group)?;
        let mut outcome = BatchOutcome::default();
        for &principal in principals {
            outcome.record(principal, self.add_member_to(group, principal));
        }
        tracing::info!(
            group_id = %group,
            added = outcome.success_count,
            failed = outcome.failure_count,
            "batch member add"
        );
        Ok(outcome)
    }

    pub fn remove_member(&self, group: GroupId, principal: PrincipalId) -> Result<(), DomainError> {
        if !self.repo.remove_member(group, principal)? {
            return Err(DomainError::not_found(format!(
                "principal {principal} is not a member of group {group}"
            )));
        }
        Ok(())
    }

    pub fn members(&self, group: GroupId) -> Result<Vec<PrincipalId>, DomainError> {
        self.get(group)?;
        let mut members = self.repo.members(group)?;
        members.sort();
        Ok(members)
    }

    /// Bind `role` to `group` as a default role. Only effective roles qualify.
    ///
    /// Bindings are recorded only; they grant nothing to members.
    pub fn add_default_role(&self, group: GroupId, role: &Role) -> Result<(), DomainError> {
        if !role.is_effective() {
            return Err(DomainError::validation(format!(
                "role '{}' is not active and cannot be a default role",
                role.name
            )));
        }
        let _writes = self.lock_writes()?;
        self.get(group)?;
        if self.repo.add_default_role(group, role.id)? {
            tracing::info!(group_id = %group, role_id = %role.id, "default role bound");
        }
        Ok(())
    }

    pub fn remove_default_role(&self, group: GroupId, role: RoleId) -> Result<(), DomainError> {
        if !self.repo.remove_default_role(group, role)? {
            return Err(DomainError::not_found(format!(
                "role {role} is not a default role of group {group}"
            )));
        }
        Ok(())
    }

    pub fn default_roles(&self, group: GroupId) -> Result<Vec<RoleId>, DomainError> {
        self.get(group)?;
        let mut roles = self.repo.default_roles(group)?;
        roles.sort();
        Ok(roles)
    }

    /// The whole forest. Children are ordered by name, then id.
    ///
    /// Groups whose parent is missing are shown as roots; groups only reachable
    /// through a parent loop are left out.
    pub fn tree(&self) -> Result<Vec<GroupNode>, DomainError> {
        let groups = self.repo.list()?;
        let ids: HashSet<GroupId> = groups.iter().map(|g| g.id).collect();

        let mut by_parent: HashMap<Option<GroupId>, Vec<Group>> = HashMap::new();
        for g in groups {
            let key = g.parent_id.filter(|pid| ids.contains(pid));
            by_parent.entry(key).or_default().push(g);
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        }

        let mut seen = HashSet::new();
        let mut roots = Vec::new();
        for root in by_parent.get(&None).cloned().unwrap_or_default() {
            if let Some(node) = self.build_node(root, &by_parent, &mut seen)? {
                roots.push(node);
            }
        }
        Ok(roots)
    }

    fn build_node(
        &self,
        group: Group,
        by_parent: &HashMap<Option<GroupId>, Vec<Group>>,
        seen: &mut HashSet<GroupId>,
    ) -> Result<Option<GroupNode>, DomainError> {
        if !seen.insert(group.id) {
            return Ok(None);
        }
        let mut children = Vec::new();
        for child in by_parent.get(&Some(group.id)).cloned().unwrap_or_default() {
            if let Some(node) = self.build_node(child, by_parent, seen)? {
                children.push(node);
            }
        }
        Ok(Some(GroupNode {
            member_count: self.repo.members(group.id)?.len(),
            id: group.id,
            name: group.name,
            description: group.description,
            level: group.level,
            children,
        }))
    }

    pub fn roots(&self) -> Result<Vec<Group>, DomainError> {
        let mut roots = self.repo.children(None)?;
        roots.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(roots)
    }

    pub fn at_level(&self, level: u32) -> Result<Vec<Group>, DomainError> {
        let mut groups: Vec<Group> = self
            .repo
            .list()?
            .into_iter()
            .filter(|g| g.level == level)
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    pub fn statistics(&self) -> Result<GroupStatistics, DomainError> {
        let groups = self.repo.list()?;
        let mut stats = GroupStatistics {
            total_groups: groups.len(),
            ..GroupStatistics::default()
        };
        for g in &groups {
            *stats.groups_by_level.entry(g.level).or_default() += 1;
        }
        Ok(stats)
    }

    fn add_member_to(&self, group: GroupId, principal: PrincipalId) -> Result<(), DomainError> {
        if self.directory.account(principal)?.is_none() {
            return Err(DomainError::not_found(format!("principal {principal}")));
        }
        if self.repo.add_member(group, principal)? {
            tracing::info!(group_id = %group, principal_id = %principal, "member added");
        }
        Ok(())
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, DomainError> {
        self.write_gate
            .lock()
            .map_err(|_| DomainError::internal("group write gate poisoned"))
    }

    /// Descendants of `id` breadth-first, each with its depth below `id`.
    fn subtree_levels(&self, id: GroupId) -> Result<Vec<(Group, u32)>, DomainError> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([(id, 0u32)]);

        while let Some((current, depth)) = queue.pop_front() {
            for child in self.repo.children(Some(current))? {
                if !seen.insert(child.id) {
                    continue;
                }
                queue.push_back((child.id, depth + 1));
                out.push((child, depth + 1));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_auth::PrincipalAccount;
    use std::collections::BTreeSet;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Default)]
    struct MemRepo {
        rows: Mutex<BTreeMap<GroupId, Group>>,
        members: Mutex<Vec<(GroupId, PrincipalId)>>,
        default_roles: Mutex<BTreeSet<(GroupId, RoleId)>>,
        next: Mutex<i64>,
    }

    impl MemRepo {
        fn put(&self, g: Group) {
            self.rows.lock().unwrap().insert(g.id, g);
        }
    }

    impl GroupRepository for MemRepo {
        fn get(&self, id: GroupId) -> Result<Option<Group>, DomainError> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }
        fn list(&self) -> Result<Vec<Group>, DomainError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        fn children(&self, parent: Option<GroupId>) -> Result<Vec<Group>, DomainError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|g| g.parent_id == parent)
                .cloned()
                .collect())
        }
        fn insert(&self, mut group: Group) -> Result<Group, DomainError> {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            group.id = GroupId::new(*next);
            self.put(group.clone());
            Ok(group)
        }
        fn update(&self, group: &Group) -> Result<(), DomainError> {
            self.put(group.clone());
            Ok(())
        }
        fn update_many(&self, groups: &[Group]) -> Result<(), DomainError> {
            groups.iter().for_each(|g| self.put(g.clone()));
            Ok(())
        }
        fn delete(&self, id: GroupId) -> Result<(), DomainError> {
            self.rows.lock().unwrap().remove(&id);
            Ok(())
        }
        fn add_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError> {
            let mut m = self.members.lock().unwrap();
            if m.contains(&(group, principal)) {
                return Ok(false);
            }
            m.push((group, principal));
            Ok(true)
        }
        fn remove_member(&self, group: GroupId, principal: PrincipalId) -> Result<bool, DomainError> {
            let mut m = self.members.lock().unwrap();
            let before = m.len();
            m.retain(|e| *e != (group, principal));
            Ok(m.len() != before)
        }
        fn members(&self, group: GroupId) -> Result<Vec<PrincipalId>, DomainError> {
            Ok(self
                .members
                .lock()
                .unwrap()
                .iter()
                .filter(|(g, _)| *g == group)
                .map(|(_, p)| *p)
                .collect())
        }
        fn add_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError> {
            Ok(self.default_roles.lock().unwrap().insert((group, role)))
        }
        fn remove_default_role(&self, group: GroupId, role: RoleId) -> Result<bool, DomainError> {
            Ok(self.default_roles.lock().unwrap().remove(&(group, role)))
        }
        fn default_roles(&self, group: GroupId) -> Result<Vec<RoleId>, DomainError> {
            Ok(self
                .default_roles
                .lock()
                .unwrap()
                .iter()
                .filter(|(g, _)| *g == group)
                .map(|(_, r)| *r)
                .collect())
        }
    }

    struct Everyone;

    impl PrincipalDirectory for Everyone {
        fn account(&self, id: PrincipalId) -> Result<Option<PrincipalAccount>, DomainError> {
            Ok(Some(PrincipalAccount::new(id, "someone")))
        }
    }

    /// Knows principals 1 through 9 only.
    struct FewPrincipals;

    impl PrincipalDirectory for FewPrincipals {
        fn account(&self, id: PrincipalId) -> Result<Option<PrincipalAccount>, DomainError> {
            Ok((1..10).contains(&id.get()).then(|| PrincipalAccount::new(id, "someone")))
        }
    }

    fn store() -> HierarchyStore<Arc<MemRepo>, Everyone> {
        HierarchyStore::new(Arc::new(MemRepo::default()), Everyone)
    }

    fn add(store: &HierarchyStore<Arc<MemRepo>, Everyone>, name: &str, parent: Option<GroupId>) -> Group {
        store
            .create(
                NewGroup {
                    name: name.to_string(),
                    description: String::new(),
                    parent_id: parent,
                },
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn create_sets_level_and_path() {
        let s = store();
        let root = add(&s, "hq", None);
        let child = add(&s, "ops", Some(root.id));
        assert_eq!(root.path, format!("/{}", root.id));
        assert_eq!(child.path, format!("{}/{}", root.path, child.id));
        assert_eq!(child.level, 2);
        assert_eq!(s.get(child.id).unwrap().path, child.path);
    }

    #[test]
    fn create_rejects_duplicate_sibling_names() {
        let s = store();
        let root = add(&s, "hq", None);
        add(&s, "ops", Some(root.id));
        let err = s
            .create(
                NewGroup {
                    name: "ops".into(),
                    description: String::new(),
                    parent_id: Some(root.id),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        // Same name under a different parent is fine.
        add(&s, "ops", None);
    }

    #[test]
    fn create_respects_max_depth() {
        let s = store().with_max_depth(3);
        let a = add(&s, "a", None);
        let b = add(&s, "b", Some(a.id));
        let c = add(&s, "c", Some(b.id));
        let err = s
            .create(
                NewGroup {
                    name: "d".into(),
                    description: String::new(),
                    parent_id: Some(c.id),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn missing_parent_is_not_found() {
        let s = store();
        let err = s
            .create(
                NewGroup {
                    name: "x".into(),
                    description: String::new(),
                    parent_id: Some(GroupId::new(99)),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn set_parent_to_self_or_descendant_fails() {
        let s = store();
        let a = add(&s, "a", None);
        let b = add(&s, "b", Some(a.id));
        let c = add(&s, "c", Some(b.id));

        for target in [a.id, b.id, c.id] {
            let err = s.set_parent(a.id, Some(target), Utc::now()).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "target {target}");
        }
        assert_eq!(s.get(a.id).unwrap(), a);
    }

    #[test]
    fn set_parent_rewrites_subtree() {
        let s = store();
        let a = add(&s, "a", None);
        let b = add(&s, "b", Some(a.id));
        let c = add(&s, "c", Some(b.id));
        let z = add(&s, "z", None);

        let moved = s.set_parent(b.id, Some(z.id), Utc::now()).unwrap();
        assert_eq!(moved.path, format!("/{}/{}", z.id, b.id));
        assert_eq!(moved.level, 2);

        let c = s.get(c.id).unwrap();
        assert_eq!(c.path, format!("/{}/{}/{}", z.id, b.id, c.id));
        assert_eq!(c.level, 3);

        let to_root = s.set_parent(b.id, None, Utc::now()).unwrap();
        assert_eq!(to_root.level, 1);
        assert_eq!(s.get(c.id).unwrap().level, 2);
        assert!(s.descendants(a.id).unwrap().is_empty());
    }

    #[test]
    fn set_parent_checks_depth_of_whole_subtree() {
        let s = store().with_max_depth(3);
        let a = add(&s, "a", None);
        let b = add(&s, "b", Some(a.id));
        let c = add(&s, "c", None);
        add(&s, "d", Some(c.id));

        // c has height 1, so placing it under b (level 2) would reach level 4.
        let err = s.set_parent(c.id, Some(b.id), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(s.set_parent(c.id, Some(a.id), Utc::now()).is_ok());
    }

    #[test]
    fn ancestors_are_root_first_and_truncate_on_gaps() {
        let s = store();
        let a = add(&s, "a", None);
        let b = add(&s, "b", Some(a.id));
        let c = add(&s, "c", Some(b.id));
        let names: Vec<_> = s.ancestors(c.id).unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        s.repo.delete(a.id).unwrap();
        let names: Vec<_> = s.ancestors(c.id).unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["b"]);

        assert!(matches!(
            s.ancestors(GroupId::new(404)),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn corrupted_loop_terminates() {
        let s = store();
        let now = Utc::now();
        let mut x = Group::draft("x", "", None, now);
        x.id = GroupId::new(100);
        x.parent_id = Some(GroupId::new(101));
        let mut y = Group::draft("y", "", None, now);
        y.id = GroupId::new(101);
        y.parent_id = Some(GroupId::new(100));
        s.repo.put(x);
        s.repo.put(y);

        let up = s.ancestors(GroupId::new(100)).unwrap();
        assert_eq!(up.len(), 1);
        let down = s.descendants(GroupId::new(100)).unwrap();
        assert_eq!(down.len(), 1);
        assert!(s.tree().unwrap().is_empty());
    }

    #[test]
    fn delete_is_blocked_by_children_and_members() {
        let s = store();
        let a = add(&s, "a", None);
        let b = add(&s, "b", Some(a.id));
        assert!(matches!(s.delete(a.id), Err(DomainError::Validation(_))));

        s.add_member(b.id, PrincipalId::new(7)).unwrap();
        assert!(matches!(s.delete(b.id), Err(DomainError::Validation(_))));

        s.remove_member(b.id, PrincipalId::new(7)).unwrap();
        s.delete(b.id).unwrap();
        s.delete(a.id).unwrap();
        assert_eq!(s.statistics().unwrap().total_groups, 0);
    }

    #[test]
    fn tree_and_statistics() {
        let s = store();
        let hq = add(&s, "hq", None);
        add(&s, "sales", Some(hq.id));
        let eng = add(&s, "engineering", Some(hq.id));
        s.add_member(eng.id, PrincipalId::new(1)).unwrap();

        let tree = s.tree().unwrap();
        assert_eq!(tree.len(), 1);
        let names: Vec<_> = tree[0].children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["engineering", "sales"]);
        assert_eq!(tree[0].children[0].member_count, 1);

        let stats = s.statistics().unwrap();
        assert_eq!(stats.total_groups, 3);
        assert_eq!(stats.groups_by_level[&1], 1);
        assert_eq!(stats.groups_by_level[&2], 2);
        assert_eq!(s.at_level(2).unwrap().len(), 2);
        assert_eq!(s.roots().unwrap().len(), 1);
    }

    #[test]
    fn rename_keeps_sibling_names_unique() {
        let s = store();
        let a = add(&s, "a", None);
        add(&s, "b", None);
        let err = s
            .update(
                a.id,
                GroupChanges {
                    name: Some("b".into()),
                    description: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let renamed = s
            .update(
                a.id,
                GroupChanges {
                    name: Some("alpha".into()),
                    description: Some("first".into()),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(renamed.name, "alpha");
        assert_eq!(renamed.description, "first");
    }

    #[test]
    fn crossing_moves_never_persist_a_cycle() {
        for _ in 0..200 {
            let s = store();
            let a = add(&s, "a", None);
            let b = add(&s, "b", None);
            let start = Barrier::new(2);

            let (a_under_b, b_under_a) = thread::scope(|scope| {
                let first = scope.spawn(|| {
                    start.wait();
                    s.set_parent(a.id, Some(b.id), Utc::now())
                });
                let second = scope.spawn(|| {
                    start.wait();
                    s.set_parent(b.id, Some(a.id), Utc::now())
                });
                (first.join().unwrap(), second.join().unwrap())
            });

            assert_ne!(a_under_b.is_ok(), b_under_a.is_ok());
            let a = s.get(a.id).unwrap();
            let b = s.get(b.id).unwrap();
            assert!(!(a.parent_id == Some(b.id) && b.parent_id == Some(a.id)));
            assert_eq!(s.roots().unwrap().len(), 1);
        }
    }

    #[test]
    fn concurrent_creates_keep_sibling_names_unique() {
        let s = store();
        let root = add(&s, "hq", None);
        let start = Barrier::new(8);

        let created = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        start.wait();
                        s.create(
                            NewGroup {
                                name: "ops".into(),
                                description: String::new(),
                                parent_id: Some(root.id),
                            },
                            Utc::now(),
                        )
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|w| w.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(created, 1);
        assert_eq!(s.descendants(root.id).unwrap().len(), 1);
    }

    #[test]
    fn batch_add_members_reports_each_principal() {
        let s = HierarchyStore::new(Arc::new(MemRepo::default()), FewPrincipals);
        let group = s
            .create(
                NewGroup {
                    name: "ops".into(),
                    description: String::new(),
                    parent_id: None,
                },
                Utc::now(),
            )
            .unwrap();

        let ids = [PrincipalId::new(1), PrincipalId::new(42), PrincipalId::new(2), PrincipalId::new(1)];
        let outcome = s.batch_add_members(group.id, &ids).unwrap();
        assert_eq!(outcome.success_count, 3);
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.failures[0].id, PrincipalId::new(42));
        assert_eq!(outcome.failures[0].error, "not_found");
        assert_eq!(s.members(group.id).unwrap(), vec![PrincipalId::new(1), PrincipalId::new(2)]);

        assert!(matches!(
            s.batch_add_members(GroupId::new(404), &ids),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn default_roles_bind_only_active_roles() {
        let s = store();
        let g = add(&s, "ops", None);
        let now = Utc::now();

        let mut auditor = Role::new("auditor", vec!["report:read".to_string()], now);
        auditor.id = RoleId::new(3);
        let mut retired = Role::new("retired", vec!["report:read".to_string()], now);
        retired.id = RoleId::new(4);
        retired.deactivate(now);

        s.add_default_role(g.id, &auditor).unwrap();
        s.add_default_role(g.id, &auditor).unwrap();
        assert!(matches!(
            s.add_default_role(g.id, &retired),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            s.add_default_role(GroupId::new(404), &auditor),
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(s.default_roles(g.id).unwrap(), vec![auditor.id]);

        s.remove_default_role(g.id, auditor.id).unwrap();
        assert!(s.default_roles(g.id).unwrap().is_empty());
        assert!(matches!(
            s.remove_default_role(g.id, auditor.id),
            Err(DomainError::NotFound(_))
        ));
    }
}
