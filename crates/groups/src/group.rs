use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, Entity, GroupId};

/// Default maximum tree depth; roots are level 1.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

pub const MAX_GROUP_NAME_LEN: usize = 100;
pub const MAX_GROUP_DESCRIPTION_LEN: usize = 500;

/// Organizational unit in a materialized-path tree.
///
/// # Invariants
/// - `path` is `"/" + id` for roots and `parent.path + "/" + id` otherwise.
/// - `level` is 1 for roots and `parent.level + 1` otherwise.
/// - The parent graph is acyclic. This is enforced by [`crate::HierarchyStore`],
///   not by the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parent_id: Option<GroupId>,
    pub level: u32,
    /// Empty until the id is known.
    pub path: String,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// A group that has not been stored yet (id 0, empty path).
    pub fn draft(
        name: impl Into<String>,
        description: impl Into<String>,
        parent: Option<&Group>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: GroupId::new(0),
            name: name.into(),
            description: description.into(),
            parent_id: parent.map(|p| p.id),
            level: parent.map_or(1, |p| p.level + 1),
            path: String::new(),
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("group name is required"));
        }
        if self.name.chars().count() > MAX_GROUP_NAME_LEN {
            return Err(DomainError::validation(format!(
                "group name cannot exceed {MAX_GROUP_NAME_LEN} characters"
            )));
        }
        if self.description.chars().count() > MAX_GROUP_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "group description cannot exceed {MAX_GROUP_DESCRIPTION_LEN} characters"
            )));
        }
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Recompute `parent_id`, `level` and `path` for a new parent.
    ///
    /// The path stays empty while the id is unassigned.
    pub fn place_under(&mut self, parent: Option<&Group>, now: DateTime<Utc>) {
        let has_id = self.id.get() > 0;
        match parent {
            None => {
                self.parent_id = None;
                self.level = 1;
                self.path = if has_id { format!("/{}", self.id) } else { String::new() };
            }
            Some(p) => {
                self.parent_id = Some(p.id);
                self.level = p.level + 1;
                self.path = if has_id { format!("{}/{}", p.path, self.id) } else { String::new() };
            }
        }
        self.updated_at = now;
    }

    /// Ids on the path, root first, ending with this group.
    ///
    /// Unparseable segments are skipped.
    pub fn path_ids(&self) -> Vec<GroupId> {
        self.path
            .split('/')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse::<i64>().ok())
            .map(GroupId::new)
            .collect()
    }

    /// Path-prefix ancestry test; a group is not its own ancestor.
    pub fn is_ancestor_of(&self, other: &Group) -> bool {
        if self.path.is_empty() || other.path.is_empty() {
            return false;
        }
        other
            .path
            .strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn is_descendant_of(&self, other: &Group) -> bool {
        other.is_ancestor_of(self)
    }
}

impl Entity for Group {
    type Id = GroupId;

    fn id(&self) -> GroupId {
        self.id
    }
}

impl core::fmt::Display for Group {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Group{{id: {}, name: {}, level: {}, path: {}}}",
            self.id, self.name, self.level, self.path
        )
    }
}
