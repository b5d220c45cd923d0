//! Menu administration: CRUD, publishing and the soft-delete lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use keystone_auth::PermissionCheck;
use keystone_core::{DomainError, MenuItemId, SoftDeletable};

use crate::item::{MenuItem, MenuKind};
use crate::tree::{MenuNode, visible_forest};

/// Menu persistence (collaborator).
///
/// `get` and `find_by_code` see soft-deleted rows as well.
pub trait MenuRepository: Send + Sync {
    fn get(&self, id: MenuItemId) -> Result<Option<MenuItem>, DomainError>;
    fn find_by_code(&self, code: &str) -> Result<Option<MenuItem>, DomainError>;
    fn list(&self, include_deleted: bool) -> Result<Vec<MenuItem>, DomainError>;
    /// Published rows that are not soft-deleted.
    fn list_published(&self) -> Result<Vec<MenuItem>, DomainError>;
    /// Stores a new item and returns it with its assigned id.
    fn insert(&self, item: MenuItem) -> Result<MenuItem, DomainError>;
    fn update(&self, item: &MenuItem) -> Result<(), DomainError>;
    fn purge(&self, id: MenuItemId) -> Result<(), DomainError>;
}

impl<S> MenuRepository for Arc<S>
where
    S: MenuRepository + ?Sized,
{
    fn get(&self, id: MenuItemId) -> Result<Option<MenuItem>, DomainError> {
        (**self).get(id)
    }

    fn find_by_code(&self, code: &str) -> Result<Option<MenuItem>, DomainError> {
        (**self).find_by_code(code)
    }

    fn list(&self, include_deleted: bool) -> Result<Vec<MenuItem>, DomainError> {
        (**self).list(include_deleted)
    }

    fn list_published(&self) -> Result<Vec<MenuItem>, DomainError> {
        (**self).list_published()
    }

    fn insert(&self, item: MenuItem) -> Result<MenuItem, DomainError> {
        (**self).insert(item)
    }

    fn update(&self, item: &MenuItem) -> Result<(), DomainError> {
        (**self).update(item)
    }

    fn purge(&self, id: MenuItemId) -> Result<(), DomainError> {
        (**self).purge(id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMenuItem {
    pub code: String,
    #[serde(default)]
    pub parent_id: Option<MenuItemId>,
    pub title: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "type", default)]
    pub kind: MenuKind,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub all_of: Vec<String>,
}

/// Partial update; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuChanges {
    pub parent_id: Option<MenuItemId>,
    pub title: Option<String>,
    pub path: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<MenuKind>,
    pub order: Option<i32>,
    pub route: Option<String>,
    pub component: Option<String>,
    pub hidden: Option<bool>,
    pub disabled: Option<bool>,
    pub published: Option<bool>,
    pub any_of: Option<Vec<String>>,
    pub all_of: Option<Vec<String>>,
}

pub struct MenuCatalog<R> {
    repo: R,
}

impl<R> MenuCatalog<R>
where
    R: MenuRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// A live (not soft-deleted) item.
    pub fn get(&self, id: MenuItemId) -> Result<MenuItem, DomainError> {
        self.repo
            .get(id)?
            .filter(|m| !m.is_deleted())
            .ok_or_else(|| DomainError::not_found(format!("menu item {id}")))
    }

    pub fn list(&self, include_deleted: bool) -> Result<Vec<MenuItem>, DomainError> {
        let mut items = self.repo.list(include_deleted)?;
        items.sort_by_key(|m| m.id);
        Ok(items)
    }

    pub fn create(&self, input: NewMenuItem, now: DateTime<Utc>) -> Result<MenuItem, DomainError> {
        let mut item = MenuItem::new(input.code.trim(), input.title, now);
        item.parent_id = input.parent_id;
        item.path = input.path;
        item.icon = input.icon;
        item.kind = input.kind;
        item.order = input.order;
        item.route = input.route;
        item.component = input.component;
        item.hidden = input.hidden;
        item.disabled = input.disabled;
        item.published = input.published;
        item.any_of = input.any_of;
        item.all_of = input.all_of;

        item.validate()?;
        self.validate_parent(None, item.parent_id)?;

        if let Some(existing) = self.repo.find_by_code(&item.code)? {
            let reason = if existing.is_deleted() {
                format!(
                    "menu code '{}' belongs to a deleted item; purge it or choose another code",
                    item.code
                )
            } else {
                format!("menu code '{}' already exists", item.code)
            };
            return Err(DomainError::validation(reason));
        }

        let item = self.repo.insert(item)?;
        tracing::info!(menu_id = %item.id, code = %item.code, "menu item created");
        Ok(item)
    }

    pub fn update(&self, id: MenuItemId, changes: MenuChanges, now: DateTime<Utc>) -> Result<MenuItem, DomainError> {
        let mut item = self.get(id)?;
        if let Some(parent) = changes.parent_id {
            item.parent_id = Some(parent);
        }
        if let Some(title) = changes.title {
            item.title = title;
        }
        if let Some(path) = changes.path {
            item.path = path;
        }
        if let Some(icon) = changes.icon {
            item.icon = icon;
        }
        if let Some(kind) = changes.kind {
            item.kind = kind;
        }
        if let Some(order) = changes.order {
            item.order = order;
        }
        if let Some(route) = changes.route {
            item.route = route;
        }
        if let Some(component) = changes.component {
            item.component = component;
        }
        if let Some(hidden) = changes.hidden {
            item.hidden = hidden;
        }
        if let Some(disabled) = changes.disabled {
            item.disabled = disabled;
        }
        if let Some(published) = changes.published {
            item.published = published;
        }
        if let Some(any_of) = changes.any_of {
            item.any_of = any_of;
        }
        if let Some(all_of) = changes.all_of {
            item.all_of = all_of;
        }
        item.updated_at = now;

        item.validate()?;
        self.validate_parent(Some(id), item.parent_id)?;
        self.repo.update(&item)?;
        tracing::info!(menu_id = %id, code = %item.code, "menu item updated");
        Ok(item)
    }

    pub fn publish(&self, id: MenuItemId, published: bool, now: DateTime<Utc>) -> Result<MenuItem, DomainError> {
        let mut item = self.get(id)?;
        item.published = published;
        item.updated_at = now;
        self.repo.update(&item)?;
        tracing::info!(menu_id = %id, published, "menu item publish state changed");
        Ok(item)
    }

    /// Soft delete. The code stays reserved.
    pub fn delete(&self, id: MenuItemId, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut item = self.get(id)?;
        item.mark_deleted(now);
        self.repo.update(&item)?;
        tracing::info!(menu_id = %id, code = %item.code, "menu item deleted");
        Ok(())
    }

    pub fn restore(&self, id: MenuItemId, now: DateTime<Utc>) -> Result<MenuItem, DomainError> {
        let mut item = self
            .repo
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("menu item {id}")))?;
        if !item.is_deleted() {
            return Err(DomainError::validation(format!("menu item {id} is not deleted")));
        }
        item.restore();
        item.updated_at = now;
        self.repo.update(&item)?;
        tracing::info!(menu_id = %id, code = %item.code, "menu item restored");
        Ok(item)
    }

    /// Hard delete, freeing the code. Children of the purged item are shown as
    /// roots from then on.
    pub fn purge(&self, id: MenuItemId) -> Result<(), DomainError> {
        let item = self
            .repo
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("menu item {id}")))?;
        self.repo.purge(id)?;
        tracing::info!(menu_id = %id, code = %item.code, "menu item purged");
        Ok(())
    }

    /// The published forest `viewer` may see.
    pub fn my_tree(&self, viewer: Option<&dyn PermissionCheck>) -> Result<Vec<MenuNode>, DomainError> {
        Ok(visible_forest(self.repo.list_published()?, viewer))
    }

    /// Walk the parent chain from `parent`; reaching `item` again is a cycle.
    fn validate_parent(&self, item: Option<MenuItemId>, parent: Option<MenuItemId>) -> Result<(), DomainError> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if parent.get() <= 0 {
            return Err(DomainError::validation("invalid parent_id"));
        }
        if item == Some(parent) {
            return Err(DomainError::validation("a menu item cannot be its own parent"));
        }

        let mut visited: HashSet<MenuItemId> = item.into_iter().collect();
        let mut current = Some(parent);
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(DomainError::validation("menu parent chain contains a cycle"));
            }
            current = self.get(id)?.parent_id;
        }
        Ok(())
    }
}
