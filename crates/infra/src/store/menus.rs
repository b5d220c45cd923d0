use std::collections::BTreeMap;
use std::sync::RwLock;

use keystone_core::{DomainError, MenuItemId, SoftDeletable};
use keystone_menus::{MenuItem, MenuRepository};

use super::poisoned;

#[derive(Debug, Default)]
struct MenuTables {
    items: BTreeMap<MenuItemId, MenuItem>,
    last_id: i64,
}

/// In-memory menu table. Codes are unique across live and soft-deleted rows.
#[derive(Debug, Default)]
pub struct InMemoryMenuStore {
    inner: RwLock<MenuTables>,
}

impl InMemoryMenuStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row exactly as given, bypassing catalogue checks.
    pub fn import(&self, item: MenuItem) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        tables.last_id = tables.last_id.max(item.id.get());
        tables.items.insert(item.id, item);
        Ok(())
    }
}

impl MenuRepository for InMemoryMenuStore {
    fn get(&self, id: MenuItemId) -> Result<Option<MenuItem>, DomainError> {
        Ok(self.inner.read().map_err(poisoned)?.items.get(&id).cloned())
    }

    fn find_by_code(&self, code: &str) -> Result<Option<MenuItem>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables.items.values().find(|m| m.code == code).cloned())
    }

    fn list(&self, include_deleted: bool) -> Result<Vec<MenuItem>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .items
            .values()
            .filter(|m| include_deleted || !m.is_deleted())
            .cloned()
            .collect())
    }

    fn list_published(&self) -> Result<Vec<MenuItem>, DomainError> {
        let tables = self.inner.read().map_err(poisoned)?;
        Ok(tables
            .items
            .values()
            .filter(|m| m.published && !m.is_deleted())
            .cloned()
            .collect())
    }

    fn insert(&self, mut item: MenuItem) -> Result<MenuItem, DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        if tables.items.values().any(|m| m.code == item.code) {
            return Err(DomainError::validation(format!(
                "menu code '{}' already exists",
                item.code
            )));
        }
        tables.last_id += 1;
        item.id = MenuItemId::new(tables.last_id);
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn update(&self, item: &MenuItem) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        let slot = tables
            .items
            .get_mut(&item.id)
            .ok_or_else(|| DomainError::not_found(format!("menu item {}", item.id)))?;
        *slot = item.clone();
        Ok(())
    }

    fn purge(&self, id: MenuItemId) -> Result<(), DomainError> {
        let mut tables = self.inner.write().map_err(poisoned)?;
        if tables.items.remove(&id).is_none() {
            return Err(DomainError::not_found(format!("menu item {id}")));
        }
        Ok(())
    }
}
