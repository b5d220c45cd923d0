use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keystone_auth::permissions::validate_permission_codes;
use keystone_core::{DomainError, Entity, MenuItemId, SoftDeletable};

pub const MAX_MENU_CODE_LEN: usize = 100;
pub const MAX_MENU_TITLE_LEN: usize = 200;
pub const MAX_MENU_ICON_LEN: usize = 200;
pub const MAX_MENU_LOCATION_LEN: usize = 500;

/// What a menu entry renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    /// Container without a target of its own.
    Group,
    #[default]
    Page,
    /// External link.
    Link,
}

/// A stored navigation entry.
///
/// Codes stay reserved after a soft delete; only a purge frees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<MenuItemId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(rename = "type", default)]
    pub kind: MenuKind,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub route: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub published: bool,
    /// Visible if any one of these is granted (empty: no constraint).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<String>,
    /// Visible only if all of these are granted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    /// An unpublished page entry. The id is assigned on insert.
    pub fn new(code: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: MenuItemId::new(0),
            code: code.into(),
            parent_id: None,
            title: title.into(),
            path: String::new(),
            icon: String::new(),
            kind: MenuKind::Page,
            order: 0,
            route: String::new(),
            component: String::new(),
            hidden: false,
            disabled: false,
            published: false,
            any_of: Vec::new(),
            all_of: Vec::new(),
            deleted_at: None,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("menu code is required"));
        }
        if self.code.chars().count() > MAX_MENU_CODE_LEN {
            return Err(DomainError::validation(format!(
                "menu code cannot exceed {MAX_MENU_CODE_LEN} characters"
            )));
        }
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("menu title is required"));
        }
        if self.title.chars().count() > MAX_MENU_TITLE_LEN {
            return Err(DomainError::validation(format!(
                "menu title cannot exceed {MAX_MENU_TITLE_LEN} characters"
            )));
        }
        if self.icon.chars().count() > MAX_MENU_ICON_LEN {
            return Err(DomainError::validation("menu icon is too long"));
        }
        for (field, value) in [
            ("path", &self.path),
            ("route", &self.route),
            ("component", &self.component),
        ] {
            if value.chars().count() > MAX_MENU_LOCATION_LEN {
                return Err(DomainError::validation(format!("menu {field} is too long")));
            }
        }
        if self.order < 0 {
            return Err(DomainError::validation("menu order cannot be negative"));
        }
        validate_permission_codes(
            self.any_of
                .iter()
                .chain(self.all_of.iter())
                .map(String::as_str),
        )
    }

    pub fn has_constraints(&self) -> bool {
        !self.any_of.is_empty() || !self.all_of.is_empty()
    }
}

impl Entity for MenuItem {
    type Id = MenuItemId;

    fn id(&self) -> MenuItemId {
        self.id
    }
}

impl SoftDeletable for MenuItem {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> MenuItem {
        MenuItem::new("users", "Users", Utc::now())
    }

    #[test]
    fn defaults_to_unpublished_page() {
        let m = item();
        assert_eq!(m.kind, MenuKind::Page);
        assert!(!m.published);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn validate_checks_lengths() {
        let mut m = item();
        m.code = "c".repeat(101);
        assert!(m.validate().is_err());

        let mut m = item();
        m.title = "  ".into();
        assert!(m.validate().is_err());

        let mut m = item();
        m.route = "/".repeat(501);
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_checks_permission_syntax() {
        let mut m = item();
        m.any_of = vec!["user:read".into()];
        m.all_of = vec!["user read".into()];
        let err = m.validate().unwrap_err();
        assert_eq!(err.reason(), "invalid permission: user read");
    }

    #[test]
    fn kind_serializes_as_type() {
        let mut m = item();
        m.kind = MenuKind::Group;
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "group");
        assert!(json.get("any_of").is_none());

        let back: MenuItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }
}
