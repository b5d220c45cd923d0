//! `keystone-menus` — navigation menu catalogue and per-principal visibility.
//!
//! Menus are a navigation aid, not a security boundary: API routes still
//! enforce their own permissions.

pub mod catalog;
pub mod item;
pub mod tree;

pub use catalog::{MenuCatalog, MenuChanges, MenuRepository, NewMenuItem};
pub use item::{MenuItem, MenuKind};
pub use tree::{MenuNode, VisibilityFilter, assemble, sort_forest, visible_forest};
