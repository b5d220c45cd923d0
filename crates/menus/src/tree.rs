//! Per-request menu forest: assemble, sort, then filter for a viewer.
//!
//! Every traversal carries a visited-id set. Menu rows can be edited outside
//! the catalogue, so a parent loop or a repeated id must end in a truncated
//! forest rather than unbounded recursion.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use keystone_auth::PermissionCheck;
use keystone_core::{MenuItemId, SoftDeletable};

use crate::item::{MenuItem, MenuKind};

/// A menu entry with its children, as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    pub id: MenuItemId,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<MenuItemId>,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: MenuKind,
    pub order: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub route: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub component: String,
    pub hidden: bool,
    pub disabled: bool,
    pub published: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuNode>,
}

impl From<MenuItem> for MenuNode {
    fn from(item: MenuItem) -> Self {
        Self {
            id: item.id,
            code: item.code,
            parent_id: item.parent_id,
            title: item.title,
            path: item.path,
            icon: item.icon,
            kind: item.kind,
            order: item.order,
            route: item.route,
            component: item.component,
            hidden: item.hidden,
            disabled: item.disabled,
            published: item.published,
            any_of: item.any_of,
            all_of: item.all_of,
            children: Vec::new(),
        }
    }
}

/// Link flat rows into a forest by parent id.
///
/// Rows whose parent is absent become roots. A repeated id keeps the last row.
/// Rows that are only reachable through a parent loop are dropped.
pub fn assemble(items: Vec<MenuItem>) -> Vec<MenuNode> {
    let mut rows: HashMap<MenuItemId, MenuItem> = HashMap::with_capacity(items.len());
    let mut order: Vec<MenuItemId> = Vec::with_capacity(items.len());
    for item in items {
        let id = item.id;
        if rows.insert(id, item).is_none() {
            order.push(id);
        }
    }

    let mut children: HashMap<MenuItemId, Vec<MenuItemId>> = HashMap::new();
    let mut roots: Vec<MenuItemId> = Vec::new();
    for id in &order {
        match rows[id].parent_id {
            Some(pid) if rows.contains_key(&pid) => children.entry(pid).or_default().push(*id),
            _ => roots.push(*id),
        }
    }

    let mut visited = HashSet::with_capacity(rows.len());
    let forest: Vec<MenuNode> = roots
        .into_iter()
        .filter_map(|id| link(id, &mut rows, &children, &mut visited))
        .collect();

    if !rows.is_empty() {
        tracing::warn!(dropped = rows.len(), "menu rows unreachable from any root (parent loop)");
    }
    forest
}

fn link(
    id: MenuItemId,
    rows: &mut HashMap<MenuItemId, MenuItem>,
    children: &HashMap<MenuItemId, Vec<MenuItemId>>,
    visited: &mut HashSet<MenuItemId>,
) -> Option<MenuNode> {
    if !visited.insert(id) {
        return None;
    }
    let mut node = MenuNode::from(rows.remove(&id)?);
    if let Some(kids) = children.get(&id) {
        node.children = kids
            .iter()
            .filter_map(|kid| link(*kid, rows, children, visited))
            .collect();
    }
    Some(node)
}

/// Sibling order: order key, then title, then id.
fn sibling_order(a: &MenuNode, b: &MenuNode) -> Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort every sibling list in place. A node id seen twice is not descended
/// into again.
pub fn sort_forest(nodes: &mut [MenuNode]) {
    let mut visited = HashSet::new();
    sort_level(nodes, &mut visited);
}

fn sort_level(nodes: &mut [MenuNode], visited: &mut HashSet<MenuItemId>) {
    nodes.sort_by(sibling_order);
    for node in nodes.iter_mut() {
        if !visited.insert(node.id) {
            continue;
        }
        if !node.children.is_empty() {
            sort_level(&mut node.children, visited);
        }
    }
}

/// Decides which menu nodes a viewer may see.
#[derive(Clone, Copy)]
pub struct VisibilityFilter<'a> {
    viewer: Option<&'a dyn PermissionCheck>,
}

impl<'a> VisibilityFilter<'a> {
    pub fn new(viewer: Option<&'a dyn PermissionCheck>) -> Self {
        Self { viewer }
    }

    /// No principal: only unconstrained nodes are visible.
    pub fn anonymous() -> Self {
        Self { viewer: None }
    }

    pub fn for_viewer(viewer: &'a dyn PermissionCheck) -> Self {
        Self {
            viewer: Some(viewer),
        }
    }

    /// The node's own predicate, ignoring children and hidden/disabled flags.
    pub fn is_visible(&self, node: &MenuNode) -> bool {
        let Some(viewer) = self.viewer else {
            return node.any_of.is_empty() && node.all_of.is_empty();
        };
        if !node.all_of.iter().all(|code| viewer.has_permission(code)) {
            return false;
        }
        node.any_of.is_empty() || node.any_of.iter().any(|code| viewer.has_permission(code))
    }

    /// Bottom-up prune. Hidden or disabled nodes go with their subtree; any
    /// other node stays if it is visible or keeps at least one child.
    pub fn filter(&self, nodes: Vec<MenuNode>) -> Vec<MenuNode> {
        let mut visited = HashSet::new();
        self.filter_level(nodes, &mut visited)
    }

    fn filter_level(&self, nodes: Vec<MenuNode>, visited: &mut HashSet<MenuItemId>) -> Vec<MenuNode> {
        let mut out = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            if !visited.insert(node.id) {
                continue;
            }
            if node.hidden || node.disabled {
                continue;
            }
            let children = std::mem::take(&mut node.children);
            node.children = self.filter_level(children, visited);
            if self.is_visible(&node) || !node.children.is_empty() {
                out.push(node);
            }
        }
        out
    }
}

/// Published, live rows as the sorted forest `viewer` may see.
pub fn visible_forest(items: Vec<MenuItem>, viewer: Option<&dyn PermissionCheck>) -> Vec<MenuNode> {
    let live: Vec<MenuItem> = items
        .into_iter()
        .filter(|m| m.published && !m.is_deleted())
        .collect();
    let mut forest = assemble(live);
    sort_forest(&mut forest);
    VisibilityFilter::new(viewer).filter(forest)
}
