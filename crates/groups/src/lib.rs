//! `keystone-groups` — organizational units as a materialized-path tree.

pub mod group;
pub mod store;

pub use group::{DEFAULT_MAX_DEPTH, Group, MAX_GROUP_DESCRIPTION_LEN, MAX_GROUP_NAME_LEN};
pub use store::{
    GroupChanges, GroupNode, GroupRepository, GroupStatistics, HierarchyStore, NewGroup,
};
