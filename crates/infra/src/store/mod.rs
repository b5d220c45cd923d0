//! In-memory persistence collaborators for tests and local development.
//!
//! Each store keeps its tables behind one `RwLock`, so every trait call is
//! atomic with respect to the others on the same store.

pub mod groups;
pub mod menus;
pub mod principals;
pub mod roles;

pub use groups::InMemoryGroupStore;
pub use menus::InMemoryMenuStore;
pub use principals::InMemoryPrincipalDirectory;
pub use roles::InMemoryRoleStore;

use keystone_core::DomainError;

pub(crate) fn poisoned<T>(_: T) -> DomainError {
    DomainError::internal("in-memory store lock poisoned")
}
