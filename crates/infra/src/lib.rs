//! Infrastructure layer: persistence collaborators for the authorization core.

pub mod store;

mod integration_tests;

pub use store::{
    InMemoryGroupStore, InMemoryMenuStore, InMemoryPrincipalDirectory, InMemoryRoleStore,
};
