//! `keystone-core` — shared building blocks for the authorization core.
//!
//! Pure types only: the error taxonomy, numeric identifiers and entity traits.
//! Storage and transport live in other crates.

pub mod batch;
pub mod entity;
pub mod error;
pub mod id;

pub use batch::{BatchFailure, BatchOutcome};
pub use entity::{Entity, SoftDeletable};
pub use error::{DomainError, DomainResult};
pub use id::{GroupId, MenuItemId, PrincipalId, RoleId};
