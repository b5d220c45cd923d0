//! Entity traits: identity and soft deletion.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// Entities that are hidden by a deletion marker instead of being removed.
///
/// Soft-deleted rows stay in storage until an explicit purge, so codes and
/// names they occupied remain reserved.
pub trait SoftDeletable {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn mark_deleted(&mut self, at: DateTime<Utc>);

    fn restore(&mut self);

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}
