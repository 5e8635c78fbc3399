//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Assets and waybills are entities: their quantities and status change over
/// time while the identifier stays put.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
