//! Entity trait: identity + continuity across state changes.

/// A record addressed by a store-assigned identifier.
///
/// Entities never hold references to each other; relationships are expressed
/// as id pairs in join tables and resolved by lookup.
pub trait Entity {
    /// Strongly-typed, copyable, ordered identifier.
    type Id: Copy + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
