//! Node IDs for syntax trees.
//!
//! Every syntax node carries a `NodeId` that side tables (types, escape
//! ownership, def/use) are keyed by. IDs come from a `NodeIdGen` owned by one
//! compilation unit, so two units never share an allocator.

use serde::{Deserialize, Serialize};

/// Unique identifier for a syntax node within a compilation unit.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a NodeId from a raw value.
    ///
    /// Trees produced by an external parser arrive with their IDs already
    /// assigned; this is how those IDs enter the compiler.
    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value of this NodeId.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic allocator of node IDs for one compilation unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Make sure IDs handed out from now on never collide with `id`.
    ///
    /// Returns `false` if `id` is the largest representable ID, leaving
    /// nothing to hand out after it.
    pub fn reserve(&mut self, id: NodeId) -> bool {
        match id.0.checked_add(1) {
            Some(next) => {
                self.next = self.next.max(next);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(format!("{}", NodeId::from_raw(123)), "#123");
    }

    #[test]
    fn test_gen_is_monotonic() {
        let mut ids = NodeIdGen::new();
        let a = ids.fresh();
        let b = ids.fresh();
        assert!(a < b);
    }

    #[test]
    fn test_reserve_skips_past_existing_ids() {
        let mut ids = NodeIdGen::new();
        assert!(ids.reserve(NodeId::from_raw(41)));
        assert_eq!(ids.fresh(), NodeId::from_raw(42));
        assert!(ids.reserve(NodeId::from_raw(3)));
        assert_eq!(ids.fresh(), NodeId::from_raw(43));
    }

    #[test]
    fn test_reserving_the_last_id_fails() {
        let mut ids = NodeIdGen::new();
        assert!(!ids.reserve(NodeId::from_raw(u32::MAX)));
        assert_eq!(ids.fresh(), NodeId::from_raw(0));
    }
}
