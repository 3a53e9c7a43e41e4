// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key and identifier types for the node table.
//!
//! Nodes reference each other through [`NodeKey`]s created by
//! `slotmap::SlotMap`. Keys are generational: once a node is destroyed its
//! key never resolves again, so a stale reference is detected by a failed
//! lookup instead of silently aliasing a newer node.
//!
//! Independently of its key, every node carries an [`Id`] drawn from a
//! process-wide counter. Ids are what external layers (documents, undo
//! stacks) use to name nodes across complexes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for a node (group or cell) in a [`Complex`](crate::Complex).
    pub struct NodeKey;
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(u64);

impl Id {
    /// Returns a fresh identifier, never returned before in this process.
    pub fn generate() -> Self {
        Id(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value of this identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminant for node variants.
///
/// Cells are ordered by dimension, groups come last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    KeyVertex = 0,
    KeyEdge = 1,
    KeyFace = 2,
    Group = 3,
}

impl NodeType {
    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::KeyVertex => "KeyVertex",
            NodeType::KeyEdge => "KeyEdge",
            NodeType::KeyFace => "KeyFace",
            NodeType::Group => "Group",
        }
    }

    /// Returns `true` for the cell variants.
    pub fn is_cell(&self) -> bool {
        !matches!(self, NodeType::Group)
    }

    /// Returns the topological dimension of a cell type, `None` for groups.
    pub fn dimension(&self) -> Option<u8> {
        match self {
            NodeType::KeyVertex => Some(0),
            NodeType::KeyEdge => Some(1),
            NodeType::KeyFace => Some(2),
            NodeType::Group => None,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time coordinate of a key cell, in frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct AnimTime(f64);

impl AnimTime {
    pub const fn new(frame: f64) -> Self {
        AnimTime(frame)
    }

    pub const fn frame(self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_names() {
        assert_eq!(NodeType::KeyVertex.as_str(), "KeyVertex");
        assert_eq!(NodeType::KeyEdge.as_str(), "KeyEdge");
        assert_eq!(NodeType::KeyFace.as_str(), "KeyFace");
        assert_eq!(NodeType::Group.to_string(), "Group");
    }

    #[test]
    fn node_type_ordering_follows_dimension() {
        assert!(NodeType::KeyVertex < NodeType::KeyEdge);
        assert!(NodeType::KeyEdge < NodeType::KeyFace);
        assert!(NodeType::KeyFace < NodeType::Group);
        assert_eq!(NodeType::KeyEdge.dimension(), Some(1));
        assert_eq!(NodeType::Group.dimension(), None);
        assert!(!NodeType::Group.is_cell());
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = Id::generate();
        let b = Id::generate();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn anim_time_default_is_frame_zero() {
        assert_eq!(AnimTime::default().frame(), 0.0);
        assert_eq!(AnimTime::new(12.5).frame(), 12.5);
    }
}
