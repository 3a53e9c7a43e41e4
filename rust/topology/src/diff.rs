// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change records emitted after each operation group.
//!
//! A [`ComplexDiff`] lists the nodes created, destroyed and modified by one
//! operation group. A node created and destroyed within the same group is
//! reported as transient only. Modification flags accumulate per node.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::keys::NodeKey;

/// Bit set of the ways a node was modified.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeModificationFlags(u16);

impl NodeModificationFlags {
    pub const NONE: Self = Self(0);
    pub const REPARENTED: Self = Self(1 << 0);
    pub const CHILDREN_CHANGED: Self = Self(1 << 1);
    pub const TRANSFORM_CHANGED: Self = Self(1 << 2);
    pub const GEOMETRY_CHANGED: Self = Self(1 << 3);
    pub const MESH_CHANGED: Self = Self(1 << 4);
    pub const BOUNDARY_CHANGED: Self = Self(1 << 5);
    pub const STAR_CHANGED: Self = Self(1 << 6);
    pub const BOUNDARY_MESH_CHANGED: Self = Self(1 << 7);
    pub const PROPERTIES_CHANGED: Self = Self(1 << 8);

    const NAMES: [(Self, &'static str); 9] = [
        (Self::REPARENTED, "REPARENTED"),
        (Self::CHILDREN_CHANGED, "CHILDREN_CHANGED"),
        (Self::TRANSFORM_CHANGED, "TRANSFORM_CHANGED"),
        (Self::GEOMETRY_CHANGED, "GEOMETRY_CHANGED"),
        (Self::MESH_CHANGED, "MESH_CHANGED"),
        (Self::BOUNDARY_CHANGED, "BOUNDARY_CHANGED"),
        (Self::STAR_CHANGED, "STAR_CHANGED"),
        (Self::BOUNDARY_MESH_CHANGED, "BOUNDARY_MESH_CHANGED"),
        (Self::PROPERTIES_CHANGED, "PROPERTIES_CHANGED"),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for NodeModificationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeModificationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for NodeModificationFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

/// Where a node was inserted or moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInsertionInfo {
    pub node: NodeKey,
    pub parent: NodeKey,
    pub next_sibling: Option<NodeKey>,
}

/// Accumulated changes of one operation group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexDiff {
    created: Vec<NodeKey>,
    destroyed: Vec<NodeKey>,
    transient: Vec<NodeKey>,
    modified: Vec<(NodeKey, NodeModificationFlags)>,
    insertions: Vec<NodeInsertionInfo>,
}

impl ComplexDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.destroyed.is_empty()
            && self.transient.is_empty()
            && self.modified.is_empty()
            && self.insertions.is_empty()
    }

    pub fn created_nodes(&self) -> &[NodeKey] {
        &self.created
    }

    pub fn destroyed_nodes(&self) -> &[NodeKey] {
        &self.destroyed
    }

    /// Nodes created then destroyed within the same group.
    pub fn transient_nodes(&self) -> &[NodeKey] {
        &self.transient
    }

    pub fn modified_nodes(&self) -> &[(NodeKey, NodeModificationFlags)] {
        &self.modified
    }

    pub fn insertions(&self) -> &[NodeInsertionInfo] {
        &self.insertions
    }

    /// Accumulated flags of `node`, `NONE` if it was not modified.
    pub fn modification_flags(&self, node: NodeKey) -> NodeModificationFlags {
        self.modified
            .iter()
            .find(|(k, _)| *k == node)
            .map_or(NodeModificationFlags::NONE, |(_, f)| *f)
    }

    pub fn is_created(&self, node: NodeKey) -> bool {
        self.created.contains(&node)
    }

    pub fn is_destroyed(&self, node: NodeKey) -> bool {
        self.destroyed.contains(&node)
    }

    /// Appends the changes of a later group, as if both had run as one.
    pub fn merge(&mut self, later: &ComplexDiff) {
        let mut builder = DiffBuilder::from_diff(std::mem::take(self));
        builder.apply(later);
        *self = builder.finish();
    }
}

/// Accumulates the changes of an operation group in time proportional to
/// the number of events. Entries of destroyed nodes and superseded
/// insertions are left in place and filtered out by [`DiffBuilder::finish`].
#[derive(Debug, Default)]
pub(crate) struct DiffBuilder {
    created: Vec<NodeKey>,
    live: FxHashSet<NodeKey>,
    gone: FxHashSet<NodeKey>,
    destroyed: Vec<NodeKey>,
    transient: Vec<NodeKey>,
    modified: Vec<(NodeKey, NodeModificationFlags)>,
    modified_index: FxHashMap<NodeKey, usize>,
    insertions: Vec<NodeInsertionInfo>,
    insertion_index: FxHashMap<NodeKey, usize>,
}

impl DiffBuilder {
    fn from_diff(diff: ComplexDiff) -> Self {
        let mut builder = Self::default();
        for node in diff.created {
            builder.on_node_created(node);
        }
        for node in diff.transient {
            builder.gone.insert(node);
            builder.transient.push(node);
        }
        for node in diff.destroyed {
            builder.gone.insert(node);
            builder.destroyed.push(node);
        }
        for (node, flags) in diff.modified {
            builder.on_node_modified(node, flags);
        }
        for info in diff.insertions {
            builder.on_node_inserted(info);
        }
        builder
    }

    fn apply(&mut self, later: &ComplexDiff) {
        for &node in &later.created {
            self.on_node_created(node);
        }
        for &(node, flags) in &later.modified {
            self.on_node_modified(node, flags);
        }
        for info in &later.insertions {
            self.on_node_inserted(*info);
        }
        for &node in &later.destroyed {
            self.on_node_destroyed(node);
        }
        for &node in &later.transient {
            if self.gone.insert(node) {
                self.transient.push(node);
            }
        }
    }

    pub(crate) fn on_node_created(&mut self, node: NodeKey) {
        if self.live.insert(node) {
            self.created.push(node);
        }
    }

    pub(crate) fn on_node_destroyed(&mut self, node: NodeKey) {
        if !self.gone.insert(node) {
            return;
        }
        self.modified_index.remove(&node);
        self.insertion_index.remove(&node);
        if self.live.remove(&node) {
            self.transient.push(node);
        } else {
            self.destroyed.push(node);
        }
    }

    pub(crate) fn on_node_modified(&mut self, node: NodeKey, flags: NodeModificationFlags) {
        if flags.is_empty() || self.live.contains(&node) || self.gone.contains(&node) {
            return;
        }
        match self.modified_index.get(&node) {
            Some(&i) => self.modified[i].1 |= flags,
            None => {
                self.modified_index.insert(node, self.modified.len());
                self.modified.push((node, flags));
            }
        }
    }

    /// Records where a node was inserted. A later insertion of the same node
    /// replaces the earlier one.
    pub(crate) fn on_node_inserted(&mut self, info: NodeInsertionInfo) {
        if self.gone.contains(&info.node) {
            return;
        }
        self.insertion_index.insert(info.node, self.insertions.len());
        self.insertions.push(info);
    }

    pub(crate) fn finish(self) -> ComplexDiff {
        let Self {
            created,
            live,
            destroyed,
            transient,
            modified,
            modified_index,
            insertions,
            insertion_index,
            ..
        } = self;
        ComplexDiff {
            created: created.into_iter().filter(|k| live.contains(k)).collect(),
            destroyed,
            transient,
            modified: modified
                .into_iter()
                .enumerate()
                .filter(|(i, (k, _))| modified_index.get(k) == Some(i))
                .map(|(_, entry)| entry)
                .collect(),
            insertions: insertions
                .into_iter()
                .enumerate()
                .filter(|(i, info)| insertion_index.get(&info.node) == Some(i))
                .map(|(_, info)| info)
                .collect(),
        }
    }
}
