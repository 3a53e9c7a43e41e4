// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The [`Complex`]: owner of every node, group tree and cell adjacency.
//!
//! All nodes live in a single slot map with generational keys, so a key
//! held after its node was destroyed simply stops resolving. Cells keep
//! their boundary and star as key lists; the complex keeps the two views
//! consistent: whenever a boundary changes, the matching star entries are
//! added or removed in the same step.
//!
//! Mutations only happen inside an operation group (see
//! [`Operations`](crate::Operations)). The changes of a group are collected
//! in a [`ComplexDiff`] and emitted once to the `nodes_changed` listeners
//! when the group ends.

use std::cmp::Reverse;
use std::fmt;

use nalgebra::Point2;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use crate::config::ComplexConfig;
use crate::diff::{ComplexDiff, DiffBuilder, NodeInsertionInfo, NodeModificationFlags};
use crate::edge_data::EdgeSampling;
use crate::error::{Error, Result};
use crate::geometry::{self, FaceFill};
use crate::keys::{Id, NodeKey, NodeType};
use crate::node::{Cell, CellKind, Group, KeyEdge, KeyFace, KeyVertex, Node, NodeKind};
use crate::operations::Operations;

/// Whether an operation group is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    OperationInProgress,
}

/// Handle returned by [`Complex::connect_nodes_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type NodesChangedListener = Box<dyn FnMut(&ComplexDiff)>;

#[derive(Default)]
struct NodesChangedSignal {
    next_id: u64,
    listeners: Vec<(ListenerId, NodesChangedListener)>,
}

impl NodesChangedSignal {
    fn connect(&mut self, listener: NodesChangedListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn disconnect(&mut self, id: ListenerId) -> bool {
        let len = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != len
    }

    fn emit(&mut self, diff: &ComplexDiff) {
        for (_, listener) in &mut self.listeners {
            listener(diff);
        }
    }
}

impl fmt::Debug for NodesChangedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodesChangedSignal")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A vector animation complex.
///
/// # Example
///
/// ```
/// use nalgebra::Point2;
/// use vac_topology::{CatmullRomStroke, Complex, Operations};
///
/// let mut complex = Complex::new();
/// let root = complex.root();
/// let mut ops = Operations::new(&mut complex).unwrap();
/// let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, Default::default()).unwrap();
/// let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, Default::default()).unwrap();
/// let stroke = CatmullRomStroke::segment(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), 1.0);
/// let e = ops.create_key_open_edge(a, b, Box::new(stroke), root, None, Default::default()).unwrap();
/// ops.finish();
///
/// assert_eq!(complex.boundary(e), &[a, b]);
/// assert_eq!(complex.star(a), &[e]);
/// ```
#[derive(Debug)]
pub struct Complex {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    ids: FxHashMap<Id, NodeKey>,
    root: NodeKey,
    version: u64,
    state: OperationState,
    pub(crate) pending: DiffBuilder,
    config: ComplexConfig,
    nodes_changed: NodesChangedSignal,
}

impl Default for Complex {
    fn default() -> Self {
        Self::new()
    }
}

impl Complex {
    /// Creates an empty complex (a root group only) with default settings.
    pub fn new() -> Self {
        Self::with_config(ComplexConfig::default())
    }

    pub fn with_config(config: ComplexConfig) -> Self {
        let mut nodes = SlotMap::with_key();
        let root_node = Node::new(NodeKind::Group(Group::new()));
        let root_id = root_node.id;
        let root = nodes.insert(root_node);
        let mut ids = FxHashMap::default();
        ids.insert(root_id, root);
        Self {
            nodes,
            ids,
            root,
            version: 0,
            state: OperationState::Idle,
            pending: DiffBuilder::default(),
            config,
            nodes_changed: NodesChangedSignal::default(),
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Incremented every time an operation group with visible changes ends.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &ComplexConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ComplexConfig) {
        self.config = config;
    }

    pub fn operation_state(&self) -> OperationState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == OperationState::Idle
    }

    /// Opens an operation group on this complex.
    pub fn operations(&mut self) -> Result<Operations<'_>> {
        Operations::new(self)
    }

    /// Registers a listener called once per operation group with changes.
    pub fn connect_nodes_changed(&mut self, listener: impl FnMut(&ComplexDiff) + 'static) -> ListenerId {
        self.nodes_changed.connect(Box::new(listener))
    }

    pub fn disconnect_nodes_changed(&mut self, id: ListenerId) -> bool {
        self.nodes_changed.disconnect(id)
    }

    pub(crate) fn begin_operation(&mut self) -> Result<()> {
        if self.state != OperationState::Idle {
            tracing::warn!("rejected operation: another operation is in progress");
            return Err(Error::OperationInProgress);
        }
        self.state = OperationState::OperationInProgress;
        Ok(())
    }

    pub(crate) fn end_operation(&mut self) -> ComplexDiff {
        let diff = std::mem::take(&mut self.pending).finish();
        self.state = OperationState::Idle;
        if !diff.is_empty() {
            self.version += 1;
            tracing::debug!(
                version = self.version,
                created = diff.created_nodes().len(),
                destroyed = diff.destroyed_nodes().len(),
                transient = diff.transient_nodes().len(),
                modified = diff.modified_nodes().len(),
                "nodes changed"
            );
            self.nodes_changed.emit(&diff);
        }
        diff
    }

    /// Destroys every descendant of the root group.
    pub fn clear(&mut self) -> Result<ComplexDiff> {
        self.begin_operation()?;
        let descendants = self.descendants(self.root);
        self.destroy_batch(&descendants);
        Ok(self.end_operation())
    }

    /// Destroys every node, root included, and creates a new root group.
    pub fn reset_root(&mut self) -> Result<ComplexDiff> {
        self.begin_operation()?;
        let mut all = self.descendants(self.root);
        all.push(self.root);
        self.destroy_batch(&all);

        let root_node = Node::new(NodeKind::Group(Group::new()));
        let root_id = root_node.id;
        self.root = self.nodes.insert(root_node);
        self.ids.insert(root_id, self.root);
        self.pending.on_node_created(self.root);
        Ok(self.end_operation())
    }

    // ========================================================================
    // Node queries
    // ========================================================================

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    /// Key of the node with the given id.
    pub fn find(&self, id: Id) -> Option<NodeKey> {
        self.ids.get(&id).copied()
    }

    pub fn id(&self, key: NodeKey) -> Option<Id> {
        self.node(key).map(Node::id)
    }

    pub fn node_type(&self, key: NodeKey) -> Option<NodeType> {
        self.node(key).map(Node::node_type)
    }

    pub fn group(&self, key: NodeKey) -> Option<&Group> {
        self.node(key)?.as_group()
    }

    pub fn cell(&self, key: NodeKey) -> Option<&Cell> {
        self.node(key)?.as_cell()
    }

    pub fn key_vertex(&self, key: NodeKey) -> Option<&KeyVertex> {
        self.cell(key)?.as_key_vertex()
    }

    pub fn key_edge(&self, key: NodeKey) -> Option<&KeyEdge> {
        self.cell(key)?.as_key_edge()
    }

    pub fn key_face(&self, key: NodeKey) -> Option<&KeyFace> {
        self.cell(key)?.as_key_face()
    }

    /// Position of a key vertex.
    pub fn position(&self, vertex: NodeKey) -> Option<Point2<f64>> {
        self.key_vertex(vertex).map(KeyVertex::position)
    }

    /// Children of a group, back to front. Empty for cells.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        match self.group(key) {
            Some(g) => g.children(),
            None => &[],
        }
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key)?.parent
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let siblings = self.children(self.parent(key)?);
        let i = siblings.iter().position(|&k| k == key)?;
        siblings.get(i + 1).copied()
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let siblings = self.children(self.parent(key)?);
        let i = siblings.iter().position(|&k| k == key)?;
        i.checked_sub(1).map(|j| siblings[j])
    }

    /// Boundary of a cell. Empty for groups.
    pub fn boundary(&self, key: NodeKey) -> &[NodeKey] {
        match self.cell(key) {
            Some(c) => c.boundary(),
            None => &[],
        }
    }

    /// Star of a cell. Empty for groups.
    pub fn star(&self, key: NodeKey) -> &[NodeKey] {
        match self.cell(key) {
            Some(c) => c.star(),
            None => &[],
        }
    }

    /// Sampling of an edge, computed on first access.
    pub fn edge_sampling(&self, edge: NodeKey) -> Option<&EdgeSampling> {
        self.key_edge(edge).map(|e| e.data().sampling())
    }

    /// Triangulated fill of a face, computed on first access.
    pub fn face_fill(&self, face: NodeKey) -> Option<&FaceFill> {
        let f = self.key_face(face)?;
        Some(f.fill.get_or_init(|| geometry::compute_face_fill(self, &f.cycles)))
    }

    /// Returns `true` if `node` is a strict descendant of `ancestor`.
    pub fn is_descendant(&self, node: NodeKey, ancestor: NodeKey) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Descendants of a group in depth-first pre-order, excluding the group.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.children(key).iter().rev().copied().collect();
        while let Some(k) = stack.pop() {
            out.push(k);
            stack.extend(self.children(k).iter().rev().copied());
        }
        out
    }

    fn depth(&self, key: NodeKey) -> usize {
        let mut depth = 0;
        let mut current = self.parent(key);
        while let Some(p) = current {
            depth += 1;
            current = self.parent(p);
        }
        depth
    }

    // ========================================================================
    // Checked lookups
    // ========================================================================

    pub(crate) fn expect_node(&self, key: NodeKey) -> Result<&Node> {
        self.node(key).ok_or(Error::NotFound(key))
    }

    pub(crate) fn expect_group(&self, key: NodeKey) -> Result<&Group> {
        let node = self.expect_node(key)?;
        node.as_group().ok_or(Error::WrongNodeType {
            key,
            expected: NodeType::Group,
            actual: node.node_type(),
        })
    }

    pub(crate) fn expect_cell(&self, key: NodeKey, expected: NodeType) -> Result<&Cell> {
        let node = self.expect_node(key)?;
        match node.as_cell() {
            Some(cell) if cell.cell_type() == expected => Ok(cell),
            _ => Err(Error::WrongNodeType {
                key,
                expected,
                actual: node.node_type(),
            }),
        }
    }

    pub(crate) fn expect_any_cell(&self, key: NodeKey) -> Result<&Cell> {
        let node = self.expect_node(key)?;
        node.as_cell()
            .ok_or_else(|| Error::InvalidArgument(format!("{key:?} is a group, not a cell")))
    }

    /// Checks that `next_sibling`, if any, is a child of group `parent`.
    pub(crate) fn check_insertion_point(&self, parent: NodeKey, next_sibling: Option<NodeKey>) -> Result<()> {
        let group = self.expect_group(parent)?;
        if let Some(sibling) = next_sibling {
            if !group.children.contains(&sibling) {
                return Err(Error::NotAChild {
                    node: sibling,
                    parent,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Raw mutation, used by the operations engine
    // ========================================================================

    pub(crate) fn cell_mut(&mut self, key: NodeKey) -> Option<&mut Cell> {
        self.nodes.get_mut(key)?.as_cell_mut()
    }

    pub(crate) fn key_vertex_mut(&mut self, key: NodeKey) -> Option<&mut KeyVertex> {
        self.cell_mut(key)?.as_key_vertex_mut()
    }

    pub(crate) fn key_edge_mut(&mut self, key: NodeKey) -> Option<&mut KeyEdge> {
        self.cell_mut(key)?.as_key_edge_mut()
    }

    pub(crate) fn key_face_mut(&mut self, key: NodeKey) -> Option<&mut KeyFace> {
        self.cell_mut(key)?.as_key_face_mut()
    }

    pub(crate) fn mark(&mut self, key: NodeKey, flags: NodeModificationFlags) {
        self.pending.on_node_modified(key, flags);
    }

    /// Creates a node and links it into `parent`. The insertion point must
    /// have been checked.
    pub(crate) fn insert_node(&mut self, kind: NodeKind, parent: NodeKey, next_sibling: Option<NodeKey>) -> NodeKey {
        let node = Node::new(kind);
        let id = node.id;
        let key = self.nodes.insert(node);
        self.ids.insert(id, key);
        self.pending.on_node_created(key);
        self.link_child(key, parent, next_sibling);
        tracing::trace!(?key, %id, "node created");
        key
    }

    /// Creates a cell, links it, and installs its boundary.
    pub(crate) fn insert_cell(&mut self, cell: Cell, parent: NodeKey, next_sibling: Option<NodeKey>) -> NodeKey {
        let key = self.insert_node(NodeKind::Cell(cell), parent, next_sibling);
        self.sync_boundary(key);
        key
    }

    fn link_child(&mut self, node: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>) {
        let Some(group) = self.nodes.get_mut(parent).and_then(Node::as_group_mut) else {
            return;
        };
        let index = next_sibling
            .and_then(|s| group.index_of(s))
            .unwrap_or(group.children.len());
        group.children.insert(index, node);
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = Some(parent);
        }
        self.mark(parent, NodeModificationFlags::CHILDREN_CHANGED);
        self.pending.on_node_inserted(NodeInsertionInfo {
            node,
            parent,
            next_sibling,
        });
    }

    fn unlink_child(&mut self, node: NodeKey) -> Option<NodeKey> {
        let parent = self.nodes.get_mut(node)?.parent.take()?;
        if let Some(group) = self.nodes.get_mut(parent).and_then(Node::as_group_mut) {
            group.children.retain(|&c| c != node);
        }
        self.mark(parent, NodeModificationFlags::CHILDREN_CHANGED);
        Some(parent)
    }

    /// Moves a node to a new position in the group tree.
    pub(crate) fn relink(&mut self, node: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>) {
        let old_parent = self.unlink_child(node);
        self.link_child(node, parent, next_sibling);
        if old_parent != Some(parent) {
            self.mark(node, NodeModificationFlags::REPARENTED);
        }
    }

    /// Boundary a cell should have given its current topology: the end
    /// vertices of an open edge, or for each face cycle its Steiner vertex,
    /// or its edges along with their end vertices.
    pub(crate) fn compute_boundary(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let Some(cell) = self.cell(key) else {
            return out;
        };
        match &cell.kind {
            CellKind::KeyVertex(_) => {}
            CellKind::KeyEdge(e) => {
                if let Some((s, t)) = e.vertices() {
                    push_unique(&mut out, s);
                    push_unique(&mut out, t);
                }
            }
            CellKind::KeyFace(f) => {
                for cycle in &f.cycles {
                    if let Some(v) = cycle.steiner_vertex() {
                        push_unique(&mut out, v);
                    }
                    for h in cycle.halfedges() {
                        push_unique(&mut out, h.edge());
                        if let Some((s, t)) = self.key_edge(h.edge()).and_then(KeyEdge::vertices) {
                            push_unique(&mut out, s);
                            push_unique(&mut out, t);
                        }
                    }
                }
            }
        }
        out
    }

    /// Recomputes the boundary of a cell and updates the stars of the cells
    /// entering or leaving it.
    pub(crate) fn sync_boundary(&mut self, key: NodeKey) {
        let Some(old) = self.cell(key).map(|c| c.boundary.clone()) else {
            return;
        };
        let new = self.compute_boundary(key);
        if old == new {
            return;
        }
        for &b in old.iter().filter(|b| !new.contains(b)) {
            if let Some(bc) = self.cell_mut(b) {
                bc.star.retain(|&s| s != key);
                tracing::trace!(cell = ?key, boundary = ?b, "boundary link removed");
            }
            self.mark(b, NodeModificationFlags::STAR_CHANGED);
        }
        for &b in new.iter().filter(|b| !old.contains(b)) {
            if let Some(bc) = self.cell_mut(b) {
                push_unique(&mut bc.star, key);
                tracing::trace!(cell = ?key, boundary = ?b, "boundary link added");
            }
            self.mark(b, NodeModificationFlags::STAR_CHANGED);
        }
        if let Some(c) = self.cell_mut(key) {
            c.boundary = new;
        }
        self.mark(key, NodeModificationFlags::BOUNDARY_CHANGED);
    }

    /// Snaps an open edge onto the current positions of its end vertices.
    /// Returns `true` if its displayed shape changed.
    pub(crate) fn snap_edge(&mut self, edge: NodeKey) -> bool {
        let Some((s, t)) = self.key_edge(edge).and_then(KeyEdge::vertices) else {
            return false;
        };
        let (Some(ps), Some(pt)) = (self.position(s), self.position(t)) else {
            return false;
        };
        let mode = self.config.snap_mode;
        self.key_edge_mut(edge).is_some_and(|e| e.data.snap(ps, pt, mode))
    }

    /// Drops the cached sampling or fill of a cell.
    pub(crate) fn dirty_mesh(&mut self, key: NodeKey) {
        let Some(cell) = self.cell_mut(key) else {
            return;
        };
        match &mut cell.kind {
            CellKind::KeyVertex(_) => {}
            CellKind::KeyEdge(e) => e.data.dirty_sampling(),
            CellKind::KeyFace(f) => f.dirty_fill(),
        }
    }

    /// Destroys a set of nodes in dependency order: faces, edges, vertices,
    /// then groups with children before parents. The set must be closed
    /// under star and contain the descendants of every group in it.
    ///
    /// Surviving parents and boundary cells are detached in one pass each.
    pub(crate) fn destroy_batch(&mut self, keys: &[NodeKey]) {
        let mut doomed: FxHashSet<NodeKey> = FxHashSet::default();
        let mut ordered: Vec<NodeKey> = keys
            .iter()
            .copied()
            .filter(|&k| self.contains(k) && doomed.insert(k))
            .collect();
        ordered.sort_by_cached_key(|&k| {
            let rank = match self.node_type(k) {
                Some(NodeType::KeyFace) => 0,
                Some(NodeType::KeyEdge) => 1,
                Some(NodeType::KeyVertex) => 2,
                _ => 3,
            };
            (rank, Reverse(self.depth(k)))
        });

        let mut parents: Vec<NodeKey> = Vec::new();
        let mut boundary: Vec<NodeKey> = Vec::new();
        let mut touched: FxHashSet<NodeKey> = FxHashSet::default();
        for &k in &ordered {
            let Some(node) = self.nodes.get(k) else {
                continue;
            };
            if let Some(p) = node.parent.filter(|p| !doomed.contains(p)) {
                if touched.insert(p) {
                    parents.push(p);
                }
            }
            if let Some(cell) = node.as_cell() {
                for &b in cell.boundary.iter().filter(|b| !doomed.contains(b)) {
                    if touched.insert(b) {
                        boundary.push(b);
                    }
                }
            }
        }
        for p in parents {
            if let Some(group) = self.nodes.get_mut(p).and_then(Node::as_group_mut) {
                group.children.retain(|c| !doomed.contains(c));
            }
            self.mark(p, NodeModificationFlags::CHILDREN_CHANGED);
        }
        for b in boundary {
            if let Some(bc) = self.cell_mut(b) {
                bc.star.retain(|s| !doomed.contains(s));
            }
            self.mark(b, NodeModificationFlags::STAR_CHANGED);
        }

        for k in ordered {
            if let Some(node) = self.nodes.remove(k) {
                self.ids.remove(&node.id);
                tracing::trace!(key = ?k, id = %node.id, "node destroyed");
            }
            self.pending.on_node_destroyed(k);
        }
    }
}

pub(crate) fn push_unique(list: &mut Vec<NodeKey>, key: NodeKey) {
    if !list.contains(&key) {
        list.push(key);
    }
}
