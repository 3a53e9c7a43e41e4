// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node data stored in the [`Complex`](crate::Complex) node table.
//!
//! A node is either a [`Group`] (an ordered list of children plus a 2D affine
//! transform) or a [`Cell`]. Cells carry their boundary and star as key
//! lists: the boundary is what the cell depends on, the star is the inverse
//! relation. Both lists are only ever edited by the complex, as matched pairs.

use std::cell::OnceCell;

use nalgebra::{Matrix3, Point2};

use crate::cycle::KeyCycle;
use crate::edge_data::KeyEdgeData;
use crate::geometry::FaceFill;
use crate::keys::{AnimTime, Id, NodeKey, NodeType};
use crate::property::CellProperties;

/// A node of the complex: a group or a cell, linked into the group tree.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: Id,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) kind: NodeKind,
}

/// Closed set of node variants.
#[derive(Debug)]
pub enum NodeKind {
    Group(Group),
    Cell(Cell),
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            id: Id::generate(),
            parent: None,
            kind,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Parent group, `None` only for the root group.
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            NodeKind::Group(_) => NodeType::Group,
            NodeKind::Cell(cell) => cell.cell_type(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn is_cell(&self) -> bool {
        matches!(self.kind, NodeKind::Cell(_))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            NodeKind::Group(g) => Some(g),
            NodeKind::Cell(_) => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            NodeKind::Group(g) => Some(g),
            NodeKind::Cell(_) => None,
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match &self.kind {
            NodeKind::Cell(c) => Some(c),
            NodeKind::Group(_) => None,
        }
    }

    pub(crate) fn as_cell_mut(&mut self) -> Option<&mut Cell> {
        match &mut self.kind {
            NodeKind::Cell(c) => Some(c),
            NodeKind::Group(_) => None,
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

/// An ordered container of nodes. Children are stored back to front.
#[derive(Debug, Clone)]
pub struct Group {
    pub(crate) children: Vec<NodeKey>,
    pub(crate) transform: Matrix3<f64>,
}

impl Group {
    pub(crate) fn new() -> Self {
        Self {
            children: Vec::new(),
            transform: Matrix3::identity(),
        }
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Homogeneous 2D affine transform applied to the children.
    pub fn transform(&self) -> &Matrix3<f64> {
        &self.transform
    }

    pub(crate) fn index_of(&self, child: NodeKey) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }
}

// ============================================================================
// Cells
// ============================================================================

/// A topological cell: key vertex, key edge or key face.
#[derive(Debug)]
pub struct Cell {
    pub(crate) time: AnimTime,
    pub(crate) boundary: Vec<NodeKey>,
    pub(crate) star: Vec<NodeKey>,
    pub(crate) properties: CellProperties,
    pub(crate) kind: CellKind,
}

#[derive(Debug)]
pub enum CellKind {
    KeyVertex(KeyVertex),
    KeyEdge(KeyEdge),
    KeyFace(KeyFace),
}

impl Cell {
    pub(crate) fn new(kind: CellKind, time: AnimTime) -> Self {
        Self {
            time,
            boundary: Vec::new(),
            star: Vec::new(),
            properties: CellProperties::default(),
            kind,
        }
    }

    pub fn cell_type(&self) -> NodeType {
        match &self.kind {
            CellKind::KeyVertex(_) => NodeType::KeyVertex,
            CellKind::KeyEdge(_) => NodeType::KeyEdge,
            CellKind::KeyFace(_) => NodeType::KeyFace,
        }
    }

    pub fn time(&self) -> AnimTime {
        self.time
    }

    /// Cells this cell depends on, in first-seen order.
    pub fn boundary(&self) -> &[NodeKey] {
        &self.boundary
    }

    /// Cells depending on this cell.
    pub fn star(&self) -> &[NodeKey] {
        &self.star
    }

    pub fn properties(&self) -> &CellProperties {
        &self.properties
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn as_key_vertex(&self) -> Option<&KeyVertex> {
        match &self.kind {
            CellKind::KeyVertex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_key_edge(&self) -> Option<&KeyEdge> {
        match &self.kind {
            CellKind::KeyEdge(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_key_face(&self) -> Option<&KeyFace> {
        match &self.kind {
            CellKind::KeyFace(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_key_vertex_mut(&mut self) -> Option<&mut KeyVertex> {
        match &mut self.kind {
            CellKind::KeyVertex(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_key_edge_mut(&mut self) -> Option<&mut KeyEdge> {
        match &mut self.kind {
            CellKind::KeyEdge(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn as_key_face_mut(&mut self) -> Option<&mut KeyFace> {
        match &mut self.kind {
            CellKind::KeyFace(f) => Some(f),
            _ => None,
        }
    }
}

/// A vertex at a fixed time.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyVertex {
    pub(crate) position: Point2<f64>,
}

impl KeyVertex {
    pub fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// An edge at a fixed time. Open edges have both a start and an end vertex
/// (possibly the same one); closed edges have neither.
#[derive(Debug, Clone)]
pub struct KeyEdge {
    pub(crate) start: Option<NodeKey>,
    pub(crate) end: Option<NodeKey>,
    pub(crate) data: KeyEdgeData,
}

impl KeyEdge {
    pub fn is_closed(&self) -> bool {
        self.start.is_none()
    }

    pub fn start_vertex(&self) -> Option<NodeKey> {
        self.start
    }

    pub fn end_vertex(&self) -> Option<NodeKey> {
        self.end
    }

    /// Start and end vertices of an open edge.
    pub fn vertices(&self) -> Option<(NodeKey, NodeKey)> {
        Some((self.start?, self.end?))
    }

    /// Returns `true` if both ends of an open edge are the same vertex.
    pub fn is_loop(&self) -> bool {
        matches!(self.vertices(), Some((s, e)) if s == e)
    }

    pub fn data(&self) -> &KeyEdgeData {
        &self.data
    }
}

/// A face at a fixed time, bounded by one or more cycles.
#[derive(Debug)]
pub struct KeyFace {
    pub(crate) cycles: Vec<KeyCycle>,
    pub(crate) fill: OnceCell<FaceFill>,
}

impl KeyFace {
    pub(crate) fn new(cycles: Vec<KeyCycle>) -> Self {
        Self {
            cycles,
            fill: OnceCell::new(),
        }
    }

    pub fn cycles(&self) -> &[KeyCycle] {
        &self.cycles
    }

    pub(crate) fn dirty_fill(&mut self) {
        self.fill.take();
    }
}
