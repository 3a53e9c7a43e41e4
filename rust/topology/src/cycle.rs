// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Halfedges and cycles bounding key faces.
//!
//! A [`KeyCycle`] is either a single Steiner vertex (a point-like hole or
//! outline) or a closed chain of [`KeyHalfedge`]s. A chain is closed when the
//! end vertex of every halfedge is the start vertex of the next one, wrapping
//! around. A chain made of a closed edge repeats that same edge in the same
//! direction.

use crate::complex::Complex;
use crate::error::{Error, Result};
use crate::keys::NodeKey;

/// An edge traversed in a given direction (`true` = start to end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHalfedge {
    edge: NodeKey,
    direction: bool,
}

impl KeyHalfedge {
    pub fn new(edge: NodeKey, direction: bool) -> Self {
        Self { edge, direction }
    }

    pub fn edge(&self) -> NodeKey {
        self.edge
    }

    pub fn direction(&self) -> bool {
        self.direction
    }

    pub fn opposite(&self) -> Self {
        Self::new(self.edge, !self.direction)
    }

    /// Vertex this halfedge leaves from, `None` for closed or missing edges.
    pub fn start_vertex(&self, complex: &Complex) -> Option<NodeKey> {
        let edge = complex.key_edge(self.edge)?;
        if self.direction {
            edge.start_vertex()
        } else {
            edge.end_vertex()
        }
    }

    /// Vertex this halfedge arrives at, `None` for closed or missing edges.
    pub fn end_vertex(&self, complex: &Complex) -> Option<NodeKey> {
        let edge = complex.key_edge(self.edge)?;
        if self.direction {
            edge.end_vertex()
        } else {
            edge.start_vertex()
        }
    }

    pub fn is_closed(&self, complex: &Complex) -> bool {
        complex.key_edge(self.edge).is_some_and(|e| e.is_closed())
    }
}

/// A closed boundary component of a key face.
///
/// The default value is the empty, invalid cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCycle {
    steiner_vertex: Option<NodeKey>,
    halfedges: Vec<KeyHalfedge>,
}

impl KeyCycle {
    /// Cycle made of a single Steiner vertex. Returns the invalid cycle if
    /// `vertex` is not a key vertex of `complex`.
    pub fn from_steiner_vertex(complex: &Complex, vertex: NodeKey) -> Self {
        if complex.key_vertex(vertex).is_none() {
            return Self::default();
        }
        Self {
            steiner_vertex: Some(vertex),
            halfedges: Vec::new(),
        }
    }

    /// Cycle made of a chain of halfedges. Returns the invalid cycle if the
    /// chain does not close.
    pub fn from_halfedges(complex: &Complex, halfedges: Vec<KeyHalfedge>) -> Self {
        match Self::check_halfedges(complex, &halfedges) {
            Ok(()) => Self {
                steiner_vertex: None,
                halfedges,
            },
            Err(_) => Self::default(),
        }
    }

    /// Builds a cycle from parts already known to be consistent.
    pub(crate) fn from_parts(steiner_vertex: Option<NodeKey>, halfedges: Vec<KeyHalfedge>) -> Self {
        Self {
            steiner_vertex,
            halfedges,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.steiner_vertex.is_some() || !self.halfedges.is_empty()
    }

    pub fn steiner_vertex(&self) -> Option<NodeKey> {
        self.steiner_vertex
    }

    pub fn halfedges(&self) -> &[KeyHalfedge] {
        &self.halfedges
    }

    /// Edges of the chain, in traversal order, with repetitions.
    pub fn edges(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.halfedges.iter().map(|h| h.edge)
    }

    /// The same cycle traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            steiner_vertex: self.steiner_vertex,
            halfedges: self.halfedges.iter().rev().map(|h| h.opposite()).collect(),
        }
    }

    /// Checks this cycle against the current state of `complex`.
    pub fn validate(&self, complex: &Complex) -> Result<()> {
        match (self.steiner_vertex, self.halfedges.is_empty()) {
            (Some(v), true) => {
                if complex.key_vertex(v).is_some() {
                    Ok(())
                } else {
                    Err(Error::InvalidCycle(format!("Steiner vertex {v:?} is not a key vertex")))
                }
            }
            (Some(_), false) => Err(Error::InvalidCycle(
                "a cycle cannot mix a Steiner vertex and halfedges".into(),
            )),
            (None, true) => Err(Error::InvalidCycle("empty cycle".into())),
            (None, false) => Self::check_halfedges(complex, &self.halfedges),
        }
    }

    fn check_halfedges(complex: &Complex, halfedges: &[KeyHalfedge]) -> Result<()> {
        let first = halfedges
            .first()
            .ok_or_else(|| Error::InvalidCycle("empty cycle".into()))?;
        for h in halfedges {
            if complex.key_edge(h.edge).is_none() {
                return Err(Error::InvalidCycle(format!("{:?} is not a key edge", h.edge)));
            }
        }

        if first.is_closed(complex) {
            if halfedges.iter().any(|h| h != first) {
                return Err(Error::InvalidCycle(
                    "a closed edge cycle must repeat the same halfedge".into(),
                ));
            }
            return Ok(());
        }

        for (i, h) in halfedges.iter().enumerate() {
            if h.is_closed(complex) {
                return Err(Error::InvalidCycle(
                    "closed and open edges cannot be mixed in a cycle".into(),
                ));
            }
            let next = &halfedges[(i + 1) % halfedges.len()];
            if h.end_vertex(complex) != next.start_vertex(complex) {
                return Err(Error::InvalidCycle(format!(
                    "halfedge {i} does not end where halfedge {} starts",
                    (i + 1) % halfedges.len()
                )));
            }
        }
        Ok(())
    }

    /// Replaces every use of `old` by `new`. Directions are mapped so that a
    /// halfedge traversing `old` as `reference` traverses `new` forward.
    pub(crate) fn substitute_edge(&mut self, old: KeyHalfedge, new_edge: NodeKey) -> bool {
        let mut changed = false;
        for h in &mut self.halfedges {
            if h.edge == old.edge {
                *h = KeyHalfedge::new(new_edge, h.direction == old.direction);
                changed = true;
            }
        }
        changed
    }

    pub(crate) fn substitute_steiner_vertex(&mut self, old: NodeKey, new: NodeKey) -> bool {
        if self.steiner_vertex == Some(old) {
            self.steiner_vertex = Some(new);
            true
        } else {
            false
        }
    }

    pub(crate) fn halfedges_mut(&mut self) -> &mut Vec<KeyHalfedge> {
        &mut self.halfedges
    }
}
