// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The operations engine: the single point of mutation of a complex.
//!
//! An [`Operations`] value is a scoped guard over one operation group. It
//! borrows the complex mutably, flips it to
//! [`OperationState::OperationInProgress`](crate::OperationState), and
//! restores the idle state when finished or dropped, emitting the
//! accumulated diff once.
//!
//! Each entry point validates its preconditions before touching anything,
//! updates boundaries and stars as matched pairs, drops stale caches and
//! records the change. There is no rollback: an error returned after
//! mutation started leaves the complex in whatever state was reached.
//!
//! Gluing, ungluing and simplification live in their own modules
//! (`glue.rs`, `simplify.rs`, `transform.rs`) as further `impl Operations`
//! blocks.

use nalgebra::{Matrix3, Point2};
use rustc_hash::FxHashSet;

use crate::complex::Complex;
use crate::cycle::KeyCycle;
use crate::diff::{ComplexDiff, NodeModificationFlags as Flags};
use crate::dom::{self, DomElement};
use crate::edge_data::KeyEdgeData;
use crate::error::{Error, Result};
use crate::keys::{AnimTime, NodeKey, NodeType};
use crate::node::{Cell, CellKind, Group, KeyEdge, KeyFace, KeyVertex, NodeKind};
use crate::property::{CellProperty, UpdateResult};
use crate::stroke::{SamplingQuality, StrokeModel};

/// Scoped operation group over a [`Complex`].
#[derive(Debug)]
pub struct Operations<'a> {
    pub(crate) complex: &'a mut Complex,
    finished: bool,
}

impl<'a> Operations<'a> {
    /// Opens an operation group. Fails if one is already running.
    pub fn new(complex: &'a mut Complex) -> Result<Self> {
        complex.begin_operation()?;
        Ok(Self {
            complex,
            finished: false,
        })
    }

    /// Read access to the complex being edited.
    pub fn complex(&self) -> &Complex {
        self.complex
    }

    /// Ends the group and returns the emitted diff.
    pub fn finish(mut self) -> ComplexDiff {
        self.finished = true;
        self.complex.end_operation()
    }
}

impl Drop for Operations<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.complex.end_operation();
        }
    }
}

impl Operations<'_> {
    // ========================================================================
    // Creation
    // ========================================================================

    pub fn create_group(&mut self, parent: NodeKey, next_sibling: Option<NodeKey>) -> Result<NodeKey> {
        self.complex.check_insertion_point(parent, next_sibling)?;
        let key = self
            .complex
            .insert_node(NodeKind::Group(Group::new()), parent, next_sibling);
        tracing::debug!(?key, ?parent, "created group");
        Ok(key)
    }

    pub fn create_key_vertex(
        &mut self,
        position: Point2<f64>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        time: AnimTime,
    ) -> Result<NodeKey> {
        self.complex.check_insertion_point(parent, next_sibling)?;
        let cell = Cell::new(CellKind::KeyVertex(KeyVertex { position }), time);
        let key = self.complex.insert_cell(cell, parent, next_sibling);
        tracing::debug!(?key, x = position.x, y = position.y, "created key vertex");
        Ok(key)
    }

    /// Creates an edge from `start` to `end`. The stroke is snapped onto the
    /// vertex positions.
    pub fn create_key_open_edge(
        &mut self,
        start: NodeKey,
        end: NodeKey,
        stroke: Box<dyn StrokeModel>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        time: AnimTime,
    ) -> Result<NodeKey> {
        self.complex.check_insertion_point(parent, next_sibling)?;
        self.complex.expect_cell(start, NodeType::KeyVertex)?;
        self.complex.expect_cell(end, NodeType::KeyVertex)?;
        if stroke.is_closed() {
            return Err(Error::InvalidArgument(
                "an open edge needs an open stroke".into(),
            ));
        }
        let key = self.insert_edge(Some((start, end)), stroke, parent, next_sibling, time);
        tracing::debug!(?key, ?start, ?end, "created open key edge");
        Ok(key)
    }

    pub fn create_key_closed_edge(
        &mut self,
        stroke: Box<dyn StrokeModel>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        time: AnimTime,
    ) -> Result<NodeKey> {
        self.complex.check_insertion_point(parent, next_sibling)?;
        if !stroke.is_closed() {
            return Err(Error::InvalidArgument(
                "a closed edge needs a closed stroke".into(),
            ));
        }
        let key = self.insert_edge(None, stroke, parent, next_sibling, time);
        tracing::debug!(?key, "created closed key edge");
        Ok(key)
    }

    pub(crate) fn insert_edge(
        &mut self,
        vertices: Option<(NodeKey, NodeKey)>,
        stroke: Box<dyn StrokeModel>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        time: AnimTime,
    ) -> NodeKey {
        let data = KeyEdgeData::new(stroke, self.complex.config().default_sampling_quality);
        let edge = KeyEdge {
            start: vertices.map(|v| v.0),
            end: vertices.map(|v| v.1),
            data,
        };
        let cell = Cell::new(CellKind::KeyEdge(edge), time);
        let key = self.complex.insert_cell(cell, parent, next_sibling);
        self.complex.snap_edge(key);
        key
    }

    /// Creates a face bounded by `cycles`, each of which must be valid.
    pub fn create_key_face(
        &mut self,
        cycles: Vec<KeyCycle>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        time: AnimTime,
    ) -> Result<NodeKey> {
        self.complex.check_insertion_point(parent, next_sibling)?;
        if cycles.is_empty() {
            return Err(Error::InvalidArgument("a face needs at least one cycle".into()));
        }
        for cycle in &cycles {
            cycle.validate(self.complex)?;
        }
        let n = cycles.len();
        let key = self.insert_face(cycles, parent, next_sibling, time);
        tracing::debug!(?key, cycles = n, "created key face");
        Ok(key)
    }

    pub(crate) fn insert_face(
        &mut self,
        cycles: Vec<KeyCycle>,
        parent: NodeKey,
        next_sibling: Option<NodeKey>,
        time: AnimTime,
    ) -> NodeKey {
        let cell = Cell::new(CellKind::KeyFace(KeyFace::new(cycles)), time);
        self.complex.insert_cell(cell, parent, next_sibling)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Destroys `node`, its descendants, and every cell depending on them.
    pub fn hard_delete(&mut self, node: NodeKey, delete_isolated_vertices: bool) -> Result<()> {
        let doomed = self.deletion_set(&[node], delete_isolated_vertices)?;
        tracing::debug!(?node, count = doomed.len(), "hard delete");
        self.complex.destroy_batch(&doomed);
        Ok(())
    }

    /// Destroys several nodes at once: the dependent closure of all inputs
    /// is computed first, then destroyed as one batch.
    pub fn soft_delete(&mut self, nodes: &[NodeKey], delete_isolated_vertices: bool) -> Result<()> {
        let doomed = self.deletion_set(nodes, delete_isolated_vertices)?;
        tracing::debug!(inputs = nodes.len(), count = doomed.len(), "soft delete");
        self.complex.destroy_batch(&doomed);
        Ok(())
    }

    /// Inputs, their descendants and their stars, plus the boundary vertices
    /// left without any incident cell if requested.
    fn deletion_set(&self, nodes: &[NodeKey], delete_isolated_vertices: bool) -> Result<Vec<NodeKey>> {
        let mut roots: Vec<NodeKey> = Vec::new();
        for &node in nodes {
            self.complex.expect_node(node)?;
            if node == self.complex.root() {
                tracing::warn!("rejected deletion of the root group");
                return Err(Error::RootGroup);
            }
            roots.push(node);
            roots.extend(self.complex.descendants(node));
        }

        let mut doomed = self.complex.star_of(&roots);
        if delete_isolated_vertices {
            let members: FxHashSet<NodeKey> = doomed.iter().copied().collect();
            let mut isolated = Vec::new();
            let mut checked: FxHashSet<NodeKey> = FxHashSet::default();
            for &k in &doomed {
                for &b in self.complex.boundary(k) {
                    if members.contains(&b) || !checked.insert(b) {
                        continue;
                    }
                    let is_vertex = self.complex.key_vertex(b).is_some();
                    if is_vertex && self.complex.star(b).iter().all(|s| members.contains(s)) {
                        isolated.push(b);
                    }
                }
            }
            doomed.extend(isolated);
        }
        Ok(doomed)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Moves `node` into `parent`, before `next_sibling` (or last).
    pub fn move_to_group(&mut self, node: NodeKey, parent: NodeKey, next_sibling: Option<NodeKey>) -> Result<()> {
        self.complex.expect_node(node)?;
        if node == self.complex.root() {
            return Err(Error::RootGroup);
        }
        self.complex.check_insertion_point(parent, next_sibling)?;
        if node == parent || self.complex.is_descendant(parent, node) {
            return Err(Error::CyclicParenting { node, parent });
        }
        if next_sibling == Some(node) {
            return Ok(());
        }
        let current_parent = self.complex.parent(node);
        let current_next = self.complex.next_sibling(node);
        if current_parent == Some(parent) && current_next == next_sibling {
            return Ok(());
        }
        self.complex.relink(node, parent, next_sibling);
        tracing::debug!(?node, ?parent, ?next_sibling, "moved node");
        Ok(())
    }

    /// Moves a cell just below the lowest sibling that is, or contains, one
    /// of its boundary cells, so that it is drawn under them. Returns `true`
    /// if it moved.
    pub fn move_below_boundary(&mut self, node: NodeKey) -> Result<bool> {
        let cell = self.complex.expect_any_cell(node)?;
        let Some(parent) = self.complex.parent(node) else {
            return Ok(false);
        };
        let boundary: FxHashSet<NodeKey> = cell.boundary().iter().copied().collect();
        if boundary.is_empty() {
            return Ok(false);
        }
        let siblings = self.complex.children(parent);
        let Some(index) = siblings.iter().position(|&k| k == node) else {
            return Ok(false);
        };
        let lowest = siblings[..index].iter().copied().find(|&s| {
            boundary.contains(&s)
                || (self.complex.group(s).is_some()
                    && self.complex.descendants(s).iter().any(|d| boundary.contains(d)))
        });
        match lowest {
            Some(next_sibling) => {
                self.complex.relink(node, parent, Some(next_sibling));
                tracing::debug!(?node, ?next_sibling, "moved below boundary");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_group_transform(&mut self, group: NodeKey, transform: Matrix3<f64>) -> Result<()> {
        self.complex.expect_group(group)?;
        if let Some(g) = self.complex.nodes.get_mut(group).and_then(|n| n.as_group_mut()) {
            if g.transform == transform {
                return Ok(());
            }
            g.transform = transform;
        }
        self.complex.mark(group, Flags::TRANSFORM_CHANGED);
        Ok(())
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    pub fn set_key_vertex_position(&mut self, vertex: NodeKey, position: Point2<f64>) -> Result<()> {
        self.complex.expect_cell(vertex, NodeType::KeyVertex)?;
        if let Some(v) = self.complex.key_vertex_mut(vertex) {
            if v.position == position {
                return Ok(());
            }
            v.position = position;
        }
        self.complex
            .mark(vertex, Flags::GEOMETRY_CHANGED | Flags::MESH_CHANGED);
        self.on_boundary_geometry_changed(&[vertex]);
        tracing::debug!(?vertex, x = position.x, y = position.y, "moved key vertex");
        Ok(())
    }

    /// Replaces the authored stroke of an edge. Its closedness must match.
    pub fn set_key_edge_geometry(&mut self, edge: NodeKey, stroke: Box<dyn StrokeModel>) -> Result<()> {
        self.complex.expect_cell(edge, NodeType::KeyEdge)?;
        let closed = self.complex.key_edge(edge).is_some_and(KeyEdge::is_closed);
        if closed != stroke.is_closed() {
            return Err(Error::InvalidArgument(
                "the new stroke must have the closedness of the edge".into(),
            ));
        }
        if let Some(e) = self.complex.key_edge_mut(edge) {
            e.data.set_stroke(stroke);
        }
        self.complex.snap_edge(edge);
        self.on_edge_geometry_changed(edge);
        self.on_boundary_geometry_changed(&[edge]);
        tracing::debug!(?edge, "replaced key edge geometry");
        Ok(())
    }

    pub fn set_key_edge_sampling_quality(&mut self, edge: NodeKey, quality: SamplingQuality) -> Result<()> {
        self.complex.expect_cell(edge, NodeType::KeyEdge)?;
        let changed = self
            .complex
            .key_edge_mut(edge)
            .is_some_and(|e| e.data.set_sampling_quality(quality));
        if changed {
            self.complex.mark(edge, Flags::GEOMETRY_CHANGED | Flags::MESH_CHANGED);
            self.on_boundary_geometry_changed(&[edge]);
        }
        Ok(())
    }

    /// Reloads the authored stroke of an edge from its document element.
    /// Returns `true` if the stroke changed.
    pub fn update_key_edge_from_dom(&mut self, edge: NodeKey, element: &dyn DomElement) -> Result<bool> {
        self.complex.expect_cell(edge, NodeType::KeyEdge)?;
        let changed = match self.complex.key_edge_mut(edge) {
            Some(e) => e.data.update_from_dom_edge(element)?,
            None => false,
        };
        if changed {
            self.complex.snap_edge(edge);
            self.on_edge_geometry_changed(edge);
            self.on_boundary_geometry_changed(&[edge]);
            tracing::debug!(?edge, "reloaded key edge from document");
        }
        Ok(changed)
    }

    /// Reloads the position of a vertex from its document element. Returns
    /// `true` if the vertex moved.
    pub fn update_key_vertex_from_dom(&mut self, vertex: NodeKey, element: &dyn DomElement) -> Result<bool> {
        self.complex.expect_cell(vertex, NodeType::KeyVertex)?;
        let Some(position) = dom::read_vertex_position(element)? else {
            return Ok(false);
        };
        if self.complex.position(vertex) == Some(position) {
            return Ok(false);
        }
        self.set_key_vertex_position(vertex, position)?;
        Ok(true)
    }

    /// Flags an edge whose displayed stroke changed and lets its properties
    /// react.
    pub(crate) fn on_edge_geometry_changed(&mut self, edge: NodeKey) {
        let mut flags = Flags::GEOMETRY_CHANGED | Flags::MESH_CHANGED;
        if let Some(cell) = self.complex.cell_mut(edge) {
            if let CellKind::KeyEdge(e) = &cell.kind {
                let stroke = e.data.snapped_stroke().clone_box();
                if cell.properties.on_update_geometry(stroke.as_ref()) == UpdateResult::Changed {
                    flags |= Flags::PROPERTIES_CHANGED;
                }
            }
        }
        self.complex.mark(edge, flags);
    }

    /// Propagates a geometry change of `cells` to their stars: edges are
    /// snapped again and faces drop their fill.
    pub(crate) fn on_boundary_geometry_changed(&mut self, cells: &[NodeKey]) {
        let changed: FxHashSet<NodeKey> = cells.iter().copied().collect();
        let star: Vec<NodeKey> = self
            .complex
            .star_of(cells)
            .into_iter()
            .filter(|k| !changed.contains(k))
            .collect();
        // Edges first: faces depend on their sampling.
        for &k in &star {
            if self.complex.key_edge(k).is_some() {
                if self.complex.snap_edge(k) {
                    self.on_edge_geometry_changed(k);
                }
                self.complex.dirty_mesh(k);
                self.complex.mark(k, Flags::BOUNDARY_MESH_CHANGED);
            }
        }
        for &k in &star {
            if self.complex.key_face(k).is_some() {
                self.complex.dirty_mesh(k);
                self.complex
                    .mark(k, Flags::MESH_CHANGED | Flags::BOUNDARY_MESH_CHANGED);
            }
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Attaches a property to a cell, replacing any property of the same name.
    pub fn insert_cell_property(&mut self, cell: NodeKey, property: Box<dyn CellProperty>) -> Result<()> {
        self.complex.expect_any_cell(cell)?;
        if let Some(c) = self.complex.cell_mut(cell) {
            c.properties.insert(property);
        }
        self.complex.mark(cell, Flags::PROPERTIES_CHANGED);
        Ok(())
    }

    /// Returns `true` if the property existed.
    pub fn remove_cell_property(&mut self, cell: NodeKey, name: &str) -> Result<bool> {
        self.complex.expect_any_cell(cell)?;
        let removed = self
            .complex
            .cell_mut(cell)
            .is_some_and(|c| c.properties.remove(name));
        if removed {
            self.complex.mark(cell, Flags::PROPERTIES_CHANGED);
        }
        Ok(removed)
    }

    /// Returns `true` if the cell had any property.
    pub fn clear_cell_properties(&mut self, cell: NodeKey) -> Result<bool> {
        self.complex.expect_any_cell(cell)?;
        let cleared = self.complex.cell_mut(cell).is_some_and(|c| c.properties.clear());
        if cleared {
            self.complex.mark(cell, Flags::PROPERTIES_CHANGED);
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::CatmullRomStroke;
    use crate::style::{Color, ColorProperty};
    use approx::assert_relative_eq;

    fn segment(a: Point2<f64>, b: Point2<f64>) -> Box<dyn StrokeModel> {
        Box::new(CatmullRomStroke::segment(a, b, 1.0))
    }

    #[test]
    fn next_sibling_must_be_a_child_of_parent() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let g = ops.create_group(root, None).unwrap();
        let v = ops.create_key_vertex(Point2::origin(), root, None, AnimTime::default()).unwrap();
        let err = ops
            .create_key_vertex(Point2::origin(), g, Some(v), AnimTime::default())
            .unwrap_err();
        assert_eq!(err, Error::NotAChild { node: v, parent: g });
        let err = ops.create_group(v, None).unwrap_err();
        assert!(matches!(err, Error::WrongNodeType { expected: NodeType::Group, .. }));
    }

    #[test]
    fn open_edge_is_snapped_to_its_vertices() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, AnimTime::default()).unwrap();
        let b = ops.create_key_vertex(Point2::new(4.0, 0.0), root, None, AnimTime::default()).unwrap();
        let e = ops
            .create_key_open_edge(a, b, segment(Point2::new(0.5, 0.5), Point2::new(3.0, 1.0)), root, None, AnimTime::default())
            .unwrap();
        ops.finish();
        let (start, end) = complex.key_edge(e).unwrap().data().snapped_stroke().endpoints().unwrap();
        assert_eq!(start, Point2::new(0.0, 0.0));
        assert_eq!(end, Point2::new(4.0, 0.0));
    }

    #[test]
    fn stroke_closedness_must_match() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let err = ops
            .create_key_closed_edge(segment(Point2::origin(), Point2::new(1.0, 0.0)), root, None, AnimTime::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn moving_a_vertex_resnaps_and_flags_its_star() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, AnimTime::default()).unwrap();
        let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, AnimTime::default()).unwrap();
        let e = ops
            .create_key_open_edge(a, b, segment(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)), root, None, AnimTime::default())
            .unwrap();
        ops.finish();
        complex.edge_sampling(e).unwrap();

        let mut ops = Operations::new(&mut complex).unwrap();
        ops.set_key_vertex_position(b, Point2::new(2.0, 0.0)).unwrap();
        let diff = ops.finish();

        assert!(diff.modification_flags(b).contains(Flags::GEOMETRY_CHANGED | Flags::MESH_CHANGED));
        assert!(diff.modification_flags(e).contains(Flags::BOUNDARY_MESH_CHANGED));
        let sampling = complex.edge_sampling(e).unwrap();
        assert_relative_eq!(sampling.length(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn move_to_group_rejects_cycles_and_root() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let outer = ops.create_group(root, None).unwrap();
        let inner = ops.create_group(outer, None).unwrap();
        assert_eq!(
            ops.move_to_group(outer, inner, None),
            Err(Error::CyclicParenting { node: outer, parent: inner })
        );
        assert_eq!(ops.move_to_group(root, outer, None), Err(Error::RootGroup));
        ops.move_to_group(inner, root, Some(outer)).unwrap();
        let diff = ops.finish();
        assert_eq!(complex.children(root), &[inner, outer]);
        // Created in the same group, so reported as created only.
        assert!(diff.modification_flags(inner).is_empty());
    }

    #[test]
    fn reparenting_is_flagged() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let g = ops.create_group(root, None).unwrap();
        let v = ops.create_key_vertex(Point2::origin(), root, None, AnimTime::default()).unwrap();
        ops.finish();

        let mut ops = Operations::new(&mut complex).unwrap();
        ops.move_to_group(v, g, None).unwrap();
        let diff = ops.finish();
        assert!(diff.modification_flags(v).contains(Flags::REPARENTED));
        assert!(diff.modification_flags(g).contains(Flags::CHILDREN_CHANGED));
        assert!(diff.modification_flags(root).contains(Flags::CHILDREN_CHANGED));
        assert_eq!(diff.insertions().len(), 1);
    }

    #[test]
    fn move_below_boundary_draws_edge_under_vertices() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, AnimTime::default()).unwrap();
        let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, AnimTime::default()).unwrap();
        let e = ops
            .create_key_open_edge(a, b, segment(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)), root, None, AnimTime::default())
            .unwrap();
        assert!(ops.move_below_boundary(e).unwrap());
        assert!(!ops.move_below_boundary(e).unwrap());
        ops.finish();
        assert_eq!(complex.children(root), &[e, a, b]);
    }

    #[test]
    fn move_below_boundary_finds_vertices_inside_subgroups() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let other = ops.create_key_vertex(Point2::new(5.0, 5.0), root, None, AnimTime::default()).unwrap();
        let g = ops.create_group(root, None).unwrap();
        let a = ops.create_key_vertex(Point2::new(0.0, 0.0), g, None, AnimTime::default()).unwrap();
        let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, AnimTime::default()).unwrap();
        let e = ops
            .create_key_open_edge(a, b, segment(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)), root, None, AnimTime::default())
            .unwrap();
        assert!(ops.move_below_boundary(e).unwrap());
        ops.finish();
        assert_eq!(complex.children(root), &[other, e, g, b]);
    }

    #[test]
    fn sampling_quality_change_is_a_geometry_change() {
        let mut complex = Complex::new();
        let root = complex.root();
        let e = {
            let mut ops = Operations::new(&mut complex).unwrap();
            let a = ops.create_key_vertex(Point2::new(0.0, 0.0), root, None, AnimTime::default()).unwrap();
            let b = ops.create_key_vertex(Point2::new(1.0, 0.0), root, None, AnimTime::default()).unwrap();
            ops.create_key_open_edge(a, b, segment(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)), root, None, AnimTime::default())
                .unwrap()
        };
        let mut ops = Operations::new(&mut complex).unwrap();
        ops.set_key_edge_sampling_quality(e, SamplingQuality::High).unwrap();
        let diff = ops.finish();
        assert!(diff
            .modification_flags(e)
            .contains(Flags::GEOMETRY_CHANGED | Flags::MESH_CHANGED));

        let mut ops = Operations::new(&mut complex).unwrap();
        ops.set_key_edge_sampling_quality(e, SamplingQuality::High).unwrap();
        assert!(ops.finish().is_empty());
    }

    #[test]
    fn property_edits_are_flagged() {
        let mut complex = Complex::new();
        let root = complex.root();
        let v = {
            let mut ops = Operations::new(&mut complex).unwrap();
            ops.create_key_vertex(Point2::origin(), root, None, AnimTime::default()).unwrap()
        };
        let mut ops = Operations::new(&mut complex).unwrap();
        ops.insert_cell_property(v, Box::new(ColorProperty::new(Color::rgb(1.0, 0.0, 0.0)))).unwrap();
        assert!(ops.remove_cell_property(v, "color").unwrap());
        assert!(!ops.clear_cell_properties(v).unwrap());
        let diff = ops.finish();
        assert_eq!(diff.modification_flags(v), Flags::PROPERTIES_CHANGED);

        let mut ops = Operations::new(&mut complex).unwrap();
        assert!(matches!(ops.clear_cell_properties(root), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn group_transform_is_flagged() {
        let mut complex = Complex::new();
        let root = complex.root();
        let g = {
            let mut ops = Operations::new(&mut complex).unwrap();
            ops.create_group(root, None).unwrap()
        };
        let mut ops = Operations::new(&mut complex).unwrap();
        ops.set_group_transform(g, Matrix3::new_translation(&nalgebra::Vector2::new(1.0, 2.0))).unwrap();
        let diff = ops.finish();
        assert_eq!(diff.modification_flags(g), Flags::TRANSFORM_CHANGED);
        assert_relative_eq!(complex.group(g).unwrap().transform()[(0, 2)], 1.0);
    }
}
