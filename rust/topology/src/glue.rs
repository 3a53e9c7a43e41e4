// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gluing and ungluing of cells.
//!
//! Gluing replaces several vertices (or edges) by a single new one and
//! rewires every incident cell onto it. Ungluing is the inverse: a vertex
//! or edge used in several independent ways is split into one cell per use.
//!
//! Uses of a vertex come in three kinds: edge endpoints, Steiner cycles of
//! faces, and face corners (the point where a cycle passes through the
//! vertex from one halfedge to the next). Corners do not count as
//! independent uses: they tie two endpoint uses together.

use nalgebra::Point2;
use rustc_hash::FxHashMap;

use crate::complex::{push_unique, Complex};
use crate::cycle::KeyHalfedge;
use crate::diff::NodeModificationFlags as Flags;
use crate::error::{Error, Result};
use crate::keys::{NodeKey, NodeType};
use crate::node::{Cell, CellKind, KeyEdge, KeyVertex};
use crate::operations::Operations;
use crate::property::{CellProperties, KeyHalfedgeData};
use crate::stroke::StrokeModel;

/// Halfedge occurrence `index` in cycle `cycle` of face `face`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleSlot {
    pub face: NodeKey,
    pub cycle: usize,
    pub index: usize,
}

/// Every use of a key vertex by its star.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexUses {
    /// `(edge, is_start)` for each edge end at the vertex. A loop edge
    /// contributes two entries.
    pub edge_endpoints: Vec<(NodeKey, bool)>,
    /// `(face, cycle)` for each Steiner cycle made of the vertex.
    pub steiner: Vec<(NodeKey, usize)>,
    /// Corners between halfedge `index` (ending at the vertex) and the next
    /// halfedge of the same cycle.
    pub corners: Vec<CycleSlot>,
}

impl VertexUses {
    /// Uses that can be separated by ungluing.
    pub fn independent_count(&self) -> usize {
        self.edge_endpoints.len() + self.steiner.len()
    }
}

impl Complex {
    /// Lists the uses of `vertex` by the cells of its star.
    pub fn count_vertex_uses(&self, vertex: NodeKey) -> VertexUses {
        let mut uses = VertexUses::default();
        for &s in self.star(vertex) {
            let Some(cell) = self.cell(s) else {
                continue;
            };
            match cell.kind() {
                CellKind::KeyVertex(_) => {}
                CellKind::KeyEdge(e) => {
                    if let Some((start, end)) = e.vertices() {
                        if start == vertex {
                            uses.edge_endpoints.push((s, true));
                        }
                        if end == vertex {
                            uses.edge_endpoints.push((s, false));
                        }
                    }
                }
                CellKind::KeyFace(f) => {
                    for (ci, cycle) in f.cycles().iter().enumerate() {
                        if cycle.steiner_vertex() == Some(vertex) {
                            uses.steiner.push((s, ci));
                        }
                        for (i, h) in cycle.halfedges().iter().enumerate() {
                            if h.end_vertex(self) == Some(vertex) {
                                uses.corners.push(CycleSlot {
                                    face: s,
                                    cycle: ci,
                                    index: i,
                                });
                            }
                        }
                    }
                }
            }
        }
        uses
    }

    /// Lists the halfedge occurrences of `edge` in the cycles of its star.
    pub fn count_edge_uses(&self, edge: NodeKey) -> Vec<CycleSlot> {
        let mut uses = Vec::new();
        for &s in self.star(edge) {
            let Some(f) = self.key_face(s) else {
                continue;
            };
            for (ci, cycle) in f.cycles().iter().enumerate() {
                for (i, h) in cycle.halfedges().iter().enumerate() {
                    if h.edge() == edge {
                        uses.push(CycleSlot {
                            face: s,
                            cycle: ci,
                            index: i,
                        });
                    }
                }
            }
        }
        uses
    }

    fn halfedge_data<'a>(&'a self, halfedges: &[KeyHalfedge]) -> Vec<KeyHalfedgeData<'a>> {
        halfedges
            .iter()
            .filter_map(|h| {
                let cell = self.cell(h.edge())?;
                let edge = cell.as_key_edge()?;
                Some(KeyHalfedgeData {
                    properties: cell.properties(),
                    direction: h.direction(),
                    length: edge.data().length(),
                })
            })
            .collect()
    }
}

impl Operations<'_> {
    // ========================================================================
    // Glue
    // ========================================================================

    /// Replaces `vertices` by a single vertex at `position`. Returns the new
    /// vertex, or the input itself when only one vertex is given.
    pub fn glue_key_vertices(&mut self, vertices: &[NodeKey], position: Point2<f64>) -> Result<NodeKey> {
        let mut olds: Vec<NodeKey> = Vec::new();
        for &v in vertices {
            self.complex.expect_cell(v, NodeType::KeyVertex)?;
            push_unique(&mut olds, v);
        }
        let Some(&first) = olds.first() else {
            return Err(Error::InvalidArgument("nothing to glue".into()));
        };
        if olds.len() == 1 {
            self.set_key_vertex_position(first, position)?;
            return Ok(first);
        }

        let (parent, time, properties) = {
            let time = self.complex.expect_any_cell(first)?.time();
            let props = CellProperties::merged_first_wins(
                olds.iter().filter_map(|&v| self.complex.cell(v).map(Cell::properties)),
            );
            (self.complex.parent(first), time, props)
        };
        let parent = parent.unwrap_or(self.complex.root());
        let mut cell = Cell::new(CellKind::KeyVertex(KeyVertex { position }), time);
        cell.properties = properties;
        let glued = self.complex.insert_cell(cell, parent, Some(first));

        let affected: Vec<NodeKey> = self
            .complex
            .star_of(&olds)
            .into_iter()
            .filter(|k| !olds.contains(k))
            .collect();
        for &k in &affected {
            let Some(cell) = self.complex.cell_mut(k) else {
                continue;
            };
            match &mut cell.kind {
                CellKind::KeyVertex(_) => {}
                CellKind::KeyEdge(e) => {
                    if e.start.is_some_and(|s| olds.contains(&s)) {
                        e.start = Some(glued);
                    }
                    if e.end.is_some_and(|s| olds.contains(&s)) {
                        e.end = Some(glued);
                    }
                }
                CellKind::KeyFace(f) => {
                    for cycle in &mut f.cycles {
                        for &old in &olds {
                            cycle.substitute_steiner_vertex(old, glued);
                        }
                    }
                }
            }
        }
        self.resync(&affected);
        self.on_boundary_geometry_changed(&[glued]);

        tracing::debug!(?glued, count = olds.len(), "glued key vertices");
        self.complex.destroy_batch(&olds);
        Ok(glued)
    }

    /// Replaces open edges by a single edge going from the glued start
    /// vertices (at `start_position`) to the glued end vertices (at
    /// `end_position`), with the given stroke. Each halfedge tells in which
    /// direction its edge is aligned with the result.
    pub fn glue_key_open_edges(
        &mut self,
        halfedges: &[KeyHalfedge],
        stroke: Box<dyn StrokeModel>,
        start_position: Point2<f64>,
        end_position: Point2<f64>,
    ) -> Result<NodeKey> {
        self.check_glued_halfedges(halfedges, false)?;
        if stroke.is_closed() {
            return Err(Error::InvalidArgument("open edges glue into an open stroke".into()));
        }

        let starts: Vec<NodeKey> = halfedges
            .iter()
            .filter_map(|h| h.start_vertex(self.complex))
            .collect();
        let start = self.glue_key_vertices(&starts, start_position)?;
        let ends: Vec<NodeKey> = halfedges
            .iter()
            .filter_map(|h| h.end_vertex(self.complex))
            .collect();
        let end = self.glue_key_vertices(&ends, end_position)?;

        self.replace_edges(halfedges, Some((start, end)), stroke)
    }

    /// Replaces closed edges by a single closed edge with the given stroke.
    pub fn glue_key_closed_edges(&mut self, halfedges: &[KeyHalfedge], stroke: Box<dyn StrokeModel>) -> Result<NodeKey> {
        self.check_glued_halfedges(halfedges, true)?;
        if !stroke.is_closed() {
            return Err(Error::InvalidArgument("closed edges glue into a closed stroke".into()));
        }
        self.replace_edges(halfedges, None, stroke)
    }

    fn check_glued_halfedges(&self, halfedges: &[KeyHalfedge], closed: bool) -> Result<()> {
        if halfedges.is_empty() {
            return Err(Error::InvalidArgument("nothing to glue".into()));
        }
        for (i, h) in halfedges.iter().enumerate() {
            self.complex.expect_cell(h.edge(), NodeType::KeyEdge)?;
            if h.is_closed(self.complex) != closed {
                return Err(Error::InvalidArgument(format!(
                    "cannot glue a mix of open and closed edges ({:?})",
                    h.edge()
                )));
            }
            if halfedges[..i].iter().any(|o| o.edge() == h.edge()) {
                return Err(Error::InvalidArgument(format!("edge {:?} listed twice", h.edge())));
            }
        }
        Ok(())
    }

    /// Creates the glued edge, moves every face use of the old edges onto
    /// it, and destroys the old edges.
    fn replace_edges(
        &mut self,
        halfedges: &[KeyHalfedge],
        vertices: Option<(NodeKey, NodeKey)>,
        stroke: Box<dyn StrokeModel>,
    ) -> Result<NodeKey> {
        let first = halfedges[0].edge();
        let time = self.complex.expect_any_cell(first)?.time();
        let parent = self.complex.parent(first).unwrap_or(self.complex.root());
        let properties = CellProperties::from_glue_halfedges(&self.complex.halfedge_data(halfedges), stroke.as_ref());

        let glued = self.insert_edge(vertices, stroke, parent, Some(first), time);
        if let Some(cell) = self.complex.cell_mut(glued) {
            cell.properties = properties;
        }

        let olds: Vec<NodeKey> = halfedges.iter().map(KeyHalfedge::edge).collect();
        let faces: Vec<NodeKey> = self
            .complex
            .star_of(&olds)
            .into_iter()
            .filter(|k| self.complex.key_face(*k).is_some())
            .collect();
        for &f in &faces {
            if let Some(face) = self.complex.key_face_mut(f) {
                for cycle in &mut face.cycles {
                    for &h in halfedges {
                        cycle.substitute_edge(h, glued);
                    }
                }
            }
        }
        self.resync(&faces);

        tracing::debug!(?glued, count = olds.len(), "glued key edges");
        self.complex.destroy_batch(&olds);
        Ok(glued)
    }

    /// Recomputes boundaries of rewired cells (edges before faces) and drops
    /// their meshes.
    fn resync(&mut self, cells: &[NodeKey]) {
        let mut ordered = cells.to_vec();
        ordered.sort_by_key(|&k| self.complex.node_type(k).and_then(|t| t.dimension()).unwrap_or(u8::MAX));
        for &k in &ordered {
            self.complex.sync_boundary(k);
            if self.complex.key_edge(k).is_some() && self.complex.snap_edge(k) {
                self.on_edge_geometry_changed(k);
            }
            self.complex.dirty_mesh(k);
            self.complex.mark(k, Flags::MESH_CHANGED);
        }
    }

    // ========================================================================
    // Unglue
    // ========================================================================

    /// Splits an edge used by several face cycles into one edge per use.
    /// The first use keeps the original edge. Returns all resulting edges.
    pub fn unglue_key_edges(&mut self, edge: NodeKey) -> Result<Vec<NodeKey>> {
        let source = self.complex.expect_cell(edge, NodeType::KeyEdge)?;
        let closed = source.as_key_edge().is_some_and(KeyEdge::is_closed);
        let mut uses = self.complex.count_edge_uses(edge);
        if closed {
            // A closed edge is used once per cycle, however many times the
            // cycle winds around it.
            let mut seen: Vec<(NodeKey, usize)> = Vec::new();
            uses.retain(|u| {
                let first = !seen.contains(&(u.face, u.cycle));
                seen.push((u.face, u.cycle));
                first
            });
        }
        if uses.len() <= 1 {
            return Ok(vec![edge]);
        }

        let mut result = vec![edge];
        let mut faces: Vec<NodeKey> = Vec::new();
        for slot in uses.into_iter().skip(1) {
            let copy = self.duplicate_edge(edge)?;
            if let Some(face) = self.complex.key_face_mut(slot.face) {
                if let Some(cycle) = face.cycles.get_mut(slot.cycle) {
                    let halfedges = cycle.halfedges_mut();
                    if closed {
                        for h in halfedges.iter_mut().filter(|h| h.edge() == edge) {
                            *h = KeyHalfedge::new(copy, h.direction());
                        }
                    } else if let Some(h) = halfedges.get_mut(slot.index) {
                        *h = KeyHalfedge::new(copy, h.direction());
                    }
                }
            }
            push_unique(&mut faces, slot.face);
            result.push(copy);
        }
        self.resync(&faces);
        tracing::debug!(?edge, count = result.len(), "unglued key edge");
        Ok(result)
    }

    fn duplicate_edge(&mut self, edge: NodeKey) -> Result<NodeKey> {
        let (vertices, stroke, quality, properties, time) = {
            let cell = self.complex.expect_cell(edge, NodeType::KeyEdge)?;
            let Some(e) = cell.as_key_edge() else {
                return Err(Error::NotFound(edge));
            };
            (
                e.vertices(),
                e.data().stroke().clone_box(),
                e.data().sampling_quality(),
                cell.properties().clone(),
                cell.time(),
            )
        };
        let parent = self.complex.parent(edge).unwrap_or(self.complex.root());
        let next_sibling = self.complex.next_sibling(edge);
        let copy = self.insert_edge(vertices, stroke, parent, next_sibling, time);
        if let Some(cell) = self.complex.cell_mut(copy) {
            cell.properties = properties;
            if let CellKind::KeyEdge(e) = &mut cell.kind {
                e.data.set_sampling_quality(quality);
            }
        }
        Ok(copy)
    }

    /// Splits a vertex used in several independent ways into one vertex per
    /// use. Edges incident to the vertex and used by several face cycles are
    /// unglued first and reported in `unglued_edges` as `(edge, results)`.
    ///
    /// Edge endpoint uses linked through a face corner stay together, and
    /// each Steiner use forms its own group. The first group keeps the
    /// original vertex. Returns all resulting vertices.
    pub fn unglue_key_vertices(
        &mut self,
        vertex: NodeKey,
        unglued_edges: &mut Vec<(NodeKey, Vec<NodeKey>)>,
    ) -> Result<Vec<NodeKey>> {
        self.complex.expect_cell(vertex, NodeType::KeyVertex)?;
        if self.complex.count_vertex_uses(vertex).independent_count() <= 1 {
            return Ok(vec![vertex]);
        }

        let mut incident: Vec<NodeKey> = Vec::new();
        for (e, _) in self.complex.count_vertex_uses(vertex).edge_endpoints {
            push_unique(&mut incident, e);
        }
        for e in incident {
            let edges = self.unglue_key_edges(e)?;
            if edges.len() > 1 {
                unglued_edges.push((e, edges));
            }
        }

        let uses = self.complex.count_vertex_uses(vertex);
        let groups = self.use_groups(&uses);
        if groups.len() <= 1 {
            return Ok(vec![vertex]);
        }

        let affected: Vec<NodeKey> = self.complex.star(vertex).to_vec();
        let (position, time, properties) = {
            let cell = self.complex.expect_any_cell(vertex)?;
            let position = cell.as_key_vertex().map_or_else(Point2::origin, KeyVertex::position);
            (position, cell.time(), cell.properties().clone())
        };
        let parent = self.complex.parent(vertex).unwrap_or(self.complex.root());

        let mut result = vec![vertex];
        for group in groups.iter().skip(1) {
            let mut cell = Cell::new(CellKind::KeyVertex(KeyVertex { position }), time);
            cell.properties = properties.clone();
            let copy = self.complex.insert_cell(cell, parent, Some(vertex));
            match group {
                UseGroup::Endpoints(ends) => {
                    for &(e, is_start) in ends {
                        if let Some(edge) = self.complex.key_edge_mut(e) {
                            if is_start {
                                edge.start = Some(copy);
                            } else {
                                edge.end = Some(copy);
                            }
                        }
                    }
                }
                UseGroup::Steiner(face, ci) => {
                    if let Some(cycle) = self.complex.key_face_mut(*face).and_then(|f| f.cycles.get_mut(*ci)) {
                        cycle.substitute_steiner_vertex(vertex, copy);
                    }
                }
            }
            result.push(copy);
        }
        self.resync(&affected);
        tracing::debug!(?vertex, count = result.len(), "unglued key vertex");
        Ok(result)
    }

    /// Partitions the independent uses of a vertex: endpoint uses joined at
    /// face corners share a group, each Steiner use is alone.
    fn use_groups(&self, uses: &VertexUses) -> Vec<UseGroup> {
        let ends = &uses.edge_endpoints;
        let index: FxHashMap<(NodeKey, bool), usize> = ends.iter().enumerate().map(|(i, &u)| (u, i)).collect();
        let mut sets = DisjointSets::new(ends.len());
        for corner in &uses.corners {
            let Some(cycle) = self
                .complex
                .key_face(corner.face)
                .and_then(|f| f.cycles().get(corner.cycle))
            else {
                continue;
            };
            let hs = cycle.halfedges();
            let incoming = hs[corner.index];
            let outgoing = hs[(corner.index + 1) % hs.len()];
            // Incoming arrives at its edge's end when traversed forward.
            let a = index.get(&(incoming.edge(), !incoming.direction()));
            let b = index.get(&(outgoing.edge(), outgoing.direction()));
            if let (Some(&a), Some(&b)) = (a, b) {
                sets.union(a, b);
            }
        }

        let mut groups: Vec<UseGroup> = Vec::new();
        let mut group_of_root: FxHashMap<usize, usize> = FxHashMap::default();
        for (i, &end) in ends.iter().enumerate() {
            let root = sets.find(i);
            match group_of_root.get(&root) {
                Some(&g) => {
                    if let UseGroup::Endpoints(list) = &mut groups[g] {
                        list.push(end);
                    }
                }
                None => {
                    group_of_root.insert(root, groups.len());
                    groups.push(UseGroup::Endpoints(vec![end]));
                }
            }
        }
        groups.extend(uses.steiner.iter().map(|&(f, ci)| UseGroup::Steiner(f, ci)));
        groups
    }
}

enum UseGroup {
    Endpoints(Vec<(NodeKey, bool)>),
    Steiner(NodeKey, usize),
}

/// Union-find over `0..n` with path halving.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
