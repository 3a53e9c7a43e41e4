// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simplification by uncutting.
//!
//! Uncutting at a vertex joins the two edge ends meeting there into a
//! single edge. Uncutting at an edge merges the two faces on either side of
//! it into a single face. Both are only possible when the cell is used in
//! exactly two compatible ways; otherwise they leave the complex untouched
//! and return `None`.

use crate::cycle::{KeyCycle, KeyHalfedge};
use crate::error::{Error, Result};
use crate::keys::{NodeKey, NodeType};
use crate::operations::Operations;
use crate::property::{CellProperties, KeyFaceData, KeyHalfedgeData};
use crate::stroke::{concat_halfedge_strokes, CatmullRomStroke};

impl Operations<'_> {
    /// Joins the two edge ends meeting at `vertex` and removes the vertex.
    ///
    /// The vertex must have exactly two edge endpoint uses and no Steiner
    /// use. Two distinct edges become one open edge; an open edge looping on
    /// the vertex becomes a closed edge. Returns the new edge.
    pub fn uncut_at_key_vertex(&mut self, vertex: NodeKey) -> Result<Option<NodeKey>> {
        self.complex.expect_cell(vertex, NodeType::KeyVertex)?;
        let uses = self.complex.count_vertex_uses(vertex);
        if !uses.steiner.is_empty() || uses.edge_endpoints.len() != 2 {
            tracing::debug!(?vertex, "vertex cannot be uncut");
            return Ok(None);
        }
        let (e1, e1_is_start) = uses.edge_endpoints[0];
        let (e2, e2_is_start) = uses.edge_endpoints[1];
        if e1 == e2 {
            return self.close_loop_edge(vertex, e1);
        }

        // h1 arrives at the vertex, h2 leaves it.
        let h1 = KeyHalfedge::new(e1, !e1_is_start);
        let h2 = KeyHalfedge::new(e2, e2_is_start);
        let faces: Vec<NodeKey> = self
            .complex
            .star(vertex)
            .iter()
            .copied()
            .filter(|&k| self.complex.key_face(k).is_some())
            .collect();

        let mut rewritten: Vec<(NodeKey, Vec<Vec<KeyHalfedge>>)> = Vec::new();
        for &f in &faces {
            let Some(face) = self.complex.key_face(f) else {
                continue;
            };
            let mut cycles = Vec::with_capacity(face.cycles().len());
            for cycle in face.cycles() {
                match join_in_cycle(cycle.halfedges(), h1, h2) {
                    Some(hs) => cycles.push(hs),
                    None => {
                        tracing::debug!(?vertex, face = ?f, "edges are not consecutive in a face cycle");
                        return Ok(None);
                    }
                }
            }
            rewritten.push((f, cycles));
        }

        let (Some(start), Some(end)) = (h1.start_vertex(self.complex), h2.end_vertex(self.complex)) else {
            return Ok(None);
        };
        let (stroke, properties, time) = {
            let c1 = self.complex.expect_cell(e1, NodeType::KeyEdge)?;
            let c2 = self.complex.expect_cell(e2, NodeType::KeyEdge)?;
            let (Some(d1), Some(d2)) = (c1.as_key_edge(), c2.as_key_edge()) else {
                return Ok(None);
            };
            let stroke = concat_halfedge_strokes(&[
                (d1.data().snapped_stroke(), h1.direction()),
                (d2.data().snapped_stroke(), h2.direction()),
            ]);
            let a = KeyHalfedgeData {
                properties: c1.properties(),
                direction: h1.direction(),
                length: d1.data().length(),
            };
            let b = KeyHalfedgeData {
                properties: c2.properties(),
                direction: h2.direction(),
                length: d2.data().length(),
            };
            (stroke, CellProperties::concat_step_halfedges(&a, &b), c1.time())
        };

        let parent = self.complex.parent(e1).unwrap_or(self.complex.root());
        let joined = self.insert_edge(Some((start, end)), Box::new(stroke), parent, Some(e1), time);
        self.install_concat_properties(joined, properties);

        for (f, cycles) in rewritten {
            if let Some(face) = self.complex.key_face_mut(f) {
                for (cycle, hs) in face.cycles.iter_mut().zip(cycles) {
                    *cycle.halfedges_mut() = hs
                        .into_iter()
                        .map(|h| if h.edge() == e1 { KeyHalfedge::new(joined, h.direction()) } else { h })
                        .collect();
                }
            }
            self.complex.sync_boundary(f);
            self.complex.dirty_mesh(f);
        }

        tracing::debug!(?vertex, ?joined, "uncut at key vertex");
        self.complex.destroy_batch(&[e1, e2, vertex]);
        Ok(Some(joined))
    }

    /// Turns an open edge whose both ends are `vertex` into a closed edge.
    fn close_loop_edge(&mut self, vertex: NodeKey, edge: NodeKey) -> Result<Option<NodeKey>> {
        let faces: Vec<NodeKey> = self
            .complex
            .star(edge)
            .iter()
            .copied()
            .filter(|&k| self.complex.key_face(k).is_some())
            .collect();
        for &f in &faces {
            let Some(face) = self.complex.key_face(f) else {
                continue;
            };
            for cycle in face.cycles() {
                let mut directions = cycle.halfedges().iter().filter(|h| h.edge() == edge).map(|h| h.direction());
                if let Some(d) = directions.next() {
                    if directions.any(|other| other != d) {
                        return Err(Error::Unsupported(
                            "a cycle traverses the loop in both directions".into(),
                        ));
                    }
                }
            }
        }

        let (stroke, properties, time) = {
            let cell = self.complex.expect_cell(edge, NodeType::KeyEdge)?;
            let Some(e) = cell.as_key_edge() else {
                return Ok(None);
            };
            let stroke = CatmullRomStroke::close_loop(e.data().snapped_stroke());
            (stroke, cell.properties().clone(), cell.time())
        };
        let parent = self.complex.parent(edge).unwrap_or(self.complex.root());
        let closed = self.insert_edge(None, Box::new(stroke), parent, Some(edge), time);
        self.install_concat_properties(closed, properties);

        for &f in &faces {
            if let Some(face) = self.complex.key_face_mut(f) {
                for cycle in &mut face.cycles {
                    for h in cycle.halfedges_mut().iter_mut().filter(|h| h.edge() == edge) {
                        *h = KeyHalfedge::new(closed, h.direction());
                    }
                }
            }
            self.complex.sync_boundary(f);
            self.complex.dirty_mesh(f);
        }

        tracing::debug!(?vertex, ?closed, "closed loop edge");
        self.complex.destroy_batch(&[edge, vertex]);
        Ok(Some(closed))
    }

    /// Merges the two faces on either side of `edge` and removes the edge.
    ///
    /// The edge must be used exactly twice, by two distinct faces. The cycle
    /// through the edge of each face is spliced into one; the other cycles
    /// of both faces are kept. Returns the new face.
    ///
    /// Returns `Ok(None)` and leaves the complex unchanged when the edge is
    /// not used exactly twice, or when both uses belong to the same face
    /// (for instance a slit inside one face).
    pub fn uncut_at_key_edge(&mut self, edge: NodeKey) -> Result<Option<NodeKey>> {
        self.complex.expect_cell(edge, NodeType::KeyEdge)?;
        let uses = self.complex.count_edge_uses(edge);
        let &[u1, u2] = uses.as_slice() else {
            tracing::debug!(?edge, uses = uses.len(), "edge cannot be uncut");
            return Ok(None);
        };
        if u1.face == u2.face {
            tracing::debug!(?edge, "edge is used twice by the same face");
            return Ok(None);
        }

        let (cycles, properties, time) = {
            let (Some(f1), Some(f2)) = (self.complex.key_face(u1.face), self.complex.key_face(u2.face)) else {
                return Ok(None);
            };
            let (Some(c1), Some(c2)) = (f1.cycles().get(u1.cycle), f2.cycles().get(u2.cycle)) else {
                return Ok(None);
            };
            let h1 = c1.halfedges()[u1.index];
            let h2 = c2.halfedges()[u2.index];
            let a = rotated_after(c1.halfedges(), u1.index);
            let mut b = rotated_after(c2.halfedges(), u2.index);
            if h1.direction() == h2.direction() {
                b = b.iter().rev().map(KeyHalfedge::opposite).collect();
            }
            let merged: Vec<KeyHalfedge> = a.into_iter().chain(b).collect();

            let mut cycles: Vec<KeyCycle> = Vec::new();
            if !merged.is_empty() {
                let cycle = KeyCycle::from_parts(None, merged);
                if cycle.validate(self.complex).is_err() {
                    tracing::debug!(?edge, "spliced cycle would be invalid");
                    return Ok(None);
                }
                cycles.push(cycle);
            }
            let others = |cs: &[KeyCycle], skip: usize| -> Vec<KeyCycle> {
                cs.iter()
                    .enumerate()
                    .filter(|&(i, _)| i != skip)
                    .map(|(_, c)| c.clone())
                    .collect()
            };
            cycles.extend(others(f1.cycles(), u1.cycle));
            cycles.extend(others(f2.cycles(), u2.cycle));
            if cycles.is_empty() {
                tracing::debug!(?edge, "merged face would have no boundary");
                return Ok(None);
            }

            let (Some(p1), Some(p2)) = (self.complex.cell(u1.face), self.complex.cell(u2.face)) else {
                return Ok(None);
            };
            let a = KeyFaceData {
                properties: p1.properties(),
                area: self.complex.face_area(u1.face).unwrap_or(0.0),
            };
            let b = KeyFaceData {
                properties: p2.properties(),
                area: self.complex.face_area(u2.face).unwrap_or(0.0),
            };
            (cycles, CellProperties::concat_step_faces(&a, &b), p1.time())
        };

        let parent = self.complex.parent(u1.face).unwrap_or(self.complex.root());
        let merged = self.insert_face(cycles, parent, Some(u1.face), time);
        self.install_concat_properties(merged, properties);

        tracing::debug!(?edge, ?merged, "uncut at key edge");
        self.complex.destroy_batch(&[u1.face, u2.face, edge]);
        Ok(Some(merged))
    }

    /// Uncuts every given edge, then every given vertex, where possible.
    /// Returns the cells created.
    pub fn simplify(&mut self, cells: &[NodeKey]) -> Result<Vec<NodeKey>> {
        let mut created = Vec::new();
        let edges = cells.iter().filter(|&&k| self.complex.key_edge(k).is_some());
        let edges: Vec<NodeKey> = edges.copied().collect();
        for e in edges {
            if !self.complex.contains(e) {
                continue;
            }
            created.extend(self.uncut_at_key_edge(e)?);
        }
        let vertices: Vec<NodeKey> = cells
            .iter()
            .copied()
            .filter(|&k| self.complex.key_vertex(k).is_some())
            .collect();
        for v in vertices {
            if !self.complex.contains(v) {
                continue;
            }
            match self.uncut_at_key_vertex(v) {
                Ok(edge) => created.extend(edge),
                Err(Error::Unsupported(reason)) => tracing::debug!(vertex = ?v, %reason, "skipped uncut"),
                Err(err) => return Err(err),
            }
        }
        created.retain(|&k| self.complex.contains(k));
        Ok(created)
    }

    fn install_concat_properties(&mut self, cell: NodeKey, mut properties: CellProperties) {
        properties.finalize_concat();
        if let Some(c) = self.complex.cell_mut(cell) {
            c.properties = properties;
        }
    }
}

/// Halfedges of a cycle following position `index`, wrapping around, the
/// halfedge at `index` excluded.
fn rotated_after(halfedges: &[KeyHalfedge], index: usize) -> Vec<KeyHalfedge> {
    let n = halfedges.len();
    (1..n).map(|k| halfedges[(index + k) % n]).collect()
}

/// Rewrites a cycle so that each traversal of `h1` then `h2` (or of their
/// opposites in reverse order) becomes a single halfedge of `h1.edge()`,
/// forward or backward. Returns `None` if an occurrence of either edge is
/// not part of such a pair.
fn join_in_cycle(halfedges: &[KeyHalfedge], h1: KeyHalfedge, h2: KeyHalfedge) -> Option<Vec<KeyHalfedge>> {
    let n = halfedges.len();
    let touches = |h: &KeyHalfedge| h.edge() == h1.edge() || h.edge() == h2.edge();
    if !halfedges.iter().any(touches) {
        return Some(halfedges.to_vec());
    }
    let second_halves = [h2, h1.opposite()];
    let start = (0..n).find(|&i| !second_halves.contains(&halfedges[i]))?;

    let mut out = Vec::with_capacity(n);
    let mut j = 0;
    while j < n {
        let h = halfedges[(start + j) % n];
        let next = halfedges[(start + j + 1) % n];
        if h == h1 && next == h2 && j + 1 < n {
            out.push(KeyHalfedge::new(h1.edge(), true));
            j += 2;
        } else if h == h2.opposite() && next == h1.opposite() && j + 1 < n {
            out.push(KeyHalfedge::new(h1.edge(), false));
            j += 2;
        } else if touches(&h) {
            return None;
        } else {
            out.push(h);
            j += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;
    use crate::keys::AnimTime;
    use crate::style::{Color, ColorProperty};
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn vertex(ops: &mut Operations<'_>, x: f64, y: f64) -> NodeKey {
        let root = ops.complex().root();
        ops.create_key_vertex(Point2::new(x, y), root, None, AnimTime::default()).unwrap()
    }

    fn edge(ops: &mut Operations<'_>, a: NodeKey, b: NodeKey) -> NodeKey {
        let root = ops.complex().root();
        let pa = ops.complex().position(a).unwrap();
        let pb = ops.complex().position(b).unwrap();
        let stroke = Box::new(CatmullRomStroke::segment(pa, pb, 1.0));
        ops.create_key_open_edge(a, b, stroke, root, None, AnimTime::default()).unwrap()
    }

    #[test]
    fn uncut_joins_two_edges_and_keeps_the_longer_color() {
        let mut complex = Complex::new();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = vertex(&mut ops, 0.0, 0.0);
        let v = vertex(&mut ops, 1.0, 0.0);
        let b = vertex(&mut ops, 4.0, 0.0);
        let e1 = edge(&mut ops, a, v);
        let e2 = edge(&mut ops, b, v);
        ops.insert_cell_property(e1, Box::new(ColorProperty::new(Color::rgb(1.0, 0.0, 0.0)))).unwrap();
        ops.insert_cell_property(e2, Box::new(ColorProperty::new(Color::rgb(0.0, 1.0, 0.0)))).unwrap();
        let joined = ops.uncut_at_key_vertex(v).unwrap().unwrap();
        ops.finish();

        assert!(!complex.contains(v));
        assert!(!complex.contains(e1));
        assert!(!complex.contains(e2));
        assert_eq!(complex.boundary(joined), &[a, b]);
        let sampling = complex.edge_sampling(joined).unwrap();
        assert_relative_eq!(sampling.length(), 4.0, epsilon = 1e-6);
        let color = complex.cell(joined).unwrap().properties().get_as::<ColorProperty>("color").unwrap();
        assert_eq!(color.color(), Color::rgb(0.0, 1.0, 0.0));
    }

    #[test]
    fn uncut_rewrites_face_cycles() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = vertex(&mut ops, 0.0, 0.0);
        let b = vertex(&mut ops, 1.0, 0.0);
        let c = vertex(&mut ops, 1.0, 1.0);
        let d = vertex(&mut ops, 0.0, 1.0);
        let ab = edge(&mut ops, a, b);
        let bc = edge(&mut ops, b, c);
        let cd = edge(&mut ops, c, d);
        let da = edge(&mut ops, d, a);
        let hs = vec![
            KeyHalfedge::new(bc, true),
            KeyHalfedge::new(cd, true),
            KeyHalfedge::new(da, true),
            KeyHalfedge::new(ab, true),
        ];
        let cycle = KeyCycle::from_halfedges(ops.complex(), hs);
        let f = ops.create_key_face(vec![cycle], root, None, AnimTime::default()).unwrap();
        let joined = ops.uncut_at_key_vertex(b).unwrap().unwrap();
        ops.finish();

        let cycle = &complex.key_face(f).unwrap().cycles()[0];
        assert_eq!(cycle.halfedges().len(), 3);
        assert!(cycle.validate(&complex).is_ok());
        assert!(cycle.edges().any(|e| e == joined));
        assert!(!complex.boundary(f).contains(&b));
        // The joined edge rounds the corner at b.
        assert!(complex.face_area(f).unwrap() > 0.5);
    }

    #[test]
    fn uncut_loop_makes_a_closed_edge() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let v = vertex(&mut ops, 0.0, 0.0);
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 0.0),
        ];
        let stroke = Box::new(CatmullRomStroke::open(points, vec![1.0; 4]));
        let e = ops.create_key_open_edge(v, v, stroke, root, None, AnimTime::default()).unwrap();
        assert!(ops.complex().key_edge(e).unwrap().is_loop());
        let closed = ops.uncut_at_key_vertex(v).unwrap().unwrap();
        ops.finish();

        let edge = complex.key_edge(closed).unwrap();
        assert!(edge.is_closed());
        assert!(!complex.contains(v));
        assert!(complex.boundary(closed).is_empty());
    }

    #[test]
    fn vertex_with_three_edges_is_not_uncut() {
        let mut complex = Complex::new();
        let mut ops = Operations::new(&mut complex).unwrap();
        let v = vertex(&mut ops, 0.0, 0.0);
        for x in [1.0, 2.0, 3.0] {
            let w = vertex(&mut ops, x, 1.0);
            edge(&mut ops, v, w);
        }
        assert_eq!(ops.uncut_at_key_vertex(v).unwrap(), None);
        assert!(ops.complex().contains(v));
    }

    #[test]
    fn uncut_at_edge_merges_two_triangles() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = vertex(&mut ops, 0.0, 0.0);
        let b = vertex(&mut ops, 1.0, 0.0);
        let c = vertex(&mut ops, 1.0, 1.0);
        let d = vertex(&mut ops, 0.0, 1.0);
        let ab = edge(&mut ops, a, b);
        let bc = edge(&mut ops, b, c);
        let ca = edge(&mut ops, c, a);
        let cd = edge(&mut ops, c, d);
        let da = edge(&mut ops, d, a);
        let lower = KeyCycle::from_halfedges(
            ops.complex(),
            vec![KeyHalfedge::new(ab, true), KeyHalfedge::new(bc, true), KeyHalfedge::new(ca, true)],
        );
        let upper = KeyCycle::from_halfedges(
            ops.complex(),
            vec![KeyHalfedge::new(ca, false), KeyHalfedge::new(cd, true), KeyHalfedge::new(da, true)],
        );
        let f1 = ops.create_key_face(vec![lower], root, None, AnimTime::default()).unwrap();
        let f2 = ops.create_key_face(vec![upper], root, None, AnimTime::default()).unwrap();
        let merged = ops.uncut_at_key_edge(ca).unwrap().unwrap();
        ops.finish();

        assert!(!complex.contains(f1));
        assert!(!complex.contains(f2));
        assert!(!complex.contains(ca));
        let cycles = complex.key_face(merged).unwrap().cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].halfedges().len(), 4);
        assert!(cycles[0].validate(&complex).is_ok());
        assert_relative_eq!(complex.face_area(merged).unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn slit_inside_one_face_is_not_uncut() {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = vertex(&mut ops, 0.0, 0.0);
        let b = vertex(&mut ops, 2.0, 0.0);
        let c = vertex(&mut ops, 2.0, 2.0);
        let d = vertex(&mut ops, 0.0, 2.0);
        let s = vertex(&mut ops, 1.0, 1.0);
        let slit = edge(&mut ops, a, s);
        let ab = edge(&mut ops, a, b);
        let bc = edge(&mut ops, b, c);
        let cd = edge(&mut ops, c, d);
        let da = edge(&mut ops, d, a);
        let cycle = KeyCycle::from_halfedges(
            ops.complex(),
            vec![
                KeyHalfedge::new(slit, true),
                KeyHalfedge::new(slit, false),
                KeyHalfedge::new(ab, true),
                KeyHalfedge::new(bc, true),
                KeyHalfedge::new(cd, true),
                KeyHalfedge::new(da, true),
            ],
        );
        let f = ops.create_key_face(vec![cycle], root, None, AnimTime::default()).unwrap();
        assert_eq!(ops.complex().count_edge_uses(slit).len(), 2);
        assert_eq!(ops.uncut_at_key_edge(slit).unwrap(), None);
        ops.finish();

        assert!(complex.contains(slit));
        assert_eq!(complex.key_face(f).unwrap().cycles()[0].halfedges().len(), 6);
    }

    #[test]
    fn simplify_skips_cells_that_cannot_be_uncut() {
        let mut complex = Complex::new();
        let mut ops = Operations::new(&mut complex).unwrap();
        let a = vertex(&mut ops, 0.0, 0.0);
        let v = vertex(&mut ops, 1.0, 0.0);
        let b = vertex(&mut ops, 2.0, 0.0);
        let e1 = edge(&mut ops, a, v);
        edge(&mut ops, v, b);
        let created = ops.simplify(&[a, e1, v]).unwrap();
        assert_eq!(created.len(), 1);
        assert!(ops.complex().contains(a));
    }
}
