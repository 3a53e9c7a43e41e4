// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural invariants of the complex across a sequence of operations.

use nalgebra::Point2;
use vac_topology::prelude::*;
use vac_topology::{algebra, ops};

fn vertex(complex: &mut Complex, x: f64, y: f64) -> NodeKey {
    let root = complex.root();
    ops::create_key_vertex(complex, Point2::new(x, y), root, None, AnimTime::default()).unwrap()
}

fn edge(complex: &mut Complex, a: NodeKey, b: NodeKey) -> NodeKey {
    let root = complex.root();
    let pa = complex.position(a).unwrap();
    let pb = complex.position(b).unwrap();
    let stroke = Box::new(CatmullRomStroke::segment(pa, pb, 1.0));
    ops::create_key_open_edge(complex, a, b, stroke, root, None, AnimTime::default()).unwrap()
}

/// Face bounded by open edges through the given vertices, in order.
fn polygon(complex: &mut Complex, vertices: &[NodeKey]) -> (Vec<NodeKey>, NodeKey) {
    let edges: Vec<NodeKey> = (0..vertices.len())
        .map(|i| edge(complex, vertices[i], vertices[(i + 1) % vertices.len()]))
        .collect();
    let halfedges = edges.iter().map(|&e| KeyHalfedge::new(e, true)).collect();
    let cycle = KeyCycle::from_halfedges(complex, halfedges);
    let root = complex.root();
    let face = ops::create_key_face(complex, vec![cycle], root, None, AnimTime::default()).unwrap();
    (edges, face)
}

fn all_cells(complex: &Complex) -> Vec<NodeKey> {
    complex
        .iter()
        .filter(|(_, node)| node.is_cell())
        .map(|(k, _)| k)
        .collect()
}

fn assert_duality(complex: &Complex) {
    for c in all_cells(complex) {
        for &b in complex.boundary(c) {
            assert!(complex.star(b).contains(&c), "{c:?} missing from star of {b:?}");
        }
        for &s in complex.star(c) {
            assert!(complex.boundary(s).contains(&c), "{c:?} missing from boundary of {s:?}");
        }
    }
}

fn assert_faces_valid(complex: &Complex) {
    for c in all_cells(complex) {
        if let Some(face) = complex.key_face(c) {
            for cycle in face.cycles() {
                assert!(cycle.validate(complex).is_ok(), "invalid cycle in {c:?}");
            }
        }
    }
}

fn sorted(mut keys: Vec<NodeKey>) -> Vec<NodeKey> {
    keys.sort();
    keys
}

#[test]
fn boundary_and_star_stay_dual() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 1.0, 1.0);
    let d = vertex(&mut complex, 0.0, 1.0);
    let (edges, face) = polygon(&mut complex, &[a, b, c, d]);
    assert_duality(&complex);

    let tail = vertex(&mut complex, 2.0, 2.0);
    let dangling = edge(&mut complex, c, tail);
    assert_duality(&complex);

    ops::set_key_vertex_position(&mut complex, c, Point2::new(1.5, 1.5)).unwrap();
    ops::hard_delete(&mut complex, edges[0], false).unwrap();
    assert!(!complex.contains(face));
    assert!(complex.contains(dangling));
    assert_duality(&complex);
}

#[test]
fn closure_is_idempotent() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let (edges, face) = polygon(&mut complex, &[a, b, c]);

    for cells in [vec![face], vec![edges[1]], vec![a, edges[2]]] {
        let once = algebra::closure(&complex, &cells);
        let twice = algebra::closure(&complex, &once);
        assert_eq!(sorted(once), sorted(twice));
    }
    assert_eq!(algebra::closure(&complex, &[face]).len(), 7);
}

#[test]
fn boundary_of_a_boundary_is_contained_in_it() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let (edges, face) = polygon(&mut complex, &[a, b, c]);
    let extra = vertex(&mut complex, 3.0, 0.0);
    let open = edge(&mut complex, b, extra);

    for cells in [vec![face], vec![open], vec![face, open], vec![edges[0], edges[1]]] {
        let boundary = algebra::boundary(&complex, &cells);
        for k in algebra::boundary(&complex, &boundary) {
            assert!(boundary.contains(&k));
        }
    }
    // The boundary of a closed face boundary is empty.
    let boundary = algebra::boundary(&complex, &[face]);
    assert_eq!(boundary.len(), 6);
    assert!(algebra::boundary(&complex, &boundary).is_empty());
}

#[test]
fn opening_and_star_include_the_input() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let (edges, face) = polygon(&mut complex, &[a, b, c]);

    let star = algebra::star(&complex, &[a]);
    assert_eq!(star[0], a);
    assert_eq!(sorted(star), sorted(vec![a, edges[0], edges[2], face]));
    assert_eq!(algebra::opening(&complex, &[a]).len(), 7);
}

#[test]
fn deleting_an_open_edge_can_keep_or_remove_its_vertices() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let e = edge(&mut complex, a, b);
    ops::hard_delete(&mut complex, e, false).unwrap();
    assert!(complex.contains(a));
    assert!(complex.contains(b));
    assert!(complex.star(a).is_empty());

    let e = edge(&mut complex, a, b);
    let c = vertex(&mut complex, 2.0, 0.0);
    let kept = edge(&mut complex, b, c);
    ops::hard_delete(&mut complex, e, true).unwrap();
    assert!(!complex.contains(a));
    assert!(complex.contains(b));
    assert_eq!(complex.star(b), &[kept]);
}

#[test]
fn soft_delete_removes_dependents_in_one_batch() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let (edges, face) = polygon(&mut complex, &[a, b, c]);
    let root = complex.root();
    let group = ops::create_group(&mut complex, root, None).unwrap();
    ops::move_to_group(&mut complex, face, group, None).unwrap();

    let mut ops = complex.operations().unwrap();
    ops.soft_delete(&[group, a], false).unwrap();
    let diff = ops.finish();

    assert!(diff.is_destroyed(group));
    assert!(diff.is_destroyed(face));
    assert!(diff.is_destroyed(edges[0]));
    assert!(diff.is_destroyed(edges[2]));
    assert!(complex.contains(edges[1]));
    assert_eq!(complex.star(b), &[edges[1]]);
    assert_duality(&complex);
}

#[test]
fn glued_vertex_joins_face_boundaries() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let (_, f1) = polygon(&mut complex, &[a, b, c]);
    let d = vertex(&mut complex, 1.0, 0.0);
    let e = vertex(&mut complex, 2.0, 0.0);
    let f = vertex(&mut complex, 1.0, 1.0);
    let (_, f2) = polygon(&mut complex, &[d, e, f]);

    let glued = ops::glue_key_vertices(&mut complex, &[b, d], Point2::new(1.0, 0.0)).unwrap();
    assert!(complex.boundary(f1).contains(&glued));
    assert!(complex.boundary(f2).contains(&glued));
    assert_eq!(complex.star(glued).len(), 6);
    assert_eq!(complex.count_vertex_uses(glued).independent_count(), 4);
    assert_eq!(complex.count_vertex_uses(glued).corners.len(), 2);
    assert_faces_valid(&complex);
    assert_duality(&complex);
}

#[test]
fn glue_then_unglue_splits_along_face_corners() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let (_, f1) = polygon(&mut complex, &[a, b, c]);
    let d = vertex(&mut complex, 1.0, 0.0);
    let e = vertex(&mut complex, 2.0, 0.0);
    let f = vertex(&mut complex, 1.0, 1.0);
    let (_, f2) = polygon(&mut complex, &[d, e, f]);
    let glued = ops::glue_key_vertices(&mut complex, &[b, d], Point2::new(1.0, 0.0)).unwrap();

    let mut unglued_edges = Vec::new();
    let vertices = ops::unglue_key_vertices(&mut complex, glued, &mut unglued_edges).unwrap();
    assert!(unglued_edges.is_empty());
    assert_eq!(vertices.len(), 2);
    assert_eq!(vertices[0], glued);

    for &v in &vertices {
        assert_eq!(complex.star(v).len(), 3);
        assert_eq!(complex.position(v), Some(Point2::new(1.0, 0.0)));
    }
    let in_f1 = vertices.iter().filter(|v| complex.boundary(f1).contains(v)).count();
    let in_f2 = vertices.iter().filter(|v| complex.boundary(f2).contains(v)).count();
    assert_eq!((in_f1, in_f2), (1, 1));
    assert_faces_valid(&complex);
    assert_duality(&complex);
}

#[test]
fn unglue_shared_edge_then_glue_it_back() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let d = vertex(&mut complex, 1.0, 1.0);
    let (edges, f1) = polygon(&mut complex, &[a, b, c]);
    let shared = edges[1];
    let bd = edge(&mut complex, b, d);
    let dc = edge(&mut complex, d, c);
    let cycle = KeyCycle::from_halfedges(
        &complex,
        vec![KeyHalfedge::new(shared, false), KeyHalfedge::new(bd, true), KeyHalfedge::new(dc, true)],
    );
    let root = complex.root();
    let f2 = ops::create_key_face(&mut complex, vec![cycle], root, None, AnimTime::default()).unwrap();
    assert_eq!(complex.count_edge_uses(shared).len(), 2);

    let split = ops::unglue_key_edges(&mut complex, shared).unwrap();
    assert_eq!(split.len(), 2);
    assert_eq!(split[0], shared);
    assert!(complex.boundary(f1).contains(&split[0]));
    assert!(complex.boundary(f2).contains(&split[1]));
    assert_eq!(complex.boundary(split[1]), &[b, c]);
    assert_faces_valid(&complex);

    let stroke = Box::new(CatmullRomStroke::segment(Point2::new(1.0, 0.0), Point2::new(0.0, 1.0), 1.0));
    let halfedges = [KeyHalfedge::new(split[0], true), KeyHalfedge::new(split[1], true)];
    let glued =
        ops::glue_key_open_edges(&mut complex, &halfedges, stroke, Point2::new(1.0, 0.0), Point2::new(0.0, 1.0))
            .unwrap();
    assert_eq!(complex.count_edge_uses(glued).len(), 2);
    assert!(complex.boundary(f1).contains(&glued));
    assert!(complex.boundary(f2).contains(&glued));
    assert_faces_valid(&complex);
    assert_duality(&complex);
}

#[test]
fn uncut_joins_a_chain_back_into_one_edge() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let v = vertex(&mut complex, 1.0, 0.0);
    let b = vertex(&mut complex, 2.0, 0.0);
    edge(&mut complex, a, v);
    edge(&mut complex, v, b);

    let joined = ops::uncut_at_key_vertex(&mut complex, v).unwrap().unwrap();
    assert!(!complex.contains(v));
    assert_eq!(complex.boundary(joined), &[a, b]);
    assert_eq!(complex.star(a), &[joined]);
    assert_duality(&complex);
}

#[test]
fn cycle_validation_rejects_broken_chains() {
    let mut complex = Complex::new();
    let a = vertex(&mut complex, 0.0, 0.0);
    let b = vertex(&mut complex, 1.0, 0.0);
    let c = vertex(&mut complex, 0.0, 1.0);
    let ab = edge(&mut complex, a, b);
    let bc = edge(&mut complex, b, c);

    let open_chain = KeyCycle::from_halfedges(&complex, vec![KeyHalfedge::new(ab, true), KeyHalfedge::new(bc, true)]);
    assert!(!open_chain.is_valid());
    let there_and_back =
        KeyCycle::from_halfedges(&complex, vec![KeyHalfedge::new(ab, true), KeyHalfedge::new(ab, false)]);
    assert!(there_and_back.is_valid());
    let steiner = KeyCycle::from_steiner_vertex(&complex, ab);
    assert!(!steiner.is_valid());

    let root = complex.root();
    let err = ops::create_key_face(&mut complex, vec![open_chain], root, None, AnimTime::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidCycle(_)));
}

#[test]
fn face_boundary_after_steiner_glue() {
    let mut complex = Complex::new();
    let v1 = vertex(&mut complex, 0.0, 0.0);
    let v2 = vertex(&mut complex, 1.0, 0.0);
    let cycles = vec![
        KeyCycle::from_steiner_vertex(&complex, v1),
        KeyCycle::from_steiner_vertex(&complex, v2),
    ];
    let root = complex.root();
    let face = ops::create_key_face(&mut complex, cycles, root, None, AnimTime::default()).unwrap();
    assert_eq!(sorted(complex.boundary(face).to_vec()), sorted(vec![v1, v2]));

    let v = ops::glue_key_vertices(&mut complex, &[v1, v2], Point2::new(0.5, 0.0)).unwrap();
    assert_eq!(complex.boundary(face), &[v]);
    assert_eq!(complex.star(v), &[face]);
    let uses = complex.count_vertex_uses(v);
    assert_eq!(uses.steiner.len(), 2);
    assert!(uses.edge_endpoints.is_empty());
    assert_duality(&complex);
    assert_faces_valid(&complex);

    let mut unglued_edges = Vec::new();
    let parts = ops::unglue_key_vertices(&mut complex, v, &mut unglued_edges).unwrap();
    assert!(unglued_edges.is_empty());
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], v);
    assert_eq!(sorted(complex.boundary(face).to_vec()), sorted(parts.clone()));
    for &p in &parts {
        assert_eq!(complex.count_vertex_uses(p).steiner.len(), 1);
    }
    assert_duality(&complex);
    assert_faces_valid(&complex);
}

#[test]
fn deleting_a_large_group_reports_every_node_once() {
    let mut complex = Complex::new();
    let root = complex.root();
    let group = ops::create_group(&mut complex, root, None).unwrap();
    let mut ops = complex.operations().unwrap();
    let mut previous = ops
        .create_key_vertex(Point2::new(0.0, 0.0), group, None, AnimTime::default())
        .unwrap();
    for i in 1..2000_u32 {
        let p = Point2::new(f64::from(i), 0.0);
        let v = ops.create_key_vertex(p, group, None, AnimTime::default()).unwrap();
        let q = ops.complex().position(previous).unwrap();
        let stroke = Box::new(CatmullRomStroke::segment(q, p, 1.0));
        ops.create_key_open_edge(previous, v, stroke, group, None, AnimTime::default()).unwrap();
        previous = v;
    }
    ops.finish();
    let before = complex.node_count();

    let mut ops = complex.operations().unwrap();
    ops.hard_delete(group, false).unwrap();
    let diff = ops.finish();
    assert_eq!(complex.node_count(), 1);
    assert_eq!(diff.destroyed_nodes().len(), before - 1);
    assert!(diff.modified_nodes().iter().all(|(k, _)| *k == root));
    assert!(complex.children(root).is_empty());
}
