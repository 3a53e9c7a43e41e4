// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot entry points.
//!
//! Each function opens an operation group on the complex, performs a single
//! operation and closes the group, so listeners receive one diff per call.
//! Use [`Operations`] directly to batch several operations into one diff.

use nalgebra::{Matrix3, Point2, Vector2};

use crate::complex::Complex;
use crate::cycle::{KeyCycle, KeyHalfedge};
use crate::dom::DomElement;
use crate::error::Result;
use crate::keys::{AnimTime, NodeKey};
use crate::operations::Operations;
use crate::stroke::{SamplingQuality, StrokeModel};

fn with_operations<T>(complex: &mut Complex, f: impl FnOnce(&mut Operations<'_>) -> Result<T>) -> Result<T> {
    let mut ops = Operations::new(complex)?;
    f(&mut ops)
}

pub fn create_group(complex: &mut Complex, parent: NodeKey, next_sibling: Option<NodeKey>) -> Result<NodeKey> {
    with_operations(complex, |ops| ops.create_group(parent, next_sibling))
}

pub fn create_key_vertex(
    complex: &mut Complex,
    position: Point2<f64>,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
    time: AnimTime,
) -> Result<NodeKey> {
    with_operations(complex, |ops| ops.create_key_vertex(position, parent, next_sibling, time))
}

pub fn create_key_open_edge(
    complex: &mut Complex,
    start: NodeKey,
    end: NodeKey,
    stroke: Box<dyn StrokeModel>,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
    time: AnimTime,
) -> Result<NodeKey> {
    with_operations(complex, |ops| {
        ops.create_key_open_edge(start, end, stroke, parent, next_sibling, time)
    })
}

pub fn create_key_closed_edge(
    complex: &mut Complex,
    stroke: Box<dyn StrokeModel>,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
    time: AnimTime,
) -> Result<NodeKey> {
    with_operations(complex, |ops| ops.create_key_closed_edge(stroke, parent, next_sibling, time))
}

pub fn create_key_face(
    complex: &mut Complex,
    cycles: Vec<KeyCycle>,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
    time: AnimTime,
) -> Result<NodeKey> {
    with_operations(complex, |ops| ops.create_key_face(cycles, parent, next_sibling, time))
}

pub fn hard_delete(complex: &mut Complex, node: NodeKey, delete_isolated_vertices: bool) -> Result<()> {
    with_operations(complex, |ops| ops.hard_delete(node, delete_isolated_vertices))
}

pub fn soft_delete(complex: &mut Complex, nodes: &[NodeKey], delete_isolated_vertices: bool) -> Result<()> {
    with_operations(complex, |ops| ops.soft_delete(nodes, delete_isolated_vertices))
}

/// Hard delete using the complex's configured isolated-vertex policy.
pub fn delete(complex: &mut Complex, node: NodeKey) -> Result<()> {
    let delete_isolated_vertices = complex.config().delete_isolated_vertices;
    hard_delete(complex, node, delete_isolated_vertices)
}

pub fn move_to_group(
    complex: &mut Complex,
    node: NodeKey,
    parent: NodeKey,
    next_sibling: Option<NodeKey>,
) -> Result<()> {
    with_operations(complex, |ops| ops.move_to_group(node, parent, next_sibling))
}

pub fn move_below_boundary(complex: &mut Complex, node: NodeKey) -> Result<bool> {
    with_operations(complex, |ops| ops.move_below_boundary(node))
}

pub fn set_group_transform(complex: &mut Complex, group: NodeKey, transform: Matrix3<f64>) -> Result<()> {
    with_operations(complex, |ops| ops.set_group_transform(group, transform))
}

pub fn set_key_vertex_position(complex: &mut Complex, vertex: NodeKey, position: Point2<f64>) -> Result<()> {
    with_operations(complex, |ops| ops.set_key_vertex_position(vertex, position))
}

pub fn set_key_edge_geometry(complex: &mut Complex, edge: NodeKey, stroke: Box<dyn StrokeModel>) -> Result<()> {
    with_operations(complex, |ops| ops.set_key_edge_geometry(edge, stroke))
}

pub fn set_key_edge_sampling_quality(complex: &mut Complex, edge: NodeKey, quality: SamplingQuality) -> Result<()> {
    with_operations(complex, |ops| ops.set_key_edge_sampling_quality(edge, quality))
}

pub fn translate_cells(complex: &mut Complex, cells: &[NodeKey], delta: Vector2<f64>) -> Result<()> {
    with_operations(complex, |ops| ops.translate_cells(cells, delta))
}

pub fn transform_cells(complex: &mut Complex, cells: &[NodeKey], matrix: &Matrix3<f64>) -> Result<()> {
    with_operations(complex, |ops| ops.transform_cells(cells, matrix))
}

pub fn glue_key_vertices(complex: &mut Complex, vertices: &[NodeKey], position: Point2<f64>) -> Result<NodeKey> {
    with_operations(complex, |ops| ops.glue_key_vertices(vertices, position))
}

pub fn glue_key_open_edges(
    complex: &mut Complex,
    halfedges: &[KeyHalfedge],
    stroke: Box<dyn StrokeModel>,
    start_position: Point2<f64>,
    end_position: Point2<f64>,
) -> Result<NodeKey> {
    with_operations(complex, |ops| {
        ops.glue_key_open_edges(halfedges, stroke, start_position, end_position)
    })
}

pub fn glue_key_closed_edges(
    complex: &mut Complex,
    halfedges: &[KeyHalfedge],
    stroke: Box<dyn StrokeModel>,
) -> Result<NodeKey> {
    with_operations(complex, |ops| ops.glue_key_closed_edges(halfedges, stroke))
}

pub fn unglue_key_edges(complex: &mut Complex, edge: NodeKey) -> Result<Vec<NodeKey>> {
    with_operations(complex, |ops| ops.unglue_key_edges(edge))
}

pub fn unglue_key_vertices(
    complex: &mut Complex,
    vertex: NodeKey,
    unglued_edges: &mut Vec<(NodeKey, Vec<NodeKey>)>,
) -> Result<Vec<NodeKey>> {
    with_operations(complex, |ops| ops.unglue_key_vertices(vertex, unglued_edges))
}

pub fn uncut_at_key_vertex(complex: &mut Complex, vertex: NodeKey) -> Result<Option<NodeKey>> {
    with_operations(complex, |ops| ops.uncut_at_key_vertex(vertex))
}

pub fn uncut_at_key_edge(complex: &mut Complex, edge: NodeKey) -> Result<Option<NodeKey>> {
    with_operations(complex, |ops| ops.uncut_at_key_edge(edge))
}

pub fn simplify(complex: &mut Complex, cells: &[NodeKey]) -> Result<Vec<NodeKey>> {
    with_operations(complex, |ops| ops.simplify(cells))
}

pub fn update_key_edge_from_dom(complex: &mut Complex, edge: NodeKey, element: &dyn DomElement) -> Result<bool> {
    with_operations(complex, |ops| ops.update_key_edge_from_dom(edge, element))
}

pub fn update_key_vertex_from_dom(complex: &mut Complex, vertex: NodeKey, element: &dyn DomElement) -> Result<bool> {
    with_operations(complex, |ops| ops.update_key_vertex_from_dom(vertex, element))
}
