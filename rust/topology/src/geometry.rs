// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries: bounding boxes, face fills and areas.
//!
//! Face fills are computed from the sampled centerlines of the face's cycles
//! and triangulated with earcut. The first cycle with a non-degenerate
//! polygon is the outer ring, the others are holes.

use nalgebra::{Point2, Vector2};

use crate::complex::Complex;
use crate::cycle::KeyCycle;
use crate::keys::NodeKey;

/// Axis-aligned 2D bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect2 {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Rect2 {
    pub fn from_point(p: Point2<f64>) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box containing all points, `None` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = Self::from_point(*iter.next()?);
        Some(iter.fold(first, |r, p| r.extended(p)))
    }

    pub fn extended(&self, p: &Point2<f64>) -> Self {
        Self {
            min: Point2::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Point2::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    pub fn union(&self, other: &Rect2) -> Self {
        self.extended(&other.min).extended(&other.max)
    }

    pub fn contains(&self, p: &Point2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn size(&self) -> Vector2<f64> {
        self.max - self.min
    }
}

/// Triangulated interior of a key face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceFill {
    pub vertices: Vec<Point2<f64>>,
    pub triangles: Vec<[usize; 3]>,
    pub area: f64,
}

impl FaceFill {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn bounding_box(&self) -> Option<Rect2> {
        Rect2::from_points(&self.vertices)
    }
}

/// Signed area of a closed polygon (positive when counter-clockwise).
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    0.5 * sum
}

/// Polygon traced by the sampled centerline of a cycle. Steiner cycles
/// produce an empty polygon.
pub fn cycle_polygon(complex: &Complex, cycle: &KeyCycle) -> Vec<Point2<f64>> {
    let mut polygon: Vec<Point2<f64>> = Vec::new();
    for h in cycle.halfedges() {
        let Some(edge) = complex.key_edge(h.edge()) else {
            continue;
        };
        let samples = edge.data().sampling().samples();
        let mut points: Vec<Point2<f64>> = samples.iter().map(|s| s.position).collect();
        if !h.direction() {
            points.reverse();
        }
        // The last point is the first point of the next halfedge.
        points.pop();
        polygon.extend(points);
    }
    polygon
}

/// Triangulates the cycles of a face.
pub fn compute_face_fill(complex: &Complex, cycles: &[KeyCycle]) -> FaceFill {
    let mut coords: Vec<f64> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();
    let mut vertices: Vec<Point2<f64>> = Vec::new();

    for cycle in cycles {
        let polygon = cycle_polygon(complex, cycle);
        if polygon.len() < 3 {
            continue;
        }
        if !vertices.is_empty() {
            hole_indices.push(vertices.len());
        }
        for p in &polygon {
            coords.push(p.x);
            coords.push(p.y);
        }
        vertices.extend(polygon);
    }

    if vertices.len() < 3 {
        return FaceFill::default();
    }

    let indices = match earcutr::earcut(&coords, &hole_indices, 2) {
        Ok(indices) => indices,
        Err(err) => {
            tracing::warn!(?err, "face fill triangulation failed");
            return FaceFill::default();
        }
    };

    let mut triangles = Vec::with_capacity(indices.len() / 3);
    let mut area = 0.0;
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (vertices[tri[0]], vertices[tri[1]], vertices[tri[2]]);
        area += 0.5 * ((b - a).perp(&(c - a))).abs();
        triangles.push([tri[0], tri[1], tri[2]]);
    }

    FaceFill {
        vertices,
        triangles,
        area,
    }
}

impl Complex {
    /// Bounding box of a cell's geometry: the vertex position, the sampled
    /// edge centerline, or the union of a face's boundary edges.
    pub fn bounding_box(&self, key: NodeKey) -> Option<Rect2> {
        let cell = self.cell(key)?;
        if let Some(v) = cell.as_key_vertex() {
            return Some(Rect2::from_point(v.position()));
        }
        if let Some(e) = cell.as_key_edge() {
            return e.data().sampling().bounding_box();
        }
        cell.boundary()
            .iter()
            .filter_map(|&b| match self.cell(b)?.as_key_edge() {
                Some(_) => self.bounding_box(b),
                None => self.key_vertex(b).map(|v| Rect2::from_point(v.position())),
            })
            .reduce(|a, b| a.union(&b))
    }

    /// Area enclosed by a face, from its cached fill.
    pub fn face_area(&self, key: NodeKey) -> Option<f64> {
        self.face_fill(key).map(|fill| fill.area)
    }
}
