// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stroke models: the authored centerline and width profile of an edge.
//!
//! A [`StrokeModel`] is the narrow geometric interface the complex needs from
//! curve code: control points and widths, sampling at a given quality,
//! affine edits, and snapping of its endpoints onto vertex positions. The
//! built-in model is [`CatmullRomStroke`], a uniform Catmull-Rom spline
//! through its control points with linearly interpolated widths.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Width used when a stroke carries no width information.
pub const DEFAULT_WIDTH: f64 = 1.0;

const EPSILON: f64 = 1e-12;

/// How finely an edge centerline is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SamplingQuality {
    /// Control points only, no subdivision.
    Disabled,
    Low,
    #[default]
    Medium,
    High,
}

struct SamplingParameters {
    min_depth: u32,
    max_depth: u32,
    max_angle: f64,
}

impl SamplingQuality {
    fn parameters(self) -> SamplingParameters {
        match self {
            SamplingQuality::Disabled => SamplingParameters {
                min_depth: 0,
                max_depth: 0,
                max_angle: PI,
            },
            SamplingQuality::Low => SamplingParameters {
                min_depth: 0,
                max_depth: 3,
                max_angle: 0.25,
            },
            SamplingQuality::Medium => SamplingParameters {
                min_depth: 1,
                max_depth: 5,
                max_angle: 0.1,
            },
            SamplingQuality::High => SamplingParameters {
                min_depth: 2,
                max_depth: 7,
                max_angle: 0.05,
            },
        }
    }

    /// Returns the lowercase name of this quality.
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingQuality::Disabled => "disabled",
            SamplingQuality::Low => "low",
            SamplingQuality::Medium => "medium",
            SamplingQuality::High => "high",
        }
    }

    /// Parses a quality name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Some(SamplingQuality::Disabled),
            "low" => Some(SamplingQuality::Low),
            "medium" => Some(SamplingQuality::Medium),
            "high" => Some(SamplingQuality::High),
            _ => None,
        }
    }
}

/// How the displacement of snapped endpoints is spread along a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SnapMode {
    /// Displacement interpolated by accumulated arclength, so dense regions
    /// of control points move proportionally less.
    #[default]
    LinearInArclength,
    /// Displacement interpolated by control point index.
    LinearInParameter,
}

impl SnapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapMode::LinearInArclength => "arclength",
            SnapMode::LinearInParameter => "parameter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arclength" => Some(SnapMode::LinearInArclength),
            "parameter" => Some(SnapMode::LinearInParameter),
            _ => None,
        }
    }
}

/// One sample of a stroke centerline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSample {
    pub position: Point2<f64>,
    /// Unit normal, pointing to the left of the traversal direction.
    pub normal: Vector2<f64>,
    /// Norm of the curve derivative at this sample.
    pub speed: f64,
    /// Half widths on the left and right side of the centerline.
    pub half_widths: [f64; 2],
    /// Accumulated arclength from the first sample.
    pub s: f64,
}

impl StrokeSample {
    /// Position of the left (`side == 0`) or right offset line.
    pub fn offset_point(&self, side: usize) -> Point2<f64> {
        if side == 0 {
            self.position + self.normal * self.half_widths[0]
        } else {
            self.position - self.normal * self.half_widths[1]
        }
    }
}

/// A polymorphic stroke (centerline plus half-width profile).
pub trait StrokeModel: fmt::Debug {
    /// Name identifying the model in snapshots and diagnostics.
    fn model_name(&self) -> &'static str;

    fn clone_box(&self) -> Box<dyn StrokeModel>;

    fn is_closed(&self) -> bool;

    /// Control points of the centerline.
    fn positions(&self) -> &[Point2<f64>];

    /// Widths, either one per control point or a single constant width.
    fn widths(&self) -> &[f64];

    /// Replaces the control points and widths.
    fn set_control_points(&mut self, positions: Vec<Point2<f64>>, widths: Vec<f64>);

    /// Samples the centerline.
    fn sample(&self, quality: SamplingQuality) -> Vec<StrokeSample>;

    fn translate(&mut self, delta: &Vector2<f64>);

    /// Applies a 2D affine transform given as a homogeneous 3x3 matrix.
    fn transform(&mut self, matrix: &Matrix3<f64>);

    /// Returns a copy deformed so that its endpoints land on `start` and
    /// `end`. Closed strokes are returned unchanged.
    fn snapped(&self, start: &Point2<f64>, end: &Point2<f64>, mode: SnapMode)
        -> Box<dyn StrokeModel>;

    /// Returns a copy traversed in the opposite direction.
    fn reversed(&self) -> Box<dyn StrokeModel>;

    /// First and last control points, `None` for closed or empty strokes.
    fn endpoints(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        if self.is_closed() {
            return None;
        }
        let positions = self.positions();
        Some((*positions.first()?, *positions.last()?))
    }

    /// Width at control point `i`.
    fn width_at(&self, i: usize) -> f64 {
        let widths = self.widths();
        if widths.len() == self.positions().len() && i < widths.len() {
            widths[i]
        } else {
            widths.first().copied().unwrap_or(DEFAULT_WIDTH)
        }
    }

    /// Length of the control polygon.
    fn approximate_length(&self) -> f64 {
        let positions = self.positions();
        let mut length: f64 = positions.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
        if self.is_closed() && positions.len() > 1 {
            length += (positions[0] - positions[positions.len() - 1]).norm();
        }
        length
    }
}

impl Clone for Box<dyn StrokeModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Uniform Catmull-Rom spline through control points, with linearly
/// interpolated widths.
#[derive(Debug, Clone, PartialEq)]
pub struct CatmullRomStroke {
    positions: Vec<Point2<f64>>,
    widths: Vec<f64>,
    closed: bool,
}

impl CatmullRomStroke {
    /// Creates an open stroke.
    pub fn open(positions: Vec<Point2<f64>>, widths: Vec<f64>) -> Self {
        Self {
            positions,
            widths,
            closed: false,
        }
    }

    /// Creates a closed stroke. The first point must not be repeated at the end.
    pub fn closed(positions: Vec<Point2<f64>>, widths: Vec<f64>) -> Self {
        Self {
            positions,
            widths,
            closed: true,
        }
    }

    /// Straight open stroke between two points.
    pub fn segment(a: Point2<f64>, b: Point2<f64>, width: f64) -> Self {
        Self::open(vec![a, b], vec![width])
    }

    /// Copies the control points of any stroke model.
    pub fn from_model(model: &dyn StrokeModel) -> Self {
        Self {
            positions: model.positions().to_vec(),
            widths: model.widths().to_vec(),
            closed: model.is_closed(),
        }
    }

    /// Turns an open stroke whose ends coincide into a closed stroke.
    pub fn close_loop(model: &dyn StrokeModel) -> Self {
        let (mut positions, mut widths) = per_point_widths(model);
        if positions.len() > 1 {
            let first = positions[0];
            let last = positions[positions.len() - 1];
            if (last - first).norm() <= 1e-9 {
                positions.pop();
                widths.pop();
            }
        }
        Self::closed(positions, widths)
    }

    fn segment_count(&self) -> usize {
        let n = self.positions.len();
        match (self.closed, n) {
            (_, 0) | (_, 1) => 0,
            (true, _) => n,
            (false, _) => n - 1,
        }
    }

    fn control_point(&self, i: isize) -> Point2<f64> {
        let n = self.positions.len() as isize;
        if self.closed {
            return self.positions[i.rem_euclid(n) as usize];
        }
        if i < 0 {
            let p0 = self.positions[0];
            let p1 = self.positions[1];
            return p0 + (p0 - p1);
        }
        if i >= n {
            let a = self.positions[(n - 1) as usize];
            let b = self.positions[(n - 2) as usize];
            return a + (a - b);
        }
        self.positions[i as usize]
    }

    fn eval(&self, segment: usize, t: f64) -> (Point2<f64>, Vector2<f64>) {
        let i = segment as isize;
        let p0 = self.control_point(i - 1).coords;
        let p1 = self.control_point(i).coords;
        let p2 = self.control_point(i + 1).coords;
        let p3 = self.control_point(i + 2).coords;

        let a = p1 * 2.0;
        let b = p2 - p0;
        let c = p0 * 2.0 - p1 * 5.0 + p2 * 4.0 - p3;
        let d = -p0 + p1 * 3.0 - p2 * 3.0 + p3;

        let position = (a + b * t + c * (t * t) + d * (t * t * t)) * 0.5;
        let derivative = (b + c * (2.0 * t) + d * (3.0 * t * t)) * 0.5;
        (Point2::from(position), derivative)
    }

    fn half_width(&self, segment: usize, t: f64) -> f64 {
        let n = self.positions.len();
        let w0 = self.width_at(segment);
        let w1 = self.width_at((segment + 1) % n);
        0.5 * (w0 + (w1 - w0) * t)
    }

    fn subdivide(
        &self,
        segment: usize,
        (t0, d0): (f64, Vector2<f64>),
        (t1, p1, d1): (f64, Point2<f64>, Vector2<f64>),
        depth: u32,
        params: &SamplingParameters,
        out: &mut Vec<(Point2<f64>, Vector2<f64>, f64)>,
    ) {
        let split = depth < params.min_depth
            || (depth < params.max_depth && angle_between(&d0, &d1) > params.max_angle);
        if split {
            let tm = 0.5 * (t0 + t1);
            let (pm, dm) = self.eval(segment, tm);
            self.subdivide(segment, (t0, d0), (tm, pm, dm), depth + 1, params, out);
            self.subdivide(segment, (tm, dm), (t1, p1, d1), depth + 1, params, out);
        } else {
            out.push((p1, d1, self.half_width(segment, t1)));
        }
    }
}

impl StrokeModel for CatmullRomStroke {
    fn model_name(&self) -> &'static str {
        "catmull-rom"
    }

    fn clone_box(&self) -> Box<dyn StrokeModel> {
        Box::new(self.clone())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn positions(&self) -> &[Point2<f64>] {
        &self.positions
    }

    fn widths(&self) -> &[f64] {
        &self.widths
    }

    fn set_control_points(&mut self, positions: Vec<Point2<f64>>, widths: Vec<f64>) {
        self.positions = positions;
        self.widths = widths;
    }

    fn sample(&self, quality: SamplingQuality) -> Vec<StrokeSample> {
        let n = self.positions.len();
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            let hw = 0.5 * self.width_at(0);
            return vec![StrokeSample {
                position: self.positions[0],
                normal: Vector2::new(0.0, 1.0),
                speed: 0.0,
                half_widths: [hw, hw],
                s: 0.0,
            }];
        }

        let params = quality.parameters();
        let mut points = Vec::new();
        for segment in 0..self.segment_count() {
            let (p0, d0) = self.eval(segment, 0.0);
            if segment == 0 {
                points.push((p0, d0, self.half_width(segment, 0.0)));
            }
            let (p1, d1) = self.eval(segment, 1.0);
            self.subdivide(segment, (0.0, d0), (1.0, p1, d1), 0, &params, &mut points);
        }

        let mut samples = Vec::with_capacity(points.len());
        let mut s = 0.0;
        let mut previous: Option<(Point2<f64>, Vector2<f64>)> = None;
        for (i, &(position, derivative, hw)) in points.iter().enumerate() {
            let speed = derivative.norm();
            let tangent = if speed > EPSILON {
                derivative / speed
            } else {
                // Degenerate derivative: fall back to the chord direction.
                let chord = match (i, points.get(i + 1)) {
                    (_, Some(next)) => next.0 - position,
                    (0, None) => Vector2::new(1.0, 0.0),
                    _ => position - points[i - 1].0,
                };
                let norm = chord.norm();
                if norm > EPSILON {
                    chord / norm
                } else {
                    previous.map(|(_, n)| Vector2::new(n.y, -n.x)).unwrap_or(Vector2::new(1.0, 0.0))
                }
            };
            let normal = Vector2::new(-tangent.y, tangent.x);
            if let Some((prev_position, _)) = previous {
                s += (position - prev_position).norm();
            }
            samples.push(StrokeSample {
                position,
                normal,
                speed,
                half_widths: [hw, hw],
                s,
            });
            previous = Some((position, normal));
        }
        samples
    }

    fn translate(&mut self, delta: &Vector2<f64>) {
        for p in &mut self.positions {
            *p += delta;
        }
    }

    fn transform(&mut self, matrix: &Matrix3<f64>) {
        for p in &mut self.positions {
            *p = matrix.transform_point(p);
        }
        let det = matrix[(0, 0)] * matrix[(1, 1)] - matrix[(0, 1)] * matrix[(1, 0)];
        let scale = det.abs().sqrt();
        if (scale - 1.0).abs() > EPSILON {
            for w in &mut self.widths {
                *w *= scale;
            }
        }
    }

    fn snapped(
        &self,
        start: &Point2<f64>,
        end: &Point2<f64>,
        mode: SnapMode,
    ) -> Box<dyn StrokeModel> {
        let mut out = self.clone();
        let n = self.positions.len();
        if self.closed {
            return Box::new(out);
        }
        if n < 2 {
            let width = self.width_at(0);
            out.positions = vec![*start, *end];
            out.widths = vec![width];
            return Box::new(out);
        }

        let start_delta = start - self.positions[0];
        let end_delta = end - self.positions[n - 1];

        let mut weights: Vec<f64> = Vec::with_capacity(n);
        let mut total = 0.0;
        if mode == SnapMode::LinearInArclength {
            weights.push(0.0);
            for w in self.positions.windows(2) {
                total += (w[1] - w[0]).norm();
                weights.push(total);
            }
        }
        if mode == SnapMode::LinearInParameter || total <= EPSILON {
            weights = (0..n).map(|i| i as f64).collect();
            total = (n - 1) as f64;
        }

        for (p, w) in out.positions.iter_mut().zip(weights) {
            let u = w / total;
            *p += start_delta * (1.0 - u) + end_delta * u;
        }
        // Land exactly on the targets despite rounding.
        out.positions[0] = *start;
        out.positions[n - 1] = *end;
        Box::new(out)
    }

    fn reversed(&self) -> Box<dyn StrokeModel> {
        let (mut positions, mut widths) = per_point_widths(self);
        if self.closed && positions.len() > 1 {
            // Keep the same starting point.
            positions[1..].reverse();
            widths[1..].reverse();
        } else {
            positions.reverse();
            widths.reverse();
        }
        Box::new(Self {
            positions,
            widths,
            closed: self.closed,
        })
    }
}

/// Control points of a stroke with widths expanded to one per point.
pub(crate) fn per_point_widths(model: &dyn StrokeModel) -> (Vec<Point2<f64>>, Vec<f64>) {
    let positions = model.positions().to_vec();
    let widths = (0..positions.len()).map(|i| model.width_at(i)).collect();
    (positions, widths)
}

/// Concatenates halfedge strokes end to end, each traversed in its given
/// direction. The joint point shared by consecutive strokes is kept once.
pub fn concat_halfedge_strokes(parts: &[(&dyn StrokeModel, bool)]) -> CatmullRomStroke {
    let mut positions: Vec<Point2<f64>> = Vec::new();
    let mut widths: Vec<f64> = Vec::new();
    for &(model, direction) in parts {
        let (mut p, mut w) = per_point_widths(model);
        if !direction {
            p.reverse();
            w.reverse();
        }
        let skip = match (positions.last(), p.first()) {
            (Some(last), Some(first)) if (last - first).norm() <= 1e-9 => 1,
            _ => 0,
        };
        positions.extend(p.into_iter().skip(skip));
        widths.extend(w.into_iter().skip(skip));
    }
    CatmullRomStroke::open(positions, widths)
}

fn angle_between(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    if a.norm() <= EPSILON || b.norm() <= EPSILON {
        return 0.0;
    }
    let cross = a.x * b.y - a.y * b.x;
    cross.atan2(a.dot(b)).abs()
}
