// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry owned by a key edge.
//!
//! [`KeyEdgeData`] keeps the authored stroke untouched and derives from it
//! a snapped stroke (endpoints moved onto the boundary vertices) and a
//! lazily computed [`EdgeSampling`]. Snapping always starts again from the
//! authored stroke, so snapping twice to the same targets is a no-op and a
//! shape is never deformed twice.

use std::cell::OnceCell;

use nalgebra::{Matrix3, Point2, Vector2};

use crate::dom::{self, DomElement, DomValue};
use crate::error::{Error, Result};
use crate::geometry::Rect2;
use crate::stroke::{SamplingQuality, SnapMode, StrokeModel, StrokeSample};

/// Sampled centerline of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSampling {
    samples: Vec<StrokeSample>,
    centerline_bbox: Option<Rect2>,
    offset_line_tangents: [[Vector2<f64>; 2]; 2],
}

impl EdgeSampling {
    pub fn new(samples: Vec<StrokeSample>) -> Self {
        let centerline_bbox = Rect2::from_points(samples.iter().map(|s| &s.position));
        let offset_line_tangents = compute_offset_line_tangents(&samples);
        Self {
            samples,
            centerline_bbox,
            offset_line_tangents,
        }
    }

    pub fn samples(&self) -> &[StrokeSample] {
        &self.samples
    }

    /// Bounding box of the centerline samples.
    pub fn bounding_box(&self) -> Option<Rect2> {
        self.centerline_bbox
    }

    /// Unit tangents of the left and right offset lines, at the start
    /// (`[0]`) and end (`[1]`) of the edge, pointing along the traversal.
    pub fn offset_line_tangents(&self) -> &[[Vector2<f64>; 2]; 2] {
        &self.offset_line_tangents
    }

    /// Total arclength of the centerline.
    pub fn length(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.s)
    }
}

fn compute_offset_line_tangents(samples: &[StrokeSample]) -> [[Vector2<f64>; 2]; 2] {
    let mut tangents = [[Vector2::zeros(); 2]; 2];
    let n = samples.len();
    if n < 2 {
        return tangents;
    }
    let ends = [(&samples[0], &samples[1]), (&samples[n - 2], &samples[n - 1])];
    for (i, (a, b)) in ends.into_iter().enumerate() {
        for side in 0..2 {
            let d = b.offset_point(side) - a.offset_point(side);
            let norm = d.norm();
            if norm > 0.0 {
                tangents[i][side] = d / norm;
            }
        }
    }
    tangents
}

#[derive(Debug, Clone)]
struct SnappedStroke {
    start: Point2<f64>,
    end: Point2<f64>,
    mode: SnapMode,
    stroke: Box<dyn StrokeModel>,
}

/// Authored stroke of an edge plus its derived caches.
#[derive(Debug, Clone)]
pub struct KeyEdgeData {
    stroke: Box<dyn StrokeModel>,
    snapped: Option<SnappedStroke>,
    quality: SamplingQuality,
    sampling: OnceCell<EdgeSampling>,
}

impl KeyEdgeData {
    pub fn new(stroke: Box<dyn StrokeModel>, quality: SamplingQuality) -> Self {
        Self {
            stroke,
            snapped: None,
            quality,
            sampling: OnceCell::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stroke.is_closed()
    }

    /// The authored stroke.
    pub fn stroke(&self) -> &dyn StrokeModel {
        self.stroke.as_ref()
    }

    /// The stroke actually displayed: snapped if the edge has been snapped,
    /// the authored stroke otherwise.
    pub fn snapped_stroke(&self) -> &dyn StrokeModel {
        match &self.snapped {
            Some(s) => s.stroke.as_ref(),
            None => self.stroke.as_ref(),
        }
    }

    pub fn sampling_quality(&self) -> SamplingQuality {
        self.quality
    }

    /// Returns `true` if the quality changed.
    pub fn set_sampling_quality(&mut self, quality: SamplingQuality) -> bool {
        if self.quality == quality {
            return false;
        }
        self.quality = quality;
        self.dirty_sampling();
        true
    }

    /// Replaces the authored stroke and drops every derived cache.
    pub fn set_stroke(&mut self, stroke: Box<dyn StrokeModel>) {
        self.stroke = stroke;
        self.snapped = None;
        self.dirty_sampling();
    }

    /// Snaps the authored stroke onto the given endpoint positions. Returns
    /// `true` if the displayed shape changed.
    pub fn snap(&mut self, start: Point2<f64>, end: Point2<f64>, mode: SnapMode) -> bool {
        if self.stroke.is_closed() {
            return false;
        }
        if let Some(s) = &self.snapped {
            if s.start == start && s.end == end && s.mode == mode {
                return false;
            }
        }
        let stroke = self.stroke.snapped(&start, &end, mode);
        self.snapped = Some(SnappedStroke {
            start,
            end,
            mode,
            stroke,
        });
        self.dirty_sampling();
        true
    }

    /// Sampling of the displayed stroke, computed on first access.
    pub fn sampling(&self) -> &EdgeSampling {
        self.sampling
            .get_or_init(|| EdgeSampling::new(self.snapped_stroke().sample(self.quality)))
    }

    pub fn has_cached_sampling(&self) -> bool {
        self.sampling.get().is_some()
    }

    pub fn dirty_sampling(&mut self) {
        self.sampling.take();
    }

    /// Centerline arclength of the displayed stroke.
    pub fn length(&self) -> f64 {
        self.sampling().length()
    }

    pub fn translate(&mut self, delta: &Vector2<f64>) {
        self.stroke.translate(delta);
        if let Some(s) = &mut self.snapped {
            s.stroke.translate(delta);
            s.start += delta;
            s.end += delta;
        }
        self.dirty_sampling();
    }

    pub fn transform(&mut self, matrix: &Matrix3<f64>) {
        self.stroke.transform(matrix);
        if let Some(s) = &mut self.snapped {
            s.stroke.transform(matrix);
            s.start = matrix.transform_point(&s.start);
            s.end = matrix.transform_point(&s.end);
        }
        self.dirty_sampling();
    }

    // ========================================================================
    // Document hooks
    // ========================================================================

    /// Reads "positions" and "widths" from `element` into the authored
    /// stroke. Returns `true` if anything changed.
    pub fn update_from_dom_edge(&mut self, element: &dyn DomElement) -> Result<bool> {
        let positions = dom::read_vec2d_array(element, "positions")?.ok_or_else(|| {
            Error::Serialization(format!(
                "<{}> has no `positions` attribute",
                element.tag_name()
            ))
        })?;
        let widths = dom::read_double_array(element, "widths")?.unwrap_or_default();

        if positions.as_slice() == self.stroke.positions() && widths.as_slice() == self.stroke.widths()
        {
            return Ok(false);
        }
        let mut stroke = self.stroke.clone_box();
        stroke.set_control_points(positions, widths);
        self.set_stroke(stroke);
        Ok(true)
    }

    pub fn write_to_dom_edge(&self, element: &mut dyn DomElement) {
        element.set_attribute(
            "positions",
            DomValue::Vec2dArray(self.stroke.positions().to_vec()),
        );
        element.set_attribute("widths", DomValue::DoubleArray(self.stroke.widths().to_vec()));
    }

    pub fn remove_from_dom_edge(element: &mut dyn DomElement) {
        element.remove_attribute("positions");
        element.remove_attribute("widths");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;
    use crate::stroke::CatmullRomStroke;
    use approx::assert_relative_eq;

    fn data() -> KeyEdgeData {
        let stroke = CatmullRomStroke::open(
            vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 0.0)],
            vec![1.0],
        );
        KeyEdgeData::new(Box::new(stroke), SamplingQuality::Medium)
    }

    #[test]
    fn snapping_twice_to_the_same_targets_is_a_noop() {
        let mut d = data();
        let a = Point2::new(0.0, 1.0);
        let b = Point2::new(3.0, 0.0);
        assert!(d.snap(a, b, SnapMode::LinearInArclength));
        let first = d.snapped_stroke().positions().to_vec();
        d.sampling();
        assert!(!d.snap(a, b, SnapMode::LinearInArclength));
        assert!(d.has_cached_sampling());
        assert_eq!(d.snapped_stroke().positions(), first.as_slice());
        // Authored stroke is untouched.
        assert_eq!(d.stroke().positions()[0], Point2::new(0.0, 0.0));
    }

    #[test]
    fn snapping_elsewhere_invalidates_sampling() {
        let mut d = data();
        d.snap(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), SnapMode::default());
        d.sampling();
        assert!(d.snap(Point2::new(0.0, 0.0), Point2::new(4.0, 0.0), SnapMode::default()));
        assert!(!d.has_cached_sampling());
        let last = *d.sampling().samples().last().unwrap();
        assert_relative_eq!(last.position, Point2::new(4.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn translate_keeps_snap_cache_consistent() {
        let mut d = data();
        let (a, b) = (Point2::new(0.0, 0.0), Point2::new(2.0, 0.0));
        d.snap(a, b, SnapMode::default());
        let delta = Vector2::new(1.0, -1.0);
        d.translate(&delta);
        assert!(!d.snap(a + delta, b + delta, SnapMode::default()));
        assert_relative_eq!(d.snapped_stroke().positions()[0], Point2::new(1.0, -1.0));
    }

    #[test]
    fn offset_line_tangents_of_a_straight_edge() {
        let stroke = CatmullRomStroke::segment(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), 2.0);
        let d = KeyEdgeData::new(Box::new(stroke), SamplingQuality::Low);
        let t = d.sampling().offset_line_tangents();
        assert_relative_eq!(t[0][0], Vector2::new(1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(t[1][1], Vector2::new(1.0, 0.0), epsilon = 1e-12);
        let bbox = d.sampling().bounding_box().unwrap();
        assert_relative_eq!(bbox.size().x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn dom_round_trip() {
        let d = data();
        let mut element = Element::new("edge");
        d.write_to_dom_edge(&mut element);

        let mut other = KeyEdgeData::new(
            Box::new(CatmullRomStroke::segment(Point2::origin(), Point2::new(5.0, 5.0), 1.0)),
            SamplingQuality::Low,
        );
        assert!(other.update_from_dom_edge(&element).unwrap());
        assert_eq!(other.stroke().positions(), d.stroke().positions());
        assert!(!other.update_from_dom_edge(&element).unwrap());

        KeyEdgeData::remove_from_dom_edge(&mut element);
        assert!(other.update_from_dom_edge(&element).is_err());
    }
}
