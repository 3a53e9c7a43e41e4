// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Color property.
//!
//! When cells are concatenated, the resulting color is the one covering the
//! largest part of the result: edges weigh their colors by arclength, faces
//! by area. Ties go to the color met first.

use std::any::Any;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::property::{CellProperty, KeyFaceData, KeyHalfedgeData, UpdateResult};
use crate::stroke::StrokeModel;

/// RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// The "color" property of a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorProperty {
    color: Color,
    // Pending concatenation: colors with their accumulated weight.
    weighted: Vec<(Color, f64)>,
}

impl ColorProperty {
    pub const NAME: &'static str = "color";

    pub fn new(color: Color) -> Self {
        Self {
            color,
            weighted: Vec::new(),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn from_json(value: &Value) -> Result<Box<dyn CellProperty>> {
        let color: Color = serde_json::from_value(value.clone())
            .map_err(|e| Error::Serialization(format!("invalid color: {e}")))?;
        Ok(Box::new(ColorProperty::new(color)))
    }

    fn weighted_list(&self, weight: f64) -> Vec<(Color, f64)> {
        if self.weighted.is_empty() {
            vec![(self.color, weight)]
        } else {
            self.weighted.clone()
        }
    }

    fn concat(&self, own_weight: f64, other: Option<&ColorProperty>, other_weight: f64) -> Box<dyn CellProperty> {
        let mut list = self.weighted_list(own_weight);
        if let Some(other) = other {
            accumulate(&mut list, other.weighted_list(other_weight));
        }
        Box::new(ColorProperty {
            color: self.color,
            weighted: list,
        })
    }
}

fn accumulate(list: &mut Vec<(Color, f64)>, more: Vec<(Color, f64)>) {
    for (color, weight) in more {
        match list.iter_mut().find(|(c, _)| *c == color) {
            Some(entry) => entry.1 += weight,
            None => list.push((color, weight)),
        }
    }
}

fn heaviest(list: &[(Color, f64)]) -> Option<Color> {
    let mut best: Option<(Color, f64)> = None;
    for &(color, weight) in list {
        if best.map_or(true, |(_, w)| weight > w) {
            best = Some((color, weight));
        }
    }
    best.map(|(c, _)| c)
}

impl CellProperty for ColorProperty {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn clone_box(&self) -> Box<dyn CellProperty> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> Option<Value> {
        serde_json::to_value(self.color).ok()
    }

    fn from_concat_step_halfedges(
        &self,
        a: &KeyHalfedgeData<'_>,
        b: &KeyHalfedgeData<'_>,
    ) -> Option<Box<dyn CellProperty>> {
        let other = b.properties.get_as::<ColorProperty>(Self::NAME);
        Some(self.concat(a.length, other, b.length))
    }

    fn from_concat_step_faces(
        &self,
        a: &KeyFaceData<'_>,
        b: &KeyFaceData<'_>,
    ) -> Option<Box<dyn CellProperty>> {
        let other = b.properties.get_as::<ColorProperty>(Self::NAME);
        Some(self.concat(a.area, other, b.area))
    }

    fn finalize_concat(&mut self) -> UpdateResult {
        let Some(best) = heaviest(&self.weighted) else {
            return UpdateResult::Unchanged;
        };
        self.weighted.clear();
        if best == self.color {
            UpdateResult::Unchanged
        } else {
            self.color = best;
            UpdateResult::Changed
        }
    }

    fn from_glue_halfedges(
        &self,
        sources: &[KeyHalfedgeData<'_>],
        _glued: &dyn StrokeModel,
    ) -> Option<Box<dyn CellProperty>> {
        let mut list = Vec::new();
        for source in sources {
            if let Some(p) = source.properties.get_as::<ColorProperty>(Self::NAME) {
                accumulate(&mut list, vec![(p.color, source.length)]);
            }
        }
        heaviest(&list).map(|c| Box::new(ColorProperty::new(c)) as Box<dyn CellProperty>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::CellProperties;
    use crate::stroke::CatmullRomStroke;
    use nalgebra::Point2;

    const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    fn props(color: Color) -> CellProperties {
        let mut p = CellProperties::new();
        p.insert(Box::new(ColorProperty::new(color)));
        p
    }

    fn halfedge(properties: &CellProperties, length: f64) -> KeyHalfedgeData<'_> {
        KeyHalfedgeData {
            properties,
            direction: true,
            length,
        }
    }

    #[test]
    fn longest_edge_color_wins() {
        let (a, b, c) = (props(RED), props(BLUE), props(RED));
        let step1 = CellProperties::concat_step_halfedges(&halfedge(&a, 1.0), &halfedge(&b, 3.0));
        let mut step2 = CellProperties::concat_step_halfedges(&halfedge(&step1, 4.0), &halfedge(&c, 1.5));
        step2.finalize_concat();
        // Blue covers 3.0, red covers 2.5.
        assert_eq!(step2.get_as::<ColorProperty>("color").unwrap().color(), BLUE);
    }

    #[test]
    fn ties_go_to_the_first_color() {
        let (a, b) = (props(RED), props(BLUE));
        let mut merged = CellProperties::concat_step_halfedges(&halfedge(&a, 2.0), &halfedge(&b, 2.0));
        merged.finalize_concat();
        assert_eq!(merged.get_as::<ColorProperty>("color").unwrap().color(), RED);
    }

    #[test]
    fn largest_face_color_wins() {
        let (a, b) = (props(RED), props(BLUE));
        let mut merged = CellProperties::concat_step_faces(
            &KeyFaceData { properties: &a, area: 1.0 },
            &KeyFaceData { properties: &b, area: 10.0 },
        );
        assert_eq!(merged.finalize_concat(), UpdateResult::Changed);
        assert_eq!(merged.get_as::<ColorProperty>("color").unwrap().color(), BLUE);
    }

    #[test]
    fn glue_picks_the_longest_source() {
        let (a, b) = (props(RED), props(BLUE));
        let glued = CatmullRomStroke::segment(Point2::origin(), Point2::new(1.0, 0.0), 1.0);
        let sources = [halfedge(&a, 1.0), halfedge(&b, 5.0)];
        let merged = CellProperties::from_glue_halfedges(&sources, &glued);
        assert_eq!(merged.get_as::<ColorProperty>("color").unwrap().color(), BLUE);
    }

    #[test]
    fn json_round_trip() {
        let p = ColorProperty::new(Color::rgba(0.1, 0.2, 0.3, 0.5));
        let json = p.to_json().unwrap();
        let back = ColorProperty::from_json(&json).unwrap();
        assert_eq!(
            back.as_any().downcast_ref::<ColorProperty>().unwrap().color(),
            p.color()
        );
        assert!(ColorProperty::from_json(&Value::String("red".into())).is_err());
    }
}
