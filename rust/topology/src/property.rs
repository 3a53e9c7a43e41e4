// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extensible per-cell properties.
//!
//! Authored attributes (a color, free-form metadata, ...) are attached to
//! cells as boxed [`CellProperty`] trait objects keyed by name. When a
//! topological operation replaces cells by new ones, the engine asks each
//! property how to combine itself:
//!
//! * concatenation (uncutting at a vertex or an edge) proceeds step by step
//!   through [`CellProperty::from_concat_step_halfedges`] or
//!   [`CellProperty::from_concat_step_faces`], then
//!   [`CellProperty::finalize_concat`] once all steps are done;
//! * gluing edges goes through [`CellProperty::from_glue_halfedges`].
//!
//! A property that does not know how to combine returns `None`, and the
//! property of the first source is kept as is. Properties are never dropped
//! by a topological operation.

use std::any::Any;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use nalgebra::{Matrix3, Vector2};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::dictionary::AttributesProperty;
use crate::error::{Error, Result};
use crate::stroke::StrokeModel;
use crate::style::ColorProperty;

/// Interned property name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyName(Arc<str>);

impl PropertyName {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PropertyName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PropertyName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a property reacted to a geometry change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateResult {
    #[default]
    Unchanged,
    Changed,
}

impl UpdateResult {
    pub fn or(self, other: UpdateResult) -> UpdateResult {
        if self == UpdateResult::Changed || other == UpdateResult::Changed {
            UpdateResult::Changed
        } else {
            UpdateResult::Unchanged
        }
    }
}

/// One side of an edge concatenation or glue.
#[derive(Debug, Clone, Copy)]
pub struct KeyHalfedgeData<'a> {
    pub properties: &'a CellProperties,
    pub direction: bool,
    /// Centerline arclength of the edge.
    pub length: f64,
}

/// One side of a face concatenation.
#[derive(Debug, Clone, Copy)]
pub struct KeyFaceData<'a> {
    pub properties: &'a CellProperties,
    pub area: f64,
}

/// A named, authored attribute of a cell.
pub trait CellProperty: fmt::Debug + Any {
    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn CellProperty>;

    fn as_any(&self) -> &dyn Any;

    /// JSON form used by snapshots, `None` if the property is not persisted.
    fn to_json(&self) -> Option<Value> {
        None
    }

    fn on_translate_geometry(&mut self, _delta: &Vector2<f64>) -> UpdateResult {
        UpdateResult::Unchanged
    }

    fn on_transform_geometry(&mut self, _matrix: &Matrix3<f64>) -> UpdateResult {
        UpdateResult::Unchanged
    }

    fn on_update_geometry(&mut self, _stroke: &dyn StrokeModel) -> UpdateResult {
        UpdateResult::Unchanged
    }

    /// Combines the property of `a` (which is `self`) with the property of
    /// the same name in `b`, when two halfedges are joined end to end.
    fn from_concat_step_halfedges(
        &self,
        _a: &KeyHalfedgeData<'_>,
        _b: &KeyHalfedgeData<'_>,
    ) -> Option<Box<dyn CellProperty>> {
        None
    }

    /// Combines the property of `a` (which is `self`) with the property of
    /// the same name in `b`, when two faces are merged.
    fn from_concat_step_faces(
        &self,
        _a: &KeyFaceData<'_>,
        _b: &KeyFaceData<'_>,
    ) -> Option<Box<dyn CellProperty>> {
        None
    }

    /// Called once after the last concatenation step.
    fn finalize_concat(&mut self) -> UpdateResult {
        UpdateResult::Unchanged
    }

    /// Property of an edge glued from `sources`. `self` belongs to the first
    /// source carrying this property.
    fn from_glue_halfedges(
        &self,
        _sources: &[KeyHalfedgeData<'_>],
        _glued: &dyn StrokeModel,
    ) -> Option<Box<dyn CellProperty>> {
        None
    }
}

impl Clone for Box<dyn CellProperty> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Ordered map of the properties of one cell.
#[derive(Debug, Clone, Default)]
pub struct CellProperties {
    map: BTreeMap<PropertyName, Box<dyn CellProperty>>,
}

impl CellProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn CellProperty> {
        self.map.get(name).map(|p| p.as_ref())
    }

    /// Typed access to a property.
    pub fn get_as<T: CellProperty>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref::<T>()
    }

    /// Inserts a property, replacing any property of the same name. Returns
    /// `true` if one was replaced.
    pub fn insert(&mut self, property: Box<dyn CellProperty>) -> bool {
        let name = PropertyName::new(property.name());
        self.map.insert(name, property).is_some()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.map.remove(name).is_some()
    }

    /// Removes all properties. Returns `true` if there were any.
    pub fn clear(&mut self) -> bool {
        let had_any = !self.map.is_empty();
        self.map.clear();
        had_any
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyName, &dyn CellProperty)> {
        self.map.iter().map(|(k, v)| (k, v.as_ref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }

    fn update_all(&mut self, mut f: impl FnMut(&mut dyn CellProperty) -> UpdateResult) -> UpdateResult {
        self.map
            .values_mut()
            .fold(UpdateResult::Unchanged, |acc, p| acc.or(f(p.as_mut())))
    }

    pub fn on_translate_geometry(&mut self, delta: &Vector2<f64>) -> UpdateResult {
        self.update_all(|p| p.on_translate_geometry(delta))
    }

    pub fn on_transform_geometry(&mut self, matrix: &Matrix3<f64>) -> UpdateResult {
        self.update_all(|p| p.on_transform_geometry(matrix))
    }

    pub fn on_update_geometry(&mut self, stroke: &dyn StrokeModel) -> UpdateResult {
        self.update_all(|p| p.on_update_geometry(stroke))
    }

    pub fn finalize_concat(&mut self) -> UpdateResult {
        self.update_all(|p| p.finalize_concat())
    }

    /// Names present in any of the given property sets, first-seen order.
    fn union_names<'a>(sets: impl IntoIterator<Item = &'a CellProperties>) -> Vec<PropertyName> {
        let mut names: Vec<PropertyName> = Vec::new();
        for set in sets {
            for name in set.map.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// One step of halfedge concatenation.
    pub fn concat_step_halfedges(a: &KeyHalfedgeData<'_>, b: &KeyHalfedgeData<'_>) -> Self {
        let mut result = Self::default();
        for name in Self::union_names([a.properties, b.properties]) {
            let combined = match (a.properties.map.get(&name), b.properties.map.get(&name)) {
                (Some(pa), Some(_)) => pa.from_concat_step_halfedges(a, b).unwrap_or_else(|| pa.clone()),
                (Some(pa), None) => pa.clone(),
                (None, Some(pb)) => pb.clone(),
                (None, None) => continue,
            };
            result.map.insert(name, combined);
        }
        result
    }

    /// One step of face concatenation.
    pub fn concat_step_faces(a: &KeyFaceData<'_>, b: &KeyFaceData<'_>) -> Self {
        let mut result = Self::default();
        for name in Self::union_names([a.properties, b.properties]) {
            let combined = match (a.properties.map.get(&name), b.properties.map.get(&name)) {
                (Some(pa), Some(_)) => pa.from_concat_step_faces(a, b).unwrap_or_else(|| pa.clone()),
                (Some(pa), None) => pa.clone(),
                (None, Some(pb)) => pb.clone(),
                (None, None) => continue,
            };
            result.map.insert(name, combined);
        }
        result
    }

    /// Properties of an edge glued from `sources`.
    pub fn from_glue_halfedges(sources: &[KeyHalfedgeData<'_>], glued: &dyn StrokeModel) -> Self {
        let mut result = Self::default();
        for name in Self::union_names(sources.iter().map(|s| s.properties)) {
            let Some(first) = sources.iter().find_map(|s| s.properties.map.get(&name)) else {
                continue;
            };
            let combined = first
                .from_glue_halfedges(sources, glued)
                .unwrap_or_else(|| first.clone());
            result.map.insert(name, combined);
        }
        result
    }

    /// Union of property sets where the first set carrying a name wins.
    pub fn merged_first_wins<'a>(sets: impl IntoIterator<Item = &'a CellProperties>) -> Self {
        let mut result = Self::default();
        for set in sets {
            for (name, p) in &set.map {
                result.map.entry(name.clone()).or_insert_with(|| p.clone());
            }
        }
        result
    }

    /// JSON object of the persisted properties.
    pub fn to_json(&self) -> serde_json::Map<String, Value> {
        self.map
            .iter()
            .filter_map(|(name, p)| Some((name.to_string(), p.to_json()?)))
            .collect()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Builds a property from its JSON form.
pub type PropertyFactory = fn(&Value) -> Result<Box<dyn CellProperty>>;

/// Table of the property kinds a complex knows how to load.
#[derive(Clone, Default)]
pub struct PropertyRegistry {
    factories: FxHashMap<String, PropertyFactory>,
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PropertyRegistry").field("factories", &names).finish()
    }
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing the built-in "color" and "attributes" properties.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ColorProperty::NAME, ColorProperty::from_json);
        registry.register(AttributesProperty::NAME, AttributesProperty::from_json);
        registry
    }

    pub fn register(&mut self, name: &str, factory: PropertyFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a property. Unknown names yield `Ok(None)`.
    pub fn create(&self, name: &str, value: &Value) -> Result<Option<Box<dyn CellProperty>>> {
        match self.factories.get(name) {
            Some(factory) => factory(value).map(Some),
            None => Ok(None),
        }
    }

    /// Builds the property set stored in a snapshot. Unknown property kinds
    /// are skipped with a warning.
    pub fn load_properties(&self, json: &serde_json::Map<String, Value>) -> Result<CellProperties> {
        let mut properties = CellProperties::default();
        for (name, value) in json {
            match self.create(name, value)? {
                Some(p) => {
                    if p.name() != name {
                        return Err(Error::Serialization(format!(
                            "factory for `{name}` built a `{}` property",
                            p.name()
                        )));
                    }
                    properties.insert(p);
                }
                None => tracing::warn!(property = %name, "skipping unknown cell property"),
            }
        }
        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictValue;
    use crate::style::Color;

    fn color(r: f64, g: f64, b: f64) -> Box<dyn CellProperty> {
        Box::new(ColorProperty::new(Color::rgb(r, g, b)))
    }

    #[test]
    fn insert_remove_clear() {
        let mut props = CellProperties::new();
        assert!(!props.insert(color(1.0, 0.0, 0.0)));
        assert!(props.insert(color(0.0, 1.0, 0.0)));
        assert_eq!(props.len(), 1);
        assert_eq!(
            props.get_as::<ColorProperty>("color").unwrap().color(),
            Color::rgb(0.0, 1.0, 0.0)
        );
        assert!(props.remove("color"));
        assert!(!props.remove("color"));
        assert!(!props.clear());
    }

    #[test]
    fn concat_never_drops_properties() {
        let mut a = CellProperties::new();
        a.insert(color(1.0, 0.0, 0.0));
        let mut b = CellProperties::new();
        let mut attrs = AttributesProperty::default();
        attrs.set("layer", DictValue::String("ink".into()));
        b.insert(Box::new(attrs));

        let merged = CellProperties::concat_step_halfedges(
            &KeyHalfedgeData { properties: &a, direction: true, length: 1.0 },
            &KeyHalfedgeData { properties: &b, direction: true, length: 1.0 },
        );
        let names: Vec<&str> = merged.names().collect();
        assert_eq!(names, vec!["attributes", "color"]);
    }

    #[test]
    fn merged_first_wins_keeps_first_value() {
        let mut a = CellProperties::new();
        a.insert(color(1.0, 0.0, 0.0));
        let mut b = CellProperties::new();
        b.insert(color(0.0, 0.0, 1.0));
        let merged = CellProperties::merged_first_wins([&a, &b]);
        assert_eq!(
            merged.get_as::<ColorProperty>("color").unwrap().color(),
            Color::rgb(1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn registry_round_trip() {
        let registry = PropertyRegistry::with_builtins();
        let mut props = CellProperties::new();
        props.insert(color(0.25, 0.5, 0.75));
        let json = props.to_json();
        let loaded = registry.load_properties(&json).unwrap();
        assert_eq!(
            loaded.get_as::<ColorProperty>("color").unwrap().color(),
            Color::rgb(0.25, 0.5, 0.75)
        );
    }

    #[test]
    fn registry_skips_unknown_names() {
        let registry = PropertyRegistry::with_builtins();
        let mut json = serde_json::Map::new();
        json.insert("sparkle".into(), Value::Bool(true));
        let loaded = registry.load_properties(&json).unwrap();
        assert!(loaded.is_empty());
        assert!(!registry.contains("sparkle"));
    }

    #[test]
    fn update_result_or() {
        assert_eq!(UpdateResult::Unchanged.or(UpdateResult::Changed), UpdateResult::Changed);
        assert_eq!(UpdateResult::Unchanged.or(UpdateResult::Unchanged), UpdateResult::Unchanged);
    }
}
