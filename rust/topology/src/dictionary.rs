// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed key-value metadata that can be attached to any cell.

use std::any::Any;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::property::{CellProperty, KeyFaceData, KeyHalfedgeData};
use crate::stroke::StrokeModel;

/// A typed value stored in a dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DictValue {
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<DictValue>),
}

/// A typed key-value map.
pub type Dictionary = FxHashMap<String, DictValue>;

/// The "attributes" property: free-form authored metadata.
///
/// Merging is a union where the first source wins for each key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributesProperty {
    values: Dictionary,
}

impl AttributesProperty {
    pub const NAME: &'static str = "attributes";

    pub fn new(values: Dictionary) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &Dictionary {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&DictValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: DictValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<DictValue> {
        self.values.remove(key)
    }

    pub fn from_json(value: &Value) -> Result<Box<dyn CellProperty>> {
        let values: Dictionary = serde_json::from_value(value.clone())
            .map_err(|e| Error::Serialization(format!("invalid attributes: {e}")))?;
        Ok(Box::new(AttributesProperty::new(values)))
    }

    fn union_with(&self, others: &[Option<&AttributesProperty>]) -> Box<dyn CellProperty> {
        let mut values = self.values.clone();
        for other in others.iter().flatten() {
            for (k, v) in &other.values {
                values.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        Box::new(AttributesProperty::new(values))
    }
}

impl CellProperty for AttributesProperty {
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
        serde_json::to_value(&self.values).ok()
    }

    fn from_concat_step_halfedges(
        &self,
        _a: &KeyHalfedgeData<'_>,
        b: &KeyHalfedgeData<'_>,
    ) -> Option<Box<dyn CellProperty>> {
        Some(self.union_with(&[b.properties.get_as::<AttributesProperty>(Self::NAME)]))
    }

    fn from_concat_step_faces(
        &self,
        _a: &KeyFaceData<'_>,
        b: &KeyFaceData<'_>,
    ) -> Option<Box<dyn CellProperty>> {
        Some(self.union_with(&[b.properties.get_as::<AttributesProperty>(Self::NAME)]))
    }

    fn from_glue_halfedges(
        &self,
        sources: &[KeyHalfedgeData<'_>],
        _glued: &dyn StrokeModel,
    ) -> Option<Box<dyn CellProperty>> {
        let others: Vec<Option<&AttributesProperty>> = sources
            .iter()
            .map(|s| s.properties.get_as::<AttributesProperty>(Self::NAME))
            .collect();
        Some(self.union_with(&others))
    }
}
