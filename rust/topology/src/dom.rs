// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Narrow document contract used to import and export cell geometry.
//!
//! The complex never owns a document. A document layer implements
//! [`DomElement`] for its element type, and the per-cell hooks read and
//! write named attributes through it. [`Element`] is a plain in-memory
//! implementation.

use std::collections::BTreeMap;

use nalgebra::Point2;

use crate::error::{Error, Result};

/// Value of a document attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum DomValue {
    Bool(bool),
    Double(f64),
    String(String),
    Vec2d(Point2<f64>),
    DoubleArray(Vec<f64>),
    Vec2dArray(Vec<Point2<f64>>),
}

impl DomValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DomValue::Bool(_) => "bool",
            DomValue::Double(_) => "double",
            DomValue::String(_) => "string",
            DomValue::Vec2d(_) => "vec2d",
            DomValue::DoubleArray(_) => "double array",
            DomValue::Vec2dArray(_) => "vec2d array",
        }
    }
}

/// Attribute access on a document element.
pub trait DomElement {
    fn tag_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<&DomValue>;

    fn set_attribute(&mut self, name: &str, value: DomValue);

    /// Removes an attribute, returning whether it was present.
    fn remove_attribute(&mut self, name: &str) -> bool;
}

/// In-memory document element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    tag_name: String,
    attributes: BTreeMap<String, DomValue>,
}

impl Element {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &DomValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl DomElement for Element {
    fn tag_name(&self) -> &str {
        &self.tag_name
    }

    fn attribute(&self, name: &str) -> Option<&DomValue> {
        self.attributes.get(name)
    }

    fn set_attribute(&mut self, name: &str, value: DomValue) {
        self.attributes.insert(name.to_string(), value);
    }

    fn remove_attribute(&mut self, name: &str) -> bool {
        self.attributes.remove(name).is_some()
    }
}

fn type_mismatch(name: &str, expected: &str, found: &DomValue) -> Error {
    Error::Serialization(format!(
        "attribute `{name}` should be a {expected}, found a {}",
        found.type_name()
    ))
}

pub(crate) fn read_vec2d_array(
    element: &dyn DomElement,
    name: &str,
) -> Result<Option<Vec<Point2<f64>>>> {
    match element.attribute(name) {
        None => Ok(None),
        Some(DomValue::Vec2dArray(points)) => Ok(Some(points.clone())),
        Some(other) => Err(type_mismatch(name, "vec2d array", other)),
    }
}

pub(crate) fn read_double_array(element: &dyn DomElement, name: &str) -> Result<Option<Vec<f64>>> {
    match element.attribute(name) {
        None => Ok(None),
        Some(DomValue::DoubleArray(values)) => Ok(Some(values.clone())),
        Some(DomValue::Double(value)) => Ok(Some(vec![*value])),
        Some(other) => Err(type_mismatch(name, "double array", other)),
    }
}

/// Reads the "position" attribute of a vertex element.
pub fn read_vertex_position(element: &dyn DomElement) -> Result<Option<Point2<f64>>> {
    match element.attribute("position") {
        None => Ok(None),
        Some(DomValue::Vec2d(p)) => Ok(Some(*p)),
        Some(other) => Err(type_mismatch("position", "vec2d", other)),
    }
}

/// Writes the "position" attribute of a vertex element.
pub fn write_vertex_position(element: &mut dyn DomElement, position: Point2<f64>) {
    element.set_attribute("position", DomValue::Vec2d(position));
}
