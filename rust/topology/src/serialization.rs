// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON serialization for complexes.
//!
//! A snapshot lists every node in depth-first pre-order, root first, so
//! that children order (draw order) is preserved. Slot map keys are mapped
//! to sequential indices for portability. Loading replays the snapshot
//! through the operations engine, so every cycle is validated again.

use nalgebra::{Matrix3, Point2};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::cycle::{KeyCycle, KeyHalfedge};
use crate::error::{Error, Result};
use crate::keys::{AnimTime, NodeKey};
use crate::node::{CellKind, NodeKind};
use crate::operations::Operations;
use crate::property::{CellProperties, PropertyRegistry};
use crate::stroke::{CatmullRomStroke, SamplingQuality, StrokeModel};

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Serializable representation of a whole complex.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComplexSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: usize,
    /// `None` for the root only.
    pub parent: Option<usize>,
    pub kind: NodeKindSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindSnapshot {
    Group {
        /// Column-major homogeneous 3x3 matrix.
        transform: [f64; 9],
    },
    KeyVertex {
        time: AnimTime,
        position: [f64; 2],
        #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
        properties: JsonMap,
    },
    KeyEdge {
        time: AnimTime,
        /// `None` for closed edges.
        vertices: Option<[usize; 2]>,
        stroke: StrokeSnapshot,
        sampling_quality: String,
        #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
        properties: JsonMap,
    },
    KeyFace {
        time: AnimTime,
        cycles: Vec<CycleSnapshot>,
        #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
        properties: JsonMap,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StrokeSnapshot {
    pub positions: Vec<[f64; 2]>,
    pub widths: Vec<f64>,
    pub closed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CycleSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steiner_vertex: Option<usize>,
    /// `(edge, direction)` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub halfedges: Vec<(usize, bool)>,
}

impl StrokeSnapshot {
    fn from_model(model: &dyn StrokeModel) -> Self {
        Self {
            positions: model.positions().iter().map(|p| [p.x, p.y]).collect(),
            widths: model.widths().to_vec(),
            closed: model.is_closed(),
        }
    }

    fn to_model(&self) -> Box<dyn StrokeModel> {
        let positions = self.positions.iter().map(|p| Point2::new(p[0], p[1])).collect();
        let widths = self.widths.clone();
        if self.closed {
            Box::new(CatmullRomStroke::closed(positions, widths))
        } else {
            Box::new(CatmullRomStroke::open(positions, widths))
        }
    }
}

impl Complex {
    /// Serializes the complex to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.to_snapshot();
        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Creates a serializable snapshot of the complex.
    pub fn to_snapshot(&self) -> ComplexSnapshot {
        let mut order = vec![self.root()];
        order.extend(self.descendants(self.root()));
        let index: FxHashMap<NodeKey, usize> = order.iter().enumerate().map(|(i, &k)| (k, i)).collect();

        let nodes = order
            .iter()
            .enumerate()
            .filter_map(|(i, &key)| {
                let node = self.node(key)?;
                let kind = match node.kind() {
                    NodeKind::Group(g) => {
                        let mut transform = [0.0; 9];
                        transform.copy_from_slice(g.transform().as_slice());
                        NodeKindSnapshot::Group { transform }
                    }
                    NodeKind::Cell(cell) => {
                        let time = cell.time();
                        let properties = cell.properties().to_json();
                        match cell.kind() {
                            CellKind::KeyVertex(v) => NodeKindSnapshot::KeyVertex {
                                time,
                                position: [v.position().x, v.position().y],
                                properties,
                            },
                            CellKind::KeyEdge(e) => NodeKindSnapshot::KeyEdge {
                                time,
                                vertices: e.vertices().map(|(s, t)| [index[&s], index[&t]]),
                                stroke: StrokeSnapshot::from_model(e.data().stroke()),
                                sampling_quality: e.data().sampling_quality().as_str().to_string(),
                                properties,
                            },
                            CellKind::KeyFace(f) => NodeKindSnapshot::KeyFace {
                                time,
                                cycles: f
                                    .cycles()
                                    .iter()
                                    .map(|c| CycleSnapshot {
                                        steiner_vertex: c.steiner_vertex().map(|v| index[&v]),
                                        halfedges: c
                                            .halfedges()
                                            .iter()
                                            .map(|h| (index[&h.edge()], h.direction()))
                                            .collect(),
                                    })
                                    .collect(),
                                properties,
                            },
                        }
                    }
                };
                Some(NodeSnapshot {
                    id: i,
                    parent: node.parent().map(|p| index[&p]),
                    kind,
                })
            })
            .collect();

        ComplexSnapshot { nodes }
    }

    /// Deserializes a complex from a JSON string, loading the built-in
    /// property kinds.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with_registry(json, &PropertyRegistry::with_builtins())
    }

    /// Deserializes a complex from a JSON string, loading properties with
    /// the given registry.
    pub fn from_json_with_registry(json: &str, registry: &PropertyRegistry) -> Result<Self> {
        let snapshot: ComplexSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(&snapshot, registry)
    }

    /// Reconstructs a complex from a snapshot.
    pub fn from_snapshot(snap: &ComplexSnapshot, registry: &PropertyRegistry) -> Result<Self> {
        let mut complex = Complex::new();
        let mut ops = Operations::new(&mut complex)?;
        let root = ops.complex().root();
        let mut keys: Vec<Option<NodeKey>> = vec![None; snap.nodes.len()];
        let resolve = |keys: &[Option<NodeKey>], i: usize| -> Result<NodeKey> {
            keys.get(i)
                .copied()
                .flatten()
                .ok_or_else(|| Error::Serialization(format!("node {i} referenced before it exists")))
        };

        // Groups, parents first.
        for (i, ns) in snap.nodes.iter().enumerate() {
            let NodeKindSnapshot::Group { transform } = &ns.kind else {
                continue;
            };
            let key = match ns.parent {
                None if i == 0 => root,
                None => return Err(Error::Serialization(format!("node {i} has no parent"))),
                Some(p) => {
                    let parent = resolve(&keys, p)?;
                    ops.create_group(parent, None)?
                }
            };
            ops.set_group_transform(key, Matrix3::from_column_slice(transform))?;
            keys[i] = Some(key);
        }
        if keys.first().copied().flatten() != Some(root) {
            return Err(Error::Serialization("the first node must be the root group".into()));
        }

        // Cells, boundaries first.
        for dimension in 0..3 {
            for (i, ns) in snap.nodes.iter().enumerate() {
                let parent = ns
                    .parent
                    .ok_or_else(|| Error::Serialization(format!("cell {i} has no parent")))
                    .and_then(|p| resolve(&keys, p));
                let (key, properties) = match (&ns.kind, dimension) {
                    (NodeKindSnapshot::KeyVertex { time, position, properties }, 0) => {
                        let p = Point2::new(position[0], position[1]);
                        (ops.create_key_vertex(p, parent?, None, *time)?, properties)
                    }
                    (
                        NodeKindSnapshot::KeyEdge {
                            time,
                            vertices,
                            stroke,
                            sampling_quality,
                            properties,
                        },
                        1,
                    ) => {
                        let model = stroke.to_model();
                        let key = match vertices {
                            Some([s, t]) => {
                                let (s, t) = (resolve(&keys, *s)?, resolve(&keys, *t)?);
                                ops.create_key_open_edge(s, t, model, parent?, None, *time)?
                            }
                            None => ops.create_key_closed_edge(model, parent?, None, *time)?,
                        };
                        let quality = SamplingQuality::parse(sampling_quality).ok_or_else(|| {
                            Error::Serialization(format!("unknown sampling quality `{sampling_quality}`"))
                        })?;
                        ops.set_key_edge_sampling_quality(key, quality)?;
                        (key, properties)
                    }
                    (NodeKindSnapshot::KeyFace { time, cycles, properties }, 2) => {
                        let mut loaded = Vec::with_capacity(cycles.len());
                        for cs in cycles {
                            loaded.push(match cs.steiner_vertex {
                                Some(v) => KeyCycle::from_steiner_vertex(ops.complex(), resolve(&keys, v)?),
                                None => {
                                    let mut hs = Vec::with_capacity(cs.halfedges.len());
                                    for &(e, d) in &cs.halfedges {
                                        hs.push(KeyHalfedge::new(resolve(&keys, e)?, d));
                                    }
                                    KeyCycle::from_halfedges(ops.complex(), hs)
                                }
                            });
                        }
                        (ops.create_key_face(loaded, parent?, None, *time)?, properties)
                    }
                    _ => continue,
                };
                if !properties.is_empty() {
                    let loaded: CellProperties = registry.load_properties(properties)?;
                    if let Some(cell) = ops.complex.cell_mut(key) {
                        cell.properties = loaded;
                    }
                }
                keys[i] = Some(key);
            }
        }

        // Restore the draw order of every group.
        for (i, ns) in snap.nodes.iter().enumerate() {
            if !matches!(ns.kind, NodeKindSnapshot::Group { .. }) {
                continue;
            }
            let group = resolve(&keys, i)?;
            let children: Vec<NodeKey> = snap
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, c)| c.parent == Some(i))
                .map(|(j, _)| resolve(&keys, j))
                .collect::<Result<_>>()?;
            for child in children {
                ops.move_to_group(child, group, None)?;
            }
        }

        drop(ops);
        tracing::debug!(nodes = complex.node_count(), "loaded complex snapshot");
        Ok(complex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{AttributesProperty, DictValue, Dictionary};
    use crate::keys::NodeType;
    use crate::style::{Color, ColorProperty};
    use approx::assert_relative_eq;

    #[test]
    fn roundtrip_empty_complex() {
        let complex = Complex::new();
        let json = complex.to_json().unwrap();
        let restored = Complex::from_json(&json).unwrap();
        assert_eq!(restored.node_count(), 1);
    }

    /// Square face with a colored edge, drawn below its boundary.
    fn square() -> Complex {
        let mut complex = Complex::new();
        let root = complex.root();
        let mut ops = Operations::new(&mut complex).unwrap();
        let g = ops.create_group(root, None).unwrap();
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let vs: Vec<NodeKey> = points
            .iter()
            .map(|&p| ops.create_key_vertex(p, g, None, AnimTime::new(3.0)).unwrap())
            .collect();
        let mut hs = Vec::new();
        for i in 0..4 {
            let (a, b) = (points[i], points[(i + 1) % 4]);
            let stroke = Box::new(CatmullRomStroke::segment(a, b, 2.0));
            let e = ops.create_key_open_edge(vs[i], vs[(i + 1) % 4], stroke, g, None, AnimTime::new(3.0)).unwrap();
            hs.push(KeyHalfedge::new(e, true));
        }
        ops.insert_cell_property(hs[0].edge(), Box::new(ColorProperty::new(Color::rgb(1.0, 0.0, 0.0))))
            .unwrap();
        let cycle = KeyCycle::from_halfedges(ops.complex(), hs);
        let f = ops.create_key_face(vec![cycle], g, None, AnimTime::new(3.0)).unwrap();
        let mut attributes = AttributesProperty::new(Dictionary::default());
        attributes.set("name", DictValue::String("square".into()));
        ops.insert_cell_property(f, Box::new(attributes)).unwrap();
        ops.move_below_boundary(f).unwrap();
        ops.finish();
        complex
    }

    #[test]
    fn roundtrip_square_face() {
        let complex = square();
        let json = complex.to_json().unwrap();
        let restored = Complex::from_json(&json).unwrap();

        assert_eq!(restored.node_count(), complex.node_count());
        let g = restored.children(restored.root())[0];
        let children = restored.children(g);
        assert_eq!(restored.node_type(children[0]), Some(NodeType::KeyFace));
        let f = children[0];
        assert_eq!(restored.boundary(f).len(), 8);
        assert_relative_eq!(restored.face_area(f).unwrap(), 4.0, epsilon = 1e-6);
        assert_eq!(restored.cell(f).unwrap().time(), AnimTime::new(3.0));

        let attributes = restored.cell(f).unwrap().properties().get_as::<AttributesProperty>("attributes").unwrap();
        assert_eq!(attributes.get("name"), Some(&DictValue::String("square".into())));
        let colored = restored
            .iter()
            .filter(|(_, n)| n.as_cell().is_some_and(|c| c.properties().get("color").is_some()))
            .count();
        assert_eq!(colored, 1);
        assert_eq!(restored.to_json().unwrap(), json);
    }

    #[test]
    fn unknown_properties_are_skipped() {
        let complex = square();
        let json = complex.to_json().unwrap();
        let restored = Complex::from_json_with_registry(&json, &PropertyRegistry::new()).unwrap();
        assert!(restored.iter().all(|(_, n)| n.as_cell().map_or(true, |c| c.properties().is_empty())));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let json = r#"{"nodes":[
            {"id":0,"parent":null,"kind":{"type":"group","transform":[1,0,0,0,1,0,0,0,1]}},
            {"id":1,"parent":0,"kind":{"type":"key_face","time":0.0,"cycles":[{"steiner_vertex":7}]}}
        ]}"#;
        assert!(matches!(Complex::from_json(json), Err(Error::Serialization(_))));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(Complex::from_json("{"), Err(Error::Serialization(_))));
    }
}
