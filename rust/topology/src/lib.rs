// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # VAC Topology
//!
//! Vector animation complex (VAC) data structure for vector graphics editing.
//!
//! A complex is a tree of groups whose leaves are cells: key vertices (points),
//! key edges (strokes, open between two vertices or closed loops) and key
//! faces (regions bounded by cycles of halfedges). Cells are stored in a slot
//! map and keep a boundary/star adjacency in both directions. Several faces
//! can share one edge and any number of edges can meet at a vertex, so the
//! complex is non-manifold.
//!
//! All mutations go through an [`Operations`] group. Closing a group emits
//! one [`ComplexDiff`] to every listener registered with
//! [`Complex::connect_nodes_changed`].
//!
//! The [`ops`] module wraps each operation in its own group for one-shot use.

pub mod algebra;
pub mod complex;
pub mod config;
pub mod cycle;
pub mod dictionary;
pub mod diff;
pub mod dom;
pub mod edge_data;
pub mod error;
pub mod geometry;
pub mod glue;
pub mod keys;
pub mod node;
pub mod operations;
pub mod ops;
pub mod property;
pub mod serialization;
pub mod simplify;
pub mod stroke;
pub mod style;
pub mod transform;

pub use complex::{Complex, ListenerId, OperationState};
pub use config::ComplexConfig;
pub use cycle::{KeyCycle, KeyHalfedge};
pub use dictionary::{AttributesProperty, DictValue, Dictionary};
pub use diff::{ComplexDiff, NodeInsertionInfo, NodeModificationFlags};
pub use dom::{DomElement, DomValue, Element};
pub use edge_data::{EdgeSampling, KeyEdgeData};
pub use error::{Error, Result};
pub use geometry::{FaceFill, Rect2};
pub use glue::{CycleSlot, VertexUses};
pub use keys::{AnimTime, Id, NodeKey, NodeType};
pub use node::{Cell, CellKind, Group, KeyEdge, KeyFace, KeyVertex, Node, NodeKind};
pub use operations::Operations;
pub use property::{CellProperties, CellProperty, PropertyName, PropertyRegistry, UpdateResult};
pub use serialization::ComplexSnapshot;
pub use stroke::{CatmullRomStroke, SamplingQuality, SnapMode, StrokeModel, StrokeSample};
pub use style::{Color, ColorProperty};

/// Types needed by most users of the complex.
pub mod prelude {
    pub use crate::complex::Complex;
    pub use crate::cycle::{KeyCycle, KeyHalfedge};
    pub use crate::diff::{ComplexDiff, NodeModificationFlags};
    pub use crate::error::{Error, Result};
    pub use crate::keys::{AnimTime, NodeKey, NodeType};
    pub use crate::operations::Operations;
    pub use crate::stroke::{CatmullRomStroke, StrokeModel};
}
