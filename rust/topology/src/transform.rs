// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Affine transformations on sets of cells.
//!
//! Transforms act on the closure of the given cells: vertex positions and
//! edge strokes move together, so edges stay snapped to their vertices.
//! Cells outside the set that are incident to a moved cell are snapped
//! again and drop their meshes.

use nalgebra::{Matrix3, Point2, Rotation2, Vector2};

use crate::diff::NodeModificationFlags as Flags;
use crate::error::Result;
use crate::keys::NodeKey;
use crate::node::CellKind;
use crate::operations::Operations;
use crate::property::UpdateResult;

impl Operations<'_> {
    /// Translates the given cells and their boundaries by `delta`.
    pub fn translate_cells(&mut self, cells: &[NodeKey], delta: Vector2<f64>) -> Result<()> {
        self.check_cells(cells)?;
        let moved = self.complex.closure(cells);
        for &k in &moved {
            let Some(cell) = self.complex.cell_mut(k) else {
                continue;
            };
            let mut flags = Flags::GEOMETRY_CHANGED | Flags::MESH_CHANGED;
            match &mut cell.kind {
                CellKind::KeyVertex(v) => v.position += delta,
                CellKind::KeyEdge(e) => e.data.translate(&delta),
                CellKind::KeyFace(f) => {
                    f.dirty_fill();
                    flags = Flags::MESH_CHANGED;
                }
            }
            if cell.properties.on_translate_geometry(&delta) == UpdateResult::Changed {
                flags |= Flags::PROPERTIES_CHANGED;
            }
            self.complex.mark(k, flags);
        }
        self.on_boundary_geometry_changed(&moved);
        tracing::debug!(cells = cells.len(), moved = moved.len(), dx = delta.x, dy = delta.y, "translated cells");
        Ok(())
    }

    /// Applies a homogeneous 2D affine matrix to the given cells and their
    /// boundaries.
    pub fn transform_cells(&mut self, cells: &[NodeKey], matrix: &Matrix3<f64>) -> Result<()> {
        self.check_cells(cells)?;
        let moved = self.complex.closure(cells);
        for &k in &moved {
            let Some(cell) = self.complex.cell_mut(k) else {
                continue;
            };
            let mut flags = Flags::GEOMETRY_CHANGED | Flags::MESH_CHANGED;
            match &mut cell.kind {
                CellKind::KeyVertex(v) => v.position = matrix.transform_point(&v.position),
                CellKind::KeyEdge(e) => e.data.transform(matrix),
                CellKind::KeyFace(f) => {
                    f.dirty_fill();
                    flags = Flags::MESH_CHANGED;
                }
            }
            if cell.properties.on_transform_geometry(matrix) == UpdateResult::Changed {
                flags |= Flags::PROPERTIES_CHANGED;
            }
            self.complex.mark(k, flags);
        }
        self.on_boundary_geometry_changed(&moved);
        tracing::debug!(cells = cells.len(), moved = moved.len(), "transformed cells");
        Ok(())
    }

    /// Rotates the given cells around `origin` by `angle` radians.
    pub fn rotate_cells(&mut self, cells: &[NodeKey], origin: Point2<f64>, angle: f64) -> Result<()> {
        let rotation = Rotation2::new(angle).to_homogeneous();
        let matrix = Matrix3::new_translation(&origin.coords)
            * rotation
            * Matrix3::new_translation(&-origin.coords);
        self.transform_cells(cells, &matrix)
    }

    /// Scales the given cells relative to `origin`.
    pub fn scale_cells(&mut self, cells: &[NodeKey], origin: Point2<f64>, sx: f64, sy: f64) -> Result<()> {
        let matrix = Matrix3::new_translation(&origin.coords)
            * Matrix3::new_nonuniform_scaling(&Vector2::new(sx, sy))
            * Matrix3::new_translation(&-origin.coords);
        self.transform_cells(cells, &matrix)
    }

    fn check_cells(&self, cells: &[NodeKey]) -> Result<()> {
        for &k in cells {
            self.complex.expect_any_cell(k)?;
        }
        Ok(())
    }
}
