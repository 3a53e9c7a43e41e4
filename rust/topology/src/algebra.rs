// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topological algebra over sets of cells.
//!
//! Every function takes a slice of keys and returns a deduplicated list in
//! first-seen order. Unknown keys are ignored. Groups have no boundary and
//! no star: they pass through `closure`, `star` and `opening` unchanged and
//! never appear in `boundary` or `outer_boundary`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::complex::Complex;
use crate::keys::NodeKey;
use crate::node::CellKind;

/// See [`Complex::closure`].
pub fn closure(complex: &Complex, cells: &[NodeKey]) -> Vec<NodeKey> {
    complex.closure(cells)
}

/// See [`Complex::star_of`].
pub fn star(complex: &Complex, cells: &[NodeKey]) -> Vec<NodeKey> {
    complex.star_of(cells)
}

/// See [`Complex::opening`].
pub fn opening(complex: &Complex, cells: &[NodeKey]) -> Vec<NodeKey> {
    complex.opening(cells)
}

/// See [`Complex::boundary_of`].
pub fn boundary(complex: &Complex, cells: &[NodeKey]) -> Vec<NodeKey> {
    complex.boundary_of(cells)
}

/// See [`Complex::outer_boundary`].
pub fn outer_boundary(complex: &Complex, cells: &[NodeKey]) -> Vec<NodeKey> {
    complex.outer_boundary(cells)
}

impl Complex {
    /// `cells` plus their boundaries, transitively.
    pub fn closure(&self, cells: &[NodeKey]) -> Vec<NodeKey> {
        let mut out: Vec<NodeKey> = Vec::new();
        let mut seen: FxHashSet<NodeKey> = FxHashSet::default();
        for &k in cells {
            if self.contains(k) && seen.insert(k) {
                out.push(k);
            }
        }
        let mut i = 0;
        while i < out.len() {
            let k = out[i];
            for &b in self.boundary(k) {
                if seen.insert(b) {
                    out.push(b);
                }
            }
            i += 1;
        }
        out
    }

    /// `cells` followed by the star of each cell.
    pub fn star_of(&self, cells: &[NodeKey]) -> Vec<NodeKey> {
        let mut out: Vec<NodeKey> = Vec::new();
        let mut seen: FxHashSet<NodeKey> = FxHashSet::default();
        for &k in cells {
            if self.contains(k) && seen.insert(k) {
                out.push(k);
            }
        }
        for &k in cells {
            for &s in self.star(k) {
                if seen.insert(s) {
                    out.push(s);
                }
            }
        }
        out
    }

    /// Closure of the star.
    pub fn opening(&self, cells: &[NodeKey]) -> Vec<NodeKey> {
        self.closure(&self.star_of(cells))
    }

    /// Topological boundary of a set of cells.
    ///
    /// A cell of the closure is kept if it is not in `cells`, or if it is
    /// used exactly once by the cells of `cells`. The result is closed.
    pub fn boundary_of(&self, cells: &[NodeKey]) -> Vec<NodeKey> {
        let members: FxHashSet<NodeKey> = cells.iter().copied().collect();
        let uses = self.use_counts(cells.iter().copied());
        let kept: Vec<NodeKey> = self
            .closure(cells)
            .into_iter()
            .filter(|&k| self.cell(k).is_some())
            .filter(|k| !members.contains(k) || uses.get(k) == Some(&1))
            .collect();
        self.closure(&kept)
    }

    /// Boundary of a set of cells, with use counts taken over its closure.
    pub fn outer_boundary(&self, cells: &[NodeKey]) -> Vec<NodeKey> {
        let closure = self.closure(cells);
        let uses = self.use_counts(closure.iter().copied());
        let kept: Vec<NodeKey> = closure
            .into_iter()
            .filter(|k| uses.get(k) == Some(&1))
            .collect();
        self.closure(&kept)
    }

    /// Number of times each cell is used by the given cells: vertices by
    /// edge endpoints and Steiner cycles, edges by face cycle halfedges.
    fn use_counts(&self, cells: impl Iterator<Item = NodeKey>) -> FxHashMap<NodeKey, usize> {
        let mut uses: FxHashMap<NodeKey, usize> = FxHashMap::default();
        let mut seen: FxHashSet<NodeKey> = FxHashSet::default();
        for k in cells {
            if !seen.insert(k) {
                continue;
            }
            let Some(cell) = self.cell(k) else {
                continue;
            };
            match cell.kind() {
                CellKind::KeyVertex(_) => {}
                CellKind::KeyEdge(e) => {
                    if let Some((s, t)) = e.vertices() {
                        *uses.entry(s).or_default() += 1;
                        *uses.entry(t).or_default() += 1;
                    }
                }
                CellKind::KeyFace(f) => {
                    for cycle in f.cycles() {
                        if let Some(v) = cycle.steiner_vertex() {
                            *uses.entry(v).or_default() += 1;
                        }
                        for h in cycle.halfedges() {
                            *uses.entry(h.edge()).or_default() += 1;
                        }
                    }
                }
            }
        }
        uses
    }
}
