// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Regular grid topology with primary and secondary nodes.
//!
//! Cells are indexed row-major with the last (vertical) axis varying fastest,
//! so in 2D `cell = ix * ncz + iz`. Corners use the same ordering over the
//! `(ncells + 1)` corner lattice, and the node sequence is built corner by
//! corner: each primary node is followed by the secondary nodes of the edges
//! leaving it towards increasing coordinates, vertical edges first.

use crate::cells::{CellLaw, CellModel, CellParameter, TravelTimeLaw};
use crate::error::{RaytraceError, Result};
use crate::node::{GridNode, NodeKind};
use crate::point::Point;

/// Nodes closer than this fraction of the smallest spacing are the same point.
const COINCIDENCE_FACTOR: f64 = 1e-6;

/// Which slowness description the grid carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlownessModel {
    /// Slowness at primary nodes, interpolated onto secondary nodes;
    /// `dt = (s_a + s_b) / 2 * d`.
    Nodal,
    /// One of the per-cell laws.
    Cells(CellLaw),
}

impl SlownessModel {
    fn name(self) -> &'static str {
        match self {
            SlownessModel::Nodal => "nodal",
            SlownessModel::Cells(law) => law.name(),
        }
    }
}

/// Grid construction parameters.
///
/// Only the cell counts and spacing are mandatory; everything else has a
/// default and a consuming `with_*` builder.
#[derive(Debug, Clone)]
pub struct GridConfig<const N: usize> {
    /// Number of cells along each axis.
    pub cells: [usize; N],
    /// Cell size along each axis.
    pub spacing: [f64; N],
    /// Coordinates of the first corner. Default is all zeros.
    pub origin: [f64; N],
    /// Secondary nodes per edge parallel to each axis. Default is none.
    pub secondary: [usize; N],
    /// Number of propagation slots. Default is 1.
    pub n_threads: usize,
    /// Slowness description. Default is [`SlownessModel::Nodal`].
    pub model: SlownessModel,
}

impl<const N: usize> GridConfig<N> {
    /// Configuration with default origin, no secondary nodes, one slot and
    /// nodal slowness.
    pub fn new(cells: [usize; N], spacing: [f64; N]) -> Self {
        GridConfig {
            cells,
            spacing,
            origin: [0.0; N],
            secondary: [0; N],
            n_threads: 1,
            model: SlownessModel::Nodal,
        }
    }

    /// Set the grid origin (builder method).
    pub fn with_origin(mut self, origin: [f64; N]) -> Self {
        self.origin = origin;
        self
    }

    /// Set the number of secondary nodes per edge along each axis (builder method).
    pub fn with_secondary_nodes(mut self, secondary: [usize; N]) -> Self {
        self.secondary = secondary;
        self
    }

    /// Set the number of propagation slots (builder method).
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Set the slowness description (builder method).
    pub fn with_model(mut self, model: SlownessModel) -> Self {
        self.model = model;
        self
    }
}

#[derive(Debug, Clone)]
enum Medium {
    Nodal {
        /// One value per primary node, in corner order.
        primary: Vec<f64>,
        /// One value per node, secondary nodes interpolated.
        nodes: Vec<f64>,
    },
    Cells(CellModel),
}

/// Secondary node position along its edge, for slowness interpolation.
#[derive(Debug, Clone, Copy)]
struct EdgeFraction {
    node: usize,
    from_corner: usize,
    to_corner: usize,
    t: f64,
}

/// Shortest-path graph over a regular 2D or 3D grid.
///
/// The topology is built once by [`Grid::new`]. Slowness values may be
/// replaced any number of times through `&mut self`; propagation only
/// borrows the grid immutably, so the two can never overlap.
#[derive(Debug, Clone)]
pub struct Grid<const N: usize> {
    ncells: [usize; N],
    spacing: [f64; N],
    origin: [f64; N],
    n_secondary: [usize; N],
    n_threads: usize,
    model: SlownessModel,
    cell_strides: [usize; N],
    corner_strides: [usize; N],
    nodes: Vec<GridNode<N>>,
    primary_nodes: Vec<usize>,
    neighbors: Vec<Vec<usize>>,
    edge_fractions: Vec<EdgeFraction>,
    medium: Medium,
    tolerance: f64,
}

/// Row-major strides, last axis fastest.
fn strides<const N: usize>(shape: [usize; N]) -> [usize; N] {
    let mut s = [0usize; N];
    s[N - 1] = 1;
    for d in (0..N - 1).rev() {
        s[d] = s[d + 1] * shape[d + 1];
    }
    s
}

fn unflatten<const N: usize>(mut flat: usize, strides: &[usize; N]) -> [usize; N] {
    let mut idx = [0usize; N];
    for d in 0..N {
        idx[d] = flat / strides[d];
        flat %= strides[d];
    }
    idx
}

#[allow(clippy::needless_range_loop)]
impl<const N: usize> Grid<N> {
    /// Build the node graph described by `config`.
    ///
    /// # Errors
    /// Returns an error if an axis has no cells, a spacing is not positive and
    /// finite, the origin is not finite, or no thread slot is requested.
    pub fn new(config: GridConfig<N>) -> Result<Self> {
        assert!(N == 2 || N == 3, "Grid only supports N=2 or N=3");

        for (axis, &n) in config.cells.iter().enumerate() {
            if n == 0 {
                return Err(RaytraceError::InvalidCellCount { axis });
            }
        }
        for (axis, &h) in config.spacing.iter().enumerate() {
            if !h.is_finite() || h <= 0.0 {
                return Err(RaytraceError::InvalidGridSpacing { axis, value: h });
            }
        }
        if config.origin.iter().any(|o| !o.is_finite()) {
            return Err(RaytraceError::Other(format!(
                "grid origin {:?} is not finite",
                config.origin
            )));
        }
        if config.n_threads == 0 {
            return Err(RaytraceError::InvalidThreadCount);
        }

        let ncells = config.cells;
        let mut ncorners = ncells;
        for d in 0..N {
            ncorners[d] += 1;
        }
        let cell_strides = strides(ncells);
        let corner_strides = strides(ncorners);
        let n_cells: usize = ncells.iter().product();
        let n_corners: usize = ncorners.iter().product();

        let mut grid = Grid {
            ncells,
            spacing: config.spacing,
            origin: config.origin,
            n_secondary: config.secondary,
            n_threads: config.n_threads,
            model: config.model,
            cell_strides,
            corner_strides,
            nodes: Vec::with_capacity(expected_node_count(ncells, config.secondary)),
            primary_nodes: Vec::with_capacity(n_corners),
            neighbors: vec![Vec::new(); n_cells],
            edge_fractions: Vec::new(),
            medium: Medium::Nodal {
                primary: Vec::new(),
                nodes: Vec::new(),
            },
            tolerance: COINCIDENCE_FACTOR * config.spacing.iter().cloned().fold(f64::INFINITY, f64::min),
        };

        for corner_flat in 0..n_corners {
            let corner = unflatten(corner_flat, &corner_strides);
            grid.push_primary(corner);
            for d in (0..N).rev() {
                if corner[d] < ncells[d] && config.secondary[d] > 0 {
                    grid.push_edge(corner, corner_flat, d);
                }
            }
        }

        for node in &grid.nodes {
            for &cell in node.owners() {
                grid.neighbors[cell].push(node.index());
            }
        }

        grid.medium = match config.model {
            SlownessModel::Nodal => Medium::Nodal {
                primary: vec![1.0; n_corners],
                nodes: vec![1.0; grid.nodes.len()],
            },
            SlownessModel::Cells(law) => Medium::Cells(CellModel::new(law, n_cells)),
        };

        tracing::debug!(
            dims = N,
            n_cells,
            n_nodes = grid.nodes.len(),
            n_primary = n_corners,
            model = config.model.name(),
            "grid built"
        );

        Ok(grid)
    }

    fn corner_position(&self, corner: [usize; N]) -> Point<N> {
        let mut p = [0.0; N];
        for d in 0..N {
            p[d] = self.origin[d] + corner[d] as f64 * self.spacing[d];
        }
        Point(p)
    }

    /// Cells touching `corner`, restricted along `fixed` (if any) to the cell
    /// on the increasing side.
    fn touching_cells(&self, corner: [usize; N], fixed: Option<usize>) -> Vec<usize> {
        let mut owners = Vec::with_capacity(1 << N);
        for mask in 0..(1usize << N) {
            let mut flat = 0;
            let mut valid = true;
            for d in 0..N {
                let below = mask & (1 << d) != 0;
                if fixed == Some(d) && below {
                    valid = false;
                    break;
                }
                let c = if below {
                    match corner[d].checked_sub(1) {
                        Some(c) => c,
                        None => {
                            valid = false;
                            break;
                        }
                    }
                } else {
                    corner[d]
                };
                if c >= self.ncells[d] {
                    valid = false;
                    break;
                }
                flat += c * self.cell_strides[d];
            }
            if valid {
                owners.push(flat);
            }
        }
        owners.sort_unstable();
        owners
    }

    fn push_primary(&mut self, corner: [usize; N]) {
        let index = self.nodes.len();
        let owners = self.touching_cells(corner, None);
        let position = self.corner_position(corner);
        self.nodes
            .push(GridNode::new(position, index, NodeKind::Primary, owners));
        self.primary_nodes.push(index);
    }

    fn push_edge(&mut self, corner: [usize; N], corner_flat: usize, axis: usize) {
        let owners = self.touching_cells(corner, Some(axis));
        let start = self.corner_position(corner);
        let n_sec = self.n_secondary[axis];
        for k in 1..=n_sec {
            let t = k as f64 / (n_sec + 1) as f64;
            let mut p = start.0;
            p[axis] += t * self.spacing[axis];
            let index = self.nodes.len();
            self.nodes.push(GridNode::new(
                Point(p),
                index,
                NodeKind::Secondary,
                owners.clone(),
            ));
            self.edge_fractions.push(EdgeFraction {
                node: index,
                from_corner: corner_flat,
                to_corner: corner_flat + self.corner_strides[axis],
                t,
            });
        }
    }

    /// Number of cells along each axis.
    pub fn cells(&self) -> [usize; N] {
        self.ncells
    }

    /// Total number of cells.
    pub fn n_cells(&self) -> usize {
        self.neighbors.len()
    }

    /// Cell size along each axis.
    pub fn spacing(&self) -> [f64; N] {
        self.spacing
    }

    /// Coordinates of the first corner.
    pub fn origin(&self) -> [f64; N] {
        self.origin
    }

    /// Secondary nodes per edge along each axis.
    pub fn n_secondary(&self) -> [usize; N] {
        self.n_secondary
    }

    /// Number of propagation slots callers may use concurrently.
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    /// The slowness description this grid was built with.
    pub fn model(&self) -> SlownessModel {
        self.model
    }

    /// All nodes, in construction order.
    pub fn nodes(&self) -> &[GridNode<N>] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of primary nodes (cell corners).
    pub fn n_primary(&self) -> usize {
        self.primary_nodes.len()
    }

    /// Node index of each primary node, in corner order.
    pub fn primary_nodes(&self) -> &[usize] {
        &self.primary_nodes
    }

    /// Indices of the nodes on the boundary of `cell`.
    pub fn cell_neighbors(&self, cell: usize) -> &[usize] {
        &self.neighbors[cell]
    }

    /// Flat index of the cell with per-axis indices `idx`.
    pub fn cell_index(&self, idx: [usize; N]) -> usize {
        let mut flat = 0;
        for d in 0..N {
            flat += idx[d] * self.cell_strides[d];
        }
        flat
    }

    /// Per-axis indices of cell `cell`.
    pub fn cell_coords(&self, cell: usize) -> [usize; N] {
        unflatten(cell, &self.cell_strides)
    }

    /// Lower and upper corners of the grid.
    pub fn bounds(&self) -> (Point<N>, Point<N>) {
        let mut hi = self.origin;
        for d in 0..N {
            hi[d] += self.ncells[d] as f64 * self.spacing[d];
        }
        (Point(self.origin), Point(hi))
    }

    /// Distance under which two points are treated as the same node.
    pub fn coincidence_tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Check that `p` lies inside the grid, boundary included.
    pub(crate) fn check_inside(&self, p: &Point<N>) -> std::result::Result<(), String> {
        let (lo, hi) = self.bounds();
        for d in 0..N {
            let v = p.0[d];
            if !v.is_finite() || v < lo.0[d] - self.tolerance || v > hi.0[d] + self.tolerance {
                return Err(format!(
                    "coordinate {} on axis {} is outside domain [{}, {}]",
                    v, d, lo.0[d], hi.0[d]
                ));
            }
        }
        Ok(())
    }

    /// Whether `p` lies inside the grid, boundary included.
    pub fn contains(&self, p: &Point<N>) -> bool {
        self.check_inside(p).is_ok()
    }

    /// Cell containing `p`. Points on the upper boundary belong to the last
    /// cell along that axis.
    ///
    /// # Errors
    /// Returns an error if `p` is outside the grid.
    pub fn cell_of(&self, p: &Point<N>) -> Result<usize> {
        self.check_inside(p).map_err(RaytraceError::Other)?;
        Ok(self.cell_of_unchecked(p))
    }

    pub(crate) fn cell_of_unchecked(&self, p: &Point<N>) -> usize {
        let mut idx = [0usize; N];
        for d in 0..N {
            let f = ((p.0[d] - self.origin[d]) / self.spacing[d]).floor();
            idx[d] = if f <= 0.0 {
                0
            } else {
                (f as usize).min(self.ncells[d] - 1)
            };
        }
        self.cell_index(idx)
    }

    /// Node of `cell` at the same position as `p`, if any.
    pub fn coincident_node(&self, p: &Point<N>, cell: usize) -> Option<usize> {
        self.neighbors[cell]
            .iter()
            .copied()
            .find(|&n| self.nodes[n].position().coincides(p, self.tolerance))
    }

    // --- slowness ---------------------------------------------------------

    /// Replace the slowness values.
    ///
    /// Under the nodal law `values` holds one value per primary node in corner
    /// order and secondary nodes are re-interpolated from them. Under a cell
    /// law it holds one value per cell.
    ///
    /// # Errors
    /// Returns an error, leaving the grid untouched, if the length is wrong,
    /// a value is not positive and finite, or the cell law has no slowness.
    pub fn set_slowness(&mut self, values: &[f64]) -> Result<()> {
        let n_primary = self.primary_nodes.len();
        match &mut self.medium {
            Medium::Nodal { primary, nodes } => {
                if values.len() != n_primary {
                    return Err(RaytraceError::SizeMismatch {
                        parameter: "slowness",
                        expected: n_primary,
                        got: values.len(),
                    });
                }
                for (index, &value) in values.iter().enumerate() {
                    if !value.is_finite() || value <= 0.0 {
                        return Err(RaytraceError::InvalidSlowness { index, value });
                    }
                }
                primary.copy_from_slice(values);
                for (c, &node) in self.primary_nodes.iter().enumerate() {
                    nodes[node] = primary[c];
                }
                for e in &self.edge_fractions {
                    nodes[e.node] = (1.0 - e.t) * primary[e.from_corner] + e.t * primary[e.to_corner];
                }
                Ok(())
            }
            Medium::Cells(model) => model.set(CellParameter::Slowness, values),
        }
    }

    /// Set the same slowness everywhere.
    pub fn fill_slowness(&mut self, value: f64) -> Result<()> {
        let n = match &self.medium {
            Medium::Nodal { primary, .. } => primary.len(),
            Medium::Cells(model) => model.n_cells(),
        };
        self.set_slowness(&vec![value; n])
    }

    /// Replace one per-cell parameter of the cell law.
    ///
    /// # Errors
    /// Returns an error, leaving the grid untouched, if the model does not
    /// carry `param` or the values are invalid.
    pub fn set_parameter(&mut self, param: CellParameter, values: &[f64]) -> Result<()> {
        if let Medium::Cells(model) = &mut self.medium {
            return model.set(param, values);
        }
        if param == CellParameter::Slowness {
            return self.set_slowness(values);
        }
        Err(RaytraceError::UnsupportedParameter {
            parameter: param.name(),
            model: "nodal",
        })
    }

    /// Set one per-cell parameter to the same value in every cell.
    pub fn fill_parameter(&mut self, param: CellParameter, value: f64) -> Result<()> {
        if let Medium::Cells(model) = &mut self.medium {
            return model.fill(param, value);
        }
        if param == CellParameter::Slowness {
            return self.fill_slowness(value);
        }
        Err(RaytraceError::UnsupportedParameter {
            parameter: param.name(),
            model: "nodal",
        })
    }

    /// Select the P (`phase == 1`) or SV root of the VTI P/SV law.
    pub fn set_phase(&mut self, phase: i32) -> Result<()> {
        match &mut self.medium {
            Medium::Cells(model) => model.set_phase(phase),
            Medium::Nodal { .. } => Err(RaytraceError::UnsupportedParameter {
                parameter: "phase",
                model: "nodal",
            }),
        }
    }

    /// Current slowness values: per primary node under the nodal law, per
    /// cell under a cell law that carries slowness.
    pub fn slowness(&self) -> Option<&[f64]> {
        match &self.medium {
            Medium::Nodal { primary, .. } => Some(primary),
            Medium::Cells(model) => model.get(CellParameter::Slowness),
        }
    }

    /// Current values of a cell-law parameter.
    pub fn parameter(&self, param: CellParameter) -> Option<&[f64]> {
        match &self.medium {
            Medium::Cells(model) => model.get(param),
            Medium::Nodal { primary, .. } if param == CellParameter::Slowness => Some(primary),
            Medium::Nodal { .. } => None,
        }
    }

    /// Slowness of node `node` under the nodal law; zero under a cell law.
    pub fn node_slowness(&self, node: usize) -> f64 {
        match &self.medium {
            Medium::Nodal { nodes, .. } => nodes[node],
            Medium::Cells(_) => 0.0,
        }
    }

    /// Slowness at an arbitrary point.
    ///
    /// Under the nodal law this is the multilinear interpolation of the
    /// primary-node values of the containing cell; under a cell law it is the
    /// slowness of the containing cell.
    ///
    /// # Errors
    /// Returns an error if `p` is outside the grid or the cell law has no
    /// slowness parameter.
    pub fn slowness_at(&self, p: &Point<N>) -> Result<f64> {
        let cell = self.cell_of(p)?;
        match &self.medium {
            Medium::Nodal { .. } => Ok(self.interpolate_slowness(p, cell)),
            Medium::Cells(model) => model
                .get(CellParameter::Slowness)
                .map(|s| s[cell])
                .ok_or(RaytraceError::UnsupportedParameter {
                    parameter: "slowness",
                    model: model.law().name(),
                }),
        }
    }

    /// Slowness to attach to a point that is not a grid node, for use with
    /// [`Grid::compute_dt`].
    pub(crate) fn point_slowness(&self, p: &Point<N>, cell: usize) -> f64 {
        match &self.medium {
            Medium::Nodal { .. } => self.interpolate_slowness(p, cell),
            Medium::Cells(_) => 0.0,
        }
    }

    fn interpolate_slowness(&self, p: &Point<N>, cell: usize) -> f64 {
        let primary = match &self.medium {
            Medium::Nodal { primary, .. } => primary,
            Medium::Cells(_) => return 0.0,
        };
        let base = self.cell_coords(cell);
        let mut frac = [0.0; N];
        for d in 0..N {
            let lo = self.origin[d] + base[d] as f64 * self.spacing[d];
            frac[d] = ((p.0[d] - lo) / self.spacing[d]).clamp(0.0, 1.0);
        }
        let mut s = 0.0;
        for mask in 0..(1usize << N) {
            let mut w = 1.0;
            let mut corner = 0;
            for d in 0..N {
                let up = mask & (1 << d) != 0;
                w *= if up { frac[d] } else { 1.0 - frac[d] };
                corner += (base[d] + usize::from(up)) * self.corner_strides[d];
            }
            s += w * primary[corner];
        }
        s
    }

    /// Travel time of the straight segment `from -> to` inside `cell`.
    ///
    /// `s_from` and `s_to` are the endpoint slownesses used by the nodal law
    /// and ignored by the cell laws.
    pub fn compute_dt(&self, from: &Point<N>, s_from: f64, to: &Point<N>, s_to: f64, cell: usize) -> f64 {
        match &self.medium {
            Medium::Nodal { .. } => 0.5 * (s_from + s_to) * from.distance(to),
            Medium::Cells(model) => model.compute_dt(from, to, cell),
        }
    }

    /// Check the constraints of the cell law that involve several parameters
    /// of the same cell. Always succeeds under the nodal law.
    ///
    /// # Errors
    /// See [`CellModel::validate`].
    pub fn check_medium(&self) -> Result<()> {
        match &self.medium {
            Medium::Nodal { .. } => Ok(()),
            Medium::Cells(model) => model.validate(),
        }
    }

    pub(crate) fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.n_threads {
            return Err(RaytraceError::InvalidThreadSlot {
                slot,
                n_threads: self.n_threads,
            });
        }
        Ok(())
    }
}

/// Number of nodes a grid with these cell and secondary counts holds.
pub fn expected_node_count<const N: usize>(cells: [usize; N], secondary: [usize; N]) -> usize {
    let corners: usize = cells.iter().map(|c| c + 1).product();
    let mut total = corners;
    for d in 0..N {
        let edges: usize = (0..N)
            .map(|e| if e == d { cells[e] } else { cells[e] + 1 })
            .product();
        total += edges * secondary[d];
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{Point2, Point3};

    fn grid2(cells: [usize; 2], secondary: [usize; 2]) -> Grid<2> {
        Grid::new(GridConfig::new(cells, [1.0, 1.0]).with_secondary_nodes(secondary)).unwrap()
    }

    #[test]
    fn node_count_2d() {
        let g = grid2([3, 2], [2, 1]);
        // corners 4*3, x-edges 3*3*2, z-edges 4*2*1
        assert_eq!(g.n_nodes(), 12 + 18 + 8);
        assert_eq!(g.n_nodes(), expected_node_count([3, 2], [2, 1]));
        assert_eq!(g.n_primary(), 12);
    }

    #[test]
    fn node_count_3d() {
        let g = Grid::<3>::new(
            GridConfig::new([2, 3, 4], [1.0, 0.5, 2.0]).with_secondary_nodes([1, 2, 3]),
        )
        .unwrap();
        assert_eq!(g.n_nodes(), expected_node_count([2, 3, 4], [1, 2, 3]));
        assert_eq!(g.n_primary(), 3 * 4 * 5);
        assert_eq!(g.n_cells(), 24);
    }

    #[test]
    fn construction_order() {
        let g = grid2([2, 2], [1, 1]);
        let nodes = g.nodes();
        // primary at the origin, then its vertical edge node, then horizontal
        assert!(nodes[0].is_primary());
        assert_eq!(nodes[0].position().coords(), [0.0, 0.0]);
        assert!(!nodes[1].is_primary());
        assert_eq!(nodes[1].position().coords(), [0.0, 0.5]);
        assert_eq!(nodes[2].position().coords(), [0.5, 0.0]);
        assert!(nodes[3].is_primary());
        assert_eq!(nodes[3].position().coords(), [0.0, 1.0]);
        for (i, n) in nodes.iter().enumerate() {
            assert_eq!(n.index(), i);
        }
    }

    #[test]
    fn primary_owners() {
        let g = grid2([2, 2], [0, 0]);
        let owners: Vec<usize> = g.nodes().iter().map(|n| n.owners().len()).collect();
        // corners of a 3x3 lattice: 1 at the four corners, 2 on edges, 4 in the middle
        assert_eq!(owners, vec![1, 2, 1, 2, 4, 2, 1, 2, 1]);
        let center = &g.nodes()[4];
        assert_eq!(center.owners(), &[0, 1, 2, 3]);
    }

    #[test]
    fn secondary_owners_are_edge_cells() {
        let g = grid2([2, 1], [1, 1]);
        for n in g.nodes().iter().filter(|n| !n.is_primary()) {
            let p = n.position();
            let interior_vertical_edge = (p.x() - 1.0).abs() < 1e-12;
            let expected = if interior_vertical_edge { 2 } else { 1 };
            assert_eq!(n.owners().len(), expected, "node at {}", p);
        }
    }

    #[test]
    fn cell_neighbor_lists() {
        let g = grid2([3, 3], [2, 3]);
        for cell in 0..g.n_cells() {
            // 4 corners + 2 horizontal edges * 2 + 2 vertical edges * 3
            assert_eq!(g.cell_neighbors(cell).len(), 4 + 4 + 6);
        }
        let g3 = Grid::<3>::new(GridConfig::new([2, 2, 2], [1.0; 3]).with_secondary_nodes([1, 1, 1]))
            .unwrap();
        assert_eq!(g3.cell_neighbors(0).len(), 8 + 12);
    }

    #[test]
    fn cell_indexing_last_axis_fastest() {
        let g = grid2([3, 2], [0, 0]);
        assert_eq!(g.cell_index([1, 1]), 3);
        assert_eq!(g.cell_coords(5), [2, 1]);
        assert_eq!(g.cell_of(&Point2::new([2.5, 0.5])).unwrap(), 4);
        // upper boundary belongs to the last cell
        assert_eq!(g.cell_of(&Point2::new([3.0, 2.0])).unwrap(), 5);
        assert!(g.cell_of(&Point2::new([3.5, 0.0])).is_err());
    }

    #[test]
    fn secondary_slowness_is_interpolated() {
        let mut g = grid2([1, 1], [0, 1]);
        // corners in order (0,0), (0,1), (1,0), (1,1)
        g.set_slowness(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let mid = g
            .nodes()
            .iter()
            .find(|n| n.position().coincides(&Point2::new([0.0, 0.5]), 1e-12))
            .unwrap();
        assert!((g.node_slowness(mid.index()) - 1.5).abs() < 1e-12);
        let top = g
            .nodes()
            .iter()
            .find(|n| n.position().coincides(&Point2::new([1.0, 0.5]), 1e-12))
            .unwrap();
        assert!((g.node_slowness(top.index()) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn multilinear_slowness_at_point() {
        let mut g = grid2([1, 1], [0, 0]);
        g.set_slowness(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let s = g.slowness_at(&Point2::new([0.5, 0.5])).unwrap();
        assert!((s - 2.5).abs() < 1e-12);
        let s = g.slowness_at(&Point2::new([1.0, 0.0])).unwrap();
        assert!((s - 3.0).abs() < 1e-12);
    }

    #[test]
    fn slowness_size_mismatch_leaves_state() {
        let mut g = grid2([2, 2], [1, 1]);
        g.fill_slowness(2.0).unwrap();
        let before: Vec<f64> = (0..g.n_nodes()).map(|n| g.node_slowness(n)).collect();
        let err = g.set_slowness(&[1.0; 4]).unwrap_err();
        assert!(matches!(
            err,
            RaytraceError::SizeMismatch {
                expected: 9,
                got: 4,
                ..
            }
        ));
        let after: Vec<f64> = (0..g.n_nodes()).map(|n| g.node_slowness(n)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn cell_model_slowness_per_cell() {
        let mut g = Grid::<3>::new(
            GridConfig::new([2, 2, 2], [1.0; 3]).with_model(SlownessModel::Cells(CellLaw::Isotropic)),
        )
        .unwrap();
        assert!(g.set_slowness(&[1.0; 27]).is_err());
        g.set_slowness(&[0.5; 8]).unwrap();
        assert_eq!(g.slowness_at(&Point3::new([1.5, 0.5, 0.5])).unwrap(), 0.5);
        assert!(matches!(
            g.set_parameter(CellParameter::Gamma, &[0.0; 8]),
            Err(RaytraceError::UnsupportedParameter { .. })
        ));
    }

    #[test]
    fn nodal_model_rejects_cell_parameters() {
        let mut g = grid2([1, 1], [0, 0]);
        assert!(matches!(
            g.fill_parameter(CellParameter::Xi, 2.0),
            Err(RaytraceError::UnsupportedParameter { model: "nodal", .. })
        ));
        g.fill_parameter(CellParameter::Slowness, 2.0).unwrap();
        assert_eq!(g.slowness().unwrap(), &[2.0; 4]);
    }

    #[test]
    fn coincident_node_lookup() {
        let g = Grid::<2>::new(
            GridConfig::new([2, 2], [1.0, 1.0])
                .with_origin([10.0, -5.0])
                .with_secondary_nodes([1, 1]),
        )
        .unwrap();
        let p = Point2::new([10.5, -4.0]);
        let cell = g.cell_of(&p).unwrap();
        let node = g.coincident_node(&p, cell).unwrap();
        assert_eq!(g.nodes()[node].position().coords(), [10.5, -4.0]);
        assert!(g.coincident_node(&Point2::new([10.25, -4.75]), 0).is_none());
    }

    #[test]
    fn invalid_config() {
        assert!(matches!(
            Grid::<2>::new(GridConfig::new([0, 2], [1.0, 1.0])),
            Err(RaytraceError::InvalidCellCount { axis: 0 })
        ));
        assert!(matches!(
            Grid::<2>::new(GridConfig::new([2, 2], [1.0, -1.0])),
            Err(RaytraceError::InvalidGridSpacing { axis: 1, .. })
        ));
        assert!(matches!(
            Grid::<2>::new(GridConfig::new([2, 2], [1.0, 1.0]).with_threads(0)),
            Err(RaytraceError::InvalidThreadCount)
        ));
    }

    #[test]
    fn thread_slots() {
        let g = Grid::<2>::new(GridConfig::new([2, 2], [1.0, 1.0]).with_threads(3)).unwrap();
        assert_eq!(g.n_threads(), 3);
        assert!(g.check_slot(2).is_ok());
        assert!(matches!(
            g.check_slot(3),
            Err(RaytraceError::InvalidThreadSlot { slot: 3, n_threads: 3 })
        ));
    }
}
