// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Receiver times, ray paths and per-cell ray lengths.

use std::collections::BTreeMap;

use crate::error::{RaytraceError, Result};
use crate::grid::Grid;
use crate::node::NodeRef;
use crate::point::Point;
use crate::propagation::TravelTimeField;

/// Length of a ray inside one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayLength {
    /// Cell index.
    pub cell: usize,
    /// Accumulated path length inside the cell.
    pub length: f64,
}

/// A traced ray.
#[derive(Debug, Clone)]
pub struct Ray<const N: usize> {
    /// Travel time at the receiver.
    pub time: f64,
    /// Polyline from the source to the receiver.
    pub path: Vec<Point<N>>,
    /// Path length per crossed cell, sorted by cell index.
    pub lengths: Vec<RayLength>,
}

impl<const N: usize> Ray<N> {
    /// Total length of the polyline.
    pub fn path_length(&self) -> f64 {
        self.path.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }
}

/// Per-cell length accumulator, kept sorted by cell.
#[derive(Debug, Default)]
pub(crate) struct LengthAccumulator(BTreeMap<usize, f64>);

impl LengthAccumulator {
    pub(crate) fn add(&mut self, cell: usize, length: f64) {
        if length > 0.0 {
            *self.0.entry(cell).or_insert(0.0) += length;
        }
    }

    pub(crate) fn into_lengths(self) -> Vec<RayLength> {
        self.0
            .into_iter()
            .map(|(cell, length)| RayLength { cell, length })
            .collect()
    }
}

/// How a receiver is connected to the graph.
struct Arrival {
    time: f64,
    /// Node the ray leaves the graph at.
    node: NodeRef,
    /// Cell of the closing segment, or `None` when the receiver sits on `node`.
    cell: Option<usize>,
}

impl<'g, const N: usize> TravelTimeField<'g, N> {
    fn arrival(&self, rx: &Point<N>) -> Result<Arrival> {
        let grid = self.grid();
        grid.check_inside(rx).map_err(|reason| RaytraceError::InvalidReceiver {
            coord: rx.coords().to_vec(),
            reason,
        })?;
        let cell = grid.cell_of_unchecked(rx);

        if let Some(n) = grid.coincident_node(rx, cell) {
            return Ok(Arrival {
                time: self.node_times()[n],
                node: NodeRef::Grid(n),
                cell: None,
            });
        }
        for (k, s) in self.synthetic_sources().iter().enumerate() {
            if s.position.coincides(rx, grid.coincidence_tolerance()) {
                return Ok(Arrival {
                    time: s.time,
                    node: NodeRef::Source(k),
                    cell: None,
                });
            }
        }

        let s_rx = grid.point_slowness(rx, cell);
        let candidates = grid
            .cell_neighbors(cell)
            .iter()
            .map(|&n| NodeRef::Grid(n))
            .chain(
                self.synthetic_sources()
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.cell == cell)
                    .map(|(k, _)| NodeRef::Source(k)),
            );

        let mut best: Option<Arrival> = None;
        for r in candidates {
            let t = self.time(r)
                + grid.compute_dt(&self.position(r), self.slowness(r), rx, s_rx, cell);
            if best.as_ref().map_or(true, |b| t < b.time) {
                best = Some(Arrival {
                    time: t,
                    node: r,
                    cell: Some(cell),
                });
            }
        }
        best.ok_or_else(|| RaytraceError::InvalidReceiver {
            coord: rx.coords().to_vec(),
            reason: "containing cell has no nodes".to_string(),
        })
    }

    /// Travel time at `rx`.
    ///
    /// A receiver on a node takes that node's time; otherwise the earliest
    /// arrival through any node of its cell (synthetic sources included).
    ///
    /// # Errors
    /// Returns an error if `rx` is outside the grid.
    pub fn time_at(&self, rx: &Point<N>) -> Result<f64> {
        Ok(self.arrival(rx)?.time)
    }

    /// Trace the ray from a source to `rx` by following parent pointers.
    ///
    /// # Errors
    /// Returns an error if `rx` is outside the grid.
    pub fn trace_ray(&self, rx: &Point<N>) -> Result<Ray<N>> {
        let arrival = self.arrival(rx)?;
        let mut path = vec![*rx];
        let mut lengths = LengthAccumulator::default();

        let mut current = arrival.node;
        let mut here = *rx;
        if let Some(cell) = arrival.cell {
            let p = self.position(current);
            lengths.add(cell, here.distance(&p));
            path.push(p);
            here = p;
        }

        while let Some((parent, cell)) = self.parent(current) {
            let p = self.position(parent);
            lengths.add(cell, here.distance(&p));
            path.push(p);
            here = p;
            current = parent;
        }

        path.reverse();
        Ok(Ray {
            time: arrival.time,
            path,
            lengths: lengths.into_lengths(),
        })
    }
}

impl<const N: usize> Grid<N> {
    fn check_receivers(&self, rx: &[Point<N>]) -> Result<()> {
        for p in rx {
            self.check_inside(p).map_err(|reason| RaytraceError::InvalidReceiver {
                coord: p.coords().to_vec(),
                reason,
            })?;
        }
        Ok(())
    }

    fn traced(&self, tx: &[Point<N>], t0: &[f64], rx: &[Point<N>], slot: usize) -> Result<Vec<Ray<N>>> {
        self.check_sources(tx, t0, slot)?;
        self.check_receivers(rx)?;
        let field = self.propagate(tx, t0, slot)?;
        rx.iter().map(|p| field.trace_ray(p)).collect()
    }

    /// Travel times at the receivers `rx` from the sources `tx` started at
    /// `t0`, computed in propagation slot `slot`.
    ///
    /// # Errors
    /// Every input is validated first; on failure nothing is computed.
    pub fn raytrace(&self, tx: &[Point<N>], t0: &[f64], rx: &[Point<N>], slot: usize) -> Result<Vec<f64>> {
        self.check_sources(tx, t0, slot)?;
        self.check_receivers(rx)?;
        let field = self.propagate(tx, t0, slot)?;
        rx.iter().map(|p| field.time_at(p)).collect()
    }

    /// Like [`Grid::raytrace`], also returning the ray path to each receiver.
    pub fn raytrace_with_rays(
        &self,
        tx: &[Point<N>],
        t0: &[f64],
        rx: &[Point<N>],
        slot: usize,
    ) -> Result<(Vec<f64>, Vec<Vec<Point<N>>>)> {
        let rays = self.traced(tx, t0, rx, slot)?;
        Ok(rays.into_iter().map(|r| (r.time, r.path)).unzip())
    }

    /// Like [`Grid::raytrace`], returning the time, path and per-cell ray
    /// lengths of every receiver.
    pub fn raytrace_with_lengths(
        &self,
        tx: &[Point<N>],
        t0: &[f64],
        rx: &[Point<N>],
        slot: usize,
    ) -> Result<Vec<Ray<N>>> {
        self.traced(tx, t0, rx, slot)
    }
}

/// Sparse matrix of ray lengths, one row per receiver and one column per
/// cell, in compressed sparse row form.
#[derive(Debug, Clone, PartialEq)]
pub struct RayLengthMatrix {
    n_cols: usize,
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl RayLengthMatrix {
    /// Assemble from per-receiver ray-length lists.
    ///
    /// # Errors
    /// Returns an error if a cell index is not below `n_cells`.
    pub fn from_rows<'a, I>(n_cells: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [RayLength]>,
    {
        let mut row_ptr = vec![0];
        let mut cols = Vec::new();
        let mut values = Vec::new();
        for row in rows {
            for l in row {
                if l.cell >= n_cells {
                    return Err(RaytraceError::Other(format!(
                        "ray length in cell {} but the grid has {} cells",
                        l.cell, n_cells
                    )));
                }
                cols.push(l.cell);
                values.push(l.length);
            }
            row_ptr.push(cols.len());
        }
        Ok(RayLengthMatrix {
            n_cols: n_cells,
            row_ptr,
            cols,
            values,
        })
    }

    /// Assemble from traced rays.
    pub fn from_rays<const N: usize>(n_cells: usize, rays: &[Ray<N>]) -> Result<Self> {
        Self::from_rows(n_cells, rays.iter().map(|r| r.lengths.as_slice()))
    }

    /// Number of rows (receivers).
    pub fn n_rows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    /// Number of columns (cells).
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Row pointer array, `n_rows + 1` long.
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// Column index of every stored entry.
    pub fn col_indices(&self) -> &[usize] {
        &self.cols
    }

    /// Value of every stored entry.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `(cell, length)` entries of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (a, b) = (self.row_ptr[i], self.row_ptr[i + 1]);
        self.cols[a..b].iter().copied().zip(self.values[a..b].iter().copied())
    }

    /// Matrix-vector product, e.g. predicted times for per-cell slowness.
    ///
    /// # Errors
    /// Returns an error if `x` does not hold one value per column.
    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.n_cols {
            return Err(RaytraceError::SizeMismatch {
                parameter: "vector",
                expected: self.n_cols,
                got: x.len(),
            });
        }
        Ok((0..self.n_rows())
            .map(|i| self.row(i).map(|(c, v)| v * x[c]).sum())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::CellLaw;
    use crate::grid::{GridConfig, SlownessModel};
    use crate::point::Point2;

    fn grid(secondary: [usize; 2]) -> Grid<2> {
        Grid::new(GridConfig::new([4, 4], [1.0, 1.0]).with_secondary_nodes(secondary)).unwrap()
    }

    #[test]
    fn receiver_on_source_node() {
        let g = grid([1, 1]);
        let p = Point2::new([2.0, 2.0]);
        let f = g.propagate(&[p], &[1.5], 0).unwrap();
        let ray = f.trace_ray(&p).unwrap();
        assert_eq!(ray.time, 1.5);
        assert_eq!(ray.path.len(), 1);
        assert!(ray.lengths.is_empty());
    }

    #[test]
    fn receiver_on_synthetic_source() {
        let g = grid([1, 1]);
        let p = Point2::new([2.2, 2.7]);
        let f = g.propagate(&[p], &[0.0], 0).unwrap();
        let ray = f.trace_ray(&p).unwrap();
        assert_eq!(ray.time, 0.0);
        assert!(ray.lengths.is_empty());
    }

    #[test]
    fn receiver_in_source_cell_is_direct() {
        let g = grid([0, 0]);
        let src = Point2::new([1.2, 1.3]);
        let rx = Point2::new([1.8, 1.9]);
        let f = g.propagate(&[src], &[0.0], 0).unwrap();
        let ray = f.trace_ray(&rx).unwrap();
        assert!((ray.time - src.distance(&rx)).abs() < 1e-12);
        assert_eq!(ray.path, vec![src, rx]);
        assert_eq!(ray.lengths.len(), 1);
    }

    #[test]
    fn path_runs_from_source_to_receiver() {
        let g = grid([2, 2]);
        let src = Point2::new([0.0, 0.0]);
        let rx = Point2::new([3.5, 2.25]);
        let f = g.propagate(&[src], &[0.0], 0).unwrap();
        let ray = f.trace_ray(&rx).unwrap();
        assert_eq!(ray.path[0], src);
        assert_eq!(*ray.path.last().unwrap(), rx);
        let total: f64 = ray.lengths.iter().map(|l| l.length).sum();
        assert!((total - ray.path_length()).abs() < 1e-9);
        assert!(ray.lengths.windows(2).all(|w| w[0].cell < w[1].cell));
    }

    #[test]
    fn cell_isotropic_time_equals_lengths_times_slowness() {
        let mut g = Grid::<2>::new(
            GridConfig::new([4, 4], [1.0, 1.0])
                .with_secondary_nodes([2, 2])
                .with_model(SlownessModel::Cells(CellLaw::Isotropic)),
        )
        .unwrap();
        let s: Vec<f64> = (0..16).map(|c| 1.0 + 0.1 * c as f64).collect();
        g.set_slowness(&s).unwrap();
        let rx = [Point2::new([3.9, 3.1]), Point2::new([0.3, 3.7])];
        let rays = g
            .raytrace_with_lengths(&[Point2::new([0.5, 0.5])], &[0.0], &rx, 0)
            .unwrap();
        let m = RayLengthMatrix::from_rays(16, &rays).unwrap();
        let predicted = m.mul_vec(&s).unwrap();
        for (ray, t) in rays.iter().zip(predicted) {
            assert!((ray.time - t).abs() < 1e-9, "{} vs {}", ray.time, t);
        }
    }

    #[test]
    fn raytrace_variants_agree() {
        let g = grid([1, 1]);
        let tx = [Point2::new([0.5, 3.5])];
        let rx = [Point2::new([3.0, 0.0]), Point2::new([2.5, 1.5])];
        let times = g.raytrace(&tx, &[0.0], &rx, 0).unwrap();
        let (times2, rays) = g.raytrace_with_rays(&tx, &[0.0], &rx, 0).unwrap();
        let full = g.raytrace_with_lengths(&tx, &[0.0], &rx, 0).unwrap();
        assert_eq!(times, times2);
        assert_eq!(rays.len(), 2);
        for i in 0..2 {
            assert_eq!(full[i].time, times[i]);
            assert_eq!(full[i].path, rays[i]);
        }
    }

    #[test]
    fn receiver_outside_is_rejected() {
        let g = grid([0, 0]);
        let err = g
            .raytrace(&[Point2::new([1.0, 1.0])], &[0.0], &[Point2::new([5.0, 1.0])], 0)
            .unwrap_err();
        assert!(matches!(err, RaytraceError::InvalidReceiver { .. }));
    }

    #[test]
    fn matrix_layout() {
        let rows = vec![
            vec![RayLength { cell: 0, length: 1.0 }, RayLength { cell: 2, length: 0.5 }],
            vec![],
            vec![RayLength { cell: 1, length: 2.0 }],
        ];
        let m = RayLengthMatrix::from_rows(3, rows.iter().map(|r| r.as_slice())).unwrap();
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row_ptr(), &[0, 2, 2, 3]);
        assert_eq!(m.col_indices(), &[0, 2, 1]);
        assert_eq!(m.mul_vec(&[1.0, 1.0, 2.0]).unwrap(), vec![2.0, 0.0, 2.0]);
        assert!(RayLengthMatrix::from_rows(2, rows.iter().map(|r| r.as_slice())).is_err());
    }
}
