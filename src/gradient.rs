// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Least-squares travel-time gradients and gradient-descent ray tracing.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use crate::error::{RaytraceError, Result};
use crate::grid::Grid;
use crate::point::Point;
use crate::propagation::TravelTimeField;
use crate::raytrace::{LengthAccumulator, Ray};

/// Singular values below this are treated as zero in the least-squares solve.
const SVD_EPS: f64 = 1e-12;

/// Order of the local Taylor expansion fitted to the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientOrder {
    /// Linear expansion.
    First,
    /// Quadratic expansion; only the linear coefficients are returned.
    Second,
}

impl GradientOrder {
    /// Minimum number of usable samples in `n_dims` dimensions.
    pub fn min_samples(self, n_dims: usize) -> usize {
        match (self, n_dims) {
            (GradientOrder::First, 2) => 3,
            (GradientOrder::First, _) => 4,
            (GradientOrder::Second, 2) => 5,
            (GradientOrder::Second, _) => 9,
        }
    }

    fn n_unknowns(self, n_dims: usize) -> usize {
        match self {
            GradientOrder::First => n_dims,
            GradientOrder::Second => n_dims + n_dims * (n_dims + 1) / 2,
        }
    }
}

/// Estimate the travel-time gradient from scattered `(position, time)` samples.
///
/// Offsets are measured from `at`, or from the centroid of the samples when
/// `at` is `None`. The reference time is the inverse-distance-weighted average
/// of the sample times. Samples at the reference point are skipped.
///
/// # Errors
/// Returns an error if fewer than [`GradientOrder::min_samples`] samples
/// remain, or if the least-squares solve fails.
pub fn estimate_gradient<const N: usize>(
    samples: &[(Point<N>, f64)],
    at: Option<&Point<N>>,
    order: GradientOrder,
) -> Result<[f64; N]> {
    let reference = match at {
        Some(p) => *p,
        None => centroid(samples),
    };

    let scale = samples
        .iter()
        .map(|(p, _)| p.distance(&reference))
        .fold(0.0, f64::max);
    let tol = 1e-9 * scale.max(f64::MIN_POSITIVE);

    let usable: Vec<(&Point<N>, f64, f64)> = samples
        .iter()
        .map(|(p, t)| (p, *t, p.distance(&reference)))
        .filter(|&(_, _, d)| d > tol)
        .collect();

    let required = order.min_samples(N);
    if usable.len() < required {
        return Err(RaytraceError::InsufficientNeighbors {
            required,
            got: usable.len(),
        });
    }

    let weight_sum: f64 = usable.iter().map(|&(_, _, d)| 1.0 / d).sum();
    let t_ref = usable.iter().map(|&(_, t, d)| t / d).sum::<f64>() / weight_sum;

    let cols = order.n_unknowns(N);
    let mut a = DMatrix::<f64>::zeros(usable.len(), cols);
    let mut b = DVector::<f64>::zeros(usable.len());
    for (row, &(p, t, _)) in usable.iter().enumerate() {
        let d = reference.offset_to(p);
        for k in 0..N {
            a[(row, k)] = d[k];
        }
        if order == GradientOrder::Second {
            let mut col = N;
            for k in 0..N {
                a[(row, col)] = 0.5 * d[k] * d[k];
                col += 1;
            }
            for i in 0..N {
                for j in (i + 1)..N {
                    a[(row, col)] = d[i] * d[j];
                    col += 1;
                }
            }
        }
        b[row] = t - t_ref;
    }

    let x = a
        .svd(true, true)
        .solve(&b, SVD_EPS)
        .map_err(|e| RaytraceError::SingularSystem(e.to_string()))?;

    let mut g = [0.0; N];
    for k in 0..N {
        g[k] = x[k];
    }
    Ok(g)
}

fn centroid<const N: usize>(samples: &[(Point<N>, f64)]) -> Point<N> {
    let mut c = [0.0; N];
    if samples.is_empty() {
        return Point(c);
    }
    for (p, _) in samples {
        for d in 0..N {
            c[d] += p.0[d];
        }
    }
    for v in c.iter_mut() {
        *v /= samples.len() as f64;
    }
    Point(c)
}

fn cell_contains<const N: usize>(grid: &Grid<N>, cell: usize, p: &Point<N>) -> bool {
    let idx = grid.cell_coords(cell);
    let (origin, spacing) = (grid.origin(), grid.spacing());
    let tol = grid.coincidence_tolerance();
    (0..N).all(|d| {
        let lo = origin[d] + idx[d] as f64 * spacing[d];
        p.0[d] >= lo - tol && p.0[d] <= lo + spacing[d] + tol
    })
}

impl<'g, const N: usize> TravelTimeField<'g, N> {
    /// Nodes of the cell containing `p` and of every cell sharing a corner
    /// with it, paired with their travel times.
    fn neighborhood(&self, p: &Point<N>) -> Vec<(Point<N>, f64)> {
        let grid = self.grid();
        let center = grid.cell_coords(grid.cell_of_unchecked(p));
        let ncells = grid.cells();
        let mut nodes = BTreeSet::new();
        for mask in 0..3usize.pow(N as u32) {
            let mut idx = [0usize; N];
            let mut m = mask;
            let mut valid = true;
            for d in 0..N {
                let shifted = (center[d] + m % 3).checked_sub(1);
                m /= 3;
                match shifted {
                    Some(i) if i < ncells[d] => idx[d] = i,
                    _ => valid = false,
                }
            }
            if valid {
                nodes.extend(grid.cell_neighbors(grid.cell_index(idx)).iter().copied());
            }
        }
        let times = self.node_times();
        nodes
            .into_iter()
            .filter(|&n| times[n].is_finite())
            .map(|n| (*grid.nodes()[n].position(), times[n]))
            .collect()
    }

    /// Travel-time gradient at `p` from the nodes around it.
    ///
    /// # Errors
    /// Returns an error if `p` is outside the grid or the fit fails.
    pub fn gradient_at(&self, p: &Point<N>, order: GradientOrder) -> Result<[f64; N]> {
        self.grid().cell_of(p)?;
        estimate_gradient(&self.neighborhood(p), Some(p), order)
    }

    /// Trace a ray from `rx` by stepping against the travel-time gradient
    /// until it enters a cell whose closed box holds a source, then close it
    /// on that source.
    ///
    /// Steps are a quarter of the smallest grid spacing. Lengths are assigned
    /// to the cell containing each step's midpoint.
    ///
    /// # Errors
    /// Returns an error if `rx` is outside the grid, a gradient fit fails, or
    /// no source is reached within a step budget proportional to the grid size.
    pub fn trace_ray_gradient(&self, rx: &Point<N>, order: GradientOrder) -> Result<Ray<N>> {
        let grid = self.grid();
        let time = self.time_at(rx)?;
        let spacing = grid.spacing();
        let step = 0.25 * spacing.iter().cloned().fold(f64::INFINITY, f64::min);
        let (lo, hi) = grid.bounds();
        let max_steps = 4 * (lo.distance(&hi) / step).ceil() as usize + 16;

        let mut path = vec![*rx];
        let mut lengths = LengthAccumulator::default();
        let mut here = *rx;

        for _ in 0..max_steps {
            let cell = grid.cell_of_unchecked(&here);
            if let Some((src, _)) = self
                .sources()
                .iter()
                .find(|(src, _)| cell_contains(grid, cell, src))
            {
                lengths.add(cell, here.distance(src));
                path.push(*src);
                path.reverse();
                return Ok(Ray {
                    time,
                    path,
                    lengths: lengths.into_lengths(),
                });
            }

            let g = self.gradient_at(&here, order)?;
            let norm = g.iter().map(|v| v * v).sum::<f64>().sqrt();
            if !norm.is_finite() || norm == 0.0 {
                return Err(RaytraceError::Other(format!(
                    "vanishing travel-time gradient at {}",
                    here
                )));
            }
            let mut dir = [0.0; N];
            for d in 0..N {
                dir[d] = -g[d] / norm;
            }

            let mut next = here.translated(&dir, step);
            for d in 0..N {
                next.0[d] = next.0[d].clamp(lo.0[d], hi.0[d]);
            }
            let mut mid = here;
            for d in 0..N {
                mid.0[d] = 0.5 * (here.0[d] + next.0[d]);
            }
            lengths.add(grid.cell_of_unchecked(&mid), here.distance(&next));
            path.push(next);
            here = next;
        }

        Err(RaytraceError::RayNotConverged {
            coord: rx.coords().to_vec(),
            steps: max_steps,
        })
    }
}
