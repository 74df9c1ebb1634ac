// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Shortest-path propagation from one or more sources.
//!
//! A run owns every piece of mutable state (times, parents, flags, queue and
//! synthetic source nodes) and only borrows the grid, so any number of runs
//! may share one grid from different threads.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use ordered_float::OrderedFloat;

use crate::error::{RaytraceError, Result};
use crate::grid::Grid;
use crate::node::NodeRef;
use crate::point::Point;

/// A source point that does not coincide with a grid node.
///
/// It lives only for the duration of one run and is connected to the nodes of
/// the cell containing it.
#[derive(Debug, Clone)]
pub struct SyntheticSource<const N: usize> {
    /// Source position.
    pub position: Point<N>,
    /// Cell containing the source.
    pub cell: usize,
    /// Slowness at the source under the nodal law.
    pub slowness: f64,
    /// Start time.
    pub time: f64,
}

/// Travel times and parent pointers of a finished propagation run.
pub struct TravelTimeField<'g, const N: usize> {
    grid: &'g Grid<N>,
    slot: usize,
    times: Vec<f64>,
    parents: Vec<Option<(NodeRef, usize)>>,
    frozen: Vec<bool>,
    synthetic: Vec<SyntheticSource<N>>,
    sources: Vec<(Point<N>, usize)>,
}

/// Counters gathered during one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagationStats {
    /// Entries popped from the queue, stale ones included.
    pub pops: usize,
    /// Stale entries skipped.
    pub stale: usize,
    /// Successful time improvements.
    pub relaxations: usize,
}

impl<const N: usize> Grid<N> {
    /// Validate `slot`, `tx` and `t0` without computing anything.
    pub(crate) fn check_sources(&self, tx: &[Point<N>], t0: &[f64], slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        if tx.is_empty() {
            return Err(RaytraceError::Other("at least one source is required".to_string()));
        }
        if t0.len() != tx.len() {
            return Err(RaytraceError::SizeMismatch {
                parameter: "t0",
                expected: tx.len(),
                got: t0.len(),
            });
        }
        for (p, t) in tx.iter().zip(t0) {
            self.check_inside(p).map_err(|reason| RaytraceError::InvalidSource {
                coord: p.coords().to_vec(),
                reason,
            })?;
            if !t.is_finite() {
                return Err(RaytraceError::InvalidSource {
                    coord: p.coords().to_vec(),
                    reason: format!("start time {} is not finite", t),
                });
            }
        }
        Ok(())
    }

    /// Compute travel times from the sources `tx`, started at times `t0`, in
    /// propagation slot `slot`.
    ///
    /// All sources are seeded together, so each node ends up with the earliest
    /// arrival over all of them.
    ///
    /// # Errors
    /// Returns an error before any work is done if `slot` is not below
    /// [`Grid::n_threads`], `t0` does not hold one time per source, a
    /// source lies outside the grid, or the cell parameters are inconsistent
    /// (see [`Grid::check_medium`]).
    pub fn propagate(&self, tx: &[Point<N>], t0: &[f64], slot: usize) -> Result<TravelTimeField<'_, N>> {
        self.check_sources(tx, t0, slot)?;
        self.check_medium()?;

        let mut field = TravelTimeField::new(self, slot);
        let mut queue = BinaryHeap::new();
        let start = Instant::now();

        for (p, &t) in tx.iter().zip(t0) {
            let cell = self.cell_of_unchecked(p);
            field.sources.push((*p, cell));
            match self.coincident_node(p, cell) {
                Some(n) => {
                    if t < field.times[n] {
                        field.times[n] = t;
                    }
                    field.frozen[n] = true;
                    queue.push(Reverse((OrderedFloat(field.times[n]), NodeRef::Grid(n))));
                }
                None => {
                    let k = field.synthetic.len();
                    field.synthetic.push(SyntheticSource {
                        position: *p,
                        cell,
                        slowness: self.point_slowness(p, cell),
                        time: t,
                    });
                    queue.push(Reverse((OrderedFloat(t), NodeRef::Source(k))));
                }
            }
        }

        let stats = field.relax_all(&mut queue);

        tracing::debug!(
            slot,
            n_sources = tx.len(),
            n_synthetic = field.synthetic.len(),
            pops = stats.pops,
            stale = stats.stale,
            relaxations = stats.relaxations,
            elapsed_us = start.elapsed().as_micros() as u64,
            "propagation finished"
        );

        Ok(field)
    }
}

type Queue = BinaryHeap<Reverse<(OrderedFloat<f64>, NodeRef)>>;

impl<'g, const N: usize> TravelTimeField<'g, N> {
    fn new(grid: &'g Grid<N>, slot: usize) -> Self {
        let n = grid.n_nodes();
        TravelTimeField {
            grid,
            slot,
            times: vec![f64::INFINITY; n],
            parents: vec![None; n],
            frozen: vec![false; n],
            synthetic: Vec::new(),
            sources: Vec::new(),
        }
    }

    fn relax_all(&mut self, queue: &mut Queue) -> PropagationStats {
        let grid = self.grid;
        let mut settled = vec![false; grid.n_nodes()];
        let mut stats = PropagationStats::default();

        while let Some(Reverse((OrderedFloat(t), from))) = queue.pop() {
            stats.pops += 1;
            if t > self.time(from) {
                stats.stale += 1;
                continue;
            }
            match from {
                NodeRef::Grid(i) => {
                    if settled[i] {
                        stats.stale += 1;
                        continue;
                    }
                    settled[i] = true;
                    for &cell in grid.nodes()[i].owners() {
                        self.relax_cell(from, cell, &settled, queue, &mut stats);
                    }
                }
                NodeRef::Source(k) => {
                    let cell = self.synthetic[k].cell;
                    self.relax_cell(from, cell, &settled, queue, &mut stats);
                }
            }
        }
        stats
    }

    fn relax_cell(
        &mut self,
        from: NodeRef,
        cell: usize,
        settled: &[bool],
        queue: &mut Queue,
        stats: &mut PropagationStats,
    ) {
        let grid = self.grid;
        let t_from = self.time(from);
        let p_from = self.position(from);
        let s_from = self.slowness(from);

        for &nb in grid.cell_neighbors(cell) {
            if from == NodeRef::Grid(nb) || self.frozen[nb] || settled[nb] {
                continue;
            }
            let to = &grid.nodes()[nb];
            let trial = t_from + grid.compute_dt(&p_from, s_from, to.position(), grid.node_slowness(nb), cell);
            if trial < self.times[nb] {
                self.times[nb] = trial;
                self.parents[nb] = Some((from, cell));
                queue.push(Reverse((OrderedFloat(trial), NodeRef::Grid(nb))));
                stats.relaxations += 1;
            }
        }
    }

    /// The grid this field was computed on.
    pub fn grid(&self) -> &'g Grid<N> {
        self.grid
    }

    /// Propagation slot the run was tagged with.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Travel time of every grid node, in node order.
    pub fn node_times(&self) -> &[f64] {
        &self.times
    }

    /// Travel times of the primary nodes only, in corner order.
    pub fn primary_times(&self) -> Vec<f64> {
        self.grid
            .primary_nodes()
            .iter()
            .map(|&n| self.times[n])
            .collect()
    }

    /// Synthetic source nodes created for this run.
    pub fn synthetic_sources(&self) -> &[SyntheticSource<N>] {
        &self.synthetic
    }

    /// Source points of the run with the cell containing each.
    pub fn sources(&self) -> &[(Point<N>, usize)] {
        &self.sources
    }

    /// Travel time at a node.
    pub fn time(&self, r: NodeRef) -> f64 {
        match r {
            NodeRef::Grid(i) => self.times[i],
            NodeRef::Source(k) => self.synthetic[k].time,
        }
    }

    /// Position of a node.
    pub fn position(&self, r: NodeRef) -> Point<N> {
        match r {
            NodeRef::Grid(i) => *self.grid.nodes()[i].position(),
            NodeRef::Source(k) => self.synthetic[k].position,
        }
    }

    /// Nodal-law slowness at a node.
    pub(crate) fn slowness(&self, r: NodeRef) -> f64 {
        match r {
            NodeRef::Grid(i) => self.grid.node_slowness(i),
            NodeRef::Source(k) => self.synthetic[k].slowness,
        }
    }

    /// Parent of a node and the cell the connecting segment crosses, or
    /// `None` for sources.
    pub fn parent(&self, r: NodeRef) -> Option<(NodeRef, usize)> {
        match r {
            NodeRef::Grid(i) => self.parents[i],
            NodeRef::Source(_) => None,
        }
    }

    /// Whether a grid node was frozen as a source.
    pub fn is_frozen(&self, node: usize) -> bool {
        self.frozen[node]
    }
}
