// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Parallel raytracing over many source/receiver pairs.
//!
//! Shots sharing the same source coordinates and start time are grouped so
//! every distinct source is propagated once. Groups are pulled from a shared
//! queue by one worker per propagation slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;

use crate::error::{RaytraceError, Result};
use crate::grid::Grid;
use crate::point::Point;
use crate::raytrace::{Ray, RayLengthMatrix};

/// One source/receiver pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot<const N: usize> {
    /// Source position.
    pub source: Point<N>,
    /// Start time at the source.
    pub t0: f64,
    /// Receiver position.
    pub receiver: Point<N>,
}

/// Progress information passed to the optional callback.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    /// Number of source groups finished so far.
    pub groups_done: usize,
    /// Total number of source groups.
    pub n_groups: usize,
    /// Elapsed time since the batch started.
    pub elapsed: Duration,
}

/// Output of a batch, in input shot order.
#[derive(Debug, Clone)]
pub struct BatchResult<const N: usize> {
    /// Travel time of every shot.
    pub times: Vec<f64>,
    /// Ray path of every shot, if requested.
    pub rays: Option<Vec<Vec<Point<N>>>>,
    /// Ray-length matrix with one row per shot, if requested.
    pub lengths: Option<RayLengthMatrix>,
}

struct SourceGroup<const N: usize> {
    source: Point<N>,
    t0: f64,
    shots: Vec<usize>,
}

/// Group shots by identical source coordinates and start time, in order of
/// first appearance.
fn group_by_source<const N: usize>(shots: &[Shot<N>]) -> Vec<SourceGroup<N>> {
    let mut groups: Vec<SourceGroup<N>> = Vec::new();
    for (i, shot) in shots.iter().enumerate() {
        match groups.iter_mut().find(|g| g.source == shot.source && g.t0 == shot.t0) {
            Some(g) => g.shots.push(i),
            None => groups.push(SourceGroup {
                source: shot.source,
                t0: shot.t0,
                shots: vec![i],
            }),
        }
    }
    groups
}

/// Raytraces batches of shots on a shared grid.
pub struct BatchRaytracer<'g, const N: usize> {
    grid: &'g Grid<N>,
    with_rays: bool,
    with_lengths: bool,
    progress_callback: Option<Box<dyn Fn(BatchProgress) + Send + Sync + 'g>>,
}

impl<'g, const N: usize> BatchRaytracer<'g, N> {
    /// Create a batch raytracer that returns travel times only.
    pub fn new(grid: &'g Grid<N>) -> Self {
        BatchRaytracer {
            grid,
            with_rays: false,
            with_lengths: false,
            progress_callback: None,
        }
    }

    /// Also return ray paths (builder method).
    pub fn with_rays(mut self, rays: bool) -> Self {
        self.with_rays = rays;
        self
    }

    /// Also return the ray-length matrix (builder method).
    pub fn with_lengths(mut self, lengths: bool) -> Self {
        self.with_lengths = lengths;
        self
    }

    /// Set a progress callback invoked after every finished source group
    /// (builder method).
    pub fn with_progress(mut self, callback: Box<dyn Fn(BatchProgress) + Send + Sync + 'g>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Raytrace every shot.
    ///
    /// Uses `min(grid.n_threads(), number of distinct sources)` workers, worker
    /// `i` propagating in slot `i`.
    ///
    /// # Errors
    /// Every source and receiver is validated before any work starts.
    pub fn run(&self, shots: &[Shot<N>]) -> Result<BatchResult<N>> {
        self.grid.check_medium()?;
        for shot in shots {
            self.grid.check_sources(&[shot.source], &[shot.t0], 0)?;
            self.grid.check_inside(&shot.receiver).map_err(|reason| {
                RaytraceError::InvalidReceiver {
                    coord: shot.receiver.coords().to_vec(),
                    reason,
                }
            })?;
        }

        let groups = group_by_source(shots);
        let n_groups = groups.len();
        let n_workers = self.grid.n_threads().min(n_groups).max(1);
        tracing::debug!(
            n_shots = shots.len(),
            n_groups,
            n_workers,
            "dispatching batch"
        );

        let queue = SegQueue::new();
        for g in 0..n_groups {
            queue.push(g);
        }
        let finished: SegQueue<(usize, Result<Vec<Ray<N>>>)> = SegQueue::new();
        let groups_done = AtomicUsize::new(0);
        let start_time = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .build()
            .map_err(|e| RaytraceError::Other(e.to_string()))?;

        pool.scope(|s| {
            for slot in 0..n_workers {
                let (queue, finished, groups, groups_done) = (&queue, &finished, &groups, &groups_done);
                s.spawn(move |_| {
                    while let Some(g) = queue.pop() {
                        let group = &groups[g];
                        let rx: Vec<Point<N>> = group.shots.iter().map(|&i| shots[i].receiver).collect();
                        let rays = self
                            .grid
                            .raytrace_with_lengths(&[group.source], &[group.t0], &rx, slot);
                        finished.push((g, rays));

                        let done = groups_done.fetch_add(1, Ordering::AcqRel) + 1;
                        tracing::trace!(slot, group = g, done, "source group finished");
                        if let Some(cb) = &self.progress_callback {
                            cb(BatchProgress {
                                groups_done: done,
                                n_groups,
                                elapsed: start_time.elapsed(),
                            });
                        }
                    }
                });
            }
        });

        let mut per_group: Vec<Option<Vec<Ray<N>>>> = (0..n_groups).map(|_| None).collect();
        let mut first_error: Option<(usize, RaytraceError)> = None;
        while let Some((g, result)) = finished.pop() {
            match result {
                Ok(rays) => per_group[g] = Some(rays),
                Err(e) => {
                    if first_error.as_ref().map_or(true, |(h, _)| g < *h) {
                        first_error = Some((g, e));
                    }
                }
            }
        }
        if let Some((_, e)) = first_error {
            return Err(e);
        }

        let mut ordered: Vec<Option<Ray<N>>> = (0..shots.len()).map(|_| None).collect();
        for (group, rays) in groups.iter().zip(per_group) {
            let rays = rays.ok_or_else(|| RaytraceError::Other("source group was not traced".to_string()))?;
            for (&i, ray) in group.shots.iter().zip(rays) {
                ordered[i] = Some(ray);
            }
        }
        let rays: Vec<Ray<N>> = ordered
            .into_iter()
            .map(|r| r.ok_or_else(|| RaytraceError::Other("shot was not traced".to_string())))
            .collect::<Result<_>>()?;

        let lengths = if self.with_lengths {
            Some(RayLengthMatrix::from_rays(self.grid.n_cells(), &rays)?)
        } else {
            None
        };
        let times = rays.iter().map(|r| r.time).collect();
        let paths = if self.with_rays {
            Some(rays.into_iter().map(|r| r.path).collect())
        } else {
            None
        };

        Ok(BatchResult {
            times,
            rays: paths,
            lengths,
        })
    }
}
