// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Shortest-path traveltime computation and ray tracing on regular grids.
//!
//! A [`Grid`] discretizes a 2D or 3D rectangular domain into cells. Every cell
//! corner is a primary node, and each cell edge carries a configurable number
//! of secondary nodes. Nodes sharing a cell are connected, and first-arrival
//! times are computed with Dijkstra's algorithm over that graph. Edge travel
//! times come either from node slowness (nodal law) or from a per-cell law,
//! which may be isotropic, elliptical, tilted elliptical, or VTI.
//!
//! Receivers are answered from a [`TravelTimeField`], either by following
//! parent links back to a source or by descending a locally estimated
//! traveltime gradient.

#![warn(missing_docs)]

/// Parallel batch raytracing over many source/receiver pairs.
pub mod batch;
/// Per-cell travel-time laws and their parameter storage.
pub mod cells;
/// Error types for the library.
pub mod error;
/// Least-squares gradient estimation and gradient-descent rays.
pub mod gradient;
/// Grid construction, node layout, and slowness models.
pub mod grid;
/// File I/O for loading slowness fields and saving results.
pub mod io;
/// Graph nodes.
pub mod node;
/// Fixed-dimension points.
pub mod point;
/// Dijkstra propagation of first-arrival times.
pub mod propagation;
/// Receiver times, ray paths, and ray-length matrices.
pub mod raytrace;

pub use crate::batch::{BatchProgress, BatchRaytracer, BatchResult, Shot};
pub use crate::cells::{CellLaw, CellModel, CellParameter, TravelTimeLaw};
pub use crate::error::{RaytraceError, Result};
pub use crate::gradient::{estimate_gradient, GradientOrder};
pub use crate::grid::{Grid, GridConfig, SlownessModel};
pub use crate::node::{GridNode, NodeKind, NodeRef};
pub use crate::point::{Point, Point2, Point3};
pub use crate::propagation::{SyntheticSource, TravelTimeField};
pub use crate::raytrace::{Ray, RayLength, RayLengthMatrix};
