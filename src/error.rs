// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur during grid setup, raytracing, or I/O.
#[derive(Debug)]
pub enum RaytraceError {
    /// Number of cells along an axis is zero.
    InvalidCellCount {
        /// The axis index.
        axis: usize,
    },
    /// Grid spacing is not positive and finite.
    InvalidGridSpacing {
        /// The axis index.
        axis: usize,
        /// The spacing provided.
        value: f64,
    },
    /// Number of thread slots is zero.
    InvalidThreadCount,
    /// A thread slot outside `0..n_threads` was requested.
    InvalidThreadSlot {
        /// The slot requested.
        slot: usize,
        /// Number of slots allocated on the grid.
        n_threads: usize,
    },
    /// Slowness value is not positive and finite.
    InvalidSlowness {
        /// The flat index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f64,
    },
    /// Velocity value is not positive and finite.
    InvalidVelocity {
        /// The parameter name.
        parameter: &'static str,
        /// The flat index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f64,
    },
    /// Parameter array length differs from the expected count.
    SizeMismatch {
        /// The parameter name.
        parameter: &'static str,
        /// The expected number of values.
        expected: usize,
        /// The number of values provided.
        got: usize,
    },
    /// The slowness model has no such parameter.
    UnsupportedParameter {
        /// The parameter name.
        parameter: &'static str,
        /// The model name.
        model: &'static str,
    },
    /// Parameters of one cell are individually valid but inconsistent.
    InvalidCellParameters {
        /// The cell law name.
        law: &'static str,
        /// The offending cell.
        cell: usize,
        /// Which constraint fails.
        reason: String,
    },
    /// Source location is outside the grid.
    InvalidSource {
        /// The source coordinates.
        coord: Vec<f64>,
        /// Explanation of why it's invalid.
        reason: String,
    },
    /// Receiver location is outside the grid.
    InvalidReceiver {
        /// The receiver coordinates.
        coord: Vec<f64>,
        /// Explanation of why it's invalid.
        reason: String,
    },
    /// Too few usable points for the requested least-squares fit.
    InsufficientNeighbors {
        /// Minimum number of points for the fit.
        required: usize,
        /// Number of usable points.
        got: usize,
    },
    /// Least-squares system could not be solved.
    SingularSystem(String),
    /// Gradient-descent ray did not reach a source.
    RayNotConverged {
        /// The receiver coordinates.
        coord: Vec<f64>,
        /// Number of steps taken.
        steps: usize,
    },
    /// Array shape does not match expected shape.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Unsupported data type in file.
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for RaytraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaytraceError::InvalidCellCount { axis } => {
                write!(f, "invalid cell count: axis {} has no cells", axis)
            }
            RaytraceError::InvalidGridSpacing { axis, value } => {
                write!(
                    f,
                    "invalid grid spacing on axis {}: {} (must be positive and finite)",
                    axis, value
                )
            }
            RaytraceError::InvalidThreadCount => {
                write!(f, "invalid thread count: at least one slot is required")
            }
            RaytraceError::InvalidThreadSlot { slot, n_threads } => {
                write!(
                    f,
                    "invalid thread slot {}: grid has {} slot(s)",
                    slot, n_threads
                )
            }
            RaytraceError::InvalidSlowness { index, value } => {
                write!(
                    f,
                    "invalid slowness at index {}: {} (must be positive and finite)",
                    index, value
                )
            }
            RaytraceError::InvalidVelocity {
                parameter,
                index,
                value,
            } => {
                write!(
                    f,
                    "invalid {} at index {}: {} (must be positive and finite)",
                    parameter, index, value
                )
            }
            RaytraceError::SizeMismatch {
                parameter,
                expected,
                got,
            } => {
                write!(
                    f,
                    "{} vector of incompatible size: expected {}, got {}",
                    parameter, expected, got
                )
            }
            RaytraceError::UnsupportedParameter { parameter, model } => {
                write!(f, "{} model has no parameter '{}'", model, parameter)
            }
            RaytraceError::InvalidCellParameters { law, cell, reason } => {
                write!(f, "invalid {} parameters in cell {}: {}", law, cell, reason)
            }
            RaytraceError::InvalidSource { coord, reason } => {
                write!(f, "invalid source at {:?}: {}", coord, reason)
            }
            RaytraceError::InvalidReceiver { coord, reason } => {
                write!(f, "invalid receiver at {:?}: {}", coord, reason)
            }
            RaytraceError::InsufficientNeighbors { required, got } => {
                write!(
                    f,
                    "insufficient neighbors for gradient fit: need {}, got {}",
                    required, got
                )
            }
            RaytraceError::SingularSystem(msg) => {
                write!(f, "least-squares solve failed: {}", msg)
            }
            RaytraceError::RayNotConverged { coord, steps } => {
                write!(
                    f,
                    "ray from receiver {:?} did not reach a source after {} steps",
                    coord, steps
                )
            }
            RaytraceError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            RaytraceError::UnsupportedDtype(dtype) => {
                write!(f, "unsupported dtype: {}", dtype)
            }
            RaytraceError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            RaytraceError::IoError(e) => write!(f, "I/O error: {}", e),
            RaytraceError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RaytraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RaytraceError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RaytraceError {
    fn from(e: std::io::Error) -> Self {
        RaytraceError::IoError(e)
    }
}

/// Convenience type alias for Results with RaytraceError.
pub type Result<T> = std::result::Result<T, RaytraceError>;
