// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, IxDyn};
use ndarray_npy::ReadNpyExt;

use crate::error::{RaytraceError, Result};
use crate::grid::{Grid, SlownessModel};
use crate::propagation::TravelTimeField;
use crate::raytrace::RayLengthMatrix;

/// Array shape a slowness file must have for `grid`: one value per corner
/// under the nodal law, one per cell under a cell law.
pub fn slowness_shape<const N: usize>(grid: &Grid<N>) -> Vec<usize> {
    match grid.model() {
        SlownessModel::Nodal => grid.cells().iter().map(|c| c + 1).collect(),
        SlownessModel::Cells(_) => grid.cells().to_vec(),
    }
}

/// Load a field from a .npy file.
///
/// The array must either have `expected_shape` or be one-dimensional with the
/// same number of elements. f32 data is promoted to f64.
pub fn load_npy_slowness(path: &Path, expected_shape: &[usize]) -> Result<Vec<f64>> {
    check_npy_extension(path)?;
    // Try f64 first
    let arr: ArrayD<f64> = match ArrayD::<f64>::read_npy(File::open(path)?) {
        Ok(a) => a,
        Err(_) => {
            // Try f32 and promote
            let arr32 = ArrayD::<f32>::read_npy(File::open(path)?)
                .map_err(|e| RaytraceError::UnsupportedDtype(format!("{}", e)))?;
            arr32.mapv(|v| v as f64)
        }
    };

    let got_shape: Vec<usize> = arr.shape().to_vec();
    let n_expected: usize = expected_shape.iter().product();
    let flat_ok = got_shape.len() == 1 && got_shape[0] == n_expected;
    if got_shape != expected_shape && !flat_ok {
        return Err(RaytraceError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            got: got_shape,
        });
    }

    // Fortran-order files would otherwise come out column-major.
    Ok(arr.as_standard_layout().to_owned().into_raw_vec())
}

/// Load a velocity field from a .npy file and convert it to slowness.
pub fn load_velocity_as_slowness(path: &Path, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let velocity = load_npy_slowness(path, expected_shape)?;
    velocity_to_slowness(&velocity)
}

/// Convert velocity values to slowness (element-wise 1/v).
pub fn velocity_to_slowness(velocity: &[f64]) -> Result<Vec<f64>> {
    let mut slowness = Vec::with_capacity(velocity.len());
    for (index, &v) in velocity.iter().enumerate() {
        if !v.is_finite() || v <= 0.0 {
            return Err(RaytraceError::InvalidVelocity {
                parameter: "velocity",
                index,
                value: v,
            });
        }
        slowness.push(1.0 / v);
    }
    Ok(slowness)
}

/// Save a vector of values (e.g. receiver times) to a .npy file.
pub fn save_npy_values(values: &[f64], path: &Path) -> Result<()> {
    check_npy_extension(path)?;
    let arr = Array1::from(values.to_vec());
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| RaytraceError::Other(format!("npy write error: {}", e)))
}

/// Save the travel times of the primary nodes, shaped like the corner lattice.
pub fn save_npy_field<const N: usize>(field: &TravelTimeField<'_, N>, path: &Path) -> Result<()> {
    check_npy_extension(path)?;
    let shape: Vec<usize> = field.grid().cells().iter().map(|c| c + 1).collect();
    let arr = ArrayD::from_shape_vec(IxDyn(&shape), field.primary_times())
        .map_err(|e| RaytraceError::Other(format!("shape error: {}", e)))?;
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| RaytraceError::Other(format!("npy write error: {}", e)))
}

/// Save a ray-length matrix densely, one row per receiver.
pub fn save_npy_lengths(matrix: &RayLengthMatrix, path: &Path) -> Result<()> {
    check_npy_extension(path)?;
    let mut arr = Array2::<f64>::zeros((matrix.n_rows(), matrix.n_cols()));
    for i in 0..matrix.n_rows() {
        for (cell, length) in matrix.row(i) {
            arr[[i, cell]] = length;
        }
    }
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| RaytraceError::Other(format!("npy write error: {}", e)))
}

/// Reject paths that do not end in `.npy`.
pub fn check_npy_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => Ok(()),
        Some(ext) => Err(RaytraceError::UnsupportedFileFormat(ext.to_string())),
        None => Err(RaytraceError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::CellLaw;
    use crate::grid::GridConfig;
    use crate::point::Point2;
    use crate::raytrace::RayLength;

    #[test]
    fn field_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("times.npy");
        let grid = Grid::<2>::new(GridConfig::new([3, 2], [1.0, 1.0]).with_secondary_nodes([1, 1])).unwrap();
        let field = grid.propagate(&[Point2::new([0.0, 0.0])], &[0.0], 0).unwrap();
        save_npy_field(&field, &path).unwrap();

        let loaded = load_npy_slowness(&path, &[4, 3]).unwrap();
        assert_eq!(loaded, field.primary_times());
    }

    #[test]
    fn shape_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.npy");
        save_npy_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &path).unwrap();

        // flat arrays of the right size are accepted
        assert_eq!(load_npy_slowness(&path, &[2, 3]).unwrap().len(), 6);
        assert!(matches!(
            load_npy_slowness(&path, &[3, 3]),
            Err(RaytraceError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn f32_is_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f32.npy");
        let arr = ndarray::Array2::<f32>::from_elem((2, 2), 0.5);
        ndarray_npy::write_npy(&path, &arr).unwrap();
        assert_eq!(load_npy_slowness(&path, &[2, 2]).unwrap(), vec![0.5; 4]);
    }

    #[test]
    fn expected_slowness_shapes() {
        let nodal = Grid::<3>::new(GridConfig::new([2, 3, 4], [1.0; 3])).unwrap();
        assert_eq!(slowness_shape(&nodal), vec![3, 4, 5]);
        let cells = Grid::<2>::new(
            GridConfig::new([2, 3], [1.0; 2]).with_model(SlownessModel::Cells(CellLaw::Elliptical)),
        )
        .unwrap();
        assert_eq!(slowness_shape(&cells), vec![2, 3]);
    }

    #[test]
    fn dense_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lengths.npy");
        let rows = [vec![RayLength { cell: 1, length: 2.5 }], vec![]];
        let m = RayLengthMatrix::from_rows(3, rows.iter().map(|r| r.as_slice())).unwrap();
        save_npy_lengths(&m, &path).unwrap();
        assert_eq!(
            load_npy_slowness(&path, &[2, 3]).unwrap(),
            vec![0.0, 2.5, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn velocity_to_slowness_invalid() {
        let result = velocity_to_slowness(&[1.0, 0.0, 2.0]);
        assert!(matches!(
            result,
            Err(RaytraceError::InvalidVelocity { index: 1, .. })
        ));
        assert_eq!(velocity_to_slowness(&[2.0, 4.0]).unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_npy_slowness(&dir.path().join("absent.npy"), &[2]),
            Err(RaytraceError::IoError(_))
        ));
    }

    #[test]
    fn unsupported_format() {
        assert!(matches!(
            check_npy_extension(Path::new("times.mat")),
            Err(RaytraceError::UnsupportedFileFormat(_))
        ));
    }
}
