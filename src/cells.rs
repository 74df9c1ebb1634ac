// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Per-cell travel-time laws.
//!
//! Each law maps the straight segment between two points inside one cell to a
//! travel-time increment. The laws know nothing about the grid graph; the grid
//! only hands them the two endpoints and the index of the cell the segment
//! lies in.

use crate::error::{RaytraceError, Result};
use crate::point::Point;

/// Travel time of a straight segment inside one cell.
pub trait TravelTimeLaw<const N: usize> {
    /// Travel-time increment from `from` to `to` inside cell `cell`.
    fn compute_dt(&self, from: &Point<N>, to: &Point<N>, cell: usize) -> f64;
}

/// The closed set of cell laws a grid can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLaw {
    /// Direction-independent slowness.
    Isotropic,
    /// Elliptical anisotropy about the vertical axis.
    Elliptical,
    /// Elliptical anisotropy with a per-cell tilt of the symmetry axis.
    TiltedElliptical,
    /// Vertical transverse isotropy, P or SV phase.
    VtiPsv,
    /// Vertical transverse isotropy, SH phase.
    VtiSh,
}

impl CellLaw {
    /// Human-readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            CellLaw::Isotropic => "isotropic",
            CellLaw::Elliptical => "elliptical",
            CellLaw::TiltedElliptical => "tilted elliptical",
            CellLaw::VtiPsv => "VTI P/SV",
            CellLaw::VtiSh => "VTI SH",
        }
    }
}

/// Settable per-cell parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellParameter {
    /// Slowness (isotropic and elliptical laws).
    Slowness,
    /// Anisotropy ratio. The elliptical law takes it as `(s_z / s_x)^2`,
    /// the tilted law as `s_z / s_x` and squares it.
    Xi,
    /// Tilt of the symmetry axis in radians.
    TiltAngle,
    /// P-wave velocity along the symmetry axis.
    Vp0,
    /// S-wave velocity along the symmetry axis.
    Vs0,
    /// Thomsen epsilon.
    Epsilon,
    /// Thomsen delta.
    Delta,
    /// Thomsen gamma.
    Gamma,
}

impl CellParameter {
    /// Parameter name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            CellParameter::Slowness => "slowness",
            CellParameter::Xi => "xi",
            CellParameter::TiltAngle => "angle",
            CellParameter::Vp0 => "Vp0",
            CellParameter::Vs0 => "Vs0",
            CellParameter::Epsilon => "epsilon",
            CellParameter::Delta => "delta",
            CellParameter::Gamma => "gamma",
        }
    }
}

/// Isotropic cells: `dt = s * d`.
#[derive(Debug, Clone)]
pub struct Isotropic {
    slowness: Vec<f64>,
}

/// Elliptical cells: `dt = s * sqrt(lh^2 + xi * lz^2)`.
#[derive(Debug, Clone)]
pub struct Elliptical {
    slowness: Vec<f64>,
    xi: Vec<f64>,
}

/// Elliptical cells with the symmetry axis tilted in the x-z plane:
/// `dt = s * sqrt(t1^2 + xi^2 * t2^2)` on the rotated offsets.
#[derive(Debug, Clone)]
pub struct TiltedElliptical {
    slowness: Vec<f64>,
    xi: Vec<f64>,
    angle: Vec<f64>,
    cos_angle: Vec<f64>,
    sin_angle: Vec<f64>,
}

/// VTI cells, P or SV root of the exact Thomsen phase velocity.
#[derive(Debug, Clone)]
pub struct VtiPsv {
    sign: f64,
    vp0: Vec<f64>,
    vs0: Vec<f64>,
    epsilon: Vec<f64>,
    delta: Vec<f64>,
}

/// VTI cells, SH phase.
#[derive(Debug, Clone)]
pub struct VtiSh {
    vs0: Vec<f64>,
    gamma: Vec<f64>,
}

impl<const N: usize> TravelTimeLaw<N> for Isotropic {
    fn compute_dt(&self, from: &Point<N>, to: &Point<N>, cell: usize) -> f64 {
        self.slowness[cell] * from.distance(to)
    }
}

impl<const N: usize> TravelTimeLaw<N> for Elliptical {
    fn compute_dt(&self, from: &Point<N>, to: &Point<N>, cell: usize) -> f64 {
        let (lh, lz) = from.split_offset(to);
        self.slowness[cell] * (lh * lh + self.xi[cell] * lz * lz).sqrt()
    }
}

impl<const N: usize> TravelTimeLaw<N> for TiltedElliptical {
    fn compute_dt(&self, from: &Point<N>, to: &Point<N>, cell: usize) -> f64 {
        let l = from.offset_to(to);
        let (lx, lz) = (l[0], l[N - 1]);
        // in 3D the y component is untouched by a tilt in the x-z plane
        let ly_sq = if N == 3 { l[1] * l[1] } else { 0.0 };
        let (ca, sa) = (self.cos_angle[cell], self.sin_angle[cell]);
        let t1 = lx * ca + lz * sa;
        let t2 = lz * ca - lx * sa;
        let xi = self.xi[cell];
        self.slowness[cell] * (t1 * t1 + ly_sq + xi * xi * t2 * t2).sqrt()
    }
}

impl<const N: usize> TravelTimeLaw<N> for VtiPsv {
    fn compute_dt(&self, from: &Point<N>, to: &Point<N>, cell: usize) -> f64 {
        let (lh, lz) = from.split_offset(to);
        // angle from the vertical axis
        let theta = lh.atan2(lz);
        let vp = self.vp0[cell];
        let vs = self.vs0[cell];
        let eps = self.epsilon[cell];
        let f = 1.0 - (vs * vs) / (vp * vp);

        let sin2 = theta.sin().powi(2);
        let sin2t = (2.0 * theta).sin().powi(2);
        let a = 1.0 + (2.0 * eps * sin2) / f;
        let root = (a * a - (2.0 * (eps - self.delta[cell]) * sin2t) / f).sqrt();
        let tmp = 1.0 + eps * sin2 - f / 2.0 + self.sign * f / 2.0 * root;

        let v = vp * tmp.sqrt();
        from.distance(to) / v
    }
}

impl<const N: usize> TravelTimeLaw<N> for VtiSh {
    fn compute_dt(&self, from: &Point<N>, to: &Point<N>, cell: usize) -> f64 {
        let (lh, lz) = from.split_offset(to);
        let theta = lh.atan2(lz);
        let v = self.vs0[cell] * (1.0 + 2.0 * self.gamma[cell] * theta.sin().powi(2)).sqrt();
        from.distance(to) / v
    }
}

/// Per-cell parameters of one of the [`CellLaw`]s.
///
/// Every parameter array holds exactly one value per cell. Fresh models
/// describe a homogeneous medium of unit slowness without anisotropy. The
/// VTI P/SV law starts with unit P velocity and half that for SV, the VTI SH
/// law with unit SH velocity.
#[derive(Debug, Clone)]
pub enum CellModel {
    /// See [`Isotropic`].
    Isotropic(Isotropic),
    /// See [`Elliptical`].
    Elliptical(Elliptical),
    /// See [`TiltedElliptical`].
    TiltedElliptical(TiltedElliptical),
    /// See [`VtiPsv`].
    VtiPsv(VtiPsv),
    /// See [`VtiSh`].
    VtiSh(VtiSh),
}

impl CellModel {
    /// Create a model for `n_cells` cells with default parameters.
    pub fn new(law: CellLaw, n_cells: usize) -> Self {
        let ones = vec![1.0; n_cells];
        let zeros = vec![0.0; n_cells];
        match law {
            CellLaw::Isotropic => CellModel::Isotropic(Isotropic { slowness: ones }),
            CellLaw::Elliptical => CellModel::Elliptical(Elliptical {
                slowness: ones.clone(),
                xi: ones,
            }),
            CellLaw::TiltedElliptical => CellModel::TiltedElliptical(TiltedElliptical {
                slowness: ones.clone(),
                xi: ones.clone(),
                angle: zeros.clone(),
                cos_angle: ones,
                sin_angle: zeros,
            }),
            CellLaw::VtiPsv => CellModel::VtiPsv(VtiPsv {
                sign: 1.0,
                vp0: ones,
                vs0: vec![0.5; n_cells],
                epsilon: zeros.clone(),
                delta: zeros,
            }),
            CellLaw::VtiSh => CellModel::VtiSh(VtiSh {
                vs0: ones,
                gamma: zeros,
            }),
        }
    }

    /// The law this model implements.
    pub fn law(&self) -> CellLaw {
        match self {
            CellModel::Isotropic(_) => CellLaw::Isotropic,
            CellModel::Elliptical(_) => CellLaw::Elliptical,
            CellModel::TiltedElliptical(_) => CellLaw::TiltedElliptical,
            CellModel::VtiPsv(_) => CellLaw::VtiPsv,
            CellModel::VtiSh(_) => CellLaw::VtiSh,
        }
    }

    /// Number of cells the parameter arrays are sized for.
    pub fn n_cells(&self) -> usize {
        match self {
            CellModel::Isotropic(m) => m.slowness.len(),
            CellModel::Elliptical(m) => m.slowness.len(),
            CellModel::TiltedElliptical(m) => m.slowness.len(),
            CellModel::VtiPsv(m) => m.vp0.len(),
            CellModel::VtiSh(m) => m.vs0.len(),
        }
    }

    /// Current values of `param`, if the model carries it.
    pub fn get(&self, param: CellParameter) -> Option<&[f64]> {
        use CellParameter as P;
        let values = match (self, param) {
            (CellModel::Isotropic(m), P::Slowness) => &m.slowness,
            (CellModel::Elliptical(m), P::Slowness) => &m.slowness,
            (CellModel::Elliptical(m), P::Xi) => &m.xi,
            (CellModel::TiltedElliptical(m), P::Slowness) => &m.slowness,
            (CellModel::TiltedElliptical(m), P::Xi) => &m.xi,
            (CellModel::TiltedElliptical(m), P::TiltAngle) => &m.angle,
            (CellModel::VtiPsv(m), P::Vp0) => &m.vp0,
            (CellModel::VtiPsv(m), P::Vs0) => &m.vs0,
            (CellModel::VtiPsv(m), P::Epsilon) => &m.epsilon,
            (CellModel::VtiPsv(m), P::Delta) => &m.delta,
            (CellModel::VtiSh(m), P::Vs0) => &m.vs0,
            (CellModel::VtiSh(m), P::Gamma) => &m.gamma,
            _ => return None,
        };
        Some(values)
    }

    fn get_mut(&mut self, param: CellParameter) -> Result<&mut Vec<f64>> {
        use CellParameter as P;
        let model = self.law().name();
        let values = match (self, param) {
            (CellModel::Isotropic(m), P::Slowness) => &mut m.slowness,
            (CellModel::Elliptical(m), P::Slowness) => &mut m.slowness,
            (CellModel::Elliptical(m), P::Xi) => &mut m.xi,
            (CellModel::TiltedElliptical(m), P::Slowness) => &mut m.slowness,
            (CellModel::TiltedElliptical(m), P::Xi) => &mut m.xi,
            (CellModel::TiltedElliptical(m), P::TiltAngle) => &mut m.angle,
            (CellModel::VtiPsv(m), P::Vp0) => &mut m.vp0,
            (CellModel::VtiPsv(m), P::Vs0) => &mut m.vs0,
            (CellModel::VtiPsv(m), P::Epsilon) => &mut m.epsilon,
            (CellModel::VtiPsv(m), P::Delta) => &mut m.delta,
            (CellModel::VtiSh(m), P::Vs0) => &mut m.vs0,
            (CellModel::VtiSh(m), P::Gamma) => &mut m.gamma,
            _ => {
                return Err(RaytraceError::UnsupportedParameter {
                    parameter: param.name(),
                    model,
                })
            }
        };
        Ok(values)
    }

    /// Replace the values of `param`, one per cell.
    ///
    /// # Errors
    /// Returns an error, leaving every parameter untouched, if the model does
    /// not carry `param`, if `values` does not hold one value per cell, or if a
    /// slowness or velocity is not positive and finite.
    pub fn set(&mut self, param: CellParameter, values: &[f64]) -> Result<()> {
        let n_cells = self.n_cells();
        // resolve first so an unsupported parameter wins over a size error
        self.get_mut(param)?;
        if values.len() != n_cells {
            return Err(RaytraceError::SizeMismatch {
                parameter: param.name(),
                expected: n_cells,
                got: values.len(),
            });
        }
        validate_parameter(param, values)?;

        self.get_mut(param)?.copy_from_slice(values);
        if let (CellModel::TiltedElliptical(m), CellParameter::TiltAngle) = (&mut *self, param) {
            for (n, &a) in m.angle.iter().enumerate() {
                m.cos_angle[n] = a.cos();
                m.sin_angle[n] = a.sin();
            }
        }
        Ok(())
    }

    /// Set `param` to the same value in every cell.
    pub fn fill(&mut self, param: CellParameter, value: f64) -> Result<()> {
        let values = vec![value; self.n_cells()];
        self.set(param, &values)
    }

    /// Check the constraints that tie several parameters of one cell
    /// together. The per-parameter setters cannot enforce them, since the
    /// values involved are set one array at a time.
    ///
    /// # Errors
    /// Returns [`RaytraceError::InvalidCellParameters`] for the first cell
    /// where the VTI P/SV law has `Vs0 >= Vp0` or `1 + 2 epsilon <= 0`, or
    /// the VTI SH law has `1 + 2 gamma <= 0`.
    pub fn validate(&self) -> Result<()> {
        let law = self.law().name();
        let fail = |cell: usize, reason: String| -> Result<()> {
            Err(RaytraceError::InvalidCellParameters { law, cell, reason })
        };
        match self {
            CellModel::VtiPsv(m) => {
                for cell in 0..m.vp0.len() {
                    if m.vs0[cell] >= m.vp0[cell] {
                        return fail(
                            cell,
                            format!("Vs0 = {} must be below Vp0 = {}", m.vs0[cell], m.vp0[cell]),
                        );
                    }
                    if 1.0 + 2.0 * m.epsilon[cell] <= 0.0 {
                        return fail(
                            cell,
                            format!("1 + 2 epsilon must be positive, epsilon = {}", m.epsilon[cell]),
                        );
                    }
                }
            }
            CellModel::VtiSh(m) => {
                for cell in 0..m.gamma.len() {
                    if 1.0 + 2.0 * m.gamma[cell] <= 0.0 {
                        return fail(
                            cell,
                            format!("1 + 2 gamma must be positive, gamma = {}", m.gamma[cell]),
                        );
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Select the P (`phase == 1`) or SV (anything else) root.
    ///
    /// # Errors
    /// Returns an error if the model is not [`CellLaw::VtiPsv`].
    pub fn set_phase(&mut self, phase: i32) -> Result<()> {
        match self {
            CellModel::VtiPsv(m) => {
                m.sign = if phase == 1 { 1.0 } else { -1.0 };
                Ok(())
            }
            other => Err(RaytraceError::UnsupportedParameter {
                parameter: "phase",
                model: other.law().name(),
            }),
        }
    }
}

fn validate_parameter(param: CellParameter, values: &[f64]) -> Result<()> {
    for (index, &value) in values.iter().enumerate() {
        let positive = value.is_finite() && value > 0.0;
        match param {
            CellParameter::Slowness if !positive => {
                return Err(RaytraceError::InvalidSlowness { index, value });
            }
            CellParameter::Vp0 | CellParameter::Vs0 | CellParameter::Xi if !positive => {
                return Err(RaytraceError::InvalidVelocity {
                    parameter: param.name(),
                    index,
                    value,
                });
            }
            _ if !value.is_finite() => {
                return Err(RaytraceError::Other(format!(
                    "non-finite {} at index {}",
                    param.name(),
                    index
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

impl<const N: usize> TravelTimeLaw<N> for CellModel {
    fn compute_dt(&self, from: &Point<N>, to: &Point<N>, cell: usize) -> f64 {
        match self {
            CellModel::Isotropic(m) => m.compute_dt(from, to, cell),
            CellModel::Elliptical(m) => m.compute_dt(from, to, cell),
            CellModel::TiltedElliptical(m) => m.compute_dt(from, to, cell),
            CellModel::VtiPsv(m) => m.compute_dt(from, to, cell),
            CellModel::VtiSh(m) => m.compute_dt(from, to, cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{Point2, Point3};

    fn dt2(model: &CellModel, a: [f64; 2], b: [f64; 2]) -> f64 {
        model.compute_dt(&Point2::new(a), &Point2::new(b), 0)
    }

    #[test]
    fn isotropic_is_slowness_times_distance() {
        let mut m = CellModel::new(CellLaw::Isotropic, 2);
        m.set(CellParameter::Slowness, &[0.5, 2.0]).unwrap();
        let a = Point2::new([0.0, 0.0]);
        let b = Point2::new([3.0, 4.0]);
        assert!((m.compute_dt(&a, &b, 0) - 2.5).abs() < 1e-12);
        assert!((m.compute_dt(&a, &b, 1) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn elliptical_scales_vertical_component() {
        let mut m = CellModel::new(CellLaw::Elliptical, 1);
        m.fill(CellParameter::Slowness, 2.0).unwrap();
        m.fill(CellParameter::Xi, 4.0).unwrap();
        // horizontal ray unaffected
        assert!((dt2(&m, [0.0, 0.0], [1.0, 0.0]) - 2.0).abs() < 1e-12);
        // vertical ray: s * sqrt(xi) * lz
        assert!((dt2(&m, [0.0, 0.0], [0.0, 1.0]) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn elliptical_3d_combines_horizontal_components() {
        let mut m = CellModel::new(CellLaw::Elliptical, 1);
        m.fill(CellParameter::Xi, 0.25).unwrap();
        let a = Point3::new([0.0, 0.0, 0.0]);
        let b = Point3::new([3.0, 4.0, 2.0]);
        // sqrt(25 + 0.25 * 4)
        let expected = 26.0_f64.sqrt();
        assert!((m.compute_dt(&a, &b, 0) - expected).abs() < 1e-12);
    }

    #[test]
    fn tilted_elliptical_with_unit_xi_is_isotropic() {
        let mut m = CellModel::new(CellLaw::TiltedElliptical, 3);
        m.fill(CellParameter::Slowness, 1.5).unwrap();
        m.set(CellParameter::TiltAngle, &[0.3, 1.2, -2.0]).unwrap();
        let a = Point2::new([0.2, -0.7]);
        let b = Point2::new([1.9, 0.4]);
        for cell in 0..3 {
            let dt = m.compute_dt(&a, &b, cell);
            assert!((dt - 1.5 * a.distance(&b)).abs() < 1e-12);
        }
    }

    #[test]
    fn tilted_elliptical_squares_xi() {
        let mut m = CellModel::new(CellLaw::TiltedElliptical, 1);
        m.fill(CellParameter::Slowness, 1.5).unwrap();
        m.fill(CellParameter::Xi, 4.0).unwrap();
        // angle 0, vertical unit segment: s * xi, where the elliptical law gives s * sqrt(xi)
        assert!((dt2(&m, [0.0, 0.0], [0.0, 1.0]) - 6.0).abs() < 1e-12);
        assert!((dt2(&m, [0.0, 0.0], [1.0, 0.0]) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn tilted_elliptical_quarter_turn_swaps_axes() {
        let mut m = CellModel::new(CellLaw::TiltedElliptical, 1);
        m.fill(CellParameter::Xi, 3.0).unwrap();
        // untilted: vertical is the slow direction
        assert!((dt2(&m, [0.0, 0.0], [0.0, 1.0]) - 3.0).abs() < 1e-12);
        m.fill(CellParameter::TiltAngle, std::f64::consts::FRAC_PI_2)
            .unwrap();
        // tilted by 90 degrees: horizontal becomes the slow direction
        assert!((dt2(&m, [0.0, 0.0], [1.0, 0.0]) - 3.0).abs() < 1e-9);
        assert!((dt2(&m, [0.0, 0.0], [0.0, 1.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tilted_elliptical_3d() {
        let mut m = CellModel::new(CellLaw::TiltedElliptical, 2);
        m.fill(CellParameter::Slowness, 2.0).unwrap();
        m.set(CellParameter::TiltAngle, &[0.7, -1.1]).unwrap();
        let a = Point3::new([0.1, 0.2, -0.3]);
        let b = Point3::new([1.4, -0.9, 0.8]);
        for cell in 0..2 {
            assert!((m.compute_dt(&a, &b, cell) - 2.0 * a.distance(&b)).abs() < 1e-12);
        }

        m.fill(CellParameter::Xi, 3.0).unwrap();
        m.fill(CellParameter::TiltAngle, std::f64::consts::FRAC_PI_2)
            .unwrap();
        let o = Point3::new([0.0, 0.0, 0.0]);
        // the y axis is the rotation axis and keeps the plain slowness
        assert!((m.compute_dt(&o, &Point3::new([0.0, 1.0, 0.0]), 0) - 2.0).abs() < 1e-9);
        // x becomes the slow direction, z the fast one
        assert!((m.compute_dt(&o, &Point3::new([1.0, 0.0, 0.0]), 0) - 6.0).abs() < 1e-9);
        assert!((m.compute_dt(&o, &Point3::new([0.0, 0.0, 1.0]), 0) - 2.0).abs() < 1e-9);
        // mixed offset: sqrt(ly^2 + xi^2 lx^2 + lz^2)
        let dt = m.compute_dt(&o, &Point3::new([1.0, 2.0, 2.0]), 0);
        assert!((dt - 2.0 * 17.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn vti_cross_parameter_constraints() {
        let mut m = CellModel::new(CellLaw::VtiPsv, 3);
        assert!(m.validate().is_ok());
        m.set(CellParameter::Vs0, &[0.5, 1.0, 0.5]).unwrap();
        assert!(matches!(
            m.validate(),
            Err(RaytraceError::InvalidCellParameters { cell: 1, .. })
        ));
        m.fill(CellParameter::Vs0, 0.5).unwrap();
        m.set(CellParameter::Epsilon, &[0.0, 0.0, -0.5]).unwrap();
        assert!(matches!(
            m.validate(),
            Err(RaytraceError::InvalidCellParameters { cell: 2, .. })
        ));

        let mut sh = CellModel::new(CellLaw::VtiSh, 2);
        assert!(sh.validate().is_ok());
        sh.set(CellParameter::Gamma, &[-0.6, 0.1]).unwrap();
        assert!(matches!(
            sh.validate(),
            Err(RaytraceError::InvalidCellParameters { cell: 0, .. })
        ));
        assert!(CellModel::new(CellLaw::Elliptical, 2).validate().is_ok());
    }

    #[test]
    fn vti_sh_with_zero_gamma_is_isotropic() {
        let mut m = CellModel::new(CellLaw::VtiSh, 1);
        m.fill(CellParameter::Vs0, 2.0).unwrap();
        let a = Point3::new([0.0, 0.0, 0.0]);
        let b = Point3::new([1.0, 2.0, 2.0]);
        assert!((m.compute_dt(&a, &b, 0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn vti_sh_horizontal_velocity() {
        let mut m = CellModel::new(CellLaw::VtiSh, 1);
        m.fill(CellParameter::Gamma, 0.5).unwrap();
        // v(90 deg) = Vs0 * sqrt(1 + 2 gamma)
        let dt = dt2(&m, [0.0, 0.0], [2.0, 0.0]);
        assert!((dt - 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn vti_psv_without_anisotropy_gives_reference_velocities() {
        let mut m = CellModel::new(CellLaw::VtiPsv, 1);
        m.fill(CellParameter::Vp0, 4.0).unwrap();
        m.fill(CellParameter::Vs0, 2.0).unwrap();
        let (a, b) = ([0.0, 0.0], [3.0, 4.0]);
        assert!((dt2(&m, a, b) - 5.0 / 4.0).abs() < 1e-12);
        m.set_phase(2).unwrap();
        assert!((dt2(&m, a, b) - 5.0 / 2.0).abs() < 1e-12);
        m.set_phase(1).unwrap();
        assert!((dt2(&m, a, b) - 5.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn vti_psv_horizontal_p_velocity_uses_epsilon() {
        let mut m = CellModel::new(CellLaw::VtiPsv, 1);
        m.fill(CellParameter::Vp0, 2.0).unwrap();
        m.fill(CellParameter::Vs0, 1.0).unwrap();
        m.fill(CellParameter::Epsilon, 0.2).unwrap();
        m.fill(CellParameter::Delta, 0.1).unwrap();
        // at theta = 90 deg, Vp = Vp0 * sqrt(1 + 2 epsilon)
        let dt = dt2(&m, [0.0, 0.0], [1.0, 0.0]);
        assert!((dt - 1.0 / (2.0 * 1.4_f64.sqrt())).abs() < 1e-12);
        // along the axis, Vp = Vp0 whatever the anisotropy
        let dt = dt2(&m, [0.0, 0.0], [0.0, 1.0]);
        assert!((dt - 0.5).abs() < 1e-12);
    }

    #[test]
    fn size_mismatch_leaves_values_untouched() {
        let mut m = CellModel::new(CellLaw::Elliptical, 3);
        m.set(CellParameter::Xi, &[2.0, 3.0, 4.0]).unwrap();
        let err = m.set(CellParameter::Xi, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            RaytraceError::SizeMismatch {
                parameter: "xi",
                expected: 3,
                got: 2
            }
        ));
        assert_eq!(m.get(CellParameter::Xi).unwrap(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn invalid_value_leaves_values_untouched() {
        let mut m = CellModel::new(CellLaw::Isotropic, 2);
        let err = m.set(CellParameter::Slowness, &[1.0, -1.0]).unwrap_err();
        assert!(matches!(err, RaytraceError::InvalidSlowness { index: 1, .. }));
        assert_eq!(m.get(CellParameter::Slowness).unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn unsupported_parameter_is_rejected() {
        let mut m = CellModel::new(CellLaw::Isotropic, 2);
        assert!(matches!(
            m.set(CellParameter::Gamma, &[0.0, 0.0]),
            Err(RaytraceError::UnsupportedParameter { .. })
        ));
        assert!(matches!(
            m.set_phase(1),
            Err(RaytraceError::UnsupportedParameter { .. })
        ));
        assert!(m.get(CellParameter::Vp0).is_none());
    }
}
