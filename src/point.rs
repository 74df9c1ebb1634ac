// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// A point in physical coordinates.
///
/// In 2D the axes are `(x, z)`, in 3D `(x, y, z)`. The last axis is always the
/// vertical one, which is what the anisotropic cell laws measure angles from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point<const N: usize>(pub [f64; N]);

/// 2D point `(x, z)`.
pub type Point2 = Point<2>;
/// 3D point `(x, y, z)`.
pub type Point3 = Point<3>;

impl<const N: usize> Point<N> {
    /// Wrap raw coordinates.
    pub const fn new(coords: [f64; N]) -> Self {
        Point(coords)
    }

    /// Raw coordinates.
    pub fn coords(&self) -> [f64; N] {
        self.0
    }

    /// First horizontal coordinate.
    pub fn x(&self) -> f64 {
        self.0[0]
    }

    /// Vertical coordinate (last axis).
    pub fn z(&self) -> f64 {
        self.0[N - 1]
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point<N>) -> f64 {
        let mut sum = 0.0;
        for d in 0..N {
            let diff = other.0[d] - self.0[d];
            sum += diff * diff;
        }
        sum.sqrt()
    }

    /// Offset vector `other - self`.
    pub fn offset_to(&self, other: &Point<N>) -> [f64; N] {
        let mut out = [0.0; N];
        for d in 0..N {
            out[d] = other.0[d] - self.0[d];
        }
        out
    }

    /// Horizontal and vertical components of the offset `other - self`.
    ///
    /// In 3D the two horizontal components are combined into one planar
    /// distance, which is always non-negative.
    pub fn split_offset(&self, other: &Point<N>) -> (f64, f64) {
        let l = self.offset_to(other);
        let lz = l[N - 1];
        let lh = if N == 2 {
            l[0]
        } else {
            l[..N - 1].iter().map(|v| v * v).sum::<f64>().sqrt()
        };
        (lh, lz)
    }

    /// Point moved by `step` along `direction`.
    pub fn translated(&self, direction: &[f64; N], step: f64) -> Point<N> {
        let mut out = self.0;
        for d in 0..N {
            out[d] += step * direction[d];
        }
        Point(out)
    }

    /// True when every coordinate differs by at most `tol`.
    pub fn coincides(&self, other: &Point<N>, tol: f64) -> bool {
        (0..N).all(|d| (self.0[d] - other.0[d]).abs() <= tol)
    }
}

impl Point<3> {
    /// Second horizontal coordinate.
    pub fn y(&self) -> f64 {
        self.0[1]
    }
}

impl<const N: usize> From<[f64; N]> for Point<N> {
    fn from(coords: [f64; N]) -> Self {
        Point(coords)
    }
}

impl<const N: usize> fmt::Display for Point<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (d, v) in self.0.iter().enumerate() {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_2d() {
        let a = Point2::new([0.0, 0.0]);
        let b = Point2::new([3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!((b.distance(&a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn split_offset_3d_is_planar() {
        let a = Point3::new([1.0, 1.0, 1.0]);
        let b = Point3::new([4.0, 5.0, -1.0]);
        let (lh, lz) = a.split_offset(&b);
        assert!((lh - 5.0).abs() < 1e-12);
        assert!((lz + 2.0).abs() < 1e-12);
    }

    #[test]
    fn split_offset_2d_keeps_sign() {
        let a = Point2::new([2.0, 0.0]);
        let b = Point2::new([0.0, 1.0]);
        let (lh, lz) = a.split_offset(&b);
        assert_eq!(lh, -2.0);
        assert_eq!(lz, 1.0);
    }

    #[test]
    fn accessors() {
        let p = Point3::new([1.0, 2.0, 3.0]);
        assert_eq!(p.x(), 1.0);
        assert_eq!(p.y(), 2.0);
        assert_eq!(p.z(), 3.0);
        assert_eq!(Point2::new([7.0, 8.0]).z(), 8.0);
        assert_eq!(p.to_string(), "(1, 2, 3)");
    }
}
