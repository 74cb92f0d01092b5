//! Least-squares ground plane fitting

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use sweepseg_core::{Error, Point3f, Result};

/// Relative determinant below which the slope system is treated as singular.
const SINGULAR_EPS: f64 = 1e-10;

/// A height-field plane z = a·x + b·y + c
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Slope along x
    pub a: f32,
    /// Slope along y
    pub b: f32,
    /// Height at the origin
    pub c: f32,
}

impl Plane {
    pub fn new(a: f32, b: f32, c: f32) -> Self {
        Self { a, b, c }
    }

    /// Level plane at height `z`
    pub fn horizontal(z: f32) -> Self {
        Self::new(0.0, 0.0, z)
    }

    /// Signed vertical offset of `point` above the plane
    #[inline]
    pub fn height_of(&self, point: &Point3f) -> f32 {
        point.z - self.a * point.x - self.b * point.y - self.c
    }

    /// Limit both slopes to `[-max_slope, max_slope]`. The intercept is kept.
    pub fn clamp_slope(self, max_slope: f32) -> Self {
        Self {
            a: self.a.clamp(-max_slope, max_slope),
            b: self.b.clamp(-max_slope, max_slope),
            c: self.c,
        }
    }
}

/// Fits a plane to a set of points.
///
/// Implementations must reject fewer than three points with
/// [`Error::InsufficientSamples`] and singular input with
/// [`Error::DegenerateGeometry`]; the ground estimator treats both as
/// "no evidence here" and moves on.
pub trait PlaneFitter {
    fn fit(&self, points: &[Point3f]) -> Result<Plane>;
}

/// Ordinary least squares on z = a·x + b·y + c.
///
/// Sums are accumulated in f64 around the centroid, which removes `c` from
/// the normal equations and keeps large sensor ranges from eating the
/// precision of the slopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquaresPlaneFitter;

impl LeastSquaresPlaneFitter {
    pub fn new() -> Self {
        Self
    }
}

impl PlaneFitter for LeastSquaresPlaneFitter {
    fn fit(&self, points: &[Point3f]) -> Result<Plane> {
        if points.len() < 3 {
            return Err(Error::InsufficientSamples {
                required: 3,
                found: points.len(),
            });
        }

        let n = points.len() as f64;
        let (mut mx, mut my, mut mz) = (0.0f64, 0.0f64, 0.0f64);
        for p in points {
            mx += p.x as f64;
            my += p.y as f64;
            mz += p.z as f64;
        }
        mx /= n;
        my /= n;
        mz /= n;

        let (mut sxx, mut sxy, mut syy, mut sxz, mut syz) = (0.0f64, 0.0, 0.0, 0.0, 0.0);
        for p in points {
            let dx = p.x as f64 - mx;
            let dy = p.y as f64 - my;
            let dz = p.z as f64 - mz;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
            sxz += dx * dz;
            syz += dy * dz;
        }

        let ata = Matrix2::new(sxx, sxy, sxy, syy);
        let atb = Vector2::new(sxz, syz);

        // Written as negated comparisons so NaN sums fail them
        let trace = sxx + syy;
        let det = ata.determinant();
        if !(trace > 0.0 && trace.is_finite()) || !(det > SINGULAR_EPS * trace * trace) {
            return Err(Error::DegenerateGeometry(format!(
                "{} points span no plane in x/y",
                points.len()
            )));
        }

        let slopes = match ata.cholesky() {
            Some(chol) => chol.solve(&atb),
            None => ata
                .svd(true, true)
                .solve(&atb, SINGULAR_EPS)
                .map_err(|e| Error::DegenerateGeometry(e.to_string()))?,
        };

        let a = slopes.x;
        let b = slopes.y;
        let c = mz - a * mx - b * my;
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(Error::DegenerateGeometry(format!(
                "non-finite plane fitted to {} points",
                points.len()
            )));
        }
        Ok(Plane::new(a as f32, b as f32, c as f32))
    }
}
