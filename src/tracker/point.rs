//! 3D point representation and distance helpers.
//!
//! Positions are world-space coordinates `(x, y, z)` produced upstream by
//! back-projecting a detection's pixel and depth. The tracker never looks at
//! image space.

use nalgebra::Vector3;
use ndarray::Array2;

use crate::error::{Result, TrackError};

/// A position in world coordinates.
pub type Point3 = Vector3<f64>;

/// Build a `Point3` from a slice, checking that it holds exactly three values.
pub fn point_from_slice(values: &[f64]) -> Result<Point3> {
    if values.len() != 3 {
        return Err(TrackError::InvalidDimension {
            expected: 3,
            got: values.len(),
        });
    }
    Ok(Point3::new(values[0], values[1], values[2]))
}

/// Whether every coordinate is finite.
#[inline]
pub fn is_finite(p: &Point3) -> bool {
    p.iter().all(|v| v.is_finite())
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: &Point3, b: &Point3) -> f64 {
    (a - b).norm()
}

/// Displacement magnitude divided by `dt`.
///
/// A zero step gives zero speed for identical points and infinite speed
/// otherwise, so a velocity gate always rejects a jump that took no time.
pub fn implied_speed(a: &Point3, b: &Point3, dt: f64) -> f64 {
    let d = distance(a, b);
    if dt > 0.0 {
        d / dt
    } else if d == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

/// Calculate the pairwise distance matrix between two point sets.
///
/// Returns a matrix of shape (M, N) where M is the length of `points_a`
/// and N is the length of `points_b`.
pub fn distance_batch(points_a: &[Point3], points_b: &[Point3]) -> Array2<f64> {
    let mut dists = Array2::zeros((points_a.len(), points_b.len()));
    for (i, a) in points_a.iter().enumerate() {
        for (j, b) in points_b.iter().enumerate() {
            dists[[i, j]] = distance(a, b);
        }
    }
    dists
}
