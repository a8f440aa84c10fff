//! Axis-aligned bounding box used for epsilon scaling and slice placement

use cgmath::{InnerSpace, Vector3, Zero};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: [f64; 3],
    /// Maximum corner of the bounding box
    pub max: [f64; 3],
}

impl Aabb {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Create AABB from a set of points; an empty set yields a zero box
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let Some(first) = points.first() else {
            return Self::new([0.0; 3], [0.0; 3]);
        };

        let mut min = *first;
        let mut max = *first;
        for point in points.iter().skip(1) {
            for axis in 0..3 {
                min[axis] = min[axis].min(point[axis]);
                max[axis] = max[axis].max(point[axis]);
            }
        }

        Self::new(min, max)
    }

    pub fn min_corner(&self) -> Vector3<f64> {
        Vector3::new(self.min[0], self.min[1], self.min[2])
    }

    pub fn max_corner(&self) -> Vector3<f64> {
        Vector3::new(self.max[0], self.max[1], self.max[2])
    }

    pub fn center(&self) -> Vector3<f64> {
        (self.min_corner() + self.max_corner()) * 0.5
    }

    /// Length of the box diagonal
    pub fn diagonal(&self) -> f64 {
        (self.max_corner() - self.min_corner()).magnitude()
    }

    /// Range of `dot(corner, normal)` over the eight corners
    pub fn extent_along(&self, normal: Vector3<f64>) -> (f64, f64) {
        if normal.is_zero() {
            return (0.0, 0.0);
        }
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for corner in 0..8 {
            let p = Vector3::new(
                if corner & 1 == 0 { self.min[0] } else { self.max[0] },
                if corner & 2 == 0 { self.min[1] } else { self.max[1] },
                if corner & 4 == 0 { self.min[2] } else { self.max[2] },
            );
            let d = p.dot(normal);
            lo = lo.min(d);
            hi = hi.max(d);
        }
        (lo, hi)
    }

    /// Whether `point` lies inside the box, widened by `tolerance` on every side
    pub fn contains(&self, point: Vector3<f64>, tolerance: f64) -> bool {
        (0..3).all(|axis| {
            point[axis] >= self.min[axis] - tolerance && point[axis] <= self.max[axis] + tolerance
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_creation() {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [-1.0, -1.0, -1.0]];
        let aabb = Aabb::from_points(&points);

        assert_eq!(aabb.min, [-1.0, -1.0, -1.0]);
        assert_eq!(aabb.max, [1.0, 1.0, 1.0]);
        assert!((aabb.diagonal() - 12f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_extent_along_diagonal_normal() {
        let aabb = Aabb::new([0.0; 3], [1.0; 3]);
        let n = Vector3::new(1.0, 1.0, 1.0).normalize();
        let (lo, hi) = aabb.extent_along(n);
        assert!(lo.abs() < 1e-12);
        assert!((hi - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_points() {
        let aabb = Aabb::from_points(&[]);
        assert_eq!(aabb.diagonal(), 0.0);
    }
}
