//! Slice planes and parallel plane sets

use crate::error::{PipelineError, Result};
use crate::mesh::Aabb;
use cgmath::{InnerSpace, Vector3};
use serde::{Deserialize, Serialize};

/// Oriented plane `dot(p, normal) = offset` with a unit normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicePlane {
    normal: Vector3<f64>,
    offset: f64,
}

impl SlicePlane {
    /// Builds the plane `dot(p, normal) = offset`
    ///
    /// The normal is normalized and the offset scaled with it, so the
    /// described plane is unchanged. A zero-length or non-finite normal is
    /// rejected with `INVALID_PLANE`.
    pub fn new(normal: Vector3<f64>, offset: f64) -> Result<Self> {
        let length = normal.magnitude();
        if !length.is_finite() || length <= f64::EPSILON {
            return Err(PipelineError::InvalidPlane(format!(
                "normal ({}, {}, {}) has no direction",
                normal.x, normal.y, normal.z
            )));
        }
        if !offset.is_finite() {
            return Err(PipelineError::InvalidPlane(format!("offset {} is not finite", offset)));
        }
        Ok(Self {
            normal: normal / length,
            offset: offset / length,
        })
    }

    /// Plane through `point` perpendicular to `normal`
    pub fn through_point(normal: Vector3<f64>, point: Vector3<f64>) -> Result<Self> {
        let plane = Self::new(normal, 0.0)?;
        Ok(Self {
            offset: point.dot(plane.normal),
            ..plane
        })
    }

    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance of `point` from the plane
    #[inline]
    pub fn signed_distance(&self, point: Vector3<f64>) -> f64 {
        point.dot(self.normal) - self.offset
    }

    /// Whether the plane misses `bounds` by more than `tolerance`
    pub fn misses(&self, bounds: &Aabb, tolerance: f64) -> bool {
        let (lo, hi) = bounds.extent_along(self.normal);
        self.offset < lo - tolerance || self.offset > hi + tolerance
    }
}

/// Direction planes of a set are perpendicular to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceAxis {
    X,
    Y,
    Z,
    /// Arbitrary direction, normalized when the set is built
    Normal([f64; 3]),
}

impl Default for SliceAxis {
    fn default() -> Self {
        SliceAxis::X
    }
}

impl SliceAxis {
    /// Unit direction of the axis
    pub fn direction(&self) -> Result<Vector3<f64>> {
        match *self {
            SliceAxis::X => Ok(Vector3::unit_x()),
            SliceAxis::Y => Ok(Vector3::unit_y()),
            SliceAxis::Z => Ok(Vector3::unit_z()),
            SliceAxis::Normal([x, y, z]) => {
                SlicePlane::new(Vector3::new(x, y, z), 0.0).map(|p| p.normal())
            }
        }
    }
}

/// Ordered set of parallel slice planes
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSet {
    planes: Vec<SlicePlane>,
}

impl SliceSet {
    /// Largest number of planes in one set
    pub const MAX_PLANES: usize = 10;

    pub fn single(plane: SlicePlane) -> Self {
        Self {
            planes: vec![plane],
        }
    }

    /// `count` planes perpendicular to `axis` at `base + i * spacing`
    ///
    /// `count` is 1 for a single slice or 2..=10 for a multi-slice; a
    /// multi-slice needs a positive spacing.
    pub fn from_axis(axis: SliceAxis, base: f64, spacing: f64, count: usize) -> Result<Self> {
        let direction = axis.direction()?;
        if count == 0 || count > Self::MAX_PLANES {
            return Err(PipelineError::InvalidParameter(format!(
                "slice count {} outside 1..={}",
                count,
                Self::MAX_PLANES
            )));
        }
        if !base.is_finite() {
            return Err(PipelineError::InvalidParameter(format!(
                "slice position {} is not finite",
                base
            )));
        }
        if count > 1 && !(spacing.is_finite() && spacing > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "slice spacing {} must be positive for {} planes",
                spacing, count
            )));
        }

        let planes = (0..count)
            .map(|i| SlicePlane::new(direction, base + i as f64 * spacing))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { planes })
    }

    /// `count` planes evenly spread strictly inside `bounds` along `axis`
    pub fn spanning(axis: SliceAxis, bounds: &Aabb, count: usize) -> Result<Self> {
        let direction = axis.direction()?;
        let (lo, hi) = bounds.extent_along(direction);
        let count = count.max(1);
        let spacing = (hi - lo) / (count + 1) as f64;
        if count > 1 && spacing <= 0.0 {
            return Err(PipelineError::InvalidParameter(
                "bounds have no extent along the slice axis".into(),
            ));
        }
        Self::from_axis(axis, lo + spacing, spacing, count)
    }

    pub fn planes(&self) -> &[SlicePlane] {
        &self.planes
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_normal_is_normalized_with_offset() {
        let plane = SlicePlane::new(Vector3::new(2.0, 0.0, 0.0), 1.0).unwrap();
        assert_eq!(plane.normal(), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(plane.offset(), 0.5);
        assert_eq!(plane.signed_distance(Vector3::new(0.5, 3.0, -1.0)), 0.0);
    }

    #[test]
    fn test_zero_normal_rejected() {
        let err = SlicePlane::new(Vector3::new(0.0, 0.0, 0.0), 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPlane);

        let err = SliceSet::from_axis(SliceAxis::Normal([0.0; 3]), 0.0, 0.1, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPlane);
    }

    #[test]
    fn test_from_axis_offsets() {
        let set = SliceSet::from_axis(SliceAxis::Z, 0.1, 0.2, 5).unwrap();
        let offsets: Vec<f64> = set.planes().iter().map(|p| p.offset()).collect();
        let expected = [0.1, 0.3, 0.5, 0.7, 0.9];
        for (o, e) in offsets.iter().zip(expected) {
            assert!((o - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_count_and_spacing_validation() {
        assert!(SliceSet::from_axis(SliceAxis::X, 0.0, 0.1, 11).is_err());
        assert!(SliceSet::from_axis(SliceAxis::X, 0.0, 0.1, 0).is_err());
        assert!(SliceSet::from_axis(SliceAxis::X, 0.0, 0.0, 3).is_err());
        assert!(SliceSet::from_axis(SliceAxis::X, 0.0, 0.0, 1).is_ok());
    }

    #[test]
    fn test_spanning_is_strictly_inside() {
        let bounds = Aabb::new([0.0; 3], [1.0, 2.0, 3.0]);
        let set = SliceSet::spanning(SliceAxis::Y, &bounds, 3).unwrap();
        let offsets: Vec<f64> = set.planes().iter().map(|p| p.offset()).collect();
        assert_eq!(offsets.len(), 3);
        assert!((offsets[0] - 0.5).abs() < 1e-12);
        assert!((offsets[2] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_misses() {
        let bounds = Aabb::new([0.0; 3], [1.0; 3]);
        let inside = SlicePlane::new(Vector3::unit_x(), 0.5).unwrap();
        let outside = SlicePlane::new(Vector3::unit_x(), 10.0).unwrap();
        assert!(!inside.misses(&bounds, 1e-9));
        assert!(outside.misses(&bounds, 1e-9));
    }
}
