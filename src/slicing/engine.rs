//! # Plane/Triangle Intersection
//!
//! Each triangle is tested against each plane independently. With signed
//! distances `d0, d1, d2`:
//!
//! - any `|d| < eps` or all distances of one sign: no contribution
//! - otherwise exactly two edges change sign; each crossing edge `a -> b`
//!   yields `p = a + t (b - a)` with `t = da / (da - db)` and the color is
//!   interpolated with the same `t`
//!
//! The two points form one segment. Segments are not stitched: the result
//! is a line soup, concatenated plane after plane.

use super::plane::{SlicePlane, SliceSet};
use crate::error::Result;
use crate::geometry::SurfaceGeometry;
use crate::performance::Budget;
use cgmath::{InnerSpace, Vector3, VectorSpace};
use log::debug;
use std::ops::Range;

const EDGES: [(usize, usize); 3] = [(0, 1), (1, 2), (2, 0)];

/// Cross-section line soup across all planes of a set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SliceGeometry {
    /// Segment end points (x, y, z)
    pub vertices: Vec<[f64; 3]>,
    /// Two indices per segment
    pub segment_indices: Vec<u32>,
    /// Flat RGB per vertex when the input surface was colored
    pub colors: Option<Vec<f32>>,
    /// Segment index range produced by each plane, in plane order
    pub plane_segments: Vec<Range<usize>>,
}

impl SliceGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_indices.len() / 2
    }

    /// End points of segment `index`
    pub fn segment(&self, index: usize) -> ([f64; 3], [f64; 3]) {
        let a = self.segment_indices[index * 2] as usize;
        let b = self.segment_indices[index * 2 + 1] as usize;
        (self.vertices[a], self.vertices[b])
    }

    fn push_point(&mut self, point: Vector3<f64>, color: Option<[f32; 3]>) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push([point.x, point.y, point.z]);
        if let (Some(colors), Some(rgb)) = (self.colors.as_mut(), color) {
            colors.extend_from_slice(&rgb);
        }
        index
    }
}

/// What happened while slicing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SliceReport {
    pub segments_per_plane: Vec<usize>,
    /// Planes skipped because they miss the bounding box
    pub planes_outside: usize,
    /// Absolute distance tolerance used
    pub epsilon: f64,
}

/// Slices a triangulated surface with every plane of `set`
///
/// `epsilon_scale` is relative to the surface bounding-box diagonal. Planes
/// that miss the bounding box contribute nothing and are reported, not
/// rejected.
pub fn slice_surface(
    surface: &SurfaceGeometry,
    set: &SliceSet,
    epsilon_scale: f64,
    budget: &mut Budget,
) -> Result<(SliceGeometry, SliceReport)> {
    let bounds = surface.bounds();
    let epsilon = epsilon_scale * bounds.diagonal();

    let mut output = SliceGeometry {
        colors: surface.colors.as_ref().map(|_| Vec::new()),
        ..Default::default()
    };
    let mut report = SliceReport {
        epsilon,
        ..Default::default()
    };

    for (plane_index, plane) in set.planes().iter().enumerate() {
        let first_segment = output.segment_count();
        if surface.triangle_count() == 0 || plane.misses(&bounds, epsilon) {
            if surface.triangle_count() > 0 {
                report.planes_outside += 1;
                debug!(
                    "Slice plane {} (offset {:.6}) misses the surface bounds",
                    plane_index,
                    plane.offset()
                );
            }
            output.plane_segments.push(first_segment..first_segment);
            report.segments_per_plane.push(0);
            continue;
        }

        for triangle in surface.triangles() {
            budget.charge(1)?;
            slice_triangle(surface, triangle, plane, epsilon, &mut output);
        }

        let produced = output.segment_count() - first_segment;
        output.plane_segments.push(first_segment..output.segment_count());
        report.segments_per_plane.push(produced);
    }

    debug!(
        "Sliced {} triangles with {} planes: {} segments ({} planes outside)",
        surface.triangle_count(),
        set.len(),
        output.segment_count(),
        report.planes_outside
    );
    Ok((output, report))
}

/// Emits at most one segment for `triangle` against `plane`
fn slice_triangle(
    surface: &SurfaceGeometry,
    triangle: [u32; 3],
    plane: &SlicePlane,
    epsilon: f64,
    output: &mut SliceGeometry,
) {
    let corners = triangle.map(|i| surface.vertex(i));
    let distances = corners.map(|p| plane.signed_distance(p));

    if distances.iter().any(|d| d.abs() < epsilon) {
        return;
    }
    let positive = distances.iter().filter(|&&d| d > 0.0).count();
    if positive == 0 || positive == 3 {
        return;
    }

    let mut ends = [0u32; 2];
    let mut found = 0;
    for (a, b) in EDGES {
        let (da, db) = (distances[a], distances[b]);
        if (da > 0.0) == (db > 0.0) {
            continue;
        }
        let t = da / (da - db);
        let point = corners[a].lerp(corners[b], t);
        let color = match (surface.color(triangle[a]), surface.color(triangle[b])) {
            (Some(ca), Some(cb)) => Some(lerp_color(ca, cb, t as f32)),
            _ => None,
        };
        ends[found] = output.push_point(point, color);
        found += 1;
    }

    debug_assert_eq!(found, 2);
    output.segment_indices.extend_from_slice(&ends);
}

fn lerp_color(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + t * (b[0] - a[0]),
        a[1] + t * (b[1] - a[1]),
        a[2] + t * (b[2] - a[2]),
    ]
}

/// Distance of `point` from `plane`, for checking slice output
pub fn plane_residual(plane: &SlicePlane, point: [f64; 3]) -> f64 {
    (Vector3::new(point[0], point[1], point[2]).dot(plane.normal()) - plane.offset()).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{colorize, ArraySelector, ColorOptions};
    use crate::geometry::extract_surface;
    use crate::mesh::{primitives, Cell, CellType, Mesh};
    use crate::slicing::SliceAxis;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn surface_of(mesh: &Mesh) -> SurfaceGeometry {
        extract_surface(mesh, &mut Budget::unlimited()).unwrap()
    }

    fn single_triangle(points: [[f64; 3]; 3]) -> SurfaceGeometry {
        let mesh = Mesh::new(points.to_vec(), vec![Cell::new(CellType::Triangle, vec![0, 1, 2])])
            .unwrap();
        surface_of(&mesh)
    }

    #[test]
    fn test_crossing_triangle_gives_one_segment() {
        let surface = single_triangle([[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]]);
        let set = SliceSet::from_axis(SliceAxis::X, 0.0, 0.0, 1).unwrap();
        let (slice, report) = slice_surface(&surface, &set, 1e-9, &mut Budget::unlimited()).unwrap();

        assert_eq!(slice.segment_count(), 1);
        assert_eq!(report.segments_per_plane, vec![1]);
        let (a, b) = slice.segment(0);
        assert!(a[0].abs() < 1e-12 && b[0].abs() < 1e-12);
    }

    #[test]
    fn test_touching_vertex_is_skipped() {
        let surface = single_triangle([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [-1.0, 1.0, 0.0]]);
        let set = SliceSet::from_axis(SliceAxis::X, 0.0, 0.0, 1).unwrap();
        let (slice, _) = slice_surface(&surface, &set, 1e-9, &mut Budget::unlimited()).unwrap();
        assert_eq!(slice.segment_count(), 0);
    }

    #[test]
    fn test_cube_mid_slice() {
        let surface = surface_of(&primitives::unit_cube_tetra().unwrap());
        let set = SliceSet::from_axis(SliceAxis::X, 0.5, 0.0, 1).unwrap();
        let (slice, report) = slice_surface(&surface, &set, 1e-9, &mut Budget::unlimited()).unwrap();

        assert!(slice.segment_count() > 0);
        assert_eq!(report.planes_outside, 0);
        for p in &slice.vertices {
            assert!((p[0] - 0.5).abs() < 1e-9);
            assert!((0.0..=1.0).contains(&p[1]) && (0.0..=1.0).contains(&p[2]));
        }
    }

    #[test]
    fn test_plane_outside_is_empty() {
        let surface = surface_of(&primitives::unit_cube_tetra().unwrap());
        let set = SliceSet::from_axis(SliceAxis::X, 100.0, 0.0, 1).unwrap();
        let (slice, report) = slice_surface(&surface, &set, 1e-9, &mut Budget::unlimited()).unwrap();
        assert_eq!(slice.segment_count(), 0);
        assert_eq!(slice.vertex_count(), 0);
        assert_eq!(report.planes_outside, 1);
    }

    #[test]
    fn test_colors_are_interpolated() {
        let mesh = primitives::unit_cube_tetra().unwrap();
        let surface = surface_of(&mesh);
        let colors = colorize(
            &mesh,
            &surface,
            Some(&ArraySelector::point("Temperature")),
            &ColorOptions::default(),
        )
        .unwrap();
        let colored = surface.with_colors(colors);
        let set = SliceSet::from_axis(SliceAxis::Z, 0.5, 0.0, 1).unwrap();
        let (slice, _) = slice_surface(&colored, &set, 1e-9, &mut Budget::unlimited()).unwrap();

        let slice_colors = slice.colors.unwrap();
        assert_eq!(slice_colors.len(), slice.vertices.len() * 3);
        assert!(slice_colors.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn test_multi_plane_groups() {
        // 5 units tall so no plane passes through a grid layer
        let surface = surface_of(&primitives::structured_block(4, 4, 5).unwrap());
        let set = SliceSet::spanning(SliceAxis::Z, &surface.bounds(), 5).unwrap();
        let (slice, report) = slice_surface(&surface, &set, 1e-9, &mut Budget::unlimited()).unwrap();

        assert_eq!(slice.plane_segments.len(), 5);
        assert!(report.segments_per_plane.iter().all(|&n| n > 0));
        for (plane, range) in set.planes().iter().zip(&slice.plane_segments) {
            for s in range.clone() {
                let (a, b) = slice.segment(s);
                assert!(plane_residual(plane, a) < report.epsilon);
                assert!(plane_residual(plane, b) < report.epsilon);
            }
        }
    }

    #[test]
    fn test_random_planes_stay_on_plane() {
        let surface = surface_of(&primitives::sphere(1.0, 24, 16).unwrap());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let normal = Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let Ok(plane) = SlicePlane::new(normal, rng.random_range(-1.2..1.2)) else {
                continue;
            };
            let set = SliceSet::single(plane);
            let (slice, report) =
                slice_surface(&surface, &set, 1e-9, &mut Budget::unlimited()).unwrap();
            for p in &slice.vertices {
                assert!(plane_residual(&plane, *p) < report.epsilon);
            }
        }
    }
}
