//! # Built-in Meshes
//!
//! Procedural meshes used to seed new sessions and to exercise the pipeline
//! without an external file. All of them come with scalar arrays attached.

use super::{ArrayDomain, Cell, CellType, Mesh, ScalarArray};
use crate::error::{PipelineError, Result};
use cgmath::{InnerSpace, Vector3};
use std::f64::consts::PI;
use std::ops::RangeInclusive;

/// Name of the array written by [`elevation_filter`]
pub const ELEVATION: &str = "Elevation";

/// Theta and phi resolution of the seeded session sphere
pub const DEFAULT_RESOLUTION: u32 = 30;

/// Resolutions accepted when a session regenerates its sphere
pub const SPHERE_RESOLUTIONS: RangeInclusive<u32> = 3..=512;

/// Generate a UV sphere surface centered at the origin
///
/// Poles are single shared points; the caps are triangle fans and every band
/// between two latitude rings is made of quads.
///
/// # Arguments
/// * `radius` - Sphere radius
/// * `theta_resolution` - Points per latitude ring (min 3)
/// * `phi_resolution` - Number of latitude bands from pole to pole (min 3)
pub fn sphere(radius: f64, theta_resolution: u32, phi_resolution: u32) -> Result<Mesh> {
    let ring = theta_resolution.max(3);
    let bands = phi_resolution.max(3);

    let mut points = Vec::with_capacity((ring * (bands - 1) + 2) as usize);
    points.push([0.0, radius, 0.0]);
    for lat in 1..bands {
        let theta = lat as f64 * PI / bands as f64;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for long in 0..ring {
            let phi = long as f64 * 2.0 * PI / ring as f64;
            let (sin_phi, cos_phi) = phi.sin_cos();
            points.push([
                radius * sin_theta * cos_phi,
                radius * cos_theta,
                radius * sin_theta * sin_phi,
            ]);
        }
    }
    points.push([0.0, -radius, 0.0]);

    let north = 0u32;
    let south = (points.len() - 1) as u32;
    let ring_start = |lat: u32| 1 + (lat - 1) * ring;

    let mut cells = Vec::new();
    for long in 0..ring {
        let next = (long + 1) % ring;
        cells.push(Cell::new(
            CellType::Triangle,
            vec![north, ring_start(1) + next, ring_start(1) + long],
        ));
    }
    for lat in 1..bands - 1 {
        let upper = ring_start(lat);
        let lower = ring_start(lat + 1);
        for long in 0..ring {
            let next = (long + 1) % ring;
            cells.push(Cell::new(
                CellType::Quad,
                vec![upper + long, upper + next, lower + next, lower + long],
            ));
        }
    }
    let last = ring_start(bands - 1);
    for long in 0..ring {
        let next = (long + 1) % ring;
        cells.push(Cell::new(
            CellType::Triangle,
            vec![south, last + long, last + next],
        ));
    }

    Mesh::new(points, cells)
}

/// Seed mesh for new sessions: a 30x30 sphere of radius 0.5 colored by
/// elevation along +Y
pub fn default_mesh() -> Result<Mesh> {
    default_mesh_with_resolution(DEFAULT_RESOLUTION)
}

/// The seed sphere rebuilt with `resolution` points per ring and
/// `resolution` latitude bands, with a fresh `Elevation` array
pub fn default_mesh_with_resolution(resolution: u32) -> Result<Mesh> {
    if !SPHERE_RESOLUTIONS.contains(&resolution) {
        return Err(PipelineError::InvalidParameter(format!(
            "sphere resolution {} outside {}..={}",
            resolution,
            SPHERE_RESOLUTIONS.start(),
            SPHERE_RESOLUTIONS.end()
        )));
    }
    let mut mesh = sphere(0.5, resolution, resolution)?;
    elevation_filter(&mut mesh, [0.0, -1.0, 0.0], [0.0, 1.0, 0.0])?;
    Ok(mesh)
}

/// Writes an `Elevation` point array: each point projected onto the segment
/// `low -> high`, expressed as a fraction in `[0, 1]`
pub fn elevation_filter(mesh: &mut Mesh, low: [f64; 3], high: [f64; 3]) -> Result<()> {
    let low = Vector3::new(low[0], low[1], low[2]);
    let axis = Vector3::new(high[0], high[1], high[2]) - low;
    let length2 = axis.magnitude2();

    let values = (0..mesh.point_count())
        .map(|i| {
            if length2 == 0.0 {
                0.0
            } else {
                ((mesh.point(i) - low).dot(axis) / length2).clamp(0.0, 1.0)
            }
        })
        .collect();

    mesh.set_array(ArrayDomain::Point, ScalarArray::scalars(ELEVATION, values))
}

/// Unit cube split into six positively oriented tetrahedra around the
/// diagonal from corner 0 to corner 6
///
/// Carries a `Temperature` point array (20 at the origin corner, 90 at the
/// opposite one) and a `Pressure` cell array, one value per tetrahedron.
pub fn unit_cube_tetra() -> Result<Mesh> {
    let points = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];
    let tets: [[u32; 4]; 6] = [
        [0, 1, 2, 6],
        [0, 2, 3, 6],
        [0, 3, 7, 6],
        [0, 7, 4, 6],
        [0, 4, 5, 6],
        [0, 5, 1, 6],
    ];
    let cells = tets
        .iter()
        .map(|t| Cell::new(CellType::Tetra, t.to_vec()))
        .collect();

    Mesh::new(points, cells)?
        .with_point_array(ScalarArray::scalars(
            "Temperature",
            vec![20.0, 25.0, 30.0, 22.0, 80.0, 85.0, 90.0, 75.0],
        ))?
        .with_cell_array(ScalarArray::scalars(
            "Pressure",
            vec![101320.0, 101325.0, 101330.0, 101335.0, 101330.0, 101325.0],
        ))
}

/// Open triangulated cylinder side of radius 1 along +Z
///
/// Carries a `Height` point array (`z * 50 + r * 30`) and a `HeightAverage`
/// cell array averaging it per triangle.
pub fn cylinder_shell(segments: u32, rings: u32, height: f64) -> Result<Mesh> {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut points = Vec::with_capacity((segments * rings) as usize);
    for k in 0..rings {
        let z = height * k as f64 / (rings - 1) as f64;
        for i in 0..segments {
            let theta = 2.0 * PI * i as f64 / segments as f64;
            points.push([theta.cos(), theta.sin(), z]);
        }
    }

    let mut cells = Vec::new();
    for k in 0..rings - 1 {
        for i in 0..segments {
            let next = (i + 1) % segments;
            let v0 = k * segments + i;
            let v1 = k * segments + next;
            let v2 = (k + 1) * segments + next;
            let v3 = (k + 1) * segments + i;
            cells.push(Cell::new(CellType::Triangle, vec![v0, v1, v2]));
            cells.push(Cell::new(CellType::Triangle, vec![v0, v2, v3]));
        }
    }

    let heights: Vec<f64> = points
        .iter()
        .map(|p| p[2] * 50.0 + (p[0] * p[0] + p[1] * p[1]).sqrt() * 30.0)
        .collect();
    let averages = cells
        .iter()
        .map(|cell| {
            cell.vertex_indices
                .iter()
                .map(|&i| heights[i as usize])
                .sum::<f64>()
                / cell.vertex_indices.len() as f64
        })
        .collect();

    Mesh::new(points, cells)?
        .with_point_array(ScalarArray::scalars("Height", heights))?
        .with_cell_array(ScalarArray::scalars("HeightAverage", averages))
}

/// Structured block of `nx * ny * nz` unit hexahedra starting at the origin
///
/// Carries a `Distance` point array (distance to the block center) and a
/// `CellIndex` cell array.
pub fn structured_block(nx: u32, ny: u32, nz: u32) -> Result<Mesh> {
    let (nx, ny, nz) = (nx.max(1), ny.max(1), nz.max(1));
    let index = |i: u32, j: u32, k: u32| i + j * (nx + 1) + k * (nx + 1) * (ny + 1);

    let mut points = Vec::with_capacity(((nx + 1) * (ny + 1) * (nz + 1)) as usize);
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                points.push([i as f64, j as f64, k as f64]);
            }
        }
    }

    let mut cells = Vec::with_capacity((nx * ny * nz) as usize);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                cells.push(Cell::new(
                    CellType::Hexahedron,
                    vec![
                        index(i, j, k),
                        index(i + 1, j, k),
                        index(i + 1, j + 1, k),
                        index(i, j + 1, k),
                        index(i, j, k + 1),
                        index(i + 1, j, k + 1),
                        index(i + 1, j + 1, k + 1),
                        index(i, j + 1, k + 1),
                    ],
                ));
            }
        }
    }

    let center = Vector3::new(nx as f64, ny as f64, nz as f64) * 0.5;
    let distances = points
        .iter()
        .map(|p| (Vector3::new(p[0], p[1], p[2]) - center).magnitude())
        .collect();
    let cell_ids = (0..cells.len()).map(|i| i as f64).collect();

    Mesh::new(points, cells)?
        .with_point_array(ScalarArray::scalars("Distance", distances))?
        .with_cell_array(ScalarArray::scalars("CellIndex", cell_ids))
}
