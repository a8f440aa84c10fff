//! # Derived Geometry
//!
//! Triangulated surfaces produced from a [`Mesh`](crate::mesh::Mesh) by the
//! surface extractor, later colored and optionally sliced.
//!
//! ## Usage
//!
//! ```rust
//! use geoslice::geometry::extract_surface;
//! use geoslice::mesh::primitives;
//! use geoslice::performance::Budget;
//!
//! let cube = primitives::unit_cube_tetra().unwrap();
//! let surface = extract_surface(&cube, &mut Budget::unlimited()).unwrap();
//! assert_eq!(surface.triangle_count(), 12);
//! ```

pub mod surface;

pub use surface::extract_surface;

use crate::mesh::Aabb;
use cgmath::Vector3;

/// Triangulated surface ready for coloring, slicing or packaging
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceGeometry {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f64; 3]>,
    /// Triangle indices, three per triangle
    pub triangle_indices: Vec<u32>,
    /// Optional flat RGB per vertex, `3 * vertex_count` entries in `[0, 1]`
    pub colors: Option<Vec<f32>>,
    /// Source mesh point each vertex was copied from
    pub source_points: Vec<u32>,
    /// Source mesh cell each triangle was emitted by
    pub source_cells: Vec<u32>,
}

impl SurfaceGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of vertices in this geometry
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles in this geometry
    pub fn triangle_count(&self) -> usize {
        self.triangle_indices.len() / 3
    }

    pub fn vertex(&self, index: u32) -> Vector3<f64> {
        let [x, y, z] = self.vertices[index as usize];
        Vector3::new(x, y, z)
    }

    /// RGB of one vertex, if colors are attached
    pub fn color(&self, index: u32) -> Option<[f32; 3]> {
        let colors = self.colors.as_ref()?;
        let start = index as usize * 3;
        Some([colors[start], colors[start + 1], colors[start + 2]])
    }

    /// Iterates triangles as index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.triangle_indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }

    /// Returns a copy with colors replaced
    pub fn with_colors(&self, colors: Vec<f32>) -> Self {
        Self {
            colors: Some(colors),
            ..self.clone()
        }
    }
}
