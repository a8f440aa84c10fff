//! # Mesh Model
//!
//! In-memory representation of a source mesh as handed over by an ingestion
//! adapter: an ordered point list, an ordered cell list and named scalar
//! arrays attached to points or cells.
//!
//! ## Invariants
//!
//! A [`Mesh`] can only be built through [`Mesh::new`] and the `with_*_array`
//! builders, which check that
//!
//! - every cell index is below the point count,
//! - every cell has the arity its [`CellType`] requires,
//! - every point array has one tuple per point and every cell array one
//!   tuple per cell.
//!
//! The [`MeshKind`] is resolved once at construction and dispatched on by
//! the surface extractor.
//!
//! ## Usage
//!
//! ```rust
//! use geoslice::mesh::{Cell, CellType, Mesh, ScalarArray};
//!
//! let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
//! let cells = vec![Cell::new(CellType::Triangle, vec![0, 1, 2])];
//! let mesh = Mesh::new(points, cells)
//!     .unwrap()
//!     .with_point_array(ScalarArray::scalars("Height", vec![0.0, 1.0, 2.0]))
//!     .unwrap();
//! assert_eq!(mesh.triangle_like_cells(), 1);
//! ```

pub mod bounds;
pub mod loader;
pub mod primitives;

pub use bounds::Aabb;
pub use loader::{MeshLoader, MeshSource, ObjLoader};

use crate::error::{PipelineError, Result};
use cgmath::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell shapes understood by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Vertex,
    Line,
    Triangle,
    Quad,
    Polygon,
    Tetra,
    Pyramid,
    Wedge,
    Hexahedron,
}

// Local face tables, VTK ordering (outward facing for positively oriented cells)
const TETRA_FACES: &[&[usize]] = &[&[0, 1, 3], &[1, 2, 3], &[2, 0, 3], &[0, 2, 1]];
const PYRAMID_FACES: &[&[usize]] = &[&[0, 3, 2, 1], &[0, 1, 4], &[1, 2, 4], &[2, 3, 4], &[3, 0, 4]];
const WEDGE_FACES: &[&[usize]] = &[&[0, 1, 2], &[3, 5, 4], &[0, 3, 4, 1], &[1, 4, 5, 2], &[2, 5, 3, 0]];
const HEXAHEDRON_FACES: &[&[usize]] = &[
    &[0, 4, 7, 3],
    &[1, 2, 6, 5],
    &[0, 1, 5, 4],
    &[3, 7, 6, 2],
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
];

impl CellType {
    /// Topological dimension of the cell
    pub fn dimension(&self) -> u8 {
        match self {
            CellType::Vertex => 0,
            CellType::Line => 1,
            CellType::Triangle | CellType::Quad | CellType::Polygon => 2,
            CellType::Tetra | CellType::Pyramid | CellType::Wedge | CellType::Hexahedron => 3,
        }
    }

    /// Whether a cell of this type with `count` indices is well formed
    pub fn accepts_arity(&self, count: usize) -> bool {
        match self {
            CellType::Vertex => count == 1,
            CellType::Line => count == 2,
            CellType::Triangle => count == 3,
            CellType::Quad => count == 4,
            CellType::Polygon => count >= 3,
            CellType::Tetra => count == 4,
            CellType::Pyramid => count == 5,
            CellType::Wedge => count == 6,
            CellType::Hexahedron => count == 8,
        }
    }

    /// Local face table for volumetric cells, empty otherwise
    pub fn face_table(&self) -> &'static [&'static [usize]] {
        match self {
            CellType::Tetra => TETRA_FACES,
            CellType::Pyramid => PYRAMID_FACES,
            CellType::Wedge => WEDGE_FACES,
            CellType::Hexahedron => HEXAHEDRON_FACES,
            _ => &[],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CellType::Vertex => "vertex",
            CellType::Line => "line",
            CellType::Triangle => "triangle",
            CellType::Quad => "quad",
            CellType::Polygon => "polygon",
            CellType::Tetra => "tetra",
            CellType::Pyramid => "pyramid",
            CellType::Wedge => "wedge",
            CellType::Hexahedron => "hexahedron",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell: a type tag and its point indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    pub vertex_indices: Vec<u32>,
}

impl Cell {
    pub fn new(cell_type: CellType, vertex_indices: Vec<u32>) -> Self {
        Self {
            cell_type,
            vertex_indices,
        }
    }

    /// Faces of a volumetric cell in global point indices
    pub fn faces(&self) -> impl Iterator<Item = Vec<u32>> + '_ {
        self.cell_type
            .face_table()
            .iter()
            .map(move |face| face.iter().map(|&local| self.vertex_indices[local]).collect())
    }
}

/// Mesh classification, resolved once when the mesh is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshKind {
    /// Points only (or 0-D/1-D cells); nothing to triangulate
    PointCloud,
    /// Highest cell dimension is 2
    SurfaceMesh,
    /// At least one volumetric cell
    VolumeMesh,
}

/// Which entity a scalar array is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayDomain {
    Point,
    Cell,
}

impl ArrayDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrayDomain::Point => "point",
            ArrayDomain::Cell => "cell",
        }
    }
}

impl fmt::Display for ArrayDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named array of scalars or small fixed-width vectors, one tuple per entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarArray {
    pub name: String,
    /// Components per tuple (1 for plain scalars)
    pub components: usize,
    /// Tuples stored contiguously
    pub values: Vec<f64>,
}

impl ScalarArray {
    /// Single-component array
    pub fn scalars(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            components: 1,
            values,
        }
    }

    /// Multi-component array, `values.len()` must be a multiple of `components`
    pub fn vectors(name: impl Into<String>, components: usize, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            components,
            values,
        }
    }

    /// Number of tuples
    pub fn len(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.values.len() / self.components
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scalar view of tuple `index`: the value itself, or the Euclidean
    /// magnitude for vector arrays
    pub fn scalar(&self, index: usize) -> f64 {
        if self.components == 1 {
            return self.values[index];
        }
        let start = index * self.components;
        self.values[start..start + self.components]
            .iter()
            .map(|c| c * c)
            .sum::<f64>()
            .sqrt()
    }

    /// `(min, max)` over the scalar view, `None` when empty or all non-finite
    pub fn range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for i in 0..self.len() {
            let value = self.scalar(i);
            if !value.is_finite() {
                continue;
            }
            range = Some(match range {
                Some((lo, hi)) => (lo.min(value), hi.max(value)),
                None => (value, value),
            });
        }
        range
    }

    fn info(&self) -> ArrayInfo {
        ArrayInfo {
            name: self.name.clone(),
            length: self.len(),
            component_count: self.components,
        }
    }
}

/// Array description exposed by ingestion adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayInfo {
    pub name: String,
    pub length: usize,
    pub component_count: usize,
}

/// Validated source mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    points: Vec<[f64; 3]>,
    cells: Vec<Cell>,
    point_arrays: Vec<ScalarArray>,
    cell_arrays: Vec<ScalarArray>,
    kind: MeshKind,
}

impl Mesh {
    /// Builds a mesh, rejecting out-of-range indices and malformed cells
    pub fn new(points: Vec<[f64; 3]>, cells: Vec<Cell>) -> Result<Self> {
        let kind = Self::classify(&cells);
        let mesh = Self {
            points,
            cells,
            point_arrays: Vec::new(),
            cell_arrays: Vec::new(),
            kind,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Checks cell arity, index bounds, finite coordinates and array lengths
    pub fn validate(&self) -> Result<()> {
        let point_count = self.points.len();
        for (cell_index, cell) in self.cells.iter().enumerate() {
            if !cell.cell_type.accepts_arity(cell.vertex_indices.len()) {
                return Err(PipelineError::Format(format!(
                    "cell {} is a {} with {} indices",
                    cell_index,
                    cell.cell_type,
                    cell.vertex_indices.len()
                )));
            }
            if let Some(&bad) = cell
                .vertex_indices
                .iter()
                .find(|&&index| index as usize >= point_count)
            {
                return Err(PipelineError::Format(format!(
                    "cell {} references point {} but mesh has {} points",
                    cell_index, bad, point_count
                )));
            }
        }
        if self.points.iter().flatten().any(|c| !c.is_finite()) {
            return Err(PipelineError::Format("non-finite point coordinate".into()));
        }
        for domain in [ArrayDomain::Point, ArrayDomain::Cell] {
            let expected = self.domain_len(domain);
            if let Some(array) = self.arrays(domain).iter().find(|a| a.len() != expected) {
                return Err(PipelineError::Format(format!(
                    "{} array '{}' has {} tuples, expected {}",
                    domain,
                    array.name,
                    array.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    fn domain_len(&self, domain: ArrayDomain) -> usize {
        match domain {
            ArrayDomain::Point => self.points.len(),
            ArrayDomain::Cell => self.cells.len(),
        }
    }

    fn classify(cells: &[Cell]) -> MeshKind {
        let max_dimension = cells
            .iter()
            .map(|c| c.cell_type.dimension())
            .max()
            .unwrap_or(0);
        match max_dimension {
            3 => MeshKind::VolumeMesh,
            2 => MeshKind::SurfaceMesh,
            _ => MeshKind::PointCloud,
        }
    }

    /// Attaches (or replaces) a point array
    pub fn with_point_array(mut self, array: ScalarArray) -> Result<Self> {
        self.set_array(ArrayDomain::Point, array)?;
        Ok(self)
    }

    /// Attaches (or replaces) a cell array
    pub fn with_cell_array(mut self, array: ScalarArray) -> Result<Self> {
        self.set_array(ArrayDomain::Cell, array)?;
        Ok(self)
    }

    /// Attaches (or replaces) an array in `domain`, keeping insertion order
    pub fn set_array(&mut self, domain: ArrayDomain, array: ScalarArray) -> Result<()> {
        let expected = self.domain_len(domain);
        if array.components == 0 || array.values.len() % array.components != 0 {
            return Err(PipelineError::Format(format!(
                "array '{}' has {} values for {} components",
                array.name,
                array.values.len(),
                array.components
            )));
        }
        if array.len() != expected {
            return Err(PipelineError::Format(format!(
                "{} array '{}' has {} tuples, expected {}",
                domain,
                array.name,
                array.len(),
                expected
            )));
        }

        let arrays = match domain {
            ArrayDomain::Point => &mut self.point_arrays,
            ArrayDomain::Cell => &mut self.cell_arrays,
        };
        match arrays.iter_mut().find(|a| a.name == array.name) {
            Some(existing) => *existing = array,
            None => arrays.push(array),
        }
        Ok(())
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Vector3<f64> {
        let [x, y, z] = self.points[index];
        Vector3::new(x, y, z)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of 2-D cells (triangles, quads, polygons)
    pub fn triangle_like_cells(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.cell_type.dimension() == 2)
            .count()
    }

    pub fn arrays(&self, domain: ArrayDomain) -> &[ScalarArray] {
        match domain {
            ArrayDomain::Point => &self.point_arrays,
            ArrayDomain::Cell => &self.cell_arrays,
        }
    }

    pub fn array(&self, domain: ArrayDomain, name: &str) -> Option<&ScalarArray> {
        self.arrays(domain).iter().find(|a| a.name == name)
    }

    /// Enumerates `{name, length, componentCount}` for one domain
    pub fn array_infos(&self, domain: ArrayDomain) -> Vec<ArrayInfo> {
        self.arrays(domain).iter().map(ScalarArray::info).collect()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        Mesh::new(points, vec![Cell::new(CellType::Triangle, vec![0, 1, 2])]).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let result = Mesh::new(points, vec![Cell::new(CellType::Line, vec![0, 2])]);
        assert!(matches!(result, Err(PipelineError::Format(_))));
    }

    #[test]
    fn test_rejects_bad_arity() {
        let points = vec![[0.0; 3]; 4];
        let result = Mesh::new(points, vec![Cell::new(CellType::Tetra, vec![0, 1, 2])]);
        assert!(matches!(result, Err(PipelineError::Format(_))));
    }

    #[test]
    fn test_array_length_must_match_domain() {
        let result = triangle().with_point_array(ScalarArray::scalars("t", vec![1.0, 2.0]));
        assert!(result.is_err());

        let mesh = triangle()
            .with_cell_array(ScalarArray::scalars("p", vec![5.0]))
            .unwrap();
        assert_eq!(mesh.array_infos(ArrayDomain::Cell)[0].length, 1);
    }

    #[test]
    fn test_kind_resolution() {
        assert_eq!(triangle().kind(), MeshKind::SurfaceMesh);

        let cloud = Mesh::new(vec![[0.0; 3]], vec![]).unwrap();
        assert_eq!(cloud.kind(), MeshKind::PointCloud);

        let tet = Mesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            vec![Cell::new(CellType::Tetra, vec![0, 1, 2, 3])],
        )
        .unwrap();
        assert_eq!(tet.kind(), MeshKind::VolumeMesh);
        assert_eq!(tet.cells()[0].faces().count(), 4);
    }

    #[test]
    fn test_vector_array_scalar_is_magnitude() {
        let array = ScalarArray::vectors("v", 3, vec![3.0, 4.0, 0.0, 0.0, 0.0, 2.0]);
        assert_eq!(array.len(), 2);
        assert_eq!(array.scalar(0), 5.0);
        assert_eq!(array.range(), Some((2.0, 5.0)));
    }

    #[test]
    fn test_set_array_replaces_by_name() {
        let mut mesh = triangle();
        mesh.set_array(ArrayDomain::Point, ScalarArray::scalars("a", vec![0.0; 3]))
            .unwrap();
        mesh.set_array(ArrayDomain::Point, ScalarArray::scalars("a", vec![1.0; 3]))
            .unwrap();
        assert_eq!(mesh.arrays(ArrayDomain::Point).len(), 1);
        assert_eq!(mesh.array(ArrayDomain::Point, "a").unwrap().values[0], 1.0);
    }
}
