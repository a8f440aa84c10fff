//! # Mesh Ingestion
//!
//! Adapters turning files into [`Mesh`] values. Parsing formats is not the
//! pipeline's job; the [`MeshLoader`] trait is the seam where a format
//! adapter plugs in. A Wavefront OBJ adapter backed by `tobj` is bundled.

use super::{primitives, ArrayDomain, Cell, CellType, Mesh, ScalarArray};
use crate::error::{PipelineError, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Ingestion adapter contract: a path in, a validated mesh out
///
/// Failures are `FORMAT_ERROR` for unreadable contents and `IO_ERROR` when
/// the file itself cannot be accessed.
pub trait MeshLoader: Send + Sync {
    fn load_mesh(&self, path: &Path) -> Result<Mesh>;

    /// File extensions (lowercase, without dot) this loader handles
    fn extensions(&self) -> &[&str];
}

/// Where a replacement mesh comes from
#[derive(Debug, Clone)]
pub enum MeshSource {
    Inline(Mesh),
    Path(PathBuf),
    /// The seed sphere regenerated at another resolution
    DefaultSphere { resolution: u32 },
}

impl MeshSource {
    /// Resolves the source into an owned mesh
    pub fn into_mesh(self, loaders: &[Box<dyn MeshLoader>]) -> Result<Mesh> {
        match self {
            MeshSource::Inline(mesh) => Ok(mesh),
            MeshSource::Path(path) => load_with(loaders, &path),
            MeshSource::DefaultSphere { resolution } => {
                debug!("Regenerating the default sphere at resolution {}", resolution);
                primitives::default_mesh_with_resolution(resolution)
            }
        }
    }
}

impl From<Mesh> for MeshSource {
    fn from(mesh: Mesh) -> Self {
        MeshSource::Inline(mesh)
    }
}

/// Loaders registered by default
pub fn default_loaders() -> Vec<Box<dyn MeshLoader>> {
    vec![Box::new(ObjLoader::default())]
}

/// Picks the loader matching the file extension
pub fn load_with(loaders: &[Box<dyn MeshLoader>], path: &Path) -> Result<Mesh> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let loader = loaders
        .iter()
        .find(|l| l.extensions().contains(&extension.as_str()))
        .ok_or_else(|| {
            PipelineError::Format(format!(
                "no mesh loader for '{}' (extension '{}')",
                path.display(),
                extension
            ))
        })?;

    loader.load_mesh(path)
}

/// Wavefront OBJ adapter
///
/// Every model in the file contributes its faces as triangle, quad or
/// polygon cells. Vertex normals, when present, become a three component
/// `Normals` point array and an `Elevation` array along +Y is always added.
#[derive(Debug, Clone, Default)]
pub struct ObjLoader {
    /// Triangulate faces while parsing instead of keeping polygons
    pub triangulate: bool,
}

impl MeshLoader for ObjLoader {
    fn load_mesh(&self, path: &Path) -> Result<Mesh> {
        std::fs::metadata(path).map_err(|e| PipelineError::io(path, e))?;

        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: self.triangulate,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(path, &options)
            .map_err(|e| PipelineError::Format(format!("{}: {}", path.display(), e)))?;

        let mut points: Vec<[f64; 3]> = Vec::new();
        let mut normals: Vec<f64> = Vec::new();
        let mut cells = Vec::new();
        let mut all_have_normals = true;

        for model in &models {
            let mesh = &model.mesh;
            let base = points.len() as u32;
            points.extend(
                mesh.positions
                    .chunks_exact(3)
                    .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64]),
            );

            if mesh.normals.len() == mesh.positions.len() {
                normals.extend(mesh.normals.iter().map(|&n| n as f64));
            } else {
                all_have_normals = false;
            }

            if mesh.face_arities.is_empty() {
                for triangle in mesh.indices.chunks_exact(3) {
                    cells.push(Cell::new(
                        CellType::Triangle,
                        triangle.iter().map(|&i| base + i).collect(),
                    ));
                }
            } else {
                let mut offset = 0usize;
                for &arity in &mesh.face_arities {
                    let arity = arity as usize;
                    let end = offset + arity;
                    let Some(face) = mesh.indices.get(offset..end) else {
                        return Err(PipelineError::Format(format!(
                            "{}: face arities exceed index count in model '{}'",
                            path.display(),
                            model.name
                        )));
                    };
                    let cell_type = match arity {
                        1 => CellType::Vertex,
                        2 => CellType::Line,
                        3 => CellType::Triangle,
                        4 => CellType::Quad,
                        _ => CellType::Polygon,
                    };
                    cells.push(Cell::new(cell_type, face.iter().map(|&i| base + i).collect()));
                    offset = end;
                }
            }
            debug!(
                "OBJ model '{}': {} positions, {} faces",
                model.name,
                mesh.positions.len() / 3,
                mesh.face_arities.len().max(mesh.indices.len() / 3)
            );
        }

        if points.is_empty() {
            return Err(PipelineError::Format(format!(
                "{}: no geometry found",
                path.display()
            )));
        }

        let mut mesh = Mesh::new(points, cells)?;
        if all_have_normals && !normals.is_empty() {
            mesh.set_array(ArrayDomain::Point, ScalarArray::vectors("Normals", 3, normals))?;
        }
        let bounds = mesh.bounds();
        primitives::elevation_filter(
            &mut mesh,
            [0.0, bounds.min[1], 0.0],
            [0.0, bounds.max[1], 0.0],
        )?;

        info!(
            "Loaded {}: {} points, {} cells ({:?})",
            path.display(),
            mesh.point_count(),
            mesh.cell_count(),
            mesh.kind()
        );
        Ok(mesh)
    }

    fn extensions(&self) -> &[&str] {
        &["obj"]
    }
}
