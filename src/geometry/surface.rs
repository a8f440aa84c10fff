//! # Surface Extraction
//!
//! Reduces a mesh to its triangulated outer surface.
//!
//! Volumetric cells contribute only the faces that are not shared by exactly
//! two cells. Sharing is detected in a single pass through a hash map keyed by
//! the sorted vertex indices of each face, so the cost is linear in the
//! number of cell faces. Polygonal faces are fan-triangulated from their
//! first vertex.
//!
//! Output order is fully determined by cell order: faces are emitted in the
//! order their first owning cell appears, and output vertices are numbered in
//! order of first use. Running the extractor twice yields identical buffers.

use super::SurfaceGeometry;
use crate::error::Result;
use crate::mesh::{Mesh, MeshKind};
use crate::performance::Budget;
use log::debug;
use std::collections::HashMap;

const UNMAPPED: u32 = u32::MAX;

/// Order-independent identity of a face with up to four vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceKey([u32; 4]);

impl FaceKey {
    fn new(face: &[u32]) -> Self {
        debug_assert!(face.len() <= 4, "cell faces have at most four vertices");
        let mut ids = [UNMAPPED; 4];
        ids[..face.len()].copy_from_slice(face);
        ids.sort_unstable();
        Self(ids)
    }
}

/// Incrementally assembles the output surface, compacting vertex indices
struct SurfaceBuilder<'a> {
    mesh: &'a Mesh,
    remap: Vec<u32>,
    out: SurfaceGeometry,
}

impl<'a> SurfaceBuilder<'a> {
    fn new(mesh: &'a Mesh) -> Self {
        Self {
            mesh,
            remap: vec![UNMAPPED; mesh.point_count()],
            out: SurfaceGeometry::new(),
        }
    }

    fn map_point(&mut self, point: u32) -> u32 {
        let slot = &mut self.remap[point as usize];
        if *slot == UNMAPPED {
            *slot = self.out.vertices.len() as u32;
            self.out.vertices.push(self.mesh.points()[point as usize]);
            self.out.source_points.push(point);
        }
        *slot
    }

    /// Fan triangulation from the first vertex; collapsed triangles are dropped
    fn emit_polygon(&mut self, polygon: &[u32], cell: u32) {
        if polygon.len() < 3 {
            return;
        }
        let apex = polygon[0];
        for pair in polygon[1..].windows(2) {
            let (b, c) = (pair[0], pair[1]);
            if apex == b || b == c || apex == c {
                continue;
            }
            let triangle = [self.map_point(apex), self.map_point(b), self.map_point(c)];
            self.out.triangle_indices.extend_from_slice(&triangle);
            self.out.source_cells.push(cell);
        }
    }

    fn finish(self) -> SurfaceGeometry {
        self.out
    }
}

/// Extracts the triangulated boundary surface of `mesh`
///
/// - `PointCloud`: every point is kept, no triangles are produced
/// - `SurfaceMesh`: 2-D cells pass through, triangulated
/// - `VolumeMesh`: boundary faces of 3-D cells plus any 2-D cells
///
/// 0-D and 1-D cells never produce surface.
pub fn extract_surface(mesh: &Mesh, budget: &mut Budget) -> Result<SurfaceGeometry> {
    let surface = match mesh.kind() {
        MeshKind::PointCloud => point_cloud(mesh, budget)?,
        MeshKind::SurfaceMesh => pass_through(mesh, budget)?,
        MeshKind::VolumeMesh => boundary(mesh, budget)?,
    };

    debug!(
        "Extracted surface from {:?}: {} cells -> {} vertices, {} triangles",
        mesh.kind(),
        mesh.cell_count(),
        surface.vertex_count(),
        surface.triangle_count()
    );
    Ok(surface)
}

fn point_cloud(mesh: &Mesh, budget: &mut Budget) -> Result<SurfaceGeometry> {
    budget.charge(mesh.point_count() as u64)?;
    Ok(SurfaceGeometry {
        vertices: mesh.points().to_vec(),
        source_points: (0..mesh.point_count() as u32).collect(),
        ..Default::default()
    })
}

fn pass_through(mesh: &Mesh, budget: &mut Budget) -> Result<SurfaceGeometry> {
    let mut builder = SurfaceBuilder::new(mesh);
    for (index, cell) in mesh.cells().iter().enumerate() {
        budget.charge(1)?;
        if cell.cell_type.dimension() == 2 {
            builder.emit_polygon(&cell.vertex_indices, index as u32);
        }
    }
    Ok(builder.finish())
}

fn boundary(mesh: &Mesh, budget: &mut Budget) -> Result<SurfaceGeometry> {
    // Pass 1: how many cells own each face
    let mut owners: HashMap<FaceKey, u32> = HashMap::with_capacity(mesh.cell_count() * 4);
    for cell in mesh.cells() {
        budget.charge(1)?;
        for face in cell.faces() {
            *owners.entry(FaceKey::new(&face)).or_insert(0) += 1;
        }
    }

    // Pass 2: emit in cell order. A face is boundary unless exactly two cells
    // share it; non-manifold faces are emitted once, at their first owner.
    let mut builder = SurfaceBuilder::new(mesh);
    for (index, cell) in mesh.cells().iter().enumerate() {
        budget.charge(1)?;
        match cell.cell_type.dimension() {
            2 => builder.emit_polygon(&cell.vertex_indices, index as u32),
            3 => {
                for face in cell.faces() {
                    let Some(count) = owners.get_mut(&FaceKey::new(&face)) else {
                        continue;
                    };
                    if *count == 2 || *count == 0 {
                        continue;
                    }
                    *count = 0;
                    builder.emit_polygon(&face, index as u32);
                }
            }
            _ => {}
        }
    }
    Ok(builder.finish())
}
