//! One synchronous pipeline run: extract, colorize, slice, package

use super::state::VisualParams;
use crate::color::colorize;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::geometry::{extract_surface, SurfaceGeometry};
use crate::mesh::Mesh;
use crate::packaging::{package, GeometryPayload, StageOutput};
use crate::performance::{PipelineStats, Stage};
use crate::slicing::slice_surface;
use log::debug;
use std::sync::Arc;

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub payload: GeometryPayload,
    /// Uncolored surface, reusable while the mesh stays the same
    pub surface: Arc<SurfaceGeometry>,
    pub stats: PipelineStats,
}

/// Runs every stage for `mesh` under `params`
///
/// Parameters and input size are checked before any geometry work. A
/// `cached` surface skips extraction; it must come from the same mesh.
pub fn run_pipeline(
    mesh: &Mesh,
    cached: Option<&Arc<SurfaceGeometry>>,
    params: &VisualParams,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    params.validate()?;
    check_input_size(mesh, config)?;
    let slice_set = match params.slicing_enabled {
        true => Some(params.slice_set()?),
        false => None,
    };

    let mut budget = config.budget();
    let mut stats = PipelineStats {
        input_vertices: mesh.point_count(),
        ..Default::default()
    };

    let timer = stats.begin(Stage::Extract);
    let surface = match cached {
        Some(surface) => {
            stats.surface_cached = true;
            Arc::clone(surface)
        }
        None => Arc::new(extract_surface(mesh, &mut budget)?),
    };
    stats.end(timer);

    let timer = stats.begin(Stage::Colorize);
    let colors = colorize(
        mesh,
        &surface,
        params.selector.as_ref(),
        &params.color_options(config.color.solid_color),
    )?;
    let colored = surface.with_colors(colors);
    stats.end(timer);

    let payload = match slice_set {
        Some(set) => {
            let timer = stats.begin(Stage::Slice);
            let (slices, report) =
                slice_surface(&colored, &set, config.slicing.epsilon_scale, &mut budget)?;
            stats.end(timer);
            debug!("Slice report: {:?}", report);

            let timer = stats.begin(Stage::Package);
            let payload = package(StageOutput::Slices(&slices), params.appearance());
            stats.end(timer);
            payload
        }
        None => {
            let timer = stats.begin(Stage::Package);
            let payload = package(StageOutput::Surface(&colored), params.appearance());
            stats.end(timer);
            payload
        }
    };
    budget.check_deadline()?;

    stats.output_vertices = payload.vertex_count;
    debug!(
        "Pipeline run: {} -> {} vertices ({:.1}% reduction) in {:.2} ms",
        stats.input_vertices,
        stats.output_vertices,
        stats.reduction_ratio() * 100.0,
        stats.total().as_secs_f64() * 1000.0
    );

    Ok(PipelineOutput {
        payload,
        surface,
        stats,
    })
}

fn check_input_size(mesh: &Mesh, config: &PipelineConfig) -> Result<()> {
    let limits = &config.limits;
    if mesh.cell_count() > limits.max_cells {
        return Err(PipelineError::ResourceExceeded(format!(
            "mesh has {} cells, limit is {}",
            mesh.cell_count(),
            limits.max_cells
        )));
    }
    if mesh.point_count() > limits.max_points {
        return Err(PipelineError::ResourceExceeded(format!(
            "mesh has {} points, limit is {}",
            mesh.point_count(),
            limits.max_points
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ArraySelector;
    use crate::error::ErrorKind;
    use crate::mesh::primitives;
    use crate::packaging::Topology;
    use crate::slicing::SliceAxis;

    #[test]
    fn test_surface_run_on_cube() {
        let mesh = primitives::unit_cube_tetra().unwrap();
        let params = VisualParams {
            selector: Some(ArraySelector::point("Temperature")),
            ..Default::default()
        };
        let output = run_pipeline(&mesh, None, &params, &PipelineConfig::default()).unwrap();

        output.payload.validate().unwrap();
        assert_eq!(output.payload.primitive_count, 12);
        assert!(matches!(output.payload.topology, Topology::Faces(_)));
        assert_eq!(output.stats.input_vertices, 8);
        assert_eq!(output.stats.output_vertices, 8);
        assert!(output.surface.colors.is_none());
    }

    #[test]
    fn test_slice_run_emits_segments() {
        let mesh = primitives::unit_cube_tetra().unwrap();
        let params = VisualParams {
            slicing_enabled: true,
            slice_axis: SliceAxis::X,
            slice_position: 0.5,
            ..Default::default()
        };
        let output = run_pipeline(&mesh, None, &params, &PipelineConfig::default()).unwrap();
        output.payload.validate().unwrap();
        assert!(matches!(output.payload.topology, Topology::Segments(_)));
        assert!(output.payload.primitive_count > 0);
    }

    #[test]
    fn test_invalid_plane_fails_before_extraction() {
        let mesh = primitives::unit_cube_tetra().unwrap();
        let params = VisualParams {
            slicing_enabled: true,
            slice_axis: SliceAxis::Normal([0.0, 0.0, 0.0]),
            ..Default::default()
        };
        let err = run_pipeline(&mesh, None, &params, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPlane);
    }

    #[test]
    fn test_oversized_mesh_rejected() {
        let mesh = primitives::structured_block(3, 3, 3).unwrap();
        let mut config = PipelineConfig::default();
        config.limits.max_cells = 10;
        let err = run_pipeline(&mesh, None, &VisualParams::default(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExceeded);
    }

    #[test]
    fn test_zero_timeout_exceeds_budget() {
        let mesh = primitives::structured_block(20, 20, 20).unwrap();
        let mut config = PipelineConfig::default();
        config.limits.timeout_ms = 0;
        let err = run_pipeline(&mesh, None, &VisualParams::default(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExceeded);
    }

    #[test]
    fn test_missing_array_kind() {
        let mesh = primitives::unit_cube_tetra().unwrap();
        let params = VisualParams {
            selector: Some(ArraySelector::point("Velocity")),
            ..Default::default()
        };
        let err = run_pipeline(&mesh, None, &params, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArray);
    }
}
