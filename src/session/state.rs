//! Per-session state and the pure transition applied by every request

use super::pipeline::{run_pipeline, PipelineOutput};
use crate::color::{ArraySelector, ColorOptions, LookupTable};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::geometry::SurfaceGeometry;
use crate::mesh::{Mesh, MeshSource};
use crate::packaging::Appearance;
use crate::slicing::{SliceAxis, SliceSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Visualization parameters of a session
///
/// Requests carry the complete set; the previous values are replaced, never
/// merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisualParams {
    /// Array to color by; `None` paints the solid color
    pub selector: Option<ArraySelector>,
    pub opacity: f32,
    pub wireframe: bool,
    pub slicing_enabled: bool,
    pub slice_axis: SliceAxis,
    /// Offset of the first plane along the axis
    pub slice_position: f64,
    pub slice_count: usize,
    pub slice_spacing: f64,
    pub lookup_table: LookupTable,
    pub scalar_range: Option<(f64, f64)>,
}

impl Default for VisualParams {
    fn default() -> Self {
        Self {
            selector: None,
            opacity: 1.0,
            wireframe: false,
            slicing_enabled: false,
            slice_axis: SliceAxis::X,
            slice_position: 0.0,
            slice_count: 1,
            slice_spacing: 0.1,
            lookup_table: LookupTable::default(),
            scalar_range: None,
        }
    }
}

impl VisualParams {
    /// Rejects values no pipeline run could honor
    pub fn validate(&self) -> Result<()> {
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(PipelineError::InvalidParameter(format!(
                "opacity {} outside [0, 1]",
                self.opacity
            )));
        }
        if let Some((min, max)) = self.scalar_range {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(PipelineError::InvalidParameter(format!(
                    "scalar range [{}, {}] is not a finite interval",
                    min, max
                )));
            }
        }
        if self.lookup_table.table_size == 0 {
            return Err(PipelineError::InvalidParameter(
                "lookup table needs at least one entry".into(),
            ));
        }
        if self.slicing_enabled {
            self.slice_set()?;
        }
        Ok(())
    }

    pub fn slice_set(&self) -> Result<SliceSet> {
        SliceSet::from_axis(
            self.slice_axis,
            self.slice_position,
            self.slice_spacing,
            self.slice_count,
        )
    }

    pub fn color_options(&self, solid_color: [f32; 3]) -> ColorOptions {
        ColorOptions {
            lookup_table: self.lookup_table.clone(),
            scalar_range: self.scalar_range,
            solid_color,
        }
    }

    pub fn appearance(&self) -> Appearance {
        Appearance {
            opacity: self.opacity,
            wireframe: self.wireframe,
        }
    }
}

/// One `process` call as received from the transport layer
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    /// Replacement source mesh, if any
    pub mesh: Option<MeshSource>,
    pub params: VisualParams,
}

impl ProcessRequest {
    pub fn params(params: VisualParams) -> Self {
        Self { mesh: None, params }
    }

    pub fn with_mesh(mut self, mesh: impl Into<MeshSource>) -> Self {
        self.mesh = Some(mesh.into());
        self
    }
}

/// A request after ingestion: the mesh (if replaced) is already loaded
#[derive(Debug, Clone)]
pub struct ParamDelta {
    pub mesh: Option<Mesh>,
    pub params: VisualParams,
}

/// Committed state of one session
#[derive(Debug, Clone)]
pub struct SessionState {
    mesh: Arc<Mesh>,
    params: VisualParams,
    surface: Option<Arc<SurfaceGeometry>>,
}

impl SessionState {
    pub fn new(mesh: Mesh, params: VisualParams) -> Self {
        Self {
            mesh: Arc::new(mesh),
            params,
            surface: None,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn params(&self) -> &VisualParams {
        &self.params
    }

    /// Extracted surface of the current mesh, once a run has produced it
    pub fn cached_surface(&self) -> Option<&SurfaceGeometry> {
        self.surface.as_deref()
    }

    /// Computes the successor state and its payload without touching `self`
    ///
    /// The surface cache survives as long as the mesh is not replaced.
    pub fn apply(
        &self,
        delta: ParamDelta,
        config: &PipelineConfig,
    ) -> Result<(SessionState, PipelineOutput)> {
        let (mesh, cached) = match delta.mesh {
            Some(mesh) => (Arc::new(mesh), None),
            None => (Arc::clone(&self.mesh), self.surface.clone()),
        };

        let output = run_pipeline(&mesh, cached.as_ref(), &delta.params, config)?;
        let next = SessionState {
            mesh,
            params: delta.params,
            surface: Some(Arc::clone(&output.surface)),
        };
        Ok((next, output))
    }

    /// Re-runs the pipeline with the current parameters
    pub fn refresh(&self, config: &PipelineConfig) -> Result<(SessionState, PipelineOutput)> {
        self.apply(
            ParamDelta {
                mesh: None,
                params: self.params.clone(),
            },
            config,
        )
    }
}
