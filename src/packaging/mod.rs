//! # Geometry Packaging
//!
//! Flattens the last pipeline stage into a [`GeometryPayload`], the only
//! structure handed to the rendering side. Layout:
//!
//! - `vertices`: `3 * vertexCount` floats
//! - `faces` (triangles, 3 indices each) or `segments` (2 indices each)
//! - `colors`: `3 * vertexCount` floats in `[0, 1]`
//! - `vertexCount`, `primitiveCount`, `opacity`, `wireframe`
//!
//! Buffers can be shipped as JSON ([`GeometryPayload::to_json`]) or as raw
//! native-endian bytes through the `*_bytes` views.

use crate::error::{PipelineError, Result};
use crate::geometry::SurfaceGeometry;
use crate::slicing::SliceGeometry;
use serde::{Deserialize, Serialize};

/// Index buffer together with its primitive type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Triangle list
    Faces(Vec<u32>),
    /// Line-segment list
    Segments(Vec<u32>),
}

impl Topology {
    /// Indices per primitive
    pub fn arity(&self) -> usize {
        match self {
            Topology::Faces(_) => 3,
            Topology::Segments(_) => 2,
        }
    }

    pub fn indices(&self) -> &[u32] {
        match self {
            Topology::Faces(indices) | Topology::Segments(indices) => indices,
        }
    }

    pub fn primitive_count(&self) -> usize {
        self.indices().len() / self.arity()
    }
}

/// Material switches copied from the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub opacity: f32,
    pub wireframe: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            wireframe: false,
        }
    }
}

/// Output of the last pipeline stage
pub enum StageOutput<'a> {
    Surface(&'a SurfaceGeometry),
    Slices(&'a SliceGeometry),
}

/// Render-ready buffers for one session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryPayload {
    pub vertices: Vec<f32>,
    #[serde(flatten)]
    pub topology: Topology,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<f32>>,
    pub vertex_count: usize,
    pub primitive_count: usize,
    pub opacity: f32,
    pub wireframe: bool,
}

/// Builds the payload for `stage`
pub fn package(stage: StageOutput<'_>, appearance: Appearance) -> GeometryPayload {
    let (points, topology, colors) = match stage {
        StageOutput::Surface(surface) => (
            &surface.vertices,
            Topology::Faces(surface.triangle_indices.clone()),
            surface.colors.clone(),
        ),
        StageOutput::Slices(slice) => (
            &slice.vertices,
            Topology::Segments(slice.segment_indices.clone()),
            slice.colors.clone(),
        ),
    };

    let vertices: Vec<f32> = points
        .iter()
        .flat_map(|p| p.iter().map(|&c| c as f32))
        .collect();

    GeometryPayload {
        vertex_count: points.len(),
        primitive_count: topology.primitive_count(),
        vertices,
        topology,
        colors,
        opacity: appearance.opacity.clamp(0.0, 1.0),
        wireframe: appearance.wireframe,
    }
}

impl GeometryPayload {
    /// Index buffer regardless of primitive type
    pub fn indices(&self) -> &[u32] {
        self.topology.indices()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// Checks the buffer layout contract
    pub fn validate(&self) -> Result<()> {
        let fail = |what: String| Err(PipelineError::Format(format!("payload: {}", what)));

        if self.vertices.len() != self.vertex_count * 3 {
            return fail(format!(
                "{} vertex floats for {} vertices",
                self.vertices.len(),
                self.vertex_count
            ));
        }
        let indices = self.indices();
        if indices.len() % self.topology.arity() != 0 {
            return fail(format!(
                "{} indices is not a multiple of {}",
                indices.len(),
                self.topology.arity()
            ));
        }
        if self.primitive_count != self.topology.primitive_count() {
            return fail(format!(
                "primitive count {} does not match {} indices",
                self.primitive_count,
                indices.len()
            ));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= self.vertex_count) {
            return fail(format!("index {} out of {} vertices", bad, self.vertex_count));
        }
        if let Some(colors) = &self.colors {
            if colors.len() != self.vertices.len() {
                return fail(format!(
                    "{} color floats for {} vertex floats",
                    colors.len(),
                    self.vertices.len()
                ));
            }
            if colors.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return fail("color component outside [0, 1]".into());
            }
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return fail(format!("opacity {} outside [0, 1]", self.opacity));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PipelineError::Format(format!("payload serialization: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::Format(format!("payload deserialization: {}", e)))
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.indices())
    }

    pub fn color_bytes(&self) -> &[u8] {
        self.colors
            .as_deref()
            .map(bytemuck::cast_slice)
            .unwrap_or(&[])
    }
}
