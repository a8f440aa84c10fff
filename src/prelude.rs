//! # Geoslice Prelude
//!
//! Commonly used types in one import:
//!
//! ```rust
//! use geoslice::prelude::*;
//!
//! let manager = SessionManager::new(PipelineConfig::default()).unwrap();
//! let params = VisualParams {
//!     slicing_enabled: true,
//!     slice_axis: SliceAxis::Y,
//!     slice_position: 0.1,
//!     ..manager.default_params()
//! };
//! let payload = manager.process("demo", ProcessRequest::params(params)).unwrap();
//! assert!(matches!(payload.topology, Topology::Segments(_)));
//! ```

// Core entry points
pub use crate::config::PipelineConfig;
pub use crate::default;
pub use crate::session::{ProcessRequest, SessionManager, VisualParams};

// Mesh model and ingestion
pub use crate::mesh::{
    primitives, Aabb, ArrayDomain, Cell, CellType, Mesh, MeshKind, MeshLoader, MeshSource,
    ScalarArray,
};

// Pipeline stages
pub use crate::color::{colorize, ArraySelector, ColorOptions, LookupTable};
pub use crate::geometry::{extract_surface, SurfaceGeometry};
pub use crate::packaging::{package, Appearance, GeometryPayload, StageOutput, Topology};
pub use crate::slicing::{slice_surface, SliceAxis, SliceGeometry, SlicePlane, SliceSet};

// Errors and budgets
pub use crate::error::{ErrorKind, ErrorReply, PipelineError};
pub use crate::performance::{Budget, PipelineStats};

// Common external dependencies
pub use cgmath::{InnerSpace, Vector3};
