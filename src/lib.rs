// src/lib.rs
//! Geoslice
//!
//! Geometry reduction backend for remote mesh visualization. Source meshes
//! stay on the server; clients receive compact payloads holding either the
//! colored boundary surface or the cross-section segments of a few planes.

pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod packaging;
pub mod performance;
pub mod prelude;
pub mod session;
pub mod slicing;

// Re-export main types for convenience
pub use config::PipelineConfig;
pub use error::{ErrorKind, ErrorReply, PipelineError, Result};
pub use packaging::GeometryPayload;
pub use session::{ProcessRequest, SessionManager, VisualParams};

/// Installs the `env_logger` backend, honoring `RUST_LOG` (default `info`)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Creates a session manager configured from `GEOSLICE_CONFIG` and the
/// `GEOSLICE_*` environment variables
pub fn default() -> anyhow::Result<SessionManager> {
    let config = PipelineConfig::load()?;
    Ok(SessionManager::new(config)?)
}
