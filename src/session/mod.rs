//! # Sessions
//!
//! Every client works on an isolated session: its own mesh, its own
//! visualization parameters and an optional scratch directory. A request is
//! one synchronous pipeline run against that session.
//!
//! ## State transitions
//!
//! `Uninitialized -> Active` happens lazily on first use with the default
//! sphere mesh. Every request replaces the parameter set wholesale and
//! either commits a new state with its payload or leaves the old state in
//! place. Idle sessions are moved to `Destroyed` by the sweep.
//!
//! ## Usage
//!
//! ```rust
//! use geoslice::config::PipelineConfig;
//! use geoslice::session::{ProcessRequest, SessionManager, VisualParams};
//!
//! let manager = SessionManager::new(PipelineConfig::default()).unwrap();
//! let params = VisualParams {
//!     opacity: 0.8,
//!     ..manager.default_params()
//! };
//! let payload = manager.process("client-1", ProcessRequest::params(params)).unwrap();
//! assert_eq!(payload.opacity, 0.8);
//! ```

pub mod manager;
pub mod pipeline;
pub mod scratch;
pub mod state;

pub use manager::{SessionInfo, SessionLifecycle, SessionManager};
pub use pipeline::{run_pipeline, PipelineOutput};
pub use scratch::ScratchSpace;
pub use state::{ParamDelta, ProcessRequest, SessionState, VisualParams};
