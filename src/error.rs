//! Error taxonomy shared by every pipeline stage.
//!
//! Each variant maps onto one wire code (see [`ErrorKind::as_str`]). A
//! constant scalar range and a missing session are deliberately absent:
//! both are handled in-band and never reach the caller as failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure raised while ingesting, reducing or packaging a mesh
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source data is malformed or violates a mesh invariant
    #[error("format error: {0}")]
    Format(String),

    /// Source data could not be read
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The requested domain carries no scalar arrays at all
    #[error("mesh has no {domain} arrays to color by")]
    EmptyArray { domain: &'static str },

    /// The requested domain has arrays, but none with this name
    #[error("no {domain} array named '{name}'")]
    UnknownArray { domain: &'static str, name: String },

    /// Input too large or computation over its time budget
    #[error("resource limit exceeded: {0}")]
    ResourceExceeded(String),

    /// Slice plane cannot be constructed
    #[error("invalid slice plane: {0}")]
    InvalidPlane(String),

    /// A visualization parameter is outside its accepted range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl PipelineError {
    /// Wraps an I/O failure with the path it happened on
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::Io { .. } => ErrorKind::Io,
            Self::EmptyArray { .. } => ErrorKind::EmptyArray,
            Self::UnknownArray { .. } => ErrorKind::UnknownArray,
            Self::ResourceExceeded(_) => ErrorKind::ResourceExceeded,
            Self::InvalidPlane(_) => ErrorKind::InvalidPlane,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
        }
    }

    /// Converts into the `{kind, message}` reply handed to the transport layer
    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Closed set of wire error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[serde(rename = "FORMAT_ERROR")]
    Format,
    #[serde(rename = "IO_ERROR")]
    Io,
    EmptyArray,
    UnknownArray,
    ResourceExceeded,
    InvalidPlane,
    InvalidParameter,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Format => "FORMAT_ERROR",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::EmptyArray => "EMPTY_ARRAY",
            ErrorKind::UnknownArray => "UNKNOWN_ARRAY",
            ErrorKind::ResourceExceeded => "RESOURCE_EXCEEDED",
            ErrorKind::InvalidPlane => "INVALID_PLANE",
            ErrorKind::InvalidParameter => "INVALID_PARAMETER",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reply shape of the pipeline invocation contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<PipelineError> for ErrorReply {
    fn from(error: PipelineError) -> Self {
        error.to_reply()
    }
}
