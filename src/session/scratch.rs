//! Per-session temporary storage
//!
//! Each session gets its own directory `<root>/session-<id hash>-<random>`.
//! Handles are reference counted: the directory is deleted when the last
//! handle goes away, whether that is the session itself or a computation
//! that outlived it.

use crate::error::{PipelineError, Result};
use crate::packaging::GeometryPayload;
use log::{debug, warn};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CREATE_ATTEMPTS: usize = 8;

#[derive(Debug)]
struct ScratchDir {
    path: PathBuf,
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed scratch directory {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Shared handle to a session's scratch directory
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: Arc<ScratchDir>,
}

impl ScratchSpace {
    /// Creates a fresh, unused directory under `root` for `session_id`
    pub fn create(root: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| PipelineError::io(root, e))?;

        let mut hasher = DefaultHasher::new();
        session_id.hash(&mut hasher);
        let id_hash = hasher.finish();

        let mut last_error = None;
        for _ in 0..CREATE_ATTEMPTS {
            let path = root.join(format!(
                "session-{:016x}-{:08x}",
                id_hash,
                rand::random::<u32>()
            ));
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!("Created scratch directory {}", path.display());
                    return Ok(Self {
                        dir: Arc::new(ScratchDir { path }),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_error = Some((path, e)),
                Err(e) => return Err(PipelineError::io(&path, e)),
            }
        }

        let (path, error) = last_error.unwrap_or_else(|| {
            (
                root.to_path_buf(),
                io::Error::new(io::ErrorKind::AlreadyExists, "no free scratch name"),
            )
        });
        Err(PipelineError::io(path, error))
    }

    pub fn path(&self) -> &Path {
        &self.dir.path
    }

    /// Number of live handles to this directory
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.dir)
    }

    /// Writes `payload` as JSON and returns the file path
    pub fn write_payload(&self, payload: &GeometryPayload) -> Result<PathBuf> {
        let path = self.path().join("payload.json");
        let json = payload.to_json()?;
        fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))?;
        Ok(path)
    }
}
