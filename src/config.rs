//! Configuration for the reduction pipeline and its session registry
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. JSON file named by `GEOSLICE_CONFIG`
//! 3. Environment variables (`GEOSLICE_SESSION_TTL_SECS`, `GEOSLICE_TIMEOUT_MS`,
//!    `GEOSLICE_MAX_CELLS`, `GEOSLICE_SCRATCH_DIR`)

use crate::color::LookupTable;
use crate::performance::Budget;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_ENV: &str = "GEOSLICE_CONFIG";
pub const SESSION_TTL_ENV: &str = "GEOSLICE_SESSION_TTL_SECS";
pub const TIMEOUT_ENV: &str = "GEOSLICE_TIMEOUT_MS";
pub const MAX_CELLS_ENV: &str = "GEOSLICE_MAX_CELLS";
pub const SCRATCH_DIR_ENV: &str = "GEOSLICE_SCRATCH_DIR";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub slicing: SlicingConfig,
    #[serde(default)]
    pub color: ColorConfig,
}

/// Session lifetime and scratch storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity after which a session is destroyed
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Minimum time between two sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Parent of per-session scratch directories; system temp dir if unset
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
}

/// Bounds on a single pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest accepted source mesh, in cells
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    /// Largest accepted source mesh, in points
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    /// Work units (cells visited, triangles tested) per run
    #[serde(default = "default_max_work")]
    pub max_work: u64,
}

/// Slicing defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicingConfig {
    /// Plane distance tolerance relative to the bounding-box diagonal
    #[serde(default = "default_epsilon_scale")]
    pub epsilon_scale: f64,
    #[serde(default = "default_slice_count")]
    pub default_count: usize,
    #[serde(default = "default_slice_spacing")]
    pub default_spacing: f64,
}

/// Coloring defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorConfig {
    #[serde(default)]
    pub lookup_table: LookupTable,
    #[serde(default = "default_solid_color")]
    pub solid_color: [f32; 3],
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            scratch_root: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_cells: default_max_cells(),
            max_points: default_max_points(),
            max_work: default_max_work(),
        }
    }
}

impl Default for SlicingConfig {
    fn default() -> Self {
        Self {
            epsilon_scale: default_epsilon_scale(),
            default_count: default_slice_count(),
            default_spacing: default_slice_spacing(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            lookup_table: LookupTable::default(),
            solid_color: default_solid_color(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_cells() -> usize {
    20_000_000
}

fn default_max_points() -> usize {
    20_000_000
}

fn default_max_work() -> u64 {
    2_000_000_000
}

fn default_epsilon_scale() -> f64 {
    1e-9
}

fn default_slice_count() -> usize {
    1
}

fn default_slice_spacing() -> f64 {
    0.1
}

fn default_solid_color() -> [f32; 3] {
    [1.0, 0.5, 0.0]
}

impl PipelineConfig {
    /// Loads defaults, then the `GEOSLICE_CONFIG` file, then env overrides
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => {
                info!("Loading configuration from: {}", path);
                Self::from_file(Path::new(&path))?
            }
            Err(_) => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Reads a JSON configuration file; missing sections take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    }

    /// Applies `GEOSLICE_*` overrides looked up through `lookup`
    ///
    /// Unparseable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ttl) = parse_var(&lookup, SESSION_TTL_ENV) {
            self.session.ttl_secs = ttl;
        }
        if let Some(timeout) = parse_var(&lookup, TIMEOUT_ENV) {
            self.limits.timeout_ms = timeout;
        }
        if let Some(max_cells) = parse_var(&lookup, MAX_CELLS_ENV) {
            self.limits.max_cells = max_cells;
        }
        if let Some(dir) = lookup(SCRATCH_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.session.scratch_root = Some(PathBuf::from(dir));
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.limits.timeout_ms)
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.session
            .scratch_root
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("geoslice"))
    }

    /// Fresh budget for one pipeline run
    pub fn budget(&self) -> Budget {
        Budget::new(self.timeout(), self.limits.max_work)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(1800));
        assert_eq!(config.slicing.epsilon_scale, 1e-9);
        assert_eq!(config.color.solid_color, [1.0, 0.5, 0.0]);
        assert!(config.scratch_root().ends_with("geoslice"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PipelineConfig::default();
        config.apply_overrides(lookup_from(&[
            (SESSION_TTL_ENV, "5"),
            (TIMEOUT_ENV, "250"),
            (MAX_CELLS_ENV, "1000"),
            (SCRATCH_DIR_ENV, "/tmp/geoslice-test"),
        ]));
        assert_eq!(config.session.ttl_secs, 5);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.limits.max_cells, 1000);
        assert_eq!(config.scratch_root(), PathBuf::from("/tmp/geoslice-test"));
    }

    #[test]
    fn test_invalid_env_value_is_ignored() {
        let mut config = PipelineConfig::default();
        config.apply_overrides(lookup_from(&[(TIMEOUT_ENV, "soon")]));
        assert_eq!(config.limits.timeout_ms, default_timeout_ms());
    }

    #[test]
    fn test_partial_json_file() {
        let path = env::temp_dir().join(format!("geoslice-config-{}.json", rand::random::<u32>()));
        fs::write(&path, r#"{ "limits": { "timeout_ms": 42 } }"#).unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.limits.timeout_ms, 42);
        assert_eq!(config.limits.max_cells, default_max_cells());
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/geoslice.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
