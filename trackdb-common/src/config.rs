//! Configuration loading for the import pipeline
//!
//! Resolution follows a fixed priority order:
//! 1. Explicit config file path passed by the caller (highest priority)
//! 2. `TRACKDB_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/trackdb/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! Individual values can additionally be overridden through environment
//! variables (`TRACKDB_MEASUREMENT_SYSTEM`, `TRACKDB_LATEST_ONLY`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Unit convention applied to distance, speed, elevation, and temperature
/// fields of imported activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSystem {
    /// Kilometers, kph, meters, degrees Celsius
    Metric,
    /// Miles, mph, feet, degrees Fahrenheit
    Statute,
}

impl MeasurementSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementSystem::Metric => "metric",
            MeasurementSystem::Statute => "statute",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "metric" => Some(MeasurementSystem::Metric),
            "statute" => Some(MeasurementSystem::Statute),
            _ => None,
        }
    }
}

/// Policy for a details file whose activity has no previously imported
/// summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetachedDetailsPolicy {
    /// Create a placeholder activity row from the details header
    Placeholder,
    /// Mark the file failed and continue the batch
    Reject,
}

/// Import pipeline configuration
///
/// Consumed by the orchestrator; loaded from TOML with per-field defaults
/// so partial config files stay valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Target unit system for stored values
    #[serde(default = "default_measurement_system")]
    pub measurement_system: MeasurementSystem,

    /// Maximum files processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-file bound on decode + write, in seconds
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,

    /// Restrict batches to files newer than the recorded high-water mark
    #[serde(default)]
    pub latest_only: bool,

    /// Handling of details files without a prior summary import
    #[serde(default = "default_detached_details")]
    pub detached_details: DetachedDetailsPolicy,
}

fn default_measurement_system() -> MeasurementSystem {
    MeasurementSystem::Metric
}

fn default_concurrency() -> usize {
    4
}

fn default_file_timeout_secs() -> u64 {
    30
}

fn default_detached_details() -> DetachedDetailsPolicy {
    DetachedDetailsPolicy::Placeholder
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            measurement_system: default_measurement_system(),
            concurrency: default_concurrency(),
            file_timeout_secs: default_file_timeout_secs(),
            latest_only: false,
            detached_details: default_detached_details(),
        }
    }
}

impl ImportConfig {
    /// Load configuration following the module-level priority order.
    ///
    /// A missing config file is not an error; compiled defaults apply.
    /// A present-but-unparseable file is a configuration error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit_path) {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No config file found, using compiled defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a specific TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply per-value environment overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("TRACKDB_MEASUREMENT_SYSTEM") {
            match MeasurementSystem::from_str(&value) {
                Some(system) => self.measurement_system = system,
                None => warn!(
                    value = %value,
                    "Ignoring invalid TRACKDB_MEASUREMENT_SYSTEM (expected metric or statute)"
                ),
            }
        }
        if let Ok(value) = std::env::var("TRACKDB_LATEST_ONLY") {
            match value.as_str() {
                "1" | "true" => self.latest_only = true,
                "0" | "false" => self.latest_only = false,
                _ => warn!(value = %value, "Ignoring invalid TRACKDB_LATEST_ONLY"),
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.file_timeout_secs == 0 {
            return Err(Error::Config(
                "file_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the config file path following the priority order.
///
/// Returns None when no candidate exists on disk (defaults apply).
fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: explicit path from the caller
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var("TRACKDB_CONFIG") {
        return Some(PathBuf::from(path));
    }

    // Priority 3: platform config directory
    let candidate = dirs::config_dir().map(|d| d.join("trackdb").join("config.toml"));
    match candidate {
        Some(path) if path.exists() => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ImportConfig::default();
        assert_eq!(config.measurement_system, MeasurementSystem::Metric);
        assert_eq!(config.concurrency, 4);
        assert!(!config.latest_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ImportConfig =
            toml::from_str("measurement_system = \"statute\"\n").unwrap();
        assert_eq!(config.measurement_system, MeasurementSystem::Statute);
        assert_eq!(config.concurrency, 4);
        assert_eq!(
            config.detached_details,
            DetachedDetailsPolicy::Placeholder
        );
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config: ImportConfig = toml::from_str("concurrency = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn measurement_system_round_trips() {
        for system in [MeasurementSystem::Metric, MeasurementSystem::Statute] {
            assert_eq!(MeasurementSystem::from_str(system.as_str()), Some(system));
        }
        assert_eq!(MeasurementSystem::from_str("imperial"), None);
    }
}
