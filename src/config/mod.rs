//! Configuration for a frame stage
//!
//! A stage is configured from a TOML file with three sections:
//!
//! ```toml
//! [stage]
//! name = "STATS1"
//! queue_capacity = 16
//! blocking_mode = false
//! enabled = true
//! min_callback_period_secs = 0.0
//! source_port = "SIM1"
//! source_addr = 0
//!
//! [stats]
//! compute_centroid = true
//! centroid_threshold = 10.0
//! hist_size = 256
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a default, so a partial file (or no file at all) is valid.
//!
//! # Config Location
//!
//! The default file lives in the platform config directory:
//! - **Linux**: `~/.config/framestage/stage.toml`
//! - **macOS**: `~/Library/Application Support/framestage/stage.toml`
//! - **Windows**: `%APPDATA%\framestage\stage.toml`

use crate::error::{Result, StageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the platform config directory
pub const APP_DIR: &str = "framestage";

/// Default config filename
pub const CONFIG_FILE: &str = "stage.toml";

/// Default bounded queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default number of histogram bins
pub const DEFAULT_HIST_SIZE: usize = 256;

/// Default time series length
pub const DEFAULT_TS_NUM_POINTS: usize = 2048;

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

// ==================== Stage Config ====================

/// Complete stage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StageConfig {
    /// Dispatch settings
    pub stage: DispatchConfig,
    /// Reduction settings
    pub stats: StatsConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl StageConfig {
    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StageError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            StageError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config, returning defaults if the file is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StageError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| StageError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| StageError::Config(format!("Failed to write config file {:?}: {}", path, e)))
    }

    /// Check the values a stage cannot run with
    pub fn validate(&self) -> Result<()> {
        self.stage.validate()?;
        self.stats.validate()
    }
}

// ==================== Dispatch Config ====================

/// Dispatch settings for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Stage name, used in logs and thread names
    pub name: String,
    /// Bounded queue capacity, fixed for the life of the stage
    pub queue_capacity: usize,
    /// Process frames on the delivering thread instead of queueing them
    pub blocking_mode: bool,
    /// Register for deliveries as soon as the stage is connected
    pub enabled: bool,
    /// Minimum time between processed frames (0 disables throttling)
    pub min_callback_period_secs: f64,
    /// Upstream port name (empty for an unbound stage)
    pub source_port: String,
    /// Upstream sub-address
    pub source_addr: i32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            name: "STATS1".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            blocking_mode: false,
            enabled: true,
            min_callback_period_secs: 0.0,
            source_port: String::new(),
            source_addr: 0,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(StageError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if let Err(e) = Duration::try_from_secs_f64(self.min_callback_period_secs) {
            return Err(StageError::Config(format!(
                "min_callback_period_secs = {}: {}",
                self.min_callback_period_secs, e
            )));
        }
        Ok(())
    }
}

// ==================== Stats Config ====================

/// Reduction settings for a statistics stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Run the basic statistics pass (min/max/mean/sigma/total/net)
    pub compute_statistics: bool,
    /// Edge width used for the background estimate (0 disables it)
    pub background_width: usize,
    /// Run the centroid and moment analysis
    pub compute_centroid: bool,
    /// Elements at or below this value are excluded from the centroid
    pub centroid_threshold: f64,
    /// Compute the X/Y projection profiles
    pub compute_profiles: bool,
    /// Cursor position for the cursor profiles
    pub cursor_x: usize,
    pub cursor_y: usize,
    /// Compute the histogram and entropy
    pub compute_histogram: bool,
    /// Number of histogram bins
    pub hist_size: usize,
    /// Lower edge of the histogram range
    pub hist_min: f64,
    /// Upper edge of the histogram range
    pub hist_max: f64,
    /// Time series length
    pub ts_num_points: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            compute_statistics: true,
            background_width: 0,
            compute_centroid: false,
            centroid_threshold: 1.0,
            compute_profiles: false,
            cursor_x: 0,
            cursor_y: 0,
            compute_histogram: false,
            hist_size: DEFAULT_HIST_SIZE,
            hist_min: 0.0,
            hist_max: 255.0,
            ts_num_points: DEFAULT_TS_NUM_POINTS,
        }
    }
}

impl StatsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hist_size == 0 {
            return Err(StageError::Config("hist_size must be at least 1".to_string()));
        }
        if !(self.hist_max > self.hist_min) {
            return Err(StageError::Config(format!(
                "hist_max ({}) must be greater than hist_min ({})",
                self.hist_max, self.hist_min
            )));
        }
        Ok(())
    }
}

// ==================== Logging Config ====================

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Directory for a daily rolling log file (console only if unset)
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = StageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stage.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.stats.compute_statistics);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: StageConfig = toml::from_str(
            r#"
            [stage]
            name = "STATS2"
            blocking_mode = true

            [stats]
            compute_histogram = true
            hist_size = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.stage.name, "STATS2");
        assert!(config.stage.blocking_mode);
        assert_eq!(config.stage.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.stats.hist_size, 64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("stage.toml");

        let mut config = StageConfig::default();
        config.stage.source_port = "SIM1".to_string();
        config.stage.min_callback_period_secs = 0.25;
        config.stats.compute_centroid = true;
        config.logging.directory = Some(dir.path().join("logs"));
        config.save(&path).unwrap();

        let loaded = StageConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = StageConfig::default();
        config.stage.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = StageConfig::default();
        config.stage.min_callback_period_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = StageConfig::default();
        config.stage.min_callback_period_secs = 1e20;
        assert!(config.validate().is_err());

        let mut config = StageConfig::default();
        config.stats.hist_max = config.stats.hist_min;
        assert!(config.validate().is_err());

        let mut config = StageConfig::default();
        config.stats.hist_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_on_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stage.toml");
        std::fs::write(&path, "[stage]\nqueue_capacity = 0\n").unwrap();
        assert_eq!(StageConfig::load_or_default(&path), StageConfig::default());
        assert_eq!(
            StageConfig::load_or_default(dir.path().join("missing.toml")),
            StageConfig::default()
        );
    }
}
