//! Configuration for blocklog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{BlockLogError, Result};

/// Default rotation threshold: 64 MiB per segment
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Main configuration for a blocklog instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the log segments
    /// Internal structure:
    ///   {root_dir}/
    ///     ├── segment_000000
    ///     ├── segment_000001
    ///     └── ...
    pub root_dir: PathBuf,

    /// Directory of the embedded key-value engine (block index + checkpoint)
    pub index_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Rotate to a new segment once a frame would push the current one past
    /// this many bytes
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// Re-derive index entries for checkpointed frames that have none
    pub repair_index_on_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./blocklog_data/segments"),
            index_dir: PathBuf::from("./blocklog_data/index"),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            repair_index_on_open: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config for values the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(BlockLogError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }
        if self.root_dir == self.index_dir {
            return Err(BlockLogError::Config(format!(
                "root_dir and index_dir must differ (both are {})",
                self.root_dir.display()
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the segment directory
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = path.into();
        self
    }

    /// Set the index directory
    pub fn index_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_dir = path.into();
        self
    }

    /// Set the rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Enable or disable index repair on open
    pub fn repair_index_on_open(mut self, enabled: bool) -> Self {
        self.config.repair_index_on_open = enabled;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
