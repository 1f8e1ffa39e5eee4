//! CLI configuration file (`membind.toml`)
//!
//! ```toml
//! interval_ms = 50
//! block_reads = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use membind::BinderConfig;
use membind::binder::DEFAULT_MAX_BLOCK_READ;
use serde::Deserialize;
use tracing::debug;

const FILE_NAME: &str = "membind.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Refresh interval for watch and freeze
    pub interval_ms: u64,
    pub block_reads: bool,
    pub max_block_read: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            block_reads: true,
            max_block_read: DEFAULT_MAX_BLOCK_READ,
        }
    }
}

impl CliConfig {
    /// Load `path` if given, otherwise the first config file found in the
    /// working directory or the user config directory, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match Self::candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("membind").join(FILE_NAME));
        }
        paths
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override the interval from the command line
    pub fn with_interval(mut self, interval_ms: Option<u64>) -> Self {
        if let Some(ms) = interval_ms {
            self.interval_ms = ms;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn binder_config(&self, no_block_reads: bool) -> BinderConfig {
        BinderConfig::builder()
            .block_reads(self.block_reads && !no_block_reads)
            .max_block_read(self.max_block_read)
            .build()
    }
}
