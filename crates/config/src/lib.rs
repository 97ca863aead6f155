use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Batch reader configuration
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Configuration for stripe selection and batch reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Upper bound on rows per batch (default: 1024)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Evaluate predicates against file-level statistics before stripes (default: true)
    #[serde(default = "default_true")]
    pub file_precheck: bool,

    /// Skip row groups using the row index (default: false)
    #[serde(default)]
    pub row_group_pruning: bool,

    /// Fail when a predicate references a column without statistics (default: false)
    #[serde(default)]
    pub strict_statistics: bool,

    /// Rows per row group when the file does not define one (default: 10000)
    #[serde(default = "default_row_index_stride")]
    pub default_row_index_stride: u64,
}

/// Configuration for log output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_max_batch_size() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

fn default_row_index_stride() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            file_precheck: true,
            row_group_pruning: false,
            strict_statistics: false,
            default_row_index_stride: default_row_index_stride(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables (STRIPES_ prefix, `__` between section and key,
    ///    e.g. STRIPES_READER__MAX_BATCH_SIZE=512)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            // Reader defaults
            .set_default("reader.max_batch_size", default_max_batch_size() as u64)?
            .set_default("reader.file_precheck", true)?
            .set_default("reader.row_group_pruning", false)?
            .set_default("reader.strict_statistics", false)?
            .set_default("reader.default_row_index_stride", default_row_index_stride())?
            // Logging defaults
            .set_default("log.level", default_log_level())?;

        // Add TOML file if provided
        if let Some(file_path) = config_file {
            let path = Path::new(file_path);
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("STRIPES")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load Config from a TOML file
    ///
    /// Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path = path
            .to_str()
            .with_context(|| format!("Configuration path is not valid UTF-8: {}", path.display()))?;
        Self::load(Some(path))
    }

    /// Create a new Config from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.reader.validate()?;
        self.log.validate()?;
        Ok(())
    }
}

impl ReaderConfig {
    /// Validate the reader configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_batch_size > 0, "reader.max_batch_size must be positive");
        anyhow::ensure!(
            self.default_row_index_stride > 0,
            "reader.default_row_index_stride must be positive"
        );
        Ok(())
    }
}

impl LogConfig {
    /// Validate the logging configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.level.trim().is_empty(), "log.level cannot be empty");
        Ok(())
    }
}
