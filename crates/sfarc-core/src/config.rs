use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ArchiveError, ArchiveResult};

/// Top-level configuration (loaded from sfarc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SfarcConfig {
    pub logging: LoggingConfig,
    pub archive: ArchiveConfig,
    pub extract: ExtractConfig,
}

impl SfarcConfig {
    /// Load the config file at `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> ArchiveResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ArchiveError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level / EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Worker thread count for per-entry work (0 = cpu_count, 1 = sequential)
    pub workers: usize,
    /// Length of the random scrypt salt in bytes
    pub salt_len: usize,
    /// File extension appended to archive names when none is given
    pub extension: String,
    /// Glob patterns (matched against file names) to leave out when collecting
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Replace files that already exist at the destination
    pub overwrite: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            salt_len: 16,
            extension: "sfa".into(),
            exclude_patterns: Vec::new(),
        }
    }
}
