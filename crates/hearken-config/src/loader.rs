//! Configuration discovery and loading

use crate::components::HearkenConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable that points at a configuration file
pub const CONFIG_ENV_VAR: &str = "HEARKEN_CONFIG";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the file
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parse error in {path}: {source}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// A value was syntactically valid but unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Resolves and loads [`HearkenConfig`].
///
/// Lookup order: explicit path, `$HEARKEN_CONFIG`, `<config dir>/hearken/config.toml`,
/// then built-in defaults. An explicit path must exist; the implicit
/// locations are skipped when absent.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that searches the default locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from this file instead of searching
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Resolve, read and validate the configuration
    pub fn load(&self) -> ConfigResult<HearkenConfig> {
        if let Some(path) = &self.explicit {
            return load_file(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
            debug!(path = %path.display(), "Using config from {}", CONFIG_ENV_VAR);
            return load_file(&path);
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return load_file(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(HearkenConfig::default())
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hearken").join("config.toml"))
}

/// Parse configuration from a TOML string and validate it
pub fn parse_config(content: &str) -> Result<HearkenConfig, ConfigError> {
    let config: HearkenConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: PathBuf::from("<inline>"),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

fn load_file(path: &Path) -> ConfigResult<HearkenConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: HearkenConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&config)?;

    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

fn validate(config: &HearkenConfig) -> ConfigResult<()> {
    if config.runner.timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "runner.timeout_ms must be greater than zero".into(),
        ));
    }
    if config.runner.instruction_check_interval == 0 {
        return Err(ConfigError::Invalid(
            "runner.instruction_check_interval must be greater than zero".into(),
        ));
    }
    if config.runner.history_capacity == 0 {
        return Err(ConfigError::Invalid(
            "runner.history_capacity must be greater than zero".into(),
        ));
    }
    Ok(())
}
