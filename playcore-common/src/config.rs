//! Configuration file discovery and loading
//!
//! Config file resolution priority order:
//! 1. Explicit path (command-line argument)
//! 2. Environment variable (`PLAYCORE_CONFIG` by default)
//! 3. Per-user config file (`<config dir>/playcore/config.toml`)
//! 4. System config file (`/etc/playcore/config.toml`, Linux only)
//!
//! A missing file is never fatal: callers get built-in defaults and a warning.
//! A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "PLAYCORE_CONFIG";

/// Directory name used under the platform config directory
const CONFIG_DIR_NAME: &str = "playcore";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Logging configuration shared by all playcore tools
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves which config file (if any) should be loaded
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env_var_name: String,
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Resolver reading the default environment variable
    pub fn new() -> Self {
        Self::with_env_var(CONFIG_ENV_VAR)
    }

    /// Resolver reading a custom environment variable
    pub fn with_env_var(env_var_name: &str) -> Self {
        Self {
            env_var_name: env_var_name.to_string(),
            explicit_path: None,
        }
    }

    /// Highest-priority explicit path (typically from the command line)
    pub fn explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    /// Resolve the config file path
    ///
    /// Explicit and environment paths are returned even if the file does not
    /// exist (the loader reports them); default locations are only returned
    /// when present on disk.
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: explicit path
        if let Some(path) = &self.explicit_path {
            debug!("Using explicit config path {}", path.display());
            return Some(path.clone());
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.is_empty() {
                debug!("Using config path from {}: {}", self.env_var_name, path);
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3/4: platform locations
        default_config_locations().into_iter().find(|p| p.exists())
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform config file locations, most specific first
pub fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    if cfg!(target_os = "linux") {
        locations.push(PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    locations
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Load `T` from a TOML file
///
/// `None` or a missing file yields `T::default()` with a warning; unreadable
/// or malformed files are errors.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using built-in defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let value = parse_toml(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Sample {
        #[serde(default)]
        value: u32,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_logging_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert!(logging.file.is_none());
    }

    #[test]
    fn test_parse_toml_with_partial_logging_section() {
        let parsed: Sample = parse_toml("value = 7\n[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(parsed.value, 7);
        assert_eq!(parsed.logging.level, "debug");
        assert!(parsed.logging.file.is_none());
    }

    #[test]
    fn test_parse_toml_rejects_garbage() {
        let result: Result<Sample> = parse_toml("value = = 3");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_load_none_uses_defaults() {
        let loaded: Sample = load_toml_or_default(None).unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_explicit_path_wins() {
        let resolver = ConfigResolver::with_env_var("PLAYCORE_TEST_UNUSED_VAR")
            .explicit(Some(PathBuf::from("/nonexistent/playcore.toml")));
        assert_eq!(resolver.resolve(), Some(PathBuf::from("/nonexistent/playcore.toml")));
    }
}
