//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the service
//! configuration from a YAML file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

use super::types::ServiceConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "PAYROLL_CONFIG";

/// Configuration file used when neither an argument nor the environment
/// names one.
pub const DEFAULT_CONFIG_PATH: &str = "./config/payroll.yaml";

/// Loads and provides access to the service configuration.
///
/// # File Format
///
/// ```text
/// server:
///   host: 127.0.0.1
///   port: 8000
/// uploads:
///   directory: ./media
///   max_upload_bytes: 20971520
/// database:
///   url: sqlite://payroll.db
///   max_connections: 5
/// logging:
///   filter: payroll_engine=info
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/payroll.yaml")?;
/// println!("Listening on {}", loader.config().server.socket_addr());
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: ServiceConfig,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loads configuration from the specified file.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - The file is missing
    /// - The file contains invalid YAML or fields of the wrong type
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        let config = Self::parse(&path_str, &content)?;
        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
        })
    }

    /// Resolves the configuration file to use and loads it.
    ///
    /// An explicit path (first CLI argument) wins, then the
    /// `PAYROLL_CONFIG` environment variable. Explicit paths must exist.
    /// Otherwise [`DEFAULT_CONFIG_PATH`] is used if present, and built-in
    /// defaults if not.
    pub fn resolve(explicit: Option<PathBuf>) -> EngineResult<Self> {
        let explicit = explicit.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::defaults()),
        }
    }

    /// A loader holding the built-in defaults.
    pub fn defaults() -> Self {
        Self {
            config: ServiceConfig::default(),
            source: None,
        }
    }

    /// Parses YAML text; an empty document yields the defaults.
    fn parse(path_str: &str, content: &str) -> EngineResult<ServiceConfig> {
        if content.trim().is_empty() {
            return Ok(ServiceConfig::default());
        }
        serde_yaml::from_str(content).map_err(|e| EngineError::ConfigParseError {
            path: path_str.to_string(),
            message: e.to_string(),
        })
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The file the configuration came from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> ServiceConfig {
        self.config
    }
}
