//! Configuration loading for the payroll service.
//!
//! This module loads the service configuration (listener, upload directory,
//! database, logging) from a YAML file.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/payroll.yaml").unwrap();
//! println!("Uploads go to {}", config.config().uploads.directory.display());
//! ```

mod loader;
mod types;

pub use loader::{ConfigLoader, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
pub use types::{DatabaseConfig, LoggingConfig, ServerConfig, ServiceConfig, UploadConfig};
