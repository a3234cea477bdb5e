//! Configuration Loader
//!
//! Reads a configuration file through the `config` crate, layers environment
//! overrides on top, deserializes into [`ConduitConfig`] and validates it.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::ConduitConfig;
use crate::constants::env;

/// Entry points for building a validated [`ConduitConfig`]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from a file, then apply `CONDUIT__*` environment overrides
    pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<ConduitConfig> {
        Self::load(Some(path.as_ref()), true)
    }

    /// Load from a file only, ignoring the environment
    pub fn load_file_without_env(path: impl AsRef<Path>) -> ConfigResult<ConduitConfig> {
        Self::load(Some(path.as_ref()), false)
    }

    /// Load purely from `CONDUIT__*` environment variables
    pub fn from_env() -> ConfigResult<ConduitConfig> {
        Self::load(None, true)
    }

    fn load(path: Option<&Path>, with_env: bool) -> ConfigResult<ConduitConfig> {
        let mut builder = Config::builder();
        let mut source_name = String::from("environment");

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigurationError::ConfigFileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let format = Self::detect_format(path)?;
            source_name = path.display().to_string();
            builder = builder.add_source(File::from(path).format(format).required(true));
        }

        if with_env {
            builder = builder.add_source(
                Environment::with_prefix(env::CONFIG_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: ConduitConfig = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| ConfigurationError::load_error(&source_name, e))?;

        config.validate()?;

        debug!(
            source = %source_name,
            topic = %config.topic,
            processors = config.processors,
            batch = config.batch_process.batch,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("json") => Ok(FileFormat::Json),
            Some("toml") => Ok(FileFormat::Toml),
            _ => Err(ConfigurationError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}
