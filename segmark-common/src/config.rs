//! Configuration loading and data folder resolution
//!
//! Settings resolve in priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file (`~/.config/segmark/config.toml`, then `/etc/segmark/config.toml`)
//! 3. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default bind port for the backend service
pub const DEFAULT_PORT: u16 = 5730;

/// Default base URL of the external inference engine
pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:5731";

/// TOML file contents (all fields optional; env vars override)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub data_folder: Option<String>,
    pub engine_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_filter: Option<String>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root folder for uploads/ and outputs/
    pub data_folder: PathBuf,
    /// Base URL of the inference engine HTTP API
    pub engine_url: String,
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// tracing-subscriber env filter directive
    pub log_filter: String,
}

impl ServiceConfig {
    /// Resolve configuration from environment and TOML file
    pub fn resolve() -> Self {
        let toml_config = load_toml_config().unwrap_or_default();

        let data_folder = std::env::var("SEGMARK_DATA_FOLDER")
            .ok()
            .map(PathBuf::from)
            .or_else(|| toml_config.data_folder.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_data_folder);

        let engine_url = std::env::var("SEGMARK_ENGINE_URL")
            .ok()
            .or(toml_config.engine_url)
            .unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string());

        let host = std::env::var("SEGMARK_HOST")
            .ok()
            .or(toml_config.host)
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let port = std::env::var("SEGMARK_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .or(toml_config.port)
            .unwrap_or(DEFAULT_PORT);

        let log_filter = std::env::var("SEGMARK_LOG")
            .ok()
            .or(toml_config.log_filter)
            .unwrap_or_else(|| "info".to_string());

        Self {
            data_folder,
            engine_url,
            host,
            port,
            log_filter,
        }
    }

    /// Create the data folder if it does not exist yet
    pub fn ensure_data_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_folder).map_err(|e| {
            Error::Config(format!(
                "Failed to create data folder {}: {}",
                self.data_folder.display(),
                e
            ))
        })
    }
}

/// Locate and parse the TOML config file, if any
fn load_toml_config() -> Result<TomlConfig> {
    let path = find_config_file()?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse config failed: {}", e)))
}

/// Get config file path for the platform
fn find_config_file() -> Result<PathBuf> {
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("segmark").join("config.toml")) {
        if user_config.exists() {
            return Ok(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/segmark/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("segmark"))
        .unwrap_or_else(|| PathBuf::from("./segmark_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        std::env::set_var("SEGMARK_PORT", "9999");
        std::env::set_var("SEGMARK_ENGINE_URL", "http://engine.test:1234");

        let config = ServiceConfig::resolve();
        assert_eq!(config.port, 9999);
        assert_eq!(config.engine_url, "http://engine.test:1234");

        std::env::remove_var("SEGMARK_PORT");
        std::env::remove_var("SEGMARK_ENGINE_URL");
    }

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        std::env::remove_var("SEGMARK_PORT");
        std::env::remove_var("SEGMARK_ENGINE_URL");
        std::env::remove_var("SEGMARK_HOST");

        let config = ServiceConfig::resolve();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.engine_url, DEFAULT_ENGINE_URL);
    }

    #[test]
    #[serial]
    fn invalid_port_falls_back() {
        std::env::set_var("SEGMARK_PORT", "not-a-port");
        let config = ServiceConfig::resolve();
        assert_eq!(config.port, DEFAULT_PORT);
        std::env::remove_var("SEGMARK_PORT");
    }
}
