//! Client configuration loader for ragline.
//!
//! Reads `config.toml` from the data directory (`~/.ragline/` in production,
//! `RAGLINE_DATA_DIR` when set) and deserializes it into [`ClientConfig`].
//! The implicit file falls back to defaults when missing or malformed; an
//! explicitly requested file must exist and parse.

use std::path::{Path, PathBuf};

use ragline_types::config::ClientConfig;
use ragline_types::error::ConfigError;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "RAGLINE_DATA_DIR";

/// File name of the config inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory: `RAGLINE_DATA_DIR`, else `~/.ragline`.
pub fn resolve_data_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".ragline"))
        .ok_or(ConfigError::NoDataDir)
}

/// Create the data directory if needed.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), ConfigError> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| ConfigError::Read {
            path: data_dir.display().to_string(),
            message: e.to_string(),
        })
}

/// Read and parse a config file.
///
/// Returns `Ok(None)` when the file does not exist.
pub async fn read_client_config(path: &Path) -> Result<Option<ClientConfig>, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    toml::from_str::<ClientConfig>(&content)
        .map(Some)
        .map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ClientConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    match read_client_config(&config_path).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            ClientConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            ClientConfig::default()
        }
    }
}

/// Apply `RAGLINE_BASE_URL`, `RAGLINE_CHANNEL_URL`, and `RAGLINE_API_KEY`
/// on top of the file configuration. Environment variables win.
pub fn apply_env_overrides(config: &mut ClientConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

fn apply_overrides(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
    if let Some(url) = get("RAGLINE_BASE_URL") {
        config.server.base_url = url;
    }
    if let Some(url) = get("RAGLINE_CHANNEL_URL") {
        config.server.channel_url = url;
    }
    if let Some(key) = get("RAGLINE_API_KEY") {
        config.server.api_key = Some(key);
    }
}
