use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("neither XDG base directory nor HOME is set")]
    MissingHomeDirectory,
}

const APP_DIR: &str = "palette-keeper";
const APP_CONFIG_FILE: &str = "config.json";
const THEME_CACHE_FILE: &str = "theme.json";

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub local_cache_path: Option<PathBuf>,
    /// Directory of the durable per-user store. Unset: no remote tier at boot.
    #[serde(default)]
    pub remote_store_dir: Option<PathBuf>,
    #[serde(default)]
    pub global_default_path: Option<PathBuf>,
    /// `EnvFilter` directive, e.g. `palette_keeper=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl AppConfig {
    /// Configured cache file, else `theme.json` under the XDG cache root.
    pub fn resolved_cache_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.local_cache_path {
            return Ok(path.clone());
        }
        let dirs = EnvDirs::from_env();
        theme_cache_path(dirs.cache_home.as_deref(), dirs.home.as_deref())
    }
}

pub fn load_app_config() -> AppConfig {
    let dirs = EnvDirs::from_env();
    load_app_config_with(dirs.config_home.as_deref(), dirs.home.as_deref())
}

pub fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(err) => {
            tracing::debug!(%err, "no config directory; using defaults");
            return AppConfig::default();
        }
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

/// Snapshot of the environment variables the path helpers consult.
#[derive(Debug, Clone, Default)]
pub struct EnvDirs {
    pub config_home: Option<PathBuf>,
    pub cache_home: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl EnvDirs {
    pub fn from_env() -> Self {
        Self {
            config_home: std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            cache_home: std::env::var_os("XDG_CACHE_HOME").map(PathBuf::from),
            home: std::env::var_os("HOME").map(PathBuf::from),
        }
    }
}

pub fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    let mut path = xdg_root(xdg_config_home, home, ".config")?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

pub fn theme_cache_path(
    xdg_cache_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    let mut path = xdg_root(xdg_cache_home, home, ".cache")?;
    path.push(APP_DIR);
    path.push(THEME_CACHE_FILE);
    Ok(path)
}

fn xdg_root(
    xdg_home: Option<&Path>,
    home: Option<&Path>,
    home_fallback: &str,
) -> Result<PathBuf, ConfigError> {
    if let Some(xdg) = xdg_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigError::MissingHomeDirectory)?;
    Ok(home.join(home_fallback))
}
