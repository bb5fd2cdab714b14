use std::path::{Path, PathBuf};
use std::{env, fs};

use dirs::home_dir;
use shellexpand::full;
use thiserror::Error;

use crate::config::types::{ConfigFile, IndexConfig, default_extensions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),

    #[error("failed to read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("failed to parse TOML in {0}: {1}")]
    ParseError(String, #[source] toml::de::Error),

    #[error("version {0} is unsupported (expected 1)")]
    BadVersion(u32),

    #[error("home directory not available to expand '~'")]
    NoHome,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from an explicit path, or from the default
    /// location. A missing default file yields the built-in defaults;
    /// a missing explicit path is an error.
    pub fn load(config_path: Option<&Path>) -> Result<IndexConfig, ConfigError> {
        let path = match config_path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.display().to_string()));
                }
                p.to_path_buf()
            }
            None => {
                let p = default_config_path();
                if !p.exists() {
                    return Ok(IndexConfig::default());
                }
                p
            }
        };

        let s = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;

        let cf: ConfigFile = toml::from_str(&s)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e))?;

        if cf.version != 1 {
            return Err(ConfigError::BadVersion(cf.version));
        }

        Self::resolve(cf)
    }

    fn resolve(cf: ConfigFile) -> Result<IndexConfig, ConfigError> {
        let db_path = match &cf.index.db_path {
            Some(raw) => expand_path(raw)?,
            None => default_db_path(),
        };

        let extensions = cf
            .index
            .extensions
            .unwrap_or_else(default_extensions)
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();

        let excluded_folders = cf
            .index
            .excluded_folders
            .iter()
            .map(|f| expand_path(f))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(IndexConfig {
            db_path,
            extensions,
            excluded_folders,
            max_cache_age_hours: cf.index.max_cache_age_hours.unwrap_or(24),
            fts_enabled: cf.index.fts_enabled.unwrap_or(true),
        })
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("mdindex").join("config.toml");
    }
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("mdindex").join("config.toml")
}

/// Default location of the store artifact.
pub fn default_db_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_DATA_HOME") {
        return Path::new(&xdg).join("mdindex").join("index.db");
    }
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".local").join("share").join("mdindex").join("index.db")
}

fn expand_path(input: &str) -> Result<PathBuf, ConfigError> {
    let expanded = full(input).map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(expanded.to_string()))
}
