//! Configuration loading utilities
//!
//! Supports loading configuration from multiple sources in priority order:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Config file (searched in standard locations)
//! 4. Built-in defaults (lowest priority)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;

use crate::APP_NAME;

/// Describes where a configuration was loaded from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Explicit path provided via CLI or env var
    Explicit(PathBuf),
    /// Found in current working directory
    CurrentDir(PathBuf),
    /// Found in XDG config home (~/.config/wwweather/)
    XdgConfig(PathBuf),
    /// Found in system config (/etc/wwweather/)
    System(PathBuf),
    /// No config file found, using defaults
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigSource::Explicit(p)
            | ConfigSource::CurrentDir(p)
            | ConfigSource::XdgConfig(p)
            | ConfigSource::System(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.path() {
            Some(p) => write!(f, "{}", p.display()),
            None => write!(f, "(defaults)"),
        }
    }
}

/// Find the configuration file to load
///
/// The path named by `env_var` wins when it exists; otherwise `filename` is
/// looked up in the working directory, `$XDG_CONFIG_HOME/wwweather/` (or
/// `~/.config/wwweather/`) and `/etc/wwweather/`, in that order.
pub fn find_config_file(env_var: &str, filename: &str) -> ConfigSource {
    if let Some(path) = env::var_os(env_var).map(PathBuf::from) {
        if path.exists() {
            return ConfigSource::Explicit(path);
        }
    }

    let local = PathBuf::from(filename);
    let xdg = xdg_app_dir("XDG_CONFIG_HOME", ".config").join(filename);
    let system = Path::new("/etc").join(APP_NAME).join(filename);

    if local.exists() {
        ConfigSource::CurrentDir(local)
    } else if xdg.exists() {
        ConfigSource::XdgConfig(xdg)
    } else if system.exists() {
        ConfigSource::System(system)
    } else {
        ConfigSource::Defaults
    }
}

/// Directory holding the default SQLite database
pub fn get_xdg_data_dir() -> PathBuf {
    xdg_app_dir("XDG_DATA_HOME", ".local/share")
}

/// `$<xdg_var>/wwweather`, falling back to `~/<home_relative>/wwweather`.
fn xdg_app_dir(xdg_var: &str, home_relative: &str) -> PathBuf {
    match (env::var_os(xdg_var), env::var_os("HOME")) {
        (Some(base), _) => PathBuf::from(base).join(APP_NAME),
        (None, Some(home)) => PathBuf::from(home).join(home_relative).join(APP_NAME),
        (None, None) => Path::new(home_relative).join(APP_NAME),
    }
}

/// Load and parse a TOML configuration file
///
/// Yields `T::default()` for [`ConfigSource::Defaults`]; a file that cannot
/// be read or parsed is an error naming the path.
pub fn load_config<T: DeserializeOwned + Default>(source: &ConfigSource) -> anyhow::Result<T> {
    let Some(path) = source.path() else {
        return Ok(T::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to open config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
