//! wwweather core library
//!
//! Shared pieces used by the records library and its command-line front-end:
//! - Configuration file discovery and loading (XDG-compliant)
//! - Filesystem helpers
//! - Application-wide defaults

mod config;
pub mod fs;

pub use config::{find_config_file, get_xdg_data_dir, load_config, ConfigSource};
pub use fs::create_parent_dir;

/// Application name used for XDG paths
pub const APP_NAME: &str = "wwweather";

/// Config file searched for in the standard locations
pub const CONFIG_FILE_NAME: &str = "wwweather.toml";

/// Environment variable holding an explicit config file path
pub const CONFIG_ENV_VAR: &str = "WWWEATHER_CONFIG";

/// Default SQLite database file name inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "weather.sqlite";

/// Default number of records committed per bulk-write transaction
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default number of rows fetched per page by lazy queries
pub const DEFAULT_PAGE_SIZE: usize = 256;
