//! Filesystem utilities

use std::fs;
use std::path::Path;

use log::info;

/// Create the parent directory of a file path, and all of its ancestors, if missing
///
/// Used before opening a database file so that a fresh data directory works.
pub fn create_parent_dir(file_path: &Path) -> std::io::Result<()> {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)?;
            info!("Created directory: {}", parent.display());
            Ok(())
        }
        _ => Ok(()),
    }
}
