use std::sync::Arc;

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};
use wwweather_core::{get_xdg_data_dir, DEFAULT_BATCH_SIZE, DEFAULT_DATABASE_FILE, DEFAULT_PAGE_SIZE};

use crate::{
    db::{AirQualityLayout, MemoryRepository, RecordRepository, SqliteRepository},
    Error,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Memory,
}

/// Everything needed to open a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub backend: BackendKind,
    /// `sqlite://path`, `sqlite::memory:` or a bare file path.
    pub connection_target: String,
    /// Upper bound on records committed per bulk-write transaction.
    pub batch_size: usize,
    pub air_quality_layout: AirQualityLayout,
    /// Create missing tables for the configured layout on open.
    pub bootstrap_schema: bool,
    /// Rows fetched per round trip by lazy queries.
    pub page_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            connection_target: default_connection_target(),
            batch_size: DEFAULT_BATCH_SIZE,
            air_quality_layout: AirQualityLayout::default(),
            bootstrap_schema: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RepositoryConfig {
    /// Throwaway SQLite database, schema created on open. Used by tests and
    /// one-off conversions.
    pub fn in_memory(layout: AirQualityLayout) -> Self {
        Self {
            connection_target: "sqlite::memory:".to_string(),
            air_quality_layout: layout,
            bootstrap_schema: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than zero".into()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be greater than zero".into()));
        }
        if self.backend == BackendKind::Sqlite && self.connection_target.trim().is_empty() {
            return Err(Error::Config("connection_target is empty".into()));
        }
        Ok(())
    }
}

fn default_connection_target() -> String {
    get_xdg_data_dir()
        .join(DEFAULT_DATABASE_FILE)
        .to_string_lossy()
        .into_owned()
}

/// Opens the backend selected by `config`.
pub async fn open_repository(config: &RepositoryConfig) -> Result<Arc<dyn RecordRepository>, Error> {
    config.validate()?;

    match config.backend {
        BackendKind::Sqlite => Ok(Arc::new(SqliteRepository::connect(config).await?)),
        BackendKind::Memory => {
            info!("Using in-memory repository; records will not be persisted");
            Ok(Arc::new(MemoryRepository::from_config(config)))
        }
    }
}
