//! CSV import and export of weather records.
//!
//! Both directions share one canonical column order. Imperial columns are
//! written on export and ignored on import.

mod export;
mod import;
mod reader;

use serde::Serialize;
use wwweather_core::DEFAULT_BATCH_SIZE;

use crate::OnDuplicate;

pub use export::{export_csv, export_file};
pub use import::{import_csv, import_file};

/// Column order of every file written, and the columns a file must carry.
pub const COLUMNS: [&str; 28] = [
    "country",
    "location_name",
    "latitude",
    "longitude",
    "timezone",
    "last_updated_epoch",
    "last_updated",
    "temperature_celsius",
    "temperature_fahrenheit",
    "humidity",
    "feels_like_celsius",
    "feels_like_fahrenheit",
    "pressure_mb",
    "pressure_in",
    "wind_kph",
    "wind_mph",
    "wind_direction",
    "gust_kph",
    "gust_mph",
    "air_quality_Carbon_Monoxide",
    "air_quality_Ozone",
    "air_quality_Nitrogen_dioxide",
    "air_quality_Sulphur_dioxide",
    "air_quality_PM2.5",
    "air_quality_PM10",
    "air_quality_us-epa-index",
    "air_quality_gb-defra-index",
    "condition_text",
];

/// Derived columns: recomputed on export, never read back.
pub const VIRTUAL_COLUMNS: [&str; 5] = [
    "temperature_fahrenheit",
    "feels_like_fahrenheit",
    "pressure_in",
    "wind_mph",
    "gust_mph",
];

/// Columns an imported file must provide.
pub fn required_columns() -> impl Iterator<Item = &'static str> {
    COLUMNS
        .into_iter()
        .filter(|column| !VIRTUAL_COLUMNS.contains(column))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Parsed rows handed to `bulk_write` at a time.
    pub batch_size: usize,
    /// Decimal places for derived columns.
    pub virtual_precision: usize,
    /// Import: handling of rows whose business key is already stored.
    pub on_duplicate: OnDuplicate,
    /// Export: add rows to an existing file, writing the header only when it is empty.
    pub append: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            batch_size: DEFAULT_BATCH_SIZE,
            virtual_precision: 4,
            on_duplicate: OnDuplicate::default(),
            append: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based data row number, header excluded.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    /// Valid rows left out by the import filter or kept back as duplicates.
    pub skipped: usize,
    pub failed: usize,
    /// Sorted by line.
    pub failures: Vec<RowFailure>,
}

impl ImportReport {
    pub(crate) fn fail(&mut self, line: usize, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(RowFailure {
            line,
            reason: reason.into(),
        });
    }

    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub written: usize,
}
