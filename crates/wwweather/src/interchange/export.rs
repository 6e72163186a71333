use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use csv::WriterBuilder;
use futures::TryStreamExt;
use log::info;

use super::{CsvOptions, ExportReport, COLUMNS};
use crate::{db::RecordRepository, Error, ObservationTime, RecordFilter, WeatherRecord};

/// Streams the records matching `filter` to `sink`, header first.
pub async fn export_csv<R, W>(
    repository: &R,
    sink: W,
    filter: RecordFilter,
    options: &CsvOptions,
) -> Result<ExportReport, Error>
where
    R: RecordRepository + ?Sized,
    W: Write + Send,
{
    write_records(repository, sink, filter, options, true).await
}

async fn write_records<R, W>(
    repository: &R,
    sink: W,
    filter: RecordFilter,
    options: &CsvOptions,
    header: bool,
) -> Result<ExportReport, Error>
where
    R: RecordRepository + ?Sized,
    W: Write + Send,
{
    let mut writer = WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(sink);
    if header {
        writer.write_record(COLUMNS)?;
    }

    let mut report = ExportReport::default();
    let mut records = repository.find(filter);
    while let Some(record) = records.try_next().await? {
        writer.write_record(row(&record, options.virtual_precision))?;
        report.written += 1;
    }
    writer.flush()?;

    info!("Export finished: {} records written", report.written);
    Ok(report)
}

/// Writes to `path`, replacing it unless `options.append` is set. Appending
/// to an empty or new file still writes the header.
pub async fn export_file<R>(
    repository: &R,
    path: &Path,
    filter: RecordFilter,
    options: &CsvOptions,
) -> Result<ExportReport, Error>
where
    R: RecordRepository + ?Sized,
{
    wwweather_core::create_parent_dir(path)?;
    let (file, header) = if options.append {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let empty = file.metadata()?.len() == 0;
        (file, empty)
    } else {
        (File::create(path)?, true)
    };

    info!(
        "Exporting records to {}{}",
        path.display(),
        if header { "" } else { " (appending)" }
    );
    write_records(repository, file, filter, options, header).await
}

/// Cells of one record in [`COLUMNS`] order.
fn row(record: &WeatherRecord, precision: usize) -> Vec<String> {
    let location = &record.location;
    let c = &record.conditions;
    let derived = |value: f64| format!("{value:.precision$}");

    let mut cells = vec![
        location.country().to_owned(),
        location.name().to_owned(),
        location.latitude().to_string(),
        location.longitude().to_string(),
        location.timezone().to_owned(),
        record.observed.epoch().to_string(),
        local_time(&record.observed),
        c.temperature_celsius.to_string(),
        derived(record.temperature_fahrenheit()),
        c.humidity.to_string(),
        c.feels_like_celsius.to_string(),
        derived(record.feels_like_fahrenheit()),
        c.pressure_mb.to_string(),
        derived(record.pressure_in()),
        c.wind_kph.to_string(),
        derived(record.wind_mph()),
        c.wind_direction.to_string(),
        c.gust_kph.to_string(),
        derived(record.gust_mph()),
    ];

    match &record.air_quality {
        Some(aq) => cells.extend([
            aq.carbon_monoxide.to_string(),
            aq.ozone.to_string(),
            aq.nitrogen_dioxide.to_string(),
            aq.sulphur_dioxide.to_string(),
            aq.pm2_5.to_string(),
            aq.pm10.to_string(),
            aq.us_epa_index.to_string(),
            aq.gb_defra_index.to_string(),
        ]),
        None => cells.resize(cells.len() + 8, String::new()),
    }

    cells.push(c.text.clone());
    cells
}

/// Minutes only unless the stored time carries seconds.
fn local_time(observed: &ObservationTime) -> String {
    if observed.local.second() == 0 {
        observed.local_display()
    } else {
        observed.local_stored()
    }
}
