use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, Trim};
use log::{debug, info};

use super::{reader::ColumnIndex, CsvOptions, ImportReport};
use crate::{db::RecordRepository, Error, RecordFilter, UpsertOutcome, WeatherRecord};

/// Reads records from `source` and writes them through `bulk_write`.
///
/// Bad rows and items the backend refuses end up in the report; only an
/// unusable header, an I/O failure or an unreachable backend abort the call.
/// Rows that parse but do not match `filter` are counted as skipped.
pub async fn import_csv<R, S>(
    repository: &R,
    source: S,
    filter: Option<&RecordFilter>,
    options: &CsvOptions,
) -> Result<ImportReport, Error>
where
    R: RecordRepository + ?Sized,
    S: Read + Send,
{
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| Error::FatalFormat(format!("unreadable header: {e}")))?
        .clone();
    let columns = ColumnIndex::analyze(&headers)?;

    let batch_size = options.batch_size.max(1);
    let mut report = ImportReport::default();
    let mut batch: Vec<(usize, WeatherRecord)> = Vec::with_capacity(batch_size);

    for (index, row) in reader.records().enumerate() {
        let line = index + 1;
        let row = match row {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                debug!("Line {}: {}", line, err);
                report.fail(line, err.to_string());
                continue;
            }
        };

        match columns.parse_row(&row) {
            Ok(record) if filter.is_some_and(|f| !f.matches(&record)) => report.skipped += 1,
            Ok(record) => {
                batch.push((line, record));
                if batch.len() >= batch_size {
                    flush(repository, &mut batch, options, &mut report).await?;
                }
            }
            Err(err) => {
                debug!("Line {}: {}", line, err);
                report.fail(line, err.to_string());
            }
        }
    }
    flush(repository, &mut batch, options, &mut report).await?;

    report.failures.sort_by_key(|failure| failure.line);
    info!(
        "Import finished: {} created, {} updated, {} skipped, {} failed",
        report.created, report.updated, report.skipped, report.failed
    );
    Ok(report)
}

/// Writes the buffered rows and folds the per-item outcomes into `report`.
async fn flush<R>(
    repository: &R,
    batch: &mut Vec<(usize, WeatherRecord)>,
    options: &CsvOptions,
    report: &mut ImportReport,
) -> Result<(), Error>
where
    R: RecordRepository + ?Sized,
{
    if batch.is_empty() {
        return Ok(());
    }

    let (lines, records): (Vec<usize>, Vec<WeatherRecord>) = batch.drain(..).unzip();
    let items = repository.bulk_write(records, options.on_duplicate).await?;

    for (line, item) in lines.into_iter().zip(items) {
        match item.outcome {
            UpsertOutcome::Created => report.created += 1,
            UpsertOutcome::Updated => report.updated += 1,
            UpsertOutcome::Skipped => {
                debug!("Line {}: already stored", line);
                report.skipped += 1;
            }
            UpsertOutcome::Failed(reason) => {
                debug!("Line {}: {}", line, reason);
                report.fail(line, reason);
            }
        }
    }
    Ok(())
}

pub async fn import_file<R>(
    repository: &R,
    path: &Path,
    filter: Option<&RecordFilter>,
    options: &CsvOptions,
) -> Result<ImportReport, Error>
where
    R: RecordRepository + ?Sized,
{
    info!("Importing records from {}", path.display());
    let file = File::open(path)?;
    import_csv(repository, file, filter, options).await
}
