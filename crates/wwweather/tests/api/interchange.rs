use futures::TryStreamExt;

use crate::helpers::{
    created, csv_file, csv_header, csv_row, durres, sqlite_repository, tirana, MockRepository,
};
use wwweather::{
    export_csv, export_file, import_csv, import_file, AirQualityLayout, BulkItem, CsvOptions,
    Error, ImportReport, OnDuplicate, RecordFilter, RecordRepository, RowFailure, UpsertOutcome,
    COLUMNS,
};

const EPOCH: i64 = 1_715_849_100;

async fn export_to_string(repository: &dyn RecordRepository, filter: RecordFilter) -> String {
    let mut out = Vec::new();
    export_csv(repository, &mut out, filter, &CsvOptions::default())
        .await
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn bad_row_is_reported_and_the_rest_imported() {
    let repository = sqlite_repository(AirQualityLayout::Split).await;
    let before = repository.count(&RecordFilter::new()).await.unwrap();

    let file = csv_file(&[
        csv_row("Tirana", EPOCH, "17"),
        csv_row("Tirana", EPOCH + 900, "warm"),
        csv_row("Tirana", EPOCH + 1800, "18.5"),
    ]);
    let report = import_csv(&repository, file.as_bytes(), None, &CsvOptions::default())
        .await
        .unwrap();

    assert_eq!(
        report,
        ImportReport {
            created: 2,
            updated: 0,
            skipped: 0,
            failed: 1,
            failures: vec![RowFailure {
                line: 2,
                reason: "invalid temperature".into()
            }],
        }
    );
    assert_eq!(
        repository.count(&RecordFilter::new()).await.unwrap(),
        before + 2
    );
}

#[tokio::test]
async fn export_writes_imperial_columns() {
    let repository = sqlite_repository(AirQualityLayout::Split).await;
    let mut record = tirana(0);
    record.conditions.temperature_celsius = 0.0;
    record.conditions.wind_kph = 10.0;
    repository.upsert(record).await.unwrap();

    let exported = export_to_string(&repository, RecordFilter::new()).await;
    let mut reader = csv::Reader::from_reader(exported.as_bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, COLUMNS);

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    let cell = |column: &str| -> f64 {
        let index = COLUMNS.iter().position(|c| *c == column).unwrap();
        rows[0][index].parse().unwrap()
    };
    assert_eq!(cell("temperature_fahrenheit"), 32.0);
    assert!((cell("wind_mph") - 6.2137).abs() < 1e-4);
    assert_eq!(cell("temperature_celsius"), 0.0);
}

#[tokio::test]
async fn export_then_import_reproduces_the_stored_fields() {
    let source = sqlite_repository(AirQualityLayout::Split).await;
    let mut plain = durres(5);
    plain.air_quality = None;
    plain.conditions.feels_like_celsius = -0.35;
    let mut with_seconds = tirana(20);
    with_seconds.observed.local = with_seconds.observed.local + time::Duration::seconds(42);
    for record in [tirana(0), plain, with_seconds, durres(40)] {
        source.upsert(record).await.unwrap();
    }
    let first = export_to_string(&source, RecordFilter::new()).await;

    for layout in [AirQualityLayout::Inline, AirQualityLayout::Split] {
        let target = sqlite_repository(layout).await;
        let report = import_csv(&target, first.as_bytes(), None, &CsvOptions::default())
            .await
            .unwrap();
        assert_eq!(report.created, 4);
        assert_eq!(report.failed, 0);

        let second = export_to_string(&target, RecordFilter::new()).await;
        assert_eq!(second, first);
    }
}

#[tokio::test]
async fn importing_the_same_file_twice_updates() {
    let repository = sqlite_repository(AirQualityLayout::Inline).await;
    let file = csv_file(&[csv_row("Tirana", EPOCH, "17"), csv_row("Durres", EPOCH, "19")]);

    let first = import_csv(&repository, file.as_bytes(), None, &CsvOptions::default())
        .await
        .unwrap();
    let second = import_csv(&repository, file.as_bytes(), None, &CsvOptions::default())
        .await
        .unwrap();

    assert_eq!(first.created, 2);
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(repository.count(&RecordFilter::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn missing_header_column_aborts_the_import() {
    let repository = sqlite_repository(AirQualityLayout::Split).await;
    let header = csv_header().replace(",condition_text", "");
    let file = format!("{header}\n{}\n", csv_row("Tirana", EPOCH, "17"));

    let result = import_csv(&repository, file.as_bytes(), None, &CsvOptions::default()).await;

    match result {
        Err(Error::FatalFormat(message)) => assert!(message.contains("condition_text")),
        other => panic!("expected a fatal format error, got {other:?}"),
    }
    assert_eq!(repository.count(&RecordFilter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn short_and_empty_files() {
    let repository = sqlite_repository(AirQualityLayout::Split).await;

    let empty = import_csv(&repository, "".as_bytes(), None, &CsvOptions::default()).await;
    assert!(matches!(empty, Err(Error::FatalFormat(_))));

    let row = csv_row("Tirana", EPOCH, "17");
    let truncated = row.rsplit_once(',').unwrap().0.to_owned();
    let file = csv_file(&[truncated, row]);
    let report = import_csv(&repository, file.as_bytes(), None, &CsvOptions::default())
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(
        report.failures,
        vec![RowFailure {
            line: 1,
            reason: "missing condition".into()
        }]
    );
}

#[tokio::test]
async fn import_filter_skips_rows() {
    let repository = sqlite_repository(AirQualityLayout::Split).await;
    let file = csv_file(&[
        csv_row("Tirana", EPOCH, "17"),
        csv_row("Durres", EPOCH, "18"),
        csv_row("Tirana", EPOCH + 900, "warm"),
    ]);
    let filter = RecordFilter::new().location_name("Tirana");

    let report = import_csv(
        &repository,
        file.as_bytes(),
        Some(&filter),
        &CsvOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(repository.count(&RecordFilter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn backend_failures_are_reported_by_line() {
    let mut repository = MockRepository::new();
    repository
        .expect_bulk_write()
        .times(1)
        .withf(|records, on_duplicate| records.len() == 3 && *on_duplicate == OnDuplicate::Update)
        .returning(|_, _| {
            Ok(vec![
                BulkItem::written(crate::helpers::new_id(), UpsertOutcome::Created),
                BulkItem::failed(None, "conflict: UNIQUE constraint failed"),
                BulkItem::written(crate::helpers::new_id(), UpsertOutcome::Updated),
            ])
        });

    let file = csv_file(&[
        csv_row("Tirana", EPOCH, "17"),
        csv_row("Tirana", EPOCH + 900, "n/a"),
        csv_row("Tirana", EPOCH + 1800, "17"),
        csv_row("Tirana", EPOCH + 2700, "17"),
    ]);
    let report = import_csv(&repository, file.as_bytes(), None, &CsvOptions::default())
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(
        report.failures,
        vec![
            RowFailure {
                line: 2,
                reason: "invalid temperature".into()
            },
            RowFailure {
                line: 3,
                reason: "conflict: UNIQUE constraint failed".into()
            },
        ]
    );
}

#[tokio::test]
async fn rows_are_written_in_batches() {
    let mut repository = MockRepository::new();
    repository
        .expect_bulk_write()
        .times(3)
        .returning(created);

    let rows: Vec<String> = (0..5)
        .map(|i| csv_row("Tirana", EPOCH + i * 900, "17"))
        .collect();
    let options = CsvOptions {
        batch_size: 2,
        ..CsvOptions::default()
    };
    let report = import_csv(&repository, csv_file(&rows).as_bytes(), None, &options)
        .await
        .unwrap();

    assert_eq!(report.created, 5);
}

#[tokio::test]
async fn unavailable_backend_aborts_the_import() {
    let mut repository = MockRepository::new();
    repository
        .expect_bulk_write()
        .times(1)
        .returning(|_, _| Err(Error::BackendUnavailable("connection refused".into())));

    let file = csv_file(&[csv_row("Tirana", EPOCH, "17")]);
    let result = import_csv(&repository, file.as_bytes(), None, &CsvOptions::default()).await;

    assert!(matches!(result, Err(Error::BackendUnavailable(_))));
}

#[tokio::test]
async fn files_on_disk_round_trip() {
    let dir = std::env::temp_dir().join(format!("wwweather-csv-{}", uuid::Uuid::now_v7()));
    let path = dir.join("nested").join("export.csv");

    let source = sqlite_repository(AirQualityLayout::Split).await;
    source.upsert(tirana(0)).await.unwrap();
    source.upsert(durres(0)).await.unwrap();
    let exported = export_file(&source, &path, RecordFilter::new(), &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(exported.written, 2);

    let target = sqlite_repository(AirQualityLayout::Inline).await;
    let report = import_file(&target, &path, None, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(report.created, 2);

    let missing = import_file(&target, &dir.join("absent.csv"), None, &CsvOptions::default()).await;
    assert!(matches!(missing, Err(Error::Io(_))));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn duplicate_rows_follow_the_import_policy() {
    for layout in [AirQualityLayout::Inline, AirQualityLayout::Split] {
        let repository = sqlite_repository(layout).await;
        let seed = csv_file(&[csv_row("Tirana", EPOCH, "17")]);
        import_csv(&repository, seed.as_bytes(), None, &CsvOptions::default())
            .await
            .unwrap();

        let file = csv_file(&[
            csv_row("Tirana", EPOCH, "25"),
            csv_row("Tirana", EPOCH + 900, "18"),
        ]);
        let ignore = CsvOptions {
            on_duplicate: OnDuplicate::Ignore,
            ..CsvOptions::default()
        };
        let report = import_csv(&repository, file.as_bytes(), None, &ignore)
            .await
            .unwrap();
        assert_eq!((report.created, report.skipped, report.failed), (1, 1, 0));

        let raise = CsvOptions {
            on_duplicate: OnDuplicate::Raise,
            ..CsvOptions::default()
        };
        let report = import_csv(&repository, file.as_bytes(), None, &raise)
            .await
            .unwrap();
        assert_eq!(report.failed, 2);
        assert!(report.failures[0].reason.starts_with("conflict: duplicate of"));

        let temperatures: Vec<f64> = repository
            .find(RecordFilter::new())
            .map_ok(|r| r.conditions.temperature_celsius)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(temperatures, vec![17.0, 18.0], "{layout:?}");
    }
}

#[tokio::test]
async fn import_passes_the_duplicate_policy_to_the_backend() {
    let mut repository = MockRepository::new();
    repository
        .expect_bulk_write()
        .times(1)
        .withf(|_, on_duplicate| *on_duplicate == OnDuplicate::Ignore)
        .returning(|records, _| {
            Ok(records
                .iter()
                .map(|_| BulkItem::written(crate::helpers::new_id(), UpsertOutcome::Skipped))
                .collect())
        });

    let file = csv_file(&[csv_row("Tirana", EPOCH, "17"), csv_row("Durres", EPOCH, "18")]);
    let options = CsvOptions {
        on_duplicate: OnDuplicate::Ignore,
        ..CsvOptions::default()
    };
    let report = import_csv(&repository, file.as_bytes(), None, &options)
        .await
        .unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.written(), 0);
}

#[tokio::test]
async fn append_adds_rows_below_a_single_header() {
    let dir = std::env::temp_dir().join(format!("wwweather-append-{}", uuid::Uuid::now_v7()));
    let path = dir.join("export.csv");
    let repository = sqlite_repository(AirQualityLayout::Split).await;
    repository.upsert(tirana(0)).await.unwrap();
    repository.upsert(durres(0)).await.unwrap();

    let append = CsvOptions {
        append: true,
        ..CsvOptions::default()
    };
    let tirana_only = RecordFilter::new().location_name("Tirana");
    let durres_only = RecordFilter::new().location_name("Durres");
    export_file(&repository, &path, tirana_only.clone(), &append)
        .await
        .unwrap();
    let report = export_file(&repository, &path, durres_only, &append)
        .await
        .unwrap();
    assert_eq!(report.written, 1);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], COLUMNS.join(","));
    assert!(lines[1].contains("Tirana"));
    assert!(lines[2].contains("Durres"));

    // Without append the file is replaced.
    export_file(&repository, &path, tirana_only, &CsvOptions::default())
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);

    std::fs::remove_dir_all(&dir).unwrap();
}
