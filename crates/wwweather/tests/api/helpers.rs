use async_trait::async_trait;
use mockall::mock;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::PathBuf;
use time::{
    macros::{datetime, format_description},
    Duration, OffsetDateTime, PrimitiveDateTime,
};
use uuid::Uuid;
use wwweather::{
    AirQualityLayout, AirQualityRecord, BulkItem, CompassPoint, Conditions, Error, GeoPosition,
    Location, ObservationTime, OnDuplicate, RecordFilter, RecordId, RecordRepository,
    RecordStream, RepositoryConfig, SqliteRepository, UpsertOutcome, WeatherRecord, COLUMNS,
};

mock! {
    pub Repository {}

    #[async_trait]
    impl RecordRepository for Repository {
        async fn get(&self, id: RecordId) -> Result<WeatherRecord, Error>;
        fn find(&self, filter: RecordFilter) -> RecordStream;
        async fn upsert(&self, record: WeatherRecord) -> Result<RecordId, Error>;
        async fn bulk_write(
            &self,
            records: Vec<WeatherRecord>,
            on_duplicate: OnDuplicate,
        ) -> Result<Vec<BulkItem>, Error>;
        async fn delete(&self, id: RecordId) -> Result<bool, Error>;
        async fn count(&self, filter: &RecordFilter) -> Result<u64, Error>;
    }
}

pub const LAYOUTS: [AirQualityLayout; 2] = [AirQualityLayout::Inline, AirQualityLayout::Split];

/// Start of the observation window used by the fixtures.
pub const BASE: OffsetDateTime = datetime!(2024-05-16 08:45 UTC);

pub async fn sqlite_repository(layout: AirQualityLayout) -> SqliteRepository {
    sqlite_repository_with(RepositoryConfig::in_memory(layout)).await
}

pub async fn sqlite_repository_with(config: RepositoryConfig) -> SqliteRepository {
    SqliteRepository::connect(&config)
        .await
        .expect("Failed to open in-memory database")
}

pub fn new_id() -> RecordId {
    RecordId::from(Uuid::now_v7())
}

pub fn created(records: Vec<WeatherRecord>, _: OnDuplicate) -> Result<Vec<BulkItem>, Error> {
    Ok(records
        .into_iter()
        .map(|_| BulkItem::written(new_id(), UpsertOutcome::Created))
        .collect())
}

pub fn location(country: &str, name: &str, latitude: f64, longitude: f64) -> Location {
    Location::new(
        country,
        name,
        GeoPosition::new(latitude, longitude).unwrap(),
        "Europe/Tirane",
    )
    .unwrap()
}

pub fn air_quality() -> AirQualityRecord {
    AirQualityRecord {
        carbon_monoxide: 277.0,
        ozone: 103.0,
        nitrogen_dioxide: 1.1,
        sulphur_dioxide: 0.2,
        pm2_5: 8.4,
        pm10: 26.6,
        us_epa_index: 1,
        gb_defra_index: 2,
    }
}

/// Observation at `location`, `minutes` after [`BASE`], with air quality.
pub fn observation_at(location: Location, minutes: i64) -> WeatherRecord {
    let instant = BASE + Duration::minutes(minutes);
    let local = PrimitiveDateTime::new(instant.date(), instant.time()) + Duration::hours(2);

    WeatherRecord::new(
        location,
        ObservationTime::new(instant, local),
        Conditions {
            temperature_celsius: 17.3,
            humidity: 94,
            feels_like_celsius: 16.9,
            pressure_mb: 1009.0,
            wind_kph: 11.2,
            wind_direction: CompassPoint::WSW,
            gust_kph: 15.6,
            text: "Patchy rain nearby".into(),
        },
    )
    .with_air_quality(air_quality())
}

pub fn tirana(minutes: i64) -> WeatherRecord {
    observation_at(location("Albania", "Tirana", 41.33, 19.82), minutes)
}

pub fn durres(minutes: i64) -> WeatherRecord {
    observation_at(location("Albania", "Durres", 41.32, 19.45), minutes)
}

pub fn csv_header() -> String {
    COLUMNS.join(",")
}

/// One data row in column order with the given location name, timestamp and
/// temperature cell. Local time is two hours ahead of UTC.
pub fn csv_row(name: &str, epoch: i64, temperature: &str) -> String {
    let local = (OffsetDateTime::from_unix_timestamp(epoch).unwrap() + Duration::hours(2))
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap();
    [
        "Albania",
        name,
        "41.33",
        "19.82",
        "Europe/Tirane",
        epoch.to_string().as_str(),
        local.as_str(),
        temperature,
        "62.6",
        "94",
        "17",
        "62.6",
        "1009",
        "29.8",
        "11.2",
        "6.9",
        "WSW",
        "15.6",
        "9.7",
        "277",
        "103",
        "1.1",
        "0.2",
        "8.4",
        "26.6",
        "1",
        "1",
        "Partly Cloudy",
    ]
    .join(",")
}

pub fn csv_file(rows: &[String]) -> String {
    let mut file = csv_header();
    for row in rows {
        file.push('\n');
        file.push_str(row);
    }
    file.push('\n');
    file
}

/// DDL of schema model 0.2.0, before `air_quality_records`
/// gained its `acceptable` column.
pub const MODEL_0_2_0: [&str; 2] = [
    "CREATE TABLE weather_records (
        uuid CHAR(32) NOT NULL,
        location_country VARCHAR(128) NOT NULL,
        location_name VARCHAR(128) NOT NULL,
        location_latitude FLOAT NOT NULL,
        location_longitude FLOAT NOT NULL,
        local_datetime DATETIME NOT NULL,
        local_timezone VARCHAR(256) NOT NULL,
        air_temp_celsius FLOAT,
        humidity SMALLINT,
        apparent_temp_celsius FLOAT,
        atm_pressure_mbar FLOAT,
        wind_speed_kmh FLOAT,
        wind_gust_kmh FLOAT,
        wind_direction VARCHAR(3),
        conditions_report VARCHAR(256),
        CONSTRAINT weather_records__pk PRIMARY KEY (uuid),
        CONSTRAINT weather_records__uq__key_columns UNIQUE (
            location_country, location_name, location_latitude, location_longitude,
            local_datetime, local_timezone
        )
    )",
    "CREATE TABLE air_quality_records (
        uuid CHAR(32) NOT NULL,
        toxic_co FLOAT,
        toxic_o3 FLOAT,
        toxic_no2 FLOAT,
        toxic_so2 FLOAT,
        toxic_pm25 FLOAT,
        toxic_pm10 FLOAT,
        aqi_epa SMALLINT,
        aqi_defra SMALLINT,
        CONSTRAINT air_quality_records__pk PRIMARY KEY (uuid),
        CONSTRAINT air_quality_records__fk__weather_records__uuid FOREIGN KEY (uuid)
            REFERENCES weather_records (uuid) ON DELETE CASCADE
    )",
];

/// A database file in a fresh temporary directory, with `ddl` applied by a
/// plain connection as a migration tool would.
pub async fn migrated_database(ddl: &[&str]) -> (PathBuf, RepositoryConfig) {
    let dir = std::env::temp_dir().join(format!("wwweather-schema-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("weather.sqlite");

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();
    for statement in ddl {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;

    let config = RepositoryConfig {
        connection_target: path.to_string_lossy().into_owned(),
        bootstrap_schema: false,
        ..RepositoryConfig::default()
    };
    (dir, config)
}
