use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Where the air-quality half of a record is persisted.
///
/// Chosen once per repository. Callers observe identical behavior either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AirQualityLayout {
    /// Nullable `air_toxic_*` and `aqi_*` columns on the weather row (model 0.1.0).
    Inline,
    /// The `air_quality_records` table keyed by the weather row's uuid (model 0.2.0 and later).
    #[default]
    Split,
}

pub(crate) const WEATHER_TABLE: &str = "weather_records";
pub(crate) const AIR_QUALITY_TABLE: &str = "air_quality_records";

/// Column this crate adds to `weather_records` for the absolute observation
/// instant. Nullable; rows written by other tools leave it empty.
pub(crate) const EPOCH_COLUMN: &str = "last_updated_epoch";
/// Column of model 0.3.0 holding the derived acceptability flag.
pub(crate) const ACCEPTABLE_COLUMN: &str = "acceptable";

/// Observation instant of the `w` row, falling back to the local time read
/// as UTC when the epoch column is empty.
pub(crate) const EPOCH: &str =
    "COALESCE(w.last_updated_epoch, CAST(strftime('%s', w.local_datetime) AS INTEGER))";

pub(crate) const EPOCH_DDL: &str = "ALTER TABLE weather_records ADD COLUMN last_updated_epoch INTEGER";
pub(crate) const EPOCH_INDEX: &str = "CREATE INDEX IF NOT EXISTS weather_records__ix__last_updated_epoch
    ON weather_records (last_updated_epoch, uuid)";

const WEATHER_TABLE_V1: &str = "CREATE TABLE IF NOT EXISTS weather_records (
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
    air_toxic_co FLOAT,
    air_toxic_o3 FLOAT,
    air_toxic_no2 FLOAT,
    air_toxic_so2 FLOAT,
    air_toxic_pm25 FLOAT,
    air_toxic_pm10 FLOAT,
    aqi_epa SMALLINT,
    aqi_defra SMALLINT,
    conditions_report VARCHAR(256),
    CONSTRAINT weather_records__pk PRIMARY KEY (uuid),
    CONSTRAINT weather_records__uq__key_columns UNIQUE (
        location_country, location_name, location_latitude, location_longitude,
        local_datetime, local_timezone
    )
)";

const WEATHER_TABLE_V2: &str = "CREATE TABLE IF NOT EXISTS weather_records (
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
)";

const AIR_QUALITY_TABLE_V3: &str = "CREATE TABLE IF NOT EXISTS air_quality_records (
    uuid CHAR(32) NOT NULL,
    toxic_co FLOAT,
    toxic_o3 FLOAT,
    toxic_no2 FLOAT,
    toxic_so2 FLOAT,
    toxic_pm25 FLOAT,
    toxic_pm10 FLOAT,
    aqi_epa SMALLINT,
    aqi_defra SMALLINT,
    acceptable BOOLEAN,
    CONSTRAINT air_quality_records__pk PRIMARY KEY (uuid),
    CONSTRAINT air_quality_records__fk__weather_records__uuid FOREIGN KEY (uuid)
        REFERENCES weather_records (uuid) ON DELETE CASCADE
)";

const WEATHER_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS weather_records__ix__local_datetime
        ON weather_records (local_datetime)",
    "CREATE INDEX IF NOT EXISTS weather_records__ix__local_timezone
        ON weather_records (local_timezone)",
    "CREATE INDEX IF NOT EXISTS weather_records__ix__location_country
        ON weather_records (location_country)",
    "CREATE INDEX IF NOT EXISTS weather_records__ix__location_name
        ON weather_records (location_name)",
    "CREATE INDEX IF NOT EXISTS weather_records__ix__location_position
        ON weather_records (location_latitude, location_longitude)",
];

const INLINE_SCHEMA: [&str; 6] = [
    WEATHER_TABLE_V1,
    WEATHER_INDEXES[0],
    WEATHER_INDEXES[1],
    WEATHER_INDEXES[2],
    WEATHER_INDEXES[3],
    WEATHER_INDEXES[4],
];

const SPLIT_SCHEMA: [&str; 7] = [
    WEATHER_TABLE_V2,
    AIR_QUALITY_TABLE_V3,
    WEATHER_INDEXES[0],
    WEATHER_INDEXES[1],
    WEATHER_INDEXES[2],
    WEATHER_INDEXES[3],
    WEATHER_INDEXES[4],
];

const WEATHER_COLUMNS: &str = "w.uuid, w.location_country, w.location_name, \
    w.location_latitude, w.location_longitude, w.local_timezone";

const CONDITION_COLUMNS: &str = "w.local_datetime, w.air_temp_celsius, w.humidity, \
    w.apparent_temp_celsius, w.atm_pressure_mbar, w.wind_speed_kmh, w.wind_direction, \
    w.wind_gust_kmh, w.conditions_report";

impl AirQualityLayout {
    /// DDL of the migrated schema for this layout, one statement per entry.
    pub(crate) fn schema(&self) -> &'static [&'static str] {
        match self {
            AirQualityLayout::Inline => &INLINE_SCHEMA,
            AirQualityLayout::Split => &SPLIT_SCHEMA,
        }
    }

    /// Table holding the air-quality columns.
    pub(crate) fn air_quality_table(&self) -> &'static str {
        match self {
            AirQualityLayout::Inline => WEATHER_TABLE,
            AirQualityLayout::Split => AIR_QUALITY_TABLE,
        }
    }

    /// Concentrations CO, O3, NO2, SO2, PM2.5, PM10, then the US-EPA and
    /// UK-DEFRA indices.
    pub(crate) fn air_quality_columns(&self) -> [&'static str; 8] {
        match self {
            AirQualityLayout::Inline => [
                "air_toxic_co",
                "air_toxic_o3",
                "air_toxic_no2",
                "air_toxic_so2",
                "air_toxic_pm25",
                "air_toxic_pm10",
                "aqi_epa",
                "aqi_defra",
            ],
            AirQualityLayout::Split => [
                "toxic_co",
                "toxic_o3",
                "toxic_no2",
                "toxic_so2",
                "toxic_pm25",
                "toxic_pm10",
                "aqi_epa",
                "aqi_defra",
            ],
        }
    }

    /// `SELECT ... FROM` prefix yielding full records. The weather table is
    /// aliased `w` so filter conditions can be appended unchanged.
    pub(crate) fn select_records(&self) -> String {
        let (alias, from) = match self {
            AirQualityLayout::Inline => ("w", "FROM weather_records w"),
            AirQualityLayout::Split => (
                "a",
                "FROM weather_records w LEFT JOIN air_quality_records a ON a.uuid = w.uuid",
            ),
        };
        let air_quality = self
            .air_quality_columns()
            .map(|column| format!("{alias}.{column}"))
            .join(", ");
        format!("SELECT {WEATHER_COLUMNS}, {EPOCH}, {CONDITION_COLUMNS}, {air_quality} {from}")
    }
}
