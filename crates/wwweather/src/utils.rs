use std::{env, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};
use log::LevelFilter;
use time::{
    format_description::well_known::{Iso8601, Rfc3339},
    macros::format_description,
    Date, OffsetDateTime,
};
use wwweather_core::{
    find_config_file, load_config, ConfigSource, CONFIG_ENV_VAR, CONFIG_FILE_NAME,
};

use crate::{
    AirQualityLayout, BackendKind, GeoPosition, OnDuplicate, RecordFilter, RecordId,
    RepositoryConfig,
};

#[derive(Parser, Clone, Debug)]
#[command(
    author,
    version,
    about = "wwweather - weather observation records: CSV import/export and search"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $WWWEATHER_CONFIG, ./wwweather.toml,
    /// $XDG_CONFIG_HOME/wwweather/wwweather.toml, /etc/wwweather/wwweather.toml
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Where the settings file was found, filled in by `get_config_info`
    #[arg(skip)]
    pub config_source: Option<ConfigSource>,

    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

/// Options that may also come from the environment or the config file.
#[derive(Args, Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "WWWEATHER_LEVEL", global = true)]
    pub level: Option<String>,

    /// Storage backend
    #[arg(long, env = "WWWEATHER_BACKEND", global = true)]
    pub backend: Option<BackendKind>,

    /// `sqlite://path`, `sqlite::memory:` or a database file path
    #[arg(long, env = "WWWEATHER_CONNECTION_TARGET", global = true)]
    #[serde(alias = "database")]
    pub connection_target: Option<String>,

    /// Records committed per bulk-write transaction
    #[arg(long, env = "WWWEATHER_BATCH_SIZE", global = true)]
    pub batch_size: Option<usize>,

    /// Physical shape of the air-quality data, matching the applied schema
    #[arg(long, env = "WWWEATHER_AIR_QUALITY_LAYOUT", global = true)]
    pub air_quality_layout: Option<AirQualityLayout>,

    /// Create missing tables on open
    #[arg(long, env = "WWWEATHER_BOOTSTRAP_SCHEMA", global = true)]
    pub bootstrap_schema: Option<bool>,

    /// Rows fetched per round trip when streaming results
    #[arg(long, env = "WWWEATHER_PAGE_SIZE", global = true)]
    pub page_size: Option<usize>,
}

impl Settings {
    /// Fills every unset value from `fallback`.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            level: self.level.or(fallback.level),
            backend: self.backend.or(fallback.backend),
            connection_target: self.connection_target.or(fallback.connection_target),
            batch_size: self.batch_size.or(fallback.batch_size),
            air_quality_layout: self.air_quality_layout.or(fallback.air_quality_layout),
            bootstrap_schema: self.bootstrap_schema.or(fallback.bootstrap_schema),
            page_size: self.page_size.or(fallback.page_size),
        }
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        let defaults = RepositoryConfig::default();
        RepositoryConfig {
            backend: self.backend.unwrap_or(defaults.backend),
            connection_target: self
                .connection_target
                .clone()
                .unwrap_or(defaults.connection_target),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            air_quality_layout: self
                .air_quality_layout
                .unwrap_or(defaults.air_quality_layout),
            bootstrap_schema: self.bootstrap_schema.unwrap_or(defaults.bootstrap_schema),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Import records from a CSV file and print the report
    Import {
        path: PathBuf,
        /// What to do with rows whose location and local time are already stored
        #[arg(long, value_enum, default_value_t = OnDuplicate::Update)]
        on_duplicate: OnDuplicate,
        /// Only rows matching these filters are written
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Export matching records to a CSV file
    Export {
        path: PathBuf,
        /// Add rows to an existing file instead of replacing it
        #[arg(long)]
        append: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print matching records, oldest first
    Search {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Count matching records
    Count {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print one record
    Get { id: RecordId },
    /// Delete one record and its air-quality data
    Delete { id: RecordId },
}

#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub country: Option<String>,

    /// Location name
    #[arg(long)]
    pub location: Option<String>,

    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// IANA timezone id
    #[arg(long)]
    pub timezone: Option<String>,

    /// Observed at or after this instant (RFC 3339)
    #[arg(long, value_parser = parse_rfc3339)]
    pub from: Option<OffsetDateTime>,

    /// Observed before this instant (RFC 3339)
    #[arg(long, value_parser = parse_rfc3339)]
    pub until: Option<OffsetDateTime>,

    /// Observed on this local date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, conflicts_with_all = ["date_from", "date_to"])]
    pub date: Option<Date>,

    /// Observed on or after this local date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date_from: Option<Date>,

    /// Observed on or before this local date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date_to: Option<Date>,

    /// Case-insensitive substring of the condition text
    #[arg(long)]
    pub condition: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> anyhow::Result<RecordFilter> {
        let position = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPosition::new(latitude, longitude)?),
            _ => None,
        };

        Ok(RecordFilter {
            country: self.country.clone(),
            location_name: self.location.clone(),
            position,
            timezone: self.timezone.clone(),
            observed_from: self.from,
            observed_until: self.until,
            local_from: self.date.or(self.date_from),
            local_until: self.date.or(self.date_to),
            condition: self.condition.clone(),
        })
    }
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected a YYYY-MM-DD date: {e}"))
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> anyhow::Result<Cli> {
    let cli_args = Cli::parse();

    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file(CONFIG_ENV_VAR, CONFIG_FILE_NAME)
    };

    let file_settings: Settings = load_config(&source)?;

    // CLI args override file config (env vars are handled by clap)
    Ok(Cli {
        settings: cli_args.settings.or(file_settings),
        config_source: Some(source),
        ..cli_args
    })
}

pub fn get_log_level(settings: &Settings) -> LevelFilter {
    let level_str = settings
        .level
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    match level_str.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Logs go to stderr; stdout carries command output.
pub fn setup_logger() -> Dispatch {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}: {}",
                OffsetDateTime::now_utc()
                    .format(&Iso8601::DEFAULT)
                    .unwrap_or_default(),
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .chain(std::io::stderr())
}
