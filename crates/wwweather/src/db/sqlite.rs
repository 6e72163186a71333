use async_trait::async_trait;
use log::{debug, error, info, warn};
use sqlx::{
    query::Query,
    sqlite::{
        SqliteArguments, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions,
        SqliteRow,
    },
    Connection, Row, Sqlite,
};
use std::{future::Future, path::Path, str::FromStr, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};

use super::{
    duplicate,
    layout::{
        ACCEPTABLE_COLUMN, AIR_QUALITY_TABLE, EPOCH, EPOCH_COLUMN, EPOCH_DDL, EPOCH_INDEX,
        WEATHER_TABLE,
    },
    paged_records, AirQualityLayout, BulkItem, OnDuplicate, PageCursor, RecordRepository,
    RecordStream, UpsertOutcome,
};
use crate::{
    AirQualityRecord, CompassPoint, Conditions, Error, GeoPosition, Location, ObservationTime,
    RecordFilter, RecordId, RepositoryConfig, WeatherRecord,
};

type WriteOperation = std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;

/// Serializes writes onto a single task so SQLite never sees two writers
/// racing for the database lock.
pub struct DatabaseWriter {
    write_tx: mpsc::UnboundedSender<WriteOperation>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Default for DatabaseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseWriter {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<WriteOperation>();

        let handle = tokio::spawn(async move {
            while let Some(future) = write_rx.recv().await {
                future.await;
            }
        });

        Self {
            write_tx,
            _handle: handle,
        }
    }

    pub async fn execute<T, F, Fut>(&self, pool: SqlitePool, operation: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(SqlitePool) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel::<Result<T, Error>>();

        let write_op = Box::pin(async move {
            let result = operation(pool).await;
            let _ = result_tx.send(result);
        });

        self.write_tx
            .send(write_op)
            .map_err(|_| Error::BackendUnavailable("database writer channel closed".into()))?;

        result_rx
            .await
            .map_err(|_| Error::BackendUnavailable("failed to receive write result".into()))?
    }
}


/// What the opened database offers beyond the configured layout.
#[derive(Debug, Clone, Copy)]
struct Schema {
    layout: AirQualityLayout,
    /// `air_quality_records.acceptable` exists (model 0.3.0).
    acceptable_column: bool,
}

/// Relational backend on SQLite, over the tables of the migrated schema.
///
/// Reads go straight to the pool; every write is queued through the
/// [`DatabaseWriter`] and runs in its own transaction.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    writer: Arc<DatabaseWriter>,
    schema: Schema,
    batch_size: usize,
    page_size: usize,
}

impl SqliteRepository {
    pub async fn connect(config: &RepositoryConfig) -> Result<Self, Error> {
        let target = config.connection_target.as_str();
        let options = connect_options(target)?;

        let pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(30));
        // Every connection to `:memory:` is a separate database, so hold on to one.
        let pool_options = if is_memory_target(target) {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("failed to open {target}: {e}")))?;

        let mut repository = Self {
            pool,
            writer: Arc::new(DatabaseWriter::new()),
            schema: Schema {
                layout: config.air_quality_layout,
                acceptable_column: false,
            },
            batch_size: config.batch_size.max(1),
            page_size: config.page_size.max(1),
        };

        repository.health_check().await?;
        if config.bootstrap_schema {
            repository.bootstrap_schema().await?;
        }
        repository.prepare_schema().await?;
        info!(
            "SQLite repository opened at {} ({:?} air-quality layout)",
            target, repository.schema.layout
        );

        Ok(repository)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn layout(&self) -> AirQualityLayout {
        self.schema.layout
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("connectivity check failed: {e}")))?;
        Ok(())
    }

    /// Creates the migrated tables of the configured layout when they are missing.
    pub async fn bootstrap_schema(&self) -> Result<(), Error> {
        for statement in self.schema.layout.schema() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema ready for {:?} layout", self.schema.layout);
        Ok(())
    }

    /// Checks the tables against the layout and adds the epoch column when
    /// the database has not been opened by this crate before.
    async fn prepare_schema(&mut self) -> Result<(), Error> {
        let layout = self.schema.layout;
        let weather = table_columns(&self.pool, WEATHER_TABLE).await?;
        if weather.is_empty() {
            return Err(Error::Config(format!(
                "table {WEATHER_TABLE} is missing, apply the migrations or enable bootstrap_schema"
            )));
        }

        let air_quality = match layout {
            AirQualityLayout::Inline => weather.clone(),
            AirQualityLayout::Split => table_columns(&self.pool, AIR_QUALITY_TABLE).await?,
        };
        let missing = layout
            .air_quality_columns()
            .into_iter()
            .find(|column| !air_quality.iter().any(|present| present == *column));
        if let Some(column) = missing {
            return Err(Error::Config(format!(
                "{} has no column {column}, the database does not use the {:?} air-quality layout",
                layout.air_quality_table(),
                layout
            )));
        }

        if !weather.iter().any(|column| column == EPOCH_COLUMN) {
            sqlx::query(EPOCH_DDL).execute(&self.pool).await?;
            info!("Added {EPOCH_COLUMN} column to {WEATHER_TABLE}");
        }
        sqlx::query(EPOCH_INDEX).execute(&self.pool).await?;

        self.schema.acceptable_column = layout == AirQualityLayout::Split
            && air_quality.iter().any(|column| column == ACCEPTABLE_COLUMN);
        debug!("Schema checked: {:?}", self.schema);
        Ok(())
    }

    /// Checkpoint WAL to the main database file.
    pub async fn checkpoint(&self) {
        match sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&self.pool)
            .await
        {
            Ok(_) => debug!("WAL checkpoint completed"),
            Err(e) => error!("WAL checkpoint failed: {}", e),
        }
    }
}

async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>, Error> {
    let sql = format!("SELECT name FROM pragma_table_info('{table}')");
    let columns = sqlx::query_scalar::<Sqlite, String>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(columns)
}

fn is_memory_target(target: &str) -> bool {
    target == ":memory:" || target.starts_with("sqlite::memory:") || target.contains("mode=memory")
}

fn connect_options(target: &str) -> Result<SqliteConnectOptions, Error> {
    let options = if is_memory_target(target) || target.starts_with("sqlite:") {
        let url = if is_memory_target(target) {
            "sqlite::memory:"
        } else {
            target
        };
        SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Config(format!("invalid connection target {target}: {e}")))?
    } else {
        let path = Path::new(target);
        wwweather_core::create_parent_dir(path)?;
        SqliteConnectOptions::new().filename(path)
    };

    Ok(options
        .create_if_missing(true)
        .pragma("journal_mode", "WAL")
        .pragma("synchronous", "NORMAL")
        .pragma("busy_timeout", "5000")
        .pragma("foreign_keys", "ON")
        .pragma("temp_store", "MEMORY"))
}

/// Ids are kept as 32 lowercase hex digits, the `CHAR(32)` form of a UUID column.
fn uuid_text(id: RecordId) -> String {
    id.as_uuid().simple().to_string()
}

#[async_trait]
impl RecordRepository for SqliteRepository {
    async fn get(&self, id: RecordId) -> Result<WeatherRecord, Error> {
        let sql = format!("{} WHERE w.uuid = ?", self.schema.layout.select_records());
        let row = sqlx::query(&sql)
            .bind(uuid_text(id))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(Error::NotFound(id)),
        }
    }

    fn find(&self, filter: RecordFilter) -> RecordStream {
        let pool = self.pool.clone();
        let select = self.schema.layout.select_records();
        let (conditions, values) = filter_clause(&filter);

        paged_records(self.page_size, move |cursor: Option<PageCursor>, limit| {
            let pool = pool.clone();
            let mut conditions = conditions.clone();
            let mut values = values.clone();
            if let Some(cursor) = cursor {
                conditions.push(format!("({EPOCH} > ? OR ({EPOCH} = ? AND w.uuid > ?))"));
                values.push(SqlValue::Integer(cursor.epoch));
                values.push(SqlValue::Integer(cursor.epoch));
                values.push(SqlValue::Text(uuid_text(cursor.id)));
            }
            let sql = format!(
                "{select}{} ORDER BY {EPOCH}, w.uuid LIMIT ?",
                where_clause(&conditions)
            );

            async move {
                let mut query = sqlx::query(&sql);
                for value in values {
                    query = value.bind(query);
                }
                let rows = query.bind(limit as i64).fetch_all(&pool).await?;
                rows.iter()
                    .map(record_from_row)
                    .collect::<Result<Vec<_>, Error>>()
            }
        })
    }

    async fn upsert(&self, record: WeatherRecord) -> Result<RecordId, Error> {
        let schema = self.schema;

        let (id, outcome) = self
            .writer
            .execute(self.pool.clone(), move |pool| async move {
                let mut tx = pool.begin().await?;
                let written = write_record(&mut *tx, schema, &record, OnDuplicate::Update).await?;
                tx.commit().await?;
                Ok(written)
            })
            .await?;

        debug!("Upserted record {} ({:?})", id, outcome);
        Ok(id)
    }

    async fn bulk_write(
        &self,
        records: Vec<WeatherRecord>,
        on_duplicate: OnDuplicate,
    ) -> Result<Vec<BulkItem>, Error> {
        let mut items = Vec::with_capacity(records.len());
        let mut remaining = records.into_iter().peekable();

        while remaining.peek().is_some() {
            let batch: Vec<WeatherRecord> = remaining.by_ref().take(self.batch_size).collect();
            let ids: Vec<Option<RecordId>> = batch.iter().map(WeatherRecord::id).collect();
            let schema = self.schema;

            let written = self
                .writer
                .execute(self.pool.clone(), move |pool| async move {
                    write_batch(&pool, schema, batch, on_duplicate).await
                })
                .await;

            match written {
                Ok(batch_items) => items.extend(batch_items),
                Err(err) if err.is_unavailable() => return Err(err),
                Err(err) => {
                    warn!("Rolled back sub-batch of {} records: {}", ids.len(), err);
                    let reason = err.to_string();
                    items.extend(ids.into_iter().map(|id| BulkItem::failed(id, reason.clone())));
                }
            }
        }

        Ok(items)
    }

    async fn delete(&self, id: RecordId) -> Result<bool, Error> {
        let layout = self.schema.layout;

        self.writer
            .execute(self.pool.clone(), move |pool| async move {
                let key = uuid_text(id);
                let mut tx = pool.begin().await?;
                if layout == AirQualityLayout::Split {
                    sqlx::query("DELETE FROM air_quality_records WHERE uuid = ?")
                        .bind(&key)
                        .execute(&mut *tx)
                        .await?;
                }
                let deleted = sqlx::query("DELETE FROM weather_records WHERE uuid = ?")
                    .bind(&key)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                tx.commit().await?;
                Ok(deleted > 0)
            })
            .await
    }

    async fn count(&self, filter: &RecordFilter) -> Result<u64, Error> {
        let (conditions, values) = filter_clause(filter);
        let sql = format!(
            "SELECT COUNT(*) FROM weather_records w{}",
            where_clause(&conditions)
        );

        let mut query = sqlx::query(&sql);
        for value in values {
            query = value.bind(query);
        }
        let total: i64 = query.fetch_one(&self.pool).await?.try_get(0)?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn release(&self) {
        self.checkpoint().await;
        self.pool.close().await;
        info!("SQLite repository released");
    }
}

/// Writes one sub-batch in a single transaction, each item behind its own
/// savepoint so a failing item leaves the others intact.
async fn write_batch(
    pool: &SqlitePool,
    schema: Schema,
    batch: Vec<WeatherRecord>,
    on_duplicate: OnDuplicate,
) -> Result<Vec<BulkItem>, Error> {
    let mut tx = pool.begin().await?;
    let mut items = Vec::with_capacity(batch.len());

    for record in &batch {
        let mut savepoint = Connection::begin(&mut *tx).await?;
        match write_record(&mut *savepoint, schema, record, on_duplicate).await {
            Ok((id, outcome)) => {
                savepoint.commit().await?;
                items.push(BulkItem::written(id, outcome));
            }
            Err(err) if err.is_unavailable() => return Err(err),
            Err(err) => {
                savepoint.rollback().await?;
                debug!("Skipped record for {}: {}", record.location, err);
                items.push(BulkItem::failed(record.id(), err.to_string()));
            }
        }
    }

    tx.commit().await?;
    Ok(items)
}

/// Inserts or updates both halves of `record` on `conn`.
async fn write_record(
    conn: &mut SqliteConnection,
    schema: Schema,
    record: &WeatherRecord,
    on_duplicate: OnDuplicate,
) -> Result<(RecordId, UpsertOutcome), Error> {
    record.validate()?;

    let existing = match record.id() {
        Some(id) => {
            let found: Option<String> =
                sqlx::query_scalar("SELECT uuid FROM weather_records WHERE uuid = ?")
                    .bind(uuid_text(id))
                    .fetch_optional(&mut *conn)
                    .await?;
            if found.is_none() {
                return Err(Error::NotFound(id));
            }
            Some(id)
        }
        None => {
            let found: Option<String> = sqlx::query_scalar(
                "SELECT uuid FROM weather_records
                 WHERE location_country = ? AND location_name = ?
                   AND location_latitude = ? AND location_longitude = ?
                   AND local_datetime = ? AND local_timezone = ?",
            )
            .bind(record.location.country())
            .bind(record.location.name())
            .bind(record.location.latitude())
            .bind(record.location.longitude())
            .bind(record.observed.local_sql())
            .bind(record.location.timezone())
            .fetch_optional(&mut *conn)
            .await?;
            match (found.map(|id| parse_id(&id)).transpose()?, on_duplicate) {
                (Some(holder), OnDuplicate::Raise) => return Err(duplicate(record, holder)),
                (Some(holder), OnDuplicate::Ignore) => return Ok((holder, UpsertOutcome::Skipped)),
                (found, _) => found,
            }
        }
    };

    let (id, outcome) = match existing {
        Some(id) => {
            let update = sqlx::query(
                "UPDATE weather_records SET
                    location_country = ?, location_name = ?,
                    location_latitude = ?, location_longitude = ?, local_timezone = ?,
                    last_updated_epoch = ?, local_datetime = ?, air_temp_celsius = ?,
                    humidity = ?, apparent_temp_celsius = ?, atm_pressure_mbar = ?,
                    wind_speed_kmh = ?, wind_direction = ?, wind_gust_kmh = ?,
                    conditions_report = ?
                 WHERE uuid = ?",
            );
            bind_weather(update, record)
                .bind(uuid_text(id))
                .execute(&mut *conn)
                .await?;
            (id, UpsertOutcome::Updated)
        }
        None => {
            let id = RecordId::generate();
            let insert = sqlx::query(
                "INSERT INTO weather_records (
                    uuid, location_country, location_name, location_latitude,
                    location_longitude, local_timezone, last_updated_epoch, local_datetime,
                    air_temp_celsius, humidity, apparent_temp_celsius, atm_pressure_mbar,
                    wind_speed_kmh, wind_direction, wind_gust_kmh, conditions_report
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid_text(id));
            bind_weather(insert, record).execute(&mut *conn).await?;
            (id, UpsertOutcome::Created)
        }
    };

    write_air_quality(conn, schema, id, record.air_quality.as_ref()).await?;
    Ok((id, outcome))
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_weather<'q>(query: SqliteQuery<'q>, record: &'q WeatherRecord) -> SqliteQuery<'q> {
    let c = &record.conditions;
    query
        .bind(record.location.country())
        .bind(record.location.name())
        .bind(record.location.latitude())
        .bind(record.location.longitude())
        .bind(record.location.timezone())
        .bind(record.observed.epoch())
        .bind(record.observed.local_sql())
        .bind(c.temperature_celsius)
        .bind(i64::from(c.humidity))
        .bind(c.feels_like_celsius)
        .bind(c.pressure_mb)
        .bind(c.wind_kph)
        .bind(c.wind_direction.as_str())
        .bind(c.gust_kph)
        .bind(c.text.as_str())
}

const SPLIT_UPSERT: &str = "INSERT INTO air_quality_records (
        uuid, toxic_co, toxic_o3, toxic_no2, toxic_so2, toxic_pm25, toxic_pm10,
        aqi_epa, aqi_defra
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (uuid) DO UPDATE SET
        toxic_co = excluded.toxic_co,
        toxic_o3 = excluded.toxic_o3,
        toxic_no2 = excluded.toxic_no2,
        toxic_so2 = excluded.toxic_so2,
        toxic_pm25 = excluded.toxic_pm25,
        toxic_pm10 = excluded.toxic_pm10,
        aqi_epa = excluded.aqi_epa,
        aqi_defra = excluded.aqi_defra";

const SPLIT_UPSERT_ACCEPTABLE: &str = "INSERT INTO air_quality_records (
        uuid, toxic_co, toxic_o3, toxic_no2, toxic_so2, toxic_pm25, toxic_pm10,
        aqi_epa, aqi_defra, acceptable
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (uuid) DO UPDATE SET
        toxic_co = excluded.toxic_co,
        toxic_o3 = excluded.toxic_o3,
        toxic_no2 = excluded.toxic_no2,
        toxic_so2 = excluded.toxic_so2,
        toxic_pm25 = excluded.toxic_pm25,
        toxic_pm10 = excluded.toxic_pm10,
        aqi_epa = excluded.aqi_epa,
        aqi_defra = excluded.aqi_defra,
        acceptable = excluded.acceptable";

/// Replaces the air-quality half; `None` removes any stored one.
async fn write_air_quality(
    conn: &mut SqliteConnection,
    schema: Schema,
    id: RecordId,
    air_quality: Option<&AirQualityRecord>,
) -> Result<(), Error> {
    let key = uuid_text(id);

    match (schema.layout, air_quality) {
        (AirQualityLayout::Split, Some(aq)) => {
            let sql = if schema.acceptable_column {
                SPLIT_UPSERT_ACCEPTABLE
            } else {
                SPLIT_UPSERT
            };
            let mut upsert = sqlx::query(sql)
                .bind(&key)
                .bind(aq.carbon_monoxide)
                .bind(aq.ozone)
                .bind(aq.nitrogen_dioxide)
                .bind(aq.sulphur_dioxide)
                .bind(aq.pm2_5)
                .bind(aq.pm10)
                .bind(i64::from(aq.us_epa_index))
                .bind(i64::from(aq.gb_defra_index));
            if schema.acceptable_column {
                upsert = upsert.bind(aq.acceptable());
            }
            upsert.execute(&mut *conn).await?;
        }
        (AirQualityLayout::Split, None) => {
            sqlx::query("DELETE FROM air_quality_records WHERE uuid = ?")
                .bind(&key)
                .execute(&mut *conn)
                .await?;
        }
        (AirQualityLayout::Inline, aq) => {
            sqlx::query(
                "UPDATE weather_records SET
                    air_toxic_co = ?, air_toxic_o3 = ?, air_toxic_no2 = ?, air_toxic_so2 = ?,
                    air_toxic_pm25 = ?, air_toxic_pm10 = ?, aqi_epa = ?, aqi_defra = ?
                 WHERE uuid = ?",
            )
            .bind(aq.map(|a| a.carbon_monoxide))
            .bind(aq.map(|a| a.ozone))
            .bind(aq.map(|a| a.nitrogen_dioxide))
            .bind(aq.map(|a| a.sulphur_dioxide))
            .bind(aq.map(|a| a.pm2_5))
            .bind(aq.map(|a| a.pm10))
            .bind(aq.map(|a| i64::from(a.us_epa_index)))
            .bind(aq.map(|a| i64::from(a.gb_defra_index)))
            .bind(&key)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

#[derive(Debug, Clone)]
enum SqlValue {
    Text(String),
    Real(f64),
    Integer(i64),
}

impl SqlValue {
    fn bind(self, query: SqliteQuery<'_>) -> SqliteQuery<'_> {
        match self {
            SqlValue::Text(value) => query.bind(value),
            SqlValue::Real(value) => query.bind(value),
            SqlValue::Integer(value) => query.bind(value),
        }
    }
}

/// Translates a filter into conditions on the `w` alias plus their bindings.
fn filter_clause(filter: &RecordFilter) -> (Vec<String>, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    let mut push = |condition: String, value: SqlValue| {
        conditions.push(condition);
        values.push(value);
    };

    if let Some(country) = &filter.country {
        push("w.location_country = ?".into(), SqlValue::Text(country.clone()));
    }
    if let Some(name) = &filter.location_name {
        push("w.location_name = ?".into(), SqlValue::Text(name.clone()));
    }
    if let Some(position) = filter.position {
        push("w.location_latitude = ?".into(), SqlValue::Real(position.latitude));
        push("w.location_longitude = ?".into(), SqlValue::Real(position.longitude));
    }
    if let Some(timezone) = &filter.timezone {
        push("w.local_timezone = ?".into(), SqlValue::Text(timezone.clone()));
    }
    if let Some(from) = filter.observed_from {
        push(format!("{EPOCH} >= ?"), SqlValue::Integer(from.unix_timestamp()));
    }
    if let Some(until) = filter.observed_until {
        push(format!("{EPOCH} < ?"), SqlValue::Integer(until.unix_timestamp()));
    }
    if let Some(from) = filter.local_from {
        push("date(w.local_datetime) >= ?".into(), SqlValue::Text(from.to_string()));
    }
    if let Some(until) = filter.local_until {
        push("date(w.local_datetime) <= ?".into(), SqlValue::Text(until.to_string()));
    }
    if let Some(text) = &filter.condition {
        // SQLite's lower() folds ASCII only, matching RecordFilter::matches.
        push(
            "instr(lower(w.conditions_report), lower(?)) > 0".into(),
            SqlValue::Text(text.clone()),
        );
    }

    (conditions, values)
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn parse_id(value: &str) -> Result<RecordId, Error> {
    RecordId::from_str(value).map_err(|e| Error::Corrupt(format!("record id {value:?}: {e}")))
}

fn corrupt(err: impl std::fmt::Display) -> Error {
    Error::Corrupt(err.to_string())
}

/// Decodes a row produced by [`AirQualityLayout::select_records`].
fn record_from_row(row: &SqliteRow) -> Result<WeatherRecord, Error> {
    let id = parse_id(row.try_get::<&str, _>(0)?)?;

    let position = GeoPosition::new(row.try_get(3)?, row.try_get(4)?).map_err(corrupt)?;
    let location = Location::new(
        row.try_get::<String, _>(1)?,
        row.try_get::<String, _>(2)?,
        position,
        row.try_get::<String, _>(5)?,
    )
    .map_err(corrupt)?;

    let local = ObservationTime::parse_local(row.try_get(7)?).map_err(corrupt)?;
    let observed = ObservationTime::from_epoch(row.try_get(6)?, local).map_err(corrupt)?;

    let humidity: i64 = row.try_get(9)?;
    let conditions = Conditions {
        temperature_celsius: row.try_get(8)?,
        humidity: u8::try_from(humidity)
            .map_err(|_| Error::Corrupt(format!("humidity out of range: {humidity}")))?,
        feels_like_celsius: row.try_get(10)?,
        pressure_mb: row.try_get(11)?,
        wind_kph: row.try_get(12)?,
        wind_direction: CompassPoint::from_str(row.try_get(13)?).map_err(corrupt)?,
        gust_kph: row.try_get(14)?,
        text: row.try_get(15)?,
    };

    let mut record = WeatherRecord::new(location, observed, conditions);
    record.air_quality = air_quality_from_row(row)?;
    record.assign_id(id);
    Ok(record)
}

fn air_quality_from_row(row: &SqliteRow) -> Result<Option<AirQualityRecord>, Error> {
    let Some(us_epa_index) = row.try_get::<Option<i64>, _>(22)? else {
        return Ok(None);
    };
    let gb_defra_index: i64 = row
        .try_get::<Option<i64>, _>(23)?
        .ok_or_else(|| Error::Corrupt("air quality without UK-DEFRA index".into()))?;

    let concentration = |index: usize| -> Result<f64, Error> {
        row.try_get::<Option<f64>, _>(index)?
            .ok_or_else(|| Error::Corrupt(format!("air quality column {index} is NULL")))
    };
    let index = |value: i64| {
        u8::try_from(value).map_err(|_| Error::Corrupt(format!("air quality index {value}")))
    };

    Ok(Some(AirQualityRecord {
        carbon_monoxide: concentration(16)?,
        ozone: concentration(17)?,
        nitrogen_dioxide: concentration(18)?,
        sulphur_dioxide: concentration(19)?,
        pm2_5: concentration(20)?,
        pm10: concentration(21)?,
        us_epa_index: index(us_epa_index)?,
        gb_defra_index: index(gb_defra_index)?,
    }))
}
