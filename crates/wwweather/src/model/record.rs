use std::{fmt, str::FromStr};

use time::{macros::format_description, Date, Duration, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use super::{AirQualityRecord, CompassPoint, Location};
use crate::{units, ValidationError};

/// Surrogate key of a stored `WeatherRecord`, assigned by the backend on first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Time-ordered, so ids of records written later sort after earlier ones.
    pub(crate) fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RecordId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

/// When an observation was taken: the absolute instant plus the wall-clock
/// time shown at the location.
///
/// Both are kept to whole seconds, the resolution of the stored timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationTime {
    pub instant: OffsetDateTime,
    pub local: PrimitiveDateTime,
}

impl ObservationTime {
    /// Sub-second parts of either value are dropped.
    pub fn new(instant: OffsetDateTime, local: PrimitiveDateTime) -> Self {
        Self {
            instant: instant - Duration::nanoseconds(instant.nanosecond().into()),
            local: local - Duration::nanoseconds(local.nanosecond().into()),
        }
    }

    pub fn from_epoch(epoch: i64, local: PrimitiveDateTime) -> Result<Self, ValidationError> {
        let instant = OffsetDateTime::from_unix_timestamp(epoch)
            .map_err(|_| ValidationError::out_of_range("timestamp", epoch))?;
        Ok(Self::new(instant, local))
    }

    /// Calendar date at the location.
    pub fn local_date(&self) -> Date {
        self.local.date()
    }

    pub fn epoch(&self) -> i64 {
        self.instant.unix_timestamp()
    }

    /// Local time as `YYYY-MM-DD HH:MM`, the shape used in tabular files.
    pub fn local_display(&self) -> String {
        self.local
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap_or_else(|_| self.local.to_string())
    }

    /// Local time with seconds.
    pub(crate) fn local_stored(&self) -> String {
        self.local
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .unwrap_or_else(|_| self.local.to_string())
    }

    /// Local time as SQL databases keep a `DATETIME`: `YYYY-MM-DD HH:MM:SS.ffffff`.
    pub(crate) fn local_sql(&self) -> String {
        self.local
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]"
            ))
            .unwrap_or_else(|_| self.local.to_string())
    }

    /// Parses `YYYY-MM-DD HH:MM`, falling back to `YYYY-MM-DD HH:MM:SS` with
    /// an optional fraction.
    pub fn parse_local(value: &str) -> Result<PrimitiveDateTime, ValidationError> {
        let value = value.trim();
        PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]"),
        )
        .or_else(|_| {
            PrimitiveDateTime::parse(
                value,
                format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
                ),
            )
        })
        .map_err(|_| ValidationError::Invalid("local time"))
    }
}

/// Stored weather measurements, in the units they are persisted in.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub temperature_celsius: f64,
    /// Relative humidity, percent.
    pub humidity: u8,
    pub feels_like_celsius: f64,
    pub pressure_mb: f64,
    pub wind_kph: f64,
    pub wind_direction: CompassPoint,
    pub gust_kph: f64,
    pub text: String,
}

/// A weather observation at one location and instant.
///
/// Only the stored attributes live here. Imperial values are computed by the
/// `*_fahrenheit`, `pressure_in`, `*_mph` accessors on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    id: Option<RecordId>,
    pub location: Location,
    pub observed: ObservationTime,
    pub conditions: Conditions,
    pub air_quality: Option<AirQualityRecord>,
}

impl WeatherRecord {
    pub fn new(location: Location, observed: ObservationTime, conditions: Conditions) -> Self {
        Self {
            id: None,
            location,
            observed,
            conditions,
            air_quality: None,
        }
    }

    pub fn with_air_quality(mut self, air_quality: AirQualityRecord) -> Self {
        self.air_quality = Some(air_quality);
        self
    }

    /// Targets an already stored record; an upsert then updates it in place.
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub fn temperature_fahrenheit(&self) -> f64 {
        units::celsius_to_fahrenheit(self.conditions.temperature_celsius)
    }

    pub fn feels_like_fahrenheit(&self) -> f64 {
        units::celsius_to_fahrenheit(self.conditions.feels_like_celsius)
    }

    pub fn pressure_in(&self) -> f64 {
        units::mbar_to_inhg(self.conditions.pressure_mb)
    }

    pub fn wind_mph(&self) -> f64 {
        units::kph_to_mph(self.conditions.wind_kph)
    }

    pub fn gust_mph(&self) -> f64 {
        units::kph_to_mph(self.conditions.gust_kph)
    }

    /// Checks stored values against their domain before a write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let c = &self.conditions;
        for (value, field) in [
            (c.temperature_celsius, "temperature"),
            (c.feels_like_celsius, "feels-like temperature"),
            (c.pressure_mb, "pressure"),
            (c.wind_kph, "wind speed"),
            (c.gust_kph, "gust speed"),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::Invalid(field));
            }
        }
        if c.humidity > 100 {
            return Err(ValidationError::out_of_range("humidity", c.humidity));
        }
        if c.pressure_mb <= 0.0 {
            return Err(ValidationError::out_of_range("pressure", c.pressure_mb));
        }
        if c.wind_kph < 0.0 {
            return Err(ValidationError::out_of_range("wind speed", c.wind_kph));
        }
        if c.gust_kph < 0.0 {
            return Err(ValidationError::out_of_range("gust speed", c.gust_kph));
        }
        if c.text.trim().is_empty() {
            return Err(ValidationError::Missing("condition"));
        }
        if let Some(aq) = &self.air_quality {
            aq.validate()?;
        }
        Ok(())
    }

    /// Position of this record in the `(timestamp, id)` order used by queries.
    pub(crate) fn order_key(&self) -> Option<(i64, RecordId)> {
        self.id.map(|id| (self.observed.epoch(), id))
    }
}

impl fmt::Display for WeatherRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.conditions;
        write!(
            f,
            "{} @ {} ({}) | T({:4.1}°C / {:5.1}°F) feels {:4.1}°C | H {:3}% | P({:6.1} mb / {:5.2} inHg) | v({:5.1} kph / {:5.1} mph) {} gust {:5.1} kph | {}",
            self.location,
            self.observed.local_display(),
            self.location.timezone(),
            c.temperature_celsius,
            self.temperature_fahrenheit(),
            c.feels_like_celsius,
            c.humidity,
            c.pressure_mb,
            self.pressure_in(),
            c.wind_kph,
            self.wind_mph(),
            c.wind_direction,
            c.gust_kph,
            c.text,
        )
    }
}
