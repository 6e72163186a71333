//! Header analysis and row parsing for imported files.

use std::{collections::HashMap, str::FromStr};

use csv::StringRecord;

use super::required_columns;
use crate::{
    AirQualityRecord, CompassPoint, Conditions, Error, GeoPosition, Location, ObservationTime,
    ValidationError, WeatherRecord,
};

/// Position of every required column in the file being read.
#[derive(Debug, Clone)]
pub(crate) struct ColumnIndex {
    name_to_index: HashMap<&'static str, usize>,
}

impl ColumnIndex {
    /// Fails with [`Error::FatalFormat`] naming every required column the
    /// header lacks. Unknown and derived columns are ignored.
    pub fn analyze(headers: &StringRecord) -> Result<Self, Error> {
        let mut name_to_index = HashMap::new();
        let mut missing = Vec::new();

        for column in required_columns() {
            match headers.iter().position(|header| header.trim() == column) {
                Some(index) => {
                    name_to_index.insert(column, index);
                }
                None => missing.push(column),
            }
        }

        if !missing.is_empty() {
            return Err(Error::FatalFormat(format!(
                "header is missing required columns: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { name_to_index })
    }

    /// Trimmed cell, `None` when empty or absent from a short row.
    fn cell<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.name_to_index
            .get(column)
            .and_then(|index| row.get(*index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn text<'r>(
        &self,
        row: &'r StringRecord,
        column: &str,
        field: &'static str,
    ) -> Result<&'r str, ValidationError> {
        self.cell(row, column).ok_or(ValidationError::Missing(field))
    }

    fn number<T: FromStr>(
        &self,
        row: &StringRecord,
        column: &str,
        field: &'static str,
    ) -> Result<T, ValidationError> {
        self.text(row, column, field)?
            .parse()
            .map_err(|_| ValidationError::Invalid(field))
    }

    /// Builds a validated record from one data row.
    pub fn parse_row(&self, row: &StringRecord) -> Result<WeatherRecord, ValidationError> {
        let position = GeoPosition::new(
            self.number(row, "latitude", "latitude")?,
            self.number(row, "longitude", "longitude")?,
        )?;
        let location = Location::new(
            self.text(row, "country", "country")?,
            self.text(row, "location_name", "location name")?,
            position,
            self.text(row, "timezone", "timezone")?,
        )?;

        let local = ObservationTime::parse_local(self.text(row, "last_updated", "local time")?)?;
        let observed =
            ObservationTime::from_epoch(self.number(row, "last_updated_epoch", "timestamp")?, local)?;

        let humidity: i64 = self.number(row, "humidity", "humidity")?;
        let conditions = Conditions {
            temperature_celsius: self.number(row, "temperature_celsius", "temperature")?,
            humidity: u8::try_from(humidity)
                .map_err(|_| ValidationError::out_of_range("humidity", humidity))?,
            feels_like_celsius: self.number(row, "feels_like_celsius", "feels-like temperature")?,
            pressure_mb: self.number(row, "pressure_mb", "pressure")?,
            wind_kph: self.number(row, "wind_kph", "wind speed")?,
            wind_direction: CompassPoint::from_str(self.text(
                row,
                "wind_direction",
                "wind direction",
            )?)?,
            gust_kph: self.number(row, "gust_kph", "gust speed")?,
            text: self.text(row, "condition_text", "condition")?.to_owned(),
        };

        let mut record = WeatherRecord::new(location, observed, conditions);
        record.air_quality = self.air_quality(row)?;
        record.validate()?;
        Ok(record)
    }

    /// All eight cells empty means the observation has no air-quality half.
    fn air_quality(&self, row: &StringRecord) -> Result<Option<AirQualityRecord>, ValidationError> {
        const COLUMNS: [&str; 8] = [
            "air_quality_Carbon_Monoxide",
            "air_quality_Ozone",
            "air_quality_Nitrogen_dioxide",
            "air_quality_Sulphur_dioxide",
            "air_quality_PM2.5",
            "air_quality_PM10",
            "air_quality_us-epa-index",
            "air_quality_gb-defra-index",
        ];
        if COLUMNS.iter().all(|column| self.cell(row, column).is_none()) {
            return Ok(None);
        }

        Ok(Some(AirQualityRecord {
            carbon_monoxide: self.number(row, COLUMNS[0], "carbon monoxide")?,
            ozone: self.number(row, COLUMNS[1], "ozone")?,
            nitrogen_dioxide: self.number(row, COLUMNS[2], "nitrogen dioxide")?,
            sulphur_dioxide: self.number(row, COLUMNS[3], "sulphur dioxide")?,
            pm2_5: self.number(row, COLUMNS[4], "PM2.5")?,
            pm10: self.number(row, COLUMNS[5], "PM10")?,
            us_epa_index: self.number(row, COLUMNS[6], "US-EPA index")?,
            gb_defra_index: self.number(row, COLUMNS[7], "UK-DEFRA index")?,
        }))
    }
}
