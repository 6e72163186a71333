use std::fmt;

use crate::ValidationError;

/// Geographical position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() {
            return Err(ValidationError::Invalid("latitude"));
        }
        if !longitude.is_finite() {
            return Err(ValidationError::Invalid("longitude"));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::out_of_range("latitude", latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::out_of_range("longitude", longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Where an observation was taken.
///
/// Immutable once built: a moved station is a new `Location`, never an edit.
/// Identity is the `(country, name, latitude, longitude)` tuple; the timezone
/// rides along for display of local times.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    country: String,
    name: String,
    position: GeoPosition,
    timezone: String,
}

impl Location {
    pub fn new(
        country: impl Into<String>,
        name: impl Into<String>,
        position: GeoPosition,
        timezone: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let country = non_blank(country.into(), "country")?;
        let name = non_blank(name.into(), "location name")?;
        let timezone = non_blank(timezone.into(), "timezone")?;
        Ok(Self {
            country,
            name,
            position,
            timezone,
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> GeoPosition {
        self.position
    }

    pub fn latitude(&self) -> f64 {
        self.position.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.position.longitude
    }

    /// IANA timezone id, e.g. `Europe/Kyiv`.
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// True when both values name the same place, regardless of timezone label.
    pub fn same_place(&self, other: &Location) -> bool {
        self.country == other.country && self.name == other.name && self.position == other.position
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} ({:.4}, {:.4})",
            self.name, self.country, self.position.latitude, self.position.longitude
        )
    }
}

fn non_blank(value: String, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_owned())
    }
}
