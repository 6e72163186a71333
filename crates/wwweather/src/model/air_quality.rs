use crate::ValidationError;

/// Air-quality half of an observation, linked 1-to-1 to its `WeatherRecord`.
///
/// Concentrations are in μg/m³.
#[derive(Debug, Clone, PartialEq)]
pub struct AirQualityRecord {
    pub carbon_monoxide: f64,
    pub ozone: f64,
    pub nitrogen_dioxide: f64,
    pub sulphur_dioxide: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    /// US EPA index, 1 (good) to 6 (hazardous).
    pub us_epa_index: u8,
    /// UK DEFRA index, 1 (low) to 10 (very high).
    pub gb_defra_index: u8,
}

pub const US_EPA_INDEX_RANGE: std::ops::RangeInclusive<u8> = 1..=6;
pub const GB_DEFRA_INDEX_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

impl AirQualityRecord {
    /// Neither index reports unhealthy air: US-EPA at most 3 and UK-DEFRA below 7.
    pub fn acceptable(&self) -> bool {
        !(self.us_epa_index > 3 || self.gb_defra_index >= 7)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let concentrations = [
            (self.carbon_monoxide, "carbon monoxide"),
            (self.ozone, "ozone"),
            (self.nitrogen_dioxide, "nitrogen dioxide"),
            (self.sulphur_dioxide, "sulphur dioxide"),
            (self.pm2_5, "PM2.5"),
            (self.pm10, "PM10"),
        ];
        for (value, field) in concentrations {
            if !value.is_finite() {
                return Err(ValidationError::Invalid(field));
            }
        }
        if !US_EPA_INDEX_RANGE.contains(&self.us_epa_index) {
            return Err(ValidationError::out_of_range("US-EPA index", self.us_epa_index));
        }
        if !GB_DEFRA_INDEX_RANGE.contains(&self.gb_defra_index) {
            return Err(ValidationError::out_of_range(
                "UK-DEFRA index",
                self.gb_defra_index,
            ));
        }
        Ok(())
    }
}
