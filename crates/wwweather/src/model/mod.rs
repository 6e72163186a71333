mod air_quality;
mod compass;
mod location;
mod record;

pub use air_quality::{AirQualityRecord, GB_DEFRA_INDEX_RANGE, US_EPA_INDEX_RANGE};
pub use compass::CompassPoint;
pub use location::{GeoPosition, Location};
pub use record::{Conditions, ObservationTime, RecordId, WeatherRecord};
