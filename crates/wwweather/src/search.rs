//! Query construction over stored records.
//!
//! A [`RecordFilter`] is a conjunction of optional predicates. Backends
//! translate it into their own query language; [`RecordFilter::matches`] is
//! the reference semantics they must agree with.

use futures::{StreamExt, TryStreamExt};
use time::{Date, OffsetDateTime};

use crate::{
    db::{RecordRepository, RecordStream},
    Error, GeoPosition, Location, WeatherRecord,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub country: Option<String>,
    pub location_name: Option<String>,
    pub position: Option<GeoPosition>,
    pub timezone: Option<String>,
    /// Inclusive lower bound on the observation instant.
    pub observed_from: Option<OffsetDateTime>,
    /// Exclusive upper bound on the observation instant.
    pub observed_until: Option<OffsetDateTime>,
    /// Inclusive lower bound on the calendar date at the location.
    pub local_from: Option<Date>,
    /// Inclusive upper bound on the calendar date at the location.
    pub local_until: Option<Date>,
    /// Case-insensitive (ASCII) substring of the condition text.
    pub condition: Option<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one place: country, name and position must all match.
    pub fn location(mut self, location: &Location) -> Self {
        self.country = Some(location.country().to_owned());
        self.location_name = Some(location.name().to_owned());
        self.position = Some(location.position());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn location_name(mut self, name: impl Into<String>) -> Self {
        self.location_name = Some(name.into());
        self
    }

    pub fn position(mut self, position: GeoPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Observations in `[from, until)`.
    pub fn between(mut self, from: OffsetDateTime, until: OffsetDateTime) -> Self {
        self.observed_from = Some(from);
        self.observed_until = Some(until);
        self
    }

    pub fn observed_from(mut self, from: OffsetDateTime) -> Self {
        self.observed_from = Some(from);
        self
    }

    pub fn observed_until(mut self, until: OffsetDateTime) -> Self {
        self.observed_until = Some(until);
        self
    }

    /// Observations made on `date`, local time.
    pub fn local_date(self, date: Date) -> Self {
        self.local_dates(date, date)
    }

    /// Observations whose local date lies in `[from, to]`.
    pub fn local_dates(mut self, from: Date, to: Date) -> Self {
        self.local_from = Some(from);
        self.local_until = Some(to);
        self
    }

    pub fn condition_contains(mut self, text: impl Into<String>) -> Self {
        self.condition = Some(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &WeatherRecord) -> bool {
        let location = &record.location;
        let epoch = record.observed.epoch();
        let local_date = record.observed.local_date();

        self.country.as_deref().is_none_or(|c| c == location.country())
            && self
                .location_name
                .as_deref()
                .is_none_or(|n| n == location.name())
            && self.position.is_none_or(|p| p == location.position())
            && self
                .timezone
                .as_deref()
                .is_none_or(|tz| tz == location.timezone())
            && self
                .observed_from
                .is_none_or(|from| epoch >= from.unix_timestamp())
            && self
                .observed_until
                .is_none_or(|until| epoch < until.unix_timestamp())
            && self.local_from.is_none_or(|from| local_date >= from)
            && self.local_until.is_none_or(|until| local_date <= until)
            && self
                .condition
                .as_deref()
                .is_none_or(|needle| contains_ignore_ascii_case(&record.conditions.text, needle))
    }
}

pub(crate) fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

/// A filter plus a window over its ordered results.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub filter: RecordFilter,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(filter: RecordFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Lazily yields the records selected by `query`, in `(timestamp, id)` order.
pub fn search<R>(repository: &R, query: SearchQuery) -> RecordStream
where
    R: RecordRepository + ?Sized,
{
    let records = repository.find(query.filter).skip(query.offset);
    match query.limit {
        Some(limit) => records.take(limit).boxed(),
        None => records.boxed(),
    }
}

/// First record matching `filter`, if any.
pub async fn search_one<R>(repository: &R, filter: RecordFilter) -> Result<Option<WeatherRecord>, Error>
where
    R: RecordRepository + ?Sized,
{
    search(repository, SearchQuery::new(filter).limit(1))
        .try_next()
        .await
}
