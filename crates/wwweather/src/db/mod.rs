//! Storage backends for weather records.
//!
//! Callers depend on [`RecordRepository`] only; [`crate::open_repository`]
//! picks the concrete variant from configuration.

mod layout;
mod memory;
mod sqlite;

use std::{collections::VecDeque, future::Future};

use async_trait::async_trait;
use clap::ValueEnum;
use futures::{stream::BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::{Error, RecordFilter, RecordId, WeatherRecord};

pub use layout::AirQualityLayout;
pub use memory::MemoryRepository;
pub use sqlite::{DatabaseWriter, SqliteRepository};

/// Lazy, finite sequence of records in `(timestamp, id)` order.
pub type RecordStream = BoxStream<'static, Result<WeatherRecord, Error>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Left untouched because its business key was already stored.
    Skipped,
    Failed(String),
}

impl UpsertOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UpsertOutcome::Failed(_))
    }
}

/// What a bulk write does with an item whose business key is already stored
/// under another record. Items carrying an id are always written to that id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnDuplicate {
    /// Report the item as failed.
    Raise,
    /// Keep the stored record and report the item as skipped.
    Ignore,
    /// Replace the stored record.
    #[default]
    Update,
}

/// Result for one input item of a bulk write, reported in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    /// Effective id; for failures, the id the item carried, if any.
    pub id: Option<RecordId>,
    pub outcome: UpsertOutcome,
}

impl BulkItem {
    pub fn written(id: RecordId, outcome: UpsertOutcome) -> Self {
        Self {
            id: Some(id),
            outcome,
        }
    }

    pub fn failed(id: Option<RecordId>, reason: impl Into<String>) -> Self {
        Self {
            id,
            outcome: UpsertOutcome::Failed(reason.into()),
        }
    }
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Fails with [`Error::NotFound`] when no record has this id.
    async fn get(&self, id: RecordId) -> Result<WeatherRecord, Error>;

    /// Restartable: every call starts a fresh pass over the matching records.
    fn find(&self, filter: RecordFilter) -> RecordStream;

    /// Inserts a record without id (or updates the one sharing its business
    /// key), or updates the record with the given id. The weather and
    /// air-quality halves are written atomically.
    async fn upsert(&self, record: WeatherRecord) -> Result<RecordId, Error>;

    /// Writes every item independently; one failing item never aborts the
    /// batch. Only connectivity failures end the call early.
    async fn bulk_write(
        &self,
        records: Vec<WeatherRecord>,
        on_duplicate: OnDuplicate,
    ) -> Result<Vec<BulkItem>, Error>;

    /// [`RecordRepository::bulk_write`] replacing duplicates.
    async fn bulk_upsert(&self, records: Vec<WeatherRecord>) -> Result<Vec<BulkItem>, Error> {
        self.bulk_write(records, OnDuplicate::Update).await
    }

    /// Hard delete, cascading to the air-quality half. `false` if absent.
    async fn delete(&self, id: RecordId) -> Result<bool, Error>;

    async fn count(&self, filter: &RecordFilter) -> Result<u64, Error>;

    /// Releases connections and flushes pending state.
    async fn release(&self) {}
}

/// Keyset position of the last record handed out by a paged query.
/// Error for an item rejected under [`OnDuplicate::Raise`].
pub(crate) fn duplicate(record: &WeatherRecord, holder: RecordId) -> Error {
    Error::Conflict(format!(
        "duplicate of {holder}: {} at {}",
        record.location,
        record.observed.local_display()
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageCursor {
    pub epoch: i64,
    pub id: RecordId,
}

struct PageState<F> {
    fetch_page: F,
    cursor: Option<PageCursor>,
    buffered: VecDeque<WeatherRecord>,
    exhausted: bool,
}

/// Builds a record stream that pulls `page_size` records at a time from
/// `fetch_page`, resuming after the last record seen.
pub(crate) fn paged_records<F, Fut>(page_size: usize, fetch_page: F) -> RecordStream
where
    F: Fn(Option<PageCursor>, usize) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<WeatherRecord>, Error>> + Send + 'static,
{
    let page_size = page_size.max(1);
    let state = PageState {
        fetch_page,
        cursor: None,
        buffered: VecDeque::new(),
        exhausted: false,
    };

    futures::stream::try_unfold(state, move |mut state| async move {
        if state.buffered.is_empty() && !state.exhausted {
            let page = (state.fetch_page)(state.cursor, page_size).await?;
            state.exhausted = page.len() < page_size;
            state.buffered.extend(page);
        }

        let Some(record) = state.buffered.pop_front() else {
            return Ok(None);
        };
        if let Some((epoch, id)) = record.order_key() {
            state.cursor = Some(PageCursor { epoch, id });
        }
        Ok(Some((record, state)))
    })
    .boxed()
}
