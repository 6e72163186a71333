use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::Arc,
};

use async_trait::async_trait;
use log::debug;
use time::PrimitiveDateTime;
use tokio::sync::RwLock;

use super::{
    duplicate, paged_records, BulkItem, OnDuplicate, RecordRepository, RecordStream,
    UpsertOutcome,
};
use crate::{Error, RecordFilter, RecordId, RepositoryConfig, WeatherRecord};

/// Identity of an observation independent of its surrogate id: the place
/// plus the local wall time and its timezone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BusinessKey {
    country: String,
    name: String,
    latitude: u64,
    longitude: u64,
    local: PrimitiveDateTime,
    timezone: String,
}

impl BusinessKey {
    fn of(record: &WeatherRecord) -> Self {
        // `+ 0.0` folds -0.0 into 0.0 so both hash alike, as they compare in SQL.
        Self {
            country: record.location.country().to_owned(),
            name: record.location.name().to_owned(),
            latitude: (record.location.latitude() + 0.0).to_bits(),
            longitude: (record.location.longitude() + 0.0).to_bits(),
            local: record.observed.local,
            timezone: record.location.timezone().to_owned(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<(i64, RecordId), WeatherRecord>,
    epochs: HashMap<RecordId, i64>,
    keys: HashMap<BusinessKey, RecordId>,
}

impl State {
    fn lookup(&self, id: RecordId) -> Option<&WeatherRecord> {
        let epoch = self.epochs.get(&id)?;
        self.records.get(&(*epoch, id))
    }

    fn remove(&mut self, id: RecordId) -> Option<WeatherRecord> {
        let epoch = self.epochs.remove(&id)?;
        let record = self.records.remove(&(epoch, id))?;
        self.keys.remove(&BusinessKey::of(&record));
        Some(record)
    }

    fn store(
        &mut self,
        mut record: WeatherRecord,
        on_duplicate: OnDuplicate,
    ) -> Result<(RecordId, UpsertOutcome), Error> {
        record.validate()?;
        let key = BusinessKey::of(&record);

        let existing = match record.id() {
            Some(id) if !self.epochs.contains_key(&id) => return Err(Error::NotFound(id)),
            Some(id) => Some(id),
            None => match (self.keys.get(&key).copied(), on_duplicate) {
                (Some(holder), OnDuplicate::Raise) => return Err(duplicate(&record, holder)),
                (Some(holder), OnDuplicate::Ignore) => return Ok((holder, UpsertOutcome::Skipped)),
                (found, _) => found,
            },
        };
        if let Some(holder) = self.keys.get(&key) {
            if Some(*holder) != existing {
                return Err(Error::Conflict(format!(
                    "{} at {} is already stored as {}",
                    record.location,
                    record.observed.local_display(),
                    holder
                )));
            }
        }

        let (id, outcome) = match existing {
            Some(id) => {
                self.remove(id);
                (id, UpsertOutcome::Updated)
            }
            None => (RecordId::generate(), UpsertOutcome::Created),
        };

        record.assign_id(id);
        let epoch = record.observed.epoch();
        self.epochs.insert(id, epoch);
        self.keys.insert(key, id);
        self.records.insert((epoch, id), record);
        Ok((id, outcome))
    }
}

/// Process-local backend with the same contract as the relational one.
///
/// Nothing is persisted; clones share the same records.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    state: Arc<RwLock<State>>,
    batch_size: usize,
    page_size: usize,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::from_config(&RepositoryConfig::default())
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self {
            state: Arc::default(),
            batch_size: config.batch_size.max(1),
            page_size: config.page_size.max(1),
        }
    }
}

#[async_trait]
impl RecordRepository for MemoryRepository {
    async fn get(&self, id: RecordId) -> Result<WeatherRecord, Error> {
        self.state
            .read()
            .await
            .lookup(id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    fn find(&self, filter: RecordFilter) -> RecordStream {
        let state = self.state.clone();

        paged_records(self.page_size, move |cursor, limit| {
            let state = state.clone();
            let filter = filter.clone();
            async move {
                let lower = match cursor {
                    Some(cursor) => Bound::Excluded((cursor.epoch, cursor.id)),
                    None => Bound::Unbounded,
                };
                let state = state.read().await;
                let page = state
                    .records
                    .range((lower, Bound::Unbounded))
                    .map(|(_, record)| record)
                    .filter(|record| filter.matches(record))
                    .take(limit)
                    .cloned()
                    .collect::<Vec<_>>();
                Ok(page)
            }
        })
    }

    async fn upsert(&self, record: WeatherRecord) -> Result<RecordId, Error> {
        let (id, outcome) = self
            .state
            .write()
            .await
            .store(record, OnDuplicate::Update)?;
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
            let mut state = self.state.write().await;
            for record in remaining.by_ref().take(self.batch_size) {
                let carried = record.id();
                items.push(match state.store(record, on_duplicate) {
                    Ok((id, outcome)) => BulkItem::written(id, outcome),
                    Err(err) => BulkItem::failed(carried, err.to_string()),
                });
            }
        }

        Ok(items)
    }

    async fn delete(&self, id: RecordId) -> Result<bool, Error> {
        Ok(self.state.write().await.remove(id).is_some())
    }

    async fn count(&self, filter: &RecordFilter) -> Result<u64, Error> {
        let state = self.state.read().await;
        Ok(state.records.values().filter(|r| filter.matches(r)).count() as u64)
    }
}
