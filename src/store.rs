use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{ProcessingStatus, ResponseRecord};

/// Durable home of Response Records
///
/// ## Versioning
///
/// Every record carries a `version`. `put` succeeds only when the caller's
/// copy has the version currently stored, and returns the record with the
/// version bumped. A stale copy yields `StoreError::ConcurrentConflict`;
/// the caller re-reads and re-applies its change.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Store a new record at version 1
    async fn insert(&self, record: ResponseRecord) -> Result<ResponseRecord, StoreError>;

    async fn get(&self, id: Uuid) -> Result<ResponseRecord, StoreError>;

    /// Version-checked full replace
    async fn put(&self, record: ResponseRecord) -> Result<ResponseRecord, StoreError>;

    /// Records, optionally limited to one campaign
    async fn list(&self, campaign_id: Option<Uuid>) -> Result<Vec<ResponseRecord>, StoreError>;

    /// Number of records per processing status
    async fn status_counts(
        &self,
        campaign_id: Option<Uuid>,
    ) -> Result<BTreeMap<ProcessingStatus, usize>, StoreError> {
        let mut counts = BTreeMap::new();
        for record in self.list(campaign_id).await? {
            *counts.entry(record.processing_status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

/// Process-local store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, ResponseRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStore for InMemoryStore {
    async fn insert(&self, mut record: ResponseRecord) -> Result<ResponseRecord, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        record.version = 1;
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<ResponseRecord, StoreError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn put(&self, mut record: ResponseRecord) -> Result<ResponseRecord, StoreError> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.id)
            .ok_or(StoreError::NotFound(record.id))?;

        if stored.version != record.version {
            return Err(StoreError::ConcurrentConflict {
                id: record.id,
                expected_version: record.version,
            });
        }

        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    async fn list(&self, campaign_id: Option<Uuid>) -> Result<Vec<ResponseRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .values()
            .filter(|r| campaign_id.is_none_or(|c| r.campaign_id == c))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.timestamps.submitted_at, r.id));
        Ok(matching)
    }
}
