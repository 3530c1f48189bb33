//! Mock implementation of KnowledgeRepository for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::{DbError, KnowledgeRepository};
use crate::knowledge::{KnowledgeRecord, Query, RecordPatch};

/// In-memory KnowledgeRepository that evaluates queries directly against
/// stored records, keeping insertion order.
#[derive(Clone)]
pub struct MockKnowledgeRepository {
    records: Arc<RwLock<Vec<KnowledgeRecord>>>,
}

impl Default for MockKnowledgeRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKnowledgeRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a mock repository pre-populated with records.
    pub fn with_records(records: Vec<KnowledgeRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Gets a snapshot of all records in the mock.
    pub async fn snapshot(&self) -> Vec<KnowledgeRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl KnowledgeRepository for MockKnowledgeRepository {
    async fn find(&self, query: &Query, limit: usize) -> Result<Vec<KnowledgeRecord>, DbError> {
        let records = self.records.read().await;
        let mut found = Vec::new();
        for record in records.iter() {
            if limit > 0 && found.len() >= limit {
                break;
            }
            if query
                .matches(record)
                .map_err(|e| DbError::Query(e.to_string()))?
            {
                found.push(record.clone());
            }
        }
        Ok(found)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>, DbError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, record: &KnowledgeRecord) -> Result<KnowledgeRecord, DbError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(DbError::Constraint(format!(
                "Knowledge record with id '{}' already exists",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<(), DbError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DbError::record_not_found(id))?;
        patch.apply(record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<u64, DbError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok((before - records.len()) as u64)
    }
}
