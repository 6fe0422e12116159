use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{HistoryQuery, StoreTransaction, VersionQuery, VersionStore};
use crate::document::model::{
    DocumentVersion, HistoryVersion, NewHistoryVersion, NewVersion, Status,
};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_row_id: i64,
    last_history_id: i64,
    /// Rows per content type uid.
    rows: BTreeMap<String, Vec<DocumentVersion>>,
    history: Vec<HistoryVersion>,
}

impl MemoryState {
    fn find(&self, uid: &str, query: &VersionQuery) -> Vec<DocumentVersion> {
        let mut found: Vec<_> = self
            .rows
            .get(uid)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        found.sort_by(|a, b| a.locale.cmp(&b.locale).then(a.id.cmp(&b.id)));
        paginate(found, query.limit, query.offset)
    }

    fn create(&mut self, uid: &str, version: NewVersion) -> StoreResult<DocumentVersion> {
        let rows = self.rows.entry(uid.to_string()).or_default();
        let taken = rows.iter().any(|r| {
            r.document_id == version.document_id
                && r.locale == version.locale
                && r.status == version.status
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "{} already has a {} row for locale {:?}",
                version.document_id, version.status, version.locale
            )));
        }

        self.last_row_id += 1;
        let now = Utc::now();
        let row = DocumentVersion {
            id: self.last_row_id,
            document_id: version.document_id,
            locale: version.locale,
            status: version.status,
            created_at: now,
            updated_at: now,
            published_at: (version.status == Status::Published).then_some(now),
            data: version.data,
        };
        rows.push(row.clone());
        Ok(row)
    }

    fn replace(&mut self, uid: &str, id: i64, data: Map<String, Value>) -> StoreResult<DocumentVersion> {
        let row = self
            .rows
            .get_mut(uid)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .ok_or(StoreError::MissingRow(id))?;
        row.data = data;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    fn delete(&mut self, uid: &str, query: &VersionQuery) -> u64 {
        let Some(rows) = self.rows.get_mut(uid) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|r| !query.matches(r));
        (before - rows.len()) as u64
    }

    fn record_history(&mut self, version: NewHistoryVersion) -> HistoryVersion {
        self.last_history_id += 1;
        let record = HistoryVersion {
            id: self.last_history_id,
            content_type: version.content_type,
            related_document_id: version.related_document_id,
            locale: version.locale,
            status: version.status,
            data: version.data,
            schema: version.schema,
            created_at: Utc::now(),
            created_by: version.created_by,
        };
        self.history.push(record.clone());
        record
    }
}

fn paginate<T>(items: Vec<T>, limit: Option<usize>, offset: usize) -> Vec<T> {
    items
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Process-local store. Transactions are serialized: one holds the state lock
/// from `begin` until commit or rollback and works on a private copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryVersionStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn find(&self, uid: &str, query: &VersionQuery) -> StoreResult<Vec<DocumentVersion>> {
        Ok(self.state.lock().await.find(uid, query))
    }

    async fn find_history(&self, query: &HistoryQuery) -> StoreResult<Vec<HistoryVersion>> {
        let state = self.state.lock().await;
        let found: Vec<_> = state
            .history
            .iter()
            .rev()
            .filter(|h| query.matches(h))
            .cloned()
            .collect();
        Ok(paginate(found, query.limit, query.offset))
    }

    async fn find_history_version(&self, id: i64) -> StoreResult<Option<HistoryVersion>> {
        let state = self.state.lock().await;
        Ok(state.history.iter().find(|h| h.id == id).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find(&mut self, uid: &str, query: &VersionQuery) -> StoreResult<Vec<DocumentVersion>> {
        Ok(self.working.find(uid, query))
    }

    async fn create(&mut self, uid: &str, version: NewVersion) -> StoreResult<DocumentVersion> {
        self.working.create(uid, version)
    }

    async fn replace(
        &mut self,
        uid: &str,
        id: i64,
        data: Map<String, Value>,
    ) -> StoreResult<DocumentVersion> {
        self.working.replace(uid, id, data)
    }

    async fn delete(&mut self, uid: &str, query: &VersionQuery) -> StoreResult<u64> {
        Ok(self.working.delete(uid, query))
    }

    async fn record_history(&mut self, version: NewHistoryVersion) -> StoreResult<HistoryVersion> {
        Ok(self.working.record_history(version))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
