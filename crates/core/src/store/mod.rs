//! Persistence of physical rows and history versions.
//!
//! Every row operation is scoped to one content type uid; stores hold no
//! cross-content-type knowledge. Writes go through a [`StoreTransaction`] so a
//! mutation and its history snapshot commit or roll back together.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::document::model::{
    DocumentVersion, HistoryVersion, NewHistoryVersion, NewVersion, Status,
};
use crate::error::StoreResult;

/// Locale condition of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocaleFilter {
    #[default]
    Any,
    /// Exactly this locale; `None` matches locale-agnostic rows.
    Is(Option<String>),
    /// Any locale except this one.
    Not(String),
}

impl LocaleFilter {
    pub fn matches(&self, locale: Option<&str>) -> bool {
        match self {
            LocaleFilter::Any => true,
            LocaleFilter::Is(expected) => expected.as_deref() == locale,
            LocaleFilter::Not(excluded) => locale.is_some_and(|l| l != excluded),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionQuery {
    pub document_id: Option<String>,
    pub locale: LocaleFilter,
    pub status: Option<Status>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl VersionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            ..Self::default()
        }
    }

    pub fn locale(mut self, locale: Option<&str>) -> Self {
        self.locale = LocaleFilter::Is(locale.map(str::to_string));
        self
    }

    pub fn not_locale(mut self, locale: &str) -> Self {
        self.locale = LocaleFilter::Not(locale.to_string());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn page(mut self, limit: Option<usize>, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn matches(&self, version: &DocumentVersion) -> bool {
        self.document_id
            .as_ref()
            .map_or(true, |id| *id == version.document_id)
            && self.locale.matches(version.locale.as_deref())
            && self.status.map_or(true, |status| status == version.status)
    }
}

/// History lookup for one document, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub content_type: String,
    pub related_document_id: String,
    pub locale: LocaleFilter,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl HistoryQuery {
    pub fn new(content_type: impl Into<String>, related_document_id: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            related_document_id: related_document_id.into(),
            locale: LocaleFilter::Any,
            limit: None,
            offset: 0,
        }
    }

    pub fn matches(&self, version: &HistoryVersion) -> bool {
        version.content_type == self.content_type
            && version.related_document_id == self.related_document_id
            && self.locale.matches(version.locale.as_deref())
    }
}

/// Unit of work. Dropping without `commit` discards every write.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find(&mut self, uid: &str, query: &VersionQuery) -> StoreResult<Vec<DocumentVersion>>;

    /// Insert a row. Fails with [`StoreError::Conflict`](crate::error::StoreError::Conflict)
    /// when (documentId, locale, status) is already taken.
    async fn create(&mut self, uid: &str, version: NewVersion) -> StoreResult<DocumentVersion>;

    /// Overwrite the data of row `id` and bump its `updatedAt`.
    async fn replace(
        &mut self,
        uid: &str,
        id: i64,
        data: Map<String, Value>,
    ) -> StoreResult<DocumentVersion>;

    async fn delete(&mut self, uid: &str, query: &VersionQuery) -> StoreResult<u64>;

    async fn record_history(&mut self, version: NewHistoryVersion) -> StoreResult<HistoryVersion>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Rows matching `query`, ordered by locale (nulls first) then id.
    async fn find(&self, uid: &str, query: &VersionQuery) -> StoreResult<Vec<DocumentVersion>>;

    async fn find_history(&self, query: &HistoryQuery) -> StoreResult<Vec<HistoryVersion>>;

    async fn find_history_version(&self, id: i64) -> StoreResult<Option<HistoryVersion>>;

    async fn ping(&self) -> StoreResult<()>;
}
