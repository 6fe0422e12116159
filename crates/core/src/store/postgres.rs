use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder, Transaction};

use super::{HistoryQuery, LocaleFilter, StoreTransaction, VersionQuery, VersionStore};
use crate::author::AuthorRef;
use crate::document::model::{
    DocumentVersion, HistoryVersion, NewHistoryVersion, NewVersion,
};
use crate::error::{StoreError, StoreResult};

const VERSION_COLUMNS: &str =
    "id, document_id, locale, status, data, created_at, updated_at, published_at";
const HISTORY_COLUMNS: &str =
    "id, content_type, related_document_id, locale, status, data, schema, created_at, created_by_id";

#[derive(Debug, FromRow)]
struct VersionRow {
    id: i64,
    document_id: String,
    locale: Option<String>,
    status: String,
    data: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}

impl TryFrom<VersionRow> for DocumentVersion {
    type Error = StoreError;

    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        Ok(DocumentVersion {
            id: row.id,
            document_id: row.document_id,
            locale: row.locale,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("document_versions.{}: {e}", row.id)))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
            data: row.data.0,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: i64,
    content_type: String,
    related_document_id: String,
    locale: Option<String>,
    status: String,
    data: Json<Value>,
    schema: Json<Value>,
    created_at: DateTime<Utc>,
    created_by_id: Option<String>,
}

impl TryFrom<HistoryRow> for HistoryVersion {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(HistoryVersion {
            id: row.id,
            content_type: row.content_type,
            related_document_id: row.related_document_id,
            locale: row.locale,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("history_versions.{}: {e}", row.id)))?,
            data: row.data.0,
            schema: row.schema.0,
            created_at: row.created_at,
            created_by: row.created_by_id.map(AuthorRef::new),
        })
    }
}

fn push_locale(qb: &mut QueryBuilder<'_, Postgres>, column: &str, filter: &LocaleFilter) {
    match filter {
        LocaleFilter::Any => {}
        LocaleFilter::Is(None) => {
            qb.push(format!(" AND {column} IS NULL"));
        }
        LocaleFilter::Is(Some(locale)) => {
            qb.push(format!(" AND {column} = ")).push_bind(locale.clone());
        }
        LocaleFilter::Not(locale) => {
            qb.push(format!(" AND {column} <> ")).push_bind(locale.clone());
        }
    }
}

fn push_version_filters(qb: &mut QueryBuilder<'_, Postgres>, uid: &str, query: &VersionQuery) {
    qb.push(" WHERE content_type = ").push_bind(uid.to_string());
    if let Some(document_id) = &query.document_id {
        qb.push(" AND document_id = ").push_bind(document_id.clone());
    }
    push_locale(qb, "locale", &query.locale);
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, limit: Option<usize>, offset: usize) {
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(sql_count(limit));
    }
    if offset > 0 {
        qb.push(" OFFSET ").push_bind(sql_count(offset));
    }
}

/// Postgres takes LIMIT and OFFSET as BIGINT; larger values saturate.
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn conflict_or(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what()),
        _ => StoreError::Database(err),
    }
}

/// Version lookup. With `lock` the matched rows stay locked until the
/// surrounding transaction ends, so read-modify-write sequences serialize.
fn select_versions<'a>(uid: &str, query: &VersionQuery, lock: bool) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {VERSION_COLUMNS} FROM document_versions"));
    push_version_filters(&mut qb, uid, query);
    qb.push(" ORDER BY locale ASC NULLS FIRST, id ASC");
    push_page(&mut qb, query.limit, query.offset);
    if lock {
        qb.push(" FOR UPDATE");
    }
    qb
}

async fn find_versions<'e>(
    exec: impl PgExecutor<'e>,
    uid: &str,
    query: &VersionQuery,
    lock: bool,
) -> StoreResult<Vec<DocumentVersion>> {
    let mut qb = select_versions(uid, query, lock);
    let rows: Vec<VersionRow> = qb.build_query_as().fetch_all(exec).await?;
    rows.into_iter().map(DocumentVersion::try_from).collect()
}

/// PostgreSQL-backed store. Uniqueness of (content type, document, locale,
/// status) is enforced by the `document_versions_unique_row` constraint.
#[derive(Debug, Clone)]
pub struct PgVersionStore {
    pool: PgPool,
}

impl PgVersionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn find(&self, uid: &str, query: &VersionQuery) -> StoreResult<Vec<DocumentVersion>> {
        find_versions(&self.pool, uid, query, false).await
    }

    async fn find_history(&self, query: &HistoryQuery) -> StoreResult<Vec<HistoryVersion>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {HISTORY_COLUMNS} FROM history_versions"));
        qb.push(" WHERE content_type = ")
            .push_bind(query.content_type.clone());
        qb.push(" AND related_document_id = ")
            .push_bind(query.related_document_id.clone());
        push_locale(&mut qb, "locale", &query.locale);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, query.limit, query.offset);

        let rows: Vec<HistoryRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(HistoryVersion::try_from).collect()
    }

    async fn find_history_version(&self, id: i64) -> StoreResult<Option<HistoryVersion>> {
        let row: Option<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {HISTORY_COLUMNS} FROM history_versions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(HistoryVersion::try_from).transpose()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn find(&mut self, uid: &str, query: &VersionQuery) -> StoreResult<Vec<DocumentVersion>> {
        find_versions(&mut *self.tx, uid, query, true).await
    }

    async fn create(&mut self, uid: &str, version: NewVersion) -> StoreResult<DocumentVersion> {
        let NewVersion {
            document_id,
            locale,
            status,
            data,
        } = version;

        let row: VersionRow = sqlx::query_as(&format!(
            "INSERT INTO document_versions (content_type, document_id, locale, status, data, published_at)
             VALUES ($1, $2, $3, $4, $5, CASE WHEN $4 = 'published' THEN now() END)
             RETURNING {VERSION_COLUMNS}"
        ))
        .bind(uid)
        .bind(&document_id)
        .bind(&locale)
        .bind(status.as_str())
        .bind(Json(&data))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            conflict_or(e, || {
                format!("{document_id} already has a {status} row for locale {locale:?}")
            })
        })?;
        row.try_into()
    }

    async fn replace(
        &mut self,
        uid: &str,
        id: i64,
        data: Map<String, Value>,
    ) -> StoreResult<DocumentVersion> {
        let row: Option<VersionRow> = sqlx::query_as(&format!(
            "UPDATE document_versions SET data = $1, updated_at = now()
             WHERE content_type = $2 AND id = $3
             RETURNING {VERSION_COLUMNS}"
        ))
        .bind(Json(&data))
        .bind(uid)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.ok_or(StoreError::MissingRow(id))?.try_into()
    }

    async fn delete(&mut self, uid: &str, query: &VersionQuery) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM document_versions");
        push_version_filters(&mut qb, uid, query);
        let result = qb.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn record_history(&mut self, version: NewHistoryVersion) -> StoreResult<HistoryVersion> {
        let row: HistoryRow = sqlx::query_as(&format!(
            "INSERT INTO history_versions
                 (content_type, related_document_id, locale, status, data, schema, created_by_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {HISTORY_COLUMNS}"
        ))
        .bind(&version.content_type)
        .bind(&version.related_document_id)
        .bind(&version.locale)
        .bind(version.status.as_str())
        .bind(Json(&version.data))
        .bind(Json(&version.schema))
        .bind(version.created_by.as_ref().map(|a| a.id.as_str()))
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
