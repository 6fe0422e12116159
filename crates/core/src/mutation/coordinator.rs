//! Lifecycle state machine of one (documentId, locale) pair.
//!
//! States: absent, draft-only, published-only, draft+published. Every operation
//! runs inside one store transaction. Business rules are checked before any
//! write, each data-changing transition appends one history version, and
//! lifecycle events go out only after commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use super::history::HistoryStatusTagger;
use crate::author::AuthorIdentity;
use crate::document::id::{generate_document_id, validate_document_id};
use crate::document::model::{
    DocumentVersion, HistoryVersion, NewHistoryVersion, NewVersion, Status,
};
use crate::document::validate::{validate_required, ValidationError};
use crate::error::{DocumentError, DocumentResult};
use crate::events::bus::EventBus;
use crate::events::types::{DocumentEvent, EntryAction, EntryEvent};
use crate::resolver::resolve_in;
use crate::sanitize::Sanitizer;
use crate::schema::ContentTypeSchema;
use crate::store::{LocaleFilter, StoreTransaction, VersionQuery, VersionStore};

/// Which locales a delete removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleScope {
    One(Option<String>),
    All,
}

/// Value plus the events to publish once it is committed.
struct Applied<T> {
    value: T,
    events: Vec<(EntryAction, Option<String>, Option<i64>)>,
}

impl<T> Applied<T> {
    fn quiet(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    fn with(mut self, action: EntryAction, locale: Option<&str>, entry_id: Option<i64>) -> Self {
        self.events
            .push((action, locale.map(str::to_string), entry_id));
        self
    }
}

pub struct MutationCoordinator {
    store: Arc<dyn VersionStore>,
    tagger: Arc<dyn HistoryStatusTagger>,
    author: Arc<dyn AuthorIdentity>,
    events: EventBus,
    input: Sanitizer,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<dyn VersionStore>,
        tagger: Arc<dyn HistoryStatusTagger>,
        author: Arc<dyn AuthorIdentity>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            tagger,
            author,
            events,
            input: Sanitizer::input(),
        }
    }

    /// Create the first row of (documentId, locale). A document id is
    /// generated unless one is given; an existing pair is a conflict.
    #[tracing::instrument(skip(self, schema, data), fields(uid = %schema.uid))]
    pub async fn create(
        &self,
        schema: &ContentTypeSchema,
        document_id: Option<&str>,
        locale: Option<&str>,
        status: Status,
        data: Map<String, Value>,
    ) -> DocumentResult<DocumentVersion> {
        let document_id = match document_id {
            Some(id) => {
                validate_document_id(id)?;
                id.to_string()
            }
            None => generate_document_id(),
        };
        let data = self.input.apply(schema, data)?;

        let mut tx = self.store.begin().await?;
        let result = self
            .create_in(tx.as_mut(), schema, &document_id, locale, status, data)
            .await;
        self.finish(tx, schema, &document_id, result).await
    }

    async fn create_in(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
        data: Map<String, Value>,
    ) -> DocumentResult<Applied<DocumentVersion>> {
        let uid = schema.uid.as_str();
        let taken = tx
            .find(uid, &VersionQuery::document(document_id).locale(locale))
            .await?;
        if !taken.is_empty() {
            return Err(DocumentError::Conflict(format!(
                "document {document_id} already exists in locale {}",
                locale.unwrap_or("(none)")
            )));
        }

        let siblings = tx.find(uid, &VersionQuery::document(document_id)).await?;
        let row_data = seed_data(schema, &siblings, locale, data);

        let created = if schema.has_draft_and_publish() {
            let draft = tx
                .create(uid, new_version(document_id, locale, Status::Draft, row_data))
                .await?;
            let applied =
                Applied::quiet(draft.clone()).with(EntryAction::Create, locale, Some(draft.id));
            if status == Status::Published {
                validate_required(schema, &draft.data)?;
                let published = tx
                    .create(
                        uid,
                        new_version(document_id, locale, Status::Published, draft.data.clone()),
                    )
                    .await?;
                let mut applied = applied.with(EntryAction::Publish, locale, Some(published.id));
                applied.value = published;
                applied
            } else {
                applied
            }
        } else {
            validate_required(schema, &row_data)?;
            let row = tx
                .create(uid, new_version(document_id, locale, Status::Published, row_data))
                .await?;
            Applied::quiet(row.clone()).with(EntryAction::Create, locale, Some(row.id))
        };

        self.record_history(tx, schema, document_id, locale).await?;
        Ok(created)
    }

    /// Update the draft of (documentId, locale). A locale the document does
    /// not have yet is created; a document with no rows at all yields `None`.
    #[tracing::instrument(skip(self, schema, data), fields(uid = %schema.uid))]
    pub async fn update(
        &self,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
        data: Map<String, Value>,
    ) -> DocumentResult<Option<DocumentVersion>> {
        if schema.has_draft_and_publish() && status == Status::Published {
            return Err(ValidationError::PublishedVersionUpdate.into());
        }
        let data = self.input.apply(schema, data)?;

        let mut tx = self.store.begin().await?;
        let result = self
            .update_in(tx.as_mut(), schema, document_id, locale, status, data)
            .await;
        self.finish(tx, schema, document_id, result).await
    }

    async fn update_in(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
        data: Map<String, Value>,
    ) -> DocumentResult<Applied<Option<DocumentVersion>>> {
        let uid = schema.uid.as_str();
        let shared = shared_values(schema, &data);
        let current = resolve_in(tx, uid, document_id, locale, status).await?;

        let mut applied = match current {
            Some(row) => {
                let mut merged = row.data;
                merged.extend(data);
                if status == Status::Published {
                    validate_required(schema, &merged)?;
                }
                let updated = tx.replace(uid, row.id, merged).await?;
                let id = updated.id;
                Applied::quiet(Some(updated)).with(EntryAction::Update, locale, Some(id))
            }
            None => {
                let siblings = tx.find(uid, &VersionQuery::document(document_id)).await?;
                if siblings.is_empty() {
                    return Ok(Applied::quiet(None));
                }
                tracing::debug!(document_id, ?locale, "creating localization");
                let row_data = seed_data(schema, &siblings, locale, data);
                if status == Status::Published {
                    validate_required(schema, &row_data)?;
                }
                let created = tx
                    .create(uid, new_version(document_id, locale, status, row_data))
                    .await?;
                let id = created.id;
                Applied::quiet(Some(created)).with(EntryAction::Create, locale, Some(id))
            }
        };

        self.record_history(tx, schema, document_id, locale).await?;

        if let Some(locale) = locale.filter(|_| !shared.is_empty()) {
            for (synced_locale, id) in self
                .sync_shared(tx, schema, document_id, locale, status, &shared)
                .await?
            {
                applied = applied.with(EntryAction::Update, synced_locale.as_deref(), Some(id));
            }
        }
        Ok(applied)
    }

    /// Copy attributes shared across locales into the same-status rows of
    /// every other locale. Returns the (locale, row id) of each row changed.
    async fn sync_shared(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: &str,
        status: Status,
        shared: &Map<String, Value>,
    ) -> DocumentResult<Vec<(Option<String>, i64)>> {
        let uid = schema.uid.as_str();
        let query = VersionQuery::document(document_id)
            .not_locale(locale)
            .status(status);
        let siblings = tx.find(uid, &query).await?;
        let mut synced = Vec::new();
        for sibling in siblings {
            let mut merged = sibling.data.clone();
            merged.extend(shared.clone());
            if merged == sibling.data {
                continue;
            }
            let row = tx.replace(uid, sibling.id, merged).await?;
            self.record_history(tx, schema, document_id, row.locale.as_deref())
                .await?;
            synced.push((row.locale, row.id));
        }
        if !synced.is_empty() {
            tracing::debug!(document_id, locale, count = synced.len(), "synced shared attributes");
        }
        Ok(synced)
    }

    /// Copy the draft into a new published row. Republishing unchanged data is
    /// a no-op that returns the current published row.
    #[tracing::instrument(skip(self, schema), fields(uid = %schema.uid))]
    pub async fn publish(
        &self,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
    ) -> DocumentResult<Option<DocumentVersion>> {
        require_draft_and_publish(schema)?;
        let mut tx = self.store.begin().await?;
        let result = self.publish_in(tx.as_mut(), schema, document_id, locale).await;
        self.finish(tx, schema, document_id, result).await
    }

    async fn publish_in(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
    ) -> DocumentResult<Applied<Option<DocumentVersion>>> {
        let uid = schema.uid.as_str();
        let Some(draft) = resolve_in(tx, uid, document_id, locale, Status::Draft).await? else {
            return Ok(Applied::quiet(None));
        };
        validate_required(schema, &draft.data)?;

        if let Some(published) = resolve_in(tx, uid, document_id, locale, Status::Published).await? {
            if published.data == draft.data {
                return Ok(Applied::quiet(Some(published)));
            }
            tx.delete(uid, &exact(document_id, locale, Status::Published))
                .await?;
        }

        let published = tx
            .create(
                uid,
                new_version(document_id, locale, Status::Published, draft.data),
            )
            .await?;
        self.record_history(tx, schema, document_id, locale).await?;
        let id = published.id;
        Ok(Applied::quiet(Some(published)).with(EntryAction::Publish, locale, Some(id)))
    }

    /// Remove the published row, keeping (or recreating) the draft. Returns
    /// the draft, or `None` when nothing was published.
    #[tracing::instrument(skip(self, schema), fields(uid = %schema.uid))]
    pub async fn unpublish(
        &self,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
    ) -> DocumentResult<Option<DocumentVersion>> {
        require_draft_and_publish(schema)?;
        let mut tx = self.store.begin().await?;
        let result = self.unpublish_in(tx.as_mut(), schema, document_id, locale).await;
        self.finish(tx, schema, document_id, result).await
    }

    async fn unpublish_in(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
    ) -> DocumentResult<Applied<Option<DocumentVersion>>> {
        let uid = schema.uid.as_str();
        let Some(published) =
            resolve_in(tx, uid, document_id, locale, Status::Published).await?
        else {
            return Ok(Applied::quiet(None));
        };
        let draft = resolve_in(tx, uid, document_id, locale, Status::Draft).await?;

        tx.delete(uid, &exact(document_id, locale, Status::Published))
            .await?;
        let draft = match draft {
            Some(draft) => draft,
            None => {
                tx.create(
                    uid,
                    new_version(document_id, locale, Status::Draft, published.data),
                )
                .await?
            }
        };

        self.record_history(tx, schema, document_id, locale).await?;
        let id = draft.id;
        Ok(Applied::quiet(Some(draft)).with(EntryAction::Unpublish, locale, Some(id)))
    }

    /// Reset the draft to the published data.
    #[tracing::instrument(skip(self, schema), fields(uid = %schema.uid))]
    pub async fn discard_draft(
        &self,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
    ) -> DocumentResult<Option<DocumentVersion>> {
        require_draft_and_publish(schema)?;
        let mut tx = self.store.begin().await?;
        let result = self
            .discard_draft_in(tx.as_mut(), schema, document_id, locale)
            .await;
        self.finish(tx, schema, document_id, result).await
    }

    async fn discard_draft_in(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
    ) -> DocumentResult<Applied<Option<DocumentVersion>>> {
        let uid = schema.uid.as_str();
        let Some(published) =
            resolve_in(tx, uid, document_id, locale, Status::Published).await?
        else {
            return Ok(Applied::quiet(None));
        };

        let draft = match resolve_in(tx, uid, document_id, locale, Status::Draft).await? {
            Some(draft) if draft.data == published.data => {
                return Ok(Applied::quiet(Some(draft)));
            }
            Some(draft) => tx.replace(uid, draft.id, published.data).await?,
            None => {
                tx.create(
                    uid,
                    new_version(document_id, locale, Status::Draft, published.data),
                )
                .await?
            }
        };

        self.record_history(tx, schema, document_id, locale).await?;
        let id = draft.id;
        Ok(Applied::quiet(Some(draft)).with(EntryAction::DiscardDraft, locale, Some(id)))
    }

    /// Delete every row of one locale, or of the whole document. Returns the
    /// number of rows removed.
    #[tracing::instrument(skip(self, schema), fields(uid = %schema.uid))]
    pub async fn delete(
        &self,
        schema: &ContentTypeSchema,
        document_id: &str,
        scope: LocaleScope,
    ) -> DocumentResult<u64> {
        let mut tx = self.store.begin().await?;
        let result = self.delete_in(tx.as_mut(), schema, document_id, &scope).await;
        self.finish(tx, schema, document_id, result).await
    }

    async fn delete_in(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        scope: &LocaleScope,
    ) -> DocumentResult<Applied<u64>> {
        let uid = schema.uid.as_str();
        let mut query = VersionQuery::document(document_id);
        if let LocaleScope::One(locale) = scope {
            query.locale = LocaleFilter::Is(locale.clone());
        }

        let rows = tx.find(uid, &query).await?;
        if rows.is_empty() {
            return Ok(Applied::quiet(0));
        }

        let locales: BTreeSet<Option<String>> = rows.iter().map(|r| r.locale.clone()).collect();
        let mut applied = Applied::quiet(0);
        for locale in &locales {
            // Snapshot what is about to disappear.
            self.record_history(tx, schema, document_id, locale.as_deref())
                .await?;
            applied = applied.with(EntryAction::Delete, locale.as_deref(), None);
        }

        applied.value = tx.delete(uid, &query).await?;
        Ok(applied)
    }

    /// Write a history snapshot back into the draft of `locale` through the
    /// update path. Attributes the schema no longer declares, or whose type
    /// changed since the snapshot, are dropped.
    #[tracing::instrument(skip(self, schema, version), fields(uid = %schema.uid, version_id = version.id))]
    pub async fn restore(
        &self,
        schema: &ContentTypeSchema,
        version: HistoryVersion,
        locale: Option<&str>,
    ) -> DocumentResult<Option<DocumentVersion>> {
        let Value::Object(snapshot) = version.data else {
            return Err(ValidationError::DataNotObject.into());
        };
        let data: Map<String, Value> = snapshot
            .into_iter()
            .filter(|(name, value)| {
                schema
                    .attribute(name)
                    .is_some_and(|attr| attr.check_value(name, value).is_ok())
            })
            .collect();
        let data = self.input.apply(schema, data)?;
        let status = if schema.has_draft_and_publish() {
            Status::Draft
        } else {
            Status::Published
        };
        let document_id = version.related_document_id.as_str();

        let mut tx = self.store.begin().await?;
        let result = self
            .update_in(tx.as_mut(), schema, document_id, locale, status, data)
            .await
            .map(|applied| {
                let restored = applied.value.as_ref().map(|row| row.id);
                match restored {
                    Some(id) => applied.with(EntryAction::HistoryRestore, locale, Some(id)),
                    None => applied,
                }
            });
        self.finish(tx, schema, document_id, result).await
    }

    /// Snapshot the current state of (documentId, locale) into the history log.
    async fn record_history(
        &self,
        tx: &mut dyn StoreTransaction,
        schema: &ContentTypeSchema,
        document_id: &str,
        locale: Option<&str>,
    ) -> DocumentResult<()> {
        let uid = schema.uid.as_str();
        let draft = resolve_in(tx, uid, document_id, locale, Status::Draft).await?;
        let published = resolve_in(tx, uid, document_id, locale, Status::Published).await?;
        let status = self.tagger.tag(draft.as_ref(), published.as_ref());

        let Some(source) = draft.or(published) else {
            return Ok(());
        };
        tx.record_history(NewHistoryVersion {
            content_type: uid.to_string(),
            related_document_id: document_id.to_string(),
            locale: locale.map(str::to_string),
            status,
            data: Value::Object(source.data),
            schema: schema
                .snapshot()
                .map_err(|e| DocumentError::Storage(e.into()))?,
            created_by: self.author.current_author(),
        })
        .await?;
        Ok(())
    }

    /// Commit on success, roll back on failure, then publish events.
    async fn finish<T>(
        &self,
        tx: Box<dyn StoreTransaction>,
        schema: &ContentTypeSchema,
        document_id: &str,
        result: DocumentResult<Applied<T>>,
    ) -> DocumentResult<T> {
        let applied = match result {
            Ok(applied) => {
                tx.commit().await?;
                applied
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "transaction rollback failed");
                }
                return Err(err);
            }
        };

        let author = self.author.current_author();
        for (action, locale, entry_id) in applied.events {
            tracing::info!(uid = %schema.uid, document_id, ?locale, ?action, "document lifecycle");
            self.events.publish(DocumentEvent::Entry(EntryEvent {
                event: action,
                uid: schema.uid.to_string(),
                document_id: document_id.to_string(),
                locale,
                entry_id,
                created_at: Utc::now(),
                author: author.clone(),
            }));
        }
        Ok(applied.value)
    }
}

fn require_draft_and_publish(schema: &ContentTypeSchema) -> Result<(), ValidationError> {
    if schema.has_draft_and_publish() {
        Ok(())
    } else {
        Err(ValidationError::DraftAndPublishDisabled(schema.uid.to_string()))
    }
}

fn exact(document_id: &str, locale: Option<&str>, status: Status) -> VersionQuery {
    VersionQuery::document(document_id).locale(locale).status(status)
}

fn new_version(
    document_id: &str,
    locale: Option<&str>,
    status: Status,
    data: Map<String, Value>,
) -> NewVersion {
    NewVersion {
        document_id: document_id.to_string(),
        locale: locale.map(str::to_string),
        status,
        data,
    }
}

/// Supplied values of attributes shared across locales. Empty for types that
/// are not localized.
fn shared_values(schema: &ContentTypeSchema, data: &Map<String, Value>) -> Map<String, Value> {
    if !schema.is_localized() {
        return Map::new();
    }
    schema
        .non_localized_attributes()
        .filter_map(|name| data.get(name).map(|value| (name.to_string(), value.clone())))
        .collect()
}

/// Data of a brand-new row. Starts from the schema defaults; a row of the
/// same locale in the other status contributes all of its data, otherwise an
/// existing sibling (drafts first) contributes the attributes shared across
/// locales. Supplied data goes on top.
fn seed_data(
    schema: &ContentTypeSchema,
    siblings: &[DocumentVersion],
    locale: Option<&str>,
    data: Map<String, Value>,
) -> Map<String, Value> {
    let mut row_data = schema.defaults();
    if let Some(same_locale) = siblings.iter().find(|s| s.locale.as_deref() == locale) {
        row_data.extend(same_locale.data.clone());
    } else if let Some(source) = siblings
        .iter()
        .find(|s| s.status == Status::Draft)
        .or_else(|| siblings.first())
    {
        for name in schema.non_localized_attributes() {
            if let Some(value) = source.data.get(name) {
                row_data.insert(name.to_string(), value.clone());
            }
        }
    }
    row_data.extend(data);
    row_data
}
