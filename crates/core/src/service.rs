//! Entry point: `service.documents(uid)` and `service.history(uid)`.
use std::sync::Arc;

use crate::author::{Anonymous, AuthorIdentity};
use crate::document::model::{DocumentMetadata, DocumentVersion, HistoryVersion, Status};
use crate::document::validate::{resolve_locale, resolve_status, validate_locale, ValidationError};
use crate::error::{DocumentError, DocumentResult};
use crate::events::bus::EventBus;
use crate::metadata::MetadataAggregator;
use crate::mutation::coordinator::{LocaleScope, MutationCoordinator};
use crate::mutation::history::{CompareWithPublished, HistoryStatusTagger};
use crate::mutation::types::{
    CreateParams, DeleteParams, DeleteResult, FindManyParams, FindOneParams, LocaleParams,
    MetadataParams, UpdateParams,
};
use crate::resolver::StatusResolver;
use crate::schema::{ContentTypeSchema, SchemaRegistry};
use crate::store::{HistoryQuery, LocaleFilter, VersionQuery, VersionStore};

pub const DEFAULT_LOCALE: &str = "en";

pub struct DocumentServiceBuilder {
    store: Arc<dyn VersionStore>,
    registry: Arc<dyn SchemaRegistry>,
    author: Arc<dyn AuthorIdentity>,
    tagger: Arc<dyn HistoryStatusTagger>,
    events: EventBus,
    default_locale: String,
}

impl DocumentServiceBuilder {
    pub fn author(mut self, author: Arc<dyn AuthorIdentity>) -> Self {
        self.author = author;
        self
    }

    pub fn tagger(mut self, tagger: Arc<dyn HistoryStatusTagger>) -> Self {
        self.tagger = tagger;
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn default_locale(mut self, locale: impl Into<String>) -> Result<Self, ValidationError> {
        let locale = locale.into();
        validate_locale(&locale)?;
        self.default_locale = locale;
        Ok(self)
    }

    pub fn build(self) -> DocumentService {
        let coordinator = MutationCoordinator::new(
            self.store.clone(),
            self.tagger,
            self.author,
            self.events.clone(),
        );
        DocumentService {
            resolver: StatusResolver::new(self.store.clone()),
            metadata: MetadataAggregator::new(self.store.clone()),
            coordinator,
            store: self.store,
            registry: self.registry,
            events: self.events,
            default_locale: self.default_locale,
        }
    }
}

pub struct DocumentService {
    store: Arc<dyn VersionStore>,
    registry: Arc<dyn SchemaRegistry>,
    resolver: StatusResolver,
    metadata: MetadataAggregator,
    coordinator: MutationCoordinator,
    events: EventBus,
    default_locale: String,
}

impl DocumentService {
    pub fn builder(
        store: Arc<dyn VersionStore>,
        registry: Arc<dyn SchemaRegistry>,
    ) -> DocumentServiceBuilder {
        DocumentServiceBuilder {
            store,
            registry,
            author: Arc::new(Anonymous),
            tagger: Arc::new(CompareWithPublished),
            events: EventBus::default(),
            default_locale: DEFAULT_LOCALE.to_string(),
        }
    }

    pub fn documents(&self, uid: &str) -> Documents<'_> {
        Documents {
            service: self,
            uid: uid.to_string(),
        }
    }

    pub fn history(&self, uid: &str) -> History<'_> {
        History {
            service: self,
            uid: uid.to_string(),
        }
    }

    pub fn schemas(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn schema(&self, uid: &str) -> DocumentResult<Arc<ContentTypeSchema>> {
        self.registry
            .get_model(uid)
            .ok_or_else(|| DocumentError::UnknownContentType(uid.to_string()))
    }

    fn locale(
        &self,
        schema: &ContentTypeSchema,
        requested: Option<&str>,
    ) -> DocumentResult<Option<String>> {
        Ok(resolve_locale(schema, requested, &self.default_locale)?)
    }
}

/// Document operations scoped to one content type.
pub struct Documents<'a> {
    service: &'a DocumentService,
    uid: String,
}

impl Documents<'_> {
    pub fn schema(&self) -> DocumentResult<Arc<ContentTypeSchema>> {
        self.service.schema(&self.uid)
    }

    /// The row for (documentId, locale, status); status defaults to draft.
    pub async fn find_one(
        &self,
        document_id: &str,
        params: FindOneParams,
    ) -> DocumentResult<Option<DocumentVersion>> {
        let schema = self.schema()?;
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        let status = resolve_status(&schema, params.status);

        let found = self
            .service
            .resolver
            .resolve(&self.uid, document_id, locale.as_deref(), status)
            .await?;
        Ok(match params.fields {
            Some(fields) => found.map(|v| v.project(&fields)),
            None => found,
        })
    }

    /// One row per document for the given locale and status.
    pub async fn find_many(&self, params: FindManyParams) -> DocumentResult<Vec<DocumentVersion>> {
        let schema = self.schema()?;
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        let status = resolve_status(&schema, params.status);
        let query = VersionQuery::all()
            .locale(locale.as_deref())
            .status(status)
            .page(params.limit, params.offset);
        Ok(self.service.store.find(&self.uid, &query).await?)
    }

    pub async fn create(&self, params: CreateParams) -> DocumentResult<DocumentVersion> {
        let schema = self.schema()?;
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        let status = resolve_status(&schema, params.status);
        self.service
            .coordinator
            .create(
                &schema,
                params.document_id.as_deref(),
                locale.as_deref(),
                status,
                params.data,
            )
            .await
    }

    /// Update the draft. Fails on a published target; `None` when the
    /// document does not exist.
    pub async fn update(
        &self,
        document_id: &str,
        params: UpdateParams,
    ) -> DocumentResult<Option<DocumentVersion>> {
        let schema = self.schema()?;
        let status = resolve_status(&schema, params.status);
        if schema.has_draft_and_publish() && status == Status::Published {
            return Err(ValidationError::PublishedVersionUpdate.into());
        }
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        self.service
            .coordinator
            .update(&schema, document_id, locale.as_deref(), status, params.data)
            .await
    }

    pub async fn publish(
        &self,
        document_id: &str,
        params: LocaleParams,
    ) -> DocumentResult<Option<DocumentVersion>> {
        let schema = self.schema()?;
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        self.service
            .coordinator
            .publish(&schema, document_id, locale.as_deref())
            .await
    }

    pub async fn unpublish(
        &self,
        document_id: &str,
        params: LocaleParams,
    ) -> DocumentResult<Option<DocumentVersion>> {
        let schema = self.schema()?;
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        self.service
            .coordinator
            .unpublish(&schema, document_id, locale.as_deref())
            .await
    }

    pub async fn discard_draft(
        &self,
        document_id: &str,
        params: LocaleParams,
    ) -> DocumentResult<Option<DocumentVersion>> {
        let schema = self.schema()?;
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        self.service
            .coordinator
            .discard_draft(&schema, document_id, locale.as_deref())
            .await
    }

    pub async fn delete(
        &self,
        document_id: &str,
        params: DeleteParams,
    ) -> DocumentResult<DeleteResult> {
        let schema = self.schema()?;
        let scope = if params.is_all_locales() || !schema.is_localized() {
            LocaleScope::All
        } else {
            LocaleScope::One(self.service.locale(&schema, params.locale.as_deref())?)
        };
        let deleted = self
            .service
            .coordinator
            .delete(&schema, document_id, scope)
            .await?;
        Ok(DeleteResult {
            document_id: document_id.to_string(),
            deleted,
        })
    }

    pub async fn get_metadata(
        &self,
        document_id: &str,
        params: MetadataParams,
    ) -> DocumentResult<DocumentMetadata> {
        let schema = self.schema()?;
        let locale = self.service.locale(&schema, params.locale.as_deref())?;
        let status = resolve_status(&schema, params.status);
        Ok(self
            .service
            .metadata
            .metadata(&self.uid, document_id, locale.as_deref(), status)
            .await?)
    }
}

/// History versions of one content type.
pub struct History<'a> {
    service: &'a DocumentService,
    uid: String,
}

impl History<'_> {
    /// Newest first. `locale: None` lists every locale.
    pub async fn find_versions(
        &self,
        document_id: &str,
        locale: Option<&str>,
        limit: Option<usize>,
        offset: usize,
    ) -> DocumentResult<Vec<HistoryVersion>> {
        let schema = self.service.schema(&self.uid)?;
        let mut query = HistoryQuery::new(schema.uid.as_str(), document_id);
        if let Some(locale) = locale {
            validate_locale(locale)?;
            query.locale = LocaleFilter::Is(Some(locale.to_string()));
        }
        query.limit = limit;
        query.offset = offset;
        Ok(self.service.store.find_history(&query).await?)
    }

    /// Restore a snapshot into the draft of its locale. `None` if the version
    /// does not belong to this content type or the document is gone.
    ///
    /// A snapshot without a locale lands in the default locale of a localized
    /// type. On a type that is no longer localized the snapshot locale is ignored.
    pub async fn restore(&self, version_id: i64) -> DocumentResult<Option<DocumentVersion>> {
        let schema = self.service.schema(&self.uid)?;
        let Some(version) = self.service.store.find_history_version(version_id).await? else {
            return Ok(None);
        };
        if version.content_type != self.uid {
            return Ok(None);
        }
        let locale = if schema.is_localized() {
            self.service.locale(&schema, version.locale.as_deref())?
        } else {
            None
        };
        self.service
            .coordinator
            .restore(&schema, version, locale.as_deref())
            .await
    }
}
