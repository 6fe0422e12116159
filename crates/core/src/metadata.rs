//! Locale and status availability for a document.
use std::sync::Arc;

use crate::document::model::{DocumentMetadata, LocaleSummary, Status, StatusSummary};
use crate::error::StoreResult;
use crate::resolver::StatusResolver;
use crate::store::{VersionQuery, VersionStore};

#[derive(Clone)]
pub struct MetadataAggregator {
    store: Arc<dyn VersionStore>,
    resolver: StatusResolver,
}

fn has_locale(locale: Option<&str>) -> Option<&str> {
    locale.filter(|l| !l.is_empty())
}

impl MetadataAggregator {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        let resolver = StatusResolver::new(store.clone());
        Self { store, resolver }
    }

    /// Other locales of the document in the same status, ordered by locale.
    /// Empty for locale-agnostic documents.
    pub async fn available_locales(
        &self,
        uid: &str,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
    ) -> StoreResult<Vec<LocaleSummary>> {
        let Some(locale) = has_locale(locale) else {
            return Ok(Vec::new());
        };
        let query = VersionQuery::document(document_id)
            .not_locale(locale)
            .status(status);
        let rows = self.store.find(uid, &query).await?;
        Ok(rows.iter().map(|row| row.locale_summary()).collect())
    }

    /// The same locale in the opposite status, if it exists.
    pub async fn available_status(
        &self,
        uid: &str,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
    ) -> StoreResult<Option<StatusSummary>> {
        let Some(locale) = has_locale(locale) else {
            return Ok(None);
        };
        let other = self
            .resolver
            .resolve(uid, document_id, Some(locale), status.opposite())
            .await?;
        Ok(other.as_ref().map(|row| row.status_summary()))
    }

    pub async fn metadata(
        &self,
        uid: &str,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
    ) -> StoreResult<DocumentMetadata> {
        let (locales, other_status) = tokio::join!(
            self.available_locales(uid, document_id, locale, status),
            self.available_status(uid, document_id, locale, status),
        );
        Ok(DocumentMetadata {
            available_locales: locales?,
            available_status: other_status?.into_iter().collect(),
        })
    }
}
