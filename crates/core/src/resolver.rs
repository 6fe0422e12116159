//! Maps (documentId, locale, status) to the physical row that applies.
use std::sync::Arc;

use crate::document::model::{DocumentVersion, Status};
use crate::error::StoreResult;
use crate::store::{StoreTransaction, VersionQuery, VersionStore};

/// Outcome of a detailed lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(DocumentVersion),
    /// The document has rows, just not in the requested locale and status.
    OtherVariantsExist,
    DocumentNotFound,
}

impl Resolution {
    pub fn into_version(self) -> Option<DocumentVersion> {
        match self {
            Resolution::Found(version) => Some(version),
            _ => None,
        }
    }
}

fn exact(document_id: &str, locale: Option<&str>, status: Status) -> VersionQuery {
    VersionQuery::document(document_id)
        .locale(locale)
        .status(status)
        .page(Some(1), 0)
}

fn any_variant(document_id: &str) -> VersionQuery {
    VersionQuery::document(document_id).page(Some(1), 0)
}

#[derive(Clone)]
pub struct StatusResolver {
    store: Arc<dyn VersionStore>,
}

impl StatusResolver {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// The row for exactly this locale and status. Never falls back to
    /// another locale.
    pub async fn resolve(
        &self,
        uid: &str,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
    ) -> StoreResult<Option<DocumentVersion>> {
        let rows = self
            .store
            .find(uid, &exact(document_id, locale, status))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Whether any row exists for the document, in any locale or status.
    pub async fn exists(&self, uid: &str, document_id: &str) -> StoreResult<bool> {
        let rows = self.store.find(uid, &any_variant(document_id)).await?;
        Ok(!rows.is_empty())
    }

    pub async fn resolve_detailed(
        &self,
        uid: &str,
        document_id: &str,
        locale: Option<&str>,
        status: Status,
    ) -> StoreResult<Resolution> {
        if let Some(version) = self.resolve(uid, document_id, locale, status).await? {
            return Ok(Resolution::Found(version));
        }
        if self.exists(uid, document_id).await? {
            Ok(Resolution::OtherVariantsExist)
        } else {
            Ok(Resolution::DocumentNotFound)
        }
    }
}

/// Same lookups against an open transaction, so reads see the transaction's
/// own writes.
pub(crate) async fn resolve_in(
    tx: &mut dyn StoreTransaction,
    uid: &str,
    document_id: &str,
    locale: Option<&str>,
    status: Status,
) -> StoreResult<Option<DocumentVersion>> {
    let rows = tx.find(uid, &exact(document_id, locale, status)).await?;
    Ok(rows.into_iter().next())
}
