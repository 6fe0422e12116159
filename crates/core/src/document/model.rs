use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::author::AuthorRef;

/// Publication status stored on a physical row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    Published,
}

impl Status {
    pub fn opposite(self) -> Self {
        match self {
            Status::Draft => Status::Published,
            Status::Published => Status::Draft,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Published => "published",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Status::Draft),
            "published" => Ok(Status::Published),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One physical row: a document in one locale and one status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: i64,
    pub document_id: String,
    pub locale: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    /// Schema-defined field values.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl DocumentVersion {
    /// Keep only the named fields of `data`. Control attributes are always kept.
    pub fn project(mut self, fields: &[String]) -> Self {
        self.data.retain(|key, _| fields.iter().any(|f| f == key));
        self
    }

    pub fn locale_summary(&self) -> LocaleSummary {
        LocaleSummary {
            id: self.id,
            locale: self.locale.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            published_at: self.published_at,
        }
    }

    pub fn status_summary(&self) -> StatusSummary {
        StatusSummary {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            published_at: self.published_at,
        }
    }
}

/// Row to be inserted; the store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub document_id: String,
    pub locale: Option<String>,
    pub status: Status,
    pub data: Map<String, Value>,
}

/// Sibling locale entry in [`DocumentMetadata::available_locales`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleSummary {
    pub id: i64,
    pub locale: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Other-status entry in [`DocumentMetadata::available_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Derived per request, never persisted.
///
/// `available_status` holds zero or one entry so callers can always iterate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub available_locales: Vec<LocaleSummary>,
    pub available_status: Vec<StatusSummary>,
}

/// Logical status recorded on a history snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Draft,
    Published,
    Modified,
}

impl HistoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryStatus::Draft => "draft",
            HistoryStatus::Published => "published",
            HistoryStatus::Modified => "modified",
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(HistoryStatus::Draft),
            "published" => Ok(HistoryStatus::Published),
            "modified" => Ok(HistoryStatus::Modified),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Append-only audit snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryVersion {
    pub id: i64,
    pub content_type: String,
    pub related_document_id: String,
    pub locale: Option<String>,
    pub status: HistoryStatus,
    pub data: Value,
    pub schema: Value,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<AuthorRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryVersion {
    pub content_type: String,
    pub related_document_id: String,
    pub locale: Option<String>,
    pub status: HistoryStatus,
    pub data: Value,
    pub schema: Value,
    pub created_by: Option<AuthorRef>,
}
