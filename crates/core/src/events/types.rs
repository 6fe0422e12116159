use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::author::AuthorRef;

/// Messages delivered to lifecycle listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentEvent {
    Welcome,
    Entry(EntryEvent),
    /// The listener fell behind and missed events; it should refetch.
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryAction {
    #[serde(rename = "entry.create")]
    Create,
    #[serde(rename = "entry.update")]
    Update,
    #[serde(rename = "entry.publish")]
    Publish,
    #[serde(rename = "entry.unpublish")]
    Unpublish,
    #[serde(rename = "entry.draft-discard")]
    DiscardDraft,
    #[serde(rename = "entry.delete")]
    Delete,
    #[serde(rename = "history.restore")]
    HistoryRestore,
}

/// Emitted once the transaction that caused it has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryEvent {
    pub event: EntryAction,
    pub uid: String,
    pub document_id: String,
    pub locale: Option<String>,
    /// Row the action produced; `None` for deletes.
    pub entry_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub author: Option<AuthorRef>,
}
