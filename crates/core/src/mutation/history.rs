//! Status tagging of history snapshots.
use crate::document::model::{DocumentVersion, HistoryStatus};

/// Decides the logical status recorded with a history snapshot, given the
/// draft and published rows of one locale.
pub trait HistoryStatusTagger: Send + Sync {
    fn tag(
        &self,
        draft: Option<&DocumentVersion>,
        published: Option<&DocumentVersion>,
    ) -> HistoryStatus;
}

/// Compares the draft's data with the published row's data.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompareWithPublished;

impl HistoryStatusTagger for CompareWithPublished {
    fn tag(
        &self,
        draft: Option<&DocumentVersion>,
        published: Option<&DocumentVersion>,
    ) -> HistoryStatus {
        match (draft, published) {
            (Some(draft), Some(published)) if draft.data != published.data => {
                HistoryStatus::Modified
            }
            (_, Some(_)) => HistoryStatus::Published,
            _ => HistoryStatus::Draft,
        }
    }
}
