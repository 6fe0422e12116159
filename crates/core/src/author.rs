use serde::{Deserialize, Serialize};

/// Reference to the actor credited on a history version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: String,
}

impl AuthorRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Resolves who is performing the current mutation.
pub trait AuthorIdentity: Send + Sync {
    fn current_author(&self) -> Option<AuthorRef>;
}

/// No attribution; history rows get a null `createdBy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl AuthorIdentity for Anonymous {
    fn current_author(&self) -> Option<AuthorRef> {
        None
    }
}

/// Always credits the same author. Used by jobs and tests.
#[derive(Debug, Clone)]
pub struct FixedAuthor(pub AuthorRef);

impl AuthorIdentity for FixedAuthor {
    fn current_author(&self) -> Option<AuthorRef> {
        Some(self.0.clone())
    }
}
