//! Draft/publish and localization resolution for versioned documents.
//!
//! A logical document is the set of physical rows sharing a `documentId`: one
//! per locale and publication status. [`DocumentService`] is the entry point;
//! it is assembled from a [`store::VersionStore`] and a
//! [`schema::SchemaRegistry`], plus optional author, history-tagging and event
//! collaborators.

pub mod author;
pub mod document;
pub mod error;
pub mod events;
pub mod metadata;
pub mod mutation;
pub mod resolver;
pub mod sanitize;
pub mod schema;
pub mod service;
pub mod store;

pub use document::model::{DocumentMetadata, DocumentVersion, HistoryVersion, Status};
pub use error::{DocumentError, DocumentResult, StoreError};
pub use service::{DocumentService, DocumentServiceBuilder};
