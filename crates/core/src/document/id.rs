/// Identifier utilities.
///
/// Content-type uids follow the conventions:
/// - Application types: `api::{api}.{model}`
/// - Plugin types: `plugin::{plugin}.{model}`
/// - Admin types: `admin::{model}`
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::validate::ValidationError;

const API_PREFIX: &str = "api::";
const PLUGIN_PREFIX: &str = "plugin::";
const ADMIN_PREFIX: &str = "admin::";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UidKind {
    Api { api: String, model: String },
    Plugin { plugin: String, model: String },
    Admin { model: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid content type uid: {0}")]
pub struct InvalidUid(pub String);

/// Parsed content-type identifier, e.g. `api::article.article`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentTypeUid {
    raw: String,
    kind: UidKind,
}

impl ContentTypeUid {
    pub fn parse(uid: &str) -> Result<Self, InvalidUid> {
        let invalid = || InvalidUid(uid.to_string());
        let kind = if let Some(rest) = uid.strip_prefix(API_PREFIX) {
            let (api, model) = split_dotted(rest).ok_or_else(invalid)?;
            UidKind::Api { api, model }
        } else if let Some(rest) = uid.strip_prefix(PLUGIN_PREFIX) {
            let (plugin, model) = split_dotted(rest).ok_or_else(invalid)?;
            UidKind::Plugin { plugin, model }
        } else if let Some(model) = uid.strip_prefix(ADMIN_PREFIX) {
            if !is_segment(model) {
                return Err(invalid());
            }
            UidKind::Admin {
                model: model.to_string(),
            }
        } else {
            return Err(invalid());
        };
        Ok(Self {
            raw: uid.to_string(),
            kind,
        })
    }

    /// Uid of an application type named after its singular name.
    pub fn api(singular_name: &str) -> Result<Self, InvalidUid> {
        Self::parse(&format!("{API_PREFIX}{singular_name}.{singular_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &UidKind {
        &self.kind
    }

    pub fn model_name(&self) -> &str {
        match &self.kind {
            UidKind::Api { model, .. } => model,
            UidKind::Plugin { model, .. } => model,
            UidKind::Admin { model } => model,
        }
    }
}

impl fmt::Display for ContentTypeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for ContentTypeUid {
    type Error = InvalidUid;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentTypeUid> for String {
    fn from(uid: ContentTypeUid) -> Self {
        uid.raw
    }
}

fn split_dotted(rest: &str) -> Option<(String, String)> {
    let (left, right) = rest.split_once('.')?;
    if is_segment(left) && is_segment(right) {
        Some((left.to_string(), right.to_string()))
    } else {
        None
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Generate a new document id. Time-ordered so ids sort by creation.
pub fn generate_document_id() -> String {
    Uuid::now_v7().simple().to_string()
}

pub fn validate_document_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyDocumentId);
    }
    Ok(())
}
