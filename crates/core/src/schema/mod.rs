//! Content-type schemas and the registry that serves them.
//!
//! Schemas use the same JSON shape as content-type `schema.json` files:
//!
//! ```json
//! {
//!   "kind": "collectionType",
//!   "info": { "singularName": "article", "pluralName": "articles" },
//!   "options": { "draftAndPublish": true },
//!   "pluginOptions": { "i18n": { "localized": true } },
//!   "attributes": { "title": { "type": "string", "required": true } }
//! }
//! ```

pub mod load;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::document::id::{ContentTypeUid, InvalidUid};
use crate::document::validate::ValidationError;

/// Control attributes owned by the engine. Never declared by schemas and never
/// written from client data.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "id",
    "documentId",
    "locale",
    "status",
    "createdAt",
    "updatedAt",
    "publishedAt",
    "createdBy",
    "updatedBy",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&name)
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("{path}: schema needs a uid or info.singularName")]
    MissingName { path: String },
    #[error(transparent)]
    InvalidUid(#[from] InvalidUid),
    #[error("content type {uid} declares reserved attribute {attribute}")]
    ReservedAttribute { uid: String, attribute: String },
    #[error("content type {0} is registered twice")]
    Duplicate(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentTypeKind {
    #[default]
    CollectionType,
    SingleType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    #[serde(default)]
    pub singular_name: Option<String>,
    #[serde(default)]
    pub plural_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOptions {
    #[serde(default = "enabled")]
    pub draft_and_publish: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            draft_and_publish: true,
        }
    }
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18nOptions {
    #[serde(default)]
    pub localized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginOptions {
    #[serde(default)]
    pub i18n: I18nOptions,
}

/// Per-attribute plugin options. A missing `i18n` entry inherits from the
/// content type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributePluginOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<I18nOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Text,
    Richtext,
    Email,
    Password,
    Uid,
    Integer,
    Biginteger,
    Float,
    Decimal,
    Boolean,
    Date,
    Datetime,
    Time,
    Json,
    Enumeration,
    Blocks,
    Media,
    Relation,
    Component,
    Dynamiczone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub plugin_options: AttributePluginOptions,
}

impl Attribute {
    pub fn of(kind: AttributeKind) -> Self {
        Self {
            kind,
            required: false,
            private: false,
            default: None,
            enum_values: Vec::new(),
            plugin_options: AttributePluginOptions::default(),
        }
    }

    /// Whether the attribute varies per locale within a localized content type.
    pub fn is_localized(&self, content_type_localized: bool) -> bool {
        content_type_localized
            && self
                .plugin_options
                .i18n
                .map(|opts| opts.localized)
                .unwrap_or(true)
    }

    /// Type-check a client-supplied value. `null` always passes.
    pub fn check_value(&self, name: &str, value: &Value) -> Result<(), ValidationError> {
        use AttributeKind::*;

        let fail = |reason: &str| {
            Err(ValidationError::InvalidAttribute {
                attribute: name.to_string(),
                reason: reason.to_string(),
            })
        };
        if value.is_null() {
            return Ok(());
        }
        match self.kind {
            String | Text | Richtext | Email | Password | Uid | Date | Datetime | Time => {
                if !value.is_string() {
                    return fail("expected a string");
                }
            }
            Integer | Biginteger => {
                if !(value.is_i64() || value.is_u64()) {
                    return fail("expected an integer");
                }
            }
            Float | Decimal => {
                if !value.is_number() {
                    return fail("expected a number");
                }
            }
            Boolean => {
                if !value.is_boolean() {
                    return fail("expected a boolean");
                }
            }
            Enumeration => match value.as_str() {
                Some(v) if self.enum_values.iter().any(|e| e == v) => {}
                _ => return fail("expected one of the enumeration values"),
            },
            Json | Blocks | Media | Relation | Component | Dynamiczone => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeSchema {
    pub uid: ContentTypeUid,
    #[serde(default)]
    pub kind: ContentTypeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub info: SchemaInfo,
    #[serde(default)]
    pub options: SchemaOptions,
    #[serde(default)]
    pub plugin_options: PluginOptions,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl ContentTypeSchema {
    pub fn has_draft_and_publish(&self) -> bool {
        self.options.draft_and_publish
    }

    pub fn is_localized(&self) -> bool {
        self.plugin_options.i18n.localized
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Default values declared by the attributes.
    pub fn defaults(&self) -> Map<String, Value> {
        self.attributes
            .iter()
            .filter_map(|(name, attr)| attr.default.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Attributes shared by every locale of a document.
    pub fn non_localized_attributes(&self) -> impl Iterator<Item = &str> {
        let localized = self.is_localized();
        self.attributes
            .iter()
            .filter(move |(_, attr)| !attr.is_localized(localized))
            .map(|(name, _)| name.as_str())
    }

    /// Snapshot stored alongside history versions.
    pub fn snapshot(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn check(&self) -> Result<(), SchemaError> {
        match self.attributes.keys().find(|name| is_reserved(name)) {
            Some(attribute) => Err(SchemaError::ReservedAttribute {
                uid: self.uid.to_string(),
                attribute: attribute.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Source of content-type schemas.
pub trait SchemaRegistry: Send + Sync {
    fn get_model(&self, uid: &str) -> Option<Arc<ContentTypeSchema>>;

    fn uids(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaRegistry {
    models: HashMap<String, Arc<ContentTypeSchema>>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ContentTypeSchema) -> Result<(), SchemaError> {
        schema.check()?;
        let uid = schema.uid.to_string();
        if self.models.contains_key(&uid) {
            return Err(SchemaError::Duplicate(uid));
        }
        tracing::debug!(uid = %uid, "registered content type");
        self.models.insert(uid, Arc::new(schema));
        Ok(())
    }

    pub fn with(mut self, schema: ContentTypeSchema) -> Result<Self, SchemaError> {
        self.register(schema)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl SchemaRegistry for InMemorySchemaRegistry {
    fn get_model(&self, uid: &str) -> Option<Arc<ContentTypeSchema>> {
        self.models.get(uid).cloned()
    }

    fn uids(&self) -> Vec<String> {
        let mut uids: Vec<_> = self.models.keys().cloned().collect();
        uids.sort();
        uids
    }
}
