//! Input validation for document operations.
use thiserror::Error;

use crate::document::model::Status;
use crate::schema::ContentTypeSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("You cannot update a document published version")]
    PublishedVersionUpdate,
    #[error("Content type with uid {0} does not have draftAndPublish enabled")]
    DraftAndPublishDisabled(String),
    #[error("Content type with uid {0} is not localized")]
    NotLocalized(String),
    #[error("locale cannot be empty")]
    EmptyLocale,
    #[error("invalid locale code: {0}")]
    InvalidLocale(String),
    #[error("documentId cannot be empty")]
    EmptyDocumentId,
    #[error("document data must be an object")]
    DataNotObject,
    #[error("invalid value for attribute {attribute}: {reason}")]
    InvalidAttribute { attribute: String, reason: String },
    #[error("attribute {0} is required")]
    MissingRequired(String),
}

/// Validate a locale code such as `en`, `fr-CA` or `zh-Hans-CN`.
pub fn validate_locale(locale: &str) -> Result<(), ValidationError> {
    if locale.is_empty() {
        return Err(ValidationError::EmptyLocale);
    }
    let valid = locale
        .split('-')
        .all(|part| !part.is_empty() && part.len() <= 8 && part.chars().all(|c| c.is_ascii_alphanumeric()));
    if !valid {
        return Err(ValidationError::InvalidLocale(locale.to_string()));
    }
    Ok(())
}

/// Work out the locale a request targets for the given content type.
///
/// Localized types fall back to `default_locale`; locale-agnostic types reject
/// any explicit locale.
pub fn resolve_locale(
    schema: &ContentTypeSchema,
    requested: Option<&str>,
    default_locale: &str,
) -> Result<Option<String>, ValidationError> {
    match (schema.is_localized(), requested) {
        (true, Some(locale)) => {
            validate_locale(locale)?;
            Ok(Some(locale.to_string()))
        }
        (true, None) => Ok(Some(default_locale.to_string())),
        (false, None) => Ok(None),
        (false, Some(_)) => Err(ValidationError::NotLocalized(schema.uid.to_string())),
    }
}

/// Work out the status a request targets. Types without draft & publish only
/// ever hold published rows.
pub fn resolve_status(schema: &ContentTypeSchema, requested: Option<Status>) -> Status {
    if schema.has_draft_and_publish() {
        requested.unwrap_or(Status::Draft)
    } else {
        Status::Published
    }
}

/// Check required attributes are present and non-null in a full row payload.
pub fn validate_required(
    schema: &ContentTypeSchema,
    data: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), ValidationError> {
    for (name, attribute) in &schema.attributes {
        if attribute.required && data.get(name).map_or(true, serde_json::Value::is_null) {
            return Err(ValidationError::MissingRequired(name.clone()));
        }
    }
    Ok(())
}
