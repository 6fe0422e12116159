//! Field-level sanitization of document payloads.
//!
//! A [`Sanitizer`] is an ordered list of [`FieldVisitor`] steps. Each step sees
//! every field of the payload (descending into component values) and may keep,
//! replace or remove it, or reject the whole payload. Steps run one after the
//! other, each over the output of the previous one.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use serde_json::{Map, Value};

use crate::document::model::DocumentVersion;
use crate::document::validate::ValidationError;
use crate::schema::{is_reserved, Attribute, AttributeKind, ContentTypeSchema};

/// A field as seen by a visitor.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    pub key: &'a str,
    /// Dotted path from the payload root, e.g. `seo.metaTitle`.
    pub path: &'a str,
    /// Declared attribute; `None` for nested or undeclared fields.
    pub attribute: Option<&'a Attribute>,
    pub value: &'a Value,
}

impl Field<'_> {
    pub fn is_root(&self) -> bool {
        !self.path.contains('.')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visit {
    Keep,
    Replace(Value),
    Remove,
}

pub trait FieldVisitor: Send + Sync {
    fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError>;
}

#[derive(Default)]
pub struct Sanitizer {
    steps: Vec<Box<dyn FieldVisitor>>,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, visitor: impl FieldVisitor + 'static) -> Self {
        self.steps.push(Box::new(visitor));
        self
    }

    /// Client input: drop control and unknown attributes, type-check, hash
    /// passwords.
    pub fn input() -> Self {
        Self::new()
            .step(RemoveReserved)
            .step(RemoveUnknown)
            .step(CheckTypes)
            .step(HashPasswords)
    }

    /// Client output: drop password and private attributes.
    pub fn output() -> Self {
        Self::new().step(RemovePasswords).step(RemovePrivate)
    }

    pub fn apply(
        &self,
        schema: &ContentTypeSchema,
        data: Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationError> {
        self.steps.iter().try_fold(data, |data, step| {
            walk(step.as_ref(), schema, data, None)
        })
    }

    pub fn apply_value(
        &self,
        schema: &ContentTypeSchema,
        value: Value,
    ) -> Result<Value, ValidationError> {
        match value {
            Value::Object(map) => self.apply(schema, map).map(Value::Object),
            _ => Err(ValidationError::DataNotObject),
        }
    }

    pub fn apply_version(
        &self,
        schema: &ContentTypeSchema,
        mut version: DocumentVersion,
    ) -> Result<DocumentVersion, ValidationError> {
        version.data = self.apply(schema, std::mem::take(&mut version.data))?;
        Ok(version)
    }
}

fn walk(
    step: &dyn FieldVisitor,
    schema: &ContentTypeSchema,
    data: Map<String, Value>,
    parent: Option<&str>,
) -> Result<Map<String, Value>, ValidationError> {
    let mut out = Map::with_capacity(data.len());
    for (key, value) in data {
        let path = match parent {
            Some(parent) => format!("{parent}.{key}"),
            None => key.clone(),
        };
        let attribute = parent.is_none().then(|| schema.attribute(&key)).flatten();
        let field = Field {
            key: &key,
            path: &path,
            attribute,
            value: &value,
        };
        let value = match step.visit(field)? {
            Visit::Remove => continue,
            Visit::Replace(replacement) => replacement,
            Visit::Keep => value,
        };
        let nested = parent.is_some()
            || attribute.is_some_and(|a| {
                matches!(a.kind, AttributeKind::Component | AttributeKind::Dynamiczone)
            });
        let value = if nested {
            descend(step, schema, value, &path)?
        } else {
            value
        };
        out.insert(key, value);
    }
    Ok(out)
}

fn descend(
    step: &dyn FieldVisitor,
    schema: &ContentTypeSchema,
    value: Value,
    path: &str,
) -> Result<Value, ValidationError> {
    match value {
        Value::Object(map) => walk(step, schema, map, Some(path)).map(Value::Object),
        Value::Array(items) => items
            .into_iter()
            .map(|item| descend(step, schema, item, path))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

/// Strips engine-owned control attributes from the root.
pub struct RemoveReserved;

impl FieldVisitor for RemoveReserved {
    fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError> {
        if field.is_root() && is_reserved(field.key) {
            return Ok(Visit::Remove);
        }
        Ok(Visit::Keep)
    }
}

/// Strips root fields the schema does not declare.
pub struct RemoveUnknown;

impl FieldVisitor for RemoveUnknown {
    fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError> {
        if field.is_root() && field.attribute.is_none() {
            tracing::debug!(field = field.key, "dropping undeclared attribute");
            return Ok(Visit::Remove);
        }
        Ok(Visit::Keep)
    }
}

pub struct CheckTypes;

impl FieldVisitor for CheckTypes {
    fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError> {
        if let Some(attribute) = field.attribute {
            attribute.check_value(field.key, field.value)?;
        }
        Ok(Visit::Keep)
    }
}

/// Replaces plaintext password attributes with an argon2 PHC string. Values
/// that already are a PHC string (restored snapshots) pass through.
pub struct HashPasswords;

impl FieldVisitor for HashPasswords {
    fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError> {
        let is_password = field
            .attribute
            .is_some_and(|a| a.kind == AttributeKind::Password);
        match field.value {
            Value::String(plain) if is_password && !is_password_hash(plain) => {
                let hash = hash_password(plain).map_err(|e| ValidationError::InvalidAttribute {
                    attribute: field.key.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Visit::Replace(Value::String(hash)))
            }
            _ => Ok(Visit::Keep),
        }
    }
}

/// Removes password attributes at the root and any nested `password` key.
pub struct RemovePasswords;

impl FieldVisitor for RemovePasswords {
    fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError> {
        let declared = field
            .attribute
            .is_some_and(|a| a.kind == AttributeKind::Password);
        if declared || (!field.is_root() && field.key == "password") {
            return Ok(Visit::Remove);
        }
        Ok(Visit::Keep)
    }
}

pub struct RemovePrivate;

impl FieldVisitor for RemovePrivate {
    fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError> {
        if field.attribute.is_some_and(|a| a.private) {
            return Ok(Visit::Remove);
        }
        Ok(Visit::Keep)
    }
}

pub fn hash_password(plain: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(plain: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn is_password_hash(value: &str) -> bool {
    value.starts_with("$argon2") && PasswordHash::new(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_support::article_schema;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn input_strips_control_and_unknown_fields() {
        let schema = article_schema();
        let out = Sanitizer::input()
            .apply(
                &schema,
                map(json!({
                    "id": 99,
                    "documentId": "hijack",
                    "publishedAt": "2024-01-01",
                    "title": "Hello",
                    "nope": true
                })),
            )
            .unwrap();
        assert_eq!(out, map(json!({ "title": "Hello" })));
    }

    #[test]
    fn input_rejects_wrong_types() {
        let schema = article_schema();
        let err = Sanitizer::input()
            .apply(&schema, map(json!({ "views": "many" })))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAttribute { .. }));
    }

    #[test]
    fn passwords_are_hashed_once() {
        let schema = article_schema();
        let out = Sanitizer::input()
            .apply(&schema, map(json!({ "password": "123456" })))
            .unwrap();
        let hash = out["password"].as_str().unwrap().to_string();
        assert_ne!(hash, "123456");
        assert!(verify_password("123456", &hash));
        assert!(!verify_password("654321", &hash));

        let again = Sanitizer::input()
            .apply(&schema, map(json!({ "password": hash.clone() })))
            .unwrap();
        assert_eq!(again["password"], hash.as_str());
    }

    #[test]
    fn output_removes_passwords_and_private_fields() {
        let mut schema = article_schema();
        schema.attributes.get_mut("body").unwrap().private = true;
        schema.attributes.insert(
            "seo".into(),
            Attribute::of(AttributeKind::Component),
        );
        let out = Sanitizer::output()
            .apply(
                &schema,
                map(json!({
                    "title": "Hello",
                    "body": "secret",
                    "password": "$argon2id$...",
                    "seo": [{ "metaTitle": "t", "password": "x" }]
                })),
            )
            .unwrap();
        assert_eq!(
            out,
            map(json!({ "title": "Hello", "seo": [{ "metaTitle": "t" }] }))
        );
    }

    #[test]
    fn custom_steps_run_in_order() {
        struct Upper;
        impl FieldVisitor for Upper {
            fn visit(&self, field: Field<'_>) -> Result<Visit, ValidationError> {
                Ok(match field.value.as_str() {
                    Some(s) => Visit::Replace(Value::String(s.to_uppercase())),
                    None => Visit::Keep,
                })
            }
        }
        let schema = article_schema();
        let out = Sanitizer::new()
            .step(RemoveUnknown)
            .step(Upper)
            .apply(&schema, map(json!({ "title": "hi", "extra": "x" })))
            .unwrap();
        assert_eq!(out, map(json!({ "title": "HI" })));
    }
}
