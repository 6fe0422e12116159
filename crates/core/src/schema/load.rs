//! Load content-type schemas from `*.json` files in a directory.
use std::fs;
use std::path::Path;

use serde_json::Value;

use super::{ContentTypeSchema, InMemorySchemaRegistry, SchemaError};
use crate::document::id::ContentTypeUid;

/// Parse one schema document. A missing `uid` is derived from
/// `info.singularName` as `api::{name}.{name}`.
pub fn parse_schema(path: &str, raw: &str) -> Result<ContentTypeSchema, SchemaError> {
    let parse_err = |source| SchemaError::Parse {
        path: path.to_string(),
        source,
    };
    let mut value: Value = serde_json::from_str(raw).map_err(parse_err)?;

    if value.get("uid").is_none() {
        let singular = value
            .pointer("/info/singularName")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::MissingName {
                path: path.to_string(),
            })?;
        let uid = ContentTypeUid::api(singular)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("uid".into(), Value::String(uid.to_string()));
        }
    }

    serde_json::from_value(value).map_err(parse_err)
}

/// Build a registry from every `*.json` file in `dir` (non-recursive, sorted by
/// file name so registration order is stable).
pub fn load_dir(dir: impl AsRef<Path>) -> Result<InMemorySchemaRegistry, SchemaError> {
    let dir = dir.as_ref();
    let io_err = |path: &Path, source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut registry = InMemorySchemaRegistry::new();
    for path in paths {
        let raw = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let schema = parse_schema(&path.display().to_string(), &raw)?;
        tracing::info!(uid = %schema.uid, path = %path.display(), "loaded content type schema");
        registry.register(schema)?;
    }
    Ok(registry)
}
