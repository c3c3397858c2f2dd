//! Loading of API description fragments from JSON or YAML text.

use crate::error::LoadError;
use crate::utils::offset_of;
use miette::NamedSource;
use serde_json::Value;
use std::path::Path;

/// The canonical, mutable API description tree.
pub type Document = Value;

/// Path item keys that declare operations.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Parses one fragment. JSON is assumed when the name ends in `.json` or the
/// text opens with `{` or `[`; everything else is read as YAML.
pub fn parse_fragment(text: &str, name: &str) -> Result<Document, LoadError> {
    let trimmed = text.trim_start();
    let is_json = name.ends_with(".json") || trimmed.starts_with('{') || trimmed.starts_with('[');
    let value = if is_json {
        serde_json::from_str::<Value>(text).map_err(|e| {
            let offset = offset_of(text, e.line(), e.column());
            LoadError::Json {
                src: NamedSource::new(name, text.to_string()),
                span: (offset, 0).into(),
                message: e.to_string(),
            }
        })?
    } else {
        serde_yaml::from_str::<Value>(text).map_err(|e| {
            let offset = e.location().map_or(0, |l| l.index());
            LoadError::Yaml {
                src: NamedSource::new(name, text.to_string()),
                span: (offset, 0).into(),
                message: e.to_string(),
            }
        })?
    };
    match value {
        Value::Object(_) => Ok(value),
        // An empty YAML file parses to null.
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        other => Err(LoadError::NotAnObject {
            found: kind_name(&other).to_string(),
        }),
    }
}

/// Reads and parses a fragment from disk.
pub fn load_fragment(path: impl AsRef<Path>) -> Result<Document, LoadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    log::debug!("loaded fragment {}", path.display());
    parse_fragment(&text, &path.to_string_lossy())
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Returns the `$ref` string when `value` is a reference object.
pub fn ref_of(value: &Value) -> Option<&str> {
    value.get("$ref").and_then(Value::as_str)
}
