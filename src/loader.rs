//! Loading schema and template documents from disk.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::SchemaError;
use crate::resource::ResourceSchema;
use crate::types::unescape_segment;

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `SchemaError::FileNotFound` if the file doesn't exist,
/// or `SchemaError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, SchemaError> {
    if !path.exists() {
        return Err(SchemaError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `SchemaError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, SchemaError> {
    serde_json::from_str(content).map_err(|source| SchemaError::InvalidJson { source })
}

/// Load and parse a resource schema file.
pub fn load_resource_schema(path: &Path) -> Result<ResourceSchema, SchemaError> {
    ResourceSchema::from_value(load_document(path)?)
}

/// Navigate a JSON Pointer (e.g. "#/definitions/Tag" or "/properties/Tags/items").
///
/// Array elements are addressed by index. Returns `None` when any step is
/// missing.
pub fn navigate_pointer<'a>(document: &'a Value, pointer: &str) -> Option<&'a Value> {
    let path = pointer.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Some(document);
    }

    let mut current = document;
    for part in path.split('/') {
        let key = unescape_segment(part);
        current = match current {
            Value::Object(map) => map.get(&key)?,
            Value::Array(elements) => elements.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Collect all .json files in a path (file or directory), sorted.
pub fn collect_json_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_json(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_json(&path) {
            files.push(path);
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}
