//! YAML/JSON documents addressed by dotted paths.
//!
//! Every document is held as a `serde_yaml::Value`, which keeps mapping order,
//! and written back in the format its file extension names.

use serde_yaml::{Mapping, Value};
use std::path::Path;

use super::atomic::write_atomic;
use crate::error::{Result, StatefulError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

pub fn parse_document(text: &str, format: DocumentFormat) -> Result<Value> {
    let value = match format {
        DocumentFormat::Json => serde_json::from_str(text)?,
        DocumentFormat::Yaml => serde_yaml::from_str(text)?,
    };
    Ok(value)
}

pub fn serialize_document(document: &Value, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Json => {
            let mut text = serde_json::to_string_pretty(document)?;
            text.push('\n');
            Ok(text)
        }
        DocumentFormat::Yaml => Ok(serde_yaml::to_string(document)?),
    }
}

pub async fn load_document(path: &Path) -> Result<Value> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_document(&text, DocumentFormat::from_path(path)).map_err(|e| {
        StatefulError::invalid_manifest(path, e.to_string())
    })
}

pub async fn save_document(path: &Path, document: &Value) -> Result<()> {
    let text = serialize_document(document, DocumentFormat::from_path(path))?;
    write_atomic(path, text.as_bytes()).await
}

pub fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |node, segment| match node {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

pub fn get_path_mut<'a>(document: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(document, |node, segment| match node {
        Value::Mapping(map) => map.get_mut(segment),
        Value::Sequence(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Writes `value` at `path`, creating intermediate mappings as needed.
pub fn set_path(document: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StatefulError::InvalidLocator {
            locator: path.to_string(),
            reason: "empty path segment".to_string(),
        });
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| StatefulError::InvalidLocator {
            locator: path.to_string(),
            reason: "empty path".to_string(),
        })?;

    let mut node = document;
    for segment in parents {
        node = child_or_insert(node, segment, path)?;
    }

    match node {
        Value::Sequence(items) => {
            let slot = segment_index(last, path)
                .and_then(|i| items.get_mut(i).ok_or_else(|| out_of_range(path, last)))?;
            *slot = value;
        }
        other => {
            ensure_mapping(other).insert(Value::String(last.to_string()), value);
        }
    }
    Ok(())
}

fn child_or_insert<'a>(node: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value> {
    match node {
        Value::Sequence(items) => {
            let index = segment_index(segment, path)?;
            items.get_mut(index).ok_or_else(|| out_of_range(path, segment))
        }
        other => Ok(ensure_mapping(other)
            .entry(Value::String(segment.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()))),
    }
}

fn ensure_mapping(node: &mut Value) -> &mut Mapping {
    if !node.is_mapping() {
        *node = Value::Mapping(Mapping::new());
    }
    match node {
        Value::Mapping(map) => map,
        _ => unreachable!("node was just replaced by a mapping"),
    }
}

fn segment_index(segment: &str, path: &str) -> Result<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| StatefulError::InvalidLocator {
            locator: path.to_string(),
            reason: format!("`{segment}` does not index a sequence"),
        })
}

fn out_of_range(path: &str, segment: &str) -> StatefulError {
    StatefulError::InvalidLocator {
        locator: path.to_string(),
        reason: format!("index {segment} out of range"),
    }
}

/// Renders a scalar the way it would appear in a manifest; `None` for collections.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
