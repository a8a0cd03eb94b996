//! State delta application.
//!
//! The wire allows two delta shapes: an RFC 6902 operation array, or a
//! shallow object merge (optionally scoped to a `path`). Consumers accept
//! both; producers pick one per endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// JSON Patch operation (RFC 6902).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    /// Operation type (add, remove, replace, test).
    pub op: String,
    /// JSON Pointer path.
    pub path: String,
    /// Value for add/replace/test operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOp {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: "add".to_string(),
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: "replace".to_string(),
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: "remove".to_string(),
            path: path.into(),
            value: None,
        }
    }
}

/// Apply a sequence of patch operations to `target` in order.
///
/// Missing parents for `add`/`replace` are created as objects rather than
/// rejected, so a delta can land on state the consumer has not seen yet.
pub fn apply_patch(target: &mut Value, ops: &[PatchOp]) -> Result<(), ProtocolError> {
    for op in ops {
        apply_op(target, op)?;
    }
    Ok(())
}

fn apply_op(target: &mut Value, op: &PatchOp) -> Result<(), ProtocolError> {
    let segments = parse_pointer(&op.path)?;

    match op.op.as_str() {
        "add" | "replace" => {
            let value = op
                .value
                .clone()
                .ok_or_else(|| ProtocolError::InvalidPatch(format!("{} needs a value", op.op)))?;
            set_at(target, &segments, value, op.op == "add")
        }
        "remove" => remove_at(target, &segments),
        "test" => {
            let expected = op
                .value
                .as_ref()
                .ok_or_else(|| ProtocolError::InvalidPatch("test needs a value".to_string()))?;
            match resolve(target, &segments) {
                Some(actual) if actual == expected => Ok(()),
                _ => Err(ProtocolError::InvalidPatch(format!(
                    "test failed at {}",
                    op.path
                ))),
            }
        }
        other => Err(ProtocolError::InvalidPatch(format!(
            "unsupported op '{}'",
            other
        ))),
    }
}

/// Shallow-merge `delta`'s top-level keys into `target`.
///
/// `target` becomes an object if it is not one already.
pub fn merge_object(target: &mut Value, delta: &Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let object = target.as_object_mut().expect("just ensured object");
    for (key, value) in delta {
        object.insert(key.clone(), value.clone());
    }
}

/// Merge `delta` at the object addressed by `path`, creating the parent
/// chain as objects where missing.
pub fn merge_at_path(
    target: &mut Value,
    path: &str,
    delta: &Map<String, Value>,
) -> Result<(), ProtocolError> {
    let segments = parse_pointer(path)?;
    let mut node = target;
    for segment in &segments {
        node = descend_or_create(node, segment)?;
    }
    merge_object(node, delta);
    Ok(())
}

/// Split a JSON Pointer into unescaped segments.
///
/// `""` addresses the document root; `"/"` addresses the empty-string key.
fn parse_pointer(path: &str) -> Result<Vec<String>, ProtocolError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(ProtocolError::InvalidPointer(path.to_string()));
    };
    Ok(rest
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn resolve<'a>(target: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut node = target;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

fn descend_or_create<'a>(
    node: &'a mut Value,
    segment: &str,
) -> Result<&'a mut Value, ProtocolError> {
    match node {
        Value::Array(items) => {
            let index: usize = segment
                .parse()
                .map_err(|_| ProtocolError::InvalidPointer(segment.to_string()))?;
            items
                .get_mut(index)
                .ok_or_else(|| ProtocolError::InvalidPatch(format!("index {} out of range", index)))
        }
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        other => {
            // A scalar parent is promoted to an object so the path exists.
            *other = Value::Object(Map::new());
            Ok(other
                .as_object_mut()
                .expect("just replaced with object")
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())))
        }
    }
}

fn set_at(
    target: &mut Value,
    segments: &[String],
    value: Value,
    is_add: bool,
) -> Result<(), ProtocolError> {
    let Some((last, parents)) = segments.split_last() else {
        *target = value;
        return Ok(());
    };

    let mut node = target;
    for segment in parents {
        node = descend_or_create(node, segment)?;
    }

    match node {
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
            } else {
                let index: usize = last
                    .parse()
                    .map_err(|_| ProtocolError::InvalidPointer(last.clone()))?;
                if is_add && index <= items.len() {
                    items.insert(index, value);
                } else if index < items.len() {
                    items[index] = value;
                } else {
                    return Err(ProtocolError::InvalidPatch(format!(
                        "index {} out of range",
                        index
                    )));
                }
            }
            Ok(())
        }
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        other => {
            let mut map = Map::new();
            map.insert(last.clone(), value);
            *other = Value::Object(map);
            Ok(())
        }
    }
}

fn remove_at(target: &mut Value, segments: &[String]) -> Result<(), ProtocolError> {
    let Some((last, parents)) = segments.split_last() else {
        *target = Value::Null;
        return Ok(());
    };

    let mut node = target;
    for segment in parents {
        node = match node {
            Value::Object(map) => map.get_mut(segment).ok_or_else(|| {
                ProtocolError::InvalidPatch(format!("missing path segment '{}'", segment))
            })?,
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| ProtocolError::InvalidPointer(segment.clone()))?;
                items.get_mut(index).ok_or_else(|| {
                    ProtocolError::InvalidPatch(format!("index {} out of range", index))
                })?
            }
            _ => {
                return Err(ProtocolError::InvalidPatch(format!(
                    "cannot traverse into scalar at '{}'",
                    segment
                )))
            }
        };
    }

    match node {
        Value::Object(map) => {
            map.remove(last).ok_or_else(|| {
                ProtocolError::InvalidPatch(format!("missing key '{}'", last))
            })?;
            Ok(())
        }
        Value::Array(items) => {
            let index: usize = last
                .parse()
                .map_err(|_| ProtocolError::InvalidPointer(last.clone()))?;
            if index < items.len() {
                items.remove(index);
                Ok(())
            } else {
                Err(ProtocolError::InvalidPatch(format!(
                    "index {} out of range",
                    index
                )))
            }
        }
        _ => Err(ProtocolError::InvalidPatch(
            "cannot remove from scalar".to_string(),
        )),
    }
}
