//! Dot-notation path access over `serde_json::Value`.
//!
//! Used by the expression resolver (`state.items[0].title`) and by `setState`
//! writes (`form.title`). Supports:
//! - Nested keys (`a.b.c`)
//! - Bracket indexing (`items[0].title`)
//! - Dot indexing (`items.0.title`)

use serde_json::{json, Map, Value};

/// Path access error
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Cannot set value at path: {0}")]
    CannotSetValue(String),
}

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Split a path into segments. Returns `None` for malformed input
/// (empty parts, unterminated brackets, non-numeric indices).
pub fn parse_segments(path: &str) -> Option<Vec<Segment<'_>>> {
    let path = path.trim();
    if path.is_empty() {
        return Some(Vec::new());
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }

        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if !key.is_empty() {
            segments.push(Segment::Key(key));
        } else if rest.is_empty() {
            return None;
        }

        while !rest.is_empty() {
            let close = rest.find(']')?;
            if !rest.starts_with('[') {
                return None;
            }
            let idx = rest[1..close].trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(idx));
            rest = &rest[close + 1..];
        }
    }
    Some(segments)
}

/// Path mapper for extracting and setting values in JSON using dot-notation paths
pub struct PathMapper;

impl PathMapper {
    /// Get value from JSON using dot-notation path. An empty path returns the root.
    ///
    /// Examples:
    /// - "user.handle"
    /// - "items[0].title"
    /// - "items.0.title"
    pub fn get_path<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
        let segments = parse_segments(path)?;
        let mut current = obj;

        for segment in segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Key(key), Value::Array(arr)) => arr.get(key.parse::<usize>().ok()?)?,
                (Segment::Index(idx), Value::Array(arr)) => arr.get(idx)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Set value at nested path in JSON object, creating intermediate objects.
    ///
    /// Examples:
    /// - "count" -> sets obj["count"]
    /// - "form.title" -> sets obj["form"]["title"]
    pub fn set_path(obj: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
        let segments = parse_segments(path)
            .ok_or_else(|| PathError::InvalidPath(path.to_string()))?;
        if segments.is_empty() {
            return Err(PathError::InvalidPath("Empty path".to_string()));
        }

        if !obj.is_object() {
            *obj = json!({});
        }

        let mut current = obj;
        let last = segments.len() - 1;
        for (i, segment) in segments.into_iter().enumerate() {
            let is_last = i == last;
            current = match segment {
                Segment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    let map = current.as_object_mut().ok_or_else(|| {
                        PathError::CannotSetValue(format!("Cannot access object at: {}", key))
                    })?;
                    if is_last {
                        map.insert(key.to_string(), value);
                        return Ok(());
                    }
                    map.entry(key.to_string()).or_insert_with(|| json!({}))
                }
                Segment::Index(idx) => {
                    let arr = current.as_array_mut().ok_or_else(|| {
                        PathError::CannotSetValue(format!("Index [{}] on a non-array", idx))
                    })?;
                    let slot = arr.get_mut(idx).ok_or_else(|| {
                        PathError::CannotSetValue(format!("Index [{}] out of bounds", idx))
                    })?;
                    if is_last {
                        *slot = value;
                        return Ok(());
                    }
                    slot
                }
            };
        }

        Err(PathError::CannotSetValue(path.to_string()))
    }
}
