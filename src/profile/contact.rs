//! Dot-notation contact flattening: one canonical transform between a
//! nested contact document and the flat key/value rows the profile database
//! stores.
//!
//! A contact document is an arbitrarily nested tree of objects, arrays, and
//! string leaves. Flattening turns it into a single-level map keyed by
//! dot-joined paths (`"Website.Personal"`, `"Phone.0.Label"`); unflattening
//! is the exact inverse, so `unflatten(flatten(doc)) == doc` for any valid
//! document.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{MensagoError, Result};

/// Flattens `doc` (which must be a JSON object) into dot-path keyed leaves.
pub fn flatten(doc: &Value) -> Result<HashMap<String, String>> {
    let obj = doc
        .as_object()
        .ok_or_else(|| MensagoError::BadType("contact document must be an object".into()))?;

    let mut out = HashMap::new();
    for (key, value) in obj {
        flatten_value(&mut out, key, value)?;
    }
    Ok(out)
}

fn flatten_value(out: &mut HashMap<String, String>, prefix: &str, value: &Value) -> Result<()> {
    match value {
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
            Ok(())
        }
        Value::Object(map) => {
            for (key, v) in map {
                flatten_value(out, &format!("{prefix}.{key}"), v)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_value(out, &format!("{prefix}.{i}"), v)?;
            }
            Ok(())
        }
        _ => Err(MensagoError::BadType(format!(
            "field {prefix} is not a dictionary, list, or string"
        ))),
    }
}

/// A single path segment: either a list index or an object key. Sorting by
/// this key ahead of [`unflatten`] guarantees every list is rebuilt with
/// its indices in ascending order, which the append-only construction
/// below requires.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum PathSeg {
    Index(u64),
    Name(String),
}

fn path_key(field: &str) -> Vec<PathSeg> {
    field
        .split('.')
        .map(|seg| match seg.parse::<u64>() {
            Ok(n) if !seg.starts_with('-') => PathSeg::Index(n),
            _ => PathSeg::Name(seg.to_string()),
        })
        .collect()
}

/// Rebuilds a contact document from a flattened map. Entries are applied in
/// path order regardless of the map's own iteration order.
pub fn unflatten(flat: &HashMap<String, String>) -> Result<Value> {
    let mut keys: Vec<&String> = flat.keys().collect();
    keys.sort_by_key(|k| path_key(k));

    let mut root = Value::Object(Map::new());
    for key in keys {
        set_field(&mut root, key, &flat[key])?;
    }
    Ok(root)
}

fn set_field(root: &mut Value, fieldname: &str, value: &str) -> Result<()> {
    if fieldname.is_empty() {
        return Err(MensagoError::BadParameterValue("empty field name".into()));
    }
    let segments: Vec<&str> = fieldname.split('.').collect();
    set_recurse(root, &segments, value)
}

fn set_recurse(target: &mut Value, segments: &[&str], value: &str) -> Result<()> {
    let is_last = segments.len() == 1;
    let next_is_index = !is_last && segments[1].parse::<u64>().is_ok() && !segments[1].starts_with('-');

    match target {
        Value::Array(items) => {
            let idx = parse_index(segments[0])?;
            if is_last {
                if idx == items.len() {
                    items.push(Value::String(value.to_string()));
                } else if idx < items.len() {
                    items[idx] = Value::String(value.to_string());
                } else {
                    return Err(MensagoError::OutOfRange(format!(
                        "list index {idx} is past the end of a {}-element list",
                        items.len()
                    )));
                }
            } else {
                if idx == items.len() {
                    items.push(if next_is_index {
                        Value::Array(Vec::new())
                    } else {
                        Value::Object(Map::new())
                    });
                } else if idx > items.len() {
                    return Err(MensagoError::OutOfRange(format!(
                        "list index {idx} is past the end of a {}-element list",
                        items.len()
                    )));
                }
                set_recurse(&mut items[idx], &segments[1..], value)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            let key = segments[0].to_string();
            if is_last {
                map.insert(key, Value::String(value.to_string()));
            } else {
                if !map.contains_key(&key) {
                    map.insert(
                        key.clone(),
                        if next_is_index {
                            Value::Array(Vec::new())
                        } else {
                            Value::Object(Map::new())
                        },
                    );
                }
                set_recurse(map.get_mut(&key).unwrap(), &segments[1..], value)?;
            }
            Ok(())
        }
        _ => Err(MensagoError::BadType(format!(
            "cannot descend into a leaf value at segment {}",
            segments[0]
        ))),
    }
}

fn parse_index(segment: &str) -> Result<usize> {
    let signed: i64 = segment
        .parse()
        .map_err(|_| MensagoError::BadData(format!("expected a list index, got {segment}")))?;
    if signed < 0 {
        return Err(MensagoError::OutOfRange(format!(
            "negative list index: {signed}"
        )));
    }
    Ok(signed as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_object_and_list() {
        let doc = json!({
            "FormattedName": "Jane Doe",
            "Website": {"Personal": "https://jane.example"},
            "Phone": [
                {"Label": "Mobile", "Number": "555-1234"},
                {"Label": "Work", "Number": "555-5678"}
            ]
        });
        let flat = flatten(&doc).unwrap();
        assert_eq!(flat.get("FormattedName").unwrap(), "Jane Doe");
        assert_eq!(flat.get("Website.Personal").unwrap(), "https://jane.example");
        assert_eq!(flat.get("Phone.0.Label").unwrap(), "Mobile");
        assert_eq!(flat.get("Phone.1.Number").unwrap(), "555-5678");
        assert_eq!(flat.len(), 5);
    }

    #[test]
    fn round_trips_through_flatten_and_unflatten() {
        let doc = json!({
            "FormattedName": "Jane Doe",
            "Website": {"Personal": "https://jane.example", "Work": "https://acme.example"},
            "Nicknames": ["JD", "Janie"],
            "Phone": [
                {"Label": "Mobile", "Number": "555-1234"},
                {"Label": "Work", "Number": "555-5678"}
            ]
        });
        let flat = flatten(&doc).unwrap();
        let rebuilt = unflatten(&flat).unwrap();
        assert_eq!(rebuilt, doc);
    }

    #[test]
    fn unflatten_rejects_negative_index() {
        let mut flat = HashMap::new();
        flat.insert("Phone.-1.Label".to_string(), "Mobile".to_string());
        assert!(matches!(
            unflatten(&flat).unwrap_err(),
            MensagoError::OutOfRange(_)
        ));
    }

    #[test]
    fn unflatten_rejects_index_past_end() {
        let mut flat = HashMap::new();
        flat.insert("Phone.0.Label".to_string(), "Mobile".to_string());
        flat.insert("Phone.5.Label".to_string(), "Skipped".to_string());
        assert!(matches!(
            unflatten(&flat).unwrap_err(),
            MensagoError::OutOfRange(_)
        ));
    }

    #[test]
    fn flatten_rejects_non_object_root() {
        assert!(flatten(&json!("not an object")).is_err());
    }

    #[test]
    fn empty_document_flattens_to_empty_map() {
        let flat = flatten(&json!({})).unwrap();
        assert!(flat.is_empty());
        assert_eq!(unflatten(&flat).unwrap(), json!({}));
    }
}
