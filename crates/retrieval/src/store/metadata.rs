//! Flattening arbitrary JSON metadata into the store's flat value map.

use crate::types::{Metadata, MetadataValue};
use serde_json::Value;

/// What to do with list values while flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPolicy {
    /// Scalar lists become comma-joined strings; nested lists become JSON.
    #[default]
    Join,
    /// Lists are dropped entirely.
    Drop,
}

/// Flatten a JSON object with [`ListPolicy::Join`].
pub fn flatten_metadata(value: &Value) -> Metadata {
    flatten_metadata_with(value, ListPolicy::Join)
}

/// Flatten a JSON object into string/number/bool values.
///
/// Nulls are dropped and objects are serialized to JSON strings. A
/// non-object input yields an empty map.
pub fn flatten_metadata_with(value: &Value, lists: ListPolicy) -> Metadata {
    let Value::Object(map) = value else {
        return Metadata::new();
    };

    map.iter()
        .filter_map(|(key, value)| flatten_value(value, lists).map(|v| (key.clone(), v)))
        .collect()
}

fn flatten_value(value: &Value, lists: ListPolicy) -> Option<MetadataValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(MetadataValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(MetadataValue::Integer)
            .or_else(|| n.as_f64().map(MetadataValue::Float)),
        Value::String(s) => Some(MetadataValue::Text(s.clone())),
        Value::Array(items) => match lists {
            ListPolicy::Drop => None,
            ListPolicy::Join if items.iter().all(is_scalar) => Some(MetadataValue::Text(
                items
                    .iter()
                    .filter_map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(","),
            )),
            ListPolicy::Join => Some(MetadataValue::Text(value.to_string())),
        },
        Value::Object(_) => Some(MetadataValue::Text(value.to_string())),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_scalars_and_nulls() {
        let flat = flatten_metadata(&json!({
            "page_number": 3,
            "confidence": 0.92,
            "has_text": false,
            "filename": "a.png",
            "missing": null
        }));

        assert_eq!(flat["page_number"], MetadataValue::Integer(3));
        assert_eq!(flat["confidence"], MetadataValue::Float(0.92));
        assert_eq!(flat["has_text"], MetadataValue::Bool(false));
        assert_eq!(flat["filename"], MetadataValue::Text("a.png".into()));
        assert!(!flat.contains_key("missing"));
    }

    #[test]
    fn test_flatten_lists_and_objects() {
        let flat = flatten_metadata(&json!({
            "tags": ["q3", "finance", 2024],
            "boxes": [[1, 2], [3, 4]],
            "size": {"w": 640, "h": 480}
        }));

        assert_eq!(flat["tags"], MetadataValue::Text("q3,finance,2024".into()));
        assert_eq!(flat["boxes"], MetadataValue::Text("[[1,2],[3,4]]".into()));
        let size: Value = serde_json::from_str(flat["size"].as_str().unwrap()).unwrap();
        assert_eq!(size, json!({"w": 640, "h": 480}));
    }

    #[test]
    fn test_drop_policy_removes_lists() {
        let flat = flatten_metadata_with(
            &json!({"words": ["a", "b"], "speaker": "Ana"}),
            ListPolicy::Drop,
        );
        assert!(!flat.contains_key("words"));
        assert_eq!(flat["speaker"], MetadataValue::Text("Ana".into()));
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(flatten_metadata(&json!("text")).is_empty());
    }
}
