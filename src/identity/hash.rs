//! Content hashing over a record's semantic fields
//!
//! The canonical form is a compact JSON rendering with object keys sorted at
//! every depth and arrays kept in order. Volatile fields (`updatedAt`) are
//! excluded, so re-fetching an unchanged item yields the same digest.

use crate::ingest::IngestionRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of a record's canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash a record. Equal digests mean "content-equal".
pub fn content_hash(record: &IngestionRecord) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(record).as_bytes());
    ContentHash(format!("{:x}", hasher.finalize()))
}

/// The exact string that [`content_hash`] digests
pub fn canonical_string(record: &IngestionRecord) -> String {
    let metadata: Map<String, Value> = record
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut fields = Map::new();
    fields.insert("externalId".into(), Value::String(record.external_id.clone()));
    fields.insert("title".into(), Value::String(record.title.clone()));
    fields.insert("content".into(), Value::String(record.content.clone()));
    fields.insert("url".into(), optional(&record.url));
    fields.insert("metadata".into(), Value::Object(metadata));
    fields.insert("nodeType".into(), Value::String(record.node_type.clone()));
    fields.insert("domain".into(), Value::String(record.domain.clone()));
    fields.insert(
        "references".into(),
        Value::Array(record.references.iter().cloned().map(Value::String).collect()),
    );
    fields.insert("parentExternalId".into(), optional(&record.parent_external_id));

    let mut out = String::new();
    write_canonical(&Value::Object(fields), &mut out);
    out
}

fn optional(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        // Value's Display is compact JSON, which escapes the string for us
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rand::seq::SliceRandom;
    use serde_json::json;
    use std::collections::HashMap;

    fn record() -> IngestionRecord {
        IngestionRecord::new("alpha.md", "Alpha").with_content("first body")
    }

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        let hash = content_hash(&record());
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn metadata_key_order_does_not_matter() {
        let a = record()
            .with_metadata("a", json!(1))
            .with_metadata("b", json!(2));
        let b = record()
            .with_metadata("b", json!(2))
            .with_metadata("a", json!(1));
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn nested_key_order_does_not_matter() {
        let a = record().with_metadata("nested", json!({"x": {"p": 1, "q": 2}, "y": [1, 2]}));
        let b = record().with_metadata("nested", json!({"y": [1, 2], "x": {"q": 2, "p": 1}}));
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn shuffled_insertion_order_is_stable() {
        let mut keys: Vec<String> = (0..32).map(|i| format!("key-{i}")).collect();
        let baseline = {
            let mut r = record();
            for k in &keys {
                r.metadata.insert(k.clone(), json!(k));
            }
            content_hash(&r)
        };

        for _ in 0..5 {
            keys.shuffle(&mut rand::thread_rng());
            let mut metadata = HashMap::new();
            for k in &keys {
                metadata.insert(k.clone(), json!(k));
            }
            let mut r = record();
            r.metadata = metadata;
            assert_eq!(content_hash(&r), baseline);
        }
    }

    #[test]
    fn reference_order_is_significant() {
        let a = record().with_reference("b").with_reference("c");
        let b = record().with_reference("c").with_reference("b");
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn updated_at_is_ignored() {
        let a = record().with_updated_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let b = record().with_updated_at(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_change_changes_hash() {
        assert_ne!(
            content_hash(&record()),
            content_hash(&record().with_content("second body"))
        );
    }

    #[test]
    fn missing_optionals_render_as_null() {
        let canonical = canonical_string(&record());
        assert!(canonical.contains("\"url\":null"));
        assert!(canonical.contains("\"parentExternalId\":null"));
        // keys sorted lexicographically at the top level
        assert!(canonical.starts_with("{\"content\":"));
    }

    #[test]
    fn escapes_are_canonical() {
        let r = IngestionRecord::new("q", "Say \"hi\"\n");
        assert!(canonical_string(&r).contains(r#""title":"Say \"hi\"\n""#));
    }
}
