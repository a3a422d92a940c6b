//! Records produced by connectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_node_type() -> String {
    "document".to_string()
}

fn default_domain() -> String {
    "default".to_string()
}

/// One item from an external source, in connector-agnostic form.
///
/// `external_id` is unique within its source; `references` and
/// `parent_external_id` name other records of the same source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRecord {
    pub external_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default = "default_node_type")]
    pub node_type: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_external_id: Option<String>,
}

impl IngestionRecord {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            content: String::new(),
            url: None,
            updated_at: None,
            metadata: HashMap::new(),
            node_type: default_node_type(),
            domain: default_domain(),
            references: Vec::new(),
            parent_external_id: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_reference(mut self, external_id: impl Into<String>) -> Self {
        self.references.push(external_id.into());
        self
    }

    pub fn with_parent(mut self, external_id: impl Into<String>) -> Self {
        self.parent_external_id = Some(external_id.into());
        self
    }

    /// Structural checks a record must pass before it touches any store.
    pub fn validate(&self) -> Result<(), String> {
        if self.external_id.trim().is_empty() {
            return Err("externalId must not be empty".into());
        }
        if self.title.trim().is_empty() {
            return Err(format!("record '{}' has an empty title", self.external_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_with_defaults() {
        let record: IngestionRecord = serde_json::from_value(json!({
            "externalId": "alpha.md",
            "title": "Alpha"
        }))
        .unwrap();
        assert_eq!(record.node_type, "document");
        assert_eq!(record.domain, "default");
        assert!(record.references.is_empty());
        assert!(record.parent_external_id.is_none());
    }

    #[test]
    fn validation_rejects_blank_fields() {
        assert!(IngestionRecord::new("", "Title").validate().is_err());
        assert!(IngestionRecord::new("a", "   ").validate().is_err());
        assert!(IngestionRecord::new("a", "Title").validate().is_ok());
    }
}
