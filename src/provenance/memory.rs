//! In-memory [`ProvenanceStore`] for tests and dry tooling

use super::traits::{ProvenanceError, ProvenanceResult, ProvenanceStore};
use super::types::{SourceId, SourceIdentity, SourceItem};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

type ItemKey = (SourceId, String);

/// DashMap-backed provenance. Per-key entry locking gives the same
/// compare-and-set behaviour as the SQLite backend.
#[derive(Debug, Default)]
pub struct MemoryProvenanceStore {
    /// Keyed by `type:name`
    sources: DashMap<String, (SourceId, SourceIdentity)>,
    items: DashMap<ItemKey, SourceItem>,
}

impl MemoryProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all sources, including soft-deleted ones
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ProvenanceStore for MemoryProvenanceStore {
    fn resolve_source_id(&self, identity: &SourceIdentity) -> ProvenanceResult<SourceId> {
        let mut entry = self
            .sources
            .entry(identity.source_key())
            .or_insert_with(|| {
                (
                    SourceId::from_string(Uuid::new_v4().to_string()),
                    identity.clone(),
                )
            });
        entry.1.config = identity.config.clone();
        Ok(entry.0.clone())
    }

    fn find_source_id(&self, identity: &SourceIdentity) -> ProvenanceResult<Option<SourceId>> {
        Ok(self
            .sources
            .get(&identity.source_key())
            .map(|entry| entry.0.clone()))
    }

    fn find_source_item(
        &self,
        source_id: &SourceId,
        external_id: &str,
    ) -> ProvenanceResult<Option<SourceItem>> {
        let key = (source_id.clone(), external_id.to_string());
        Ok(self.items.get(&key).map(|r| r.clone()))
    }

    fn upsert_source_item(&self, item: &SourceItem) -> ProvenanceResult<SourceItem> {
        let conflict = || ProvenanceError::Conflict {
            source_id: item.source_id.clone(),
            external_id: item.external_id.clone(),
        };
        let mut stored = item.clone();
        stored.revision = item.revision + 1;

        match self
            .items
            .entry((item.source_id.clone(), item.external_id.clone()))
        {
            Entry::Occupied(mut existing) => {
                if existing.get().revision != item.revision {
                    return Err(conflict());
                }
                existing.insert(stored.clone());
            }
            Entry::Vacant(slot) => {
                if item.revision != 0 {
                    return Err(conflict());
                }
                slot.insert(stored.clone());
            }
        }
        Ok(stored)
    }

    fn list_items_for_source(
        &self,
        source_id: &SourceId,
        include_deleted: bool,
    ) -> ProvenanceResult<Vec<SourceItem>> {
        let mut items: Vec<SourceItem> = self
            .items
            .iter()
            .filter(|r| &r.source_id == source_id && (include_deleted || !r.is_deleted()))
            .map(|r| r.value().clone())
            .collect();
        items.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(items)
    }

    fn mark_deleted(
        &self,
        source_id: &SourceId,
        external_id: &str,
        at: DateTime<Utc>,
    ) -> ProvenanceResult<()> {
        let key = (source_id.clone(), external_id.to_string());
        if let Some(mut item) = self.items.get_mut(&key) {
            if item.deleted_at.is_none() {
                item.deleted_at = Some(at);
                item.revision += 1;
            }
        }
        Ok(())
    }

    fn delete_item(&self, source_id: &SourceId, external_id: &str) -> ProvenanceResult<bool> {
        let key = (source_id.clone(), external_id.to_string());
        Ok(self.items.remove(&key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::identity::ContentHash;

    fn item(store: &MemoryProvenanceStore, external_id: &str) -> SourceItem {
        let source_id = store
            .resolve_source_id(&SourceIdentity::new("markdown", "docs"))
            .unwrap();
        SourceItem::new(
            source_id,
            external_id,
            NodeId::new(),
            ContentHash::from_hex("abc"),
            Utc::now(),
        )
    }

    #[test]
    fn resolve_is_stable_per_key() {
        let store = MemoryProvenanceStore::new();
        let docs = SourceIdentity::new("markdown", "docs");
        let a = store.resolve_source_id(&docs).unwrap();
        let b = store
            .resolve_source_id(&docs.clone().with_config(serde_json::json!({"root": "/x"})))
            .unwrap();
        let other = store
            .resolve_source_id(&SourceIdentity::new("markdown", "wiki"))
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn find_source_id_is_read_only() {
        let store = MemoryProvenanceStore::new();
        let blog = SourceIdentity::new("rss", "blog");
        assert!(store.find_source_id(&blog).unwrap().is_none());
        assert!(store.find_source_id(&blog).unwrap().is_none());

        let id = store.resolve_source_id(&blog).unwrap();
        assert_eq!(store.find_source_id(&blog).unwrap(), Some(id));
    }

    #[test]
    fn upsert_then_find() {
        let store = MemoryProvenanceStore::new();
        let row = item(&store, "alpha.md");
        let stored = store.upsert_source_item(&row).unwrap();
        assert_eq!(stored.revision, 1);

        let found = store
            .find_source_item(&row.source_id, "alpha.md")
            .unwrap()
            .unwrap();
        assert_eq!(found, stored);
    }

    #[test]
    fn stale_revision_conflicts() {
        let store = MemoryProvenanceStore::new();
        let row = item(&store, "alpha.md");
        let first = store.upsert_source_item(&row).unwrap();

        // A second writer still holding the pre-insert view
        let err = store.upsert_source_item(&row).unwrap_err();
        assert!(matches!(err, ProvenanceError::Conflict { .. }));

        // The current holder succeeds
        let second = store.upsert_source_item(&first).unwrap();
        assert_eq!(second.revision, 2);
    }

    #[test]
    fn mark_deleted_is_idempotent() {
        let store = MemoryProvenanceStore::new();
        let row = item(&store, "beta.md");
        store.upsert_source_item(&row).unwrap();

        let first_at = Utc::now();
        store.mark_deleted(&row.source_id, "beta.md", first_at).unwrap();
        store
            .mark_deleted(&row.source_id, "beta.md", first_at + chrono::Duration::hours(1))
            .unwrap();
        store.mark_deleted(&row.source_id, "never-seen", first_at).unwrap();

        let found = store.find_source_item(&row.source_id, "beta.md").unwrap().unwrap();
        assert_eq!(found.deleted_at, Some(first_at));
        assert!(store.list_items_for_source(&row.source_id, false).unwrap().is_empty());
        assert_eq!(store.list_items_for_source(&row.source_id, true).unwrap().len(), 1);
    }

    #[test]
    fn delete_item_removes_row() {
        let store = MemoryProvenanceStore::new();
        let row = item(&store, "gamma.md");
        store.upsert_source_item(&row).unwrap();
        assert!(store.delete_item(&row.source_id, "gamma.md").unwrap());
        assert!(!store.delete_item(&row.source_id, "gamma.md").unwrap());
        assert!(store.find_source_item(&row.source_id, "gamma.md").unwrap().is_none());
    }
}
