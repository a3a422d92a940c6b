//! The sync engine: diff records against provenance and apply the result
//!
//! One run has three strictly ordered phases:
//! 1. reconcile every record in input order (create / update / skip)
//! 2. link references and parents once every node of the batch exists
//! 3. reconcile tracked items that were absent from the input
//!
//! Store writes always go graph first, provenance second, so a crash in
//! between leaves an untracked node that the next run adopts by slug.

use super::connector::{Connector, ListOptions};
use super::error::{EngineResult, IngestError};
use super::options::{DeleteMode, IngestOptions};
use super::record::IngestionRecord;
use super::result::{IngestResult, IngestStats, IngestStatus, RecordError};
use crate::graph::{relationship, Metadata, NewEdge, NewNode, NodeId, NodeUpdate};
use crate::identity::{content_hash, source_aware_slug, ContentHash};
use crate::provenance::{ProvenanceStore, SourceId, SourceItem};
use crate::storage::{EdgeFilter, GraphStore};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Engine-wide behaviour that does not vary per run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Call `GraphStore::flush()` at the end of every non-dry run
    pub flush_after_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_after_run: true,
        }
    }
}

/// Ingestion engine bound to one graph store and one provenance store
///
/// Runs against the same source must not overlap; callers serialize them.
pub struct IngestEngine {
    graph: Arc<dyn GraphStore>,
    provenance: Arc<dyn ProvenanceStore>,
    config: EngineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Skipped,
}

impl IngestEngine {
    pub fn new(graph: Arc<dyn GraphStore>, provenance: Arc<dyn ProvenanceStore>) -> Self {
        Self {
            graph,
            provenance,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    pub fn provenance(&self) -> &Arc<dyn ProvenanceStore> {
        &self.provenance
    }

    /// Fetch from a connector, then [`ingest`](Self::ingest).
    ///
    /// A connector failure or cancellation surfaces before any store is
    /// touched.
    pub async fn sync(
        &self,
        connector: &dyn Connector,
        options: &IngestOptions,
    ) -> EngineResult<IngestResult> {
        let list = ListOptions {
            limit: options.limit,
            since: options.since,
            cancel: options.cancel.clone(),
        };
        let records = connector.list_records(&list).await?;
        if let Some(token) = &options.cancel {
            token.check()?;
        }
        tracing::info!(
            connector = connector.kind(),
            source = %options.source.source_key(),
            fetched = records.len(),
            "connector fetch complete"
        );
        self.ingest(&records, options)
    }

    /// Apply one batch of records for `options.source`.
    ///
    /// Per-record failures are itemized in the result; store failures abort
    /// the run and are returned as `Err`.
    pub fn ingest(
        &self,
        records: &[IngestionRecord],
        options: &IngestOptions,
    ) -> EngineResult<IngestResult> {
        // A dry run must not register the source either
        let source_id = if options.dry_run {
            self.provenance.find_source_id(&options.source)?
        } else {
            Some(self.provenance.resolve_source_id(&options.source)?)
        };
        let mut run = SyncRun {
            graph: self.graph.as_ref(),
            provenance: self.provenance.as_ref(),
            source_id: source_id.clone(),
            source_key: options.source.source_key(),
            dry_run: options.dry_run,
            now: Utc::now(),
            stats: IngestStats {
                total: records.len(),
                ..Default::default()
            },
            errors: Vec::new(),
            seen: HashSet::new(),
            applied: Vec::new(),
        };
        let sync_run_id = Uuid::new_v4().to_string();

        tracing::info!(
            run = %sync_run_id,
            source = %run.source_key,
            records = records.len(),
            delete_mode = %options.delete_mode,
            dry_run = options.dry_run,
            "sync started"
        );

        for record in records {
            run.reconcile_record(record)?;
        }
        run.link_records()?;
        run.reconcile_missing(options.delete_mode)?;

        if !options.dry_run && self.config.flush_after_run {
            self.graph.flush()?;
        }

        let stats = run.stats;
        tracing::info!(
            run = %sync_run_id,
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            deleted = stats.deleted,
            errors = stats.errors,
            "sync finished"
        );

        Ok(IngestResult {
            source_id,
            sync_run_id: Some(sync_run_id),
            status: IngestStatus::from_stats(&stats),
            stats,
            errors: run.errors,
        })
    }
}

/// Mutable state of a single `ingest` call
struct SyncRun<'a> {
    graph: &'a dyn GraphStore,
    provenance: &'a dyn ProvenanceStore,
    /// `None` only for a dry run against a source never synced before
    source_id: Option<SourceId>,
    source_key: String,
    dry_run: bool,
    now: DateTime<Utc>,
    stats: IngestStats,
    errors: Vec<RecordError>,
    /// Every external id present in the input, valid or not
    seen: HashSet<String>,
    /// Records that made it through phase 1, with their node when one exists
    applied: Vec<(&'a IngestionRecord, Option<NodeId>)>,
}

impl<'a> SyncRun<'a> {
    fn source_id(&self) -> EngineResult<&SourceId> {
        self.source_id
            .as_ref()
            .ok_or_else(|| IngestError::StorageUnavailable("source is not registered".into()))
    }

    fn find_item(&self, external_id: &str) -> EngineResult<Option<SourceItem>> {
        match &self.source_id {
            Some(source_id) => Ok(self.provenance.find_source_item(source_id, external_id)?),
            None => Ok(None),
        }
    }

    // === Phase 1 ===

    fn reconcile_record(&mut self, record: &'a IngestionRecord) -> EngineResult<()> {
        let first_sighting = self.seen.insert(record.external_id.clone());
        let result = if first_sighting {
            self.apply_record(record)
        } else {
            Err(IngestError::Validation(format!(
                "duplicate externalId '{}' in batch",
                record.external_id
            )))
        };

        match result {
            Ok((outcome, node_id)) => {
                tracing::debug!(external_id = %record.external_id, ?outcome, "record reconciled");
                match outcome {
                    Outcome::Created => self.stats.created += 1,
                    Outcome::Updated => self.stats.updated += 1,
                    Outcome::Skipped => self.stats.skipped += 1,
                }
                self.applied.push((record, node_id));
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.record_error(&record.external_id, &err);
                Ok(())
            }
        }
    }

    fn record_error(&mut self, external_id: &str, err: &IngestError) {
        tracing::warn!(external_id, error = %err, "record failed");
        self.stats.errors += 1;
        self.errors.push(RecordError {
            external_id: external_id.to_string(),
            error: err.to_string(),
        });
    }

    fn apply_record(
        &mut self,
        record: &IngestionRecord,
    ) -> EngineResult<(Outcome, Option<NodeId>)> {
        record.validate().map_err(IngestError::Validation)?;
        let hash = content_hash(record);
        let existing = self.find_item(&record.external_id)?;
        let node_alive = match &existing {
            Some(item) => self.graph.get_node(&item.node_id)?.is_some(),
            None => false,
        };

        match existing {
            Some(item) if !item.is_deleted() && item.content_hash == hash && node_alive => {
                let node_id = item.node_id.clone();
                if !self.dry_run {
                    let mut item = item;
                    item.last_seen_at = self.now;
                    self.provenance.upsert_source_item(&item)?;
                }
                Ok((Outcome::Skipped, Some(node_id)))
            }
            // changed, resurrected, lost its node, or new
            existing => self.write_node(record, hash, existing),
        }
    }

    /// Update the tracked node if it still exists, otherwise create (or
    /// adopt) one, then record provenance with the tombstone cleared.
    fn write_node(
        &mut self,
        record: &IngestionRecord,
        hash: ContentHash,
        existing: Option<SourceItem>,
    ) -> EngineResult<(Outcome, Option<NodeId>)> {
        let tracked = match &existing {
            Some(item) => self.graph.get_node(&item.node_id)?,
            None => None,
        };

        let (outcome, node_id) = match tracked {
            Some(node) => {
                if !self.dry_run {
                    self.graph.update_node(&node.id, node_update(record, &self.source_key))?;
                }
                (Outcome::Updated, Some(node.id))
            }
            None => {
                let slug = source_aware_slug(&record.title, &self.source_key, &record.external_id);
                match self.graph.get_node_by_slug(&slug)? {
                    Some(orphan) => {
                        tracing::warn!(%slug, node = %orphan.id, "adopting untracked node");
                        if !self.dry_run {
                            self.graph.update_node(&orphan.id, node_update(record, &self.source_key))?;
                        }
                        (Outcome::Updated, Some(orphan.id))
                    }
                    None if self.dry_run => (Outcome::Created, None),
                    None => {
                        let created = self
                            .graph
                            .create_nodes(vec![new_node(record, slug, &self.source_key)])?;
                        let node = created.into_iter().next().ok_or_else(|| {
                            IngestError::StorageUnavailable("graph store returned no node".into())
                        })?;
                        (Outcome::Created, Some(node.id))
                    }
                }
            }
        };

        if let Some(node_id) = node_id.as_ref().filter(|_| !self.dry_run) {
            let item = match existing {
                Some(mut item) => {
                    item.node_id = node_id.clone();
                    item.content_hash = hash;
                    item.last_seen_at = self.now;
                    item.deleted_at = None;
                    item
                }
                None => SourceItem::new(
                    self.source_id()?.clone(),
                    record.external_id.clone(),
                    node_id.clone(),
                    hash,
                    self.now,
                ),
            };
            self.provenance.upsert_source_item(&item)?;
        }
        Ok((outcome, node_id))
    }

    // === Phase 2 ===

    /// Resolve an external id to a live node: this batch first, then
    /// provenance from earlier runs.
    fn resolve(
        &self,
        batch: &HashMap<&str, NodeId>,
        external_id: &str,
    ) -> EngineResult<Option<NodeId>> {
        if let Some(id) = batch.get(external_id) {
            return Ok(Some(id.clone()));
        }
        let Some(item) = self.find_item(external_id)? else {
            return Ok(None);
        };
        if item.is_deleted() {
            return Ok(None);
        }
        Ok(self.graph.get_node(&item.node_id)?.map(|n| n.id))
    }

    fn link_records(&mut self) -> EngineResult<()> {
        if self.dry_run {
            return Ok(());
        }

        let batch: HashMap<&str, NodeId> = self
            .applied
            .iter()
            .filter_map(|(r, id)| id.clone().map(|id| (r.external_id.as_str(), id)))
            .collect();

        let mut failures = Vec::new();
        for (record, node_id) in &self.applied {
            let Some(from) = node_id else { continue };
            match self.link_record(&batch, record, from) {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => failures.push((record.external_id.clone(), err)),
            }
        }
        for (external_id, err) in failures {
            self.record_error(&external_id, &err);
        }
        Ok(())
    }

    /// Make the node's ingestion edges match the record exactly.
    fn link_record(
        &self,
        batch: &HashMap<&str, NodeId>,
        record: &IngestionRecord,
        from: &NodeId,
    ) -> EngineResult<()> {
        let targets = record
            .references
            .iter()
            .map(|r| (r.as_str(), relationship::REFERENCES))
            .chain(
                record
                    .parent_external_id
                    .iter()
                    .map(|p| (p.as_str(), relationship::CHILD_OF)),
            );

        let mut desired: Vec<(NodeId, &'static str)> = Vec::new();
        for (external_id, rel) in targets {
            match self.resolve(batch, external_id)? {
                Some(to) if &to != from => {
                    if !desired.iter().any(|(id, r)| id == &to && *r == rel) {
                        desired.push((to, rel));
                    }
                }
                Some(_) => {}
                None => {
                    tracing::debug!(
                        from = %record.external_id,
                        target = external_id,
                        rel,
                        "unresolved link target"
                    );
                }
            }
        }

        let mut current = self
            .graph
            .list_edges(&EdgeFilter::new().from_node(from.clone()))?;
        current.retain(|e| {
            e.relationship_type == relationship::REFERENCES
                || e.relationship_type == relationship::CHILD_OF
        });

        let mut kept: HashSet<(NodeId, String)> = HashSet::new();
        for edge in current {
            let key = (edge.to_node_id.clone(), edge.relationship_type.clone());
            let wanted = desired
                .iter()
                .any(|(id, r)| id == &edge.to_node_id && *r == edge.relationship_type);
            if wanted && kept.insert(key) {
                continue;
            }
            self.graph.delete_edge(&edge.id)?;
        }

        let new_edges: Vec<NewEdge> = desired
            .into_iter()
            .filter(|(id, r)| !kept.contains(&(id.clone(), r.to_string())))
            .map(|(to, rel)| NewEdge::new(from.clone(), to, rel))
            .collect();
        if !new_edges.is_empty() {
            self.graph.create_edges(new_edges)?;
        }
        Ok(())
    }

    // === Phase 3 ===

    fn reconcile_missing(&mut self, mode: DeleteMode) -> EngineResult<()> {
        let Some(source_id) = self.source_id.clone() else {
            return Ok(());
        };
        if mode == DeleteMode::None {
            return Ok(());
        }

        let include_deleted = mode == DeleteMode::Hard;
        let missing: Vec<SourceItem> = self
            .provenance
            .list_items_for_source(&source_id, include_deleted)?
            .into_iter()
            .filter(|item| !self.seen.contains(&item.external_id))
            .collect();

        for item in missing {
            if !self.dry_run {
                if mode == DeleteMode::Hard {
                    self.graph.delete_node(&item.node_id)?;
                    self.provenance
                        .delete_item(&source_id, &item.external_id)?;
                } else {
                    self.provenance
                        .mark_deleted(&source_id, &item.external_id, self.now)?;
                }
            }
            tracing::debug!(external_id = %item.external_id, %mode, "missing item deleted");
            self.stats.deleted += 1;
        }
        Ok(())
    }
}

fn node_metadata(record: &IngestionRecord, source_key: &str) -> Metadata {
    let mut metadata: Metadata = record
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    metadata.insert(
        "source".into(),
        json!({
            "key": source_key,
            "externalId": record.external_id,
            "url": record.url,
            "updatedAt": record.updated_at.map(|at| at.to_rfc3339()),
        }),
    );
    metadata
}

fn new_node(record: &IngestionRecord, slug: String, source_key: &str) -> NewNode {
    let mut node = NewNode::new(slug, record.title.clone())
        .with_content(record.content.clone())
        .with_type(record.node_type.clone())
        .with_domain(record.domain.clone());
    node.metadata = node_metadata(record, source_key);
    node
}

fn node_update(record: &IngestionRecord, source_key: &str) -> NodeUpdate {
    NodeUpdate {
        label: Some(record.title.clone()),
        content: Some(record.content.clone()),
        metadata: Some(node_metadata(record, source_key)),
        domain: Some(record.domain.clone()),
        node_type: Some(record.node_type.clone()),
    }
}
