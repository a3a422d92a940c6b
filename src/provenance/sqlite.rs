//! SQLite provenance backend

use super::traits::{ProvenanceError, ProvenanceResult, ProvenanceStore};
use super::types::{SourceId, SourceIdentity, SourceItem};
use crate::graph::NodeId;
use crate::identity::ContentHash;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const ITEM_COLUMNS: &str =
    "source_id, external_id, node_id, content_hash, last_seen_at, deleted_at, revision";

/// SQLite-backed provenance store
///
/// Single database file with a `sources` table and a `source_items` table
/// keyed by `(source_id, external_id)`. Thread-safe via internal mutex on
/// the connection; every read-modify-write runs under that mutex.
pub struct SqliteProvenanceStore {
    conn: Mutex<Connection>,
}

impl SqliteProvenanceStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> ProvenanceResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ProvenanceError::Unavailable(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing)
    pub fn open_in_memory() -> ProvenanceResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> ProvenanceResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                source_type TEXT NOT NULL,
                name TEXT NOT NULL,
                config_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (source_type, name)
            );

            CREATE TABLE IF NOT EXISTS source_items (
                source_id TEXT NOT NULL,
                external_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                last_seen_at TEXT NOT NULL,
                deleted_at TEXT,
                revision INTEGER NOT NULL,
                PRIMARY KEY (source_id, external_id),
                FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_source_items_node
                ON source_items(node_id);

            PRAGMA foreign_keys = ON;

            -- Readers don't block the single writer
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> ProvenanceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ProvenanceError::Unavailable("connection lock poisoned".into()))
    }

    fn parse_ts(raw: &str) -> ProvenanceResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ProvenanceError::DateParse(e.to_string()))
    }

    /// Raw columns in `ITEM_COLUMNS` order; timestamps are parsed afterwards
    /// so date errors surface as `DateParse` rather than a SQLite error.
    #[allow(clippy::type_complexity)]
    fn read_row(
        row: &Row<'_>,
    ) -> rusqlite::Result<(String, String, String, String, String, Option<String>, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    #[allow(clippy::type_complexity)]
    fn row_to_item(
        (source_id, external_id, node_id, hash, last_seen, deleted, revision): (
            String,
            String,
            String,
            String,
            String,
            Option<String>,
            i64,
        ),
    ) -> ProvenanceResult<SourceItem> {
        Ok(SourceItem {
            source_id: SourceId::from_string(source_id),
            external_id,
            node_id: NodeId::from_string(node_id),
            content_hash: ContentHash::from_hex(hash),
            last_seen_at: Self::parse_ts(&last_seen)?,
            deleted_at: deleted.as_deref().map(Self::parse_ts).transpose()?,
            revision: revision as u64,
        })
    }

    /// Every known source with its stored identity
    pub fn list_sources(&self) -> ProvenanceResult<Vec<(SourceId, SourceIdentity)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, source_type, name, config_json FROM sources ORDER BY source_type, name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut sources = Vec::new();
        for row in rows {
            let (id, source_type, name, config_json) = row?;
            let identity = SourceIdentity::new(source_type, name)
                .with_config(serde_json::from_str(&config_json)?);
            sources.push((SourceId::from_string(id), identity));
        }
        Ok(sources)
    }
}

impl ProvenanceStore for SqliteProvenanceStore {
    fn resolve_source_id(&self, identity: &SourceIdentity) -> ProvenanceResult<SourceId> {
        let conn = self.lock()?;
        let config_json = serde_json::to_string(&identity.config)?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM sources WHERE source_type = ?1 AND name = ?2",
                params![identity.source_type, identity.name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            conn.execute(
                "UPDATE sources SET config_json = ?1 WHERE id = ?2",
                params![config_json, id],
            )?;
            return Ok(SourceId::from_string(id));
        }

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO sources (id, source_type, name, config_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                identity.source_type,
                identity.name,
                config_json,
                Utc::now().to_rfc3339()
            ],
        )?;
        tracing::debug!(source = %identity.source_key(), %id, "registered source");
        Ok(SourceId::from_string(id))
    }

    fn find_source_id(&self, identity: &SourceIdentity) -> ProvenanceResult<Option<SourceId>> {
        let conn = self.lock()?;
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM sources WHERE source_type = ?1 AND name = ?2",
                params![identity.source_type, identity.name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(SourceId::from_string))
    }

    fn find_source_item(
        &self,
        source_id: &SourceId,
        external_id: &str,
    ) -> ProvenanceResult<Option<SourceItem>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM source_items WHERE source_id = ?1 AND external_id = ?2"
                ),
                params![source_id.as_str(), external_id],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::row_to_item).transpose()
    }

    fn upsert_source_item(&self, item: &SourceItem) -> ProvenanceResult<SourceItem> {
        let conn = self.lock()?;
        let conflict = || ProvenanceError::Conflict {
            source_id: item.source_id.clone(),
            external_id: item.external_id.clone(),
        };
        let next_revision = item.revision + 1;
        let deleted_at = item.deleted_at.map(|at| at.to_rfc3339());

        if item.revision == 0 {
            let inserted = conn.execute(
                &format!("INSERT INTO source_items ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    item.source_id.as_str(),
                    item.external_id,
                    item.node_id.as_str(),
                    item.content_hash.as_str(),
                    item.last_seen_at.to_rfc3339(),
                    deleted_at,
                    next_revision as i64,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    // Either the key already exists or the source is unknown
                    let exists: bool = conn.query_row(
                        "SELECT COUNT(*) > 0 FROM source_items WHERE source_id = ?1 AND external_id = ?2",
                        params![item.source_id.as_str(), item.external_id],
                        |row| row.get(0),
                    )?;
                    if exists {
                        return Err(conflict());
                    }
                    return Err(ProvenanceError::Unavailable(format!(
                        "unknown source id {}",
                        item.source_id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            let changed = conn.execute(
                r#"
                UPDATE source_items
                SET node_id = ?1, content_hash = ?2, last_seen_at = ?3, deleted_at = ?4, revision = ?5
                WHERE source_id = ?6 AND external_id = ?7 AND revision = ?8
                "#,
                params![
                    item.node_id.as_str(),
                    item.content_hash.as_str(),
                    item.last_seen_at.to_rfc3339(),
                    deleted_at,
                    next_revision as i64,
                    item.source_id.as_str(),
                    item.external_id,
                    item.revision as i64,
                ],
            )?;
            if changed == 0 {
                return Err(conflict());
            }
        }

        let mut stored = item.clone();
        stored.revision = next_revision;
        Ok(stored)
    }

    fn list_items_for_source(
        &self,
        source_id: &SourceId,
        include_deleted: bool,
    ) -> ProvenanceResult<Vec<SourceItem>> {
        let conn = self.lock()?;
        let sql = if include_deleted {
            format!("SELECT {ITEM_COLUMNS} FROM source_items WHERE source_id = ?1 ORDER BY external_id")
        } else {
            format!(
                "SELECT {ITEM_COLUMNS} FROM source_items WHERE source_id = ?1 AND deleted_at IS NULL ORDER BY external_id"
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![source_id.as_str()], Self::read_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(Self::row_to_item(row?)?);
        }
        Ok(items)
    }

    fn mark_deleted(
        &self,
        source_id: &SourceId,
        external_id: &str,
        at: DateTime<Utc>,
    ) -> ProvenanceResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            UPDATE source_items SET deleted_at = ?1, revision = revision + 1
            WHERE source_id = ?2 AND external_id = ?3 AND deleted_at IS NULL
            "#,
            params![at.to_rfc3339(), source_id.as_str(), external_id],
        )?;
        Ok(())
    }

    fn delete_item(&self, source_id: &SourceId, external_id: &str) -> ProvenanceResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM source_items WHERE source_id = ?1 AND external_id = ?2",
            params![source_id.as_str(), external_id],
        )?;
        Ok(removed > 0)
    }
}
