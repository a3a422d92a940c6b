//! File-backed graph store
//!
//! The in-memory [`GraphIndex`] is authoritative while the process runs; it
//! is mirrored to a single JSON snapshot file. Writes go to a `.tmp`
//! sibling that is synced and renamed over the primary, and the previous
//! primary is copied to a `.bak` sibling first when backups are enabled.
//!
//! Loading prefers the primary file. A primary that is not valid JSON falls
//! back to the backup; any JSON document whose `version` is not exactly
//! [`SNAPSHOT_VERSION`] is refused, whatever the type of that field.

use super::index::GraphIndex;
use super::traits::{EdgeFilter, GraphStore, NodeFilter, StorageError, StorageResult};
use crate::graph::{
    Edge, EdgeId, EdgeUpdate, GraphSnapshot, NewEdge, NewNode, Node, NodeId, NodeUpdate,
    SNAPSHOT_VERSION,
};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Persistence knobs for [`FileGraphStore`]
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    /// Minimum spacing between automatic writes. Zero disables automatic
    /// writes entirely; only `flush()` persists.
    ///
    /// There is no trailing write: mutations that land inside the interval
    /// stay in memory until the next mutation after it or an explicit
    /// `flush()`. Call `flush()` whenever durability matters.
    pub persist_interval: Duration,
    /// Keep the previous snapshot as `<path>.bak`
    pub backups: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            persist_interval: Duration::ZERO,
            backups: true,
        }
    }
}

impl FileStoreOptions {
    pub fn with_persist_interval_ms(mut self, ms: u64) -> Self {
        self.persist_interval = Duration::from_millis(ms);
        self
    }

    pub fn with_backups(mut self, backups: bool) -> Self {
        self.backups = backups;
        self
    }
}

/// Which file a store was populated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Empty,
}

#[derive(Debug)]
struct PersistState {
    dirty: bool,
    last_persist: Instant,
    /// The primary file holds a snapshot worth backing up
    primary_valid: bool,
}

enum ParseFailure {
    Malformed(String),
    Unsupported(String),
}

/// JSON-snapshot graph store with atomic replace and `.bak` recovery
#[derive(Debug)]
pub struct FileGraphStore {
    path: PathBuf,
    options: FileStoreOptions,
    loaded_from: LoadSource,
    index: RwLock<GraphIndex>,
    persist: Mutex<PersistState>,
}

impl FileGraphStore {
    /// Open or create a store at the given path with default options
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with(path, FileStoreOptions::default())
    }

    /// Open or create a store at the given path
    pub fn open_with(path: impl AsRef<Path>, options: FileStoreOptions) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (snapshot, loaded_from) = load_snapshot(&path)?;
        let index = match snapshot {
            Some(snapshot) => GraphIndex::from_snapshot(snapshot)?,
            None => GraphIndex::new(),
        };

        tracing::info!(
            path = %path.display(),
            source = ?loaded_from,
            nodes = index.node_count(),
            edges = index.edge_count(),
            "graph store opened"
        );

        let primary_valid = loaded_from == LoadSource::Primary;
        Ok(Self {
            path,
            options,
            loaded_from,
            index: RwLock::new(index),
            persist: Mutex::new(PersistState {
                dirty: !primary_valid,
                last_persist: Instant::now(),
                primary_valid,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.bak`
    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, ".bak")
    }

    pub fn loaded_from(&self) -> LoadSource {
        self.loaded_from
    }

    /// The snapshot's free-form settings object
    pub fn settings(&self) -> StorageResult<Map<String, Value>> {
        Ok(self.read()?.settings().clone())
    }

    pub fn set_setting(&self, key: impl Into<String>, value: Value) -> StorageResult<()> {
        self.write()?.set_setting(key.into(), value);
        self.after_mutation()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, GraphIndex>> {
        self.index
            .read()
            .map_err(|_| StorageError::Unavailable("graph index lock poisoned".into()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, GraphIndex>> {
        self.index
            .write()
            .map_err(|_| StorageError::Unavailable("graph index lock poisoned".into()))
    }

    fn lock_persist(&self) -> StorageResult<MutexGuard<'_, PersistState>> {
        self.persist
            .lock()
            .map_err(|_| StorageError::Unavailable("persist lock poisoned".into()))
    }

    /// Mark dirty and write through if the debounce interval has elapsed.
    fn after_mutation(&self) -> StorageResult<()> {
        let mut state = self.lock_persist()?;
        state.dirty = true;
        let interval = self.options.persist_interval;
        if !interval.is_zero() && state.last_persist.elapsed() >= interval {
            self.persist_locked(&mut state)?;
        }
        Ok(())
    }

    fn persist_locked(&self, state: &mut PersistState) -> StorageResult<()> {
        let snapshot = self.read()?.to_snapshot();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // A primary we could not parse must not clobber the good backup.
        if self.options.backups && state.primary_valid && self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }

        let tmp = sibling(&self.path, ".tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        state.dirty = false;
        state.primary_valid = true;
        state.last_persist = Instant::now();
        tracing::debug!(
            path = %self.path.display(),
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "snapshot written"
        );
        Ok(())
    }
}

impl GraphStore for FileGraphStore {
    fn create_nodes(&self, nodes: Vec<NewNode>) -> StorageResult<Vec<Node>> {
        let created = self.write()?.create_nodes(nodes)?;
        self.after_mutation()?;
        Ok(created)
    }

    fn get_node(&self, id: &NodeId) -> StorageResult<Option<Node>> {
        Ok(self.read()?.get_node(id))
    }

    fn get_node_by_slug(&self, slug: &str) -> StorageResult<Option<Node>> {
        Ok(self.read()?.get_node_by_slug(slug))
    }

    fn list_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>> {
        Ok(self.read()?.list_nodes(filter))
    }

    fn update_node(&self, id: &NodeId, update: NodeUpdate) -> StorageResult<Node> {
        let node = self.write()?.update_node(id, update)?;
        self.after_mutation()?;
        Ok(node)
    }

    fn delete_node(&self, id: &NodeId) -> StorageResult<bool> {
        let deleted = self.write()?.delete_node(id);
        if deleted {
            self.after_mutation()?;
        }
        Ok(deleted)
    }

    fn create_edges(&self, edges: Vec<NewEdge>) -> StorageResult<Vec<Edge>> {
        let created = self.write()?.create_edges(edges)?;
        self.after_mutation()?;
        Ok(created)
    }

    fn list_edges(&self, filter: &EdgeFilter) -> StorageResult<Vec<Edge>> {
        Ok(self.read()?.list_edges(filter))
    }

    fn update_edge(&self, id: &EdgeId, update: EdgeUpdate) -> StorageResult<Edge> {
        let edge = self.write()?.update_edge(id, update)?;
        self.after_mutation()?;
        Ok(edge)
    }

    fn delete_edge(&self, id: &EdgeId) -> StorageResult<bool> {
        let deleted = self.write()?.delete_edge(id);
        if deleted {
            self.after_mutation()?;
        }
        Ok(deleted)
    }

    fn flush(&self) -> StorageResult<()> {
        let mut state = self.lock_persist()?;
        if !state.dirty {
            return Ok(());
        }
        self.persist_locked(&mut state)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_snapshot(bytes: &[u8]) -> Result<GraphSnapshot, ParseFailure> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ParseFailure::Malformed(e.to_string()))?;
    match value.get("version") {
        Some(version) if version.as_u64() == Some(u64::from(SNAPSHOT_VERSION)) => {}
        Some(version) => return Err(ParseFailure::Unsupported(version.to_string())),
        None => return Err(ParseFailure::Unsupported("missing".into())),
    }
    serde_json::from_value(value).map_err(|e| ParseFailure::Malformed(e.to_string()))
}

fn unsupported(found: String) -> StorageError {
    StorageError::UnsupportedVersion {
        found,
        expected: SNAPSHOT_VERSION,
    }
}

fn load_snapshot(path: &Path) -> StorageResult<(Option<GraphSnapshot>, LoadSource)> {
    let primary = read_optional(path)?;
    if let Some(bytes) = &primary {
        match parse_snapshot(bytes) {
            Ok(snapshot) => return Ok((Some(snapshot), LoadSource::Primary)),
            Err(ParseFailure::Unsupported(found)) => return Err(unsupported(found)),
            Err(ParseFailure::Malformed(reason)) => {
                tracing::warn!(path = %path.display(), %reason, "primary snapshot unreadable");
            }
        }
    }

    let backup_path = sibling(path, ".bak");
    let Some(bytes) = read_optional(&backup_path)? else {
        if primary.is_some() {
            tracing::warn!(path = %path.display(), "no backup snapshot, starting empty");
        }
        return Ok((None, LoadSource::Empty));
    };

    match parse_snapshot(&bytes) {
        Ok(snapshot) => {
            tracing::warn!(path = %backup_path.display(), "recovered graph from backup snapshot");
            Ok((Some(snapshot), LoadSource::Backup))
        }
        Err(ParseFailure::Unsupported(found)) => Err(unsupported(found)),
        Err(ParseFailure::Malformed(reason)) => {
            tracing::warn!(path = %backup_path.display(), %reason, "backup snapshot unreadable, starting empty");
            Ok((None, LoadSource::Empty))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded(store: &FileGraphStore, n: usize) -> Vec<Node> {
        store
            .create_nodes(
                (0..n)
                    .map(|i| NewNode::new(format!("node-{i}"), format!("Node {i}")))
                    .collect(),
            )
            .unwrap()
    }

    #[test]
    fn new_store_starts_empty_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::open(dir.path().join("graph.json")).unwrap();
        assert_eq!(store.loaded_from(), LoadSource::Empty);
        assert!(store.list_nodes(&NodeFilter::new()).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn flush_writes_versioned_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let store = FileGraphStore::open(&path).unwrap();
        seeded(&store, 2);
        store.flush().unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], json!(SNAPSHOT_VERSION));
        assert_eq!(raw["nodes"].as_array().unwrap().len(), 2);
        assert!(raw["updatedAt"].is_string());
        assert!(raw["settings"].is_object());
        assert!(!sibling(&path, ".tmp").exists());
    }

    #[test]
    fn zero_interval_defers_writes_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let store = FileGraphStore::open(&path).unwrap();
        seeded(&store, 1);
        assert!(!path.exists());
        store.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn elapsed_interval_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let store = FileGraphStore::open_with(
            &path,
            FileStoreOptions::default().with_persist_interval_ms(1),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        seeded(&store, 1);
        assert!(path.exists());
    }

    #[test]
    fn second_flush_keeps_previous_snapshot_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let store = FileGraphStore::open(&path).unwrap();
        seeded(&store, 1);
        store.flush().unwrap();
        let first = fs::read(&path).unwrap();

        store.set_setting("theme", json!("dark")).unwrap();
        store.flush().unwrap();

        assert_eq!(fs::read(store.backup_path()).unwrap(), first);
    }

    #[test]
    fn backups_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let store =
            FileGraphStore::open_with(&path, FileStoreOptions::default().with_backups(false))
                .unwrap();
        seeded(&store, 1);
        store.flush().unwrap();
        store.set_setting("k", json!(1)).unwrap();
        store.flush().unwrap();
        assert!(!store.backup_path().exists());
    }

    #[test]
    fn settings_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        {
            let store = FileGraphStore::open(&path).unwrap();
            store.set_setting("layout", json!({"mode": "3d"})).unwrap();
            store.flush().unwrap();
        }
        let store = FileGraphStore::open(&path).unwrap();
        assert_eq!(store.settings().unwrap()["layout"], json!({"mode": "3d"}));
    }

    #[test]
    fn corrupt_primary_without_backup_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = FileGraphStore::open(&path).unwrap();
        assert_eq!(store.loaded_from(), LoadSource::Empty);
    }

    #[test]
    fn recovery_from_backup_does_not_overwrite_backup_with_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        {
            let store = FileGraphStore::open(&path).unwrap();
            seeded(&store, 1);
            store.flush().unwrap();
            store
                .create_nodes(vec![NewNode::new("later", "Later")])
                .unwrap();
            store.flush().unwrap();
        }
        let good_backup = fs::read(sibling(&path, ".bak")).unwrap();
        fs::write(&path, b"\x00\x01garbage").unwrap();

        let store = FileGraphStore::open(&path).unwrap();
        assert_eq!(store.loaded_from(), LoadSource::Backup);
        store.flush().unwrap();

        assert_eq!(fs::read(store.backup_path()).unwrap(), good_backup);
        let reopened = FileGraphStore::open(&path).unwrap();
        assert_eq!(reopened.loaded_from(), LoadSource::Primary);
        assert_eq!(reopened.list_nodes(&NodeFilter::new()).unwrap().len(), 1);
    }

    #[test]
    fn foreign_version_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let snapshot = json!({
            "version": 99,
            "updatedAt": "2024-01-01T00:00:00Z",
            "nodes": [],
            "edges": [],
            "settings": {}
        });
        fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let err = FileGraphStore::open(&path).unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedVersion { ref found, .. } if found == "99"
        ));
        assert!(err.to_string().contains("Unsupported snapshot version"));
    }

    #[test]
    fn non_integer_version_is_refused_and_file_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        {
            let store = FileGraphStore::open(&path).unwrap();
            seeded(&store, 1);
            store.flush().unwrap();
        }
        let mut raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        raw["version"] = json!("2");
        let tampered = serde_json::to_vec(&raw).unwrap();
        fs::write(&path, &tampered).unwrap();

        let err = FileGraphStore::open(&path).unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedVersion { ref found, .. } if found == "\"2\""
        ));
        assert_eq!(fs::read(&path).unwrap(), tampered);

        for version in [json!(2.5), json!(-1), json!(null)] {
            raw["version"] = version;
            fs::write(&path, serde_json::to_vec(&raw).unwrap()).unwrap();
            assert!(FileGraphStore::open(&path).is_err());
        }
    }

    #[test]
    fn missing_version_is_refused_even_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        {
            let store = FileGraphStore::open(&path).unwrap();
            seeded(&store, 1);
            store.flush().unwrap();
            store.set_setting("k", json!(1)).unwrap();
            store.flush().unwrap();
        }
        fs::write(&path, br#"{"nodes": [], "edges": []}"#).unwrap();

        let err = FileGraphStore::open(&path).unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedVersion { ref found, .. } if found == "missing"
        ));
    }
}
