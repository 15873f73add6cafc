//! Local directory backend
//!
//! Layout under the root directory:
//!
//! ```text
//! pvs/<uuid>.json         current PVs
//! archive/<uuid>.json     archived PVs
//! snapshots/<uuid>.json   snapshots
//! tags.json               tag definition
//! meta_pvs.json           meta PV list
//! ```
//!
//! Every document is written to a temp file in the same directory and then
//! renamed over the target, so readers never see a partial file. Writers are
//! serialized by an async mutex shared by every backend in the process that
//! is open on the same root; multi-file writes undo what they already wrote
//! when a later file fails.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use pvsnap_model::{Entry, NewPv, Pv, PvUpdate, Snapshot, TagDef, TagGroupId, TagId};

use crate::catalog::Catalog;
use crate::error::{BackendError, Result};
use crate::search::SearchTerm;
use crate::traits::{Backend, SnapshotFilter};

const PVS_DIR: &str = "pvs";
const ARCHIVE_DIR: &str = "archive";
const SNAPSHOTS_DIR: &str = "snapshots";
const TAGS_FILE: &str = "tags.json";
const META_PVS_FILE: &str = "meta_pvs.json";

type WriteLock = Arc<Mutex<()>>;

// One writer lock per canonical root
static WRITE_LOCKS: OnceLock<parking_lot::Mutex<HashMap<PathBuf, WriteLock>>> = OnceLock::new();

fn write_lock_for(root: &Path) -> WriteLock {
    let key = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    WRITE_LOCKS
        .get_or_init(Default::default)
        .lock()
        .entry(key)
        .or_default()
        .clone()
}

/// File-level operations on the directory layout
#[derive(Debug)]
struct Layout {
    root: PathBuf,
}

impl Layout {
    fn pvs_dir(&self) -> PathBuf {
        self.root.join(PVS_DIR)
    }

    fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    fn pv_path(&self, id: Uuid) -> PathBuf {
        self.pvs_dir().join(format!("{}.json", id))
    }

    fn archive_path(&self, id: Uuid) -> PathBuf {
        self.archive_dir().join(format!("{}.json", id))
    }

    fn snapshot_path(&self, id: Uuid) -> PathBuf {
        self.snapshots_dir().join(format!("{}.json", id))
    }

    fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.pvs_dir(), self.archive_dir(), self.snapshots_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            BackendError::Serialization(format!("{}: {}", path.display(), e))
        })
    }

    fn read_optional<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
        if path.exists() {
            Self::read_json(path)
        } else {
            Ok(T::default())
        }
    }

    fn read_dir_docs<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
        let mut docs = Vec::new();
        if !dir.exists() {
            return Ok(docs);
        }
        for item in fs::read_dir(dir)? {
            let path = item?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            docs.push(Self::read_json(&path)?);
        }
        Ok(docs)
    }

    fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the whole catalog; PVs and snapshots are ordered by creation time
    fn load(&self) -> Result<Catalog> {
        let mut pvs: Vec<Pv> = Self::read_dir_docs(&self.pvs_dir())?;
        let mut archived: Vec<Pv> = Self::read_dir_docs(&self.archive_dir())?;
        let mut snapshots: Vec<Snapshot> = Self::read_dir_docs(&self.snapshots_dir())?;
        pvs.sort_by(|a, b| (a.creation_time, a.uuid).cmp(&(b.creation_time, b.uuid)));
        archived.sort_by(|a, b| (a.creation_time, a.uuid).cmp(&(b.creation_time, b.uuid)));
        snapshots.sort_by(|a, b| (a.creation_time, a.uuid).cmp(&(b.creation_time, b.uuid)));

        Ok(Catalog {
            pvs,
            archived,
            snapshots,
            tags: Self::read_optional(&self.root.join(TAGS_FILE))?,
            meta_pvs: Self::read_optional(&self.root.join(META_PVS_FILE))?,
        })
    }

    /// Write several PV documents; on failure remove the ones already written
    fn write_pvs(&self, pvs: &[Pv]) -> Result<()> {
        let mut written: Vec<PathBuf> = Vec::with_capacity(pvs.len());
        for pv in pvs {
            let path = self.pv_path(pv.uuid);
            if let Err(e) = self.write_json(&path, pv) {
                warn!("Writing {} failed, rolling back {} PVs", path.display(), written.len());
                for done in &written {
                    if let Err(undo) = Self::remove(done) {
                        warn!("Rollback of {} failed: {}", done.display(), undo);
                    }
                }
                return Err(e);
            }
            written.push(path);
        }
        Ok(())
    }

    fn write_tags(&self, tags: &TagDef) -> Result<()> {
        self.write_json(&self.root.join(TAGS_FILE), tags)
    }

    fn write_entry(&self, entry: &Entry, catalog: &Catalog) -> Result<()> {
        match entry {
            Entry::Pv(pv) if catalog.archived.iter().any(|p| p.uuid == pv.uuid) => {
                self.write_json(&self.archive_path(pv.uuid), pv)
            },
            Entry::Pv(pv) => self.write_json(&self.pv_path(pv.uuid), pv),
            Entry::Snapshot(snapshot) => {
                self.write_json(&self.snapshot_path(snapshot.uuid), snapshot)
            },
        }
    }
}

/// Backend storing JSON documents in a local directory
pub struct DirectoryBackend {
    layout: Arc<Layout>,
    write_lock: WriteLock,
}

impl DirectoryBackend {
    /// Open (creating if needed) the directory store at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Layout { root: root.into() };
        layout.ensure_dirs()?;
        debug!("Directory backend at {}", layout.root.display());
        let write_lock = write_lock_for(&layout.root);
        Ok(Self {
            layout: Arc::new(layout),
            write_lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    /// Run blocking file work off the async runtime
    async fn blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Layout) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || f(&layout))
            .await
            .map_err(|e| BackendError::Io(std::io::Error::other(e.to_string())))?
    }

    /// Load, mutate and persist under the writer lock
    async fn write<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Layout, &mut Catalog) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        self.blocking(move |layout| {
            let mut catalog = layout.load()?;
            f(layout, &mut catalog)
        })
        .await
    }

    async fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(Catalog) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.blocking(move |layout| f(layout.load()?)).await
    }
}

#[async_trait]
impl Backend for DirectoryBackend {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn get_entry(&self, uuid: Uuid) -> Result<Entry> {
        self.read(move |catalog| catalog.get_entry(uuid)).await
    }

    async fn save_entry(&self, entry: Entry) -> Result<()> {
        self.write(move |layout, catalog| {
            catalog.save_entry(entry.clone())?;
            layout.write_entry(&entry, catalog)
        })
        .await
    }

    async fn update_entry(&self, entry: Entry) -> Result<()> {
        self.write(move |layout, catalog| {
            catalog.update_entry(entry.clone())?;
            layout.write_entry(&entry, catalog)
        })
        .await
    }

    async fn delete_entry(&self, entry: &Entry) -> Result<()> {
        let entry = entry.clone();
        self.write(move |layout, catalog| {
            catalog.delete_entry(&entry)?;
            let id = entry.uuid();
            match entry {
                Entry::Pv(_) => {
                    Layout::remove(&layout.pv_path(id))?;
                    Layout::remove(&layout.archive_path(id))
                },
                Entry::Snapshot(_) => Layout::remove(&layout.snapshot_path(id)),
            }
        })
        .await
    }

    async fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>> {
        let terms = terms.to_vec();
        self.read(move |catalog| catalog.search(&terms)).await
    }

    async fn get_tags(&self) -> Result<TagDef> {
        self.blocking(|layout| Layout::read_optional(&layout.root.join(TAGS_FILE)))
            .await
    }

    async fn set_tags(&self, tags: TagDef) -> Result<()> {
        self.write(move |layout, _| layout.write_tags(&tags)).await
    }

    async fn add_tag_group(&self, name: &str, description: &str) -> Result<TagGroupId> {
        let (name, description) = (name.to_string(), description.to_string());
        self.write(move |layout, catalog| {
            let id = catalog.add_tag_group(&name, &description)?;
            layout.write_tags(&catalog.tags)?;
            Ok(id)
        })
        .await
    }

    async fn update_tag_group(
        &self,
        group: TagGroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let name = name.map(str::to_string);
        let description = description.map(str::to_string);
        self.write(move |layout, catalog| {
            catalog.update_tag_group(group, name.as_deref(), description.as_deref())?;
            layout.write_tags(&catalog.tags)
        })
        .await
    }

    async fn delete_tag_group(&self, group: TagGroupId) -> Result<()> {
        self.write(move |layout, catalog| {
            catalog.delete_tag_group(group)?;
            layout.write_tags(&catalog.tags)
        })
        .await
    }

    async fn add_tag_to_group(
        &self,
        group: TagGroupId,
        name: &str,
        _description: &str,
    ) -> Result<TagId> {
        let name = name.to_string();
        self.write(move |layout, catalog| {
            let id = catalog.add_tag_to_group(group, &name)?;
            layout.write_tags(&catalog.tags)?;
            Ok(id)
        })
        .await
    }

    async fn update_tag_in_group(
        &self,
        group: TagGroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        let name = name.map(str::to_string);
        self.write(move |layout, catalog| {
            catalog.update_tag_in_group(group, tag, name.as_deref())?;
            layout.write_tags(&catalog.tags)
        })
        .await
    }

    async fn delete_tag_from_group(&self, group: TagGroupId, tag: TagId) -> Result<()> {
        self.write(move |layout, catalog| {
            catalog.delete_tag_from_group(group, tag)?;
            layout.write_tags(&catalog.tags)
        })
        .await
    }

    async fn add_pv(&self, pv: NewPv) -> Result<Pv> {
        self.write(move |layout, catalog| {
            let pv = catalog.add_pv(pv)?;
            layout.write_pvs(std::slice::from_ref(&pv))?;
            Ok(pv)
        })
        .await
    }

    async fn add_multiple_pvs(&self, pvs: Vec<Pv>) -> Result<Vec<Pv>> {
        self.write(move |layout, catalog| {
            let added = catalog.add_multiple_pvs(pvs)?;
            layout.write_pvs(&added)?;
            debug!("Stored {} PVs", added.len());
            Ok(added)
        })
        .await
    }

    async fn update_pv(&self, id: Uuid, update: PvUpdate) -> Result<Pv> {
        self.write(move |layout, catalog| {
            let pv = catalog.update_pv(id, &update)?;
            layout.write_json(&layout.pv_path(id), &pv)?;
            Ok(pv)
        })
        .await
    }

    async fn archive_pv(&self, id: Uuid) -> Result<()> {
        self.write(move |layout, catalog| {
            let pv = catalog.archive_pv(id)?;
            let archived = layout.archive_path(id);
            layout.write_json(&archived, &pv)?;
            if let Err(e) = Layout::remove(&layout.pv_path(id)) {
                // keep the PV current rather than present in both places
                Layout::remove(&archived)?;
                return Err(e);
            }
            Ok(())
        })
        .await
    }

    async fn get_all_pvs(&self) -> Result<Vec<Pv>> {
        self.read(|catalog| Ok(catalog.pvs)).await
    }

    async fn add_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.write(move |layout, catalog| {
            catalog.add_snapshot(snapshot.clone())?;
            layout.write_json(&layout.snapshot_path(snapshot.uuid), &snapshot)
        })
        .await
    }

    async fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        let filter = filter.clone();
        self.read(move |catalog| Ok(catalog.get_snapshots(&filter)))
            .await
    }

    async fn delete_snapshot(&self, id: Uuid) -> Result<()> {
        self.write(move |layout, catalog| {
            catalog.delete_snapshot(id)?;
            Layout::remove(&layout.snapshot_path(id))
        })
        .await
    }

    async fn get_meta_pvs(&self) -> Result<Vec<Pv>> {
        self.blocking(|layout| Layout::read_optional(&layout.root.join(META_PVS_FILE)))
            .await
    }

    async fn set_meta_pvs(&self, pvs: Vec<Pv>) -> Result<()> {
        self.write(move |layout, _| layout.write_json(&layout.root.join(META_PVS_FILE), &pvs))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_failed_batch_rolls_back_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout {
            root: dir.path().to_path_buf(),
        };
        layout.ensure_dirs().unwrap();

        let pvs = vec![Pv::new("SP:1", ""), Pv::new("SP:2", ""), Pv::new("SP:3", "")];
        // a directory where the second document goes makes its rename fail
        fs::create_dir(layout.pv_path(pvs[1].uuid)).unwrap();

        assert!(layout.write_pvs(&pvs).is_err());
        assert!(!layout.pv_path(pvs[0].uuid).exists());
        assert!(!layout.pv_path(pvs[2].uuid).exists());
    }

    #[test]
    fn test_write_lock_shared_per_root() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let a = DirectoryBackend::new(dir.path()).unwrap();
        let b = DirectoryBackend::new(dir.path().join(".")).unwrap();
        let c = DirectoryBackend::new(other.path()).unwrap();
        assert!(Arc::ptr_eq(&a.write_lock, &b.write_lock));
        assert!(!Arc::ptr_eq(&a.write_lock, &c.write_lock));
    }
}
