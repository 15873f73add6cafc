//! Trait definitions for the storage abstraction

use async_trait::async_trait;
use uuid::Uuid;

use pvsnap_model::{
    tags, Entry, NewPv, Pv, PvUpdate, Snapshot, TagDef, TagGroupId, TagId, TagSet,
};

use crate::error::Result;
use crate::search::SearchTerm;

/// Filters for `Backend::get_snapshots`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotFilter {
    /// One specific snapshot; other filters are ignored when set
    pub uuid: Option<Uuid>,
    /// Substring of the title
    pub title: String,
    /// Snapshot must hold at least one PV carrying all of these tags
    pub tags: TagSet,
}

impl SnapshotFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_uuid(uuid: Uuid) -> Self {
        Self {
            uuid: Some(uuid),
            ..Self::default()
        }
    }

    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Local evaluation, used by the backends that hold the data themselves
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        if let Some(uuid) = self.uuid {
            return snapshot.uuid == uuid;
        }
        if !snapshot.title.contains(&self.title) {
            return false;
        }
        if self.tags.values().all(|ids| ids.is_empty()) {
            return true;
        }
        snapshot
            .pvs
            .iter()
            .any(|pv| tags::is_subset(&self.tags, &pv.tags))
    }
}

/// Unified storage trait
///
/// Holds the current PV configuration, archived PVs, snapshots, the tag
/// definition and the meta PV list.
///
/// Implementations:
/// - `MemoryBackend`: in-process, for tests and the `test` config type
/// - `DirectoryBackend`: JSON documents in a local directory
/// - `HttpBackend`: the REST configuration service (`mongo` config type)
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Configuration type name of this backend
    fn name(&self) -> &'static str;

    // ========== Entries ==========

    /// Entry with `uuid`: a current PV, an archived PV or a snapshot
    async fn get_entry(&self, uuid: Uuid) -> Result<Entry>;

    /// Store a new entry; fails with `EntryExists` if the uuid is taken
    async fn save_entry(&self, entry: Entry) -> Result<()>;

    /// Replace a stored entry; fails with `EntryNotFound`
    async fn update_entry(&self, entry: Entry) -> Result<()>;

    /// Remove `entry`; fails with `Conflict` if the stored copy differs
    async fn delete_entry(&self, entry: &Entry) -> Result<()>;

    /// Entries (current PVs and snapshots) matching every term
    async fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>>;

    // ========== Tags ==========

    async fn get_tags(&self) -> Result<TagDef>;

    async fn set_tags(&self, tags: TagDef) -> Result<()>;

    /// Create a tag group, returning its id
    async fn add_tag_group(&self, name: &str, description: &str) -> Result<TagGroupId>;

    /// Rename and/or re-describe a tag group; `None` keeps the current value
    async fn update_tag_group(
        &self,
        group: TagGroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()>;

    async fn delete_tag_group(&self, group: TagGroupId) -> Result<()>;

    /// Add a tag to a group, returning its id
    async fn add_tag_to_group(
        &self,
        group: TagGroupId,
        name: &str,
        description: &str,
    ) -> Result<TagId>;

    async fn update_tag_in_group(
        &self,
        group: TagGroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()>;

    async fn delete_tag_from_group(&self, group: TagGroupId, tag: TagId) -> Result<()>;

    // ========== PVs ==========

    async fn add_pv(&self, pv: NewPv) -> Result<Pv>;

    /// Add a batch of PVs; either all are stored or none
    async fn add_multiple_pvs(&self, pvs: Vec<Pv>) -> Result<Vec<Pv>>;

    /// Change the supplied fields of a current PV
    async fn update_pv(&self, id: Uuid, update: PvUpdate) -> Result<Pv>;

    /// Remove a PV from the current configuration; snapshots keep their copy
    async fn archive_pv(&self, id: Uuid) -> Result<()>;

    /// Current (non-archived) PVs in insertion order
    async fn get_all_pvs(&self) -> Result<Vec<Pv>>;

    // ========== Snapshots ==========

    async fn add_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    async fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>>;

    async fn delete_snapshot(&self, id: Uuid) -> Result<()>;

    // ========== Meta PVs ==========

    /// PVs recorded alongside every snapshot
    async fn get_meta_pvs(&self) -> Result<Vec<Pv>>;

    async fn set_meta_pvs(&self, pvs: Vec<Pv>) -> Result<()>;
}
