//! In-memory backend
//!
//! Keeps the whole catalog behind a `parking_lot::RwLock`. Used by tests and
//! for the `test` configuration type.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use pvsnap_model::{Entry, NewPv, Pv, PvUpdate, Snapshot, TagDef, TagGroupId, TagId};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::search::SearchTerm;
use crate::traits::{Backend, SnapshotFilter};

/// In-memory backend with concurrent access support
pub struct MemoryBackend {
    catalog: RwLock<Catalog>,
}

/// Entry counts held by a `MemoryBackend`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub pvs: usize,
    pub archived: usize,
    pub snapshots: usize,
    pub tag_groups: usize,
    pub meta_pvs: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
        }
    }

    /// Backend pre-loaded with fixture data
    pub fn with_data(
        pvs: Vec<Pv>,
        snapshots: Vec<Snapshot>,
        tags: TagDef,
        meta_pvs: Vec<Pv>,
    ) -> Self {
        Self {
            catalog: RwLock::new(Catalog {
                pvs,
                archived: Vec::new(),
                snapshots,
                tags,
                meta_pvs,
            }),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        *self.catalog.write() = Catalog::default();
    }

    pub fn stats(&self) -> MemoryStats {
        let catalog = self.catalog.read();
        MemoryStats {
            pvs: catalog.pvs.len(),
            archived: catalog.archived.len(),
            snapshots: catalog.snapshots.len(),
            tag_groups: catalog.tags.len(),
            meta_pvs: catalog.meta_pvs.len(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn get_entry(&self, uuid: Uuid) -> Result<Entry> {
        self.catalog.read().get_entry(uuid)
    }

    async fn save_entry(&self, entry: Entry) -> Result<()> {
        self.catalog.write().save_entry(entry)
    }

    async fn update_entry(&self, entry: Entry) -> Result<()> {
        self.catalog.write().update_entry(entry)
    }

    async fn delete_entry(&self, entry: &Entry) -> Result<()> {
        self.catalog.write().delete_entry(entry)
    }

    async fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>> {
        self.catalog.read().search(terms)
    }

    async fn get_tags(&self) -> Result<TagDef> {
        Ok(self.catalog.read().tags.clone())
    }

    async fn set_tags(&self, tags: TagDef) -> Result<()> {
        self.catalog.write().tags = tags;
        Ok(())
    }

    async fn add_tag_group(&self, name: &str, description: &str) -> Result<TagGroupId> {
        self.catalog.write().add_tag_group(name, description)
    }

    async fn update_tag_group(
        &self,
        group: TagGroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.catalog.write().update_tag_group(group, name, description)
    }

    async fn delete_tag_group(&self, group: TagGroupId) -> Result<()> {
        self.catalog.write().delete_tag_group(group)
    }

    async fn add_tag_to_group(
        &self,
        group: TagGroupId,
        name: &str,
        _description: &str,
    ) -> Result<TagId> {
        self.catalog.write().add_tag_to_group(group, name)
    }

    async fn update_tag_in_group(
        &self,
        group: TagGroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        self.catalog.write().update_tag_in_group(group, tag, name)
    }

    async fn delete_tag_from_group(&self, group: TagGroupId, tag: TagId) -> Result<()> {
        self.catalog.write().delete_tag_from_group(group, tag)
    }

    async fn add_pv(&self, pv: NewPv) -> Result<Pv> {
        self.catalog.write().add_pv(pv)
    }

    async fn add_multiple_pvs(&self, pvs: Vec<Pv>) -> Result<Vec<Pv>> {
        self.catalog.write().add_multiple_pvs(pvs)
    }

    async fn update_pv(&self, id: Uuid, update: PvUpdate) -> Result<Pv> {
        self.catalog.write().update_pv(id, &update)
    }

    async fn archive_pv(&self, id: Uuid) -> Result<()> {
        self.catalog.write().archive_pv(id).map(|_| ())
    }

    async fn get_all_pvs(&self) -> Result<Vec<Pv>> {
        Ok(self.catalog.read().pvs.clone())
    }

    async fn add_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.catalog.write().add_snapshot(snapshot)
    }

    async fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        Ok(self.catalog.read().get_snapshots(filter))
    }

    async fn delete_snapshot(&self, id: Uuid) -> Result<()> {
        self.catalog.write().delete_snapshot(id).map(|_| ())
    }

    async fn get_meta_pvs(&self) -> Result<Vec<Pv>> {
        Ok(self.catalog.read().meta_pvs.clone())
    }

    async fn set_meta_pvs(&self, pvs: Vec<Pv>) -> Result<()> {
        self.catalog.write().meta_pvs = pvs;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::search::SearchOp;
    use pvsnap_model::EntryKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_save_and_get_entry() {
        let backend = MemoryBackend::new();
        let pv = Pv::new("SP1", "RB1");
        backend.save_entry(Entry::from(pv.clone())).await.unwrap();

        let entry = backend.get_entry(pv.uuid).await.unwrap();
        assert_eq!(entry, Entry::Pv(pv.clone()));

        let err = backend.save_entry(Entry::from(pv)).await.unwrap_err();
        assert!(matches!(err, BackendError::EntryExists(_)));
    }

    #[tokio::test]
    async fn test_update_missing_entry() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_entry(Entry::from(Snapshot::new("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::EntryNotFound(_)));
    }

    #[tokio::test]
    async fn test_search_by_kind() {
        let backend = MemoryBackend::with_data(
            vec![Pv::new("SP1", ""), Pv::new("SP2", "")],
            vec![Snapshot::new("s")],
            TagDef::new(),
            Vec::new(),
        );
        let pvs = backend
            .search(&[SearchTerm::entry_type(EntryKind::Pv)])
            .await
            .unwrap();
        assert_eq!(pvs.len(), 2);

        let snaps = backend
            .search(&[SearchTerm::new("title", SearchOp::Eq, "s")])
            .await
            .unwrap();
        assert_eq!(snaps.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let backend = MemoryBackend::new();
        backend.add_pv(NewPv::new("SP1", "")).await.unwrap();
        backend.add_tag_group("Area", "").await.unwrap();
        let stats = backend.stats();
        assert_eq!(stats.pvs, 1);
        assert_eq!(stats.tag_groups, 1);

        backend.clear();
        assert_eq!(backend.stats().pvs, 0);
    }

    #[tokio::test]
    async fn test_concurrent_adds() {
        let backend = Arc::new(MemoryBackend::new());
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..20 {
            let backend = backend.clone();
            tasks.spawn(async move {
                backend
                    .add_pv(NewPv::new(format!("SP:{}", i), format!("RB:{}", i)))
                    .await
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap().unwrap();
        }
        assert_eq!(backend.get_all_pvs().await.unwrap().len(), 20);
    }
}
