//! In-process data set shared by the memory and directory backends
//!
//! All validation and bookkeeping lives here; the backends only decide
//! where the catalog is kept and how changes are persisted.

use std::collections::BTreeSet;

use uuid::Uuid;

use pvsnap_model::{
    tags, Entry, NewPv, Pv, PvUpdate, Snapshot, TagDef, TagGroup, TagGroupId, TagId,
};

use crate::error::{BackendError, Result};
use crate::search::{self, SearchTerm};
use crate::traits::SnapshotFilter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub pvs: Vec<Pv>,
    pub archived: Vec<Pv>,
    pub snapshots: Vec<Snapshot>,
    pub tags: TagDef,
    pub meta_pvs: Vec<Pv>,
}

impl Catalog {
    fn contains(&self, uuid: Uuid) -> bool {
        self.pvs.iter().any(|p| p.uuid == uuid)
            || self.archived.iter().any(|p| p.uuid == uuid)
            || self.snapshots.iter().any(|s| s.uuid == uuid)
    }

    /// Reject PVs that fail validation or reuse an address
    ///
    /// Addresses are compared against every current PV except `skip`, and
    /// across the new PVs themselves.
    pub fn check_new_pvs(&self, new: &[Pv], skip: Option<Uuid>) -> Result<()> {
        let mut taken: BTreeSet<&str> = self
            .pvs
            .iter()
            .filter(|p| Some(p.uuid) != skip)
            .flat_map(|p| p.addresses())
            .collect();

        for pv in new {
            pv.validate()?;
            for address in pv.addresses() {
                if !taken.insert(address) {
                    return Err(BackendError::validation(format!(
                        "address '{}' is already used by another PV",
                        address
                    )));
                }
            }
        }
        Ok(())
    }

    // ========== Entries ==========

    pub fn get_entry(&self, uuid: Uuid) -> Result<Entry> {
        self.pvs
            .iter()
            .chain(self.archived.iter())
            .find(|p| p.uuid == uuid)
            .map(|p| Entry::Pv(p.clone()))
            .or_else(|| {
                self.snapshots
                    .iter()
                    .find(|s| s.uuid == uuid)
                    .map(|s| Entry::Snapshot(s.clone()))
            })
            .ok_or(BackendError::EntryNotFound(uuid))
    }

    pub fn save_entry(&mut self, entry: Entry) -> Result<()> {
        if self.contains(entry.uuid()) {
            return Err(BackendError::EntryExists(entry.uuid()));
        }
        match entry {
            Entry::Pv(pv) => {
                self.check_new_pvs(std::slice::from_ref(&pv), None)?;
                self.pvs.push(pv);
            },
            Entry::Snapshot(snapshot) => {
                snapshot.pvs.iter().try_for_each(Pv::validate)?;
                self.snapshots.push(snapshot);
            },
        }
        Ok(())
    }

    pub fn update_entry(&mut self, entry: Entry) -> Result<()> {
        let uuid = entry.uuid();
        match entry {
            Entry::Pv(pv) => {
                if let Some(idx) = self.pvs.iter().position(|p| p.uuid == uuid) {
                    self.check_new_pvs(std::slice::from_ref(&pv), Some(uuid))?;
                    self.pvs[idx] = pv;
                } else if let Some(idx) = self.archived.iter().position(|p| p.uuid == uuid) {
                    pv.validate()?;
                    self.archived[idx] = pv;
                } else {
                    return Err(BackendError::EntryNotFound(uuid));
                }
            },
            Entry::Snapshot(snapshot) => {
                let idx = self
                    .snapshots
                    .iter()
                    .position(|s| s.uuid == uuid)
                    .ok_or(BackendError::EntryNotFound(uuid))?;
                self.snapshots[idx] = snapshot;
            },
        }
        Ok(())
    }

    pub fn delete_entry(&mut self, entry: &Entry) -> Result<()> {
        let stored = self.get_entry(entry.uuid())?;
        if &stored != entry {
            return Err(BackendError::Conflict(entry.uuid()));
        }
        let uuid = entry.uuid();
        self.pvs.retain(|p| p.uuid != uuid);
        self.archived.retain(|p| p.uuid != uuid);
        self.snapshots.retain(|s| s.uuid != uuid);
        Ok(())
    }

    pub fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>> {
        let entries = self
            .pvs
            .iter()
            .cloned()
            .map(Entry::Pv)
            .chain(self.snapshots.iter().cloned().map(Entry::Snapshot));
        search::filter_entries(entries, terms)
    }

    // ========== Tags ==========

    fn group_mut(&mut self, group: TagGroupId) -> Result<&mut TagGroup> {
        self.tags
            .get_mut(&group)
            .ok_or(BackendError::TagGroupNotFound(group))
    }

    pub fn add_tag_group(&mut self, name: &str, description: &str) -> Result<TagGroupId> {
        if tags::find_group(&self.tags, name).is_some() {
            return Err(BackendError::validation(format!(
                "tag group '{}' already exists",
                name
            )));
        }
        let id = tags::next_id(&self.tags);
        self.tags.insert(id, TagGroup::new(name, description));
        Ok(id)
    }

    pub fn update_tag_group(
        &mut self,
        group: TagGroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let entry = self.group_mut(group)?;
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            entry.name = name.to_string();
        }
        if let Some(description) = description {
            entry.description = description.to_string();
        }
        Ok(())
    }

    pub fn delete_tag_group(&mut self, group: TagGroupId) -> Result<()> {
        self.tags
            .remove(&group)
            .map(|_| ())
            .ok_or(BackendError::TagGroupNotFound(group))
    }

    pub fn add_tag_to_group(&mut self, group: TagGroupId, name: &str) -> Result<TagId> {
        let entry = self.group_mut(group)?;
        if entry.tag_id(name).is_some() {
            return Err(BackendError::validation(format!(
                "tag '{}' already exists in group '{}'",
                name, entry.name
            )));
        }
        let id = tags::next_id(&entry.tags);
        entry.tags.insert(id, name.to_string());
        Ok(id)
    }

    pub fn update_tag_in_group(
        &mut self,
        group: TagGroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        let entry = self.group_mut(group)?;
        let current = entry
            .tags
            .get_mut(&tag)
            .ok_or(BackendError::TagNotFound { group, tag })?;
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            *current = name.to_string();
        }
        Ok(())
    }

    pub fn delete_tag_from_group(&mut self, group: TagGroupId, tag: TagId) -> Result<()> {
        self.group_mut(group)?
            .tags
            .remove(&tag)
            .map(|_| ())
            .ok_or(BackendError::TagNotFound { group, tag })
    }

    // ========== PVs ==========

    pub fn add_pv(&mut self, new: NewPv) -> Result<Pv> {
        let pv = new.into_pv();
        self.check_new_pvs(std::slice::from_ref(&pv), None)?;
        self.pvs.push(pv.clone());
        Ok(pv)
    }

    /// All-or-nothing: the catalog is untouched when any PV is rejected
    pub fn add_multiple_pvs(&mut self, pvs: Vec<Pv>) -> Result<Vec<Pv>> {
        let mut seen = BTreeSet::new();
        for pv in &pvs {
            if !seen.insert(pv.uuid) || self.contains(pv.uuid) {
                return Err(BackendError::EntryExists(pv.uuid));
            }
        }
        self.check_new_pvs(&pvs, None)?;
        self.pvs.extend(pvs.iter().cloned());
        Ok(pvs)
    }

    pub fn update_pv(&mut self, id: Uuid, update: &PvUpdate) -> Result<Pv> {
        let idx = self
            .pvs
            .iter()
            .position(|p| p.uuid == id)
            .ok_or(BackendError::EntryNotFound(id))?;
        let mut pv = self.pvs[idx].clone();
        update.apply_to(&mut pv);
        self.check_new_pvs(std::slice::from_ref(&pv), Some(id))?;
        self.pvs[idx] = pv.clone();
        Ok(pv)
    }

    pub fn archive_pv(&mut self, id: Uuid) -> Result<Pv> {
        let idx = self
            .pvs
            .iter()
            .position(|p| p.uuid == id)
            .ok_or(BackendError::EntryNotFound(id))?;
        let pv = self.pvs.remove(idx);
        self.archived.push(pv.clone());
        Ok(pv)
    }

    // ========== Snapshots ==========

    pub fn add_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        self.save_entry(Entry::Snapshot(snapshot))
    }

    pub fn get_snapshots(&self, filter: &SnapshotFilter) -> Vec<Snapshot> {
        self.snapshots
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    pub fn delete_snapshot(&mut self, id: Uuid) -> Result<Snapshot> {
        let idx = self
            .snapshots
            .iter()
            .position(|s| s.uuid == id)
            .ok_or(BackendError::EntryNotFound(id))?;
        Ok(self.snapshots.remove(idx))
    }
}
