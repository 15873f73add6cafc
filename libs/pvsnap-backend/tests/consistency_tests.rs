//! Consistency tests for backend implementations
//!
//! Runs the same scenarios against MemoryBackend and DirectoryBackend so the
//! two stay interchangeable.

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use pvsnap_backend::{
    Backend, BackendError, DirectoryBackend, MemoryBackend, SearchOp, SearchTerm, SnapshotFilter,
};
use pvsnap_model::{EntryKind, EpicsData, Entry, NewPv, Pv, PvUpdate, Snapshot, TagSet};
use tempfile::TempDir;

fn backends() -> (Vec<Box<dyn Backend>>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(MemoryBackend::new()),
        Box::new(DirectoryBackend::new(dir.path()).unwrap()),
    ];
    (backends, dir)
}

fn tags(pairs: &[(u32, &[u32])]) -> TagSet {
    pairs
        .iter()
        .map(|(g, ids)| (*g, ids.iter().copied().collect()))
        .collect()
}

// ============================================================================
// Entry API
// ============================================================================

#[tokio::test]
async fn test_entry_lifecycle() {
    let (backends, _dir) = backends();
    for backend in &backends {
        let pv = Pv::new("SP:1", "RB:1").with_description("first");
        backend.save_entry(Entry::from(pv.clone())).await.unwrap();
        assert!(matches!(
            backend.save_entry(Entry::from(pv.clone())).await,
            Err(BackendError::EntryExists(_))
        ));

        let mut edited = pv.clone();
        edited.description = "edited".into();
        backend.update_entry(Entry::from(edited.clone())).await.unwrap();
        assert_eq!(
            backend.get_entry(pv.uuid).await.unwrap(),
            Entry::Pv(edited.clone()),
            "{}",
            backend.name()
        );

        // the caller's copy is stale
        assert!(matches!(
            backend.delete_entry(&Entry::Pv(pv.clone())).await,
            Err(BackendError::Conflict(_))
        ));
        backend.delete_entry(&Entry::Pv(edited)).await.unwrap();
        assert!(matches!(
            backend.get_entry(pv.uuid).await,
            Err(BackendError::EntryNotFound(_))
        ));
    }
}

#[tokio::test]
async fn test_update_missing_entry() {
    let (backends, _dir) = backends();
    for backend in &backends {
        let err = backend
            .update_entry(Entry::from(Pv::new("SP:X", "")))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::EntryNotFound(_)), "{}", backend.name());
    }
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_consistency() {
    let (backends, _dir) = backends();
    for backend in &backends {
        backend
            .add_pv(NewPv {
                description: "gun laser power".into(),
                tags: tags(&[(0, &[0, 1])]),
                ..NewPv::new("LASR:GUNB:POWER", "")
            })
            .await
            .unwrap();
        backend
            .add_pv(NewPv {
                description: "vacuum gauge".into(),
                tags: tags(&[(0, &[1])]),
                ..NewPv::new("", "VGCC:IN20:PRES")
            })
            .await
            .unwrap();
        backend
            .add_snapshot(Snapshot::new("laser check").with_description("laser"))
            .await
            .unwrap();

        let found = backend
            .search(&[SearchTerm::new("description", SearchOp::Like, "laser")])
            .await
            .unwrap();
        assert_eq!(found.len(), 2, "{}", backend.name());

        let found = backend
            .search(&[
                SearchTerm::entry_type(EntryKind::Pv),
                SearchTerm::new("description", SearchOp::Like, "laser"),
            ])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        // tag subset: PVs whose tags include group 0 tag 1
        let found = backend
            .search(&[SearchTerm::new("tags", SearchOp::Gt, tags(&[(0, &[1])]))])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        // missing attribute never matches
        let found = backend
            .search(&[SearchTerm::new("title", SearchOp::Eq, "laser check")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), EntryKind::Snapshot);

        assert!(matches!(
            backend
                .search(&[SearchTerm::new("setpoint_data.data", SearchOp::IsClose, 1.0)])
                .await,
            Err(BackendError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            backend
                .search(&[SearchTerm::new("description", SearchOp::Like, 3.0)])
                .await,
            Err(BackendError::InvalidSearch(_))
        ));
    }
}

// ============================================================================
// Tags
// ============================================================================

#[tokio::test]
async fn test_tag_ids_are_sequential() {
    let (backends, _dir) = backends();
    for backend in &backends {
        let area = backend.add_tag_group("Area", "Machine area").await.unwrap();
        let sub = backend.add_tag_group("Subsystem", "").await.unwrap();
        assert_eq!((area, sub), (0, 1));

        assert_eq!(backend.add_tag_to_group(area, "IN20", "").await.unwrap(), 0);
        assert_eq!(backend.add_tag_to_group(area, "GUNB", "").await.unwrap(), 1);

        backend
            .update_tag_group(area, Some("Region"), None)
            .await
            .unwrap();
        backend
            .update_tag_in_group(area, 1, Some("GUN"))
            .await
            .unwrap();
        backend.delete_tag_from_group(area, 0).await.unwrap();
        backend.delete_tag_group(sub).await.unwrap();

        let def = backend.get_tags().await.unwrap();
        assert_eq!(def.len(), 1);
        assert_eq!(def[&area].name, "Region");
        assert_eq!(def[&area].description, "Machine area");
        assert_eq!(def[&area].tags.get(&1).map(String::as_str), Some("GUN"));

        assert!(matches!(
            backend.delete_tag_group(sub).await,
            Err(BackendError::TagGroupNotFound(1))
        ));
    }
}

// ============================================================================
// PVs
// ============================================================================

#[tokio::test]
async fn test_add_multiple_pvs_is_atomic() {
    let (backends, _dir) = backends();
    for backend in &backends {
        backend.add_pv(NewPv::new("SP:1", "")).await.unwrap();

        let batch = vec![Pv::new("SP:2", ""), Pv::new("SP:3", ""), Pv::new("SP:1", "")];
        assert!(backend.add_multiple_pvs(batch).await.is_err());
        assert_eq!(backend.get_all_pvs().await.unwrap().len(), 1, "{}", backend.name());

        let batch = vec![Pv::new("SP:2", ""), Pv::new("", "RB:3")];
        let added = backend.add_multiple_pvs(batch).await.unwrap();
        assert_eq!(added.len(), 2);

        let all = backend.get_all_pvs().await.unwrap();
        let mut addresses: Vec<_> = all.iter().map(|p| p.display_address().to_string()).collect();
        assert_eq!(addresses[0], "SP:1");
        addresses.sort();
        assert_eq!(addresses, vec!["RB:3", "SP:1", "SP:2"]);
    }
}

#[tokio::test]
async fn test_update_and_archive_pv() {
    let (backends, _dir) = backends();
    for backend in &backends {
        let pv = backend
            .add_pv(NewPv {
                description: "old".into(),
                device: "GUN".into(),
                ..NewPv::new("SP:1", "RB:1")
            })
            .await
            .unwrap();

        let updated = backend
            .update_pv(
                pv.uuid,
                PvUpdate {
                    description: Some("new".into()),
                    abs_tolerance: Some(0.5),
                    ..PvUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "new");
        assert_eq!(updated.device, "GUN");
        assert_eq!(updated.abs_tolerance, Some(0.5));

        let mut snapshot = Snapshot::new("before archive");
        snapshot.pvs.push(updated.clone());
        backend.add_snapshot(snapshot.clone()).await.unwrap();

        backend.archive_pv(pv.uuid).await.unwrap();
        assert!(backend.get_all_pvs().await.unwrap().is_empty());

        let stored = backend
            .get_snapshots(&SnapshotFilter::by_uuid(snapshot.uuid))
            .await
            .unwrap();
        assert_eq!(stored[0].pvs[0].uuid, pv.uuid);

        assert!(matches!(
            backend.archive_pv(pv.uuid).await,
            Err(BackendError::EntryNotFound(_))
        ));
    }
}

// ============================================================================
// Snapshots and meta PVs
// ============================================================================

#[tokio::test]
async fn test_snapshot_filters() {
    let (backends, _dir) = backends();
    for backend in &backends {
        let mut morning = Snapshot::new("morning check");
        morning.pvs.push(
            Pv::new("SP:1", "")
                .with_tags(tags(&[(0, &[1, 2])]))
                .with_setpoint_data(EpicsData::new(1.5)),
        );
        let evening = Snapshot::new("evening check");
        backend.add_snapshot(morning.clone()).await.unwrap();
        backend.add_snapshot(evening.clone()).await.unwrap();

        let all = backend.get_snapshots(&SnapshotFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);

        let found = backend
            .get_snapshots(&SnapshotFilter::by_title("morning"))
            .await
            .unwrap();
        assert_eq!(found, vec![morning.clone()]);

        let filter = SnapshotFilter {
            tags: tags(&[(0, &[2])]),
            ..SnapshotFilter::all()
        };
        assert_eq!(backend.get_snapshots(&filter).await.unwrap().len(), 1);

        backend.delete_snapshot(morning.uuid).await.unwrap();
        assert!(matches!(
            backend.delete_snapshot(morning.uuid).await,
            Err(BackendError::EntryNotFound(_))
        ));
        assert_eq!(
            backend.get_snapshots(&SnapshotFilter::all()).await.unwrap(),
            vec![evening]
        );
    }
}

#[tokio::test]
async fn test_meta_pvs() {
    let (backends, _dir) = backends();
    for backend in &backends {
        assert!(backend.get_meta_pvs().await.unwrap().is_empty());
        let meta = vec![Pv::new("", "ACCL:GUNB:STATE"), Pv::new("", "BEAM:RATE")];
        backend.set_meta_pvs(meta.clone()).await.unwrap();
        assert_eq!(backend.get_meta_pvs().await.unwrap(), meta);
    }
}
