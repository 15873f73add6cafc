//! HttpBackend tests against a mocked configuration service

#![allow(clippy::disallowed_methods)]

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pvsnap_backend::{Backend, BackendError, HttpBackend, SearchOp, SearchTerm, SnapshotFilter};
use pvsnap_model::{EntryKind, EpicsData, NewPv, Pv, Snapshot};

const PV_ID: &str = "2f0c6f0e-6a43-4a4e-9c55-0d3f4c1b2a10";
const SNAPSHOT_ID: &str = "7d4f1a9e-2b6c-4c1d-9a59-5a0e5f1c2b3a";

fn ok(payload: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "payload": payload }))
}

/// Mount the tag endpoints with one group "Area" holding IN20 (0) and GUNB (1)
async fn mount_tags(server: &MockServer, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/v1/tags"))
        .respond_with(ok(json!([{ "id": 0, "name": "Area" }])))
        .expect(expected_fetches)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tags/0"))
        .respond_with(ok(json!([{
            "description": "Machine area",
            "tags": [{ "id": 0, "name": "IN20" }, { "id": 1, "name": "GUNB" }]
        }])))
        .mount(server)
        .await;
}

fn pv_doc() -> serde_json::Value {
    json!({
        "id": PV_ID,
        "setpointAddress": "LASR:GUNB:POWER",
        "readbackAddress": null,
        "configAddress": null,
        "description": "laser power",
        "device": "LASER",
        "tags": [{ "id": 1 }],
        "absTolerance": 0.5,
        "relTolerance": 0.0,
        "createdDate": "2024-05-01T08:00:00",
        "readOnly": false
    })
}

#[tokio::test]
async fn test_tag_definition_is_cached() {
    let server = MockServer::start().await;
    mount_tags(&server, 1).await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    let first = backend.get_tags().await.unwrap();
    let second = backend.get_tags().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[&0].name, "Area");
    assert_eq!(first[&0].description, "Machine area");
    assert_eq!(first[&0].tag_id("GUNB"), Some(1));
}

#[tokio::test]
async fn test_expired_tag_cache_refetches() {
    let server = MockServer::start().await;
    mount_tags(&server, 2).await;

    let backend = HttpBackend::new(server.uri())
        .unwrap()
        .with_cache_ttl(Duration::ZERO);
    backend.get_tags().await.unwrap();
    backend.get_tags().await.unwrap();
}

#[tokio::test]
async fn test_get_all_pvs_unpacks_fields() {
    let server = MockServer::start().await;
    mount_tags(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/pvs"))
        .respond_with(ok(json!([pv_doc()])))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    let pvs = backend.get_all_pvs().await.unwrap();
    assert_eq!(pvs.len(), 1);
    let pv = &pvs[0];
    assert_eq!(pv.uuid, Uuid::parse_str(PV_ID).unwrap());
    assert_eq!(pv.setpoint, "LASR:GUNB:POWER");
    assert_eq!(pv.readback, "");
    assert_eq!(pv.device, "LASER");
    assert_eq!(pv.abs_tolerance, Some(0.5));
    assert_eq!(pv.tags.get(&0).map(|ids| ids.contains(&1)), Some(true));
}

#[tokio::test]
async fn test_add_pv_sends_flat_tags() {
    let server = MockServer::start().await;
    mount_tags(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/pvs"))
        .and(body_partial_json(json!({
            "setpointAddress": "LASR:GUNB:POWER",
            "tags": [1],
            "readOnly": false
        })))
        .respond_with(ok(pv_doc()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    let mut new = NewPv::new("LASR:GUNB:POWER", "");
    new.tags.entry(0).or_default().insert(1);
    let pv = backend.add_pv(new).await.unwrap();
    assert_eq!(pv.uuid, Uuid::parse_str(PV_ID).unwrap());
}

#[tokio::test]
async fn test_service_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pvs/multi"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "errorMessage": "setpoint already exists" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    match backend.add_multiple_pvs(vec![Pv::new("SP:1", "")]).await {
        Err(BackendError::Service { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "setpoint already exists");
        },
        other => panic!("unexpected result: {:?}", other),
    }

    let err = backend.add_tag_group("Area", "").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn test_idempotent_requests_retry_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/pvs"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/pvs"))
        .respond_with(ok(json!([pv_doc()])))
        .expect(1)
        .mount(&server)
        .await;
    mount_tags(&server, 1).await;

    let backend = HttpBackend::new(server.uri())
        .unwrap()
        .with_retry(3, Duration::from_millis(5));
    let pvs = backend.get_all_pvs().await.unwrap();
    assert_eq!(pvs.len(), 1);
}

#[tokio::test]
async fn test_retries_give_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tags"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({ "message": "gateway" })))
        .expect(2)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri())
        .unwrap()
        .with_retry(2, Duration::from_millis(5));
    match backend.get_tags().await {
        Err(BackendError::Service { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "gateway");
        },
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_pv_never_sent() {
    let server = MockServer::start().await;
    let backend = HttpBackend::new(server.uri()).unwrap();
    let err = backend.add_multiple_pvs(vec![Pv::new("", "")]).await.unwrap_err();
    assert!(matches!(err, BackendError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/snapshots"))
        .and(body_partial_json(json!({
            "title": "morning",
            "values": [{ "pvName": "SP:1", "status": "NO_ALARM", "severity": "NO_ALARM", "data": 2.5 }]
        })))
        .respond_with(ok(json!({ "id": SNAPSHOT_ID })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/snapshots/{}", SNAPSHOT_ID)))
        .respond_with(ok(json!({
            "id": SNAPSHOT_ID,
            "title": "morning",
            "description": "",
            "createdDate": "2024-05-01T08:00:00",
            "data": [{
                "pvName": "SP:1", "data": 2.5, "status": "NO_ALARM",
                "severity": "NO_ALARM", "createdDate": "2024-05-01T08:00:00"
            }]
        })))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    let mut snapshot = Snapshot::new("morning");
    snapshot
        .pvs
        .push(Pv::new("SP:1", "").with_setpoint_data(EpicsData::new(2.5)));
    backend.add_snapshot(snapshot).await.unwrap();

    let id = Uuid::parse_str(SNAPSHOT_ID).unwrap();
    let found = backend
        .get_snapshots(&SnapshotFilter::by_uuid(id))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uuid, id);
    assert_eq!(found[0].find_pv("SP:1").unwrap().setpoint_data.data, EpicsData::new(2.5).data);
}

#[tokio::test]
async fn test_missing_snapshot_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/snapshots/{}", SNAPSHOT_ID)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v1/snapshots/{}", SNAPSHOT_ID)))
        .and(query_param("deleteData", "false"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    let id = Uuid::parse_str(SNAPSHOT_ID).unwrap();
    assert!(matches!(
        backend.get_snapshots(&SnapshotFilter::by_uuid(id)).await,
        Err(BackendError::EntryNotFound(_))
    ));
    assert!(matches!(
        backend.delete_snapshot(id).await,
        Err(BackendError::EntryNotFound(_))
    ));
}

#[tokio::test]
async fn test_snapshot_list_passes_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/snapshots"))
        .and(query_param("title", "morning"))
        .respond_with(ok(json!([{
            "id": SNAPSHOT_ID,
            "title": "morning check",
            "description": "daily",
            "createdDate": "2024-05-01T08:00:00",
            "metadataPVs": [{
                "setpointAddress": "BEAM:RATE", "data": 120, "status": "NO_ALARM",
                "severity": "NO_ALARM", "createdDate": "2024-05-01T08:00:00"
            }]
        }])))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    let found = backend
        .get_snapshots(&SnapshotFilter::by_title("morning"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].pvs.is_empty());
    assert_eq!(found[0].meta_pvs[0].setpoint, "BEAM:RATE");
}

#[tokio::test]
async fn test_search_filters_locally() {
    let server = MockServer::start().await;
    mount_tags(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/pvs"))
        .respond_with(ok(json!([pv_doc()])))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri()).unwrap();
    let found = backend
        .search(&[
            SearchTerm::entry_type(EntryKind::Pv),
            SearchTerm::new("device", SearchOp::Eq, "LASER"),
        ])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    // rejected before any request
    assert!(matches!(
        backend
            .search(&[SearchTerm::new("abs_tolerance", SearchOp::IsClose, 0.5)])
            .await,
        Err(BackendError::UnsupportedOperator(_))
    ));
}

#[tokio::test]
async fn test_meta_pvs_are_not_stored() {
    let server = MockServer::start().await;
    let backend = HttpBackend::new(server.uri()).unwrap();
    backend.set_meta_pvs(vec![Pv::new("", "BEAM:RATE")]).await.unwrap();
    assert!(backend.get_meta_pvs().await.unwrap().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
