//! REST configuration service backend
//!
//! Talks to the PV configuration database service over HTTP. Every response
//! wraps its data in `{"payload": ...}`; failures carry `errorMessage` or
//! `message` in the body.
//!
//! The service assigns PV and tag ids itself, stores only setpoint data in
//! snapshots and keeps no meta PV list.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Client, Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use pvsnap_model::{
    tags, AttrValue, Entry, EntryKind, EpicsData, EpicsValue, NewPv, Pv, PvUpdate, Severity,
    Snapshot, Status, TagDef, TagGroup, TagGroupId, TagId,
};

use crate::error::{BackendError, Result};
use crate::search::{self, SearchOp, SearchTerm};
use crate::traits::{Backend, SnapshotFilter};

const TAGS: &str = "/v1/tags";
const PVS: &str = "/v1/pvs";
const PVS_MULTI: &str = "/v1/pvs/multi";
const SNAPSHOTS: &str = "/v1/snapshots";

/// How long a fetched tag definition is reused
pub const TAG_CACHE_TTL: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts for idempotent requests failing with a retryable error
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const RETRY_DELAY: Duration = Duration::from_millis(250);

// ============================================================================
// Wire format
// ============================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    payload: T,
}

#[derive(Deserialize)]
struct Created<T> {
    id: T,
}

#[derive(Deserialize)]
struct TagGroupSummary {
    id: TagGroupId,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct TagGroupDoc {
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<TagDoc>,
}

#[derive(Deserialize)]
struct TagDoc {
    id: TagId,
    #[serde(default)]
    name: String,
}

/// Tags on a PV come back either as bare ids or as `{"id": ..}` objects
#[derive(Deserialize)]
#[serde(untagged)]
enum TagRef {
    Id(TagId),
    Doc { id: TagId },
}

impl TagRef {
    fn id(&self) -> TagId {
        match self {
            TagRef::Id(id) | TagRef::Doc { id } => *id,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PvBody {
    setpoint_address: Option<String>,
    readback_address: Option<String>,
    config_address: Option<String>,
    description: String,
    device: Option<String>,
    abs_tolerance: Option<f64>,
    rel_tolerance: Option<f64>,
    tags: Vec<TagId>,
    read_only: bool,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl PvBody {
    fn from_pv(pv: &Pv) -> Self {
        Self {
            setpoint_address: non_empty(&pv.setpoint),
            readback_address: non_empty(&pv.readback),
            config_address: non_empty(&pv.config),
            description: pv.description.clone(),
            device: non_empty(&pv.device),
            abs_tolerance: pv.abs_tolerance,
            rel_tolerance: pv.rel_tolerance,
            tags: tags::flatten(&pv.tags),
            read_only: false,
        }
    }
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct PvPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    setpoint_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<TagId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abs_tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rel_tolerance: Option<f64>,
    read_only: bool,
}

impl From<&PvUpdate> for PvPatch {
    fn from(update: &PvUpdate) -> Self {
        Self {
            setpoint_address: update.setpoint.clone(),
            description: update.description.clone(),
            device: update.device.clone(),
            tags: update.tags.as_ref().map(tags::flatten),
            abs_tolerance: update.abs_tolerance,
            rel_tolerance: update.rel_tolerance,
            read_only: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PvDoc {
    id: Uuid,
    #[serde(default)]
    setpoint_address: Option<String>,
    #[serde(default)]
    readback_address: Option<String>,
    #[serde(default)]
    config_address: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    tags: Vec<TagRef>,
    #[serde(default)]
    abs_tolerance: Option<f64>,
    #[serde(default)]
    rel_tolerance: Option<f64>,
    #[serde(default)]
    created_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotBody<'a> {
    title: &'a str,
    description: &'a str,
    values: Vec<ValueBody<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueBody<'a> {
    pv_name: &'a str,
    status: Status,
    severity: Severity,
    data: Option<&'a EpicsValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDoc {
    id: Uuid,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    data: Vec<ValueDoc>,
    #[serde(default, rename = "metadataPVs")]
    metadata_pvs: Vec<MetaValueDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueDoc {
    pv_name: String,
    #[serde(default)]
    data: Option<EpicsValue>,
    status: Status,
    severity: Severity,
    #[serde(default)]
    created_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaValueDoc {
    setpoint_address: String,
    #[serde(default)]
    data: Option<EpicsValue>,
    status: Status,
    severity: Severity,
    #[serde(default)]
    created_date: Option<String>,
}

/// Service timestamps are ISO 8601, usually without an offset; those are UTC
fn parse_created(text: Option<&str>) -> DateTime<Utc> {
    let Some(text) = text else {
        return pvsnap_model::utcnow();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return ts.with_timezone(&Utc);
    }
    match NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive.and_utc(),
        Err(e) => {
            warn!("Unparseable createdDate '{}': {}", text, e);
            pvsnap_model::utcnow()
        },
    }
}

fn epics_data(
    data: Option<EpicsValue>,
    status: Status,
    severity: Severity,
    created: Option<&str>,
) -> EpicsData {
    EpicsData {
        data,
        status,
        severity,
        timestamp: parse_created(created),
        ..EpicsData::default()
    }
}

impl SnapshotDoc {
    fn into_snapshot(self) -> Snapshot {
        let pvs = self
            .data
            .into_iter()
            .map(|value| {
                let data = epics_data(
                    value.data,
                    value.status,
                    value.severity,
                    value.created_date.as_deref(),
                );
                Pv::new(value.pv_name, "").with_setpoint_data(data)
            })
            .collect();
        let meta_pvs = self
            .metadata_pvs
            .into_iter()
            .map(|value| {
                let created = parse_created(value.created_date.as_deref());
                let mut pv = Pv::new(value.setpoint_address, "").with_setpoint_data(epics_data(
                    value.data,
                    value.status,
                    value.severity,
                    value.created_date.as_deref(),
                ));
                pv.creation_time = created;
                pv
            })
            .collect();

        Snapshot {
            uuid: self.id,
            title: self.title,
            description: self.description,
            pvs,
            meta_pvs,
            creation_time: parse_created(self.created_date.as_deref()),
        }
    }
}

fn pack_snapshot(snapshot: &Snapshot) -> SnapshotBody<'_> {
    let values = snapshot
        .pvs
        .iter()
        .map(|pv| {
            let data = if pv.setpoint.is_empty() {
                &pv.readback_data
            } else {
                &pv.setpoint_data
            };
            ValueBody {
                pv_name: pv.display_address(),
                status: data.status,
                severity: data.severity,
                data: data.data.as_ref(),
            }
        })
        .collect();
    SnapshotBody {
        title: &snapshot.title,
        description: &snapshot.description,
        values,
    }
}

/// Message from an error body: `errorMessage`, then `message`
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["errorMessage", "message"]
        .iter()
        .filter_map(|key| value.get(key).and_then(|m| m.as_str()))
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Backend
// ============================================================================

struct CachedTags {
    fetched: Instant,
    tags: TagDef,
}

/// Backend for the REST configuration service
pub struct HttpBackend {
    base_url: String,
    client: Client,
    tag_cache: RwLock<Option<CachedTags>>,
    cache_ttl: Duration,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            tag_cache: RwLock::new(None),
            cache_ttl: TAG_CACHE_TTL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        })
    }

    /// Retry policy for GET/PUT/DELETE; the delay doubles after each attempt
    pub fn with_retry(mut self, max_attempts: u32, initial_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = initial_delay;
        self
    }

    /// Override the tag cache lifetime
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn invalidate_tags(&self) {
        *self.tag_cache.write() = None;
    }

    fn cached_tags(&self) -> Option<TagDef> {
        self.tag_cache
            .read()
            .as_ref()
            .filter(|cached| cached.fetched.elapsed() < self.cache_ttl)
            .map(|cached| cached.tags.clone())
    }

    /// Send and turn non-success statuses into `BackendError::Service`
    ///
    /// Idempotent requests are retried with backoff while the error is
    /// retryable; POSTs are sent once.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let (client, request) = request.build_split();
        let request = request?;
        let attempts = if request.method().is_idempotent() {
            self.max_attempts
        } else {
            1
        };

        let mut delay = self.retry_delay;
        let mut attempt = 1;
        loop {
            let outcome = match request.try_clone() {
                Some(retry) if attempt < attempts => Self::send_once(&client, retry).await,
                _ => return Self::send_once(&client, request).await,
            };
            match outcome {
                Err(e) if e.is_retryable() => {
                    warn!(
                        "{} {} failed ({}), attempt {}/{}, retrying in {:?}",
                        request.method(),
                        request.url(),
                        e,
                        attempt,
                        attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                },
                other => return other,
            }
        }
    }

    async fn send_once(client: &Client, request: Request) -> Result<Response> {
        let response = client.execute(request).await?;
        let status = response.status();
        debug!("{} {}", response.url(), status);
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        Err(BackendError::Service {
            status: status.as_u16(),
            message,
        })
    }

    async fn payload<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            BackendError::Serialization(format!("unexpected response body: {}", e))
        })?;
        Ok(envelope.payload)
    }

    async fn fetch_tags(&self) -> Result<TagDef> {
        let groups: Vec<TagGroupSummary> = self.payload(self.client.get(self.url(TAGS))).await?;
        let mut def = TagDef::new();
        for group in groups {
            let path = format!("{}/{}", TAGS, group.id);
            let mut docs: Vec<TagGroupDoc> = self.payload(self.client.get(self.url(&path))).await?;
            let doc = if docs.is_empty() {
                TagGroupDoc {
                    description: String::new(),
                    tags: Vec::new(),
                }
            } else {
                docs.swap_remove(0)
            };
            def.insert(
                group.id,
                TagGroup::new(group.name, doc.description)
                    .with_tags(doc.tags.into_iter().map(|t| (t.id, t.name))),
            );
        }
        Ok(def)
    }

    fn unpack_pv(&self, doc: PvDoc, def: &TagDef) -> Pv {
        let ids: Vec<TagId> = doc.tags.iter().map(TagRef::id).collect();
        Pv {
            uuid: doc.id,
            setpoint: doc.setpoint_address.unwrap_or_default(),
            readback: doc.readback_address.unwrap_or_default(),
            config: doc.config_address.unwrap_or_default(),
            description: doc.description,
            device: doc.device.unwrap_or_default(),
            tags: tags::unflatten(def, &ids),
            abs_tolerance: doc.abs_tolerance,
            rel_tolerance: doc.rel_tolerance,
            creation_time: parse_created(doc.created_date.as_deref()),
            ..Pv::default()
        }
    }

    async fn unpack_pvs(&self, docs: Vec<PvDoc>) -> Result<Vec<Pv>> {
        let def = self.get_tags().await?;
        Ok(docs.into_iter().map(|doc| self.unpack_pv(doc, &def)).collect())
    }

    async fn get_snapshot(&self, id: Uuid) -> Result<Snapshot> {
        let path = format!("{}/{}", SNAPSHOTS, id);
        match self.payload::<SnapshotDoc>(self.client.get(self.url(&path))).await {
            Ok(doc) => Ok(doc.into_snapshot()),
            Err(BackendError::Service { status: 404, .. }) => Err(BackendError::EntryNotFound(id)),
            Err(e) => Err(e),
        }
    }

    /// Which entry kinds a search can possibly return
    fn searched_kinds(terms: &[SearchTerm]) -> (bool, bool) {
        let mut pvs = true;
        let mut snapshots = true;
        for term in terms.iter().filter(|t| t.attr == "entry_type") {
            let allowed = |kind: EntryKind| match (&term.op, &term.value) {
                (SearchOp::Eq, AttrValue::Kind(k)) => *k == kind,
                (SearchOp::In, AttrValue::List(kinds)) => kinds.contains(&AttrValue::Kind(kind)),
                _ => true,
            };
            pvs &= allowed(EntryKind::Pv);
            snapshots &= allowed(EntryKind::Snapshot);
        }
        (pvs, snapshots)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &'static str {
        "mongo"
    }

    async fn get_entry(&self, uuid: Uuid) -> Result<Entry> {
        if let Some(pv) = self.get_all_pvs().await?.into_iter().find(|p| p.uuid == uuid) {
            return Ok(Entry::Pv(pv));
        }
        self.get_snapshot(uuid).await.map(Entry::Snapshot)
    }

    async fn save_entry(&self, entry: Entry) -> Result<()> {
        match entry {
            Entry::Pv(pv) => {
                pv.validate()?;
                self.add_multiple_pvs(vec![pv]).await.map(|_| ())
            },
            Entry::Snapshot(snapshot) => self.add_snapshot(snapshot).await,
        }
    }

    async fn update_entry(&self, entry: Entry) -> Result<()> {
        match entry {
            Entry::Pv(pv) => {
                let update = PvUpdate {
                    setpoint: Some(pv.setpoint),
                    description: Some(pv.description),
                    device: Some(pv.device),
                    tags: Some(pv.tags),
                    abs_tolerance: pv.abs_tolerance,
                    rel_tolerance: pv.rel_tolerance,
                };
                self.update_pv(pv.uuid, update).await.map(|_| ())
            },
            Entry::Snapshot(_) => Err(BackendError::Unsupported(
                "snapshots cannot be modified on the configuration service".to_string(),
            )),
        }
    }

    async fn delete_entry(&self, entry: &Entry) -> Result<()> {
        match entry {
            Entry::Pv(pv) => self.archive_pv(pv.uuid).await,
            Entry::Snapshot(snapshot) => self.delete_snapshot(snapshot.uuid).await,
        }
    }

    async fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>> {
        search::validate_terms(terms)?;
        let (want_pvs, want_snapshots) = Self::searched_kinds(terms);
        let mut entries = Vec::new();
        if want_pvs {
            entries.extend(self.get_all_pvs().await?.into_iter().map(Entry::Pv));
        }
        if want_snapshots {
            entries.extend(
                self.get_snapshots(&SnapshotFilter::all())
                    .await?
                    .into_iter()
                    .map(Entry::Snapshot),
            );
        }
        search::filter_entries(entries, terms)
    }

    async fn get_tags(&self) -> Result<TagDef> {
        if let Some(tags) = self.cached_tags() {
            return Ok(tags);
        }
        let tags = self.fetch_tags().await?;
        *self.tag_cache.write() = Some(CachedTags {
            fetched: Instant::now(),
            tags: tags.clone(),
        });
        Ok(tags)
    }

    async fn set_tags(&self, _tags: TagDef) -> Result<()> {
        Err(BackendError::Unsupported(
            "replacing the whole tag definition; edit groups and tags individually".to_string(),
        ))
    }

    async fn add_tag_group(&self, name: &str, description: &str) -> Result<TagGroupId> {
        let body = serde_json::json!({ "name": name, "description": description });
        let created: Created<TagGroupId> = self
            .payload(self.client.post(self.url(TAGS)).json(&body))
            .await?;
        self.invalidate_tags();
        Ok(created.id)
    }

    async fn update_tag_group(
        &self,
        group: TagGroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::Map::new();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            body.insert("name".into(), name.into());
        }
        if let Some(description) = description {
            body.insert("description".into(), description.into());
        }
        let path = format!("{}/{}", TAGS, group);
        self.send(self.client.put(self.url(&path)).json(&body)).await?;
        self.invalidate_tags();
        Ok(())
    }

    async fn delete_tag_group(&self, group: TagGroupId) -> Result<()> {
        let path = format!("{}/{}", TAGS, group);
        self.send(self.client.delete(self.url(&path)).query(&[("force", "true")]))
            .await?;
        self.invalidate_tags();
        Ok(())
    }

    async fn add_tag_to_group(
        &self,
        group: TagGroupId,
        name: &str,
        description: &str,
    ) -> Result<TagId> {
        let path = format!("{}/{}/tags", TAGS, group);
        let body = serde_json::json!({ "name": name, "description": description });
        self.send(self.client.put(self.url(&path)).json(&body)).await?;
        self.invalidate_tags();

        // the service does not echo the new id, look it up by name
        let def = self.get_tags().await?;
        def.get(&group)
            .and_then(|g| g.tag_id(name))
            .ok_or(BackendError::TagGroupNotFound(group))
    }

    async fn update_tag_in_group(
        &self,
        group: TagGroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::Map::new();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            body.insert("name".into(), name.into());
        }
        let path = format!("{}/{}/tags/{}", TAGS, group, tag);
        self.send(self.client.put(self.url(&path)).json(&body)).await?;
        self.invalidate_tags();
        Ok(())
    }

    async fn delete_tag_from_group(&self, group: TagGroupId, tag: TagId) -> Result<()> {
        let path = format!("{}/{}/tags/{}", TAGS, group, tag);
        self.send(self.client.delete(self.url(&path))).await?;
        self.invalidate_tags();
        Ok(())
    }

    async fn add_pv(&self, pv: NewPv) -> Result<Pv> {
        let pv = pv.into_pv();
        pv.validate()?;
        let doc: PvDoc = self
            .payload(self.client.post(self.url(PVS)).json(&PvBody::from_pv(&pv)))
            .await?;
        let def = self.get_tags().await?;
        Ok(self.unpack_pv(doc, &def))
    }

    async fn add_multiple_pvs(&self, pvs: Vec<Pv>) -> Result<Vec<Pv>> {
        pvs.iter().try_for_each(Pv::validate)?;
        let body: Vec<PvBody> = pvs.iter().map(PvBody::from_pv).collect();
        let docs: Vec<PvDoc> = self
            .payload(self.client.post(self.url(PVS_MULTI)).json(&body))
            .await?;
        debug!("Service stored {} PVs", docs.len());
        self.unpack_pvs(docs).await
    }

    async fn update_pv(&self, id: Uuid, update: PvUpdate) -> Result<Pv> {
        let path = format!("{}/{}", PVS, id);
        self.send(self.client.put(self.url(&path)).json(&PvPatch::from(&update)))
            .await?;
        self.get_all_pvs()
            .await?
            .into_iter()
            .find(|p| p.uuid == id)
            .ok_or(BackendError::EntryNotFound(id))
    }

    async fn archive_pv(&self, id: Uuid) -> Result<()> {
        let path = format!("{}/{}", PVS, id);
        match self.send(self.client.delete(self.url(&path))).await {
            Err(BackendError::Service { status: 404, .. }) => Err(BackendError::EntryNotFound(id)),
            other => other.map(|_| ()),
        }
    }

    async fn get_all_pvs(&self) -> Result<Vec<Pv>> {
        let docs: Vec<PvDoc> = self.payload(self.client.get(self.url(PVS))).await?;
        self.unpack_pvs(docs).await
    }

    async fn add_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.send(self.client.post(self.url(SNAPSHOTS)).json(&pack_snapshot(&snapshot)))
            .await?;
        Ok(())
    }

    async fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        if let Some(id) = filter.uuid {
            return self.get_snapshot(id).await.map(|s| vec![s]);
        }
        let mut query = vec![("title", filter.title.clone())];
        query.extend(
            tags::flatten(&filter.tags)
                .into_iter()
                .map(|id| ("tags", id.to_string())),
        );
        let docs: Vec<SnapshotDoc> = self
            .payload(self.client.get(self.url(SNAPSHOTS)).query(&query))
            .await?;
        Ok(docs.into_iter().map(SnapshotDoc::into_snapshot).collect())
    }

    async fn delete_snapshot(&self, id: Uuid) -> Result<()> {
        let path = format!("{}/{}", SNAPSHOTS, id);
        match self
            .send(self.client.delete(self.url(&path)).query(&[("deleteData", "false")]))
            .await
        {
            Err(BackendError::Service { status: 404, .. }) => Err(BackendError::EntryNotFound(id)),
            other => other.map(|_| ()),
        }
    }

    async fn get_meta_pvs(&self) -> Result<Vec<Pv>> {
        Ok(Vec::new())
    }

    async fn set_meta_pvs(&self, pvs: Vec<Pv>) -> Result<()> {
        if !pvs.is_empty() {
            debug!("Configuration service keeps no meta PVs, ignoring {}", pvs.len());
        }
        Ok(())
    }
}
