//! `scaleway_block_snapshot`
//!
//! A snapshot lives in the zone of its volume. `volume_id` may carry that
//! zone (`fr-par-2/<uuid>`), in which case it wins over the provider default.

use super::{default_name, string_list};
use crate::api::block::{
    BlockApi, CreateSnapshotRequest, GB, Snapshot, SnapshotStatus, UpdateSnapshotRequest,
};
use async_trait::async_trait;
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, Diagnostic, Diagnostics, LocalizedId, Meta, OpContext,
    Resource, Result, Schema, Until, Waiter, Zone, ZonedId, id,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotSpec {
    pub name: Option<String>,
    pub volume_id: String,
    pub tags: Option<Vec<String>>,
    pub project_id: Option<String>,
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotState {
    pub name: String,
    pub volume_id: Option<String>,
    pub size_in_gb: u64,
    pub tags: Vec<String>,
    pub project_id: String,
    pub zone: String,
    pub status: String,
}

impl From<Snapshot> for SnapshotState {
    fn from(s: Snapshot) -> Self {
        Self {
            volume_id: s.parent_volume.as_ref().map(|v| id::format(&s.zone, &v.id)),
            name: s.name,
            size_in_gb: s.size / GB,
            tags: s.tags,
            project_id: s.project_id,
            zone: s.zone,
            status: s.status.to_string(),
        }
    }
}

pub(crate) async fn wait_snapshot(
    ctx: &OpContext,
    meta: &Meta,
    api: &dyn BlockApi,
    zone: &str,
    id: &str,
) -> Result<Snapshot> {
    Waiter::new(ctx, meta, format!("block snapshot {}/{}", zone, id))
        .until(Until::one(SnapshotStatus::Available), move || {
            api.get_snapshot(zone, id)
        })
        .await
}

pub struct BlockSnapshot {
    api: Arc<dyn BlockApi>,
}

impl BlockSnapshot {
    pub fn new(api: Arc<dyn BlockApi>) -> Self {
        Self { api }
    }

    /// Zone of the snapshot: declared, else the volume's, else the default.
    fn zone(meta: &Meta, spec: &SnapshotSpec) -> Result<Zone> {
        if spec.zone.is_some() {
            return meta.zone(spec.zone.as_deref());
        }
        match LocalizedId::parse(&spec.volume_id) {
            Ok(volume) => Zone::parse(volume.locality()),
            Err(_) => meta.zone(None),
        }
    }
}

#[async_trait]
impl Resource for BlockSnapshot {
    type Spec = SnapshotSpec;
    type State = SnapshotState;

    fn type_name(&self) -> &'static str {
        "scaleway_block_snapshot"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::optional_computed(AttributeType::String))
            .with_attribute(
                "volume_id",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute("size_in_gb", Attribute::computed(AttributeType::Integer))
            .with_attribute("tags", Attribute::optional(string_list()))
            .with_attribute(
                "project_id",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .with_attribute("status", Attribute::computed(AttributeType::String))
            .zoned()
    }

    async fn create(&self, ctx: &OpContext, meta: &Meta, spec: &SnapshotSpec) -> Result<String> {
        let zone = Self::zone(meta, spec)?;
        let volume = ZonedId::resolve(&spec.volume_id, &zone)?;
        super::block_volume::wait_volume(ctx, meta, self.api.as_ref(), zone.as_str(), &volume.id)
            .await?;

        let req = CreateSnapshotRequest {
            volume_id: volume.id,
            name: spec.name.clone().unwrap_or_else(|| default_name("snapshot")),
            project_id: meta.project_id(spec.project_id.as_deref()),
            tags: spec.tags.clone().unwrap_or_default(),
        };
        let snapshot = self.api.create_snapshot(zone.as_str(), &req).await?;
        Ok(ZonedId::new(zone, snapshot.id).to_string())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        wait_snapshot(ctx, meta, self.api.as_ref(), id.zone.as_str(), &id.id).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let (api, zone, uuid) = (self.api.as_ref(), id.zone.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("block snapshot {}", id))
            .until(Until::Terminal, move || api.get_snapshot(zone, uuid))
            .await?;
        Ok(())
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        diags: &mut Diagnostics,
    ) -> Result<SnapshotState> {
        let id = ZonedId::parse(id)?;
        let snapshot = self.api.get_snapshot(id.zone.as_str(), &id.id).await?;
        if snapshot.parent_volume.is_none() {
            diags.push(
                Diagnostic::warning(
                    "source volume gone",
                    format!("the volume snapshot {} was taken from no longer exists", id),
                )
                .with_attribute("volume_id"),
            );
        }
        Ok(snapshot.into())
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        _prior: &SnapshotState,
        spec: &SnapshotSpec,
        changes: &ChangeSet,
    ) -> Result<()> {
        let id = ZonedId::parse(id)?;
        if !changes.any(&["name", "tags"]) {
            return Ok(());
        }
        let req = UpdateSnapshotRequest {
            name: spec.name.clone().filter(|_| changes.has("name")),
            tags: spec.tags.clone().filter(|_| changes.has("tags")),
        };
        self.api.update_snapshot(id.zone.as_str(), &id.id, &req).await?;
        wait_snapshot(ctx, meta, self.api.as_ref(), id.zone.as_str(), &id.id).await?;
        Ok(())
    }

    async fn delete(&self, _ctx: &OpContext, _meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        self.api.delete_snapshot(id.zone.as_str(), &id.id).await
    }

    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let (api, zone, uuid) = (self.api.as_ref(), id.zone.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("block snapshot {}", id))
            .until_absent(move || api.get_snapshot(zone, uuid))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::block_volume::BlockVolume;
    use crate::testing::{FakeCloud, meta};
    use scwflow_cloud::{Lifecycle, ResourceHandler, Severity};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_snapshot_follows_volume_zone() {
        let cloud = Arc::new(FakeCloud::new());
        let cancel = CancellationToken::new();
        let volumes = Lifecycle::new(BlockVolume::new(cloud.clone()));
        let volume = volumes
            .create(
                &cancel,
                &meta(),
                json!({"iops": 5000, "size_in_gb": 10, "zone": "fr-par-2"}),
            )
            .await
            .state
            .unwrap();

        let snapshots = Lifecycle::new(BlockSnapshot::new(cloud.clone()));
        let resp = snapshots
            .create(&cancel, &meta(), json!({"volume_id": volume.id.clone(), "name": "nightly"}))
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        let state = resp.state.unwrap();
        assert!(state.id.starts_with("fr-par-2/"));
        assert_eq!(state.attributes["volume_id"], json!(volume.id));
        assert_eq!(state.attributes["size_in_gb"], 10);
    }

    #[tokio::test]
    async fn test_missing_parent_volume_warns_once() {
        let cloud = Arc::new(FakeCloud::new());
        let cancel = CancellationToken::new();
        let volumes = Lifecycle::new(BlockVolume::new(cloud.clone()));
        let volume = volumes
            .create(&cancel, &meta(), json!({"iops": 5000, "size_in_gb": 10}))
            .await
            .state
            .unwrap();
        let snapshots = Lifecycle::new(BlockSnapshot::new(cloud.clone()));
        let snapshot = snapshots
            .create(&cancel, &meta(), json!({"volume_id": volume.id.clone()}))
            .await
            .state
            .unwrap();

        volumes.delete(&cancel, &meta(), &volume).await;
        let read = snapshots.read(&cancel, &meta(), &snapshot).await;
        assert!(read.state.is_some());
        assert_eq!(read.diagnostics.len(), 1);
        let warning = read.diagnostics.iter().next().unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.attribute.as_deref(), Some("volume_id"));
    }

    #[tokio::test]
    async fn test_snapshot_in_error_is_deletable() {
        let cloud = Arc::new(FakeCloud::new());
        let cancel = CancellationToken::new();
        let volume = Lifecycle::new(BlockVolume::new(cloud.clone()))
            .create(&cancel, &meta(), json!({"iops": 5000, "size_in_gb": 10}))
            .await
            .state
            .unwrap();
        let snapshots = Lifecycle::new(BlockSnapshot::new(cloud.clone()));
        cloud.fail_next_create();
        let created = snapshots
            .create(&cancel, &meta(), json!({"volume_id": volume.id.clone()}))
            .await;
        assert!(created.has_errors());

        let deleted = snapshots.delete(&cancel, &meta(), &created.state.unwrap()).await;
        assert!(!deleted.has_errors(), "{:?}", deleted.diagnostics);
        assert!(deleted.state.is_none());
        assert_eq!(cloud.count("delete_snapshot"), 1);
    }
}
