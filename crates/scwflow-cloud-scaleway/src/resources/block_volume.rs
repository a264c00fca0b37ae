//! `scaleway_block_volume`

use super::{default_name, signed, string_list};
use crate::api::block::{
    BlockApi, CreateVolumeRequest, FromEmpty, FromSnapshot, GB, UpdateVolumeRequest, Volume,
    VolumeStatus,
};
use async_trait::async_trait;
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, CloudError, Diagnostics, Meta, MutationGroup,
    MutationTable, OpContext, PlanAdjustment, Resource, Result, Schema, Until, Waiter, ZonedId,
    forbid_shrink, id,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MUTATIONS: MutationTable = &[
    (MutationGroup::Metadata, &["name", "tags"]),
    (MutationGroup::Scaling, &["size_in_gb"]),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VolumeSpec {
    pub name: Option<String>,
    pub size_in_gb: Option<u64>,
    pub iops: u32,
    pub snapshot_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub project_id: Option<String>,
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeState {
    pub name: String,
    pub size_in_gb: u64,
    pub iops: Option<u32>,
    /// Snapshot the volume was restored from, bare UUID.
    pub snapshot_id: Option<String>,
    pub tags: Vec<String>,
    pub project_id: String,
    pub zone: String,
    pub status: String,
}

impl From<Volume> for VolumeState {
    fn from(v: Volume) -> Self {
        Self {
            snapshot_id: v.parent_snapshot_id.as_deref().map(|s| id::expand(s).to_string()),
            name: v.name,
            size_in_gb: v.size / GB,
            iops: v.specs.and_then(|s| s.perf_iops),
            tags: v.tags,
            project_id: v.project_id,
            zone: v.zone,
            status: v.status.to_string(),
        }
    }
}

/// Polls a volume until it reaches one of the usable statuses.
pub(crate) async fn wait_volume(
    ctx: &OpContext,
    meta: &Meta,
    api: &dyn BlockApi,
    zone: &str,
    id: &str,
) -> Result<Volume> {
    Waiter::new(ctx, meta, format!("block volume {}/{}", zone, id))
        .until(
            Until::Any(vec![VolumeStatus::Available, VolumeStatus::InUse]),
            move || api.get_volume(zone, id),
        )
        .await
}

pub struct BlockVolume {
    api: Arc<dyn BlockApi>,
}

impl BlockVolume {
    pub fn new(api: Arc<dyn BlockApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for BlockVolume {
    type Spec = VolumeSpec;
    type State = VolumeState;

    fn type_name(&self) -> &'static str {
        "scaleway_block_volume"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::optional_computed(AttributeType::String))
            .with_attribute(
                "size_in_gb",
                Attribute::optional_computed(AttributeType::Integer)
                    .describe("Grow-only; required unless restoring from a snapshot"),
            )
            .with_attribute(
                "iops",
                Attribute::required(AttributeType::Integer).force_new(),
            )
            .with_attribute(
                "snapshot_id",
                Attribute::optional(AttributeType::String).force_new(),
            )
            .with_attribute("tags", Attribute::optional(string_list()))
            .with_attribute(
                "project_id",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .with_attribute("status", Attribute::computed(AttributeType::String))
            .zoned()
    }

    async fn create(&self, ctx: &OpContext, meta: &Meta, spec: &VolumeSpec) -> Result<String> {
        let zone = meta.zone(spec.zone.as_deref())?;

        let (from_empty, from_snapshot) = match &spec.snapshot_id {
            Some(snapshot) => {
                let snapshot = ZonedId::resolve(snapshot, &zone)?;
                // A restored volume needs its snapshot usable first.
                crate::resources::block_snapshot::wait_snapshot(
                    ctx,
                    meta,
                    self.api.as_ref(),
                    snapshot.zone.as_str(),
                    &snapshot.id,
                )
                .await?;
                (
                    None,
                    Some(FromSnapshot {
                        snapshot_id: snapshot.id,
                        size: spec.size_in_gb.map(|gb| gb * GB),
                    }),
                )
            }
            None => {
                let size = spec.size_in_gb.ok_or_else(|| {
                    CloudError::validation("size_in_gb", "required when snapshot_id is not set")
                })?;
                (Some(FromEmpty { size: size * GB }), None)
            }
        };

        let req = CreateVolumeRequest {
            name: spec.name.clone().unwrap_or_else(|| default_name("volume")),
            project_id: meta.project_id(spec.project_id.as_deref()),
            perf_iops: Some(spec.iops),
            from_empty,
            from_snapshot,
            tags: spec.tags.clone().unwrap_or_default(),
        };
        let volume = self.api.create_volume(zone.as_str(), &req).await?;
        Ok(ZonedId::new(zone, volume.id).to_string())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        wait_volume(ctx, meta, self.api.as_ref(), id.zone.as_str(), &id.id).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let (api, zone, uuid) = (self.api.as_ref(), id.zone.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("block volume {}", id))
            .until(Until::Terminal, move || api.get_volume(zone, uuid))
            .await?;
        Ok(())
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        _diags: &mut Diagnostics,
    ) -> Result<VolumeState> {
        let id = ZonedId::parse(id)?;
        Ok(self.api.get_volume(id.zone.as_str(), &id.id).await?.into())
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        _prior: &VolumeState,
        spec: &VolumeSpec,
        changes: &ChangeSet,
    ) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let zone = id.zone.as_str();

        for (group, _) in changes.partition(MUTATIONS) {
            ctx.check("block volume update")?;
            let req = match group {
                MutationGroup::Metadata => UpdateVolumeRequest {
                    name: spec.name.clone().filter(|_| changes.has("name")),
                    tags: spec.tags.clone().filter(|_| changes.has("tags")),
                    ..Default::default()
                },
                MutationGroup::Scaling => UpdateVolumeRequest {
                    size: spec.size_in_gb.map(|gb| gb * GB),
                    ..Default::default()
                },
                _ => continue,
            };
            self.api.update_volume(zone, &id.id, &req).await?;
            wait_volume(ctx, meta, self.api.as_ref(), zone, &id.id).await?;
        }
        Ok(())
    }

    async fn delete(&self, _ctx: &OpContext, _meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        self.api.delete_volume(id.zone.as_str(), &id.id).await
    }

    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let (api, zone, uuid) = (self.api.as_ref(), id.zone.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("block volume {}", id))
            .until_absent(move || api.get_volume(zone, uuid))
            .await
    }

    fn customize_diff(
        &self,
        prior: Option<&VolumeState>,
        desired: &VolumeSpec,
        plan: &mut PlanAdjustment,
    ) {
        if let Err(e) = forbid_shrink(
            "size_in_gb",
            prior.and_then(|p| signed(Some(p.size_in_gb))),
            signed(desired.size_in_gb),
        ) {
            plan.reject(e);
        }
        if prior.is_none() && desired.snapshot_id.is_none() && desired.size_in_gb.is_none() {
            plan.reject(CloudError::validation(
                "size_in_gb",
                "required when snapshot_id is not set",
            ));
        }
    }
}
