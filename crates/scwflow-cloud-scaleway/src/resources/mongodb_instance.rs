//! `scaleway_mongodb_instance`
//!
//! Private network addresses assigned by IPAM are looked up on read; a
//! caller without IPAM rights gets the instance without them and a warning.

use super::{
    PrivateNetwork, PublicNetwork, default_name, desired_endpoints, endpoint_state,
    fill_ipam_ips, private_network_attribute, public_network_attribute, signed, string_list,
};
use crate::api::ipam::{self, IpamApi};
use crate::api::EndpointBody;
use crate::api::block::GB;
use crate::api::mongodb::{
    CreateInstanceRequest, CreateVolume, Instance, InstanceStatus, MongoDbApi,
    UpdateInstanceRequest, UpgradeInstanceRequest,
};
use async_trait::async_trait;
use scwflow_cloud::endpoint::{self, EndpointBackend};
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, Diagnostics, Endpoint, EndpointSpec, Meta, MutationGroup,
    MutationTable, OpContext, PlanAdjustment, RegionalId, Resource, Result, Schema, Until, Waiter,
    forbid_shrink,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MUTATIONS: MutationTable = &[
    (MutationGroup::Metadata, &["name", "tags"]),
    (MutationGroup::Scaling, &["volume_size_in_gb", "node_number"]),
    (MutationGroup::Endpoints, &["private_network"]),
];

const DEFAULT_VOLUME_TYPE: &str = "sbs_5k";
const DEFAULT_VOLUME_GB: u64 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InstanceSpec {
    pub name: Option<String>,
    pub version: String,
    pub node_type: String,
    pub node_number: u32,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub volume_type: Option<String>,
    pub volume_size_in_gb: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub private_network: Option<Vec<PrivateNetwork>>,
    pub project_id: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceState {
    pub name: String,
    pub version: String,
    pub node_type: String,
    pub node_number: u32,
    pub volume_type: String,
    pub volume_size_in_gb: u64,
    pub tags: Vec<String>,
    pub private_network: Vec<PrivateNetwork>,
    pub public_network: Option<PublicNetwork>,
    pub project_id: String,
    pub region: String,
    pub status: String,
    pub created_at: Option<String>,
}

impl From<Instance> for InstanceState {
    fn from(i: Instance) -> Self {
        let (private_network, public_network) = endpoint_state(&i.region, &i.endpoints);
        let (volume_type, volume_size_in_gb) = i
            .volume
            .map(|v| (v.volume_type, v.size / GB))
            .unwrap_or_default();
        Self {
            name: i.name,
            version: i.version,
            node_type: i.node_type,
            node_number: i.node_amount,
            volume_type,
            volume_size_in_gb,
            tags: i.tags,
            private_network,
            public_network,
            project_id: i.project_id,
            region: i.region,
            status: i.status.to_string(),
            created_at: i.created_at.map(|t| t.to_rfc3339()),
        }
    }
}

pub(crate) async fn wait_instance(
    ctx: &OpContext,
    meta: &Meta,
    api: &dyn MongoDbApi,
    region: &str,
    id: &str,
) -> Result<Instance> {
    Waiter::new(ctx, meta, format!("mongodb instance {}/{}", region, id))
        .until(Until::one(InstanceStatus::Ready), move || {
            api.get_mongodb_instance(region, id)
        })
        .await
}

struct InstanceEndpoints<'a> {
    api: &'a dyn MongoDbApi,
    meta: &'a Meta,
    region: &'a str,
    id: &'a str,
}

#[async_trait]
impl<'a> EndpointBackend for InstanceEndpoints<'a> {
    fn parent(&self) -> String {
        format!("mongodb instance {}/{}", self.region, self.id)
    }

    async fn observed(&self, _ctx: &OpContext) -> Result<Vec<Endpoint>> {
        let instance = self.api.get_mongodb_instance(self.region, self.id).await?;
        Ok(instance.endpoints.iter().map(|e| e.to_endpoint()).collect())
    }

    async fn create(&self, _ctx: &OpContext, spec: &EndpointSpec) -> Result<()> {
        self.api
            .create_mongodb_endpoint(self.region, self.id, &EndpointBody::from(spec))
            .await
    }

    async fn delete(&self, _ctx: &OpContext, endpoint: &Endpoint) -> Result<()> {
        self.api.delete_mongodb_endpoint(self.region, &endpoint.id).await
    }

    async fn wait_ready(&self, ctx: &OpContext) -> Result<()> {
        wait_instance(ctx, self.meta, self.api, self.region, self.id).await?;
        Ok(())
    }

    fn default_endpoint(&self) -> Option<EndpointSpec> {
        Some(EndpointSpec::public())
    }
}

pub struct MongoDbInstance {
    api: Arc<dyn MongoDbApi>,
    ipam: Arc<dyn IpamApi>,
}

impl MongoDbInstance {
    pub fn new(api: Arc<dyn MongoDbApi>, ipam: Arc<dyn IpamApi>) -> Self {
        Self { api, ipam }
    }
}

#[async_trait]
impl Resource for MongoDbInstance {
    type Spec = InstanceSpec;
    type State = InstanceState;

    fn type_name(&self) -> &'static str {
        "scaleway_mongodb_instance"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::optional_computed(AttributeType::String))
            .with_attribute(
                "version",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute(
                "node_type",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute(
                "node_number",
                Attribute::required(AttributeType::Integer).describe("Can only grow"),
            )
            .with_attribute(
                "user_name",
                Attribute::optional(AttributeType::String).force_new(),
            )
            .with_attribute(
                "password",
                Attribute::optional(AttributeType::String)
                    .sensitive()
                    .force_new(),
            )
            .with_attribute(
                "volume_type",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .with_attribute(
                "volume_size_in_gb",
                Attribute::optional_computed(AttributeType::Integer).describe("Can only grow"),
            )
            .with_attribute("tags", Attribute::optional(string_list()))
            .with_attribute("private_network", private_network_attribute())
            .with_attribute("public_network", public_network_attribute())
            .with_attribute(
                "project_id",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .with_attribute("status", Attribute::computed(AttributeType::String))
            .with_attribute("created_at", Attribute::computed(AttributeType::String))
            .regional()
    }

    async fn create(&self, _ctx: &OpContext, meta: &Meta, spec: &InstanceSpec) -> Result<String> {
        let region = meta.region(spec.region.as_deref())?;
        let mut endpoints = desired_endpoints(spec.private_network.as_deref());
        endpoint::validate(&endpoints, region.as_str())?;
        if endpoints.is_empty() {
            endpoints.push(EndpointSpec::public());
        }

        let req = CreateInstanceRequest {
            project_id: meta.project_id(spec.project_id.as_deref()),
            name: spec.name.clone().unwrap_or_else(|| default_name("mongodb")),
            version: spec.version.clone(),
            node_type: spec.node_type.clone(),
            node_amount: spec.node_number,
            user_name: spec.user_name.clone().unwrap_or_default(),
            password: spec.password.clone().unwrap_or_default(),
            volume: CreateVolume {
                volume_type: spec
                    .volume_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VOLUME_TYPE.to_string()),
                volume_size: spec.volume_size_in_gb.unwrap_or(DEFAULT_VOLUME_GB) * GB,
            },
            tags: spec.tags.clone().unwrap_or_default(),
            endpoints: endpoints.iter().map(EndpointBody::from).collect(),
        };
        let instance = self.api.create_mongodb_instance(region.as_str(), &req).await?;
        Ok(RegionalId::new(region, instance.id).to_string())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        wait_instance(ctx, meta, self.api.as_ref(), id.region.as_str(), &id.id).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        let (api, region, uuid) = (self.api.as_ref(), id.region.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("mongodb instance {}", id))
            .until(Until::Terminal, move || api.get_mongodb_instance(region, uuid))
            .await?;
        Ok(())
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        diags: &mut Diagnostics,
    ) -> Result<InstanceState> {
        let id = RegionalId::parse(id)?;
        let mut state: InstanceState = self
            .api
            .get_mongodb_instance(id.region.as_str(), &id.id)
            .await?
            .into();
        fill_ipam_ips(
            self.ipam.as_ref(),
            id.region.as_str(),
            ipam::MONGODB_INSTANCE,
            &id.id,
            &mut state.private_network,
            diags,
        )
        .await?;
        Ok(state)
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        _prior: &InstanceState,
        spec: &InstanceSpec,
        changes: &ChangeSet,
    ) -> Result<()> {
        let id = RegionalId::parse(id)?;
        let (api, region, uuid) = (self.api.as_ref(), id.region.as_str(), id.id.as_str());

        for (group, attrs) in changes.partition(MUTATIONS) {
            ctx.check("mongodb instance update")?;
            match group {
                MutationGroup::Metadata => {
                    let req = UpdateInstanceRequest {
                        name: spec.name.clone().filter(|_| changes.has("name")),
                        tags: spec.tags.clone().filter(|_| changes.has("tags")),
                    };
                    api.update_mongodb_instance(region, uuid, &req).await?;
                    wait_instance(ctx, meta, api, region, uuid).await?;
                }
                MutationGroup::Scaling => {
                    for attr in attrs {
                        let req = match (attr, spec.volume_size_in_gb) {
                            ("volume_size_in_gb", Some(gb)) => {
                                UpgradeInstanceRequest::VolumeSize(gb * GB)
                            }
                            ("volume_size_in_gb", None) => continue,
                            _ => UpgradeInstanceRequest::NodeAmount(spec.node_number),
                        };
                        ctx.check("mongodb instance upgrade")?;
                        tracing::info!("Upgrading mongodb instance {}: {:?}", id, req);
                        api.upgrade_mongodb_instance(region, uuid, &req).await?;
                        wait_instance(ctx, meta, api, region, uuid).await?;
                    }
                }
                MutationGroup::Endpoints => {
                    let desired = desired_endpoints(spec.private_network.as_deref());
                    endpoint::validate(&desired, region)?;
                    let backend = InstanceEndpoints {
                        api,
                        meta,
                        region,
                        id: uuid,
                    };
                    endpoint::reconcile(ctx, &backend, &desired).await?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn delete(&self, _ctx: &OpContext, _meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        self.api
            .delete_mongodb_instance(id.region.as_str(), &id.id)
            .await
    }

    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        let (api, region, uuid) = (self.api.as_ref(), id.region.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("mongodb instance {}", id))
            .until_absent(move || api.get_mongodb_instance(region, uuid))
            .await
    }

    fn customize_diff(
        &self,
        prior: Option<&InstanceState>,
        desired: &InstanceSpec,
        plan: &mut PlanAdjustment,
    ) {
        let checks = [
            forbid_shrink(
                "node_number",
                prior.and_then(|p| signed(Some(p.node_number.into()))),
                signed(Some(desired.node_number.into())),
            ),
            forbid_shrink(
                "volume_size_in_gb",
                prior.and_then(|p| signed(Some(p.volume_size_in_gb))),
                signed(desired.volume_size_in_gb),
            ),
        ];
        for check in checks {
            if let Err(e) = check {
                plan.reject(e);
            }
        }

        // An undeclared region on create is checked by create itself, once
        // the provider default applies.
        let region = desired.region.clone().or_else(|| prior.map(|p| p.region.clone()));
        if let Some(region) = region {
            let endpoints = desired_endpoints(desired.private_network.as_deref());
            if let Err(e) = endpoint::validate(&endpoints, &region) {
                plan.reject(e);
            }
        }
    }
}
