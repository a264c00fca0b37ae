//! `scaleway_documentdb_instance`
//!
//! The engine is `<name>-<major>[.<minor>]`. Moving to another major
//! version replaces the instance; anything else is upgraded in place.
//! Endpoints move between private networks with one migrate call.

use super::{
    PrivateNetwork, PublicNetwork, default_name, desired_endpoints, endpoint_state,
    private_network_attribute, public_network_attribute, signed, string_list,
};
use crate::api::EndpointBody;
use crate::api::block::GB;
use crate::api::documentdb::{
    CreateInstanceRequest, DocumentDbApi, Instance, InstanceStatus, UpdateInstanceRequest,
    UpgradeInstanceRequest,
};
use async_trait::async_trait;
use scwflow_cloud::endpoint::{self, EndpointBackend};
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, Diagnostics, Endpoint, EndpointSpec, Meta, MutationGroup,
    MutationTable, OpContext, PlanAdjustment, RegionalId, Resource, Result, Schema, Timeouts, Until,
    Waiter, forbid_shrink,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const MUTATIONS: MutationTable = &[
    (MutationGroup::Metadata, &["name", "tags"]),
    (MutationGroup::Scaling, &["engine", "node_type", "volume_size_in_gb"]),
    (MutationGroup::Endpoints, &["private_network"]),
];

const DEFAULT_VOLUME_TYPE: &str = "bssd";
const DEFAULT_VOLUME_GB: u64 = 5;

/// Engine name and major version: `FerretDB-1.24` → `("FerretDB", "1")`.
pub fn engine_major(engine: &str) -> (&str, &str) {
    let (name, version) = engine.rsplit_once('-').unwrap_or((engine, ""));
    (name, version.split('.').next().unwrap_or(""))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InstanceSpec {
    pub name: Option<String>,
    pub engine: String,
    pub node_type: String,
    pub is_ha_cluster: Option<bool>,
    pub user_name: String,
    pub password: String,
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
    pub engine: String,
    pub node_type: String,
    pub is_ha_cluster: bool,
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
            engine: i.engine,
            node_type: i.node_type,
            is_ha_cluster: i.is_ha_cluster,
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

/// Waits for the instance to accept calls again. Users and privileges use
/// it to settle after a conflict.
pub(crate) async fn wait_instance(
    ctx: &OpContext,
    meta: &Meta,
    api: &dyn DocumentDbApi,
    region: &str,
    id: &str,
) -> Result<Instance> {
    Waiter::new(ctx, meta, format!("documentdb instance {}/{}", region, id))
        .until(Until::one(InstanceStatus::Ready), move || {
            api.get_documentdb_instance(region, id)
        })
        .await
}

/// Waits for the instance to leave its transient statuses, landing in error
/// or locked included.
pub(crate) async fn settle_instance(
    ctx: &OpContext,
    meta: &Meta,
    api: &dyn DocumentDbApi,
    region: &str,
    id: &str,
) -> Result<()> {
    Waiter::new(ctx, meta, format!("documentdb instance {}/{}", region, id))
        .until(Until::Terminal, move || api.get_documentdb_instance(region, id))
        .await?;
    Ok(())
}

struct InstanceEndpoints<'a> {
    api: &'a dyn DocumentDbApi,
    meta: &'a Meta,
    region: &'a str,
    id: &'a str,
}

#[async_trait]
impl<'a> EndpointBackend for InstanceEndpoints<'a> {
    fn parent(&self) -> String {
        format!("documentdb instance {}/{}", self.region, self.id)
    }

    async fn observed(&self, _ctx: &OpContext) -> Result<Vec<Endpoint>> {
        let instance = self.api.get_documentdb_instance(self.region, self.id).await?;
        Ok(instance.endpoints.iter().map(|e| e.to_endpoint()).collect())
    }

    async fn create(&self, _ctx: &OpContext, spec: &EndpointSpec) -> Result<()> {
        self.api
            .create_documentdb_endpoint(self.region, self.id, &EndpointBody::from(spec))
            .await
    }

    async fn delete(&self, _ctx: &OpContext, endpoint: &Endpoint) -> Result<()> {
        self.api
            .delete_documentdb_endpoint(self.region, &endpoint.id)
            .await
    }

    fn supports_migrate(&self) -> bool {
        true
    }

    async fn migrate(&self, _ctx: &OpContext, endpoint: &Endpoint, spec: &EndpointSpec) -> Result<()> {
        self.api
            .migrate_documentdb_endpoint(self.region, &endpoint.id, &EndpointBody::from(spec))
            .await
    }

    async fn wait_ready(&self, ctx: &OpContext) -> Result<()> {
        wait_instance(ctx, self.meta, self.api, self.region, self.id).await?;
        Ok(())
    }

    fn default_endpoint(&self) -> Option<EndpointSpec> {
        Some(EndpointSpec::public())
    }
}

pub struct DocumentDbInstance {
    api: Arc<dyn DocumentDbApi>,
}

impl DocumentDbInstance {
    pub fn new(api: Arc<dyn DocumentDbApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for DocumentDbInstance {
    type Spec = InstanceSpec;
    type State = InstanceState;

    fn type_name(&self) -> &'static str {
        "scaleway_documentdb_instance"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::optional_computed(AttributeType::String))
            .with_attribute(
                "engine",
                Attribute::required(AttributeType::String)
                    .describe("Changing the major version replaces the instance"),
            )
            .with_attribute("node_type", Attribute::required(AttributeType::String))
            .with_attribute(
                "is_ha_cluster",
                Attribute::optional_computed(AttributeType::Boolean).force_new(),
            )
            .with_attribute(
                "user_name",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute(
                "password",
                Attribute::required(AttributeType::String)
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
            .with_timeouts(Timeouts::uniform(Duration::from_secs(15 * 60)))
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
            name: spec.name.clone().unwrap_or_else(|| default_name("documentdb")),
            engine: spec.engine.clone(),
            user_name: spec.user_name.clone(),
            password: spec.password.clone(),
            node_type: spec.node_type.clone(),
            is_ha_cluster: spec.is_ha_cluster.unwrap_or(false),
            tags: spec.tags.clone().unwrap_or_default(),
            volume_type: spec
                .volume_type
                .clone()
                .unwrap_or_else(|| DEFAULT_VOLUME_TYPE.to_string()),
            volume_size: spec.volume_size_in_gb.unwrap_or(DEFAULT_VOLUME_GB) * GB,
            init_endpoints: endpoints.iter().map(EndpointBody::from).collect(),
        };
        let instance = self
            .api
            .create_documentdb_instance(region.as_str(), &req)
            .await?;
        Ok(RegionalId::new(region, instance.id).to_string())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        wait_instance(ctx, meta, self.api.as_ref(), id.region.as_str(), &id.id).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        settle_instance(ctx, meta, self.api.as_ref(), id.region.as_str(), &id.id).await
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        _diags: &mut Diagnostics,
    ) -> Result<InstanceState> {
        let id = RegionalId::parse(id)?;
        Ok(self
            .api
            .get_documentdb_instance(id.region.as_str(), &id.id)
            .await?
            .into())
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
            ctx.check("documentdb instance update")?;
            match group {
                MutationGroup::Metadata => {
                    let req = UpdateInstanceRequest {
                        name: spec.name.clone().filter(|_| changes.has("name")),
                        tags: spec.tags.clone().filter(|_| changes.has("tags")),
                    };
                    api.update_documentdb_instance(region, uuid, &req).await?;
                    wait_instance(ctx, meta, api, region, uuid).await?;
                }
                MutationGroup::Scaling => {
                    for attr in attrs {
                        let req = match attr {
                            "engine" => UpgradeInstanceRequest::Engine(spec.engine.clone()),
                            "node_type" => UpgradeInstanceRequest::NodeType(spec.node_type.clone()),
                            _ => match spec.volume_size_in_gb {
                                Some(gb) => UpgradeInstanceRequest::VolumeSize(gb * GB),
                                None => continue,
                            },
                        };
                        ctx.check("documentdb instance upgrade")?;
                        tracing::info!("Upgrading documentdb instance {}: {:?}", id, req);
                        api.upgrade_documentdb_instance(region, uuid, &req).await?;
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
            .delete_documentdb_instance(id.region.as_str(), &id.id)
            .await
    }

    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        let (api, region, uuid) = (self.api.as_ref(), id.region.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("documentdb instance {}", id))
            .until_absent(move || api.get_documentdb_instance(region, uuid))
            .await
    }

    fn customize_diff(
        &self,
        prior: Option<&InstanceState>,
        desired: &InstanceSpec,
        plan: &mut PlanAdjustment,
    ) {
        if let Some(prior) = prior {
            if !prior.engine.is_empty()
                && engine_major(&prior.engine) != engine_major(&desired.engine)
            {
                plan.replace("engine");
            }
        }
        if let Err(e) = forbid_shrink(
            "volume_size_in_gb",
            prior.and_then(|p| signed(Some(p.volume_size_in_gb))),
            signed(desired.volume_size_in_gb),
        ) {
            plan.reject(e);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCloud, meta};
    use scwflow_cloud::{Lifecycle, ResourceData, ResourceHandler};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    fn config(extra: Value) -> Value {
        let mut base = json!({
            "name": "ferret",
            "engine": "FerretDB-1",
            "node_type": "DOCDB-PLAY2-PICO",
            "user_name": "admin",
            "password": "Sup3rSecret!",
            "volume_size_in_gb": 5,
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        base
    }

    async fn created(cloud: &Arc<FakeCloud>, extra: Value) -> (Lifecycle<DocumentDbInstance>, ResourceData) {
        let lc = Lifecycle::new(DocumentDbInstance::new(cloud.clone()));
        let resp = lc.create(&CancellationToken::new(), &meta(), config(extra)).await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        (lc, resp.state.unwrap())
    }

    #[test]
    fn test_engine_major() {
        assert_eq!(engine_major("FerretDB-1"), ("FerretDB", "1"));
        assert_eq!(engine_major("FerretDB-1.24"), ("FerretDB", "1"));
        assert_eq!(engine_major("FerretDB-2.0"), ("FerretDB", "2"));
    }

    #[tokio::test]
    async fn test_engine_major_change_replaces_minor_upgrades() {
        let cloud = Arc::new(FakeCloud::new());
        let (lc, state) = created(&cloud, json!({})).await;

        let major = lc.plan(&meta(), config(json!({"engine": "FerretDB-2"})), Some(&state)).await;
        assert_eq!(major.requires_replace, vec!["engine".to_string()]);

        let minor = lc
            .plan(&meta(), config(json!({"engine": "FerretDB-1.24"})), Some(&state))
            .await;
        assert!(minor.requires_replace.is_empty());

        let resp = lc
            .update(
                &CancellationToken::new(),
                &meta(),
                config(json!({"engine": "FerretDB-1.24"})),
                &state,
            )
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        assert_eq!(resp.state.unwrap().attributes["engine"], "FerretDB-1.24");
        assert_eq!(cloud.count("upgrade_documentdb_instance"), 1);
    }

    #[tokio::test]
    async fn test_network_move_is_one_migrate_call() {
        let cloud = Arc::new(FakeCloud::new());
        let (lc, state) = created(
            &cloud,
            json!({"private_network": [{"id": "fr-par/pn-aaaa"}]}),
        )
        .await;
        let endpoint_id = state.attributes["private_network"][0]["endpoint_id"].clone();
        cloud.clear_calls();

        let resp = lc
            .update(
                &CancellationToken::new(),
                &meta(),
                config(json!({"private_network": [{"id": "fr-par/pn-bbbb"}]})),
                &state,
            )
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        let state = resp.state.unwrap();
        assert_eq!(state.attributes["private_network"][0]["id"], "fr-par/pn-bbbb");
        assert_eq!(state.attributes["private_network"][0]["endpoint_id"], endpoint_id);
        assert_eq!(cloud.count("migrate_documentdb_endpoint"), 1);
        assert_eq!(cloud.count("delete_documentdb_endpoint"), 0);
        assert_eq!(cloud.count("create_documentdb_endpoint"), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_wait_keeps_id() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_busy_polls(1_000);
        let lc = Lifecycle::new(DocumentDbInstance::new(cloud.clone()));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let resp = lc.create(&cancel, &meta(), config(json!({}))).await;
        let state = resp.state.expect("created instance keeps its id");
        assert!(state.id.starts_with("fr-par/"));
        assert_eq!(resp.diagnostics.iter().next().unwrap().summary, "cancelled");
    }

    #[tokio::test]
    async fn test_instance_in_error_is_deletable() {
        let cloud = Arc::new(FakeCloud::new());
        let lc = Lifecycle::new(DocumentDbInstance::new(cloud.clone()));
        let cancel = CancellationToken::new();
        cloud.fail_next_create();
        let created = lc.create(&cancel, &meta(), config(json!({}))).await;
        assert!(created.has_errors());
        let failed = created.state.unwrap();
        assert!(!failed.id.is_empty());

        let deleted = lc.delete(&cancel, &meta(), &failed).await;
        assert!(!deleted.has_errors(), "{:?}", deleted.diagnostics);
        assert!(deleted.state.is_none());
        assert_eq!(cloud.count("delete_documentdb_instance"), 1);
    }
}
