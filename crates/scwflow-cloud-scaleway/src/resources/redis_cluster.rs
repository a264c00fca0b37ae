//! `scaleway_redis_cluster`
//!
//! Updates run group by group in this order: metadata, migrations (one
//! attribute per call, the server refuses combined ones), ACL rules,
//! settings, then private network endpoints. The cluster is waited for
//! between every call. Without a declared private network the cluster keeps
//! a public endpoint. Addresses of IPAM-provisioned private networks are
//! read back from IPAM.

use super::{
    PrivateNetwork, PublicNetwork, default_name, desired_endpoints, endpoint_state,
    fill_ipam_ips, private_network_attribute, public_network_attribute, signed, string_list,
};
use crate::api::ipam::{self, IpamApi};
use crate::api::EndpointBody;
use crate::api::redis::{
    AclRule, Cluster, ClusterSetting, ClusterStatus, CreateClusterRequest, MigrateClusterRequest,
    RedisApi, UpdateClusterRequest,
};
use async_trait::async_trait;
use scwflow_cloud::endpoint::{self, EndpointBackend};
use scwflow_cloud::sets::replace_all;
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, Diagnostics, Endpoint, EndpointSpec, Meta, MutationGroup,
    MutationTable, OpContext, PlanAdjustment, Resource, Result, Schema, Timeouts, Until, Waiter,
    ZonedId, forbid_shrink,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const MUTATIONS: MutationTable = &[
    (MutationGroup::Metadata, &["name", "tags", "user_name", "password"]),
    (MutationGroup::Scaling, &["version", "node_type", "cluster_size"]),
    (MutationGroup::AccessControl, &["acl"]),
    (MutationGroup::Settings, &["settings"]),
    (MutationGroup::Endpoints, &["private_network"]),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct Acl {
    pub ip: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSpec {
    pub name: Option<String>,
    pub version: String,
    pub node_type: String,
    pub user_name: String,
    pub password: String,
    pub cluster_size: Option<u32>,
    pub tls_enabled: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub acl: Option<Vec<Acl>>,
    pub settings: Option<BTreeMap<String, String>>,
    pub private_network: Option<Vec<PrivateNetwork>>,
    pub project_id: Option<String>,
    pub zone: Option<String>,
}

impl ClusterSpec {
    /// Whether the declared rules differ from `observed`. An omitted
    /// description reads back as empty and rule order is not kept.
    fn acl_differs(&self, observed: &[Acl]) -> bool {
        let mut desired = self.acl.clone().unwrap_or_default();
        let mut observed = observed.to_vec();
        desired.sort();
        observed.sort();
        desired != observed
    }

    fn acl_rules(&self) -> Vec<AclRule> {
        self.acl
            .iter()
            .flatten()
            .map(|a| AclRule {
                id: None,
                ip_cidr: a.ip.clone(),
                description: a.description.clone(),
            })
            .collect()
    }

    fn cluster_settings(&self) -> Vec<ClusterSetting> {
        self.settings
            .iter()
            .flatten()
            .map(|(name, value)| ClusterSetting {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

/// Observed cluster. `user_name` and `password` are never returned by the
/// API and are kept from the previous record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterState {
    pub name: String,
    pub version: String,
    pub node_type: String,
    pub cluster_size: u32,
    pub tls_enabled: bool,
    pub tags: Vec<String>,
    pub acl: Vec<Acl>,
    pub settings: BTreeMap<String, String>,
    pub private_network: Vec<PrivateNetwork>,
    pub public_network: Option<PublicNetwork>,
    pub project_id: String,
    pub zone: String,
    pub status: String,
    pub created_at: Option<String>,
}

impl From<Cluster> for ClusterState {
    fn from(c: Cluster) -> Self {
        let (private_network, public_network) = endpoint_state(&c.zone, &c.endpoints);
        Self {
            name: c.name,
            version: c.version,
            node_type: c.node_type,
            cluster_size: c.cluster_size,
            tls_enabled: c.tls_enabled,
            tags: c.tags,
            acl: c
                .acl_rules
                .into_iter()
                .map(|r| Acl {
                    ip: r.ip_cidr,
                    description: r.description,
                })
                .collect(),
            settings: c
                .cluster_settings
                .into_iter()
                .map(|s| (s.name, s.value))
                .collect(),
            private_network,
            public_network,
            project_id: c.project_id,
            zone: c.zone,
            status: c.status.to_string(),
            created_at: c.created_at.map(|t| t.to_rfc3339()),
        }
    }
}

pub(crate) async fn wait_cluster(
    ctx: &OpContext,
    meta: &Meta,
    api: &dyn RedisApi,
    zone: &str,
    id: &str,
) -> Result<Cluster> {
    Waiter::new(ctx, meta, format!("redis cluster {}/{}", zone, id))
        .until(Until::one(ClusterStatus::Ready), move || api.get_cluster(zone, id))
        .await
}

/// Endpoint calls of one cluster.
struct ClusterEndpoints<'a> {
    api: &'a dyn RedisApi,
    meta: &'a Meta,
    zone: &'a str,
    id: &'a str,
}

#[async_trait]
impl<'a> EndpointBackend for ClusterEndpoints<'a> {
    fn parent(&self) -> String {
        format!("redis cluster {}/{}", self.zone, self.id)
    }

    async fn observed(&self, _ctx: &OpContext) -> Result<Vec<Endpoint>> {
        let cluster = self.api.get_cluster(self.zone, self.id).await?;
        Ok(cluster.endpoints.iter().map(|e| e.to_endpoint()).collect())
    }

    async fn create(&self, _ctx: &OpContext, spec: &EndpointSpec) -> Result<()> {
        self.api
            .add_cluster_endpoints(self.zone, self.id, &[EndpointBody::from(spec)])
            .await
    }

    async fn delete(&self, _ctx: &OpContext, endpoint: &Endpoint) -> Result<()> {
        self.api.delete_cluster_endpoint(self.zone, &endpoint.id).await
    }

    async fn wait_ready(&self, ctx: &OpContext) -> Result<()> {
        wait_cluster(ctx, self.meta, self.api, self.zone, self.id).await?;
        Ok(())
    }

    fn default_endpoint(&self) -> Option<EndpointSpec> {
        Some(EndpointSpec::public())
    }
}

pub struct RedisCluster {
    api: Arc<dyn RedisApi>,
    ipam: Arc<dyn IpamApi>,
}

impl RedisCluster {
    pub fn new(api: Arc<dyn RedisApi>, ipam: Arc<dyn IpamApi>) -> Self {
        Self { api, ipam }
    }

    async fn migrate(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        zone: &str,
        id: &str,
        req: MigrateClusterRequest,
    ) -> Result<()> {
        ctx.check("redis cluster migration")?;
        tracing::info!("Migrating redis cluster {}/{}: {:?}", zone, id, req);
        self.api.migrate_cluster(zone, id, &req).await?;
        wait_cluster(ctx, meta, self.api.as_ref(), zone, id).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for RedisCluster {
    type Spec = ClusterSpec;
    type State = ClusterState;

    fn type_name(&self) -> &'static str {
        "scaleway_redis_cluster"
    }

    fn schema(&self) -> Schema {
        let mut acl = BTreeMap::new();
        acl.insert("ip".to_string(), Attribute::required(AttributeType::String));
        acl.insert(
            "description".to_string(),
            Attribute::optional(AttributeType::String),
        );

        Schema::v0()
            .with_attribute("name", Attribute::optional_computed(AttributeType::String))
            .with_attribute("version", Attribute::required(AttributeType::String))
            .with_attribute("node_type", Attribute::required(AttributeType::String))
            .with_attribute("user_name", Attribute::required(AttributeType::String))
            .with_attribute(
                "password",
                Attribute::required(AttributeType::String).sensitive(),
            )
            .with_attribute(
                "cluster_size",
                Attribute::optional_computed(AttributeType::Integer)
                    .describe("Number of nodes; can only grow"),
            )
            .with_attribute(
                "tls_enabled",
                Attribute::optional_computed(AttributeType::Boolean).force_new(),
            )
            .with_attribute("tags", Attribute::optional(string_list()))
            .with_attribute(
                "acl",
                Attribute::optional(AttributeType::Set {
                    element: Box::new(AttributeType::Object { attributes: acl }),
                }),
            )
            .with_attribute("settings", Attribute::optional(AttributeType::Map))
            .with_attribute("private_network", private_network_attribute())
            .with_attribute("public_network", public_network_attribute())
            .with_attribute(
                "project_id",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .with_attribute("status", Attribute::computed(AttributeType::String))
            .with_attribute("created_at", Attribute::computed(AttributeType::String))
            .with_timeouts(Timeouts::uniform(Duration::from_secs(15 * 60)))
            .zoned()
    }

    async fn create(&self, _ctx: &OpContext, meta: &Meta, spec: &ClusterSpec) -> Result<String> {
        let zone = meta.zone(spec.zone.as_deref())?;
        let mut endpoints = desired_endpoints(spec.private_network.as_deref());
        endpoint::validate(&endpoints, zone.as_str())?;
        if endpoints.is_empty() {
            endpoints.push(EndpointSpec::public());
        }

        let req = CreateClusterRequest {
            project_id: meta.project_id(spec.project_id.as_deref()),
            name: spec.name.clone().unwrap_or_else(|| default_name("redis")),
            version: spec.version.clone(),
            node_type: spec.node_type.clone(),
            user_name: spec.user_name.clone(),
            password: spec.password.clone(),
            cluster_size: spec.cluster_size,
            tls_enabled: spec.tls_enabled.unwrap_or(false),
            tags: spec.tags.clone().unwrap_or_default(),
            acl_rules: spec.acl_rules(),
            cluster_settings: spec.cluster_settings(),
            endpoints: endpoints.iter().map(EndpointBody::from).collect(),
        };
        let cluster = self.api.create_cluster(zone.as_str(), &req).await?;
        Ok(ZonedId::new(zone, cluster.id).to_string())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        wait_cluster(ctx, meta, self.api.as_ref(), id.zone.as_str(), &id.id).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let (api, zone, uuid) = (self.api.as_ref(), id.zone.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("redis cluster {}", id))
            .until(Until::Terminal, move || api.get_cluster(zone, uuid))
            .await?;
        Ok(())
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        diags: &mut Diagnostics,
    ) -> Result<ClusterState> {
        let id = ZonedId::parse(id)?;
        let mut state: ClusterState = self.api.get_cluster(id.zone.as_str(), &id.id).await?.into();
        fill_ipam_ips(
            self.ipam.as_ref(),
            id.zone.region().as_str(),
            ipam::REDIS_CLUSTER,
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
        prior: &ClusterState,
        spec: &ClusterSpec,
        changes: &ChangeSet,
    ) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let (api, zone, uuid) = (self.api.as_ref(), id.zone.as_str(), id.id.as_str());

        for (group, attrs) in changes.partition(MUTATIONS) {
            ctx.check("redis cluster update")?;
            match group {
                MutationGroup::Metadata => {
                    let req = UpdateClusterRequest {
                        name: spec.name.clone().filter(|_| changes.has("name")),
                        tags: spec.tags.clone().filter(|_| changes.has("tags")),
                        user_name: changes.has("user_name").then(|| spec.user_name.clone()),
                        password: changes.has("password").then(|| spec.password.clone()),
                    };
                    api.update_cluster(zone, uuid, &req).await?;
                    wait_cluster(ctx, meta, api, zone, uuid).await?;
                }
                MutationGroup::Scaling => {
                    for attr in attrs {
                        let req = match attr {
                            "version" => MigrateClusterRequest::Version(spec.version.clone()),
                            "node_type" => MigrateClusterRequest::NodeType(spec.node_type.clone()),
                            _ => match spec.cluster_size {
                                Some(size) => MigrateClusterRequest::ClusterSize(size),
                                None => continue,
                            },
                        };
                        self.migrate(ctx, meta, zone, uuid, req).await?;
                    }
                }
                MutationGroup::AccessControl => {
                    if !spec.acl_differs(&prior.acl) {
                        continue;
                    }
                    let rules = spec.acl_rules();
                    replace_all(
                        ctx,
                        &format!("ACL rules of redis cluster {}", id),
                        move || async move { wait_cluster(ctx, meta, api, zone, uuid).await.map(|_| ()) },
                        || api.set_acl_rules(zone, uuid, &rules),
                    )
                    .await?;
                }
                MutationGroup::Settings => {
                    let settings = spec.cluster_settings();
                    replace_all(
                        ctx,
                        &format!("settings of redis cluster {}", id),
                        move || async move { wait_cluster(ctx, meta, api, zone, uuid).await.map(|_| ()) },
                        || api.set_cluster_settings(zone, uuid, &settings),
                    )
                    .await?;
                }
                MutationGroup::Endpoints => {
                    let desired = desired_endpoints(spec.private_network.as_deref());
                    endpoint::validate(&desired, zone)?;
                    let backend = ClusterEndpoints {
                        api,
                        meta,
                        zone,
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
        let id = ZonedId::parse(id)?;
        self.api.delete_cluster(id.zone.as_str(), &id.id).await
    }

    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = ZonedId::parse(id)?;
        let (api, zone, uuid) = (self.api.as_ref(), id.zone.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("redis cluster {}", id))
            .until_absent(move || api.get_cluster(zone, uuid))
            .await
    }

    fn customize_diff(
        &self,
        prior: Option<&ClusterState>,
        desired: &ClusterSpec,
        plan: &mut PlanAdjustment,
    ) {
        if let Err(e) = forbid_shrink(
            "cluster_size",
            prior.and_then(|p| signed(Some(p.cluster_size.into()))),
            signed(desired.cluster_size.map(u64::from)),
        ) {
            plan.reject(e);
        }

        // An undeclared zone on create is checked by create itself, once
        // the provider default applies.
        let zone = desired.zone.clone().or_else(|| prior.map(|p| p.zone.clone()));
        if let Some(zone) = zone {
            let endpoints = desired_endpoints(desired.private_network.as_deref());
            if let Err(e) = endpoint::validate(&endpoints, &zone) {
                plan.reject(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCloud, meta};
    use scwflow_cloud::{Lifecycle, ResourceData, ResourceHandler, Severity};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    fn config(extra: Value) -> Value {
        let mut base = json!({
            "name": "cache",
            "version": "7.0.5",
            "node_type": "RED1-XS",
            "user_name": "admin",
            "password": "Sup3rSecret!",
            "cluster_size": 1,
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        base
    }

    async fn created(cloud: &Arc<FakeCloud>, extra: Value) -> (Lifecycle<RedisCluster>, ResourceData) {
        let lc = Lifecycle::new(RedisCluster::new(cloud.clone(), cloud.clone()));
        let resp = lc.create(&CancellationToken::new(), &meta(), config(extra)).await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        (lc, resp.state.unwrap())
    }

    #[tokio::test]
    async fn test_create_defaults_to_public_endpoint() {
        let cloud = Arc::new(FakeCloud::new());
        let (_, state) = created(&cloud, json!({})).await;
        assert_eq!(state.attributes["status"], "ready");
        assert_eq!(state.attributes["private_network"], json!([]));
        assert!(state.attributes["public_network"]["endpoint_id"].is_string());
        // Inputs the API never returns are kept.
        assert_eq!(state.attributes["password"], "Sup3rSecret!");
        assert_eq!(state.attributes["user_name"], "admin");
    }

    #[tokio::test]
    async fn test_private_network_migration_a_to_b() {
        let cloud = Arc::new(FakeCloud::new());
        let (lc, state) = created(
            &cloud,
            json!({"private_network": [{"id": "fr-par-1/pn-aaaa", "service_ips": ["10.12.1.1/20"]}]}),
        )
        .await;
        assert!(state.attributes["public_network"].is_null());
        cloud.clear_calls();

        let resp = lc
            .update(
                &CancellationToken::new(),
                &meta(),
                config(json!({"private_network": [{"id": "fr-par-1/pn-bbbb"}]})),
                &state,
            )
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        let state = resp.state.unwrap();
        let networks = state.attributes["private_network"].as_array().unwrap().clone();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0]["id"], "fr-par-1/pn-bbbb");

        let mutations: Vec<String> = cloud
            .calls()
            .into_iter()
            .filter(|c| c.contains("endpoint"))
            .collect();
        assert_eq!(mutations.len(), 2);
        assert!(mutations[0].starts_with("delete_cluster_endpoint"));
        assert!(mutations[1].starts_with("add_cluster_endpoints"));

        // Same config again: nothing to do.
        cloud.clear_calls();
        let again = lc
            .update(
                &CancellationToken::new(),
                &meta(),
                config(json!({"private_network": [{"id": "fr-par-1/pn-bbbb"}]})),
                &state,
            )
            .await;
        assert!(!again.has_errors());
        assert_eq!(cloud.count("add_cluster_endpoints"), 0);
        assert_eq!(cloud.count("delete_cluster_endpoint"), 0);
    }

    #[tokio::test]
    async fn test_migrations_are_applied_one_per_call() {
        let cloud = Arc::new(FakeCloud::new());
        let (lc, state) = created(&cloud, json!({})).await;
        cloud.clear_calls();

        let resp = lc
            .update(
                &CancellationToken::new(),
                &meta(),
                config(json!({"version": "7.2.5", "node_type": "RED1-S", "cluster_size": 3})),
                &state,
            )
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        assert_eq!(cloud.count("migrate_cluster"), 3);
        let state = resp.state.unwrap();
        assert_eq!(state.attributes["version"], "7.2.5");
        assert_eq!(state.attributes["node_type"], "RED1-S");
        assert_eq!(state.attributes["cluster_size"], 3);
    }

    #[tokio::test]
    async fn test_acl_and_settings_replaced_wholesale() {
        let cloud = Arc::new(FakeCloud::new());
        let (lc, state) = created(
            &cloud,
            json!({"acl": [{"ip": "10.0.0.0/8", "description": "internal"}]}),
        )
        .await;

        let resp = lc
            .update(
                &CancellationToken::new(),
                &meta(),
                config(json!({
                    "acl": [{"ip": "192.168.0.0/16", "description": "office"}],
                    "settings": {"maxclients": "5000"}
                })),
                &state,
            )
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        let state = resp.state.unwrap();
        assert_eq!(
            state.attributes["acl"],
            json!([{"ip": "192.168.0.0/16", "description": "office"}])
        );
        assert_eq!(state.attributes["settings"], json!({"maxclients": "5000"}));
        assert_eq!(cloud.count("set_acl_rules"), 1);
        assert_eq!(cloud.count("set_cluster_settings"), 1);
    }

    #[tokio::test]
    async fn test_plan_rules() {
        let cloud = Arc::new(FakeCloud::new());
        let (lc, state) = created(&cloud, json!({"cluster_size": 3})).await;

        let shrink = lc.plan(&meta(), config(json!({"cluster_size": 1})), Some(&state)).await;
        assert!(shrink.diagnostics.has_errors());

        let tls = lc
            .plan(&meta(), config(json!({"cluster_size": 3, "tls_enabled": true})), Some(&state))
            .await;
        assert_eq!(tls.requires_replace, vec!["tls_enabled".to_string()]);

        let far = lc
            .plan(
                &meta(),
                config(json!({"cluster_size": 3, "private_network": [{"id": "nl-ams-1/pn-1"}]})),
                Some(&state),
            )
            .await;
        let diag = far.diagnostics.iter().next().unwrap();
        assert_eq!(diag.attribute.as_deref(), Some("endpoints.0.private_network_id"));
    }

    #[tokio::test]
    async fn test_wait_failure_keeps_state_id() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.fail_next_create();
        let lc = Lifecycle::new(RedisCluster::new(cloud.clone(), cloud.clone()));
        let resp = lc.create(&CancellationToken::new(), &meta(), config(json!({}))).await;
        assert!(resp.has_errors());
        let state = resp.state.unwrap();
        assert!(state.id.starts_with("fr-par-1/"));
    }

    #[tokio::test]
    async fn test_acl_without_description_is_not_reissued() {
        let cloud = Arc::new(FakeCloud::new());
        let (lc, state) = created(&cloud, json!({"acl": [{"ip": "10.0.0.0/8"}]})).await;
        assert_eq!(state.attributes["acl"], json!([{"ip": "10.0.0.0/8", "description": ""}]));
        cloud.clear_calls();

        let resp = lc
            .update(
                &CancellationToken::new(),
                &meta(),
                config(json!({"name": "cache-2", "acl": [{"ip": "10.0.0.0/8"}]})),
                &state,
            )
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        assert_eq!(resp.state.unwrap().attributes["name"], "cache-2");
        assert_eq!(cloud.count("update_cluster"), 1);
        assert_eq!(cloud.count("set_acl_rules"), 0);
    }

    #[tokio::test]
    async fn test_ipam_addresses_are_read_back() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.assign_with_ipam();
        let (lc, state) = created(&cloud, json!({"private_network": [{"id": "fr-par-1/pn-aaaa"}]})).await;
        let networks = &state.attributes["private_network"];
        assert_eq!(networks[0]["service_ips"], json!(["10.1.0.5/22"]));
        assert!(cloud.calls().iter().any(|c| c.starts_with("list_ips fr-par redis_cluster")));

        cloud.deny_next("list_ips");
        let read = lc.read(&CancellationToken::new(), &meta(), &state).await;
        assert!(!read.has_errors(), "{:?}", read.diagnostics);
        let warning = read.diagnostics.iter().next().unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.summary, "unauthorized");
        assert_eq!(warning.attribute.as_deref(), Some("private_network"));
        let read = read.state.unwrap();
        assert_eq!(read.attributes["private_network"][0]["service_ips"], json!([]));
    }

    #[tokio::test]
    async fn test_failed_and_locked_clusters_are_deletable() {
        let cloud = Arc::new(FakeCloud::new());
        let cancel = CancellationToken::new();
        cloud.fail_next_create();
        let lc = Lifecycle::new(RedisCluster::new(cloud.clone(), cloud.clone()));
        let failed = lc.create(&cancel, &meta(), config(json!({}))).await;
        assert!(failed.has_errors());
        let deleted = lc.delete(&cancel, &meta(), &failed.state.unwrap()).await;
        assert!(!deleted.has_errors(), "{:?}", deleted.diagnostics);
        assert!(deleted.state.is_none());

        let (lc, locked) = created(&cloud, json!({})).await;
        cloud.set_cluster_status(&locked.id, ClusterStatus::Locked);
        let deleted = lc.delete(&cancel, &meta(), &locked).await;
        assert!(!deleted.has_errors(), "{:?}", deleted.diagnostics);
        assert!(deleted.state.is_none());
        assert_eq!(cloud.count("delete_cluster"), 2);
    }
}
