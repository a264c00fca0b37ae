//! `scaleway_container`
//!
//! Every change goes out in one update call. A new revision is rolled out
//! when `deploy` is set and the image, its digest or the flag itself changed.

use super::{default_name, regional_parent};
use crate::api::KeyValue;
use crate::api::container::{
    Container, ContainerApi, ContainerStatus, CreateContainerRequest, UpdateContainerRequest,
};
use async_trait::async_trait;
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, CloudError, Diagnostics, Meta, OpContext, PlanAdjustment,
    RegionalId, Resource, Result, Schema, Until, Waiter, id,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const REDEPLOY_ON: &[&str] = &["registry_image", "registry_sha256", "deploy"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerSpec {
    pub namespace_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub environment_variables: Option<BTreeMap<String, String>>,
    pub secret_environment_variables: Option<BTreeMap<String, String>>,
    pub min_scale: Option<u32>,
    pub max_scale: Option<u32>,
    pub memory_limit: Option<u32>,
    pub cpu_limit: Option<u32>,
    pub timeout: Option<String>,
    pub privacy: Option<String>,
    pub registry_image: Option<String>,
    pub registry_sha256: Option<String>,
    pub deploy: Option<bool>,
    pub max_concurrency: Option<u32>,
    pub port: Option<u32>,
    pub protocol: Option<String>,
    pub region: Option<String>,
}

impl ContainerSpec {
    fn secrets(&self) -> Option<Vec<KeyValue>> {
        self.secret_environment_variables.as_ref().map(|vars| {
            vars.iter()
                .map(|(key, value)| KeyValue {
                    key: key.clone(),
                    value: Some(value.clone()),
                })
                .collect()
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerState {
    pub namespace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub environment_variables: BTreeMap<String, String>,
    pub min_scale: u32,
    pub max_scale: u32,
    pub memory_limit: u32,
    pub cpu_limit: u32,
    pub timeout: Option<String>,
    pub privacy: String,
    pub registry_image: String,
    pub max_concurrency: Option<u32>,
    pub port: u32,
    pub protocol: String,
    pub domain_name: Option<String>,
    pub region: String,
    pub status: String,
}

impl From<Container> for ContainerState {
    fn from(c: Container) -> Self {
        Self {
            namespace_id: id::format(&c.region, &c.namespace_id),
            name: c.name,
            description: c.description,
            environment_variables: c.environment_variables,
            min_scale: c.min_scale,
            max_scale: c.max_scale,
            memory_limit: c.memory_limit,
            cpu_limit: c.cpu_limit,
            timeout: c.timeout,
            privacy: c.privacy,
            registry_image: c.registry_image,
            max_concurrency: c.max_concurrency,
            port: c.port,
            protocol: c.protocol,
            domain_name: c.domain_name,
            region: c.region,
            status: c.status.to_string(),
        }
    }
}

/// A container that was never deployed settles in `created`.
pub(crate) async fn wait_container(
    ctx: &OpContext,
    meta: &Meta,
    api: &dyn ContainerApi,
    region: &str,
    id: &str,
) -> Result<Container> {
    Waiter::new(ctx, meta, format!("container {}/{}", region, id))
        .until(
            Until::Any(vec![ContainerStatus::Ready, ContainerStatus::Created]),
            move || api.get_container(region, id),
        )
        .await
}

pub struct ServerlessContainer {
    api: Arc<dyn ContainerApi>,
}

impl ServerlessContainer {
    pub fn new(api: Arc<dyn ContainerApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for ServerlessContainer {
    type Spec = ContainerSpec;
    type State = ContainerState;

    fn type_name(&self) -> &'static str {
        "scaleway_container"
    }

    fn schema(&self) -> Schema {
        let integer = || Attribute::optional_computed(AttributeType::Integer);
        let text = || Attribute::optional_computed(AttributeType::String);

        Schema::v0()
            .with_attribute(
                "namespace_id",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute("name", text().force_new())
            .with_attribute("description", Attribute::optional(AttributeType::String))
            .with_attribute(
                "environment_variables",
                Attribute::optional(AttributeType::Map),
            )
            .with_attribute(
                "secret_environment_variables",
                Attribute::optional(AttributeType::Map)
                    .sensitive()
                    .write_only(),
            )
            .with_attribute("min_scale", integer())
            .with_attribute("max_scale", integer())
            .with_attribute("memory_limit", integer().describe("MB"))
            .with_attribute("cpu_limit", integer().describe("mvCPU"))
            .with_attribute("timeout", text())
            .with_attribute("privacy", text().describe("public or private"))
            .with_attribute("registry_image", text())
            .with_attribute("registry_sha256", Attribute::optional(AttributeType::String))
            .with_attribute(
                "deploy",
                Attribute::optional(AttributeType::Boolean)
                    .describe("Roll out a revision whenever the image changes"),
            )
            .with_attribute("max_concurrency", integer())
            .with_attribute("port", integer())
            .with_attribute("protocol", text())
            .with_attribute("domain_name", Attribute::computed(AttributeType::String))
            .with_attribute("status", Attribute::computed(AttributeType::String))
            .regional()
    }

    async fn create(&self, ctx: &OpContext, meta: &Meta, spec: &ContainerSpec) -> Result<String> {
        let namespace = regional_parent(meta, &spec.namespace_id, spec.region.as_deref())?;
        let region = namespace.region.clone();
        let req = CreateContainerRequest {
            namespace_id: namespace.id,
            name: spec.name.clone().unwrap_or_else(|| default_name("container")),
            description: spec.description.clone(),
            environment_variables: spec.environment_variables.clone().unwrap_or_default(),
            secret_environment_variables: spec.secrets().unwrap_or_default(),
            min_scale: spec.min_scale,
            max_scale: spec.max_scale,
            memory_limit: spec.memory_limit,
            cpu_limit: spec.cpu_limit,
            timeout: spec.timeout.clone(),
            privacy: spec.privacy.clone(),
            registry_image: spec.registry_image.clone().unwrap_or_default(),
            max_concurrency: spec.max_concurrency,
            port: spec.port,
            protocol: spec.protocol.clone(),
        };
        let container = self.api.create_container(region.as_str(), &req).await?;
        let id = RegionalId::new(region, container.id);

        if spec.deploy == Some(true) {
            wait_container(ctx, meta, self.api.as_ref(), id.region.as_str(), &id.id).await?;
            tracing::info!("Deploying container {}", id);
            self.api.deploy_container(id.region.as_str(), &id.id).await?;
        }
        Ok(id.to_string())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        wait_container(ctx, meta, self.api.as_ref(), id.region.as_str(), &id.id).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        let (api, region, uuid) = (self.api.as_ref(), id.region.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("container {}", id))
            .until(Until::Terminal, move || api.get_container(region, uuid))
            .await?;
        Ok(())
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        _diags: &mut Diagnostics,
    ) -> Result<ContainerState> {
        let id = RegionalId::parse(id)?;
        Ok(self.api.get_container(id.region.as_str(), &id.id).await?.into())
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        _prior: &ContainerState,
        spec: &ContainerSpec,
        changes: &ChangeSet,
    ) -> Result<()> {
        let id = RegionalId::parse(id)?;
        let changed = |attr: &str| changes.has(attr);
        let req = UpdateContainerRequest {
            description: spec.description.clone().filter(|_| changed("description")),
            environment_variables: spec
                .environment_variables
                .clone()
                .filter(|_| changed("environment_variables")),
            secret_environment_variables: spec
                .secrets()
                .filter(|_| changed("secret_environment_variables")),
            min_scale: spec.min_scale.filter(|_| changed("min_scale")),
            max_scale: spec.max_scale.filter(|_| changed("max_scale")),
            memory_limit: spec.memory_limit.filter(|_| changed("memory_limit")),
            cpu_limit: spec.cpu_limit.filter(|_| changed("cpu_limit")),
            timeout: spec.timeout.clone().filter(|_| changed("timeout")),
            privacy: spec.privacy.clone().filter(|_| changed("privacy")),
            registry_image: spec.registry_image.clone().filter(|_| changed("registry_image")),
            max_concurrency: spec.max_concurrency.filter(|_| changed("max_concurrency")),
            port: spec.port.filter(|_| changed("port")),
            protocol: spec.protocol.clone().filter(|_| changed("protocol")),
            redeploy: spec.deploy == Some(true) && changes.any(REDEPLOY_ON),
        };
        if req.redeploy {
            tracing::info!("Redeploying container {}", id);
        }
        self.api
            .update_container(id.region.as_str(), &id.id, &req)
            .await?;
        wait_container(ctx, meta, self.api.as_ref(), id.region.as_str(), &id.id).await?;
        Ok(())
    }

    async fn delete(&self, _ctx: &OpContext, _meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        self.api.delete_container(id.region.as_str(), &id.id).await
    }

    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let id = RegionalId::parse(id)?;
        let (api, region, uuid) = (self.api.as_ref(), id.region.as_str(), id.id.as_str());
        Waiter::new(ctx, meta, format!("container {}", id))
            .until_absent(move || api.get_container(region, uuid))
            .await
    }

    fn customize_diff(
        &self,
        prior: Option<&ContainerState>,
        desired: &ContainerSpec,
        plan: &mut PlanAdjustment,
    ) {
        let min = desired.min_scale.or(prior.map(|p| p.min_scale));
        let max = desired.max_scale.or(prior.map(|p| p.max_scale));
        if let (Some(min), Some(max)) = (min, max) {
            if max < min {
                plan.reject(CloudError::validation(
                    "max_scale",
                    format!("max_scale ({}) is below min_scale ({})", max, min),
                ));
            }
        }
    }
}
