//! Managed MongoDB instances (`mongodb/v1`, regional)

use super::{ApiEndpoint, EndpointBody, region_path};
use crate::client::ScalewayClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scwflow_cloud::{HasStatus, Result};
use serde::{Deserialize, Serialize};

pub use super::redis::ClusterStatus as InstanceStatus;

const PRODUCT: &str = "mongodb/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceVolume {
    #[serde(rename = "type", default)]
    pub volume_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub region: String,
    pub status: InstanceStatus,
    pub version: String,
    pub node_type: String,
    pub node_amount: u32,
    #[serde(default)]
    pub volume: Option<InstanceVolume>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<ApiEndpoint>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl HasStatus for Instance {
    type Status = InstanceStatus;

    fn status(&self) -> InstanceStatus {
        self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolume {
    pub volume_type: String,
    pub volume_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub version: String,
    pub node_type: String,
    pub node_amount: u32,
    pub user_name: String,
    pub password: String,
    pub volume: CreateVolume,
    pub tags: Vec<String>,
    pub endpoints: Vec<EndpointBody>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// One change per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeInstanceRequest {
    VolumeSize(u64),
    NodeAmount(u32),
}

#[async_trait]
pub trait MongoDbApi: Send + Sync {
    async fn create_mongodb_instance(&self, region: &str, req: &CreateInstanceRequest) -> Result<Instance>;
    async fn get_mongodb_instance(&self, region: &str, id: &str) -> Result<Instance>;
    async fn update_mongodb_instance(
        &self,
        region: &str,
        id: &str,
        req: &UpdateInstanceRequest,
    ) -> Result<Instance>;
    async fn upgrade_mongodb_instance(
        &self,
        region: &str,
        id: &str,
        req: &UpgradeInstanceRequest,
    ) -> Result<Instance>;
    async fn delete_mongodb_instance(&self, region: &str, id: &str) -> Result<()>;
    async fn list_mongodb_instances(&self, region: &str) -> Result<Vec<Instance>>;

    async fn create_mongodb_endpoint(&self, region: &str, instance_id: &str, endpoint: &EndpointBody) -> Result<()>;
    async fn delete_mongodb_endpoint(&self, region: &str, endpoint_id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct CreateEndpointBody<'a> {
    instance_id: &'a str,
    endpoint: &'a EndpointBody,
}

#[async_trait]
impl MongoDbApi for ScalewayClient {
    async fn create_mongodb_instance(&self, region: &str, req: &CreateInstanceRequest) -> Result<Instance> {
        let mut req = req.clone();
        req.project_id = self.project_or_default(req.project_id.as_deref());
        self.post(&format!("{}/instances", region_path(PRODUCT, region)), &req)
            .await
    }

    async fn get_mongodb_instance(&self, region: &str, id: &str) -> Result<Instance> {
        self.get(&format!("{}/instances/{}", region_path(PRODUCT, region), id))
            .await
    }

    async fn update_mongodb_instance(
        &self,
        region: &str,
        id: &str,
        req: &UpdateInstanceRequest,
    ) -> Result<Instance> {
        self.patch(&format!("{}/instances/{}", region_path(PRODUCT, region), id), req)
            .await
    }

    async fn upgrade_mongodb_instance(
        &self,
        region: &str,
        id: &str,
        req: &UpgradeInstanceRequest,
    ) -> Result<Instance> {
        self.post(
            &format!("{}/instances/{}/upgrade", region_path(PRODUCT, region), id),
            req,
        )
        .await
    }

    async fn delete_mongodb_instance(&self, region: &str, id: &str) -> Result<()> {
        self.delete(&format!("{}/instances/{}", region_path(PRODUCT, region), id))
            .await
    }

    async fn list_mongodb_instances(&self, region: &str) -> Result<Vec<Instance>> {
        self.list(&format!("{}/instances", region_path(PRODUCT, region)), "instances")
            .await
    }

    async fn create_mongodb_endpoint(&self, region: &str, instance_id: &str, endpoint: &EndpointBody) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                &format!("{}/endpoints", region_path(PRODUCT, region)),
                &CreateEndpointBody {
                    instance_id,
                    endpoint,
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_mongodb_endpoint(&self, region: &str, endpoint_id: &str) -> Result<()> {
        self.delete(&format!("{}/endpoints/{}", region_path(PRODUCT, region), endpoint_id))
            .await
    }
}
