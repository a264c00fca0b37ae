//! Serverless containers (`containers/v1beta1`, regional)

use super::{KeyValue, region_path};
use crate::client::ScalewayClient;
use async_trait::async_trait;
use scwflow_cloud::{HasStatus, Result, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const PRODUCT: &str = "containers/v1beta1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Ready,
    /// Defined but never deployed.
    Created,
    Creating,
    Pending,
    Deleting,
    Locked,
    Error,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStatus::Ready => "ready",
            ContainerStatus::Created => "created",
            ContainerStatus::Creating => "creating",
            ContainerStatus::Pending => "pending",
            ContainerStatus::Deleting => "deleting",
            ContainerStatus::Locked => "locked",
            ContainerStatus::Error => "error",
            ContainerStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl Status for ContainerStatus {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContainerStatus::Ready | ContainerStatus::Created | ContainerStatus::Error
        )
    }

    fn is_failure(&self) -> bool {
        matches!(self, ContainerStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub namespace_id: String,
    pub region: String,
    pub status: ContainerStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    pub min_scale: u32,
    pub max_scale: u32,
    pub memory_limit: u32,
    pub cpu_limit: u32,
    #[serde(default)]
    pub timeout: Option<String>,
    pub privacy: String,
    pub registry_image: String,
    #[serde(default)]
    pub max_concurrency: Option<u32>,
    pub port: u32,
    pub protocol: String,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl HasStatus for Container {
    type Status = ContainerStatus;

    fn status(&self) -> ContainerStatus {
        self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateContainerRequest {
    pub namespace_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub environment_variables: BTreeMap<String, String>,
    pub secret_environment_variables: Vec<KeyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    pub registry_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateContainerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_environment_variables: Option<Vec<KeyValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Rolls out a new revision after the update.
    pub redeploy: bool,
}

#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn create_container(&self, region: &str, req: &CreateContainerRequest) -> Result<Container>;
    async fn get_container(&self, region: &str, id: &str) -> Result<Container>;
    async fn update_container(&self, region: &str, id: &str, req: &UpdateContainerRequest) -> Result<Container>;
    async fn deploy_container(&self, region: &str, id: &str) -> Result<Container>;
    async fn delete_container(&self, region: &str, id: &str) -> Result<()>;
    async fn list_containers(&self, region: &str) -> Result<Vec<Container>>;
}

#[async_trait]
impl ContainerApi for ScalewayClient {
    async fn create_container(&self, region: &str, req: &CreateContainerRequest) -> Result<Container> {
        self.post(&format!("{}/containers", region_path(PRODUCT, region)), req)
            .await
    }

    async fn get_container(&self, region: &str, id: &str) -> Result<Container> {
        self.get(&format!("{}/containers/{}", region_path(PRODUCT, region), id))
            .await
    }

    async fn update_container(&self, region: &str, id: &str, req: &UpdateContainerRequest) -> Result<Container> {
        self.patch(&format!("{}/containers/{}", region_path(PRODUCT, region), id), req)
            .await
    }

    async fn deploy_container(&self, region: &str, id: &str) -> Result<Container> {
        self.post(
            &format!("{}/containers/{}/deploy", region_path(PRODUCT, region), id),
            &serde_json::json!({}),
        )
        .await
    }

    async fn delete_container(&self, region: &str, id: &str) -> Result<()> {
        self.delete(&format!("{}/containers/{}", region_path(PRODUCT, region), id))
            .await
    }

    async fn list_containers(&self, region: &str) -> Result<Vec<Container>> {
        self.list(&format!("{}/containers", region_path(PRODUCT, region)), "containers")
            .await
    }
}
