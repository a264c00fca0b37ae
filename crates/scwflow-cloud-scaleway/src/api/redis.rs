//! Managed Redis clusters (`redis/v1`, zoned)

use super::{ApiEndpoint, EndpointBody, zone_path};
use crate::client::ScalewayClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scwflow_cloud::{HasStatus, Result, Status};
use serde::{Deserialize, Serialize};
use std::fmt;

const PRODUCT: &str = "redis/v1";

/// Status shared by the managed-database products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    Ready,
    Provisioning,
    Configuring,
    Initializing,
    Updating,
    Autohealing,
    Deleting,
    Snapshotting,
    Locked,
    Suspended,
    Error,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterStatus::Ready => "ready",
            ClusterStatus::Provisioning => "provisioning",
            ClusterStatus::Configuring => "configuring",
            ClusterStatus::Initializing => "initializing",
            ClusterStatus::Updating => "updating",
            ClusterStatus::Autohealing => "autohealing",
            ClusterStatus::Deleting => "deleting",
            ClusterStatus::Snapshotting => "snapshotting",
            ClusterStatus::Locked => "locked",
            ClusterStatus::Suspended => "suspended",
            ClusterStatus::Error => "error",
            ClusterStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl Status for ClusterStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, ClusterStatus::Ready | ClusterStatus::Error | ClusterStatus::Locked)
    }

    fn is_failure(&self) -> bool {
        matches!(self, ClusterStatus::Error | ClusterStatus::Locked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ip_cidr: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSetting {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub zone: String,
    pub status: ClusterStatus,
    pub version: String,
    pub node_type: String,
    pub cluster_size: u32,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub acl_rules: Vec<AclRule>,
    #[serde(default)]
    pub cluster_settings: Vec<ClusterSetting>,
    #[serde(default)]
    pub endpoints: Vec<ApiEndpoint>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl HasStatus for Cluster {
    type Status = ClusterStatus;

    fn status(&self) -> ClusterStatus {
        self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateClusterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub version: String,
    pub node_type: String,
    pub user_name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_size: Option<u32>,
    pub tls_enabled: bool,
    pub tags: Vec<String>,
    pub acl_rules: Vec<AclRule>,
    pub cluster_settings: Vec<ClusterSetting>,
    pub endpoints: Vec<EndpointBody>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateClusterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// One change per call; the server rejects combined migrations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrateClusterRequest {
    Version(String),
    NodeType(String),
    ClusterSize(u32),
}

#[async_trait]
pub trait RedisApi: Send + Sync {
    async fn create_cluster(&self, zone: &str, req: &CreateClusterRequest) -> Result<Cluster>;
    async fn get_cluster(&self, zone: &str, id: &str) -> Result<Cluster>;
    async fn update_cluster(&self, zone: &str, id: &str, req: &UpdateClusterRequest) -> Result<Cluster>;
    async fn migrate_cluster(&self, zone: &str, id: &str, req: &MigrateClusterRequest) -> Result<Cluster>;
    async fn delete_cluster(&self, zone: &str, id: &str) -> Result<()>;
    async fn list_clusters(&self, zone: &str, name: Option<&str>) -> Result<Vec<Cluster>>;

    async fn set_acl_rules(&self, zone: &str, id: &str, rules: &[AclRule]) -> Result<()>;
    async fn set_cluster_settings(&self, zone: &str, id: &str, settings: &[ClusterSetting]) -> Result<()>;

    async fn add_cluster_endpoints(&self, zone: &str, id: &str, endpoints: &[EndpointBody]) -> Result<()>;
    async fn delete_cluster_endpoint(&self, zone: &str, endpoint_id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct AclBody<'a> {
    acl_rules: &'a [AclRule],
}

#[derive(Serialize)]
struct SettingsBody<'a> {
    settings: &'a [ClusterSetting],
}

#[derive(Serialize)]
struct EndpointsBody<'a> {
    endpoints: &'a [EndpointBody],
}

#[async_trait]
impl RedisApi for ScalewayClient {
    async fn create_cluster(&self, zone: &str, req: &CreateClusterRequest) -> Result<Cluster> {
        let mut req = req.clone();
        req.project_id = self.project_or_default(req.project_id.as_deref());
        self.post(&format!("{}/clusters", zone_path(PRODUCT, zone)), &req).await
    }

    async fn get_cluster(&self, zone: &str, id: &str) -> Result<Cluster> {
        self.get(&format!("{}/clusters/{}", zone_path(PRODUCT, zone), id)).await
    }

    async fn update_cluster(&self, zone: &str, id: &str, req: &UpdateClusterRequest) -> Result<Cluster> {
        self.patch(&format!("{}/clusters/{}", zone_path(PRODUCT, zone), id), req)
            .await
    }

    async fn migrate_cluster(&self, zone: &str, id: &str, req: &MigrateClusterRequest) -> Result<Cluster> {
        self.post(&format!("{}/clusters/{}/migrate", zone_path(PRODUCT, zone), id), req)
            .await
    }

    async fn delete_cluster(&self, zone: &str, id: &str) -> Result<()> {
        self.delete(&format!("{}/clusters/{}", zone_path(PRODUCT, zone), id)).await
    }

    async fn list_clusters(&self, zone: &str, name: Option<&str>) -> Result<Vec<Cluster>> {
        let mut path = format!("{}/clusters", zone_path(PRODUCT, zone));
        if let Some(name) = name {
            path = format!("{}?name={}", path, name);
        }
        self.list(&path, "clusters").await
    }

    async fn set_acl_rules(&self, zone: &str, id: &str, rules: &[AclRule]) -> Result<()> {
        let _: serde_json::Value = self
            .put(
                &format!("{}/clusters/{}/acls", zone_path(PRODUCT, zone), id),
                &AclBody { acl_rules: rules },
            )
            .await?;
        Ok(())
    }

    async fn set_cluster_settings(&self, zone: &str, id: &str, settings: &[ClusterSetting]) -> Result<()> {
        let _: serde_json::Value = self
            .put(
                &format!("{}/clusters/{}/settings", zone_path(PRODUCT, zone), id),
                &SettingsBody { settings },
            )
            .await?;
        Ok(())
    }

    async fn add_cluster_endpoints(&self, zone: &str, id: &str, endpoints: &[EndpointBody]) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                &format!("{}/clusters/{}/endpoints", zone_path(PRODUCT, zone), id),
                &EndpointsBody { endpoints },
            )
            .await?;
        Ok(())
    }

    async fn delete_cluster_endpoint(&self, zone: &str, endpoint_id: &str) -> Result<()> {
        self.delete(&format!("{}/endpoints/{}", zone_path(PRODUCT, zone), endpoint_id))
            .await
    }
}
