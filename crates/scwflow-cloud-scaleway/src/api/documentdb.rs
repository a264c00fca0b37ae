//! Managed DocumentDB instances, users and privileges (`document-db/v1beta1`, regional)

use super::{ApiEndpoint, EndpointBody, region_path};
use crate::client::ScalewayClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scwflow_cloud::{HasStatus, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use super::redis::ClusterStatus as InstanceStatus;

const PRODUCT: &str = "document-db/v1beta1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
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
    /// Engine name with its version, e.g. `FerretDB-1`.
    pub engine: String,
    pub node_type: String,
    #[serde(default)]
    pub is_ha_cluster: bool,
    #[serde(default)]
    pub volume: Option<Volume>,
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
pub struct CreateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub name: String,
    pub engine: String,
    pub user_name: String,
    pub password: String,
    pub node_type: String,
    pub is_ha_cluster: bool,
    pub tags: Vec<String>,
    pub volume_type: String,
    pub volume_size: u64,
    pub init_endpoints: Vec<EndpointBody>,
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
    /// Same major version only; a major change needs a new instance.
    Engine(String),
    NodeType(String),
    VolumeSize(u64),
    EnableHa(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub password: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

/// `None` revokes: there is no delete call for privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Readonly,
    Readwrite,
    All,
    Custom,
    None,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::Readonly => "readonly",
            Permission::Readwrite => "readwrite",
            Permission::All => "all",
            Permission::Custom => "custom",
            Permission::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub user_name: String,
    pub database_name: String,
    pub permission: Permission,
}

#[async_trait]
pub trait DocumentDbApi: Send + Sync {
    async fn create_documentdb_instance(&self, region: &str, req: &CreateInstanceRequest) -> Result<Instance>;
    async fn get_documentdb_instance(&self, region: &str, id: &str) -> Result<Instance>;
    async fn update_documentdb_instance(
        &self,
        region: &str,
        id: &str,
        req: &UpdateInstanceRequest,
    ) -> Result<Instance>;
    async fn upgrade_documentdb_instance(
        &self,
        region: &str,
        id: &str,
        req: &UpgradeInstanceRequest,
    ) -> Result<Instance>;
    async fn delete_documentdb_instance(&self, region: &str, id: &str) -> Result<()>;
    async fn list_documentdb_instances(&self, region: &str) -> Result<Vec<Instance>>;

    async fn create_documentdb_endpoint(
        &self,
        region: &str,
        instance_id: &str,
        endpoint: &EndpointBody,
    ) -> Result<()>;
    async fn delete_documentdb_endpoint(&self, region: &str, endpoint_id: &str) -> Result<()>;
    /// Moves an endpoint onto a new network in one call.
    async fn migrate_documentdb_endpoint(
        &self,
        region: &str,
        endpoint_id: &str,
        endpoint: &EndpointBody,
    ) -> Result<()>;

    async fn list_documentdb_users(&self, region: &str, instance_id: &str, name: Option<&str>) -> Result<Vec<User>>;
    async fn create_documentdb_user(&self, region: &str, instance_id: &str, req: &CreateUserRequest) -> Result<User>;
    async fn update_documentdb_user(
        &self,
        region: &str,
        instance_id: &str,
        name: &str,
        req: &UpdateUserRequest,
    ) -> Result<User>;
    async fn delete_documentdb_user(&self, region: &str, instance_id: &str, name: &str) -> Result<()>;

    async fn list_documentdb_privileges(
        &self,
        region: &str,
        instance_id: &str,
        user_name: &str,
        database_name: &str,
    ) -> Result<Vec<Privilege>>;
    async fn set_documentdb_privilege(&self, region: &str, instance_id: &str, privilege: &Privilege) -> Result<()>;
}

#[derive(Serialize)]
struct EndpointSpecBody<'a> {
    endpoint_spec: &'a EndpointBody,
}

#[async_trait]
impl DocumentDbApi for ScalewayClient {
    async fn create_documentdb_instance(&self, region: &str, req: &CreateInstanceRequest) -> Result<Instance> {
        let mut req = req.clone();
        req.project_id = self.project_or_default(req.project_id.as_deref());
        self.post(&format!("{}/instances", region_path(PRODUCT, region)), &req)
            .await
    }

    async fn get_documentdb_instance(&self, region: &str, id: &str) -> Result<Instance> {
        self.get(&format!("{}/instances/{}", region_path(PRODUCT, region), id))
            .await
    }

    async fn update_documentdb_instance(
        &self,
        region: &str,
        id: &str,
        req: &UpdateInstanceRequest,
    ) -> Result<Instance> {
        self.patch(&format!("{}/instances/{}", region_path(PRODUCT, region), id), req)
            .await
    }

    async fn upgrade_documentdb_instance(
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

    async fn delete_documentdb_instance(&self, region: &str, id: &str) -> Result<()> {
        self.delete(&format!("{}/instances/{}", region_path(PRODUCT, region), id))
            .await
    }

    async fn list_documentdb_instances(&self, region: &str) -> Result<Vec<Instance>> {
        self.list(&format!("{}/instances", region_path(PRODUCT, region)), "instances")
            .await
    }

    async fn create_documentdb_endpoint(
        &self,
        region: &str,
        instance_id: &str,
        endpoint: &EndpointBody,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                &format!("{}/instances/{}/endpoints", region_path(PRODUCT, region), instance_id),
                &EndpointSpecBody {
                    endpoint_spec: endpoint,
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_documentdb_endpoint(&self, region: &str, endpoint_id: &str) -> Result<()> {
        self.delete(&format!("{}/endpoints/{}", region_path(PRODUCT, region), endpoint_id))
            .await
    }

    async fn migrate_documentdb_endpoint(
        &self,
        region: &str,
        endpoint_id: &str,
        endpoint: &EndpointBody,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                &format!("{}/endpoints/{}/migrate", region_path(PRODUCT, region), endpoint_id),
                &EndpointSpecBody {
                    endpoint_spec: endpoint,
                },
            )
            .await?;
        Ok(())
    }

    async fn list_documentdb_users(&self, region: &str, instance_id: &str, name: Option<&str>) -> Result<Vec<User>> {
        let mut path = format!("{}/instances/{}/users", region_path(PRODUCT, region), instance_id);
        if let Some(name) = name {
            path = format!("{}?name={}", path, name);
        }
        self.list(&path, "users").await
    }

    async fn create_documentdb_user(&self, region: &str, instance_id: &str, req: &CreateUserRequest) -> Result<User> {
        self.post(
            &format!("{}/instances/{}/users", region_path(PRODUCT, region), instance_id),
            req,
        )
        .await
    }

    async fn update_documentdb_user(
        &self,
        region: &str,
        instance_id: &str,
        name: &str,
        req: &UpdateUserRequest,
    ) -> Result<User> {
        self.patch(
            &format!(
                "{}/instances/{}/users/{}",
                region_path(PRODUCT, region),
                instance_id,
                name
            ),
            req,
        )
        .await
    }

    async fn delete_documentdb_user(&self, region: &str, instance_id: &str, name: &str) -> Result<()> {
        self.delete(&format!(
            "{}/instances/{}/users/{}",
            region_path(PRODUCT, region),
            instance_id,
            name
        ))
        .await
    }

    async fn list_documentdb_privileges(
        &self,
        region: &str,
        instance_id: &str,
        user_name: &str,
        database_name: &str,
    ) -> Result<Vec<Privilege>> {
        self.list(
            &format!(
                "{}/instances/{}/privileges?user_name={}&database_name={}",
                region_path(PRODUCT, region),
                instance_id,
                user_name,
                database_name
            ),
            "privileges",
        )
        .await
    }

    async fn set_documentdb_privilege(&self, region: &str, instance_id: &str, privilege: &Privilege) -> Result<()> {
        let _: serde_json::Value = self
            .put(
                &format!("{}/instances/{}/privileges", region_path(PRODUCT, region), instance_id),
                privilege,
            )
            .await?;
        Ok(())
    }
}
