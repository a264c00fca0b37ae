//! IP address management (`ipam/v1`, regional)
//!
//! Only the lookup side is used: private endpoints provisioned through IPAM
//! do not echo their addresses, so they are read back from here.

use super::region_path;
use crate::client::ScalewayClient;
use async_trait::async_trait;
use scwflow_cloud::Result;
use serde::{Deserialize, Serialize};

const PRODUCT: &str = "ipam/v1";

/// Resource types the IPAM API files addresses under.
pub const REDIS_CLUSTER: &str = "redis_cluster";
pub const MONGODB_INSTANCE: &str = "mgdb_instance";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpResource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSource {
    #[serde(default)]
    pub private_network_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ip {
    pub id: String,
    /// CIDR notation, e.g. `10.12.0.5/22`.
    pub address: String,
    #[serde(default)]
    pub source: IpSource,
    #[serde(default)]
    pub resource: Option<IpResource>,
}

#[async_trait]
pub trait IpamApi: Send + Sync {
    /// Addresses attached to one resource.
    async fn list_ips(&self, region: &str, resource_type: &str, resource_id: &str) -> Result<Vec<Ip>>;
}

#[async_trait]
impl IpamApi for ScalewayClient {
    async fn list_ips(&self, region: &str, resource_type: &str, resource_id: &str) -> Result<Vec<Ip>> {
        let path = format!(
            "{}/ips?resource_type={}&resource_id={}",
            region_path(PRODUCT, region),
            resource_type,
            resource_id
        );
        self.list(&path, "ips").await
    }
}
