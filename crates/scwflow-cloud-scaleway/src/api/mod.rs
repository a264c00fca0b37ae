//! Scaleway product APIs
//!
//! One async trait per product, implemented by [`ScalewayClient`] over HTTP
//! and by the in-memory fake in tests. Models carry only the fields the
//! resources read.

pub mod block;
pub mod container;
pub mod documentdb;
pub mod ipam;
pub mod mongodb;
pub mod redis;

pub use block::BlockApi;
pub use container::ContainerApi;
pub use documentdb::DocumentDbApi;
pub use ipam::IpamApi;
pub use mongodb::MongoDbApi;
pub use redis::RedisApi;

use crate::client::ScalewayClient;
use scwflow_cloud::{Endpoint, EndpointSpec};
use serde::{Deserialize, Serialize};

/// Every product API behind one handle.
pub trait ScalewayApi:
    BlockApi + RedisApi + MongoDbApi + DocumentDbApi + ContainerApi + IpamApi
{
}

impl<T> ScalewayApi for T where
    T: BlockApi + RedisApi + MongoDbApi + DocumentDbApi + ContainerApi + IpamApi
{
}

/// Marker body for endpoint kinds without attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateNetworkBody {
    #[serde(alias = "id")]
    pub private_network_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// Endpoint as the managed-database APIs send and receive it: exactly one
/// of the kind fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_network: Option<PrivateNetworkBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_network: Option<Empty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<Empty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_access: Option<Empty>,
}

impl From<&EndpointSpec> for EndpointBody {
    fn from(spec: &EndpointSpec) -> Self {
        let mut body = EndpointBody::default();
        match spec {
            EndpointSpec::PrivateNetwork {
                private_network_id,
                service_ips,
                zone,
            } => {
                body.private_network = Some(PrivateNetworkBody {
                    private_network_id: scwflow_cloud::id::expand(private_network_id).to_string(),
                    service_ips: service_ips.clone(),
                    zone: zone.clone(),
                })
            }
            EndpointSpec::PublicNetwork {} => body.public_network = Some(Empty {}),
            EndpointSpec::LoadBalancer {} => body.load_balancer = Some(Empty {}),
            EndpointSpec::DirectAccess {} => body.direct_access = Some(Empty {}),
            // Exports are not endpoints of the database APIs; send nothing.
            EndpointSpec::ObjectStorageExport { .. } => {}
        }
        body
    }
}

/// Observed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub id: String,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub dns_record: Option<String>,
    #[serde(default)]
    pub dns_records: Vec<String>,
    #[serde(flatten)]
    pub kind: EndpointBody,
}

impl ApiEndpoint {
    pub fn spec(&self) -> EndpointSpec {
        let k = &self.kind;
        if let Some(pn) = &k.private_network {
            EndpointSpec::PrivateNetwork {
                private_network_id: pn.private_network_id.clone(),
                service_ips: pn.service_ips.clone(),
                zone: pn.zone.clone(),
            }
        } else if k.load_balancer.is_some() {
            EndpointSpec::LoadBalancer {}
        } else if k.direct_access.is_some() {
            EndpointSpec::DirectAccess {}
        } else {
            EndpointSpec::PublicNetwork {}
        }
    }

    pub fn to_endpoint(&self) -> Endpoint {
        let mut dns_records = self.dns_records.clone();
        if let Some(record) = &self.dns_record {
            dns_records.push(record.clone());
        }
        Endpoint {
            id: self.id.clone(),
            spec: self.spec(),
            ips: self.ips.clone(),
            port: self.port,
            hostname: dns_records.first().cloned(),
            dns_records,
        }
    }
}

/// Scaleway's `[{key, value}]` shape for secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

pub(crate) fn zone_path(product: &str, zone: &str) -> String {
    format!("/{}/zones/{}", product, zone)
}

pub(crate) fn region_path(product: &str, region: &str) -> String {
    format!("/{}/regions/{}", product, region)
}

impl ScalewayClient {
    /// The request's project, or the client default.
    pub(crate) fn project_or_default(&self, project_id: Option<&str>) -> Option<String> {
        project_id
            .map(str::to_string)
            .or_else(|| self.project_id().map(str::to_string))
    }
}
