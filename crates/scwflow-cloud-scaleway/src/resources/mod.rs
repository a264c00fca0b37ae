//! Resource kinds served by the Scaleway provider
//!
//! Every kind is a [`scwflow_cloud::Resource`] holding the product API it
//! talks to. The kinds are registered under their `scaleway_*` type names by
//! [`crate::registry`].

pub mod block_snapshot;
pub mod block_volume;
pub mod container;
pub mod data_sources;
pub mod documentdb_instance;
pub mod documentdb_privilege;
pub mod documentdb_user;
pub mod mongodb_instance;
pub mod redis_cluster;

use crate::api::{ApiEndpoint, IpamApi};
use chrono::Utc;
use scwflow_cloud::{
    Attribute, AttributeType, Diagnostic, Diagnostics, EndpointSpec, ErrorKind, Meta, RegionalId,
    Result, id,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name used when the user leaves `name` unset.
pub(crate) fn default_name(prefix: &str) -> String {
    format!("tf-{}-{}", prefix, Utc::now().format("%Y%m%d-%H%M%S"))
}

pub(crate) fn string_list() -> AttributeType {
    AttributeType::List {
        element: Box::new(AttributeType::String),
    }
}

/// Grow-only comparisons work on signed integers.
pub(crate) fn signed(v: Option<u64>) -> Option<i64> {
    v.and_then(|v| i64::try_from(v).ok())
}

/// Parent of a regional child object (instance, namespace). The localized
/// form of `raw` wins, otherwise the declared or default region applies.
pub(crate) fn regional_parent(meta: &Meta, raw: &str, region: Option<&str>) -> Result<RegionalId> {
    match RegionalId::parse(raw) {
        Ok(id) => Ok(id),
        Err(_) => RegionalId::resolve(raw, &meta.region(region)?),
    }
}

/// One `private_network` block as declared by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateNetwork {
    /// Localized or bare private network ID.
    pub id: String,
    pub service_ips: Option<Vec<String>>,
    pub zone: Option<String>,
    /// Server-side endpoint ID, only present in state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
}

impl PrivateNetwork {
    pub fn to_spec(&self) -> EndpointSpec {
        EndpointSpec::PrivateNetwork {
            private_network_id: self.id.clone(),
            service_ips: self.service_ips.clone().unwrap_or_default(),
            zone: self.zone.clone(),
        }
    }
}

/// Public endpoint as written to state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicNetwork {
    pub endpoint_id: String,
    pub ips: Vec<String>,
    pub port: Option<u16>,
    pub hostname: Option<String>,
}

/// `private_network`: list of `{id, service_ips, zone}` blocks.
pub(crate) fn private_network_attribute() -> Attribute {
    let mut block = BTreeMap::new();
    block.insert("id".to_string(), Attribute::required(AttributeType::String));
    block.insert("service_ips".to_string(), Attribute::optional_computed(string_list()));
    block.insert("zone".to_string(), Attribute::optional_computed(AttributeType::String));
    block.insert("endpoint_id".to_string(), Attribute::computed(AttributeType::String));
    Attribute::optional(AttributeType::List {
        element: Box::new(AttributeType::Object { attributes: block }),
    })
    .describe("Private networks the resource is reachable from")
}

/// `public_network`: computed public endpoint.
pub(crate) fn public_network_attribute() -> Attribute {
    let mut block = BTreeMap::new();
    block.insert("endpoint_id".to_string(), Attribute::computed(AttributeType::String));
    block.insert("ips".to_string(), Attribute::computed(string_list()));
    block.insert("port".to_string(), Attribute::computed(AttributeType::Integer));
    block.insert("hostname".to_string(), Attribute::computed(AttributeType::String));
    Attribute::computed(AttributeType::Object { attributes: block })
}

/// Desired endpoint set from the declared private networks.
pub(crate) fn desired_endpoints(networks: Option<&[PrivateNetwork]>) -> Vec<EndpointSpec> {
    networks
        .unwrap_or_default()
        .iter()
        .map(PrivateNetwork::to_spec)
        .collect()
}

/// Splits observed endpoints into the state blocks.
pub(crate) fn endpoint_state(
    locality: &str,
    endpoints: &[ApiEndpoint],
) -> (Vec<PrivateNetwork>, Option<PublicNetwork>) {
    let mut private = Vec::new();
    let mut public = None;
    for e in endpoints {
        let observed = e.to_endpoint();
        match observed.spec {
            EndpointSpec::PrivateNetwork {
                private_network_id,
                service_ips,
                zone,
            } => private.push(PrivateNetwork {
                id: id::format(zone.as_deref().unwrap_or(locality), id::expand(&private_network_id)),
                service_ips: Some(service_ips),
                zone,
                endpoint_id: Some(observed.id),
            }),
            EndpointSpec::PublicNetwork {} => {
                public = Some(PublicNetwork {
                    endpoint_id: observed.id,
                    ips: observed.ips,
                    port: observed.port,
                    hostname: observed.hostname,
                })
            }
            _ => {}
        }
    }
    (private, public)
}

/// Fills `service_ips` of private networks whose addresses were assigned
/// by IPAM and are not echoed by the product API. Lacking IPAM read rights
/// only costs the addresses: a warning is pushed and the blocks stay as
/// observed.
pub(crate) async fn fill_ipam_ips(
    ipam: &dyn IpamApi,
    region: &str,
    resource_type: &str,
    resource_id: &str,
    networks: &mut [PrivateNetwork],
    diags: &mut Diagnostics,
) -> Result<()> {
    let unassigned = |n: &PrivateNetwork| n.service_ips.as_ref().is_none_or(Vec::is_empty);
    if !networks.iter().any(unassigned) {
        return Ok(());
    }

    let ips = match ipam.list_ips(region, resource_type, resource_id).await {
        Ok(ips) => ips,
        Err(e) if e.kind() == ErrorKind::Unauthorized => {
            tracing::warn!("Cannot read private IPs of {} {}: {}", resource_type, resource_id, e);
            diags.push(Diagnostic::warning_from(&e).with_attribute("private_network"));
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for network in networks.iter_mut().filter(|n| unassigned(n)) {
        let wanted = id::expand(&network.id);
        network.service_ips = Some(
            ips.iter()
                .filter(|ip| ip.source.private_network_id.as_deref().map(id::expand) == Some(wanted))
                .map(|ip| ip.address.clone())
                .collect(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_state_localizes_network_ids() {
        let endpoints: Vec<ApiEndpoint> = serde_json::from_value(json!([
            {"id": "ep-1", "private_network": {"id": "pn-1", "service_ips": ["10.0.0.2/24"]}},
            {"id": "ep-2", "public_network": {}, "ips": ["51.1.1.1"], "port": 6379}
        ]))
        .unwrap();
        let (private, public) = endpoint_state("fr-par-1", &endpoints);
        assert_eq!(private[0].id, "fr-par-1/pn-1");
        assert_eq!(private[0].endpoint_id.as_deref(), Some("ep-1"));
        let public = public.unwrap();
        assert_eq!(public.port, Some(6379));
        assert_eq!(public.ips, vec!["51.1.1.1".to_string()]);
    }

    #[test]
    fn test_desired_endpoints() {
        let declared = vec![PrivateNetwork {
            id: "fr-par-1/pn-1".into(),
            ..Default::default()
        }];
        let specs = desired_endpoints(Some(&declared));
        assert_eq!(specs[0].identity(), "private_network:pn-1");
        assert!(desired_endpoints(None).is_empty());
    }
}
