//! Scaleway provider for scwflow
//!
//! This crate implements the `scaleway_*` resource kinds on top of the
//! `scwflow-cloud` harness.
//!
//! # Resources
//!
//! - `scaleway_block_volume`, `scaleway_block_snapshot`
//! - `scaleway_redis_cluster`
//! - `scaleway_mongodb_instance`
//! - `scaleway_documentdb_instance`, `scaleway_documentdb_user`,
//!   `scaleway_documentdb_privilege`
//! - `scaleway_container`
//!
//! Data sources, by ID or exact name: `scaleway_block_volume`,
//! `scaleway_block_snapshot`, `scaleway_redis_cluster`,
//! `scaleway_mongodb_instance`, `scaleway_documentdb_instance`,
//! `scaleway_container`.
//!
//! # Example
//!
//! ```ignore
//! use scwflow_cloud::Provider;
//!
//! let mut provider = Provider::new(scwflow_cloud_scaleway::builder())?;
//! provider.configure(serde_json::json!({"access_key": "SCW...", "secret_key": "..."}));
//! ```

pub mod api;
pub mod client;
pub mod resources;
pub mod sweepers;

#[cfg(test)]
mod testing;

pub use api::ScalewayApi;
pub use client::ScalewayClient;

use resources::block_snapshot::BlockSnapshot;
use resources::block_volume::BlockVolume;
use resources::container::ServerlessContainer;
use resources::data_sources::{
    BlockSnapshotLookup, BlockVolumeLookup, ContainerLookup, DocumentDbInstanceLookup,
    MongoDbInstanceLookup, RedisClusterLookup,
};
use resources::documentdb_instance::DocumentDbInstance;
use resources::documentdb_privilege::DocumentDbPrivilege;
use resources::documentdb_user::DocumentDbUser;
use resources::mongodb_instance::MongoDbInstance;
use resources::redis_cluster::RedisCluster;
use scwflow_cloud::{Builder, Lifecycle, Lookups, Registry};
use std::sync::Arc;

/// Every resource kind and data source, served through `api`.
pub fn registry<A: ScalewayApi + 'static>(api: Arc<A>) -> Registry {
    Registry::new()
        .resource(Lifecycle::new(BlockVolume::new(api.clone())))
        .resource(Lifecycle::new(BlockSnapshot::new(api.clone())))
        .resource(Lifecycle::new(RedisCluster::new(api.clone(), api.clone())))
        .resource(Lifecycle::new(MongoDbInstance::new(api.clone(), api.clone())))
        .resource(Lifecycle::new(DocumentDbInstance::new(api.clone())))
        .resource(Lifecycle::new(DocumentDbUser::new(api.clone())))
        .resource(Lifecycle::new(DocumentDbPrivilege::new(api.clone())))
        .resource(Lifecycle::new(ServerlessContainer::new(api.clone())))
        .data_source(Lookups::new(BlockVolumeLookup::new(api.clone())))
        .data_source(Lookups::new(BlockSnapshotLookup::new(api.clone())))
        .data_source(Lookups::new(RedisClusterLookup::new(api.clone())))
        .data_source(Lookups::new(MongoDbInstanceLookup::new(api.clone())))
        .data_source(Lookups::new(DocumentDbInstanceLookup::new(api.clone())))
        .data_source(Lookups::new(ContainerLookup::new(api)))
}

/// Builds the registry against a [`ScalewayClient`] for each configuration.
pub fn builder() -> Builder {
    Box::new(|config| {
        let client = ScalewayClient::new(config)?;
        Ok(registry(Arc::new(client)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCloud;

    #[test]
    fn test_registry_serves_every_kind() {
        let registry = registry(Arc::new(FakeCloud::new()));
        let types: Vec<&str> = registry.resource_types().collect();
        assert_eq!(types.len(), 8);
        assert!(types.contains(&"scaleway_documentdb_privilege"));
        assert!(registry.get_data_source("scaleway_block_volume").is_ok());
        assert!(registry.get_data_source("scaleway_redis_cluster").is_ok());
        for kind in [
            "scaleway_block_snapshot",
            "scaleway_mongodb_instance",
            "scaleway_documentdb_instance",
            "scaleway_container",
        ] {
            assert!(registry.get_data_source(kind).is_ok(), "{}", kind);
        }
        assert!(registry.get_data_source("scaleway_documentdb_user").is_err());
        assert!(registry.get_resource("scaleway_instance_server").is_err());
    }

    #[test]
    fn test_schema_marks_secrets_sensitive() {
        let schema = registry(Arc::new(FakeCloud::new())).schema();
        let redis = &schema.resources["scaleway_redis_cluster"];
        assert!(redis.get("password").unwrap().sensitive);
        assert!(redis.get("zone").unwrap().force_new);
        let user = &schema.resources["scaleway_documentdb_user"];
        assert!(user.get("region").is_some());
    }

    #[test]
    fn test_builder_needs_no_network() {
        let registry = builder()(&scwflow_config::ProviderConfig::default()).unwrap();
        assert_eq!(registry.resource_types().count(), 8);
    }
}
