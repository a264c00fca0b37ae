//! Read-only lookups by ID or exact name
//!
//! Block volumes, block snapshots and Redis clusters are zoned; MongoDB
//! instances, DocumentDB instances and containers are regional. Kinds whose
//! list call has no name filter are filtered here.

use super::block_snapshot::SnapshotState;
use super::block_volume::VolumeState;
use super::container::ContainerState;
use super::redis_cluster::ClusterState;
use super::{documentdb_instance, mongodb_instance};
use super::{private_network_attribute, public_network_attribute, string_list};
use crate::api::{BlockApi, ContainerApi, DocumentDbApi, MongoDbApi, RedisApi};
use async_trait::async_trait;
use scwflow_cloud::{
    Attribute, AttributeType, DataSource, LocalizedId, Meta, OpContext, Result, Schema, Scope,
};
use std::sync::Arc;

fn lookup_schema(id_attribute: &str) -> Schema {
    Schema::v0()
        .with_attribute(id_attribute, Attribute::optional_computed(AttributeType::String))
        .with_attribute("name", Attribute::optional_computed(AttributeType::String))
        .with_attribute("tags", Attribute::computed(string_list()))
        .with_attribute("project_id", Attribute::computed(AttributeType::String))
        .with_attribute("status", Attribute::computed(AttributeType::String))
}

pub struct BlockVolumeLookup {
    api: Arc<dyn BlockApi>,
}

impl BlockVolumeLookup {
    pub fn new(api: Arc<dyn BlockApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for BlockVolumeLookup {
    type Item = VolumeState;

    fn type_name(&self) -> &'static str {
        "scaleway_block_volume"
    }

    fn schema(&self) -> Schema {
        lookup_schema("volume_id")
            .with_attribute("size_in_gb", Attribute::computed(AttributeType::Integer))
            .with_attribute("iops", Attribute::computed(AttributeType::Integer))
            .with_attribute("snapshot_id", Attribute::computed(AttributeType::String))
            .zoned()
    }

    fn scope(&self) -> Scope {
        Scope::Zone
    }

    fn id_attribute(&self) -> &'static str {
        "volume_id"
    }

    async fn get(&self, _ctx: &OpContext, _meta: &Meta, id: &LocalizedId) -> Result<VolumeState> {
        Ok(self.api.get_volume(id.locality(), id.id()).await?.into())
    }

    async fn list_by_name(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        locality: &str,
        name: &str,
    ) -> Result<Vec<(String, VolumeState)>> {
        let volumes = self.api.list_volumes(locality, Some(name)).await?;
        Ok(volumes
            .into_iter()
            .map(|v| (v.id.clone(), VolumeState::from(v)))
            .collect())
    }

    fn name_of<'a>(&self, item: &'a VolumeState) -> &'a str {
        &item.name
    }
}

pub struct RedisClusterLookup {
    api: Arc<dyn RedisApi>,
}

impl RedisClusterLookup {
    pub fn new(api: Arc<dyn RedisApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for RedisClusterLookup {
    type Item = ClusterState;

    fn type_name(&self) -> &'static str {
        "scaleway_redis_cluster"
    }

    fn schema(&self) -> Schema {
        lookup_schema("cluster_id")
            .with_attribute("version", Attribute::computed(AttributeType::String))
            .with_attribute("node_type", Attribute::computed(AttributeType::String))
            .with_attribute("cluster_size", Attribute::computed(AttributeType::Integer))
            .with_attribute("tls_enabled", Attribute::computed(AttributeType::Boolean))
            .with_attribute("settings", Attribute::computed(AttributeType::Map))
            .with_attribute("private_network", private_network_attribute())
            .with_attribute("public_network", public_network_attribute())
            .zoned()
    }

    fn scope(&self) -> Scope {
        Scope::Zone
    }

    fn id_attribute(&self) -> &'static str {
        "cluster_id"
    }

    async fn get(&self, _ctx: &OpContext, _meta: &Meta, id: &LocalizedId) -> Result<ClusterState> {
        Ok(self.api.get_cluster(id.locality(), id.id()).await?.into())
    }

    async fn list_by_name(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        locality: &str,
        name: &str,
    ) -> Result<Vec<(String, ClusterState)>> {
        let clusters = self.api.list_clusters(locality, Some(name)).await?;
        Ok(clusters
            .into_iter()
            .map(|c| (c.id.clone(), ClusterState::from(c)))
            .collect())
    }

    fn name_of<'a>(&self, item: &'a ClusterState) -> &'a str {
        &item.name
    }
}

pub struct BlockSnapshotLookup {
    api: Arc<dyn BlockApi>,
}

impl BlockSnapshotLookup {
    pub fn new(api: Arc<dyn BlockApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for BlockSnapshotLookup {
    type Item = SnapshotState;

    fn type_name(&self) -> &'static str {
        "scaleway_block_snapshot"
    }

    fn schema(&self) -> Schema {
        lookup_schema("snapshot_id")
            .with_attribute("volume_id", Attribute::computed(AttributeType::String))
            .with_attribute("size_in_gb", Attribute::computed(AttributeType::Integer))
            .zoned()
    }

    fn scope(&self) -> Scope {
        Scope::Zone
    }

    fn id_attribute(&self) -> &'static str {
        "snapshot_id"
    }

    async fn get(&self, _ctx: &OpContext, _meta: &Meta, id: &LocalizedId) -> Result<SnapshotState> {
        Ok(self.api.get_snapshot(id.locality(), id.id()).await?.into())
    }

    async fn list_by_name(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        locality: &str,
        name: &str,
    ) -> Result<Vec<(String, SnapshotState)>> {
        let snapshots = self.api.list_snapshots(locality).await?;
        Ok(snapshots
            .into_iter()
            .filter(|s| s.name == name)
            .map(|s| (s.id.clone(), SnapshotState::from(s)))
            .collect())
    }

    fn name_of<'a>(&self, item: &'a SnapshotState) -> &'a str {
        &item.name
    }
}

fn database_schema(id_attribute: &str) -> Schema {
    lookup_schema(id_attribute)
        .with_attribute("node_type", Attribute::computed(AttributeType::String))
        .with_attribute("volume_type", Attribute::computed(AttributeType::String))
        .with_attribute("volume_size_in_gb", Attribute::computed(AttributeType::Integer))
        .with_attribute("private_network", private_network_attribute())
        .with_attribute("public_network", public_network_attribute())
        .with_attribute("created_at", Attribute::computed(AttributeType::String))
        .regional()
}

pub struct MongoDbInstanceLookup {
    api: Arc<dyn MongoDbApi>,
}

impl MongoDbInstanceLookup {
    pub fn new(api: Arc<dyn MongoDbApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for MongoDbInstanceLookup {
    type Item = mongodb_instance::InstanceState;

    fn type_name(&self) -> &'static str {
        "scaleway_mongodb_instance"
    }

    fn schema(&self) -> Schema {
        database_schema("instance_id")
            .with_attribute("version", Attribute::computed(AttributeType::String))
            .with_attribute("node_number", Attribute::computed(AttributeType::Integer))
    }

    fn scope(&self) -> Scope {
        Scope::Region
    }

    fn id_attribute(&self) -> &'static str {
        "instance_id"
    }

    async fn get(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &LocalizedId,
    ) -> Result<mongodb_instance::InstanceState> {
        Ok(self.api.get_mongodb_instance(id.locality(), id.id()).await?.into())
    }

    async fn list_by_name(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        locality: &str,
        name: &str,
    ) -> Result<Vec<(String, mongodb_instance::InstanceState)>> {
        let instances = self.api.list_mongodb_instances(locality).await?;
        Ok(instances
            .into_iter()
            .filter(|i| i.name == name)
            .map(|i| (i.id.clone(), i.into()))
            .collect())
    }

    fn name_of<'a>(&self, item: &'a mongodb_instance::InstanceState) -> &'a str {
        &item.name
    }
}

pub struct DocumentDbInstanceLookup {
    api: Arc<dyn DocumentDbApi>,
}

impl DocumentDbInstanceLookup {
    pub fn new(api: Arc<dyn DocumentDbApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for DocumentDbInstanceLookup {
    type Item = documentdb_instance::InstanceState;

    fn type_name(&self) -> &'static str {
        "scaleway_documentdb_instance"
    }

    fn schema(&self) -> Schema {
        database_schema("instance_id")
            .with_attribute("engine", Attribute::computed(AttributeType::String))
            .with_attribute("is_ha_cluster", Attribute::computed(AttributeType::Boolean))
    }

    fn scope(&self) -> Scope {
        Scope::Region
    }

    fn id_attribute(&self) -> &'static str {
        "instance_id"
    }

    async fn get(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &LocalizedId,
    ) -> Result<documentdb_instance::InstanceState> {
        Ok(self.api.get_documentdb_instance(id.locality(), id.id()).await?.into())
    }

    async fn list_by_name(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        locality: &str,
        name: &str,
    ) -> Result<Vec<(String, documentdb_instance::InstanceState)>> {
        let instances = self.api.list_documentdb_instances(locality).await?;
        Ok(instances
            .into_iter()
            .filter(|i| i.name == name)
            .map(|i| (i.id.clone(), i.into()))
            .collect())
    }

    fn name_of<'a>(&self, item: &'a documentdb_instance::InstanceState) -> &'a str {
        &item.name
    }
}

/// Container names are unique per namespace only, so a name lookup spanning
/// namespaces can be ambiguous.
pub struct ContainerLookup {
    api: Arc<dyn ContainerApi>,
}

impl ContainerLookup {
    pub fn new(api: Arc<dyn ContainerApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for ContainerLookup {
    type Item = ContainerState;

    fn type_name(&self) -> &'static str {
        "scaleway_container"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("container_id", Attribute::optional_computed(AttributeType::String))
            .with_attribute("name", Attribute::optional_computed(AttributeType::String))
            .with_attribute("namespace_id", Attribute::computed(AttributeType::String))
            .with_attribute("description", Attribute::computed(AttributeType::String))
            .with_attribute("environment_variables", Attribute::computed(AttributeType::Map))
            .with_attribute("min_scale", Attribute::computed(AttributeType::Integer))
            .with_attribute("max_scale", Attribute::computed(AttributeType::Integer))
            .with_attribute("memory_limit", Attribute::computed(AttributeType::Integer))
            .with_attribute("cpu_limit", Attribute::computed(AttributeType::Integer))
            .with_attribute("timeout", Attribute::computed(AttributeType::String))
            .with_attribute("privacy", Attribute::computed(AttributeType::String))
            .with_attribute("registry_image", Attribute::computed(AttributeType::String))
            .with_attribute("max_concurrency", Attribute::computed(AttributeType::Integer))
            .with_attribute("port", Attribute::computed(AttributeType::Integer))
            .with_attribute("protocol", Attribute::computed(AttributeType::String))
            .with_attribute("domain_name", Attribute::computed(AttributeType::String))
            .with_attribute("status", Attribute::computed(AttributeType::String))
            .regional()
    }

    fn scope(&self) -> Scope {
        Scope::Region
    }

    fn id_attribute(&self) -> &'static str {
        "container_id"
    }

    async fn get(&self, _ctx: &OpContext, _meta: &Meta, id: &LocalizedId) -> Result<ContainerState> {
        Ok(self.api.get_container(id.locality(), id.id()).await?.into())
    }

    async fn list_by_name(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        locality: &str,
        name: &str,
    ) -> Result<Vec<(String, ContainerState)>> {
        let containers = self.api.list_containers(locality).await?;
        Ok(containers
            .into_iter()
            .filter(|c| c.name == name)
            .map(|c| (c.id.clone(), ContainerState::from(c)))
            .collect())
    }

    fn name_of<'a>(&self, item: &'a ContainerState) -> &'a str {
        &item.name
    }
}
