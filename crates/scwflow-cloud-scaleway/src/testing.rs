//! In-memory Scaleway for the resource tests
//!
//! Every call is journaled as `"<method> <args...>"`. After a mutation an
//! object reports a transient status for `busy_polls` reads before settling;
//! child-object calls (DocumentDB users and privileges) fail with a conflict
//! while their instance is busy.

use crate::api::block::{
    BlockApi, CreateSnapshotRequest, CreateVolumeRequest, ParentVolume, Snapshot, SnapshotStatus,
    UpdateSnapshotRequest, UpdateVolumeRequest, Volume, VolumeSpecs, VolumeStatus,
};
use crate::api::container::{
    Container, ContainerApi, ContainerStatus, CreateContainerRequest, UpdateContainerRequest,
};
use crate::api::documentdb::{
    self, CreateUserRequest, DocumentDbApi, Permission, Privilege, UpdateUserRequest, User,
};
use crate::api::ipam::{Ip, IpResource, IpSource, IpamApi};
use crate::api::mongodb::{self, MongoDbApi};
use crate::api::redis::{
    AclRule, Cluster, ClusterSetting, ClusterStatus, CreateClusterRequest, MigrateClusterRequest,
    RedisApi, UpdateClusterRequest,
};
use crate::api::{ApiEndpoint, EndpointBody, KeyValue};
use async_trait::async_trait;
use chrono::Utc;
use scwflow_cloud::{CloudError, Defaults, LocalizedId, Meta, Region, Result, WaitSettings, Zone};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub const PROJECT: &str = "11111111-0000-0000-0000-000000000000";

/// Provider defaults `fr-par-1` / `fr-par` with millisecond polling.
pub fn meta() -> Meta {
    Meta::new(
        Defaults {
            zone: Some(Zone::parse("fr-par-1").unwrap()),
            region: Some(Region::parse("fr-par").unwrap()),
            project_id: Some(PROJECT.to_string()),
        },
        WaitSettings::fast(Duration::from_millis(1)),
    )
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn absent(kind: &str, id: &str) -> CloudError {
    CloudError::NotFound(format!("{} {} not found", kind, id))
}

#[derive(Default)]
struct World {
    calls: Vec<String>,
    busy_polls: u32,
    pending: HashMap<String, u32>,
    fail_create: bool,
    failures: HashMap<String, String>,
    denied: HashSet<String>,
    injected_conflicts: HashMap<String, u32>,
    conflicts: usize,
    next_ip: u32,
    ipam_mode: bool,
    ipam: Vec<Ip>,

    volumes: HashMap<String, Volume>,
    snapshots: HashMap<String, Snapshot>,
    clusters: HashMap<String, Cluster>,
    mongodb: HashMap<String, mongodb::Instance>,
    documentdb: HashMap<String, documentdb::Instance>,
    users: HashMap<String, Vec<User>>,
    privileges: HashMap<String, Vec<Privilege>>,
    containers: HashMap<String, Container>,
    secrets: HashMap<String, BTreeMap<String, String>>,
}

impl World {
    /// Journals the call and fires an injected failure for `op`, if any.
    fn enter(&mut self, op: &str, args: String) -> Result<()> {
        self.calls.push(format!("{} {}", op, args));
        if self.denied.remove(op) {
            return Err(CloudError::Unauthorized(format!("403 permission denied for {}", op)));
        }
        match self.failures.remove(op) {
            Some(message) => Err(CloudError::Transport(message)),
            None => Ok(()),
        }
    }

    fn touch(&mut self, id: &str) {
        self.pending.insert(id.to_string(), self.busy_polls);
    }

    /// Consumes one busy poll of `id`; true while it is still settling.
    fn settling(&mut self, id: &str) -> bool {
        match self.pending.get_mut(id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn busy(&self, id: &str) -> bool {
        self.pending.get(id).is_some_and(|n| *n > 0)
    }

    /// Child calls conflict while their instance settles.
    fn guard(&mut self, op: &str, instance: &str) -> Result<()> {
        let injected = match self.injected_conflicts.get_mut(op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        };
        if injected || self.busy(instance) {
            self.conflicts += 1;
            self.calls.push(format!("conflict {} {}", op, instance));
            return Err(CloudError::Conflict(format!(
                "instance {} is in a transient state",
                instance
            )));
        }
        Ok(())
    }

    fn take_fail_create(&mut self) -> bool {
        std::mem::take(&mut self.fail_create)
    }

    /// Materializes an endpoint of `owner`. Private networks without
    /// service IPs get one; in IPAM mode it is filed with IPAM instead of
    /// being echoed in the endpoint.
    fn endpoint(&mut self, owner: &str, body: &EndpointBody, port: u16) -> ApiEndpoint {
        self.next_ip += 1;
        let id = new_id();
        let mut kind = body.clone();
        let (ips, dns_record) = match kind.private_network.as_mut() {
            Some(pn) => {
                let ip = if pn.service_ips.is_empty() {
                    let address = format!("10.{}.0.5/22", self.next_ip);
                    if self.ipam_mode {
                        self.ipam.push(Ip {
                            id: new_id(),
                            address: address.clone(),
                            source: IpSource {
                                private_network_id: Some(pn.private_network_id.clone()),
                            },
                            resource: Some(IpResource {
                                id: owner.to_string(),
                                resource_type: "fake".to_string(),
                            }),
                        });
                    } else {
                        pn.service_ips = vec![address.clone()];
                    }
                    address
                } else {
                    pn.service_ips[0].clone()
                };
                let ip = ip.split('/').next().unwrap_or_default().to_string();
                (vec![ip], None)
            }
            None => (
                vec![format!("51.159.{}.10", self.next_ip)],
                Some(format!("{}.pub.scw.cloud", &id[..8])),
            ),
        };
        ApiEndpoint {
            id,
            ips,
            port: Some(port),
            dns_record,
            dns_records: Vec::new(),
            kind,
        }
    }
}

#[derive(Default)]
pub struct FakeCloud {
    world: Mutex<World>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self) -> std::sync::MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    /// Transient reads each object reports after a mutation.
    pub fn set_busy_polls(&self, n: u32) {
        self.world().busy_polls = n;
    }

    pub fn calls(&self) -> Vec<String> {
        self.world().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.world().calls.clear();
    }

    /// Number of journaled calls to `op`.
    pub fn count(&self, op: &str) -> usize {
        self.world()
            .calls
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(op))
            .count()
    }

    pub fn conflicts(&self) -> usize {
        self.world().conflicts
    }

    /// The next created object lands in its error status.
    pub fn fail_next_create(&self) {
        self.world().fail_create = true;
    }

    /// The next call to `op` fails with a transport error.
    pub fn fail_next(&self, op: &str, message: &str) {
        self.world()
            .failures
            .insert(op.to_string(), message.to_string());
    }

    /// Forces the status of the Redis cluster at `id` (`zone/uuid`).
    pub fn set_cluster_status(&self, id: &str, status: ClusterStatus) {
        let id = LocalizedId::parse(id).unwrap();
        if let Some(cluster) = self.world().clusters.get_mut(id.id()) {
            cluster.status = status;
        }
    }

    /// The next call to `op` is refused with a 403.
    pub fn deny_next(&self, op: &str) {
        self.world().denied.insert(op.to_string());
    }

    /// Private network addresses are assigned through IPAM from now on and
    /// no longer echoed in endpoints.
    pub fn assign_with_ipam(&self) {
        self.world().ipam_mode = true;
    }

    /// The next `n` calls to `op` conflict regardless of instance state.
    pub fn inject_conflicts(&self, op: &str, n: u32) {
        self.world().injected_conflicts.insert(op.to_string(), n);
    }

    /// Snapshot of the volume at `volume` (`zone/uuid`); returns its localized ID.
    pub fn seed_snapshot(&self, volume: &str) -> String {
        let volume = LocalizedId::parse(volume).unwrap();
        let mut world = self.world();
        let source = world.volumes[volume.id()].clone();
        let snapshot = Snapshot {
            id: new_id(),
            name: format!("{}-snap", source.name),
            size: source.size,
            project_id: source.project_id,
            zone: source.zone.clone(),
            status: SnapshotStatus::Available,
            tags: Vec::new(),
            parent_volume: Some(ParentVolume {
                id: source.id,
                name: source.name,
            }),
            created_at: Some(Utc::now()),
        };
        let id = format!("{}/{}", snapshot.zone, snapshot.id);
        world.snapshots.insert(snapshot.id.clone(), snapshot);
        id
    }

    /// Secret environment last sent for the container at `id` (`region/uuid`).
    pub fn container_secrets(&self, id: &str) -> BTreeMap<String, String> {
        let id = LocalizedId::parse(id).unwrap();
        self.world().secrets.get(id.id()).cloned().unwrap_or_default()
    }

    /// A ready DocumentDB instance in `region`; returns its localized ID.
    pub fn seed_documentdb_instance(&self, region: &str) -> String {
        let instance = documentdb::Instance {
            id: new_id(),
            name: "seeded".to_string(),
            project_id: PROJECT.to_string(),
            region: region.to_string(),
            status: ClusterStatus::Ready,
            engine: "FerretDB-1".to_string(),
            node_type: "DOCDB-PLAY2-PICO".to_string(),
            is_ha_cluster: false,
            volume: None,
            tags: Vec::new(),
            endpoints: Vec::new(),
            created_at: Some(Utc::now()),
        };
        let id = format!("{}/{}", region, instance.id);
        self.world().documentdb.insert(instance.id.clone(), instance);
        id
    }
}

#[async_trait]
impl BlockApi for FakeCloud {
    async fn create_volume(&self, zone: &str, req: &CreateVolumeRequest) -> Result<Volume> {
        let mut w = self.world();
        w.enter("create_volume", format!("{} {}", zone, req.name))?;
        let (size, parent) = match (&req.from_empty, &req.from_snapshot) {
            (_, Some(from)) => {
                let snapshot = w
                    .snapshots
                    .get(&from.snapshot_id)
                    .ok_or_else(|| absent("snapshot", &from.snapshot_id))?;
                (snapshot.size.max(from.size.unwrap_or(0)), Some(snapshot.id.clone()))
            }
            (Some(empty), None) => (empty.size, None),
            (None, None) => {
                return Err(CloudError::validation("size", "from_empty or from_snapshot is required"));
            }
        };
        let status = if w.take_fail_create() {
            VolumeStatus::Error
        } else {
            VolumeStatus::Available
        };
        let volume = Volume {
            id: new_id(),
            name: req.name.clone(),
            size,
            project_id: req.project_id.clone().unwrap_or_else(|| PROJECT.to_string()),
            zone: zone.to_string(),
            status,
            tags: req.tags.clone(),
            specs: Some(VolumeSpecs {
                perf_iops: req.perf_iops,
                class: Some("sbs".to_string()),
            }),
            parent_snapshot_id: parent,
            created_at: Some(Utc::now()),
        };
        w.touch(&volume.id);
        w.volumes.insert(volume.id.clone(), volume.clone());
        Ok(volume)
    }

    async fn get_volume(&self, zone: &str, id: &str) -> Result<Volume> {
        let mut w = self.world();
        w.enter("get_volume", format!("{} {}", zone, id))?;
        let mut volume = w
            .volumes
            .get(id)
            .filter(|v| v.zone == zone)
            .cloned()
            .ok_or_else(|| absent("volume", id))?;
        if w.settling(id) {
            volume.status = VolumeStatus::Updating;
        }
        Ok(volume)
    }

    async fn update_volume(&self, zone: &str, id: &str, req: &UpdateVolumeRequest) -> Result<Volume> {
        let mut w = self.world();
        w.enter("update_volume", format!("{} {}", zone, id))?;
        let volume = w.volumes.get_mut(id).ok_or_else(|| absent("volume", id))?;
        if let Some(name) = &req.name {
            volume.name = name.clone();
        }
        if let Some(size) = req.size {
            volume.size = size;
        }
        if let Some(tags) = &req.tags {
            volume.tags = tags.clone();
        }
        let volume = volume.clone();
        w.touch(id);
        Ok(volume)
    }

    async fn delete_volume(&self, zone: &str, id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_volume", format!("{} {}", zone, id))?;
        w.volumes.remove(id).ok_or_else(|| absent("volume", id))?;
        for snapshot in w.snapshots.values_mut() {
            if snapshot.parent_volume.as_ref().is_some_and(|p| p.id == id) {
                snapshot.parent_volume = None;
            }
        }
        Ok(())
    }

    async fn list_volumes(&self, zone: &str, name: Option<&str>) -> Result<Vec<Volume>> {
        let mut w = self.world();
        w.enter("list_volumes", zone.to_string())?;
        Ok(w.volumes
            .values()
            .filter(|v| v.zone == zone && name.is_none_or(|n| v.name.contains(n)))
            .cloned()
            .collect())
    }

    async fn create_snapshot(&self, zone: &str, req: &CreateSnapshotRequest) -> Result<Snapshot> {
        let mut w = self.world();
        w.enter("create_snapshot", format!("{} {}", zone, req.volume_id))?;
        let volume = w
            .volumes
            .get(&req.volume_id)
            .filter(|v| v.zone == zone)
            .cloned()
            .ok_or_else(|| absent("volume", &req.volume_id))?;
        let status = if w.take_fail_create() {
            SnapshotStatus::Error
        } else {
            SnapshotStatus::Available
        };
        let snapshot = Snapshot {
            id: new_id(),
            name: req.name.clone(),
            size: volume.size,
            project_id: req.project_id.clone().unwrap_or_else(|| PROJECT.to_string()),
            zone: zone.to_string(),
            status,
            tags: req.tags.clone(),
            parent_volume: Some(ParentVolume {
                id: volume.id,
                name: volume.name,
            }),
            created_at: Some(Utc::now()),
        };
        w.touch(&snapshot.id);
        w.snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, zone: &str, id: &str) -> Result<Snapshot> {
        let mut w = self.world();
        w.enter("get_snapshot", format!("{} {}", zone, id))?;
        let mut snapshot = w
            .snapshots
            .get(id)
            .filter(|s| s.zone == zone)
            .cloned()
            .ok_or_else(|| absent("snapshot", id))?;
        if w.settling(id) {
            snapshot.status = SnapshotStatus::Creating;
        }
        Ok(snapshot)
    }

    async fn update_snapshot(&self, zone: &str, id: &str, req: &UpdateSnapshotRequest) -> Result<Snapshot> {
        let mut w = self.world();
        w.enter("update_snapshot", format!("{} {}", zone, id))?;
        let snapshot = w.snapshots.get_mut(id).ok_or_else(|| absent("snapshot", id))?;
        if let Some(name) = &req.name {
            snapshot.name = name.clone();
        }
        if let Some(tags) = &req.tags {
            snapshot.tags = tags.clone();
        }
        Ok(snapshot.clone())
    }

    async fn delete_snapshot(&self, zone: &str, id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_snapshot", format!("{} {}", zone, id))?;
        w.snapshots.remove(id).ok_or_else(|| absent("snapshot", id))?;
        Ok(())
    }

    async fn list_snapshots(&self, zone: &str) -> Result<Vec<Snapshot>> {
        let mut w = self.world();
        w.enter("list_snapshots", zone.to_string())?;
        Ok(w.snapshots.values().filter(|s| s.zone == zone).cloned().collect())
    }
}

const REDIS_PORT: u16 = 6379;

#[async_trait]
impl RedisApi for FakeCloud {
    async fn create_cluster(&self, zone: &str, req: &CreateClusterRequest) -> Result<Cluster> {
        let mut w = self.world();
        w.enter("create_cluster", format!("{} {}", zone, req.name))?;
        let id = new_id();
        let endpoints = req
            .endpoints
            .iter()
            .map(|e| w.endpoint(&id, e, REDIS_PORT))
            .collect();
        let status = if w.take_fail_create() {
            ClusterStatus::Error
        } else {
            ClusterStatus::Ready
        };
        let cluster = Cluster {
            id,
            name: req.name.clone(),
            project_id: req.project_id.clone().unwrap_or_else(|| PROJECT.to_string()),
            zone: zone.to_string(),
            status,
            version: req.version.clone(),
            node_type: req.node_type.clone(),
            cluster_size: req.cluster_size.unwrap_or(1),
            tls_enabled: req.tls_enabled,
            tags: req.tags.clone(),
            acl_rules: with_rule_ids(&req.acl_rules),
            cluster_settings: req.cluster_settings.clone(),
            endpoints,
            created_at: Some(Utc::now()),
        };
        w.touch(&cluster.id);
        w.clusters.insert(cluster.id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn get_cluster(&self, zone: &str, id: &str) -> Result<Cluster> {
        let mut w = self.world();
        w.enter("get_cluster", format!("{} {}", zone, id))?;
        let mut cluster = w
            .clusters
            .get(id)
            .filter(|c| c.zone == zone)
            .cloned()
            .ok_or_else(|| absent("cluster", id))?;
        if w.settling(id) {
            cluster.status = ClusterStatus::Provisioning;
        }
        Ok(cluster)
    }

    async fn update_cluster(&self, zone: &str, id: &str, req: &UpdateClusterRequest) -> Result<Cluster> {
        let mut w = self.world();
        w.enter("update_cluster", format!("{} {}", zone, id))?;
        let cluster = w.clusters.get_mut(id).ok_or_else(|| absent("cluster", id))?;
        if let Some(name) = &req.name {
            cluster.name = name.clone();
        }
        if let Some(tags) = &req.tags {
            cluster.tags = tags.clone();
        }
        let cluster = cluster.clone();
        w.touch(id);
        Ok(cluster)
    }

    async fn migrate_cluster(&self, zone: &str, id: &str, req: &MigrateClusterRequest) -> Result<Cluster> {
        let mut w = self.world();
        w.enter("migrate_cluster", format!("{} {} {:?}", zone, id, req))?;
        let cluster = w.clusters.get_mut(id).ok_or_else(|| absent("cluster", id))?;
        match req {
            MigrateClusterRequest::Version(v) => cluster.version = v.clone(),
            MigrateClusterRequest::NodeType(t) => cluster.node_type = t.clone(),
            MigrateClusterRequest::ClusterSize(n) => cluster.cluster_size = *n,
        }
        let cluster = cluster.clone();
        w.touch(id);
        Ok(cluster)
    }

    async fn delete_cluster(&self, zone: &str, id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_cluster", format!("{} {}", zone, id))?;
        w.clusters.remove(id).ok_or_else(|| absent("cluster", id))?;
        Ok(())
    }

    async fn list_clusters(&self, zone: &str, name: Option<&str>) -> Result<Vec<Cluster>> {
        let mut w = self.world();
        w.enter("list_clusters", zone.to_string())?;
        Ok(w.clusters
            .values()
            .filter(|c| c.zone == zone && name.is_none_or(|n| c.name.contains(n)))
            .cloned()
            .collect())
    }

    async fn set_acl_rules(&self, zone: &str, id: &str, rules: &[AclRule]) -> Result<()> {
        let mut w = self.world();
        w.enter("set_acl_rules", format!("{} {} {}", zone, id, rules.len()))?;
        let cluster = w.clusters.get_mut(id).ok_or_else(|| absent("cluster", id))?;
        cluster.acl_rules = with_rule_ids(rules);
        w.touch(id);
        Ok(())
    }

    async fn set_cluster_settings(&self, zone: &str, id: &str, settings: &[ClusterSetting]) -> Result<()> {
        let mut w = self.world();
        w.enter("set_cluster_settings", format!("{} {} {}", zone, id, settings.len()))?;
        let cluster = w.clusters.get_mut(id).ok_or_else(|| absent("cluster", id))?;
        cluster.cluster_settings = settings.to_vec();
        w.touch(id);
        Ok(())
    }

    async fn add_cluster_endpoints(&self, zone: &str, id: &str, endpoints: &[EndpointBody]) -> Result<()> {
        let mut w = self.world();
        w.enter("add_cluster_endpoints", format!("{} {} {}", zone, id, endpoints.len()))?;
        if !w.clusters.contains_key(id) {
            return Err(absent("cluster", id));
        }
        let created: Vec<ApiEndpoint> = endpoints.iter().map(|e| w.endpoint(id, e, REDIS_PORT)).collect();
        if let Some(cluster) = w.clusters.get_mut(id) {
            cluster.endpoints.extend(created);
        }
        w.touch(id);
        Ok(())
    }

    async fn delete_cluster_endpoint(&self, zone: &str, endpoint_id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_cluster_endpoint", format!("{} {}", zone, endpoint_id))?;
        let owner = w
            .clusters
            .values_mut()
            .find(|c| c.endpoints.iter().any(|e| e.id == endpoint_id))
            .ok_or_else(|| absent("endpoint", endpoint_id))?;
        owner.endpoints.retain(|e| e.id != endpoint_id);
        let owner = owner.id.clone();
        w.touch(&owner);
        Ok(())
    }
}

fn with_rule_ids(rules: &[AclRule]) -> Vec<AclRule> {
    rules
        .iter()
        .map(|r| AclRule {
            id: Some(new_id()),
            ..r.clone()
        })
        .collect()
}

const MONGODB_PORT: u16 = 27017;

#[async_trait]
impl MongoDbApi for FakeCloud {
    async fn create_mongodb_instance(
        &self,
        region: &str,
        req: &mongodb::CreateInstanceRequest,
    ) -> Result<mongodb::Instance> {
        let mut w = self.world();
        w.enter("create_mongodb_instance", format!("{} {}", region, req.name))?;
        let id = new_id();
        let endpoints = req
            .endpoints
            .iter()
            .map(|e| w.endpoint(&id, e, MONGODB_PORT))
            .collect();
        let status = if w.take_fail_create() {
            ClusterStatus::Error
        } else {
            ClusterStatus::Ready
        };
        let instance = mongodb::Instance {
            id,
            name: req.name.clone(),
            project_id: req.project_id.clone().unwrap_or_else(|| PROJECT.to_string()),
            region: region.to_string(),
            status,
            version: req.version.clone(),
            node_type: req.node_type.clone(),
            node_amount: req.node_amount,
            volume: Some(mongodb::InstanceVolume {
                volume_type: req.volume.volume_type.clone(),
                size: req.volume.volume_size,
            }),
            tags: req.tags.clone(),
            endpoints,
            created_at: Some(Utc::now()),
        };
        w.touch(&instance.id);
        w.mongodb.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn get_mongodb_instance(&self, region: &str, id: &str) -> Result<mongodb::Instance> {
        let mut w = self.world();
        w.enter("get_mongodb_instance", format!("{} {}", region, id))?;
        let mut instance = w
            .mongodb
            .get(id)
            .filter(|i| i.region == region)
            .cloned()
            .ok_or_else(|| absent("mongodb instance", id))?;
        if w.settling(id) {
            instance.status = ClusterStatus::Configuring;
        }
        Ok(instance)
    }

    async fn update_mongodb_instance(
        &self,
        region: &str,
        id: &str,
        req: &mongodb::UpdateInstanceRequest,
    ) -> Result<mongodb::Instance> {
        let mut w = self.world();
        w.enter("update_mongodb_instance", format!("{} {}", region, id))?;
        let instance = w.mongodb.get_mut(id).ok_or_else(|| absent("mongodb instance", id))?;
        if let Some(name) = &req.name {
            instance.name = name.clone();
        }
        if let Some(tags) = &req.tags {
            instance.tags = tags.clone();
        }
        let instance = instance.clone();
        w.touch(id);
        Ok(instance)
    }

    async fn upgrade_mongodb_instance(
        &self,
        region: &str,
        id: &str,
        req: &mongodb::UpgradeInstanceRequest,
    ) -> Result<mongodb::Instance> {
        let mut w = self.world();
        w.enter("upgrade_mongodb_instance", format!("{} {} {:?}", region, id, req))?;
        let instance = w.mongodb.get_mut(id).ok_or_else(|| absent("mongodb instance", id))?;
        match req {
            mongodb::UpgradeInstanceRequest::VolumeSize(size) => {
                if let Some(volume) = instance.volume.as_mut() {
                    volume.size = *size;
                }
            }
            mongodb::UpgradeInstanceRequest::NodeAmount(n) => instance.node_amount = *n,
        }
        let instance = instance.clone();
        w.touch(id);
        Ok(instance)
    }

    async fn delete_mongodb_instance(&self, region: &str, id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_mongodb_instance", format!("{} {}", region, id))?;
        w.mongodb.remove(id).ok_or_else(|| absent("mongodb instance", id))?;
        Ok(())
    }

    async fn list_mongodb_instances(&self, region: &str) -> Result<Vec<mongodb::Instance>> {
        let mut w = self.world();
        w.enter("list_mongodb_instances", region.to_string())?;
        Ok(w.mongodb.values().filter(|i| i.region == region).cloned().collect())
    }

    async fn create_mongodb_endpoint(&self, region: &str, instance_id: &str, endpoint: &EndpointBody) -> Result<()> {
        let mut w = self.world();
        w.enter("create_mongodb_endpoint", format!("{} {}", region, instance_id))?;
        if !w.mongodb.contains_key(instance_id) {
            return Err(absent("mongodb instance", instance_id));
        }
        let created = w.endpoint(instance_id, endpoint, MONGODB_PORT);
        if let Some(instance) = w.mongodb.get_mut(instance_id) {
            instance.endpoints.push(created);
        }
        w.touch(instance_id);
        Ok(())
    }

    async fn delete_mongodb_endpoint(&self, region: &str, endpoint_id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_mongodb_endpoint", format!("{} {}", region, endpoint_id))?;
        let owner = w
            .mongodb
            .values_mut()
            .find(|i| i.endpoints.iter().any(|e| e.id == endpoint_id))
            .ok_or_else(|| absent("endpoint", endpoint_id))?;
        owner.endpoints.retain(|e| e.id != endpoint_id);
        let owner = owner.id.clone();
        w.touch(&owner);
        Ok(())
    }
}

const DOCUMENTDB_PORT: u16 = 27017;

#[async_trait]
impl DocumentDbApi for FakeCloud {
    async fn create_documentdb_instance(
        &self,
        region: &str,
        req: &documentdb::CreateInstanceRequest,
    ) -> Result<documentdb::Instance> {
        let mut w = self.world();
        w.enter("create_documentdb_instance", format!("{} {}", region, req.name))?;
        let id = new_id();
        let endpoints = req
            .init_endpoints
            .iter()
            .map(|e| w.endpoint(&id, e, DOCUMENTDB_PORT))
            .collect();
        let status = if w.take_fail_create() {
            ClusterStatus::Error
        } else {
            ClusterStatus::Ready
        };
        let instance = documentdb::Instance {
            id,
            name: req.name.clone(),
            project_id: req.project_id.clone().unwrap_or_else(|| PROJECT.to_string()),
            region: region.to_string(),
            status,
            engine: req.engine.clone(),
            node_type: req.node_type.clone(),
            is_ha_cluster: req.is_ha_cluster,
            volume: Some(documentdb::Volume {
                volume_type: req.volume_type.clone(),
                size: req.volume_size,
            }),
            tags: req.tags.clone(),
            endpoints,
            created_at: Some(Utc::now()),
        };
        w.touch(&instance.id);
        w.users.insert(
            instance.id.clone(),
            vec![User {
                name: req.user_name.clone(),
                is_admin: true,
            }],
        );
        w.documentdb.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn get_documentdb_instance(&self, region: &str, id: &str) -> Result<documentdb::Instance> {
        let mut w = self.world();
        w.enter("get_documentdb_instance", format!("{} {}", region, id))?;
        let mut instance = w
            .documentdb
            .get(id)
            .filter(|i| i.region == region)
            .cloned()
            .ok_or_else(|| absent("documentdb instance", id))?;
        if w.settling(id) {
            instance.status = ClusterStatus::Configuring;
        }
        Ok(instance)
    }

    async fn update_documentdb_instance(
        &self,
        region: &str,
        id: &str,
        req: &documentdb::UpdateInstanceRequest,
    ) -> Result<documentdb::Instance> {
        let mut w = self.world();
        w.enter("update_documentdb_instance", format!("{} {}", region, id))?;
        let instance = w
            .documentdb
            .get_mut(id)
            .ok_or_else(|| absent("documentdb instance", id))?;
        if let Some(name) = &req.name {
            instance.name = name.clone();
        }
        if let Some(tags) = &req.tags {
            instance.tags = tags.clone();
        }
        let instance = instance.clone();
        w.touch(id);
        Ok(instance)
    }

    async fn upgrade_documentdb_instance(
        &self,
        region: &str,
        id: &str,
        req: &documentdb::UpgradeInstanceRequest,
    ) -> Result<documentdb::Instance> {
        let mut w = self.world();
        w.enter("upgrade_documentdb_instance", format!("{} {} {:?}", region, id, req))?;
        let instance = w
            .documentdb
            .get_mut(id)
            .ok_or_else(|| absent("documentdb instance", id))?;
        match req {
            documentdb::UpgradeInstanceRequest::Engine(engine) => instance.engine = engine.clone(),
            documentdb::UpgradeInstanceRequest::NodeType(t) => instance.node_type = t.clone(),
            documentdb::UpgradeInstanceRequest::VolumeSize(size) => {
                if let Some(volume) = instance.volume.as_mut() {
                    volume.size = *size;
                }
            }
            documentdb::UpgradeInstanceRequest::EnableHa(ha) => instance.is_ha_cluster = *ha,
        }
        let instance = instance.clone();
        w.touch(id);
        Ok(instance)
    }

    async fn delete_documentdb_instance(&self, region: &str, id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_documentdb_instance", format!("{} {}", region, id))?;
        w.documentdb
            .remove(id)
            .ok_or_else(|| absent("documentdb instance", id))?;
        w.users.remove(id);
        w.privileges.remove(id);
        Ok(())
    }

    async fn list_documentdb_instances(&self, region: &str) -> Result<Vec<documentdb::Instance>> {
        let mut w = self.world();
        w.enter("list_documentdb_instances", region.to_string())?;
        Ok(w.documentdb
            .values()
            .filter(|i| i.region == region)
            .cloned()
            .collect())
    }

    async fn create_documentdb_endpoint(
        &self,
        region: &str,
        instance_id: &str,
        endpoint: &EndpointBody,
    ) -> Result<()> {
        let mut w = self.world();
        w.enter("create_documentdb_endpoint", format!("{} {}", region, instance_id))?;
        if !w.documentdb.contains_key(instance_id) {
            return Err(absent("documentdb instance", instance_id));
        }
        let created = w.endpoint(instance_id, endpoint, DOCUMENTDB_PORT);
        if let Some(instance) = w.documentdb.get_mut(instance_id) {
            instance.endpoints.push(created);
        }
        w.touch(instance_id);
        Ok(())
    }

    async fn delete_documentdb_endpoint(&self, region: &str, endpoint_id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_documentdb_endpoint", format!("{} {}", region, endpoint_id))?;
        let owner = w
            .documentdb
            .values_mut()
            .find(|i| i.endpoints.iter().any(|e| e.id == endpoint_id))
            .ok_or_else(|| absent("endpoint", endpoint_id))?;
        owner.endpoints.retain(|e| e.id != endpoint_id);
        let owner = owner.id.clone();
        w.touch(&owner);
        Ok(())
    }

    async fn migrate_documentdb_endpoint(
        &self,
        region: &str,
        endpoint_id: &str,
        endpoint: &EndpointBody,
    ) -> Result<()> {
        let mut w = self.world();
        w.enter("migrate_documentdb_endpoint", format!("{} {}", region, endpoint_id))?;
        let owner = w
            .documentdb
            .values()
            .find(|i| i.endpoints.iter().any(|e| e.id == endpoint_id))
            .map(|i| i.id.clone())
            .ok_or_else(|| absent("endpoint", endpoint_id))?;
        let mut moved = w.endpoint(&owner, endpoint, DOCUMENTDB_PORT);
        moved.id = endpoint_id.to_string();
        if let Some(instance) = w.documentdb.get_mut(&owner) {
            for e in instance.endpoints.iter_mut().filter(|e| e.id == endpoint_id) {
                *e = moved.clone();
            }
        }
        w.touch(&owner);
        Ok(())
    }

    async fn list_documentdb_users(&self, region: &str, instance_id: &str, name: Option<&str>) -> Result<Vec<User>> {
        let mut w = self.world();
        w.enter("list_documentdb_users", format!("{} {}", region, instance_id))?;
        if !w.documentdb.contains_key(instance_id) {
            return Err(absent("documentdb instance", instance_id));
        }
        Ok(w.users
            .get(instance_id)
            .into_iter()
            .flatten()
            .filter(|u| name.is_none_or(|n| u.name.contains(n)))
            .cloned()
            .collect())
    }

    async fn create_documentdb_user(&self, region: &str, instance_id: &str, req: &CreateUserRequest) -> Result<User> {
        let mut w = self.world();
        w.guard("create_documentdb_user", instance_id)?;
        w.enter("create_documentdb_user", format!("{} {} {}", region, instance_id, req.name))?;
        if !w.documentdb.contains_key(instance_id) {
            return Err(absent("documentdb instance", instance_id));
        }
        let users = w.users.entry(instance_id.to_string()).or_default();
        if users.iter().any(|u| u.name == req.name) {
            return Err(CloudError::validation("name", format!("user {} already exists", req.name)));
        }
        let user = User {
            name: req.name.clone(),
            is_admin: req.is_admin,
        };
        users.push(user.clone());
        w.touch(instance_id);
        Ok(user)
    }

    async fn update_documentdb_user(
        &self,
        region: &str,
        instance_id: &str,
        name: &str,
        req: &UpdateUserRequest,
    ) -> Result<User> {
        let mut w = self.world();
        w.guard("update_documentdb_user", instance_id)?;
        w.enter("update_documentdb_user", format!("{} {} {}", region, instance_id, name))?;
        let user = w
            .users
            .get_mut(instance_id)
            .and_then(|users| users.iter_mut().find(|u| u.name == name))
            .ok_or_else(|| absent("user", name))?;
        if let Some(is_admin) = req.is_admin {
            user.is_admin = is_admin;
        }
        let user = user.clone();
        w.touch(instance_id);
        Ok(user)
    }

    async fn delete_documentdb_user(&self, region: &str, instance_id: &str, name: &str) -> Result<()> {
        let mut w = self.world();
        w.guard("delete_documentdb_user", instance_id)?;
        w.enter("delete_documentdb_user", format!("{} {} {}", region, instance_id, name))?;
        let users = w.users.get_mut(instance_id).ok_or_else(|| absent("user", name))?;
        let before = users.len();
        users.retain(|u| u.name != name);
        if users.len() == before {
            return Err(absent("user", name));
        }
        w.touch(instance_id);
        Ok(())
    }

    async fn list_documentdb_privileges(
        &self,
        region: &str,
        instance_id: &str,
        user_name: &str,
        database_name: &str,
    ) -> Result<Vec<Privilege>> {
        let mut w = self.world();
        w.enter(
            "list_documentdb_privileges",
            format!("{} {} {}/{}", region, instance_id, user_name, database_name),
        )?;
        if !w.documentdb.contains_key(instance_id) {
            return Err(absent("documentdb instance", instance_id));
        }
        Ok(w.privileges
            .get(instance_id)
            .into_iter()
            .flatten()
            .filter(|p| p.user_name == user_name && p.database_name == database_name)
            .cloned()
            .collect())
    }

    async fn set_documentdb_privilege(&self, region: &str, instance_id: &str, privilege: &Privilege) -> Result<()> {
        let mut w = self.world();
        w.guard("set_documentdb_privilege", instance_id)?;
        w.enter(
            "set_documentdb_privilege",
            format!(
                "{} {} {}/{} {}",
                region, instance_id, privilege.user_name, privilege.database_name, privilege.permission
            ),
        )?;
        if !w.documentdb.contains_key(instance_id) {
            return Err(absent("documentdb instance", instance_id));
        }
        let privileges = w.privileges.entry(instance_id.to_string()).or_default();
        privileges.retain(|p| {
            p.user_name != privilege.user_name || p.database_name != privilege.database_name
        });
        if privilege.permission != Permission::None {
            privileges.push(privilege.clone());
        }
        w.touch(instance_id);
        Ok(())
    }
}

fn secret_map(secrets: &[KeyValue]) -> BTreeMap<String, String> {
    secrets
        .iter()
        .map(|kv| (kv.key.clone(), kv.value.clone().unwrap_or_default()))
        .collect()
}

#[async_trait]
impl ContainerApi for FakeCloud {
    async fn create_container(&self, region: &str, req: &CreateContainerRequest) -> Result<Container> {
        let mut w = self.world();
        w.enter("create_container", format!("{} {}", region, req.name))?;
        let status = if w.take_fail_create() {
            ContainerStatus::Error
        } else {
            ContainerStatus::Created
        };
        let id = new_id();
        let container = Container {
            domain_name: Some(format!("{}-{}.functions.fnc.{}.scw.cloud", req.name, &id[..8], region)),
            id,
            name: req.name.clone(),
            namespace_id: req.namespace_id.clone(),
            region: region.to_string(),
            status,
            description: req.description.clone(),
            environment_variables: req.environment_variables.clone(),
            min_scale: req.min_scale.unwrap_or(0),
            max_scale: req.max_scale.unwrap_or(5),
            memory_limit: req.memory_limit.unwrap_or(256),
            cpu_limit: req.cpu_limit.unwrap_or(140),
            timeout: req.timeout.clone().or_else(|| Some("300s".to_string())),
            privacy: req.privacy.clone().unwrap_or_else(|| "public".to_string()),
            registry_image: req.registry_image.clone(),
            max_concurrency: req.max_concurrency.or(Some(50)),
            port: req.port.unwrap_or(8080),
            protocol: req.protocol.clone().unwrap_or_else(|| "http1".to_string()),
            error_message: None,
        };
        w.touch(&container.id);
        w.secrets
            .insert(container.id.clone(), secret_map(&req.secret_environment_variables));
        w.containers.insert(container.id.clone(), container.clone());
        Ok(container)
    }

    async fn get_container(&self, region: &str, id: &str) -> Result<Container> {
        let mut w = self.world();
        w.enter("get_container", format!("{} {}", region, id))?;
        let mut container = w
            .containers
            .get(id)
            .filter(|c| c.region == region)
            .cloned()
            .ok_or_else(|| absent("container", id))?;
        if w.settling(id) {
            container.status = ContainerStatus::Pending;
        }
        Ok(container)
    }

    async fn update_container(&self, region: &str, id: &str, req: &UpdateContainerRequest) -> Result<Container> {
        let mut w = self.world();
        let suffix = if req.redeploy { " redeploy" } else { "" };
        w.enter("update_container", format!("{} {}{}", region, id, suffix))?;
        let c = w.containers.get_mut(id).ok_or_else(|| absent("container", id))?;
        if let Some(v) = &req.description {
            c.description = Some(v.clone());
        }
        if let Some(v) = &req.environment_variables {
            c.environment_variables = v.clone();
        }
        if let Some(v) = req.min_scale {
            c.min_scale = v;
        }
        if let Some(v) = req.max_scale {
            c.max_scale = v;
        }
        if let Some(v) = req.memory_limit {
            c.memory_limit = v;
        }
        if let Some(v) = req.cpu_limit {
            c.cpu_limit = v;
        }
        if let Some(v) = &req.timeout {
            c.timeout = Some(v.clone());
        }
        if let Some(v) = &req.privacy {
            c.privacy = v.clone();
        }
        if let Some(v) = &req.registry_image {
            c.registry_image = v.clone();
        }
        if let Some(v) = req.max_concurrency {
            c.max_concurrency = Some(v);
        }
        if let Some(v) = req.port {
            c.port = v;
        }
        if let Some(v) = &req.protocol {
            c.protocol = v.clone();
        }
        if req.redeploy {
            c.status = ContainerStatus::Ready;
        }
        let container = c.clone();
        if let Some(secrets) = &req.secret_environment_variables {
            w.secrets.insert(id.to_string(), secret_map(secrets));
        }
        w.touch(id);
        Ok(container)
    }

    async fn deploy_container(&self, region: &str, id: &str) -> Result<Container> {
        let mut w = self.world();
        w.enter("deploy_container", format!("{} {}", region, id))?;
        let c = w.containers.get_mut(id).ok_or_else(|| absent("container", id))?;
        c.status = ContainerStatus::Ready;
        let container = c.clone();
        w.touch(id);
        Ok(container)
    }

    async fn delete_container(&self, region: &str, id: &str) -> Result<()> {
        let mut w = self.world();
        w.enter("delete_container", format!("{} {}", region, id))?;
        w.containers.remove(id).ok_or_else(|| absent("container", id))?;
        w.secrets.remove(id);
        Ok(())
    }

    async fn list_containers(&self, region: &str) -> Result<Vec<Container>> {
        let mut w = self.world();
        w.enter("list_containers", region.to_string())?;
        Ok(w.containers
            .values()
            .filter(|c| c.region == region)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IpamApi for FakeCloud {
    async fn list_ips(&self, region: &str, resource_type: &str, resource_id: &str) -> Result<Vec<Ip>> {
        let mut w = self.world();
        w.enter("list_ips", format!("{} {} {}", region, resource_type, resource_id))?;
        Ok(w.ipam
            .iter()
            .filter(|ip| ip.resource.as_ref().is_some_and(|r| r.id == resource_id))
            .cloned()
            .collect())
    }
}
