//! Block storage: volumes and snapshots (`block/v1alpha1`, zoned)

use super::zone_path;
use crate::client::ScalewayClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scwflow_cloud::{HasStatus, Result, Status};
use serde::{Deserialize, Serialize};
use std::fmt;

const PRODUCT: &str = "block/v1alpha1";

/// Sizes travel in bytes on the wire.
pub const GB: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeStatus {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Resizing,
    Error,
    Snapshotting,
    Locked,
    Updating,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        f.write_str(&s)
    }
}

impl Status for VolumeStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, VolumeStatus::Available | VolumeStatus::InUse | VolumeStatus::Error)
    }

    fn is_failure(&self) -> bool {
        matches!(self, VolumeStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpecs {
    #[serde(default)]
    pub perf_iops: Option<u32>,
    #[serde(default)]
    pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub project_id: String,
    pub zone: String,
    pub status: VolumeStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub specs: Option<VolumeSpecs>,
    #[serde(default)]
    pub parent_snapshot_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl HasStatus for Volume {
    type Status = VolumeStatus;

    fn status(&self) -> VolumeStatus {
        self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FromEmpty {
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FromSnapshot {
    pub snapshot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf_iops: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_empty: Option<FromEmpty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_snapshot: Option<FromSnapshot>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateVolumeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Creating,
    Available,
    Error,
    Deleting,
    Deleted,
    InUse,
    Locked,
    Exporting,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotStatus::Creating => "creating",
            SnapshotStatus::Available => "available",
            SnapshotStatus::Error => "error",
            SnapshotStatus::Deleting => "deleting",
            SnapshotStatus::Deleted => "deleted",
            SnapshotStatus::InUse => "in_use",
            SnapshotStatus::Locked => "locked",
            SnapshotStatus::Exporting => "exporting",
            SnapshotStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl Status for SnapshotStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, SnapshotStatus::Available | SnapshotStatus::Error)
    }

    fn is_failure(&self) -> bool {
        matches!(self, SnapshotStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub project_id: String,
    pub zone: String,
    pub status: SnapshotStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Volume the snapshot was taken from, when it still exists.
    #[serde(default)]
    pub parent_volume: Option<ParentVolume>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentVolume {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl HasStatus for Snapshot {
    type Status = SnapshotStatus;

    fn status(&self) -> SnapshotStatus {
        self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSnapshotRequest {
    pub volume_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSnapshotRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[async_trait]
pub trait BlockApi: Send + Sync {
    async fn create_volume(&self, zone: &str, req: &CreateVolumeRequest) -> Result<Volume>;
    async fn get_volume(&self, zone: &str, id: &str) -> Result<Volume>;
    async fn update_volume(&self, zone: &str, id: &str, req: &UpdateVolumeRequest) -> Result<Volume>;
    async fn delete_volume(&self, zone: &str, id: &str) -> Result<()>;
    async fn list_volumes(&self, zone: &str, name: Option<&str>) -> Result<Vec<Volume>>;

    async fn create_snapshot(&self, zone: &str, req: &CreateSnapshotRequest) -> Result<Snapshot>;
    async fn get_snapshot(&self, zone: &str, id: &str) -> Result<Snapshot>;
    async fn update_snapshot(&self, zone: &str, id: &str, req: &UpdateSnapshotRequest) -> Result<Snapshot>;
    async fn delete_snapshot(&self, zone: &str, id: &str) -> Result<()>;
    async fn list_snapshots(&self, zone: &str) -> Result<Vec<Snapshot>>;
}

#[async_trait]
impl BlockApi for ScalewayClient {
    async fn create_volume(&self, zone: &str, req: &CreateVolumeRequest) -> Result<Volume> {
        let mut req = req.clone();
        req.project_id = self.project_or_default(req.project_id.as_deref());
        self.post(&format!("{}/volumes", zone_path(PRODUCT, zone)), &req).await
    }

    async fn get_volume(&self, zone: &str, id: &str) -> Result<Volume> {
        self.get(&format!("{}/volumes/{}", zone_path(PRODUCT, zone), id)).await
    }

    async fn update_volume(&self, zone: &str, id: &str, req: &UpdateVolumeRequest) -> Result<Volume> {
        self.patch(&format!("{}/volumes/{}", zone_path(PRODUCT, zone), id), req)
            .await
    }

    async fn delete_volume(&self, zone: &str, id: &str) -> Result<()> {
        self.delete(&format!("{}/volumes/{}", zone_path(PRODUCT, zone), id)).await
    }

    async fn list_volumes(&self, zone: &str, name: Option<&str>) -> Result<Vec<Volume>> {
        let mut path = format!("{}/volumes", zone_path(PRODUCT, zone));
        if let Some(name) = name {
            path = format!("{}?name={}", path, name);
        }
        self.list(&path, "volumes").await
    }

    async fn create_snapshot(&self, zone: &str, req: &CreateSnapshotRequest) -> Result<Snapshot> {
        let mut req = req.clone();
        req.project_id = self.project_or_default(req.project_id.as_deref());
        self.post(&format!("{}/snapshots", zone_path(PRODUCT, zone)), &req).await
    }

    async fn get_snapshot(&self, zone: &str, id: &str) -> Result<Snapshot> {
        self.get(&format!("{}/snapshots/{}", zone_path(PRODUCT, zone), id)).await
    }

    async fn update_snapshot(&self, zone: &str, id: &str, req: &UpdateSnapshotRequest) -> Result<Snapshot> {
        self.patch(&format!("{}/snapshots/{}", zone_path(PRODUCT, zone), id), req)
            .await
    }

    async fn delete_snapshot(&self, zone: &str, id: &str) -> Result<()> {
        self.delete(&format!("{}/snapshots/{}", zone_path(PRODUCT, zone), id)).await
    }

    async fn list_snapshots(&self, zone: &str) -> Result<Vec<Snapshot>> {
        self.list(&format!("{}/snapshots", zone_path(PRODUCT, zone)), "snapshots")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_volume_model() {
        let v: Volume = serde_json::from_value(json!({
            "id": "11111111-1111-1111-1111-111111111111",
            "name": "data",
            "size": 10_000_000_000u64,
            "project_id": "p",
            "zone": "fr-par-1",
            "status": "in_use",
            "specs": {"perf_iops": 5000, "class": "sbs"},
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(v.status, VolumeStatus::InUse);
        assert!(v.status().is_terminal());
        assert_eq!(v.status.to_string(), "in_use");

        let odd: VolumeStatus = serde_json::from_value(json!("migrating")).unwrap();
        assert_eq!(odd, VolumeStatus::Unknown);
        assert!(!odd.is_terminal());
    }
}
