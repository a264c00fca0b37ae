//! Leftover cleanup for acceptance-test accounts
//!
//! Deletes every object of the managed kinds in every known locality.
//! Child objects go first: containers and databases before snapshots,
//! snapshots before volumes.

use crate::api::ScalewayApi;
use scwflow_cloud::locality::{KNOWN_REGIONS, KNOWN_ZONES};
use scwflow_cloud::{OpContext, Result, SweepReport, sweep};

/// Kinds the sweeper knows, in sweep order.
pub const KINDS: &[&str] = &[
    "container",
    "documentdb_instance",
    "mongodb_instance",
    "redis_cluster",
    "block_snapshot",
    "block_volume",
];

fn zones() -> Vec<String> {
    KNOWN_ZONES.iter().map(|z| z.to_string()).collect()
}

fn regions() -> Vec<String> {
    KNOWN_REGIONS.iter().map(|r| r.to_string()).collect()
}

/// Sweeps one kind.
pub async fn sweep_kind<A: ScalewayApi>(ctx: &OpContext, api: &A, kind: &str) -> Result<SweepReport> {
    match kind {
        "container" => {
            sweep(
                ctx,
                kind,
                &regions(),
                |region| async move {
                    api.list_containers(&region)
                        .await
                        .map(|items| items.into_iter().map(|c| c.id).collect::<Vec<_>>())
                },
                |id| async move { api.delete_container(id.locality(), id.id()).await },
            )
            .await
        }
        "documentdb_instance" => {
            sweep(
                ctx,
                kind,
                &regions(),
                |region| async move {
                    api.list_documentdb_instances(&region)
                        .await
                        .map(|items| items.into_iter().map(|i| i.id).collect::<Vec<_>>())
                },
                |id| async move { api.delete_documentdb_instance(id.locality(), id.id()).await },
            )
            .await
        }
        "mongodb_instance" => {
            sweep(
                ctx,
                kind,
                &regions(),
                |region| async move {
                    api.list_mongodb_instances(&region)
                        .await
                        .map(|items| items.into_iter().map(|i| i.id).collect::<Vec<_>>())
                },
                |id| async move { api.delete_mongodb_instance(id.locality(), id.id()).await },
            )
            .await
        }
        "redis_cluster" => {
            sweep(
                ctx,
                kind,
                &zones(),
                |zone| async move {
                    api.list_clusters(&zone, None)
                        .await
                        .map(|items| items.into_iter().map(|c| c.id).collect::<Vec<_>>())
                },
                |id| async move { api.delete_cluster(id.locality(), id.id()).await },
            )
            .await
        }
        "block_snapshot" => {
            sweep(
                ctx,
                kind,
                &zones(),
                |zone| async move {
                    api.list_snapshots(&zone)
                        .await
                        .map(|items| items.into_iter().map(|s| s.id).collect::<Vec<_>>())
                },
                |id| async move { api.delete_snapshot(id.locality(), id.id()).await },
            )
            .await
        }
        "block_volume" => {
            sweep(
                ctx,
                kind,
                &zones(),
                |zone| async move {
                    api.list_volumes(&zone, None)
                        .await
                        .map(|items| items.into_iter().map(|v| v.id).collect::<Vec<_>>())
                },
                |id| async move { api.delete_volume(id.locality(), id.id()).await },
            )
            .await
        }
        other => Err(scwflow_cloud::CloudError::UnknownType(format!("sweeper {}", other))),
    }
}

/// Sweeps every kind in order. A kind that fails to sweep does not stop the
/// following ones.
pub async fn sweep_all<A: ScalewayApi>(ctx: &OpContext, api: &A) -> Result<Vec<(String, SweepReport)>> {
    let mut reports = Vec::new();
    for kind in KINDS {
        let report = sweep_kind(ctx, api, kind).await?;
        tracing::info!(
            "Swept {}: {} deleted, {} failed",
            kind,
            report.succeeded.len(),
            report.failed.len()
        );
        reports.push((kind.to_string(), report));
    }
    Ok(reports)
}
