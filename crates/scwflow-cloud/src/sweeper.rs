//! Sweeper: deletes every resource of one kind across localities
//!
//! Used by acceptance-test infrastructure to clean up leftovers. Deletes run
//! concurrently within a bound; an already-absent resource counts as swept.

use crate::action::ApplyResult;
use crate::context::OpContext;
use crate::error::Result;
use crate::id::LocalizedId;
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::time::Instant;

/// Deletes in flight at once.
pub const SWEEP_CONCURRENCY: usize = 4;

pub type SweepReport = ApplyResult;

/// Lists the resources of each locality with `list` and deletes them with
/// `delete`. Listing or deletion failures are reported per target and do
/// not stop the sweep.
pub async fn sweep<L, LFut, D, DFut>(
    ctx: &OpContext,
    kind: &str,
    localities: &[String],
    list: L,
    delete: D,
) -> Result<SweepReport>
where
    L: Fn(String) -> LFut,
    LFut: Future<Output = Result<Vec<String>>>,
    D: Fn(LocalizedId) -> DFut,
    DFut: Future<Output = Result<()>>,
{
    let started = Instant::now();
    let mut report = SweepReport::new();
    let mut targets = Vec::new();

    for locality in localities {
        ctx.check(kind)?;
        match list(locality.clone()).await {
            Ok(ids) => {
                tracing::info!("Sweeping {} {} in {}", ids.len(), kind, locality);
                targets.extend(ids.into_iter().map(|id| LocalizedId::new(locality, id)));
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} not available in {}", kind, locality);
            }
            Err(e) => {
                tracing::warn!("Failed to list {} in {}: {}", kind, locality, e);
                report.add_failure(format!("{}/*", locality), e.to_string());
            }
        }
    }

    let delete = &delete;
    let outcomes: Vec<(LocalizedId, Result<()>)> = stream::iter(targets)
        .map(|id| async move {
            let outcome = delete(id.clone()).await;
            (id, outcome)
        })
        .buffer_unordered(SWEEP_CONCURRENCY)
        .collect()
        .await;

    for (id, outcome) in outcomes {
        match outcome {
            Ok(()) => report.add_success(id.to_string(), "deleted"),
            Err(e) if e.is_not_found() => report.add_success(id.to_string(), "already gone"),
            Err(e) => {
                tracing::warn!("Failed to sweep {} {}: {}", kind, id, e);
                report.add_failure(id.to_string(), e.to_string());
            }
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;
    Ok(report)
}
