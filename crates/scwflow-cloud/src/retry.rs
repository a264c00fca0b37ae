//! Retry-on-conflict for mutations against a transiently busy parent

use crate::context::{DEFAULT_RETRY_INTERVAL, Meta, OpContext};
use crate::error::{CloudError, Result};
use std::future::Future;
use tokio::time::sleep;

/// Runs `op` until it stops failing with `conflict`.
///
/// After each conflict `settle` is awaited (normally a waiter on the parent
/// resource) before the next attempt. Any other error is returned at once.
/// The budget is the context deadline; once it is spent the last conflict is
/// returned.
pub async fn retry_on_conflict<T, Op, OpFut, Settle, SettleFut>(
    ctx: &OpContext,
    meta: &Meta,
    what: &str,
    mut settle: Settle,
    mut op: Op,
) -> Result<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T>>,
    Settle: FnMut() -> SettleFut,
    SettleFut: Future<Output = Result<()>>,
{
    let interval = meta.wait.interval(DEFAULT_RETRY_INTERVAL);
    let mut attempt: u32 = 0;

    loop {
        ctx.check(what)?;
        attempt += 1;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() => e,
            Err(e) => return Err(e),
        };

        let remaining = ctx.remaining();
        if remaining.is_zero() {
            tracing::warn!("{}: giving up after {} conflicting attempts", what, attempt);
            return Err(err);
        }
        tracing::warn!("{}: conflict on attempt {} ({}), waiting for parent", what, attempt, err);

        settle().await?;

        tokio::select! {
            _ = ctx.token().cancelled() => return Err(CloudError::Cancelled(what.to_string())),
            _ = sleep(interval.min(remaining)) => {}
        }
    }
}
