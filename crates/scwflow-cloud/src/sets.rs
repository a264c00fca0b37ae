//! Flat-set and named-set reconcilers
//!
//! Sets without identity (ACL rules, settings) are replaced wholesale by one
//! backend call bracketed by parent waits. Members keyed by name (users,
//! privileges) are resources of their own; their deletions tolerate an
//! already-absent member.

use crate::context::OpContext;
use crate::error::Result;
use std::future::Future;

/// Replaces the whole set with one call: wait, set, wait.
pub async fn replace_all<W, WFut, S, SFut>(
    ctx: &OpContext,
    what: &str,
    mut wait: W,
    set: S,
) -> Result<()>
where
    W: FnMut() -> WFut,
    WFut: Future<Output = Result<()>>,
    S: FnOnce() -> SFut,
    SFut: Future<Output = Result<()>>,
{
    wait().await?;
    ctx.check(what)?;
    tracing::info!("Replacing {}", what);
    set().await?;
    wait().await
}

/// Runs a delete call, treating an absent target as deleted.
pub async fn best_effort_delete<F>(what: &str, delete: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match delete.await {
        Ok(()) => {
            tracing::info!("Deleted {}", what);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!("{} already deleted", what);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
