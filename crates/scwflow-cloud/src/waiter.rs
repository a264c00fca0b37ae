//! Polling waiter for asynchronous backend state machines
//!
//! The lifecycle function is suspended while the waiter polls. Every
//! iteration is a cancellation point; transport errors are not retried here.

use crate::context::{DEFAULT_RETRY_INTERVAL, Meta, OpContext};
use crate::error::{CloudError, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// A cloud-side status the waiter can classify.
pub trait Status: fmt::Display + PartialEq + Copy + Send + Sync {
    /// No further transition happens without a new mutation.
    fn is_terminal(&self) -> bool;

    /// Error-terminal.
    fn is_failure(&self) -> bool;
}

/// Anything carrying a [`Status`].
pub trait HasStatus {
    type Status: Status;

    fn status(&self) -> Self::Status;
}

/// What the waiter waits for.
#[derive(Debug, Clone, PartialEq)]
pub enum Until<S> {
    /// The status type's default terminal set.
    Terminal,
    /// One of the given statuses.
    Any(Vec<S>),
}

impl<S: Status> Until<S> {
    pub fn one(status: S) -> Self {
        Until::Any(vec![status])
    }

    fn reached(&self, status: &S) -> bool {
        match self {
            Until::Terminal => status.is_terminal(),
            Until::Any(targets) => targets.contains(status),
        }
    }
}

/// Polls one remote resource until it settles.
#[derive(Debug, Clone)]
pub struct Waiter<'a> {
    ctx: &'a OpContext,
    what: String,
    timeout: Duration,
    interval: Duration,
}

impl<'a> Waiter<'a> {
    /// A waiter bounded by the context deadline, polling at the default
    /// interval unless the meta carries an override.
    pub fn new(ctx: &'a OpContext, meta: &Meta, what: impl Into<String>) -> Self {
        Self {
            ctx,
            what: what.into(),
            timeout: ctx.remaining(),
            interval: meta.wait.interval(DEFAULT_RETRY_INTERVAL),
        }
    }

    /// Caps the overall timeout. The context deadline still applies.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(self.ctx.remaining());
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Polls `fetch` until the observed status satisfies `until`.
    ///
    /// Returns `NotFound` when the resource disappears, `Failed` when it
    /// enters an error-terminal status that was not asked for, and
    /// `DeadlineExceeded` with the last observed status on timeout.
    pub async fn until<T, F, Fut>(&self, until: Until<T::Status>, mut fetch: F) -> Result<T>
    where
        T: HasStatus,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_status = String::from("unknown");

        loop {
            self.ctx.check(&self.what)?;

            let observed = match fetch().await {
                Ok(observed) => observed,
                Err(e) if e.is_not_found() => {
                    tracing::debug!("{} is absent", self.what);
                    return Err(CloudError::NotFound(self.what.clone()));
                }
                Err(e) => return Err(e),
            };

            let status = observed.status();
            tracing::debug!("{} status: {}", self.what, status);
            if until.reached(&status) {
                return Ok(observed);
            }
            if status.is_failure() {
                return Err(CloudError::Failed {
                    resource: self.what.clone(),
                    status: status.to_string(),
                });
            }
            last_status = status.to_string();

            self.pause(deadline, &last_status).await?;
        }
    }

    /// Polls until `fetch` reports the resource absent.
    pub async fn until_absent<T, F, Fut>(&self, mut fetch: F) -> Result<()>
    where
        T: HasStatus,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = Instant::now() + self.timeout;

        loop {
            self.ctx.check(&self.what)?;

            let status = match fetch().await {
                Ok(observed) => observed.status(),
                Err(e) if e.is_not_found() => {
                    tracing::debug!("{} is gone", self.what);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            tracing::debug!("{} still present, status: {}", self.what, status);
            if status.is_failure() {
                return Err(CloudError::Failed {
                    resource: self.what.clone(),
                    status: status.to_string(),
                });
            }

            self.pause(deadline, &status.to_string()).await?;
        }
    }

    async fn pause(&self, deadline: Instant, last_status: &str) -> Result<()> {
        let now = Instant::now();
        if now >= deadline {
            return Err(CloudError::DeadlineExceeded {
                resource: self.what.clone(),
                last_status: last_status.to_string(),
                timeout: self.timeout,
            });
        }
        let nap = self.interval.min(deadline - now);
        tokio::select! {
            _ = self.ctx.token().cancelled() => Err(CloudError::Cancelled(self.what.clone())),
            _ = sleep(nap) => Ok(()),
        }
    }
}
