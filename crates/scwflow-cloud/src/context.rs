//! Per-invocation context and provider-level meta

use crate::diag::{Diagnostic, Diagnostics};
use crate::error::{CloudError, Result};
use crate::locality::{self, Region, Zone};
use scwflow_config::ProviderConfig;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Poll interval used when no override is configured.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Cancellation signal plus deadline for one lifecycle phase.
#[derive(Debug, Clone)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl OpContext {
    pub fn new(timeout: Duration) -> Self {
        Self::with_cancellation(timeout, CancellationToken::new())
    }

    pub fn with_cancellation(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
        }
    }

    /// A context for a nested phase: shares cancellation, never outlives `self`.
    pub fn child(&self, timeout: Duration) -> Self {
        let deadline = (Instant::now() + timeout).min(self.deadline);
        Self {
            cancel: self.cancel.child_token(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails with `cancelled` once the token fired.
    pub fn check(&self, what: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(CloudError::Cancelled(what.to_string()));
        }
        Ok(())
    }
}

/// Polling settings shared by every waiter of one provider instance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaitSettings {
    /// Set from configuration to speed up polling in test suites.
    pub retry_interval_override: Option<Duration>,
}

impl WaitSettings {
    pub fn fast(interval: Duration) -> Self {
        Self {
            retry_interval_override: Some(interval),
        }
    }

    pub fn interval(&self, default: Duration) -> Duration {
        self.retry_interval_override.unwrap_or(default)
    }
}

/// Default locality and project taken from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    pub zone: Option<Zone>,
    pub region: Option<Region>,
    pub project_id: Option<String>,
}

/// Provider-level handle passed to every lifecycle call.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub defaults: Defaults,
    pub wait: WaitSettings,
}

impl Meta {
    pub fn new(defaults: Defaults, wait: WaitSettings) -> Self {
        Self { defaults, wait }
    }

    /// Derives the meta from configuration. Unknown localities are reported
    /// as warnings; a configured zone implies its region when none is set.
    pub fn from_config(config: &ProviderConfig) -> Result<(Self, Diagnostics)> {
        let mut diags = Diagnostics::new();

        let zone = match config.zone.as_deref() {
            Some(z) => {
                diags.extend(locality::check_zone("zone", z));
                Some(Zone::parse(z)?)
            }
            None => None,
        };
        let region = match config.region.as_deref() {
            Some(r) => {
                diags.extend(locality::check_region("region", r));
                Some(Region::parse(r)?)
            }
            None => zone.as_ref().map(Zone::region),
        };
        if let (Some(z), Some(r)) = (&zone, &region) {
            if !r.contains(z) {
                diags.push(
                    Diagnostic::warning(
                        "zone outside region",
                        format!("default zone {} is not in default region {}", z, r),
                    )
                    .with_attribute("zone"),
                );
            }
        }

        let defaults = Defaults {
            zone,
            region,
            project_id: config.project_id.clone(),
        };
        let wait = WaitSettings {
            retry_interval_override: config.retry_interval(),
        };
        Ok((Self::new(defaults, wait), diags))
    }

    /// The declared zone, or the provider default.
    pub fn zone(&self, declared: Option<&str>) -> Result<Zone> {
        match declared.filter(|z| !z.is_empty()) {
            Some(z) => Zone::parse(z),
            None => self.defaults.zone.clone().ok_or_else(|| {
                CloudError::validation("zone", "no zone declared and no default zone configured")
            }),
        }
    }

    /// The declared region, or the provider default.
    pub fn region(&self, declared: Option<&str>) -> Result<Region> {
        match declared.filter(|r| !r.is_empty()) {
            Some(r) => Region::parse(r),
            None => self.defaults.region.clone().ok_or_else(|| {
                CloudError::validation(
                    "region",
                    "no region declared and no default region configured",
                )
            }),
        }
    }

    pub fn project_id(&self, declared: Option<&str>) -> Option<String> {
        declared
            .map(str::to_string)
            .or_else(|| self.defaults.project_id.clone())
    }
}
