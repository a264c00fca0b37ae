//! Child endpoint reconciliation
//!
//! A parent (cluster, instance) owns a set of endpoints. The user declares
//! the endpoints that shall exist; the reconciler pairs them with the
//! observed ones by identity and removes, migrates and adds until both sides
//! agree, waiting for the parent to settle after every backend call.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::context::OpContext;
use crate::error::{CloudError, Result};
use crate::id;
use crate::locality;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// Desired endpoint, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointSpec {
    PrivateNetwork {
        private_network_id: String,
        /// Empty means addresses are assigned by IPAM.
        #[serde(default)]
        service_ips: Vec<String>,
        /// Locality of the private network; inherits the parent's when unset.
        #[serde(default)]
        zone: Option<String>,
    },
    PublicNetwork {},
    LoadBalancer {},
    DirectAccess {},
    ObjectStorageExport {
        bucket: String,
        #[serde(default)]
        key: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    PrivateNetwork,
    PublicNetwork,
    LoadBalancer,
    DirectAccess,
    ObjectStorageExport,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndpointKind::PrivateNetwork => "private_network",
            EndpointKind::PublicNetwork => "public_network",
            EndpointKind::LoadBalancer => "load_balancer",
            EndpointKind::DirectAccess => "direct_access",
            EndpointKind::ObjectStorageExport => "object_storage_export",
        };
        f.write_str(s)
    }
}

impl EndpointKind {
    /// How many endpoints of this kind one parent may carry.
    pub fn max_per_parent(&self) -> Option<usize> {
        match self {
            EndpointKind::PublicNetwork | EndpointKind::LoadBalancer | EndpointKind::DirectAccess => {
                Some(1)
            }
            EndpointKind::PrivateNetwork | EndpointKind::ObjectStorageExport => None,
        }
    }
}

impl EndpointSpec {
    pub fn private_network(private_network_id: impl Into<String>, service_ips: Vec<String>) -> Self {
        EndpointSpec::PrivateNetwork {
            private_network_id: private_network_id.into(),
            service_ips,
            zone: None,
        }
    }

    pub fn public() -> Self {
        EndpointSpec::PublicNetwork {}
    }

    pub fn kind(&self) -> EndpointKind {
        match self {
            EndpointSpec::PrivateNetwork { .. } => EndpointKind::PrivateNetwork,
            EndpointSpec::PublicNetwork {} => EndpointKind::PublicNetwork,
            EndpointSpec::LoadBalancer {} => EndpointKind::LoadBalancer,
            EndpointSpec::DirectAccess {} => EndpointKind::DirectAccess,
            EndpointSpec::ObjectStorageExport { .. } => EndpointKind::ObjectStorageExport,
        }
    }

    /// Stable identity used to pair desired with observed endpoints.
    pub fn identity(&self) -> String {
        match self {
            EndpointSpec::PrivateNetwork {
                private_network_id, ..
            } => format!("{}:{}", self.kind(), id::expand(private_network_id)),
            EndpointSpec::ObjectStorageExport { bucket, key } => {
                format!("{}:{}/{}", self.kind(), bucket, key.as_deref().unwrap_or(""))
            }
            _ => self.kind().to_string(),
        }
    }

    /// Identity plus the mutable attributes, with service IPs sorted.
    pub fn fingerprint(&self) -> String {
        match self {
            EndpointSpec::PrivateNetwork { service_ips, .. } => {
                let mut ips = service_ips.clone();
                ips.sort();
                format!("{}[{}]", self.identity(), ips.join(","))
            }
            _ => self.identity(),
        }
    }

    /// Whether an observed endpoint with the same identity must be migrated
    /// to match this spec. Unset mutable attributes accept any observed value.
    pub fn needs_migration(&self, observed: &EndpointSpec) -> bool {
        match (self, observed) {
            (
                EndpointSpec::PrivateNetwork { service_ips, .. },
                EndpointSpec::PrivateNetwork { .. },
            ) if service_ips.is_empty() => false,
            _ => self.fingerprint() != observed.fingerprint(),
        }
    }
}

/// Observed endpoint with its server-assigned attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(flatten)]
    pub spec: EndpointSpec,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub dns_records: Vec<String>,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, spec: EndpointSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            ips: Vec::new(),
            port: None,
            hostname: None,
            dns_records: Vec::new(),
        }
    }
}

/// Checks the per-parent invariants on a desired set: kind cardinality,
/// one endpoint per private network, locality compatible with the parent.
pub fn validate(desired: &[EndpointSpec], parent_locality: &str) -> Result<()> {
    let mut per_kind: HashMap<EndpointKind, usize> = HashMap::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (i, spec) in desired.iter().enumerate() {
        let kind = spec.kind();
        let count = per_kind.entry(kind).or_default();
        *count += 1;
        if let Some(max) = kind.max_per_parent() {
            if *count > max {
                return Err(CloudError::validation(
                    format!("endpoints.{}", i),
                    format!("at most {} {} endpoint(s) per parent", max, kind),
                ));
            }
        }

        if let Some(first) = seen.insert(spec.identity(), i) {
            return Err(CloudError::validation(
                format!("endpoints.{}", i),
                format!("duplicates endpoints.{} ({})", first, spec.identity()),
            ));
        }

        if let EndpointSpec::PrivateNetwork {
            private_network_id,
            zone,
            ..
        } = spec
        {
            if id::expand(private_network_id).is_empty() {
                return Err(CloudError::validation(
                    format!("endpoints.{}.private_network_id", i),
                    "must not be empty",
                ));
            }
            let pn_locality = id::LocalizedId::parse(private_network_id)
                .ok()
                .map(|lid| lid.locality().to_string())
                .or_else(|| zone.clone());
            if let Some(loc) = pn_locality {
                if !parent_locality.is_empty() && !locality::compatible(&loc, parent_locality) {
                    return Err(CloudError::validation(
                        format!("endpoints.{}.private_network_id", i),
                        format!(
                            "private network in {} cannot be attached to a parent in {}",
                            loc, parent_locality
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Pairing of a desired set with an observed set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointDiff {
    pub remove: Vec<Endpoint>,
    pub migrate: Vec<(Endpoint, EndpointSpec)>,
    pub add: Vec<EndpointSpec>,
}

impl EndpointDiff {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.migrate.is_empty() && self.add.is_empty()
    }

    /// Turns a remove and an add of the same kind into one migration, for
    /// backends that can move an endpoint between networks atomically.
    pub fn pair_moves(&mut self) {
        let mut kept = Vec::new();
        for endpoint in std::mem::take(&mut self.remove) {
            let kind = endpoint.spec.kind();
            match self.add.iter().position(|spec| spec.kind() == kind) {
                Some(pos) => {
                    let spec = self.add.remove(pos);
                    self.migrate.push((endpoint, spec));
                }
                None => kept.push(endpoint),
            }
        }
        self.remove = kept;
    }

    pub fn plan(&self) -> Plan {
        let mut actions = Vec::new();
        for e in &self.remove {
            actions.push(Action {
                action_type: ActionType::Remove,
                target: e.spec.identity(),
                description: format!("remove endpoint {}", e.id),
            });
        }
        for (e, spec) in &self.migrate {
            actions.push(Action {
                action_type: ActionType::Migrate,
                target: spec.identity(),
                description: format!("migrate endpoint {} to {}", e.id, spec.fingerprint()),
            });
        }
        for spec in &self.add {
            actions.push(Action {
                action_type: ActionType::Add,
                target: spec.identity(),
                description: format!("add {}", spec.fingerprint()),
            });
        }
        Plan::new(actions)
    }
}

/// Pairs desired endpoints with observed ones by identity.
pub fn diff(desired: &[EndpointSpec], observed: &[Endpoint]) -> EndpointDiff {
    let mut result = EndpointDiff::default();
    let mut unmatched: Vec<&Endpoint> = observed.iter().collect();

    for spec in desired {
        let identity = spec.identity();
        match unmatched.iter().position(|e| e.spec.identity() == identity) {
            Some(pos) => {
                let current = unmatched.remove(pos);
                if spec.needs_migration(&current.spec) {
                    result.migrate.push((current.clone(), spec.clone()));
                }
            }
            None => result.add.push(spec.clone()),
        }
    }
    result.remove = unmatched.into_iter().cloned().collect();
    result
}

/// Backend calls for one parent's endpoints.
#[async_trait]
pub trait EndpointBackend: Send + Sync {
    /// Parent description for logs.
    fn parent(&self) -> String;

    async fn observed(&self, ctx: &OpContext) -> Result<Vec<Endpoint>>;

    async fn create(&self, ctx: &OpContext, spec: &EndpointSpec) -> Result<()>;

    async fn delete(&self, ctx: &OpContext, endpoint: &Endpoint) -> Result<()>;

    /// Whether [`EndpointBackend::migrate`] is an atomic backend call.
    fn supports_migrate(&self) -> bool {
        false
    }

    async fn migrate(&self, _ctx: &OpContext, endpoint: &Endpoint, _spec: &EndpointSpec) -> Result<()> {
        Err(CloudError::validation(
            "endpoints",
            format!("endpoint {} cannot be migrated in place", endpoint.id),
        ))
    }

    /// Waits for the parent to return to its ready state.
    async fn wait_ready(&self, ctx: &OpContext) -> Result<()>;

    /// Endpoint to create when the desired set is empty, for parents that
    /// require at least one.
    fn default_endpoint(&self) -> Option<EndpointSpec> {
        None
    }
}

/// Reconciles the parent's endpoints against `desired`.
///
/// Removes are applied first, then migrations, then additions. A migration
/// uses the atomic backend call when available, otherwise delete + create.
pub async fn reconcile(
    ctx: &OpContext,
    backend: &dyn EndpointBackend,
    desired: &[EndpointSpec],
) -> Result<ApplyResult> {
    let started = Instant::now();
    let mut desired = desired.to_vec();
    if desired.is_empty() {
        if let Some(default) = backend.default_endpoint() {
            tracing::info!("{}: no endpoint declared, keeping a default {}", backend.parent(), default.kind());
            desired.push(default);
        }
    }

    let observed = backend.observed(ctx).await?;
    let mut plan = diff(&desired, &observed);
    if backend.supports_migrate() {
        plan.pair_moves();
    }
    let mut result = ApplyResult::new();
    if plan.is_empty() {
        tracing::debug!("{}: endpoints up to date", backend.parent());
        return Ok(result);
    }
    tracing::info!("{}: endpoints {}", backend.parent(), plan.plan().summary());

    for endpoint in &plan.remove {
        ctx.check("endpoint removal")?;
        remove(ctx, backend, endpoint).await?;
        result.add_success(endpoint.spec.identity(), format!("removed {}", endpoint.id));
    }

    for (endpoint, spec) in &plan.migrate {
        ctx.check("endpoint migration")?;
        if backend.supports_migrate() {
            tracing::info!("{}: migrating endpoint {}", backend.parent(), endpoint.id);
            backend.migrate(ctx, endpoint, spec).await?;
            backend.wait_ready(ctx).await?;
        } else {
            remove(ctx, backend, endpoint).await?;
            add(ctx, backend, spec).await?;
        }
        result.add_success(spec.identity(), format!("migrated {}", endpoint.id));
    }

    for spec in &plan.add {
        ctx.check("endpoint creation")?;
        add(ctx, backend, spec).await?;
        result.add_success(spec.identity(), "added");
    }

    result.duration_ms = started.elapsed().as_millis() as u64;
    Ok(result)
}

async fn remove(ctx: &OpContext, backend: &dyn EndpointBackend, endpoint: &Endpoint) -> Result<()> {
    tracing::info!("{}: deleting endpoint {}", backend.parent(), endpoint.id);
    match backend.delete(ctx, endpoint).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::debug!("{}: endpoint {} already gone", backend.parent(), endpoint.id);
        }
        Err(e) => return Err(e),
    }
    backend.wait_ready(ctx).await
}

async fn add(ctx: &OpContext, backend: &dyn EndpointBackend, spec: &EndpointSpec) -> Result<()> {
    tracing::info!("{}: creating endpoint {}", backend.parent(), spec.fingerprint());
    backend.create(ctx, spec).await?;
    backend.wait_ready(ctx).await
}
