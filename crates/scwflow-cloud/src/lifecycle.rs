//! Reconciliation lifecycle
//!
//! A [`Resource`] supplies the per-kind pieces (request assembly, mutation
//! calls, waits); [`Lifecycle`] wraps it into the uniform
//! Create/Read/Update/Delete/Import/Plan contract and erases it behind
//! [`ResourceHandler`] so the provider can dispatch on type names.

use crate::change::{ChangeSet, PlanAdjustment};
use crate::context::{Meta, OpContext};
use crate::diag::{Diagnostic, Diagnostics};
use crate::error::{CloudError, OptionalExt, Result};
use crate::id::LocalizedId;
use crate::schema::Schema;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// What the host persists for one resource: the state ID, the observed
/// attributes and the digests of write-only inputs as last applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    pub id: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub private: BTreeMap<String, String>,
}

impl ResourceData {
    pub fn new(id: impl Into<String>, attributes: Value) -> Self {
        Self {
            id: id.into(),
            attributes,
            private: BTreeMap::new(),
        }
    }

    /// A record that only carries the state ID, used when a mutation went
    /// through but its follow-up wait did not.
    pub fn pending(id: impl Into<String>) -> Self {
        Self::new(id, Value::Object(Default::default()))
    }

    pub fn with_private(mut self, private: BTreeMap<String, String>) -> Self {
        self.private = private;
        self
    }
}

/// Reply to a lifecycle call. `state == None` means the state ID is cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub state: Option<ResourceData>,
    pub diagnostics: Diagnostics,
}

impl Response {
    pub fn ok(state: ResourceData) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn failed(state: Option<ResourceData>, err: &CloudError) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(err);
        Self { state, diagnostics }
    }

    fn from_diagnostics(state: Option<ResourceData>, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Reply to a plan (`CustomizeDiff`) call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub planned: Value,
    pub requires_replace: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Per-kind behaviour plugged into the lifecycle driver.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Desired state as declared by the user.
    type Spec: DeserializeOwned + Send + Sync;
    /// Observed state written back to the host.
    type State: Serialize + DeserializeOwned + Send + Sync;

    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Submits the create request and returns the localized state ID.
    async fn create(&self, ctx: &OpContext, meta: &Meta, spec: &Self::Spec) -> Result<String>;

    /// Waits until the resource is in its "available" terminal state.
    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()>;

    /// Waits until the resource stops transitioning. Any terminal status
    /// counts, error statuses included: a broken resource must stay
    /// deletable.
    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()>;

    /// Fetches the resource. `NotFound` means absent. Optional enrichment
    /// that fails on permissions should push a warning into `diags`.
    async fn read(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        diags: &mut Diagnostics,
    ) -> Result<Self::State>;

    /// Applies the changed attributes, one mutation group at a time.
    async fn update(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        prior: &Self::State,
        spec: &Self::Spec,
        changes: &ChangeSet,
    ) -> Result<()>;

    /// Issues the delete call.
    async fn delete(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()>;

    /// Waits until the resource is gone.
    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()>;

    /// Turns a user-supplied import ID into a state ID.
    fn import_id(&self, _meta: &Meta, raw: &str) -> Result<String> {
        Ok(LocalizedId::parse(raw)?.to_string())
    }

    /// Resource-specific plan rules: conditional replacement and plan-time
    /// rejections. Never calls the cloud.
    fn customize_diff(
        &self,
        _prior: Option<&Self::State>,
        _desired: &Self::Spec,
        _plan: &mut PlanAdjustment,
    ) {
    }
}

/// Type-erased lifecycle entry points, one per resource kind.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn plan(&self, meta: &Meta, config: Value, prior: Option<&ResourceData>) -> PlanResponse;

    async fn create(&self, cancel: &CancellationToken, meta: &Meta, config: Value) -> Response;

    async fn read(&self, cancel: &CancellationToken, meta: &Meta, prior: &ResourceData) -> Response;

    async fn update(
        &self,
        cancel: &CancellationToken,
        meta: &Meta,
        config: Value,
        prior: &ResourceData,
    ) -> Response;

    async fn delete(&self, cancel: &CancellationToken, meta: &Meta, prior: &ResourceData) -> Response;

    async fn import(&self, cancel: &CancellationToken, meta: &Meta, raw_id: &str) -> Response;
}

/// The uniform lifecycle around one [`Resource`].
pub struct Lifecycle<R: Resource> {
    resource: R,
    schema: Schema,
}

impl<R: Resource> Lifecycle<R> {
    pub fn new(resource: R) -> Self {
        let schema = resource.schema();
        Self { resource, schema }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    fn parse_spec(&self, config: &Value) -> std::result::Result<R::Spec, Diagnostics> {
        let diags = self.schema.validate(config);
        if diags.has_errors() {
            return Err(diags);
        }
        serde_json::from_value(config.clone()).map_err(|e| {
            let mut d = Diagnostics::new();
            d.error(&CloudError::Json(e));
            d
        })
    }

    fn parse_prior(&self, prior: &ResourceData) -> Result<R::State> {
        Ok(serde_json::from_value(prior.attributes.clone())?)
    }

    /// Refreshes `id`, mapping absence to `Ok(None)`. Input attributes the
    /// observed state does not carry at all are kept from `carry`.
    async fn observe(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        carry: &Value,
        diags: &mut Diagnostics,
    ) -> Result<Option<ResourceData>> {
        let Some(state) = self.resource.read(ctx, meta, id, diags).await.optional()? else {
            return Ok(None);
        };
        let mut attributes = serde_json::to_value(&state)?;
        self.schema.carry_unobserved(&mut attributes, carry);
        self.schema.strip_write_only(&mut attributes);
        Ok(Some(ResourceData::new(id, attributes)))
    }

    /// Attribute changes of `config` against `prior`, write-only inputs
    /// compared by digest.
    fn changes(&self, config: &Value, prior: &ResourceData) -> ChangeSet {
        ChangeSet::between(&self.schema, config, &prior.attributes).with_write_only(
            &self.schema,
            config,
            &prior.private,
        )
    }

    fn plan_adjustment(
        &self,
        config: &Value,
        spec: &R::Spec,
        prior: Option<&ResourceData>,
    ) -> Result<PlanAdjustment> {
        let mut adjustment = PlanAdjustment::default();
        let Some(prior) = prior else {
            self.resource.customize_diff(None, spec, &mut adjustment);
            return Ok(adjustment);
        };

        let changes = self.changes(config, prior);
        for name in changes.iter() {
            if self.schema.is_force_new(name) {
                adjustment.replace(name);
            }
        }
        let prior_state = self.parse_prior(prior)?;
        self.resource
            .customize_diff(Some(&prior_state), spec, &mut adjustment);
        Ok(adjustment)
    }
}

#[async_trait]
impl<R: Resource> ResourceHandler for Lifecycle<R> {
    fn type_name(&self) -> &'static str {
        self.resource.type_name()
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    async fn plan(&self, _meta: &Meta, config: Value, prior: Option<&ResourceData>) -> PlanResponse {
        let spec = match self.parse_spec(&config) {
            Ok(spec) => spec,
            Err(diagnostics) => {
                return PlanResponse {
                    planned: config,
                    requires_replace: Vec::new(),
                    diagnostics,
                };
            }
        };

        match self.plan_adjustment(&config, &spec, prior) {
            Ok(adjustment) => PlanResponse {
                planned: config,
                requires_replace: adjustment.requires_replace.into_iter().collect(),
                diagnostics: adjustment.diagnostics,
            },
            Err(e) => {
                let mut diagnostics = Diagnostics::new();
                diagnostics.error(&e);
                PlanResponse {
                    planned: config,
                    requires_replace: Vec::new(),
                    diagnostics,
                }
            }
        }
    }

    async fn create(&self, cancel: &CancellationToken, meta: &Meta, config: Value) -> Response {
        let ctx = OpContext::with_cancellation(self.schema.timeouts.create, cancel.child_token());
        let spec = match self.parse_spec(&config) {
            Ok(spec) => spec,
            Err(diags) => return Response::from_diagnostics(None, diags),
        };

        let mut adjustment = PlanAdjustment::default();
        self.resource.customize_diff(None, &spec, &mut adjustment);
        if adjustment.diagnostics.has_errors() {
            return Response::from_diagnostics(None, adjustment.diagnostics);
        }

        if let Err(e) = ctx.check(self.type_name()) {
            return Response::failed(None, &e);
        }

        let id = match self.resource.create(&ctx, meta, &spec).await {
            Ok(id) => id,
            Err(e) => return Response::failed(None, &e),
        };
        tracing::info!("Created {} {}", self.type_name(), id);

        // The call went through: from here on the state ID is ours.
        if ctx.is_cancelled() {
            return Response::failed(
                Some(ResourceData::pending(&id)),
                &CloudError::Cancelled(format!("create of {} {}", self.type_name(), id)),
            );
        }
        if let Err(e) = self.resource.wait_ready(&ctx, meta, &id).await {
            return Response::failed(Some(ResourceData::pending(&id)), &e);
        }

        let mut diags = Diagnostics::new();
        match self.observe(&ctx, meta, &id, &config, &mut diags).await {
            Ok(Some(state)) => {
                let state = state.with_private(self.schema.write_only_digests(&config));
                Response::from_diagnostics(Some(state), diags)
            }
            Ok(None) => Response::failed(
                None,
                &CloudError::NotFound(format!("{} {} vanished after create", self.type_name(), id)),
            ),
            Err(e) => {
                diags.error(&e);
                Response::from_diagnostics(Some(ResourceData::pending(&id)), diags)
            }
        }
    }

    async fn read(&self, cancel: &CancellationToken, meta: &Meta, prior: &ResourceData) -> Response {
        let ctx = OpContext::with_cancellation(self.schema.timeouts.read, cancel.child_token());
        let mut diags = Diagnostics::new();
        match self.observe(&ctx, meta, &prior.id, &prior.attributes, &mut diags).await {
            Ok(Some(state)) => {
                let state = state.with_private(prior.private.clone());
                Response::from_diagnostics(Some(state), diags)
            }
            Ok(None) => {
                tracing::warn!("{} {} not found, removing from state", self.type_name(), prior.id);
                Response::from_diagnostics(None, diags)
            }
            Err(e) => {
                diags.error(&e);
                Response::from_diagnostics(Some(prior.clone()), diags)
            }
        }
    }

    async fn update(
        &self,
        cancel: &CancellationToken,
        meta: &Meta,
        config: Value,
        prior: &ResourceData,
    ) -> Response {
        let ctx = OpContext::with_cancellation(self.schema.timeouts.update, cancel.child_token());
        let spec = match self.parse_spec(&config) {
            Ok(spec) => spec,
            Err(diags) => return Response::from_diagnostics(Some(prior.clone()), diags),
        };
        let prior_state = match self.parse_prior(prior) {
            Ok(state) => state,
            Err(e) => return Response::failed(Some(prior.clone()), &e),
        };

        let adjustment = match self.plan_adjustment(&config, &spec, Some(prior)) {
            Ok(adjustment) => adjustment,
            Err(e) => return Response::failed(Some(prior.clone()), &e),
        };
        if adjustment.diagnostics.has_errors() {
            return Response::from_diagnostics(Some(prior.clone()), adjustment.diagnostics);
        }
        if adjustment.requires_replace() {
            let attrs: Vec<String> = adjustment.requires_replace.into_iter().collect();
            let err = CloudError::validation(
                attrs.join(","),
                "changing this attribute requires replacing the resource",
            );
            return Response::failed(Some(prior.clone()), &err);
        }

        let changes = self.changes(&config, prior);
        if !changes.is_empty() {
            tracing::info!(
                "Updating {} {}: {}",
                self.type_name(),
                prior.id,
                changes.iter().collect::<Vec<_>>().join(", ")
            );
            if let Err(e) = ctx.check(self.type_name()) {
                return Response::failed(Some(prior.clone()), &e);
            }
            if let Err(e) = self
                .resource
                .update(&ctx, meta, &prior.id, &prior_state, &spec, &changes)
                .await
            {
                let state = if e.is_not_found() { None } else { Some(prior.clone()) };
                return Response::failed(state, &e);
            }
        }

        let mut diags = Diagnostics::new();
        match self.observe(&ctx, meta, &prior.id, &config, &mut diags).await {
            Ok(Some(state)) => {
                let state = state.with_private(self.schema.write_only_digests(&config));
                Response::from_diagnostics(Some(state), diags)
            }
            Ok(None) => Response::failed(
                None,
                &CloudError::NotFound(format!("{} {}", self.type_name(), prior.id)),
            ),
            Err(e) => {
                diags.error(&e);
                Response::from_diagnostics(Some(prior.clone()), diags)
            }
        }
    }

    async fn delete(&self, cancel: &CancellationToken, meta: &Meta, prior: &ResourceData) -> Response {
        let ctx = OpContext::with_cancellation(self.schema.timeouts.delete, cancel.child_token());
        let id = prior.id.as_str();

        match self.resource.wait_settled(&ctx, meta, id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Response::cleared(),
            Err(e) => return Response::failed(Some(prior.clone()), &e),
        }

        match self.resource.delete(&ctx, meta, id).await {
            Ok(()) => tracing::info!("Deleted {} {}", self.type_name(), id),
            Err(e) if e.is_not_found() => return Response::cleared(),
            Err(e) => return Response::failed(Some(prior.clone()), &e),
        }

        if ctx.is_cancelled() {
            return Response::failed(
                Some(prior.clone()),
                &CloudError::Cancelled(format!("delete of {} {}", self.type_name(), id)),
            );
        }

        // The delete call went through; a failed confirmation only warns.
        let mut diags = Diagnostics::new();
        if let Err(e) = self.resource.wait_absent(&ctx, meta, id).await {
            tracing::warn!("{} {} deletion not confirmed: {}", self.type_name(), id, e);
            diags.push(Diagnostic::warning_from(&e));
        }
        Response::from_diagnostics(None, diags)
    }

    async fn import(&self, cancel: &CancellationToken, meta: &Meta, raw_id: &str) -> Response {
        let id = match self.resource.import_id(meta, raw_id) {
            Ok(id) => id,
            Err(e) => return Response::failed(None, &e),
        };
        let ctx = OpContext::with_cancellation(self.schema.timeouts.read, cancel.child_token());
        let mut diags = Diagnostics::new();
        match self.observe(&ctx, meta, &id, &Value::Null, &mut diags).await {
            Ok(Some(state)) => Response::from_diagnostics(Some(state), diags),
            Ok(None) => Response::failed(
                None,
                &CloudError::NotFound(format!("cannot import {} {}", self.type_name(), id)),
            ),
            Err(e) => {
                diags.error(&e);
                Response::from_diagnostics(None, diags)
            }
        }
    }
}
