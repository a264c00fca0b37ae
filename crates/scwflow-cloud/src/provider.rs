//! Provider registry and RPC dispatch
//!
//! The host talks to the provider through [`Request`] / [`RpcResponse`]
//! records. Handlers are built from the provider configuration, so the
//! registry is rebuilt on every `configure`.

use crate::context::Meta;
use crate::data_source::DataSourceHandler;
use crate::diag::{Diagnostic, Diagnostics};
use crate::error::{CloudError, Result};
use crate::lifecycle::{ResourceData, ResourceHandler, Response};
use crate::schema::{Attribute, AttributeType, Schema};
use scwflow_config::ProviderConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Resource and data-source handlers keyed by type name.
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSourceHandler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, handler: impl ResourceHandler + 'static) -> Self {
        self.resources.insert(handler.type_name(), Box::new(handler));
        self
    }

    pub fn data_source(mut self, handler: impl DataSourceHandler + 'static) -> Self {
        self.data_sources.insert(handler.type_name(), Box::new(handler));
        self
    }

    pub fn get_resource(&self, type_name: &str) -> Result<&dyn ResourceHandler> {
        self.resources
            .get(type_name)
            .map(|h| h.as_ref())
            .ok_or_else(|| CloudError::UnknownType(type_name.to_string()))
    }

    pub fn get_data_source(&self, type_name: &str) -> Result<&dyn DataSourceHandler> {
        self.data_sources
            .get(type_name)
            .map(|h| h.as_ref())
            .ok_or_else(|| CloudError::UnknownType(format!("data source {}", type_name)))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: config_schema(),
            resources: self
                .resources
                .iter()
                .map(|(name, h)| (name.to_string(), h.schema()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(name, h)| (name.to_string(), h.schema()))
                .collect(),
        }
    }
}

/// Schema of every type the provider serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSchema {
    pub provider: Schema,
    pub resources: BTreeMap<String, Schema>,
    pub data_sources: BTreeMap<String, Schema>,
}

/// Schema of the provider configuration block.
pub fn config_schema() -> Schema {
    Schema::v0()
        .with_attribute("access_key", Attribute::optional(AttributeType::String))
        .with_attribute("secret_key", Attribute::optional(AttributeType::String).sensitive())
        .with_attribute("project_id", Attribute::optional(AttributeType::String))
        .with_attribute("organization_id", Attribute::optional(AttributeType::String))
        .with_attribute("zone", Attribute::optional(AttributeType::String))
        .with_attribute("region", Attribute::optional(AttributeType::String))
        .with_attribute("api_url", Attribute::optional(AttributeType::String))
        .with_attribute(
            "retry_interval",
            Attribute::optional(AttributeType::Duration)
                .describe("Waiter poll interval in seconds, meant for test suites"),
        )
        .with_attribute("profile_path", Attribute::optional(AttributeType::String))
        .with_attribute("profile", Attribute::optional(AttributeType::String))
}

/// Builds the handlers against a configured cloud client.
pub type Builder = Box<dyn Fn(&ProviderConfig) -> Result<Registry> + Send + Sync>;

/// One host request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Schema,
    Configure {
        #[serde(default)]
        config: Value,
    },
    Plan {
        #[serde(rename = "type")]
        type_name: String,
        config: Value,
        #[serde(default)]
        prior: Option<ResourceData>,
    },
    Create {
        #[serde(rename = "type")]
        type_name: String,
        config: Value,
    },
    Read {
        #[serde(rename = "type")]
        type_name: String,
        prior: ResourceData,
    },
    Update {
        #[serde(rename = "type")]
        type_name: String,
        config: Value,
        prior: ResourceData,
    },
    Delete {
        #[serde(rename = "type")]
        type_name: String,
        prior: ResourceData,
    },
    Import {
        #[serde(rename = "type")]
        type_name: String,
        id: String,
    },
    ReadDataSource {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        config: Value,
    },
}

/// One provider reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub state: Option<ResourceData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_replace: Vec<String>,
    pub diagnostics: Diagnostics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ProviderSchema>,
}

impl RpcResponse {
    fn diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            ..Default::default()
        }
    }

    fn error(err: &CloudError) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(err);
        Self::diagnostics(diagnostics)
    }
}

impl From<Response> for RpcResponse {
    fn from(resp: Response) -> Self {
        Self {
            state: resp.state,
            diagnostics: resp.diagnostics,
            ..Default::default()
        }
    }
}

struct Configured {
    meta: Meta,
    registry: Registry,
}

/// The provider process state: unconfigured until the host sends its
/// configuration block.
pub struct Provider {
    build: Builder,
    catalog: Registry,
    configured: Option<Configured>,
}

impl Provider {
    /// Builds an unconfigured provider. The catalog used for schema
    /// requests is built from an empty configuration and never calls out.
    pub fn new(build: Builder) -> Result<Self> {
        let catalog = build(&ProviderConfig::default())?;
        Ok(Self {
            build,
            catalog,
            configured: None,
        })
    }

    pub fn schema(&self) -> ProviderSchema {
        self.catalog.schema()
    }

    pub fn is_configured(&self) -> bool {
        self.configured.is_some()
    }

    /// Resolves the configuration block (merging the profile file when one
    /// is named), derives the meta and rebuilds the handlers.
    pub fn configure(&mut self, block: Value) -> Diagnostics {
        let block = if block.is_null() {
            Value::Object(Default::default())
        } else {
            block
        };
        let mut diags = config_schema().validate(&block);
        if diags.has_errors() {
            return diags;
        }
        match self.try_configure(block) {
            Ok(warnings) => {
                diags.extend(warnings);
                tracing::info!("Provider configured");
            }
            Err(e) => diags.error(&e),
        }
        diags
    }

    fn try_configure(&mut self, block: Value) -> Result<Diagnostics> {
        let config = ProviderConfig::from_value(block)?.resolve()?;
        config.validate()?;
        let (meta, warnings) = Meta::from_config(&config)?;
        let registry = (self.build)(&config)?;
        self.configured = Some(Configured { meta, registry });
        Ok(warnings)
    }

    fn configured(&self) -> Result<&Configured> {
        self.configured.as_ref().ok_or_else(|| {
            CloudError::Config(scwflow_config::ConfigError::InvalidValue {
                field: "provider",
                message: "provider is not configured".to_string(),
            })
        })
    }

    /// Dispatches one request. Never fails: errors become diagnostics.
    pub async fn handle(&mut self, cancel: &CancellationToken, request: Request) -> RpcResponse {
        match request {
            Request::Schema => RpcResponse {
                schema: Some(self.schema()),
                ..Default::default()
            },
            Request::Configure { config } => RpcResponse::diagnostics(self.configure(config)),
            Request::Plan {
                type_name,
                config,
                prior,
            } => {
                // Plans may run before configure; fall back to empty defaults.
                let default_meta = Meta::default();
                let (meta, registry) = match &self.configured {
                    Some(c) => (&c.meta, &c.registry),
                    None => (&default_meta, &self.catalog),
                };
                match registry.get_resource(&type_name) {
                    Ok(handler) => {
                        let plan = handler.plan(meta, config, prior.as_ref()).await;
                        RpcResponse {
                            state: None,
                            requires_replace: plan.requires_replace,
                            diagnostics: plan.diagnostics,
                            schema: None,
                        }
                    }
                    Err(e) => RpcResponse::error(&e),
                }
            }
            other => match self.configured() {
                Ok(c) => dispatch(c, cancel, other).await,
                Err(e) => RpcResponse::error(&e),
            },
        }
    }
}

async fn dispatch(c: &Configured, cancel: &CancellationToken, request: Request) -> RpcResponse {
    let meta = &c.meta;
    let result = match request {
        Request::Create { type_name, config } => c
            .registry
            .get_resource(&type_name)
            .map(|h| (h, Op::Create(config))),
        Request::Read { type_name, prior } => c
            .registry
            .get_resource(&type_name)
            .map(|h| (h, Op::Read(prior))),
        Request::Update {
            type_name,
            config,
            prior,
        } => c
            .registry
            .get_resource(&type_name)
            .map(|h| (h, Op::Update(config, prior))),
        Request::Delete { type_name, prior } => c
            .registry
            .get_resource(&type_name)
            .map(|h| (h, Op::Delete(prior))),
        Request::Import { type_name, id } => c
            .registry
            .get_resource(&type_name)
            .map(|h| (h, Op::Import(id))),
        Request::ReadDataSource { type_name, config } => {
            return match c.registry.get_data_source(&type_name) {
                Ok(h) => h.read(cancel, meta, config).await.into(),
                Err(e) => RpcResponse::error(&e),
            };
        }
        Request::Schema | Request::Configure { .. } | Request::Plan { .. } => {
            return RpcResponse::diagnostics(
                vec![Diagnostic::error("validation", "request handled by the provider")].into(),
            );
        }
    };

    let (handler, op) = match result {
        Ok(pair) => pair,
        Err(e) => return RpcResponse::error(&e),
    };
    tracing::debug!("{} {}", op.name(), handler.type_name());
    let response = match op {
        Op::Create(config) => handler.create(cancel, meta, config).await,
        Op::Read(prior) => handler.read(cancel, meta, &prior).await,
        Op::Update(config, prior) => handler.update(cancel, meta, config, &prior).await,
        Op::Delete(prior) => handler.delete(cancel, meta, &prior).await,
        Op::Import(id) => handler.import(cancel, meta, &id).await,
    };
    response.into()
}

enum Op {
    Create(Value),
    Read(ResourceData),
    Update(Value, ResourceData),
    Delete(ResourceData),
    Import(String),
}

impl Op {
    fn name(&self) -> &'static str {
        match self {
            Op::Create(_) => "create",
            Op::Read(_) => "read",
            Op::Update(..) => "update",
            Op::Delete(_) => "delete",
            Op::Import(_) => "import",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeSet;
    use crate::context::OpContext;
    use crate::lifecycle::{Lifecycle, Resource};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Stores a single string value under a fixed ID.
    #[derive(Default)]
    struct Note {
        text: Mutex<Option<String>>,
    }

    #[derive(Deserialize)]
    struct NoteSpec {
        text: String,
    }

    #[derive(Serialize, Deserialize)]
    struct NoteState {
        text: String,
    }

    #[async_trait]
    impl Resource for Note {
        type Spec = NoteSpec;
        type State = NoteState;

        fn type_name(&self) -> &'static str {
            "test_note"
        }

        fn schema(&self) -> Schema {
            Schema::v0().with_attribute("text", Attribute::required(AttributeType::String))
        }

        async fn create(&self, _ctx: &OpContext, _meta: &Meta, spec: &NoteSpec) -> Result<String> {
            *self.text.lock().unwrap() = Some(spec.text.clone());
            Ok("fr-par/note".to_string())
        }

        async fn wait_ready(&self, _ctx: &OpContext, _meta: &Meta, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn wait_settled(&self, _ctx: &OpContext, _meta: &Meta, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn read(
            &self,
            _ctx: &OpContext,
            _meta: &Meta,
            id: &str,
            _diags: &mut Diagnostics,
        ) -> Result<NoteState> {
            self.text
                .lock()
                .unwrap()
                .clone()
                .map(|text| NoteState { text })
                .ok_or_else(|| CloudError::NotFound(id.to_string()))
        }

        async fn update(
            &self,
            _ctx: &OpContext,
            _meta: &Meta,
            _id: &str,
            _prior: &NoteState,
            spec: &NoteSpec,
            _changes: &ChangeSet,
        ) -> Result<()> {
            *self.text.lock().unwrap() = Some(spec.text.clone());
            Ok(())
        }

        async fn delete(&self, _ctx: &OpContext, _meta: &Meta, _id: &str) -> Result<()> {
            *self.text.lock().unwrap() = None;
            Ok(())
        }

        async fn wait_absent(&self, _ctx: &OpContext, _meta: &Meta, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn provider() -> Provider {
        Provider::new(Box::new(|_config| {
            Ok(Registry::new().resource(Lifecycle::new(Note::default())))
        }))
        .unwrap()
    }

    fn request(v: Value) -> Request {
        serde_json::from_value(v).unwrap()
    }

    #[tokio::test]
    async fn test_schema_before_configure() {
        let mut p = provider();
        let resp = p.handle(&CancellationToken::new(), Request::Schema).await;
        let schema = resp.schema.unwrap();
        assert!(schema.resources.contains_key("test_note"));
        assert!(schema.provider.get("secret_key").unwrap().sensitive);
    }

    #[tokio::test]
    async fn test_requires_configure() {
        let mut p = provider();
        let cancel = CancellationToken::new();
        let resp = p
            .handle(&cancel, request(json!({"op": "create", "type": "test_note", "config": {"text": "a"}})))
            .await;
        assert!(resp.diagnostics.has_errors());

        let diags = p.configure(json!({"zone": "fr-par-1"}));
        assert!(diags.has_errors(), "credentials are mandatory");

        let diags = p.configure(json!({"access_key": "SCW", "secret_key": "s", "zone": "fr-par-1"}));
        assert!(!diags.has_errors(), "{:?}", diags);
        assert!(p.is_configured());
    }

    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let mut p = provider();
        let cancel = CancellationToken::new();
        p.configure(json!({"access_key": "SCW", "secret_key": "s", "region": "fr-par"}));

        let created = p
            .handle(&cancel, request(json!({"op": "create", "type": "test_note", "config": {"text": "a"}})))
            .await;
        let state = created.state.unwrap();
        assert_eq!(state.id, "fr-par/note");

        let plan = p
            .handle(
                &cancel,
                request(json!({"op": "plan", "type": "test_note", "config": {"text": "b"}, "prior": state})),
            )
            .await;
        assert!(plan.requires_replace.is_empty());

        let deleted = p
            .handle(&cancel, request(json!({"op": "delete", "type": "test_note", "prior": state})))
            .await;
        assert!(deleted.state.is_none());
        assert!(deleted.diagnostics.is_empty());

        let unknown = p
            .handle(&cancel, request(json!({"op": "read", "type": "nope", "prior": state})))
            .await;
        assert!(unknown.diagnostics.has_errors());
    }
}
