//! Read-only lookups by ID or by exact name

use crate::context::{Meta, OpContext};
use crate::diag::Diagnostics;
use crate::error::{CloudError, Result};
use crate::id::LocalizedId;
use crate::lifecycle::{ResourceData, Response};
use crate::schema::Schema;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Which locality attribute scopes the lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Zone,
    Region,
}

impl Scope {
    pub fn attribute(&self) -> &'static str {
        match self {
            Scope::Zone => "zone",
            Scope::Region => "region",
        }
    }

    fn default_locality(&self, meta: &Meta) -> Option<String> {
        match self {
            Scope::Zone => meta.defaults.zone.as_ref().map(|z| z.to_string()),
            Scope::Region => meta.defaults.region.as_ref().map(|r| r.to_string()),
        }
    }
}

/// A resolved lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    ById(LocalizedId),
    ByName { locality: String, name: String },
}

impl Lookup {
    /// Reads the lookup keys from a data-source config. Exactly one of the
    /// ID attribute and `name` must be set; the locality comes from the
    /// declared attribute or the provider default and must be known for a
    /// name lookup.
    pub fn from_config(config: &Value, id_attribute: &str, scope: Scope, meta: &Meta) -> Result<Self> {
        let text = |key: &str| {
            config
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let declared = text(scope.attribute());
        let locality = declared.or_else(|| scope.default_locality(meta));

        match (text(id_attribute), text("name")) {
            (Some(_), Some(_)) => Err(CloudError::validation(
                id_attribute,
                format!("only one of {} and name can be set", id_attribute),
            )),
            (None, None) => Err(CloudError::validation(
                id_attribute,
                format!("one of {} and name must be set", id_attribute),
            )),
            (Some(raw), None) => {
                let id = LocalizedId::resolve(&raw, locality.as_deref())?;
                if id.locality().is_empty() {
                    return Err(CloudError::validation(
                        scope.attribute(),
                        format!("{} is bare and no default {} is configured", raw, scope.attribute()),
                    ));
                }
                Ok(Lookup::ById(id))
            }
            (None, Some(name)) => match locality {
                Some(locality) => Ok(Lookup::ByName { locality, name }),
                None => Err(CloudError::validation(
                    scope.attribute(),
                    format!(
                        "lookup by name needs a {} and no default is configured",
                        scope.attribute()
                    ),
                )),
            },
        }
    }
}

/// Picks the single item whose name matches exactly.
pub fn find_exact<T>(what: &str, name: &str, items: Vec<T>, name_of: impl Fn(&T) -> &str) -> Result<T> {
    let mut hits: Vec<T> = items.into_iter().filter(|i| name_of(i) == name).collect();
    match hits.len() {
        0 => Err(CloudError::NotFound(format!("no {} named {:?}", what, name))),
        1 => Ok(hits.remove(0)),
        n => Err(CloudError::validation(
            "name",
            format!("{} {}s are named {:?}, use the ID instead", n, what, name),
        )),
    }
}

/// Per-kind lookups plugged into [`DataSourceHandler`].
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    type Item: Serialize + Send + Sync;

    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn scope(&self) -> Scope;

    /// Attribute carrying the looked-up ID (`volume_id`, `cluster_id`).
    fn id_attribute(&self) -> &'static str;

    async fn get(&self, ctx: &OpContext, meta: &Meta, id: &LocalizedId) -> Result<Self::Item>;

    /// Lists the candidates for `name` in `locality`, returning their IDs.
    /// The server-side filter may be a substring match.
    async fn list_by_name(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        locality: &str,
        name: &str,
    ) -> Result<Vec<(String, Self::Item)>>;

    fn name_of<'a>(&self, item: &'a Self::Item) -> &'a str;
}

/// Type-erased data-source entry point.
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, cancel: &CancellationToken, meta: &Meta, config: Value) -> Response;
}

pub struct Lookups<D: DataSource> {
    source: D,
    schema: Schema,
}

impl<D: DataSource> Lookups<D> {
    pub fn new(source: D) -> Self {
        let schema = source.schema();
        Self { source, schema }
    }

    async fn lookup(&self, ctx: &OpContext, meta: &Meta, config: &Value) -> Result<ResourceData> {
        let lookup = Lookup::from_config(config, self.source.id_attribute(), self.source.scope(), meta)?;
        let (id, item) = match lookup {
            Lookup::ById(id) => {
                let item = self.source.get(ctx, meta, &id).await?;
                (id, item)
            }
            Lookup::ByName { locality, name } => {
                let found = self.source.list_by_name(ctx, meta, &locality, &name).await?;
                let (raw, item) =
                    find_exact(self.source.type_name(), &name, found, |(_, i)| self.source.name_of(i))?;
                (LocalizedId::new(&locality, raw), item)
            }
        };

        let mut attributes = serde_json::to_value(&item)?;
        if let Some(map) = attributes.as_object_mut() {
            map.insert(self.source.id_attribute().to_string(), Value::String(id.to_string()));
            map.insert(
                self.source.scope().attribute().to_string(),
                Value::String(id.locality().to_string()),
            );
        }
        self.schema.strip_write_only(&mut attributes);
        Ok(ResourceData::new(id.to_string(), attributes))
    }
}

#[async_trait]
impl<D: DataSource> DataSourceHandler for Lookups<D> {
    fn type_name(&self) -> &'static str {
        self.source.type_name()
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    async fn read(&self, cancel: &CancellationToken, meta: &Meta, config: Value) -> Response {
        let diags: Diagnostics = self.schema.validate(&config);
        if diags.has_errors() {
            return Response {
                state: None,
                diagnostics: diags,
            };
        }
        let ctx = OpContext::with_cancellation(self.schema.timeouts.read, cancel.child_token());
        match self.lookup(&ctx, meta, &config).await {
            Ok(state) => Response::ok(state),
            Err(e) => Response::failed(None, &e),
        }
    }
}
