//! `scaleway_documentdb_user`
//!
//! State ID: `<region>/<instance-id>/<user-name>`. Every call goes through
//! the parent instance, which is busy for a while after each change; a
//! conflict is retried once the instance is ready again.

use super::documentdb_instance::{settle_instance, wait_instance};
use super::regional_parent;
use crate::api::documentdb::{CreateUserRequest, DocumentDbApi, UpdateUserRequest, User};
use async_trait::async_trait;
use scwflow_cloud::sets::best_effort_delete;
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, CloudError, Diagnostics, Meta, NestedId, OpContext,
    Region, Resource, Result, Schema, find_exact, id, retry_on_conflict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserSpec {
    pub instance_id: String,
    pub name: String,
    pub password: String,
    pub is_admin: Option<bool>,
    pub region: Option<String>,
}

/// `password` is never read back and is kept from the previous record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserState {
    pub instance_id: String,
    pub name: String,
    pub is_admin: bool,
    pub region: String,
}

/// Parses a nested state ID whose locality must be a region.
pub(crate) fn parse_nested(raw: &str) -> Result<(NestedId, Region)> {
    let nested = NestedId::parse(raw)?;
    let region = Region::parse(&nested.locality)
        .map_err(|_| CloudError::malformed_id(raw, "locality is not a region"))?;
    Ok((nested, region))
}

pub struct DocumentDbUser {
    api: Arc<dyn DocumentDbApi>,
}

impl DocumentDbUser {
    pub fn new(api: Arc<dyn DocumentDbApi>) -> Self {
        Self { api }
    }

    async fn find(&self, region: &str, instance: &str, name: &str) -> Result<User> {
        let users = self
            .api
            .list_documentdb_users(region, instance, Some(name))
            .await?;
        find_exact(
            "documentdb user",
            name,
            users,
            |u| u.name.as_str(),
        )
    }
}

#[async_trait]
impl Resource for DocumentDbUser {
    type Spec = UserSpec;
    type State = UserState;

    fn type_name(&self) -> &'static str {
        "scaleway_documentdb_user"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "instance_id",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute("name", Attribute::required(AttributeType::String).force_new())
            .with_attribute(
                "password",
                Attribute::required(AttributeType::String).sensitive(),
            )
            .with_attribute("is_admin", Attribute::optional_computed(AttributeType::Boolean))
            .regional()
    }

    async fn create(&self, ctx: &OpContext, meta: &Meta, spec: &UserSpec) -> Result<String> {
        let instance = regional_parent(meta, &spec.instance_id, spec.region.as_deref())?;
        let (api, region, uuid) = (self.api.as_ref(), instance.region.as_str(), instance.id.as_str());
        wait_instance(ctx, meta, api, region, uuid).await?;

        let req = CreateUserRequest {
            name: spec.name.clone(),
            password: spec.password.clone(),
            is_admin: spec.is_admin.unwrap_or(false),
        };
        let what = format!("create of documentdb user {} on {}", spec.name, instance);
        retry_on_conflict(
            ctx,
            meta,
            &what,
            move || async move { wait_instance(ctx, meta, api, region, uuid).await.map(|_| ()) },
            || api.create_documentdb_user(region, uuid, &req),
        )
        .await?;
        Ok(NestedId::new(region, uuid, &spec.name).to_string())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let (id, region) = parse_nested(id)?;
        wait_instance(ctx, meta, self.api.as_ref(), region.as_str(), &id.outer).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let (id, region) = parse_nested(id)?;
        settle_instance(ctx, meta, self.api.as_ref(), region.as_str(), &id.outer).await
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        _diags: &mut Diagnostics,
    ) -> Result<UserState> {
        let (id, region) = parse_nested(id)?;
        let user = self.find(region.as_str(), &id.outer, &id.inner).await?;
        Ok(UserState {
            instance_id: id::format(&region, &id.outer),
            name: user.name,
            is_admin: user.is_admin,
            region: region.to_string(),
        })
    }

    async fn update(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        _prior: &UserState,
        spec: &UserSpec,
        changes: &ChangeSet,
    ) -> Result<()> {
        if !changes.any(&["password", "is_admin"]) {
            return Ok(());
        }
        let (id, region) = parse_nested(id)?;
        let (api, region, instance, name) = (
            self.api.as_ref(),
            region.as_str(),
            id.outer.as_str(),
            id.inner.as_str(),
        );
        let req = UpdateUserRequest {
            password: changes.has("password").then(|| spec.password.clone()),
            is_admin: spec.is_admin.filter(|_| changes.has("is_admin")),
        };
        retry_on_conflict(
            ctx,
            meta,
            &format!("update of documentdb user {}", id),
            move || async move { wait_instance(ctx, meta, api, region, instance).await.map(|_| ()) },
            || api.update_documentdb_user(region, instance, name, &req),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let (nested, region) = parse_nested(id)?;
        let (api, region, instance, name) = (
            self.api.as_ref(),
            region.as_str(),
            nested.outer.as_str(),
            nested.inner.as_str(),
        );
        let what = format!("documentdb user {}", nested);
        let what = what.as_str();
        retry_on_conflict(
            ctx,
            meta,
            what,
            move || async move { wait_instance(ctx, meta, api, region, instance).await.map(|_| ()) },
            move || best_effort_delete(what, api.delete_documentdb_user(region, instance, name)),
        )
        .await
    }

    /// Deletion is applied once the instance settles; the user must then be
    /// gone from the listing.
    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let (nested, region) = parse_nested(id)?;
        wait_instance(ctx, meta, self.api.as_ref(), region.as_str(), &nested.outer).await?;
        match self.find(region.as_str(), &nested.outer, &nested.inner).await {
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
            Ok(_) => Err(CloudError::Failed {
                resource: format!("documentdb user {}", nested),
                status: "still present after delete".to_string(),
            }),
        }
    }

    fn import_id(&self, _meta: &Meta, raw: &str) -> Result<String> {
        let (nested, _) = parse_nested(raw)?;
        Ok(nested.to_string())
    }
}
