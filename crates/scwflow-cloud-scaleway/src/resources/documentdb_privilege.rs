//! `scaleway_documentdb_privilege`
//!
//! State ID: `<region>/<instance-id>/<user-name>/<database-name>`. There is
//! no delete call: removing the resource sets the permission to `none`.

use super::documentdb_instance::{settle_instance, wait_instance};
use super::documentdb_user::parse_nested;
use super::regional_parent;
use crate::api::documentdb::{DocumentDbApi, Permission, Privilege};
use async_trait::async_trait;
use scwflow_cloud::{
    Attribute, AttributeType, ChangeSet, CloudError, Diagnostics, Meta, NestedId, OpContext,
    Resource, Result, Schema, retry_on_conflict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrivilegeSpec {
    pub instance_id: String,
    pub user_name: String,
    pub database_name: String,
    pub permission: Option<Permission>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeState {
    pub instance_id: String,
    pub user_name: String,
    pub database_name: String,
    pub permission: Option<Permission>,
    pub region: String,
}

struct Target {
    region: String,
    instance: String,
    user_name: String,
    database_name: String,
}

impl Target {
    fn parse(raw: &str) -> Result<Self> {
        let (nested, region) = parse_nested(raw)?;
        match nested.inner_segments().as_slice() {
            [user, database] if !user.is_empty() && !database.is_empty() => Ok(Self {
                region: region.to_string(),
                instance: nested.outer.clone(),
                user_name: user.to_string(),
                database_name: database.to_string(),
            }),
            _ => Err(CloudError::malformed_id(
                raw,
                "expected <region>/<instance-id>/<user-name>/<database-name>",
            )),
        }
    }

    fn id(&self) -> String {
        NestedId::new(
            &self.region,
            &self.instance,
            format!("{}/{}", self.user_name, self.database_name),
        )
        .to_string()
    }

    fn privilege(&self, permission: Permission) -> Privilege {
        Privilege {
            user_name: self.user_name.clone(),
            database_name: self.database_name.clone(),
            permission,
        }
    }
}

pub struct DocumentDbPrivilege {
    api: Arc<dyn DocumentDbApi>,
}

impl DocumentDbPrivilege {
    pub fn new(api: Arc<dyn DocumentDbApi>) -> Self {
        Self { api }
    }

    /// Sets the permission, retrying while the instance applies another change.
    async fn set(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        target: &Target,
        permission: Permission,
    ) -> Result<()> {
        let (api, region, instance) = (
            self.api.as_ref(),
            target.region.as_str(),
            target.instance.as_str(),
        );
        let privilege = target.privilege(permission);
        retry_on_conflict(
            ctx,
            meta,
            &format!("{} privilege on {}", permission, target.id()),
            move || async move { wait_instance(ctx, meta, api, region, instance).await.map(|_| ()) },
            || api.set_documentdb_privilege(region, instance, &privilege),
        )
        .await
    }
}

fn required_permission(spec: &PrivilegeSpec) -> Result<Permission> {
    match spec.permission {
        Some(Permission::None) | None => Err(CloudError::validation(
            "permission",
            "one of readonly, readwrite, all or custom is required",
        )),
        Some(p) => Ok(p),
    }
}

#[async_trait]
impl Resource for DocumentDbPrivilege {
    type Spec = PrivilegeSpec;
    type State = PrivilegeState;

    fn type_name(&self) -> &'static str {
        "scaleway_documentdb_privilege"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "instance_id",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute(
                "user_name",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute(
                "database_name",
                Attribute::required(AttributeType::String).force_new(),
            )
            .with_attribute(
                "permission",
                Attribute::required(AttributeType::String)
                    .describe("readonly, readwrite, all or custom"),
            )
            .regional()
    }

    async fn create(&self, ctx: &OpContext, meta: &Meta, spec: &PrivilegeSpec) -> Result<String> {
        let permission = required_permission(spec)?;
        let instance = regional_parent(meta, &spec.instance_id, spec.region.as_deref())?;
        let target = Target {
            region: instance.region.to_string(),
            instance: instance.id,
            user_name: spec.user_name.clone(),
            database_name: spec.database_name.clone(),
        };
        wait_instance(ctx, meta, self.api.as_ref(), &target.region, &target.instance).await?;
        self.set(ctx, meta, &target, permission).await?;
        Ok(target.id())
    }

    async fn wait_ready(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let target = Target::parse(id)?;
        wait_instance(ctx, meta, self.api.as_ref(), &target.region, &target.instance).await?;
        Ok(())
    }

    async fn wait_settled(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        let target = Target::parse(id)?;
        settle_instance(ctx, meta, self.api.as_ref(), &target.region, &target.instance).await
    }

    async fn read(
        &self,
        _ctx: &OpContext,
        _meta: &Meta,
        id: &str,
        _diags: &mut Diagnostics,
    ) -> Result<PrivilegeState> {
        let target = Target::parse(id)?;
        let privileges = self
            .api
            .list_documentdb_privileges(
                &target.region,
                &target.instance,
                &target.user_name,
                &target.database_name,
            )
            .await?;
        let granted = privileges.into_iter().find(|p| {
            p.user_name == target.user_name
                && p.database_name == target.database_name
                && p.permission != Permission::None
        });
        match granted {
            Some(p) => Ok(PrivilegeState {
                instance_id: target.instance.clone(),
                user_name: p.user_name,
                database_name: p.database_name,
                permission: Some(p.permission),
                region: target.region,
            }),
            None => Err(CloudError::NotFound(format!("privilege {}", id))),
        }
    }

    /// Privilege updates are not followed by a wait: the next mutation on the
    /// instance settles it through the conflict retry.
    async fn update(
        &self,
        ctx: &OpContext,
        meta: &Meta,
        id: &str,
        _prior: &PrivilegeState,
        spec: &PrivilegeSpec,
        changes: &ChangeSet,
    ) -> Result<()> {
        if !changes.has("permission") {
            return Ok(());
        }
        let permission = required_permission(spec)?;
        self.set(ctx, meta, &Target::parse(id)?, permission).await
    }

    async fn delete(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        self.set(ctx, meta, &Target::parse(id)?, Permission::None).await
    }

    async fn wait_absent(&self, ctx: &OpContext, meta: &Meta, id: &str) -> Result<()> {
        self.wait_ready(ctx, meta, id).await
    }

    fn import_id(&self, _meta: &Meta, raw: &str) -> Result<String> {
        Ok(Target::parse(raw)?.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCloud, meta};
    use scwflow_cloud::{Lifecycle, ResourceData, ResourceHandler, id};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    fn config(instance: &str, database: &str, permission: &str) -> Value {
        json!({
            "instance_id": instance,
            "user_name": "app",
            "database_name": database,
            "permission": permission,
        })
    }

    async fn grant(
        lc: &Lifecycle<DocumentDbPrivilege>,
        instance: &str,
        database: &str,
    ) -> ResourceData {
        let resp = lc
            .create(&CancellationToken::new(), &meta(), config(instance, database, "readwrite"))
            .await;
        assert!(!resp.has_errors(), "{:?}", resp.diagnostics);
        resp.state.unwrap()
    }

    #[tokio::test]
    async fn test_back_to_back_changes_wait_for_the_instance() {
        let cloud = Arc::new(FakeCloud::new());
        let instance = cloud.seed_documentdb_instance("fr-par");
        let lc = Lifecycle::new(DocumentDbPrivilege::new(cloud.clone()));
        let cancel = CancellationToken::new();

        let orders = grant(&lc, &instance, "orders").await;
        let billing = grant(&lc, &instance, "billing").await;
        assert_eq!(orders.id, format!("{}/app/orders", instance));
        assert_eq!(orders.attributes["instance_id"], json!(id::expand(&instance)));
        let plan = lc
            .plan(&meta(), config(&instance, "orders", "readwrite"), Some(&orders))
            .await;
        assert!(plan.requires_replace.is_empty());

        // each change leaves the instance busy for two polls
        cloud.set_busy_polls(2);
        let first = lc
            .update(&cancel, &meta(), config(&instance, "orders", "readonly"), &orders)
            .await;
        assert!(!first.has_errors(), "{:?}", first.diagnostics);
        let second = lc
            .update(&cancel, &meta(), config(&instance, "billing", "all"), &billing)
            .await;
        assert!(!second.has_errors(), "{:?}", second.diagnostics);

        assert_eq!(cloud.conflicts(), 1);
        assert_eq!(first.state.unwrap().attributes["permission"], "readonly");
        assert_eq!(second.state.unwrap().attributes["permission"], "all");
    }

    #[tokio::test]
    async fn test_delete_revokes() {
        let cloud = Arc::new(FakeCloud::new());
        let instance = cloud.seed_documentdb_instance("fr-par");
        let lc = Lifecycle::new(DocumentDbPrivilege::new(cloud.clone()));
        let cancel = CancellationToken::new();
        let state = grant(&lc, &instance, "orders").await;

        let deleted = lc.delete(&cancel, &meta(), &state).await;
        assert!(!deleted.has_errors(), "{:?}", deleted.diagnostics);
        assert!(
            cloud
                .calls()
                .iter()
                .any(|c| c.starts_with("set_documentdb_privilege") && c.ends_with("none"))
        );
        assert!(lc.read(&cancel, &meta(), &state).await.state.is_none());
    }

    #[tokio::test]
    async fn test_permission_none_is_rejected() {
        let cloud = Arc::new(FakeCloud::new());
        let instance = cloud.seed_documentdb_instance("fr-par");
        let lc = Lifecycle::new(DocumentDbPrivilege::new(cloud.clone()));
        cloud.clear_calls();

        let resp = lc
            .create(&CancellationToken::new(), &meta(), config(&instance, "orders", "none"))
            .await;
        assert!(resp.has_errors());
        assert!(resp.state.is_none());
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_target_needs_user_and_database() {
        assert!(Target::parse("fr-par/inst/app").is_err());
        assert!(Target::parse("fr-par/inst/app/").is_err());
        let target = Target::parse("fr-par/inst/app/orders").unwrap();
        assert_eq!(target.user_name, "app");
        assert_eq!(target.database_name, "orders");
        assert_eq!(target.id(), "fr-par/inst/app/orders");
    }
}
