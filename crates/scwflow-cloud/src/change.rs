//! Attribute-level change detection between desired and observed records

use crate::diag::Diagnostics;
use crate::error::CloudError;
use crate::id;
use crate::schema::{AttributeType, Schema};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Backend mutation an attribute change is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutationGroup {
    /// Name, description, tags, environment: a single `update` call.
    Metadata,
    /// Sizes and scale bounds: `update` or one `migrate` per attribute.
    Scaling,
    /// Sets the redeploy bit.
    Deployment,
    /// Full replacement of ACL rules.
    AccessControl,
    /// Full replacement of settings.
    Settings,
    /// Delta reconciliation of child endpoints.
    Endpoints,
    /// Role or privilege calls with conflict retry.
    Privileges,
}

/// Attribute → group table, in the order groups must be applied.
pub type MutationTable = &'static [(MutationGroup, &'static [&'static str])];

/// The set of top-level attributes that differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changed: BTreeSet<String>,
}

impl ChangeSet {
    /// Compares a desired record against the prior observed record.
    ///
    /// Unset desired attributes are not changes (the server keeps or
    /// computes them). Write-only attributes are never compared. `*_id`
    /// attributes compare through the localized-ID diff suppressor and
    /// set-typed attributes ignore order.
    pub fn between(schema: &Schema, desired: &Value, prior: &Value) -> Self {
        let mut changed = BTreeSet::new();
        let Some(desired) = desired.as_object() else {
            return Self { changed };
        };

        for (name, new) in desired {
            if new.is_null() {
                continue;
            }
            let Some(attribute) = schema.get(name) else {
                continue;
            };
            if attribute.write_only || !attribute.is_input() {
                continue;
            }
            let old = prior.get(name).unwrap_or(&Value::Null);
            if !same_value(name, &attribute.ty, old, new) {
                changed.insert(name.clone());
            }
        }
        Self { changed }
    }

    /// Adds the write-only attributes whose desired value no longer matches
    /// the digest recorded when it was last applied. A missing digest counts
    /// as a change; unset desired values never do.
    pub fn with_write_only(
        mut self,
        schema: &Schema,
        desired: &Value,
        applied: &BTreeMap<String, String>,
    ) -> Self {
        for (name, digest) in schema.write_only_digests(desired) {
            if applied.get(&name) != Some(&digest) {
                self.changed.insert(name);
            }
        }
        self
    }

    pub fn from_attributes<I, S>(attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            changed: attrs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    pub fn any(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has(n))
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    /// Splits the changes by mutation group, keeping the table order and
    /// dropping empty groups. Attributes missing from the table are ignored.
    pub fn partition(&self, table: MutationTable) -> Vec<(MutationGroup, Vec<&'static str>)> {
        table
            .iter()
            .filter_map(|(group, attrs)| {
                let hit: Vec<&'static str> =
                    attrs.iter().copied().filter(|a| self.has(a)).collect();
                (!hit.is_empty()).then_some((*group, hit))
            })
            .collect()
    }
}

fn same_value(name: &str, ty: &AttributeType, old: &Value, new: &Value) -> bool {
    if old == new {
        return true;
    }
    match (ty, old, new) {
        (AttributeType::String, Value::String(a), Value::String(b)) if name.ends_with("_id") => {
            id::diff_suppress(a, b)
        }
        (AttributeType::Set { .. }, Value::Array(a), Value::Array(b)) => {
            let mut a: Vec<String> = a.iter().map(Value::to_string).collect();
            let mut b: Vec<String> = b.iter().map(Value::to_string).collect();
            a.sort();
            b.sort();
            a == b
        }
        _ => false,
    }
}

/// Plan-time decisions returned by `CustomizeDiff`.
#[derive(Debug, Clone, Default)]
pub struct PlanAdjustment {
    pub requires_replace: BTreeSet<String>,
    pub diagnostics: Diagnostics,
}

impl PlanAdjustment {
    pub fn replace(&mut self, attribute: impl Into<String>) {
        self.requires_replace.insert(attribute.into());
    }

    pub fn reject(&mut self, err: CloudError) {
        self.diagnostics.error(&err);
    }

    pub fn requires_replace(&self) -> bool {
        !self.requires_replace.is_empty()
    }
}

/// Rejects a decrease of a grow-only size attribute.
pub fn forbid_shrink(attribute: &str, prior: Option<i64>, desired: Option<i64>) -> Result<(), CloudError> {
    match (prior, desired) {
        (Some(from), Some(to)) if to < from => Err(CloudError::CannotShrink {
            attribute: attribute.to_string(),
            from,
            to,
        }),
        _ => Ok(()),
    }
}
