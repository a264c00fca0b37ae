//! Schema descriptors
//!
//! Each resource describes its attributes once; the lifecycle driver uses the
//! descriptor for local validation, force-new decisions and for stripping
//! write-only values before state is handed back to the host.

use crate::diag::{Diagnostic, Diagnostics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Integer,
    Boolean,
    /// Go-style duration string such as `"30s"` or an integer of seconds.
    Duration,
    Map,
    List { element: Box<AttributeType> },
    Set { element: Box<AttributeType> },
    Object { attributes: BTreeMap<String, Attribute> },
}

impl AttributeType {
    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (AttributeType::String, Value::String(_)) => true,
            (AttributeType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (AttributeType::Boolean, Value::Bool(_)) => true,
            (AttributeType::Duration, Value::String(_) | Value::Number(_)) => true,
            (AttributeType::Map, Value::Object(m)) => m.values().all(Value::is_string),
            (AttributeType::List { element } | AttributeType::Set { element }, Value::Array(a)) => {
                a.iter().all(|v| element.accepts(v))
            }
            (AttributeType::Object { attributes }, Value::Object(m)) => m
                .iter()
                .all(|(k, v)| attributes.get(k).is_some_and(|a| a.ty.accepts(v))),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(flatten)]
    pub ty: AttributeType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub force_new: bool,
    #[serde(default)]
    pub write_only: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Attribute {
    fn new(ty: AttributeType) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            write_only: false,
            description: String::new(),
        }
    }

    pub fn required(ty: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(ty)
        }
    }

    pub fn optional(ty: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(ty)
        }
    }

    /// Optional on input, filled by the server when unset.
    pub fn optional_computed(ty: AttributeType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(ty)
        }
    }

    pub fn computed(ty: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::new(ty)
        }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self.sensitive = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_input(&self) -> bool {
        self.required || self.optional
    }
}

/// Per-phase budgets. The waiter never outlives the phase that started it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub fn uniform(d: Duration) -> Self {
        Self {
            create: d,
            read: d,
            update: d,
            delete: d,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(10 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub version: u32,
    pub attributes: BTreeMap<String, Attribute>,
    pub timeouts: Timeouts,
}

impl Schema {
    pub fn v0() -> Self {
        Self {
            version: 0,
            attributes: BTreeMap::new(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Adds the optional+computed `zone` attribute of zone-scoped resources.
    pub fn zoned(self) -> Self {
        self.with_attribute(
            "zone",
            Attribute::optional_computed(AttributeType::String)
                .force_new()
                .describe("Zone of the resource, defaults to the provider zone"),
        )
    }

    /// Adds the optional+computed `region` attribute of region-scoped resources.
    pub fn regional(self) -> Self {
        self.with_attribute(
            "region",
            Attribute::optional_computed(AttributeType::String)
                .force_new()
                .describe("Region of the resource, defaults to the provider region"),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn is_force_new(&self, name: &str) -> bool {
        self.get(name).is_some_and(|a| a.force_new)
    }

    pub fn is_write_only(&self, name: &str) -> bool {
        self.get(name).is_some_and(|a| a.write_only)
    }

    /// Checks a desired-state record: required attributes present, no
    /// unknown or computed-only attributes set, values of the declared type.
    pub fn validate(&self, config: &Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let Some(map) = config.as_object() else {
            diags.push(Diagnostic::error(
                "validation",
                "resource configuration must be an object",
            ));
            return diags;
        };

        for (name, attribute) in &self.attributes {
            let value = map.get(name).unwrap_or(&Value::Null);
            if attribute.required && value.is_null() {
                diags.push(
                    Diagnostic::error("validation", format!("{} is required", name))
                        .with_attribute(name),
                );
            }
        }

        for (name, value) in map {
            match self.attributes.get(name) {
                None => diags.push(
                    Diagnostic::error("validation", format!("unsupported attribute {}", name))
                        .with_attribute(name),
                ),
                Some(a) if !a.is_input() && !value.is_null() => diags.push(
                    Diagnostic::error("validation", format!("{} is computed and cannot be set", name))
                        .with_attribute(name),
                ),
                Some(a) if !a.ty.accepts(value) => diags.push(
                    Diagnostic::error("validation", format!("{} has the wrong type", name))
                        .with_attribute(name),
                ),
                _ => {}
            }
        }
        diags
    }

    /// Copies input attributes missing from `state` (not merely null) out of
    /// `from`. Covers values the cloud never echoes back, such as passwords.
    pub fn carry_unobserved(&self, state: &mut Value, from: &Value) {
        let (Some(state), Some(from)) = (state.as_object_mut(), from.as_object()) else {
            return;
        };
        for (name, attribute) in &self.attributes {
            if !attribute.is_input() || attribute.write_only || state.contains_key(name) {
                continue;
            }
            if let Some(value) = from.get(name).filter(|v| !v.is_null()) {
                state.insert(name.clone(), value.clone());
            }
        }
    }

    /// SHA-256 of every write-only value set in `config`, hex encoded. Lets
    /// a later plan notice a rotated secret without the secret reaching
    /// state.
    pub fn write_only_digests(&self, config: &Value) -> BTreeMap<String, String> {
        let Some(map) = config.as_object() else {
            return BTreeMap::new();
        };
        map.iter()
            .filter(|(name, value)| self.is_write_only(name) && !value.is_null())
            .map(|(name, value)| (name.clone(), digest(value)))
            .collect()
    }

    /// Removes write-only attributes from a state record.
    pub fn strip_write_only(&self, state: &mut Value) {
        if let Some(map) = state.as_object_mut() {
            map.retain(|name, _| !self.is_write_only(name));
        }
    }
}

/// Object keys serialize sorted, so equal values hash equally.
fn digest(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
