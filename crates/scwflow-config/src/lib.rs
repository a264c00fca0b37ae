//! Provider configuration.
//!
//! The host runtime hands the provider a configuration block; credentials,
//! the default locality and the optional retry-interval override all come
//! from there. A `scw` style profile file can fill the gaps when the block
//! names one. Environment variables are never consulted.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";

/// Profile used when the provider block does not name one.
pub const DEFAULT_PROFILE: &str = "default";

/// Provider configuration as supplied by the host.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
    pub zone: Option<String>,
    pub region: Option<String>,
    pub api_url: Option<String>,

    /// Poll interval override in seconds. Test suites set this to a few
    /// milliseconds so waits settle quickly.
    pub retry_interval: Option<f64>,

    /// Optional path to a profile file.
    pub profile_path: Option<PathBuf>,
    pub profile: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("project_id", &self.project_id)
            .field("organization_id", &self.organization_id)
            .field("zone", &self.zone)
            .field("region", &self.region)
            .field("api_url", &self.api_url)
            .field("retry_interval", &self.retry_interval)
            .field("profile_path", &self.profile_path)
            .field("profile", &self.profile)
            .finish()
    }
}

/// One entry of a profile file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub default_project_id: Option<String>,
    pub default_organization_id: Option<String>,
    pub default_zone: Option<String>,
    pub default_region: Option<String>,
    pub api_url: Option<String>,
}

/// Layout of a `config.yaml` profile file: a top level profile plus named ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ProfileFile {
    #[serde(flatten)]
    root: Profile,
    active_profile: Option<String>,
    profiles: HashMap<String, Profile>,
}

impl ProviderConfig {
    /// Builds a configuration from the host's provider block.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: ProviderConfig = serde_json::from_value(value)?;
        Ok(config)
    }

    /// Fills unset fields from the referenced profile file, if any.
    ///
    /// Values set in the provider block always win.
    pub fn resolve(mut self) -> Result<Self> {
        let Some(path) = self.profile_path.clone() else {
            return Ok(self);
        };
        let name = self.profile.clone();
        let profile = load_profile(&path, name.as_deref())?;
        self.merge_profile(profile);
        Ok(self)
    }

    fn merge_profile(&mut self, profile: Profile) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.access_key, profile.access_key);
        fill(&mut self.secret_key, profile.secret_key);
        fill(&mut self.project_id, profile.default_project_id);
        fill(&mut self.organization_id, profile.default_organization_id);
        fill(&mut self.zone, profile.default_zone);
        fill(&mut self.region, profile.default_region);
        fill(&mut self.api_url, profile.api_url);
    }

    /// Checks that the configuration can authenticate and that numeric
    /// fields are sane.
    pub fn validate(&self) -> Result<()> {
        match (&self.access_key, &self.secret_key) {
            (Some(a), Some(s)) if !a.is_empty() && !s.is_empty() => {}
            _ => return Err(ConfigError::MissingCredentials),
        }
        if let Some(interval) = self.retry_interval {
            if !interval.is_finite() || interval < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "retry_interval",
                    message: format!("must be a positive number of seconds, got {}", interval),
                });
            }
        }
        Ok(())
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// The retry-interval override, if one was configured.
    pub fn retry_interval(&self) -> Option<Duration> {
        self.retry_interval
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Default location of the `scw` profile file.
pub fn default_profile_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or(ConfigError::ConfigDirNotFound)?;
    Ok(dir.join("scw").join("config.yaml"))
}

/// Loads one profile from a profile file.
///
/// Without an explicit name the file's `active_profile` is used, falling back
/// to the top-level keys.
pub fn load_profile(path: &Path, name: Option<&str>) -> Result<Profile> {
    let content = std::fs::read_to_string(path)?;
    let file: ProfileFile =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ProfileFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let wanted = name.map(str::to_string).or(file.active_profile.clone());
    match wanted.as_deref() {
        None | Some(DEFAULT_PROFILE) => {
            tracing::debug!("Using top-level profile from {}", path.display());
            Ok(file.root)
        }
        Some(n) => {
            let mut profile = file
                .profiles
                .get(n)
                .cloned()
                .ok_or_else(|| ConfigError::ProfileNotFound {
                    path: path.to_path_buf(),
                    profile: n.to_string(),
                })?;
            // Named profiles inherit unset keys from the top level.
            let root = file.root;
            profile.access_key = profile.access_key.or(root.access_key);
            profile.secret_key = profile.secret_key.or(root.secret_key);
            profile.default_project_id = profile.default_project_id.or(root.default_project_id);
            profile.default_organization_id = profile
                .default_organization_id
                .or(root.default_organization_id);
            profile.default_zone = profile.default_zone.or(root.default_zone);
            profile.default_region = profile.default_region.or(root.default_region);
            profile.api_url = profile.api_url.or(root.api_url);
            tracing::debug!("Using profile '{}' from {}", n, path.display());
            Ok(profile)
        }
    }
}
