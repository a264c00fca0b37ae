//! Zones, regions and the compatibility rule between them

use crate::diag::Diagnostic;
use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zones the provider knows about at build time.
pub const KNOWN_ZONES: &[&str] = &[
    "fr-par-1", "fr-par-2", "fr-par-3", "nl-ams-1", "nl-ams-2", "nl-ams-3", "pl-waw-1",
    "pl-waw-2", "pl-waw-3", "it-mil-1",
];

/// Regions the provider knows about at build time.
pub const KNOWN_REGIONS: &[&str] = &["fr-par", "nl-ams", "pl-waw", "it-mil"];

/// A datacenter, e.g. `fr-par-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(String);

/// An aggregate of zones, e.g. `fr-par`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Zone {
    /// Accepts any string whose last dash-separated segment is numeric.
    pub fn parse(s: &str) -> Result<Self> {
        if looks_like_zone(s) {
            Ok(Zone(s.to_string()))
        } else {
            Err(CloudError::validation(
                "zone",
                format!("{:?} is not a zone (expected <region>-<n>)", s),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region this zone belongs to: the zone with its numeric suffix removed.
    pub fn region(&self) -> Region {
        match self.0.rsplit_once('-') {
            Some((prefix, _)) => Region(prefix.to_string()),
            None => Region(self.0.clone()),
        }
    }

    pub fn is_known(&self) -> bool {
        KNOWN_ZONES.contains(&self.0.as_str())
    }
}

impl Region {
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || looks_like_zone(s) || s.contains('/') {
            return Err(CloudError::validation(
                "region",
                format!("{:?} is not a region", s),
            ));
        }
        Ok(Region(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        KNOWN_REGIONS.contains(&self.0.as_str())
    }

    /// Whether `zone` lies within this region.
    pub fn contains(&self, zone: &Zone) -> bool {
        zone.region() == *self
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The geographic scope of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locality {
    Zone(Zone),
    Region(Region),
    Global,
}

impl Locality {
    /// Classifies a locality string. The empty string is the global scope.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            Locality::Global
        } else if looks_like_zone(s) {
            Locality::Zone(Zone(s.to_string()))
        } else {
            Locality::Region(Region(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locality::Zone(z) => z.as_str(),
            Locality::Region(r) => r.as_str(),
            Locality::Global => "",
        }
    }

    /// The region of this locality, when it has one.
    pub fn region(&self) -> Option<Region> {
        match self {
            Locality::Zone(z) => Some(z.region()),
            Locality::Region(r) => Some(r.clone()),
            Locality::Global => None,
        }
    }

    pub fn is_compatible_with(&self, other: &Locality) -> bool {
        compatible(self.as_str(), other.as_str())
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Zone> for Locality {
    fn from(z: Zone) -> Self {
        Locality::Zone(z)
    }
}

impl From<Region> for Locality {
    fn from(r: Region) -> Self {
        Locality::Region(r)
    }
}

fn looks_like_zone(s: &str) -> bool {
    match s.rsplit_once('-') {
        Some((prefix, suffix)) => {
            !prefix.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Two localities are compatible when they are equal or when one is a prefix
/// of the other ending on a `-` boundary (a zone inside a region).
pub fn compatible(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return false;
    }
    long.strip_prefix(short)
        .is_some_and(|rest| rest.starts_with('-'))
}

/// Warns, never fails, on zones missing from [`KNOWN_ZONES`] so new
/// datacenters work without a provider release.
pub fn check_zone(attribute: &str, value: &str) -> Vec<Diagnostic> {
    match Zone::parse(value) {
        Err(e) => vec![Diagnostic::from_error(&e).with_attribute(attribute)],
        Ok(zone) if !zone.is_known() => {
            tracing::warn!("Unknown zone {}", value);
            vec![
                Diagnostic::warning(
                    format!("unknown zone {:?}", value),
                    format!("known zones: {}", KNOWN_ZONES.join(", ")),
                )
                .with_attribute(attribute),
            ]
        }
        Ok(_) => Vec::new(),
    }
}

/// Region counterpart of [`check_zone`].
pub fn check_region(attribute: &str, value: &str) -> Vec<Diagnostic> {
    match Region::parse(value) {
        Err(e) => vec![Diagnostic::from_error(&e).with_attribute(attribute)],
        Ok(region) if !region.is_known() => {
            tracing::warn!("Unknown region {}", value);
            vec![
                Diagnostic::warning(
                    format!("unknown region {:?}", value),
                    format!("known regions: {}", KNOWN_REGIONS.join(", ")),
                )
                .with_attribute(attribute),
            ]
        }
        Ok(_) => Vec::new(),
    }
}
