//! Localized state IDs
//!
//! A state ID is `<locality>/<uuid>`. Nested resources (users inside an
//! instance, privileges inside a user) use `<locality>/<outer>/<inner...>`
//! where the inner part may itself contain slashes. IDs are opaque bytes:
//! neither the locality nor the UUID is validated here.

use crate::error::{CloudError, Result};
use crate::locality::{Locality, Region, Zone};
use std::fmt;

const SEP: char = '/';

/// `<locality>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalizedId {
    locality: String,
    id: String,
}

impl LocalizedId {
    pub fn new(locality: impl fmt::Display, id: impl Into<String>) -> Self {
        Self {
            locality: locality.to_string(),
            id: id.into(),
        }
    }

    /// Strict parse: exactly two segments and a non-empty id.
    pub fn parse(raw: &str) -> Result<Self> {
        check_trailing(raw)?;
        let mut parts = raw.split(SEP);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(locality), Some(id), None) if !id.is_empty() => Ok(Self::new(locality, id)),
            _ => Err(CloudError::malformed_id(
                raw,
                "expected <locality>/<id>",
            )),
        }
    }

    /// Accepts both the localized and the bare form. A bare id takes the
    /// fallback locality, which may be empty.
    pub fn resolve(raw: &str, fallback: Option<&str>) -> Result<Self> {
        if raw.contains(SEP) {
            return Self::parse(raw);
        }
        if raw.is_empty() {
            return Err(CloudError::malformed_id(raw, "empty id"));
        }
        Ok(Self::new(fallback.unwrap_or_default(), raw))
    }

    pub fn locality(&self) -> &str {
        &self.locality
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn into_id(self) -> String {
        self.id
    }

    pub fn scope(&self) -> Locality {
        Locality::parse(&self.locality)
    }

    /// Same UUID and compatible localities.
    pub fn same_resource(&self, other: &LocalizedId) -> bool {
        self.id == other.id && crate::locality::compatible(&self.locality, &other.locality)
    }
}

impl fmt::Display for LocalizedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.locality, SEP, self.id)
    }
}

/// Joins a locality and an id. An empty locality is allowed.
pub fn format(locality: impl fmt::Display, id: &str) -> String {
    format!("{}{}{}", locality, SEP, id)
}

/// `<locality>/<outer>/<inner...>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedId {
    pub locality: String,
    pub outer: String,
    pub inner: String,
}

impl NestedId {
    pub fn new(locality: impl fmt::Display, outer: impl Into<String>, inner: impl Into<String>) -> Self {
        Self {
            locality: locality.to_string(),
            outer: outer.into(),
            inner: inner.into(),
        }
    }

    /// Requires at least three segments; the inner part keeps its slashes.
    pub fn parse(raw: &str) -> Result<Self> {
        check_trailing(raw)?;
        let mut parts = raw.splitn(3, SEP);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(locality), Some(outer), Some(inner)) if !outer.is_empty() && !inner.is_empty() => {
                Ok(Self::new(locality, outer, inner))
            }
            _ => Err(CloudError::malformed_id(
                raw,
                "expected <locality>/<outer-id>/<inner-id>",
            )),
        }
    }

    /// Like [`NestedId::parse`] but also accepts `<locality>/<inner>`, in
    /// which case the outer id is empty.
    pub fn parse_owner(raw: &str) -> Result<Self> {
        check_trailing(raw)?;
        let segments = raw.split(SEP).count();
        if segments == 2 {
            let plain = LocalizedId::parse(raw)?;
            return Ok(Self::new(plain.locality, "", plain.id));
        }
        Self::parse(raw)
    }

    /// Splits the inner part on `/`.
    pub fn inner_segments(&self) -> Vec<&str> {
        self.inner.split(SEP).collect()
    }

    /// The owner as a plain localized ID.
    pub fn owner(&self) -> LocalizedId {
        LocalizedId::new(&self.locality, self.outer.clone())
    }
}

impl fmt::Display for NestedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}{}", self.locality, SEP, self.outer, SEP, self.inner)
    }
}

fn check_trailing(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(CloudError::malformed_id(raw, "empty id"));
    }
    if raw.ends_with(SEP) {
        return Err(CloudError::malformed_id(raw, "trailing slash"));
    }
    Ok(())
}

/// The id segment of a localized ID, or the input itself when it is bare.
pub fn expand(raw: &str) -> &str {
    match raw.split_once(SEP) {
        Some((_, rest)) if !rest.is_empty() && !rest.contains(SEP) => rest,
        _ => raw,
    }
}

/// Diff suppressor: the localized and bare forms of one UUID are equal.
pub fn diff_suppress(old: &str, new: &str) -> bool {
    expand(old) == expand(new)
}

/// Localized ID whose locality is a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZonedId {
    pub zone: Zone,
    pub id: String,
}

impl ZonedId {
    pub fn new(zone: Zone, id: impl Into<String>) -> Self {
        Self { zone, id: id.into() }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let plain = LocalizedId::parse(raw)?;
        let zone = Zone::parse(plain.locality())
            .map_err(|_| CloudError::malformed_id(raw, "locality is not a zone"))?;
        Ok(Self::new(zone, plain.into_id()))
    }

    /// Accepts the bare form, filling the zone from `fallback`.
    pub fn resolve(raw: &str, fallback: &Zone) -> Result<Self> {
        let plain = LocalizedId::resolve(raw, Some(fallback.as_str()))?;
        let zone = Zone::parse(plain.locality())
            .map_err(|_| CloudError::malformed_id(raw, "locality is not a zone"))?;
        Ok(Self::new(zone, plain.into_id()))
    }
}

impl fmt::Display for ZonedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.zone, SEP, self.id)
    }
}

/// Localized ID whose locality is a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionalId {
    pub region: Region,
    pub id: String,
}

impl RegionalId {
    pub fn new(region: Region, id: impl Into<String>) -> Self {
        Self { region, id: id.into() }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let plain = LocalizedId::parse(raw)?;
        let region = Region::parse(plain.locality())
            .map_err(|_| CloudError::malformed_id(raw, "locality is not a region"))?;
        Ok(Self::new(region, plain.into_id()))
    }

    pub fn resolve(raw: &str, fallback: &Region) -> Result<Self> {
        let plain = LocalizedId::resolve(raw, Some(fallback.as_str()))?;
        let region = Region::parse(plain.locality())
            .map_err(|_| CloudError::malformed_id(raw, "locality is not a region"))?;
        Ok(Self::new(region, plain.into_id()))
    }
}

impl fmt::Display for RegionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.region, SEP, self.id)
    }
}
