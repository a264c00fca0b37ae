//! Diagnostics returned across the RPC boundary

use crate::error::CloudError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,

    /// Attribute path (`endpoints.0.private_network_id`) when the problem is
    /// attribute-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Error diagnostic embedding the error's message unmodified.
    pub fn from_error(err: &CloudError) -> Self {
        let mut diag = Diagnostic::error(err.kind().to_string(), err.to_string());
        diag.attribute = err.attribute().map(str::to_string);
        diag
    }

    /// Same as [`Diagnostic::from_error`] but downgraded to a warning.
    pub fn warning_from(err: &CloudError) -> Self {
        let mut diag = Self::from_error(err);
        diag.severity = Severity::Warning;
        diag
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<CloudError> for Diagnostic {
    fn from(err: CloudError) -> Self {
        Diagnostic::from_error(&err)
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        self.0.extend(diags);
    }

    pub fn error(&mut self, err: &CloudError) {
        self.push(Diagnostic::from_error(err));
    }

    pub fn warn(&mut self, err: &CloudError) {
        self.push(Diagnostic::warning_from(err));
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(v: Vec<Diagnostic>) -> Self {
        Self(v)
    }
}
