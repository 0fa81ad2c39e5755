//! Remediation policy for missing files

use serde::{Deserialize, Serialize};

/// What to do with a record whose referenced file is missing from storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemediationPolicy {
    /// Report the missing path, leave the record alone
    #[default]
    ReportOnly,
    /// Clear the attribute on the owning record
    BlankIfMissing,
    /// Delete the owning record
    DeleteRecordIfMissing,
}

impl RemediationPolicy {
    /// Policy actually applied for an attribute.
    ///
    /// Blanking an attribute that may not be empty silently degrades to
    /// reporting.
    #[must_use]
    pub fn effective(self, allows_empty: bool) -> Self {
        match self {
            Self::BlankIfMissing if !allows_empty => Self::ReportOnly,
            other => other,
        }
    }
}
