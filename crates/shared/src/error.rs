//! Application-wide error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a failure, independent of the concrete error type.
///
/// - `Precondition` and `Integrity` are expected business-rule rejections that
///   callers render directly.
/// - `Concurrency` is transient; the caller should wait and retry.
/// - `Infrastructure` covers faults such as store unavailability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A business gate is not satisfied.
    Precondition,
    /// The input is malformed and must not be written.
    Integrity,
    /// Another attempt holds the posting token.
    Concurrency,
    /// An unexpected fault in a collaborator.
    Infrastructure,
}

impl ErrorKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Precondition => "precondition",
            Self::Integrity => "integrity",
            Self::Concurrency => "concurrency",
            Self::Infrastructure => "infrastructure",
        }
    }

    /// Returns true for expected rejections that callers render directly.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Precondition | Self::Integrity)
    }

    /// Returns true if the failure is a fault rather than a typed rejection.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Infrastructure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
