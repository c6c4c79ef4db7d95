//! Schema version helpers.
//!
//! Every persisted artifact carries a version field that must equal the
//! expected literal. Parsing is strict.

use crate::errors::{PacklineError, PacklineResult};

/// Known artifact schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactVersion {
    V1,
}

impl ArtifactVersion {
    pub fn parse(s: &str) -> PacklineResult<Self> {
        match s {
            "v1" => Ok(Self::V1),
            _ => Err(PacklineError::invalid_argument(format!(
                "unsupported schema version: {s}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
        }
    }
}

/// Validate that a version field matches the expected literal.
pub fn require_version(actual: &str, expected: &str, field: &str) -> PacklineResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(PacklineError::invalid_argument(format!(
            "invalid {field}: expected {expected}, got {actual}"
        )))
    }
}
