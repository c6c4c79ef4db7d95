//! Error types for packline-core.
//!
//! Errors are coarse-grained kinds, not a deep hierarchy. Verifiers never
//! return these for schema problems (they return violation lists); the core
//! errors cover programming-contract failures and non-encodable input.

use thiserror::Error;

/// Result alias used throughout the core.
pub type PacklineResult<T> = Result<T, PacklineError>;

/// Core error kinds.
#[derive(Debug, Error)]
pub enum PacklineError {
    /// Caller passed an argument that violates a documented contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal invariant did not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Serde serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Input cannot be canonically encoded (non-finite number).
    #[error("canon invalid: {0}")]
    CanonInvalid(String),
}

impl PacklineError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn canon_invalid(msg: impl Into<String>) -> Self {
        Self::CanonInvalid(msg.into())
    }
}
