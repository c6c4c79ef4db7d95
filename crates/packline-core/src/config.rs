//! Limit configuration for packline-core consumers.
//!
//! The core never reads environment variables. All limits are provided
//! explicitly by the caller so runs stay reproducible.

use crate::errors::{PacklineError, PacklineResult};

/// Ceilings applied by verifiers and engines.
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Maximum total pack size in bytes.
    pub max_pack_bytes: u64,
    /// Maximum recorded model interactions.
    pub max_model_interactions: usize,
    /// Maximum bytes for a single recorded interaction.
    pub max_interaction_bytes: u64,
    /// Maximum workspace file count.
    pub max_workspace_files: usize,
    /// Maximum per-file workspace size in bytes.
    pub max_workspace_file_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pack_bytes: 50 * 1024 * 1024,
            max_model_interactions: 10_000,
            max_interaction_bytes: 1024 * 1024,
            max_workspace_files: 50_000,
            max_workspace_file_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Validate a limits object.
pub fn validate_limits(cfg: &LimitsConfig) -> PacklineResult<()> {
    if cfg.max_pack_bytes == 0 {
        return Err(PacklineError::invalid_argument(
            "max_pack_bytes must be greater than zero",
        ));
    }
    if cfg.max_model_interactions == 0 {
        return Err(PacklineError::invalid_argument(
            "max_model_interactions must be greater than zero",
        ));
    }
    if cfg.max_interaction_bytes > cfg.max_pack_bytes {
        return Err(PacklineError::invalid_argument(
            "max_interaction_bytes must not exceed max_pack_bytes",
        ));
    }
    Ok(())
}
