//! packline-core
//!
//! Core primitives for packline:
//! - Canonical JSON encoding for deterministic hashing
//! - Content hashes (`sha256:` + 64 lowercase hex)
//! - Intent normalization (NFC, whitespace collapse, constraint dedup/sort)
//! - Entropy / density scoring of context nodes
//! - The intent-to-bundle assembler and the kernel transform facade
//!
//! This crate performs no I/O. Filesystem and git effects live in
//! `packline-engine`; schema verification lives in `packline-verify`.

pub mod assemble;
pub mod config;
pub mod determinism;
pub mod errors;
pub mod kernel;
pub mod metrics;
pub mod model;
pub mod patch_plan;
pub mod version;

pub use crate::errors::{PacklineError, PacklineResult};

/// Current artifact schema version.
pub const SCHEMA_VERSION_V1: &str = "v1";

/// Entity id prefixes.
/// These must remain stable across versions.
pub mod id_prefix {
    pub const QUESTION: &str = "q_";
    pub const NODE: &str = "node_";
    pub const OUTPUT: &str = "out_";
    pub const BUNDLE: &str = "bundle_";
    pub const RUN: &str = "run_";
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::determinism::canonical_json::{
        canonical_json_bytes, canonical_json_line, content_hash,
    };
    pub use crate::determinism::normalize::{
        normalize_constraints, normalize_context, normalize_intent, normalize_string,
    };
    pub use crate::kernel::{transform, KernelResult, ResultKind};
    pub use crate::model::v1::{
        ApplyOutcome, ApplyResult, Bundle, ContextNode, LedgerEntry, NormalizedIntent, Output,
        PatchOperation, PatchSet, Question, Violation,
    };
    pub use crate::{PacklineError, PacklineResult};
}
