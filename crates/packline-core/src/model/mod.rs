//! packline data models.
//!
//! Strongly-typed representations of the artifact formats. The module is
//! versioned: each wire format lives under a `vN` module so upgrades can be
//! introduced without breaking existing consumers.
//!
//! Design notes:
//! - Models are mostly "dumb" data. Verification, limits, and policy live in
//!   `packline-verify` and the engines.
//! - Canonical bytes for hashing are produced by
//!   `crate::determinism::canonical_json`, never by default serde formatting
//!   (ordering and whitespace are not guaranteed there).

pub mod v1;

pub use v1::{
    ApplyOutcome, ApplyResult, ApplySummary, BranchInfo, Bundle, BundleStats, ChangedFile,
    CommitInfo, ContextNode, DensitySignal, EntropySignal, GitApplyResult, GitErrorKind, GitState,
    HashRef, LedgerEntry, ModelInteraction, ModelIoLog, ModelIoMode, NormalizedIntent, OpKind,
    OpStatus, OperationResult, Output, PatchOperation, PatchSet, PatchSource, Policy, PolicyName,
    Question,
    ResultKind, RunMode, RunRecord, Score, Violation,
};
