//! packline-verify
//!
//! One pure verifier per artifact spec. Verifiers:
//! - accept unknown-shaped input (they are the schema boundary)
//! - never panic; parse and type errors become `SCHEMA` violations
//! - return violations sorted by `(rule_id, path)`
//!
//! The composite pack verifier checks a whole pack directory's contents:
//! manifest file set, canonical round-trips, deep per-artifact validation,
//! and cross-file reference integrity.

pub mod apply;
pub mod bundle;
pub mod git_apply;
pub mod ledger;
pub mod model_io;
pub mod pack;
pub mod patch;
pub mod paths;
pub mod violation;
pub mod workspace;

pub use crate::pack::{verify_pack, PackContents, PackVerifyOptions, PackVerifyResult};
pub use crate::violation::SpecReport;

/// Rule id used for parse/type errors at the schema boundary.
pub const RULE_SCHEMA: &str = "SCHEMA";
