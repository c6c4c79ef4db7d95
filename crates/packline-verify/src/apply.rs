//! APPLY_SPEC verifier (AS1..AS12).
//!
//! AS11 (idempotence of re-applies) is informational and never emitted as a
//! violation; it is documented behavior of the patch engine.

use serde_json::Value;

use crate::paths::root_has_traversal;
use crate::violation::{Checker, SpecReport};
use crate::RULE_SCHEMA;
use packline_core::determinism::canonical_json::is_content_hash;
use packline_core::model::v1::{ApplyResult, OpKind, OpStatus};

pub const SPEC_NAME: &str = "APPLY_SPEC";
pub const SCHEMA_VERSION: &str = "v1";

/// Verify a raw value against APPLY_SPEC.
pub fn verify_apply(value: &Value) -> SpecReport {
    let mut c = Checker::new();

    let result: ApplyResult = match serde_json::from_value(value.clone()) {
        Ok(r) => r,
        Err(e) => {
            c.push(RULE_SCHEMA, format!("apply result does not parse: {e}"));
            return c.finish(SPEC_NAME);
        }
    };

    if result.apply_schema_version != SCHEMA_VERSION {
        c.push(
            "AS1",
            format!(
                "apply_schema_version must be {SCHEMA_VERSION}, got {}",
                result.apply_schema_version
            ),
        );
    }

    // AS2 and AS4 enum values are enforced by the typed parse above.

    let paths: Vec<&str> = result
        .operation_results
        .iter()
        .map(|r| r.path.as_str())
        .collect();
    if !paths.windows(2).all(|w| w[0] < w[1]) {
        c.push("AS3", "operation_results are not strictly sorted by path");
    }

    if root_has_traversal(&result.target_root) {
        c.push_at("AS5", &result.target_root, "target_root contains traversal");
    }

    let mut succeeded = 0u64;
    let mut skipped = 0u64;
    let mut failed = 0u64;
    let mut bytes = 0u64;
    for r in &result.operation_results {
        for (field, hash) in [("before_hash", &r.before_hash), ("after_hash", &r.after_hash)] {
            if let Some(h) = hash {
                if !is_content_hash(h) {
                    c.push_at("AS6", &r.path, format!("{field} is malformed: {h}"));
                }
            }
        }
        if r.status == OpStatus::Success {
            match r.op {
                OpKind::Create => {
                    if r.before_hash.is_some() {
                        c.push_at("AS7", &r.path, "create must have null before_hash");
                    }
                    if r.after_hash.is_none() {
                        c.push_at("AS7", &r.path, "successful create must have after_hash");
                    }
                }
                OpKind::Modify => {
                    if r.before_hash.is_none() || r.after_hash.is_none() {
                        c.push_at("AS7", &r.path, "successful modify must have both hashes");
                    }
                }
                OpKind::Delete => {
                    if r.before_hash.is_none() {
                        c.push_at("AS7", &r.path, "successful delete must have before_hash");
                    }
                    if r.after_hash.is_some() {
                        c.push_at("AS7", &r.path, "delete must have null after_hash");
                    }
                    if r.bytes_written != 0 {
                        c.push_at("AS7", &r.path, "delete must not report bytes_written");
                    }
                }
            }
        }
        match r.status {
            OpStatus::Success => succeeded += 1,
            OpStatus::Skipped => skipped += 1,
            OpStatus::Error => failed += 1,
        }
        bytes += r.bytes_written;
    }

    let s = &result.summary;
    if s.total_operations as usize != result.operation_results.len()
        || s.succeeded != succeeded
        || s.skipped != skipped
        || s.failed != failed
    {
        c.push(
            "AS8",
            format!(
                "summary counts ({}/{}/{}/{}) do not match operation_results ({}/{succeeded}/{skipped}/{failed})",
                s.total_operations,
                s.succeeded,
                s.skipped,
                s.failed,
                result.operation_results.len()
            ),
        );
    }

    let sorted = result
        .violations
        .windows(2)
        .all(|w| w[0].sort_key() <= w[1].sort_key());
    if !sorted {
        c.push("AS9", "violations are not sorted by (rule_id, path)");
    }

    if !is_content_hash(&result.patch_source.proposal_hash) {
        c.push(
            "AS10",
            format!(
                "patch_source.proposal_hash is malformed: {}",
                result.patch_source.proposal_hash
            ),
        );
    }

    if s.total_bytes_written != bytes {
        c.push(
            "AS12",
            format!(
                "summary.total_bytes_written {} does not match operation_results sum {bytes}",
                s.total_bytes_written
            ),
        );
    }

    c.finish(SPEC_NAME)
}
