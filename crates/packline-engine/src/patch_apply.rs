//! Filesystem patch engine.
//!
//! Loads `patch.json` from a pack, enforces PATCH_SPEC and the safety
//! policy, then executes operations against a target root. Dry-run computes
//! every result field, hashes included, without touching the filesystem.
//!
//! Per-operation failures never abort the run: they become `error` entries
//! and the outcome degrades to PARTIAL or FAILED. Only the safety gates
//! refuse outright.

use std::fs;
use std::path::Path;

use serde_json::Value;

use packline_core::determinism::canonical_json::{content_hash, content_hash_bytes};
use packline_core::model::v1::{
    ApplyOutcome, ApplyResult, ApplySummary, OpKind, OpStatus, OperationResult, PatchOperation,
    PatchSet, PatchSource, Policy, Violation,
};
use packline_core::SCHEMA_VERSION_V1;
use packline_verify::paths::{check_relative_path, root_has_traversal};
use packline_verify::patch::verify_patch;

/// Placeholder hash used in refusal results produced before a patch loads.
pub const NULL_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// Options for [`apply_pack`].
#[derive(Debug, Clone)]
pub struct PatchApplyOptions {
    pub dry_run: bool,
    /// Skip the check that the patch hash binds to the pack's bundle.
    pub skip_patch_match: bool,
    pub policy: Policy,
}

impl Default for PatchApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            skip_patch_match: false,
            policy: Policy::default_policy(),
        }
    }
}

/// Apply a pack's patch to `target_root`.
pub fn apply_pack(pack_dir: &Path, target_root: &str, opts: &PatchApplyOptions) -> ApplyResult {
    let unknown_source = PatchSource {
        proposal_id: "unknown".to_string(),
        proposal_hash: NULL_HASH.to_string(),
    };
    let refused = |source: PatchSource, violations: Vec<Violation>, error: String| ApplyResult {
        apply_schema_version: SCHEMA_VERSION_V1.to_string(),
        outcome: ApplyOutcome::Refused,
        dry_run: opts.dry_run,
        target_root: target_root.to_string(),
        patch_source: source,
        operation_results: Vec::new(),
        summary: ApplySummary::default(),
        violations,
        error: Some(error),
    };

    // Load and verify the patch before looking at the target.
    let patch_path = pack_dir.join("patch.json");
    let patch_bytes = match fs::read(&patch_path) {
        Ok(b) => b,
        Err(_) => return refused(unknown_source, Vec::new(), "no patch.json".to_string()),
    };
    let patch_value: Value = match serde_json::from_slice(&patch_bytes) {
        Ok(v) => v,
        Err(e) => {
            return refused(unknown_source, Vec::new(), format!("patch.json does not parse: {e}"))
        }
    };
    let report = verify_patch(&patch_value);
    if !report.ok {
        return refused(
            unknown_source,
            report.violations,
            "patch.json violates PATCH_SPEC".to_string(),
        );
    }
    let patch: PatchSet = match serde_json::from_value(patch_value) {
        Ok(p) => p,
        Err(e) => {
            return refused(unknown_source, Vec::new(), format!("patch.json does not parse: {e}"))
        }
    };
    let source = PatchSource {
        proposal_id: patch.source_proposal_id.clone(),
        proposal_hash: patch.source_proposal_hash.clone(),
    };

    if !opts.skip_patch_match {
        if let Some(err) = patch_bundle_mismatch(pack_dir, &patch) {
            return refused(source, Vec::new(), err);
        }
    }

    // Target-root safety: inspect the caller's original string before any
    // normalization, then require an existing directory.
    if root_has_traversal(target_root) {
        let violation = Violation::at("AS5", target_root, "target_root contains traversal");
        return refused(source, vec![violation], "target_root contains traversal".to_string());
    }
    let root = Path::new(target_root);
    if !root.is_dir() {
        return refused(
            source,
            Vec::new(),
            format!("target_root does not exist or is not a directory: {target_root}"),
        );
    }

    if let Some(err) = policy_refusal(&patch, &opts.policy) {
        return refused(source, Vec::new(), err);
    }

    let mut operation_results = execute_operations(&patch.operations, root, opts.dry_run);
    operation_results.sort_by(|a, b| a.path.cmp(&b.path));

    let summary = summarize(&operation_results);
    let outcome = compose_outcome(&summary);

    ApplyResult {
        apply_schema_version: SCHEMA_VERSION_V1.to_string(),
        outcome,
        dry_run: opts.dry_run,
        target_root: target_root.to_string(),
        patch_source: source,
        operation_results,
        summary,
        violations: Vec::new(),
        error: None,
    }
}

fn patch_bundle_mismatch(pack_dir: &Path, patch: &PatchSet) -> Option<String> {
    let bundle_bytes = fs::read(pack_dir.join("bundle.json")).ok()?;
    let bundle_value: Value = serde_json::from_slice(&bundle_bytes).ok()?;
    let bundle_hash = content_hash(&bundle_value).ok()?;
    if bundle_hash != patch.source_proposal_hash {
        return Some(format!(
            "patch does not match bundle: expected {}, bundle is {bundle_hash}",
            patch.source_proposal_hash
        ));
    }
    None
}

fn policy_refusal(patch: &PatchSet, policy: &Policy) -> Option<String> {
    if patch.operations.len() as u64 > policy.max_operations {
        return Some(format!(
            "patch exceeds policy operation ceiling ({} > {})",
            patch.operations.len(),
            policy.max_operations
        ));
    }
    if patch.total_bytes > policy.max_total_bytes {
        return Some(format!(
            "patch exceeds policy byte ceiling ({} > {})",
            patch.total_bytes, policy.max_total_bytes
        ));
    }
    if !policy.allow_delete {
        if let Some(op) = patch
            .operations
            .iter()
            .find(|o| o.kind() == OpKind::Delete)
        {
            return Some(format!("policy forbids delete operations ({})", op.path()));
        }
    }
    if !policy.allow_paths.is_empty() {
        for op in &patch.operations {
            if !policy.allow_paths.iter().any(|p| op.path().starts_with(p.as_str())) {
                return Some(format!("path is outside the policy allowlist: {}", op.path()));
            }
        }
    }
    None
}

/// Execute operations in canonical order against `root`.
///
/// Shared by the filesystem and git engines. Dry-run computes identical
/// hashes and byte counts from the would-be-written content.
pub(crate) fn execute_operations(
    operations: &[PatchOperation],
    root: &Path,
    dry_run: bool,
) -> Vec<OperationResult> {
    operations
        .iter()
        .map(|op| execute_one(op, root, dry_run))
        .collect()
}

fn execute_one(op: &PatchOperation, root: &Path, dry_run: bool) -> OperationResult {
    let mut result = OperationResult {
        op: op.kind(),
        path: op.path().to_string(),
        status: OpStatus::Error,
        before_hash: None,
        after_hash: None,
        bytes_written: 0,
        error: None,
    };

    if let Err(reason) = check_relative_path(op.path()) {
        result.error = Some(reason.to_string());
        return result;
    }
    let full = root.join(op.path());

    match op {
        PatchOperation::Create {
            content,
            size_bytes,
            ..
        } => {
            if full.exists() {
                result.error = Some("path already exists".to_string());
                return result;
            }
            if !dry_run {
                if let Some(parent) = full.parent() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        result.error = Some(format!("create parent directories: {e}"));
                        return result;
                    }
                }
                if let Err(e) = fs::write(&full, content.as_bytes()) {
                    result.error = Some(format!("write: {e}"));
                    return result;
                }
            }
            result.status = OpStatus::Success;
            result.after_hash = Some(content_hash_bytes(content.as_bytes()));
            result.bytes_written = *size_bytes;
        }
        PatchOperation::Modify {
            content,
            size_bytes,
            ..
        } => {
            if !full.is_file() {
                result.error = Some("path does not exist or is not a regular file".to_string());
                return result;
            }
            let before = match fs::read(&full) {
                Ok(b) => b,
                Err(e) => {
                    result.error = Some(format!("read: {e}"));
                    return result;
                }
            };
            if !dry_run {
                if let Err(e) = fs::write(&full, content.as_bytes()) {
                    result.error = Some(format!("write: {e}"));
                    return result;
                }
            }
            result.status = OpStatus::Success;
            result.before_hash = Some(content_hash_bytes(&before));
            result.after_hash = Some(content_hash_bytes(content.as_bytes()));
            result.bytes_written = *size_bytes;
        }
        PatchOperation::Delete { .. } => {
            if !full.is_file() {
                result.error = Some("path does not exist or is not a regular file".to_string());
                return result;
            }
            let before = match fs::read(&full) {
                Ok(b) => b,
                Err(e) => {
                    result.error = Some(format!("read: {e}"));
                    return result;
                }
            };
            if !dry_run {
                if let Err(e) = fs::remove_file(&full) {
                    result.error = Some(format!("unlink: {e}"));
                    return result;
                }
            }
            result.status = OpStatus::Success;
            result.before_hash = Some(content_hash_bytes(&before));
        }
    }
    result
}

pub(crate) fn summarize(results: &[OperationResult]) -> ApplySummary {
    let mut summary = ApplySummary {
        total_operations: results.len() as u64,
        ..Default::default()
    };
    for r in results {
        match r.status {
            OpStatus::Success => summary.succeeded += 1,
            OpStatus::Skipped => summary.skipped += 1,
            OpStatus::Error => summary.failed += 1,
        }
        summary.total_bytes_written += r.bytes_written;
    }
    summary
}

pub(crate) fn compose_outcome(summary: &ApplySummary) -> ApplyOutcome {
    if summary.failed == 0 {
        ApplyOutcome::Success
    } else if summary.succeeded > 0 {
        ApplyOutcome::Partial
    } else {
        ApplyOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packline_core::determinism::canonical_json::canonical_json_line;
    use serde_json::json;

    fn write_patch(pack: &Path, operations: Value, total_bytes: u64) {
        let patch = json!({
            "patch_schema_version": "v1",
            "source_proposal_id": "bundle_0011223344556677",
            "source_proposal_hash": format!("sha256:{}", "a".repeat(64)),
            "operations": operations,
            "total_bytes": total_bytes
        });
        std::fs::write(pack.join("patch.json"), canonical_json_line(&patch).unwrap()).unwrap();
    }

    fn setup() -> (tempfile::TempDir, tempfile::TempDir) {
        (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap())
    }

    fn opts() -> PatchApplyOptions {
        PatchApplyOptions {
            skip_patch_match: true,
            ..Default::default()
        }
    }

    #[test]
    fn missing_patch_is_refused() {
        let (pack, target) = setup();
        let r = apply_pack(pack.path(), target.path().to_str().unwrap(), &opts());
        assert_eq!(r.outcome, ApplyOutcome::Refused);
        assert_eq!(r.error.as_deref(), Some("no patch.json"));
    }

    #[test]
    fn create_modify_delete_round() {
        let (pack, target) = setup();
        std::fs::write(target.path().join("existing.txt"), "old").unwrap();
        std::fs::write(target.path().join("to_remove.txt"), "bye").unwrap();
        write_patch(
            pack.path(),
            json!([
                {"op": "delete", "path": "to_remove.txt", "order": 0},
                {"op": "modify", "path": "existing.txt", "content": "new", "size_bytes": 3, "order": 1},
                {"op": "create", "path": "new.txt", "content": "n", "size_bytes": 1, "order": 2}
            ]),
            4,
        );

        let r = apply_pack(pack.path(), target.path().to_str().unwrap(), &opts());
        assert_eq!(r.outcome, ApplyOutcome::Success);
        assert_eq!(r.summary.succeeded, 3);
        assert_eq!(r.summary.total_bytes_written, 4);

        // Results sorted by path: existing.txt, new.txt, to_remove.txt.
        assert_eq!(r.operation_results[0].path, "existing.txt");
        assert!(r.operation_results[0].before_hash.is_some());
        assert!(r.operation_results[0].after_hash.is_some());
        let delete = &r.operation_results[2];
        assert_eq!(delete.path, "to_remove.txt");
        assert!(delete.before_hash.is_some());
        assert!(delete.after_hash.is_none());
        assert_eq!(delete.bytes_written, 0);

        assert_eq!(std::fs::read_to_string(target.path().join("existing.txt")).unwrap(), "new");
        assert!(!target.path().join("to_remove.txt").exists());
        assert!(target.path().join("new.txt").exists());
    }

    #[test]
    fn dry_run_matches_real_run_hashes() {
        let (pack, target) = setup();
        std::fs::write(target.path().join("existing.txt"), "old").unwrap();
        write_patch(
            pack.path(),
            json!([
                {"op": "modify", "path": "existing.txt", "content": "new", "size_bytes": 3, "order": 0},
                {"op": "create", "path": "sub/child.txt", "content": "c", "size_bytes": 1, "order": 1}
            ]),
            4,
        );

        let dry = apply_pack(
            pack.path(),
            target.path().to_str().unwrap(),
            &PatchApplyOptions {
                dry_run: true,
                ..opts()
            },
        );
        assert_eq!(dry.outcome, ApplyOutcome::Success);
        // Nothing changed on disk.
        assert_eq!(std::fs::read_to_string(target.path().join("existing.txt")).unwrap(), "old");
        assert!(!target.path().join("sub").exists());

        let real = apply_pack(pack.path(), target.path().to_str().unwrap(), &opts());
        assert_eq!(real.outcome, ApplyOutcome::Success);
        assert_eq!(dry.summary, real.summary);
        for (d, r) in dry.operation_results.iter().zip(&real.operation_results) {
            assert_eq!(d.before_hash, r.before_hash);
            assert_eq!(d.after_hash, r.after_hash);
            assert_eq!(d.bytes_written, r.bytes_written);
        }
    }

    #[test]
    fn traversal_target_is_refused_with_as5() {
        let (pack, _target) = setup();
        write_patch(pack.path(), json!([]), 0);
        let r = apply_pack(pack.path(), "/tmp/foo/../../etc", &opts());
        assert_eq!(r.outcome, ApplyOutcome::Refused);
        assert!(r.violations.iter().any(|v| v.rule_id == "AS5"));
    }

    #[test]
    fn create_over_existing_is_partial() {
        let (pack, target) = setup();
        std::fs::write(target.path().join("a.txt"), "here").unwrap();
        write_patch(
            pack.path(),
            json!([
                {"op": "create", "path": "a.txt", "content": "x", "size_bytes": 1, "order": 0},
                {"op": "create", "path": "b.txt", "content": "y", "size_bytes": 1, "order": 1}
            ]),
            2,
        );
        let r = apply_pack(pack.path(), target.path().to_str().unwrap(), &opts());
        assert_eq!(r.outcome, ApplyOutcome::Partial);
        assert_eq!(r.summary.failed, 1);
        assert_eq!(r.summary.succeeded, 1);
        let failed = &r.operation_results[0];
        assert_eq!(failed.status, OpStatus::Error);
        assert!(failed.error.as_deref().unwrap().contains("exists"));
    }

    #[test]
    fn all_errors_is_failed() {
        let (pack, target) = setup();
        write_patch(
            pack.path(),
            json!([
                {"op": "delete", "path": "ghost.txt", "order": 0}
            ]),
            0,
        );
        let r = apply_pack(pack.path(), target.path().to_str().unwrap(), &opts());
        assert_eq!(r.outcome, ApplyOutcome::Failed);
    }

    #[test]
    fn strict_policy_refuses_delete() {
        let (pack, target) = setup();
        write_patch(
            pack.path(),
            json!([
                {"op": "delete", "path": "src/old.rs", "order": 0}
            ]),
            0,
        );
        let r = apply_pack(
            pack.path(),
            target.path().to_str().unwrap(),
            &PatchApplyOptions {
                policy: Policy::strict(),
                ..opts()
            },
        );
        assert_eq!(r.outcome, ApplyOutcome::Refused);
        assert!(r.error.as_deref().unwrap().contains("delete"));
    }

    #[test]
    fn spec_violations_refuse() {
        let (pack, target) = setup();
        write_patch(
            pack.path(),
            json!([
                {"op": "create", "path": "../escape", "content": "x", "size_bytes": 1, "order": 0}
            ]),
            1,
        );
        let r = apply_pack(pack.path(), target.path().to_str().unwrap(), &opts());
        assert_eq!(r.outcome, ApplyOutcome::Refused);
        assert!(r.violations.iter().any(|v| v.rule_id == "PS6"));
    }

    #[test]
    fn apply_result_verifies_clean() {
        let (pack, target) = setup();
        write_patch(
            pack.path(),
            json!([
                {"op": "create", "path": "a.txt", "content": "x", "size_bytes": 1, "order": 0}
            ]),
            1,
        );
        let r = apply_pack(pack.path(), target.path().to_str().unwrap(), &opts());
        let report =
            packline_verify::apply::verify_apply(&serde_json::to_value(&r).unwrap());
        assert!(report.ok, "{:?}", report.violations);
    }
}
