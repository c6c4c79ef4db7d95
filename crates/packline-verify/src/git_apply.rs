//! GIT_APPLY_SPEC verifier (GA1..GA7).

use serde_json::Value;

use crate::violation::{Checker, SpecReport};
use crate::RULE_SCHEMA;
use packline_core::determinism::canonical_json::is_content_hash;
use packline_core::model::v1::{GitApplyResult, OpKind};

pub const SPEC_NAME: &str = "GIT_APPLY_SPEC";
pub const SCHEMA_VERSION: &str = "v1";

fn is_commit_sha(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// Verify a raw value against GIT_APPLY_SPEC.
pub fn verify_git_apply(value: &Value) -> SpecReport {
    let mut c = Checker::new();

    let result: GitApplyResult = match serde_json::from_value(value.clone()) {
        Ok(r) => r,
        Err(e) => {
            c.push(RULE_SCHEMA, format!("git apply result does not parse: {e}"));
            return c.finish(SPEC_NAME);
        }
    };

    if result.git_apply_schema_version != SCHEMA_VERSION {
        c.push(
            "GA1",
            format!(
                "git_apply_schema_version must be {SCHEMA_VERSION}, got {}",
                result.git_apply_schema_version
            ),
        );
    }

    // GA2: outcome enum is enforced by the typed parse.

    if result.branch.name.is_empty() || result.branch.name.chars().any(char::is_whitespace) {
        c.push(
            "GA3",
            format!("branch name is malformed: {:?}", result.branch.name),
        );
    }

    for (field, head) in [
        ("head_before", &result.git_state.head_before),
        ("head_after", &result.git_state.head_after),
    ] {
        if let Some(h) = head {
            if !is_commit_sha(h) {
                c.push("GA4", format!("git_state.{field} is not a commit sha: {h}"));
            }
        }
    }

    let paths: Vec<&str> = result.changed_files.iter().map(|f| f.path.as_str()).collect();
    if !paths.windows(2).all(|w| w[0] < w[1]) {
        c.push("GA5", "changed_files are not strictly sorted by path");
    }

    for f in &result.changed_files {
        match (f.op, &f.content_hash) {
            (OpKind::Delete, Some(_)) => {
                c.push_at("GA6", &f.path, "deleted file must have null content_hash");
            }
            (OpKind::Delete, None) => {}
            (_, Some(h)) if !is_content_hash(h) => {
                c.push_at("GA6", &f.path, format!("content_hash is malformed: {h}"));
            }
            (_, Some(_)) => {}
            (_, None) => {
                c.push_at("GA6", &f.path, "non-delete file must carry content_hash");
            }
        }
    }

    if let Some(commit) = &result.commit {
        if !is_commit_sha(&commit.sha) {
            c.push("GA7", format!("commit.sha is malformed: {}", commit.sha));
        }
    }

    c.finish(SPEC_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use packline_core::model::v1::*;
    use serde_json::json;

    fn sample() -> GitApplyResult {
        GitApplyResult {
            git_apply_schema_version: "v1".to_string(),
            outcome: ApplyOutcome::Success,
            dry_run: false,
            repo_root: "/tmp/repo".to_string(),
            patch_source: PatchSource {
                proposal_id: "out_0011223344556677".to_string(),
                proposal_hash: packline_core::determinism::canonical_json::content_hash_bytes(
                    b"proposal",
                ),
            },
            branch: BranchInfo {
                name: "apply/run_1234".to_string(),
                created: true,
            },
            git_state: GitState {
                clean_before: true,
                clean_after: true,
                head_before: Some("a".repeat(40)),
                head_after: Some("b".repeat(40)),
            },
            commit: None,
            changed_files: vec![ChangedFile {
                op: OpKind::Create,
                path: "new.txt".to_string(),
                content_hash: Some(
                    packline_core::determinism::canonical_json::content_hash_bytes(b"n"),
                ),
            }],
            operation_results: vec![],
            summary: ApplySummary::default(),
            violations: vec![],
            error: None,
            error_kind: None,
        }
    }

    #[test]
    fn valid_result_passes() {
        let mut r = sample();
        r.summary.total_operations = 0;
        let report = verify_git_apply(&serde_json::to_value(r).unwrap());
        assert!(report.ok, "{:?}", report.violations);
    }

    #[test]
    fn branch_with_space_flagged() {
        let mut r = sample();
        r.branch.name = "apply run".to_string();
        let report = verify_git_apply(&serde_json::to_value(r).unwrap());
        assert!(report.violations.iter().any(|v| v.rule_id == "GA3"));
    }

    #[test]
    fn delete_with_hash_flagged() {
        let mut r = sample();
        r.changed_files[0].op = OpKind::Delete;
        let report = verify_git_apply(&serde_json::to_value(r).unwrap());
        assert!(report.violations.iter().any(|v| v.rule_id == "GA6"));
    }

    #[test]
    fn short_commit_sha_flagged() {
        let mut r = sample();
        r.commit = Some(CommitInfo {
            sha: "abc123".to_string(),
            message: "Apply patch".to_string(),
        });
        let report = verify_git_apply(&serde_json::to_value(r).unwrap());
        assert!(report.violations.iter().any(|v| v.rule_id == "GA7"));
    }

    #[test]
    fn garbage_is_schema_violation() {
        let report = verify_git_apply(&json!([]));
        assert_eq!(report.violations[0].rule_id, "SCHEMA");
    }
}
