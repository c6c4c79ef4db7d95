//! Git worktree patch engine.
//!
//! Same operation semantics as the filesystem engine, targeting a clean git
//! worktree. Branch management, staging, and commits go through porcelain
//! `git` commands; the engine records observable state (heads, cleanliness,
//! commit sha) rather than reimplementing the object database.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;

use packline_core::determinism::canonical_json::content_hash_bytes;
use packline_core::model::v1::{
    ApplyOutcome, ApplySummary, BranchInfo, ChangedFile, GitApplyResult, GitErrorKind, GitState,
    PatchOperation, PatchSet, PatchSource, Violation,
};
use packline_core::SCHEMA_VERSION_V1;
use packline_verify::patch::verify_patch;

use crate::patch_apply::{compose_outcome, execute_operations, summarize, NULL_HASH};

/// Options for [`git_apply`].
#[derive(Debug, Clone, Default)]
pub struct GitApplyOptions {
    /// Branch override; defaults to `apply/<run_id>` or `apply/manual`.
    pub branch: Option<String>,
    pub dry_run: bool,
    /// Create a commit after staging.
    pub commit: bool,
    /// Commit message override.
    pub message: Option<String>,
    /// Proceed even when the worktree has uncommitted changes.
    pub allow_dirty: bool,
}

fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .with_context(|| format!("run git {args:?}"))?;
    if !out.status.success() {
        anyhow::bail!("git {:?} failed (code={:?})", args, out.status.code());
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn head_sha(repo: &Path) -> Option<String> {
    run_git(repo, &["rev-parse", "HEAD"]).ok()
}

fn worktree_clean(repo: &Path) -> bool {
    run_git(repo, &["status", "--porcelain=v1"])
        .map(|s| s.is_empty())
        .unwrap_or(false)
}

fn branch_exists(repo: &Path, name: &str) -> bool {
    run_git(repo, &["rev-parse", "--verify", "--quiet", &format!("refs/heads/{name}")]).is_ok()
}

/// Resolve the branch name: caller override, then the pack's run id, then
/// the manual fallback.
fn resolve_branch(pack_dir: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_string();
    }
    let run_id = std::fs::read(pack_dir.join("run.json"))
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .and_then(|v| v.get("run_id").and_then(Value::as_str).map(str::to_string));
    match run_id {
        Some(id) => format!("apply/{id}"),
        None => "apply/manual".to_string(),
    }
}

/// Apply a pack's patch onto a branch of the repository at `repo_root`.
pub fn git_apply(pack_dir: &Path, repo_root: &str, opts: &GitApplyOptions) -> GitApplyResult {
    let branch_name = resolve_branch(pack_dir, opts.branch.as_deref());
    let repo = Path::new(repo_root);

    let halt = |outcome: ApplyOutcome,
                error_kind: Option<GitErrorKind>,
                source: PatchSource,
                git_state: GitState,
                violations: Vec<Violation>,
                error: String| GitApplyResult {
        git_apply_schema_version: SCHEMA_VERSION_V1.to_string(),
        outcome,
        dry_run: opts.dry_run,
        repo_root: repo_root.to_string(),
        patch_source: source,
        branch: BranchInfo {
            name: branch_name.clone(),
            created: false,
        },
        git_state,
        commit: None,
        changed_files: Vec::new(),
        operation_results: Vec::new(),
        summary: ApplySummary::default(),
        violations,
        error: Some(error),
        error_kind,
    };
    let unknown_source = PatchSource {
        proposal_id: "unknown".to_string(),
        proposal_hash: NULL_HASH.to_string(),
    };
    let no_state = GitState {
        clean_before: false,
        clean_after: false,
        head_before: None,
        head_after: None,
    };

    if !repo.is_dir() || !repo.join(".git").exists() {
        return halt(
            ApplyOutcome::Refused,
            None,
            unknown_source,
            no_state,
            Vec::new(),
            format!("not a git repository: {repo_root}"),
        );
    }

    let head_before = head_sha(repo);
    let clean_before = worktree_clean(repo);
    let observed = GitState {
        clean_before,
        clean_after: clean_before,
        head_before: head_before.clone(),
        head_after: head_before.clone(),
    };

    if !clean_before && !opts.allow_dirty {
        return halt(
            ApplyOutcome::Refused,
            None,
            unknown_source,
            observed,
            Vec::new(),
            "working tree has uncommitted changes".to_string(),
        );
    }

    let patch = match load_patch(pack_dir) {
        Ok(p) => p,
        Err(LoadPatchError::Missing) => {
            return halt(
                ApplyOutcome::Refused,
                None,
                unknown_source,
                observed,
                Vec::new(),
                "no patch.json".to_string(),
            )
        }
        Err(LoadPatchError::Parse(e)) => {
            return halt(
                ApplyOutcome::Refused,
                Some(GitErrorKind::Parse),
                unknown_source,
                observed,
                Vec::new(),
                format!("patch.json does not parse: {e}"),
            )
        }
        Err(LoadPatchError::Spec(violations)) => {
            return halt(
                ApplyOutcome::Refused,
                None,
                unknown_source,
                observed,
                violations,
                "patch.json violates PATCH_SPEC".to_string(),
            )
        }
    };
    let source = PatchSource {
        proposal_id: patch.source_proposal_id.clone(),
        proposal_hash: patch.source_proposal_hash.clone(),
    };

    let created = !branch_exists(repo, &branch_name);
    if !opts.dry_run {
        let switch = if created {
            run_git(repo, &["checkout", "-q", "-b", &branch_name])
        } else {
            run_git(repo, &["checkout", "-q", &branch_name])
        };
        if let Err(e) = switch {
            // Preconditions already passed: this is a tooling failure, not
            // a refusal.
            return halt(
                ApplyOutcome::Failed,
                Some(GitErrorKind::Tooling),
                source,
                observed,
                Vec::new(),
                format!("branch switch failed: {e}"),
            );
        }
    }

    let mut operation_results = execute_operations(&patch.operations, repo, opts.dry_run);
    operation_results.sort_by(|a, b| a.path.cmp(&b.path));
    let summary = summarize(&operation_results);

    let mut commit = None;
    let mut error = None;
    let mut error_kind = None;
    if !opts.dry_run {
        if let Err(e) = run_git(repo, &["add", "-A"]) {
            error = Some(format!("staging failed: {e}"));
            error_kind = Some(GitErrorKind::Tooling);
        } else if opts.commit {
            let message = opts
                .message
                .clone()
                .unwrap_or_else(|| format!("Apply patch {}", patch.source_proposal_id));
            match run_git(
                repo,
                &[
                    "-c",
                    "user.name=packline",
                    "-c",
                    "user.email=packline@local",
                    "commit",
                    "-qm",
                    &message,
                ],
            ) {
                Ok(_) => {
                    if let Some(sha) = head_sha(repo) {
                        commit = Some(packline_core::model::v1::CommitInfo { sha, message });
                    }
                }
                Err(e) => {
                    error = Some(format!("commit failed: {e}"));
                    error_kind = Some(GitErrorKind::Tooling);
                }
            }
        }
    }
    let outcome = if error_kind.is_some() {
        ApplyOutcome::Failed
    } else {
        compose_outcome(&summary)
    };

    let mut changed_files: Vec<ChangedFile> = patch
        .operations
        .iter()
        .map(|op| ChangedFile {
            op: op.kind(),
            path: op.path().to_string(),
            content_hash: match op {
                PatchOperation::Create { content, .. } | PatchOperation::Modify { content, .. } => {
                    Some(content_hash_bytes(content.as_bytes()))
                }
                PatchOperation::Delete { .. } => None,
            },
        })
        .collect();
    changed_files.sort_by(|a, b| a.path.cmp(&b.path));

    let git_state = if opts.dry_run {
        observed
    } else {
        GitState {
            clean_before,
            clean_after: worktree_clean(repo),
            head_before,
            head_after: head_sha(repo),
        }
    };

    GitApplyResult {
        git_apply_schema_version: SCHEMA_VERSION_V1.to_string(),
        outcome,
        dry_run: opts.dry_run,
        repo_root: repo_root.to_string(),
        patch_source: source,
        branch: BranchInfo {
            name: branch_name,
            created: created && !opts.dry_run,
        },
        git_state,
        commit,
        changed_files,
        operation_results,
        summary,
        violations: Vec::new(),
        error,
        error_kind,
    }
}

enum LoadPatchError {
    Missing,
    Parse(String),
    Spec(Vec<Violation>),
}

fn load_patch(pack_dir: &Path) -> std::result::Result<PatchSet, LoadPatchError> {
    let bytes = std::fs::read(pack_dir.join("patch.json")).map_err(|_| LoadPatchError::Missing)?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| LoadPatchError::Parse(e.to_string()))?;
    let report = verify_patch(&value);
    if !report.ok {
        return Err(LoadPatchError::Spec(report.violations));
    }
    serde_json::from_value(value).map_err(|e| LoadPatchError::Parse(e.to_string()))
}
