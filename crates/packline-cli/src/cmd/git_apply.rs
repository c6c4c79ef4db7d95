use std::path::Path;

use anyhow::Result;

use packline_core::model::v1::{ApplyOutcome, GitErrorKind};
use packline_engine::{git_apply, GitApplyOptions};

use crate::output;

pub fn run(
    pack: &str,
    repo: &str,
    branch: Option<String>,
    dry_run: bool,
    commit: bool,
    message: Option<String>,
    allow_dirty: bool,
) -> Result<i32> {
    let opts = GitApplyOptions {
        branch,
        dry_run,
        commit,
        message,
        allow_dirty,
    };
    let result = git_apply(Path::new(pack), repo, &opts);
    output::print_canonical(&result)?;

    Ok(match (result.outcome, result.error_kind) {
        (ApplyOutcome::Success, _) => 0,
        // A git command failed after the preconditions had passed.
        (_, Some(GitErrorKind::Tooling)) => 4,
        // Operation-level read/write failures.
        (ApplyOutcome::Partial | ApplyOutcome::Failed, _) => 1,
        (ApplyOutcome::Refused, Some(GitErrorKind::Parse)) => 2,
        (ApplyOutcome::Refused, _) => 3,
    })
}
