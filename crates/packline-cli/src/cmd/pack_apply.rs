use std::path::Path;

use anyhow::Result;

use packline_core::model::v1::{ApplyOutcome, Policy, PolicyName};
use packline_engine::{apply_pack, PatchApplyOptions};

use crate::output;

pub fn run(
    pack: &str,
    target: &str,
    dry_run: bool,
    policy: &str,
    skip_patch_match: bool,
) -> Result<i32> {
    let Some(policy_name) = PolicyName::parse(policy) else {
        output::eprintln_line(&format!("pack-apply: unknown policy {policy}"));
        return Ok(3);
    };

    let opts = PatchApplyOptions {
        dry_run,
        skip_patch_match,
        policy: Policy::by_name(policy_name),
    };
    let result = apply_pack(Path::new(pack), target, &opts);
    output::print_canonical(&result)?;

    Ok(match result.outcome {
        ApplyOutcome::Success => 0,
        ApplyOutcome::Partial | ApplyOutcome::Failed => 1,
        ApplyOutcome::Refused => 2,
    })
}
