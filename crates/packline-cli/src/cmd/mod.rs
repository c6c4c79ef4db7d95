use anyhow::Result;

use crate::args::{Cli, Command};

mod git_apply;
mod model_io_verify;
mod pack_apply;
mod pack_export;
mod pack_verify;

pub fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::PackVerify { dir, no_deep, no_refs } => pack_verify::run(&dir, no_deep, no_refs),
        Command::PackApply {
            pack,
            target,
            dry_run,
            policy,
            skip_patch_match,
        } => pack_apply::run(&pack, &target, dry_run, &policy, skip_patch_match),
        Command::GitApply {
            pack,
            repo,
            branch,
            dry_run,
            commit,
            message,
            allow_dirty,
        } => git_apply::run(&pack, &repo, branch, dry_run, commit, message, allow_dirty),
        Command::PackExport {
            intent,
            out,
            policy,
            mode,
            model_mode,
            model_recording,
        } => pack_export::run(&intent, &out, &policy, &mode, &model_mode, model_recording),
        Command::ModelIoVerify {
            path,
            no_response_hashes,
            no_size_limits,
        } => model_io_verify::run(&path, no_response_hashes, no_size_limits),
    }
}
