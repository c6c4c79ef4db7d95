use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "packline", version, about = "Deterministic intent-to-pack pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Verify a pack directory against PACK_SPEC.
    PackVerify {
        /// Pack directory.
        dir: String,

        /// Skip deep per-artifact verification.
        #[arg(long)]
        no_deep: bool,

        /// Skip cross-file reference checks.
        #[arg(long)]
        no_refs: bool,
    },

    /// Apply a pack's patch to a filesystem target.
    PackApply {
        /// Pack directory holding patch.json.
        #[arg(long)]
        pack: String,

        /// Target root directory.
        #[arg(long)]
        target: String,

        /// Compute results without touching the filesystem.
        #[arg(long)]
        dry_run: bool,

        /// Safety policy: strict|default|dev.
        #[arg(long, default_value = "default")]
        policy: String,

        /// Skip the patch-to-bundle binding check.
        #[arg(long)]
        skip_patch_match: bool,
    },

    /// Apply a pack's patch onto a branch of a git repository.
    GitApply {
        /// Pack directory holding patch.json.
        #[arg(long)]
        pack: String,

        /// Repository worktree root.
        #[arg(long)]
        repo: String,

        /// Branch name override.
        #[arg(long)]
        branch: Option<String>,

        /// Compute results without touching the worktree.
        #[arg(long)]
        dry_run: bool,

        /// Create a commit after staging.
        #[arg(long)]
        commit: bool,

        /// Commit message override.
        #[arg(long)]
        message: Option<String>,

        /// Proceed even when the worktree is dirty.
        #[arg(long)]
        allow_dirty: bool,
    },

    /// Transform an intent file into a verified pack directory.
    PackExport {
        /// Intent JSON file.
        #[arg(long)]
        intent: String,

        /// Output directory (must be empty or absent).
        #[arg(long)]
        out: String,

        /// Safety policy: strict|default|dev.
        #[arg(long, default_value = "default")]
        policy: String,

        /// Run mode: plan|exec.
        #[arg(long, default_value = "plan")]
        mode: String,

        /// Model adapter mode: none|record|replay.
        #[arg(long, default_value = "none")]
        model_mode: String,

        /// Model recording file for record/replay.
        #[arg(long)]
        model_recording: Option<String>,
    },

    /// Verify a model IO recording against MODEL_IO_SPEC.
    ModelIoVerify {
        /// Recording JSON file.
        path: String,

        /// Skip response hash recomputation.
        #[arg(long)]
        no_response_hashes: bool,

        /// Skip interaction and total size ceilings.
        #[arg(long)]
        no_size_limits: bool,
    },
}
