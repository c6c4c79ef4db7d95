//! packline-engine
//!
//! The I/O layer of the pipeline: everything that touches a filesystem, a
//! git worktree, or an append-only ledger lives here. The transform and
//! verification cores stay pure; these engines feed them bytes and persist
//! their outputs.

pub mod export;
pub mod git_apply;
pub mod ledger;
pub mod pack_dir;
pub mod patch_apply;

pub use crate::export::{export_pack, ExportOptions, ExportResult, ModelMode};
pub use crate::git_apply::{git_apply, GitApplyOptions};
pub use crate::ledger::LedgerWriter;
pub use crate::pack_dir::load_pack_dir;
pub use crate::patch_apply::{apply_pack, PatchApplyOptions};
