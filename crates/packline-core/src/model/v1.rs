//! v1 artifact types.
//!
//! Field order in these structs follows the written spec for readability;
//! canonical serialization sorts keys, so declaration order never affects
//! hashes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A score in `[0, 100]`.
pub type Score = u8;

/// A normalized intent: the assembler's only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIntent {
    pub goal: String,
    pub constraints: Vec<String>,
    pub context: Value,
}

/// A clarification question attached to a context node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub why_needed: String,
    pub information_gain: Score,
    pub priority: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Ambiguity signal for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropySignal {
    pub entropy_score: Score,
    pub contradiction_count: u32,
    pub unresolved_refs: u32,
}

/// Concreteness signal for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensitySignal {
    pub density_score: Score,
    pub concrete_constraints: u32,
    pub total_constraints: u32,
}

/// One node of the decomposition tree.
///
/// Nodes reference each other by id only; lookups go through the bundle's
/// `terminal_nodes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub goal: String,
    pub constraints: Vec<String>,
    pub children: Vec<String>,
    pub unresolved_questions: Vec<Question>,
    pub entropy: EntropySignal,
    pub density: DensitySignal,
}

/// A proposed output artifact attached to a terminal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub id: String,
    pub path: String,
    pub source_constraints: Vec<String>,
    pub confidence: Score,
}

/// Aggregate bundle statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleStats {
    pub max_depth: u32,
    pub terminal_count: u32,
    pub question_count: u32,
    pub avg_terminal_entropy: Score,
    pub avg_terminal_density: Score,
}

/// The assembler's deterministic decomposition of a normalized intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub schema_version: String,
    pub id: String,
    pub root_node: ContextNode,
    pub terminal_nodes: Vec<ContextNode>,
    pub outputs: Vec<Output>,
    pub unresolved_questions: Vec<Question>,
    pub stats: BundleStats,
}

/// Patch operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Create,
    Modify,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

/// One file operation in a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Create {
        path: String,
        content: String,
        size_bytes: u64,
        order: u64,
    },
    Modify {
        path: String,
        content: String,
        size_bytes: u64,
        order: u64,
    },
    Delete {
        path: String,
        order: u64,
    },
}

impl PatchOperation {
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Create { .. } => OpKind::Create,
            Self::Modify { .. } => OpKind::Modify,
            Self::Delete { .. } => OpKind::Delete,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. } | Self::Modify { path, .. } | Self::Delete { path, .. } => {
                path
            }
        }
    }

    pub fn order(&self) -> u64 {
        match self {
            Self::Create { order, .. }
            | Self::Modify { order, .. }
            | Self::Delete { order, .. } => *order,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Create { content, .. } | Self::Modify { content, .. } => Some(content),
            Self::Delete { .. } => None,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            Self::Create { size_bytes, .. } | Self::Modify { size_bytes, .. } => *size_bytes,
            Self::Delete { .. } => 0,
        }
    }
}

/// A bundle-bound set of file operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSet {
    pub patch_schema_version: String,
    pub source_proposal_id: String,
    pub source_proposal_hash: String,
    pub operations: Vec<PatchOperation>,
    pub total_bytes: u64,
}

/// Aggregate apply outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyOutcome {
    Success,
    Partial,
    Failed,
    Refused,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
            Self::Refused => "REFUSED",
        }
    }
}

/// Per-operation apply status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Success,
    Skipped,
    Error,
}

/// A single spec-rule violation.
///
/// Violation lists are always sorted by `(rule_id, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            path: None,
            message: message.into(),
        }
    }

    pub fn at(rule_id: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            path: Some(path.into()),
            message: message.into(),
        }
    }

    /// Canonical violation ordering key.
    pub fn sort_key(&self) -> (String, String) {
        (self.rule_id.clone(), self.path.clone().unwrap_or_default())
    }
}

/// Result of one executed (or dry-run) operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub op: OpKind,
    pub path: String,
    pub status: OpStatus,
    pub before_hash: Option<String>,
    pub after_hash: Option<String>,
    pub bytes_written: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Apply result summary counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub total_operations: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total_bytes_written: u64,
}

/// Reference to the patch that produced an apply result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSource {
    pub proposal_id: String,
    pub proposal_hash: String,
}

/// Result of applying a patch to a filesystem root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub apply_schema_version: String,
    pub outcome: ApplyOutcome,
    pub dry_run: bool,
    pub target_root: String,
    pub patch_source: PatchSource,
    pub operation_results: Vec<OperationResult>,
    pub summary: ApplySummary,
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Branch state recorded by the git engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub created: bool,
}

/// Worktree state around a git apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitState {
    pub clean_before: bool,
    pub clean_after: bool,
    pub head_before: Option<String>,
    pub head_after: Option<String>,
}

/// Commit created by the git engine, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
}

/// One changed file recorded by the git engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub op: OpKind,
    pub path: String,
    pub content_hash: Option<String>,
}

/// Failure classification recorded by the git engine.
///
/// Distinguishes a malformed patch and a git command that failed after the
/// preconditions had already passed from an ordinary refusal; the CLI exit
/// codes depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitErrorKind {
    Parse,
    Tooling,
}

/// Result of applying a patch to a git worktree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitApplyResult {
    pub git_apply_schema_version: String,
    pub outcome: ApplyOutcome,
    pub dry_run: bool,
    pub repo_root: String,
    pub patch_source: PatchSource,
    pub branch: BranchInfo,
    pub git_state: GitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
    pub changed_files: Vec<ChangedFile>,
    pub operation_results: Vec<OperationResult>,
    pub summary: ApplySummary,
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<GitErrorKind>,
}

/// Kernel transform result kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultKind {
    Bundle,
    Clarify,
    Refuse,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "BUNDLE",
            Self::Clarify => "CLARIFY",
            Self::Refuse => "REFUSE",
        }
    }
}

/// Run execution modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    #[serde(rename = "plan-only")]
    PlanOnly,
    #[serde(rename = "execute-sandbox")]
    ExecuteSandbox,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanOnly => "plan-only",
            Self::ExecuteSandbox => "execute-sandbox",
        }
    }
}

/// Built-in policy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyName {
    Strict,
    Default,
    Dev,
}

impl PolicyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Default => "default",
            Self::Dev => "dev",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "default" => Some(Self::Default),
            "dev" => Some(Self::Dev),
            _ => None,
        }
    }
}

/// One line of the run ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub run_id: String,
    pub timestamp: String,
    pub intent_sha256: String,
    pub bundle_sha256: Option<String>,
    pub result_kind: ResultKind,
    pub accepted: bool,
    pub mode: RunMode,
    pub policy: PolicyName,
}

/// A content-hash reference to another pack file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashRef {
    pub sha256: String,
}

/// The run record written as `run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_schema_version: String,
    pub run_id: String,
    pub created_at: String,
    pub mode: RunMode,
    pub policy: PolicyName,
    pub result_kind: ResultKind,
    pub intent: HashRef,
    pub bundle: Option<HashRef>,
    pub patch: Option<HashRef>,
    pub model_io: Option<HashRef>,
    pub policy_ref: Option<HashRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refuse_reason: Option<String>,
}

/// Safety policy applied by the engines, written as `policy.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_schema_version: String,
    pub name: PolicyName,
    pub allow_paths: Vec<String>,
    pub max_total_bytes: u64,
    pub max_operations: u64,
    pub allow_delete: bool,
    pub allow_dirty_worktree: bool,
}

impl Policy {
    pub fn strict() -> Self {
        Self {
            policy_schema_version: "v1".to_string(),
            name: PolicyName::Strict,
            allow_paths: vec!["docs/".to_string(), "src/".to_string()],
            max_total_bytes: 1024 * 1024,
            max_operations: 100,
            allow_delete: false,
            allow_dirty_worktree: false,
        }
    }

    pub fn default_policy() -> Self {
        Self {
            policy_schema_version: "v1".to_string(),
            name: PolicyName::Default,
            allow_paths: Vec::new(),
            max_total_bytes: 16 * 1024 * 1024,
            max_operations: 1_000,
            allow_delete: true,
            allow_dirty_worktree: false,
        }
    }

    pub fn dev() -> Self {
        Self {
            policy_schema_version: "v1".to_string(),
            name: PolicyName::Dev,
            allow_paths: Vec::new(),
            max_total_bytes: 64 * 1024 * 1024,
            max_operations: 10_000,
            allow_delete: true,
            allow_dirty_worktree: true,
        }
    }

    pub fn by_name(name: PolicyName) -> Self {
        match name {
            PolicyName::Strict => Self::strict(),
            PolicyName::Default => Self::default_policy(),
            PolicyName::Dev => Self::dev(),
        }
    }
}

/// Model adapter recording modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelIoMode {
    Record,
    Replay,
}

/// One recorded model interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInteraction {
    pub id: String,
    pub provider: String,
    pub model: String,
    pub timestamp: String,
    pub request_sha256: String,
    pub response_sha256: String,
    pub response: Value,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Recorded model traffic, written as `model_io.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIoLog {
    pub model_io_schema_version: String,
    pub mode: ModelIoMode,
    pub interactions: Vec<ModelInteraction>,
}
