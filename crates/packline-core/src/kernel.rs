//! Kernel transform facade.
//!
//! `transform` is the single stable entry point: raw intent in, a result
//! kind plus artifacts out. It never returns an error; invalid input
//! surfaces as a `REFUSE` result with a documented reason.

use serde_json::Value;

use crate::assemble::{assemble, rebuild_bundle_id, REQUIRED_QUESTION_PRIORITY};
use crate::determinism::normalize::normalize_intent;
use crate::model::v1::{Bundle, NormalizedIntent, Question};

pub use crate::model::v1::ResultKind;

/// Goal substrings that trigger an immediate refusal.
///
/// Matching is substring-based on the lowercase normalized goal. The list is
/// deliberately tiny: the kernel is not a content filter, it only refuses
/// directives that would turn apply into a destruction primitive.
pub const ABUSE_PATTERNS: &[&str] = &["rm -rf /", "fork bomb", "mkfs.", "dd if=/dev/zero"];

/// Result of a kernel transform.
#[derive(Debug, Clone)]
pub struct KernelResult {
    pub kind: ResultKind,
    pub bundle: Option<Bundle>,
    pub questions: Vec<Question>,
    pub refuse_reason: Option<String>,
    pub normalized: Option<NormalizedIntent>,
}

impl KernelResult {
    fn refuse(reason: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Refuse,
            bundle: None,
            questions: Vec::new(),
            refuse_reason: Some(reason.into()),
            normalized: None,
        }
    }
}

/// Transform a raw intent value into a bundle, a clarification request, or a
/// refusal.
pub fn transform(raw_intent: &Value) -> KernelResult {
    let normalized = match normalize_intent(raw_intent) {
        Ok(n) => n,
        Err(e) => return KernelResult::refuse(e.to_string()),
    };

    let goal_lower = normalized.goal.to_lowercase();
    if let Some(pattern) = ABUSE_PATTERNS.iter().find(|p| goal_lower.contains(*p)) {
        return KernelResult::refuse(format!("abuse pattern: {pattern}"));
    }

    let mut bundle = match assemble(&normalized) {
        Ok(report) => report.bundle,
        Err(e) => return KernelResult::refuse(e.to_string()),
    };

    let needs_clarification = bundle
        .root_node
        .unresolved_questions
        .iter()
        .any(|q| q.priority >= REQUIRED_QUESTION_PRIORITY);

    if needs_clarification {
        let questions = bundle.unresolved_questions.clone();
        // A clarify bundle carries questions but proposes nothing.
        bundle.outputs.clear();
        if rebuild_bundle_id(&mut bundle).is_err() {
            return KernelResult::refuse("bundle id recomputation failed");
        }
        return KernelResult {
            kind: ResultKind::Clarify,
            bundle: Some(bundle),
            questions,
            refuse_reason: None,
            normalized: Some(normalized),
        };
    }

    KernelResult {
        kind: ResultKind::Bundle,
        questions: bundle.unresolved_questions.clone(),
        bundle: Some(bundle),
        refuse_reason: None,
        normalized: Some(normalized),
    }
}
