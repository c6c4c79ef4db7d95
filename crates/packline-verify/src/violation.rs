//! Violation collection shared by all verifiers.

use serde::{Deserialize, Serialize};

use packline_core::model::v1::Violation;

/// Result of verifying one artifact against one spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecReport {
    pub spec: String,
    pub ok: bool,
    pub violations: Vec<Violation>,
}

impl SpecReport {
    pub fn new(spec: impl Into<String>, mut violations: Vec<Violation>) -> Self {
        violations.sort_by_key(|v| v.sort_key());
        Self {
            spec: spec.into(),
            ok: violations.is_empty(),
            violations,
        }
    }
}

/// Violation buffer used inside a verifier run.
///
/// Verifiers append as they walk the artifact; `finish` sorts and decides
/// `ok`. Nothing in here can fail.
#[derive(Debug, Default)]
pub struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule_id: &str, message: impl Into<String>) {
        self.violations.push(Violation::new(rule_id, message));
    }

    pub fn push_at(&mut self, rule_id: &str, path: impl AsRef<str>, message: impl Into<String>) {
        self.violations
            .push(Violation::at(rule_id, path.as_ref(), message));
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn finish(self, spec: &str) -> SpecReport {
        SpecReport::new(spec, self.violations)
    }

    /// Take the sorted violations without wrapping them in a report.
    pub fn into_violations(mut self) -> Vec<Violation> {
        self.violations.sort_by_key(|v| v.sort_key());
        self.violations
    }
}
