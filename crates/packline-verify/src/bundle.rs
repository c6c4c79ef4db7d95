//! BUNDLE_SPEC verifier (BS1..BS8).

use serde_json::Value;

use crate::paths::check_relative_path;
use crate::violation::{Checker, SpecReport};
use crate::RULE_SCHEMA;
use packline_core::assemble::rebuild_bundle_id;
use packline_core::model::v1::{Bundle, ContextNode, Question};

pub const SPEC_NAME: &str = "BUNDLE_SPEC";
pub const SCHEMA_VERSION: &str = "v1";

fn is_entity_id(s: &str, prefix: &str) -> bool {
    s.strip_prefix(prefix)
        .map(|rest| rest.len() == 16 && rest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()))
        .unwrap_or(false)
}

/// Verify a raw value against BUNDLE_SPEC.
pub fn verify_bundle(value: &Value) -> SpecReport {
    let mut c = Checker::new();

    let bundle: Bundle = match serde_json::from_value(value.clone()) {
        Ok(b) => b,
        Err(e) => {
            c.push(RULE_SCHEMA, format!("bundle does not parse: {e}"));
            return c.finish(SPEC_NAME);
        }
    };

    if bundle.schema_version != SCHEMA_VERSION {
        c.push(
            "BS1",
            format!(
                "schema_version must be {SCHEMA_VERSION}, got {}",
                bundle.schema_version
            ),
        );
    }

    if !is_entity_id(&bundle.id, "bundle_") {
        c.push("BS2", format!("bundle id is malformed: {}", bundle.id));
    } else {
        let mut recomputed = bundle.clone();
        match rebuild_bundle_id(&mut recomputed) {
            Ok(()) if recomputed.id == bundle.id => {}
            Ok(()) => c.push(
                "BS2",
                format!(
                    "bundle id does not match content: expected {}, got {}",
                    recomputed.id, bundle.id
                ),
            ),
            Err(e) => c.push("BS2", format!("bundle id recomputation failed: {e}")),
        }
    }

    // BS3: terminal nodes strictly sorted by id.
    let terminal_ids: Vec<&str> = bundle.terminal_nodes.iter().map(|t| t.id.as_str()).collect();
    if !terminal_ids.windows(2).all(|w| w[0] < w[1]) {
        c.push("BS3", "terminal_nodes are not strictly sorted by id");
    }

    // BS4/BS5: outputs sorted by path, unique and safe.
    let output_paths: Vec<&str> = bundle.outputs.iter().map(|o| o.path.as_str()).collect();
    if !output_paths.windows(2).all(|w| w[0] < w[1]) {
        c.push("BS4", "outputs are not strictly sorted by path");
    }
    for o in &bundle.outputs {
        if let Err(reason) = check_relative_path(&o.path) {
            c.push_at("BS5", &o.path, reason);
        }
        if !is_entity_id(&o.id, "out_") {
            c.push_at("BS4", &o.path, format!("output id is malformed: {}", o.id));
        }
        if o.confidence > 100 {
            c.push_at("BS4", &o.path, "output confidence exceeds 100");
        }
    }

    // BS6: question ordering at bundle level and inside each node.
    check_questions(&mut c, "BS6", "unresolved_questions", &bundle.unresolved_questions);

    // BS7: per-node invariants.
    check_node(&mut c, &bundle.root_node, true);
    for t in &bundle.terminal_nodes {
        check_node(&mut c, t, t.id == bundle.root_node.id);
    }

    // BS8: stats consistency.
    let s = &bundle.stats;
    if s.terminal_count as usize != bundle.terminal_nodes.len() {
        c.push(
            "BS8",
            format!(
                "stats.terminal_count {} does not match terminal_nodes length {}",
                s.terminal_count,
                bundle.terminal_nodes.len()
            ),
        );
    }
    if s.question_count as usize != bundle.unresolved_questions.len() {
        c.push(
            "BS8",
            format!(
                "stats.question_count {} does not match unresolved_questions length {}",
                s.question_count,
                bundle.unresolved_questions.len()
            ),
        );
    }
    if s.avg_terminal_entropy > 100 || s.avg_terminal_density > 100 {
        c.push("BS8", "stats averages must stay within [0, 100]");
    }
    if s.max_depth > packline_core::assemble::MAX_DEPTH {
        c.push(
            "BS8",
            format!("stats.max_depth {} exceeds the decomposition bound", s.max_depth),
        );
    }

    c.finish(SPEC_NAME)
}

fn check_questions(c: &mut Checker, rule: &str, at: &str, questions: &[Question]) {
    let ordered = questions.windows(2).all(|w| {
        w[0].priority > w[1].priority || (w[0].priority == w[1].priority && w[0].id < w[1].id)
    });
    if !ordered {
        c.push_at(rule, at, "questions are not sorted by (priority desc, id asc)");
    }
    for q in questions {
        if !is_entity_id(&q.id, "q_") {
            c.push_at(rule, at, format!("question id is malformed: {}", q.id));
        }
        if let Some(options) = &q.options {
            if !options.windows(2).all(|w| w[0] <= w[1]) {
                c.push_at(rule, at, format!("question {} options are not sorted", q.id));
            }
        }
    }
}

fn check_node(c: &mut Checker, node: &ContextNode, is_root: bool) {
    let at = node.id.clone();

    if !is_entity_id(&node.id, "node_") {
        c.push_at("BS7", &at, "node id is malformed");
    }
    if is_root && node.parent_id.is_some() {
        c.push_at("BS7", &at, "root node must not carry a parent_id");
    }
    if !is_root {
        match &node.parent_id {
            Some(p) if is_entity_id(p, "node_") => {}
            Some(p) => c.push_at("BS7", &at, format!("parent_id is malformed: {p}")),
            None => c.push_at("BS7", &at, "non-root node is missing parent_id"),
        }
    }

    if !node.constraints.windows(2).all(|w| w[0] < w[1]) {
        c.push_at("BS7", &at, "constraints are not strictly sorted");
    }
    if !node.children.windows(2).all(|w| w[0] < w[1]) {
        c.push_at("BS7", &at, "children are not strictly sorted");
    }
    for child in &node.children {
        if !is_entity_id(child, "node_") {
            c.push_at("BS7", &at, format!("child id is malformed: {child}"));
        }
    }

    if node.entropy.entropy_score > 100 {
        c.push_at("BS7", &at, "entropy_score exceeds 100");
    }
    if node.density.density_score > 100 {
        c.push_at("BS7", &at, "density_score exceeds 100");
    }

    check_questions(c, "BS6", &at, &node.unresolved_questions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use packline_core::kernel::transform;
    use serde_json::json;

    fn assembled() -> Value {
        let r = transform(&json!({
            "goal": "Build a user authentication system",
            "constraints": ["Must use JWT", "Session timeout 24h"]
        }));
        serde_json::to_value(r.bundle.unwrap()).unwrap()
    }

    #[test]
    fn assembler_output_verifies_clean() {
        let report = verify_bundle(&assembled());
        assert!(report.ok, "{:?}", report.violations);
    }

    #[test]
    fn clarify_bundle_verifies_clean() {
        let r = transform(&json!({
            "goal": "Build an API",
            "constraints": ["Must be synchronous", "Must be asynchronous"]
        }));
        let v = serde_json::to_value(r.bundle.unwrap()).unwrap();
        let report = verify_bundle(&v);
        assert!(report.ok, "{:?}", report.violations);
    }

    #[test]
    fn garbage_is_schema_violation() {
        let report = verify_bundle(&json!("nope"));
        assert!(!report.ok);
        assert_eq!(report.violations[0].rule_id, "SCHEMA");
    }

    #[test]
    fn wrong_version_flagged() {
        let mut v = assembled();
        v["schema_version"] = json!("v2");
        let report = verify_bundle(&v);
        assert!(report.violations.iter().any(|x| x.rule_id == "BS1"));
    }

    #[test]
    fn tampered_content_breaks_id() {
        let mut v = assembled();
        v["root_node"]["goal"] = json!("Tampered goal");
        let report = verify_bundle(&v);
        assert!(report.violations.iter().any(|x| x.rule_id == "BS2"));
    }

    #[test]
    fn unsafe_output_path_flagged() {
        let mut v = assembled();
        v["outputs"][0]["path"] = json!("../../etc/passwd");
        let report = verify_bundle(&v);
        assert!(report.violations.iter().any(|x| x.rule_id == "BS5"));
    }

    #[test]
    fn unsorted_terminals_flagged() {
        let r = transform(&json!({
            "goal": "Build a platform",
            "constraints": ["Use postgres", "Use redis", "Expose http API", "Ship docker image"]
        }));
        let mut v = serde_json::to_value(r.bundle.unwrap()).unwrap();
        let arr = v["terminal_nodes"].as_array_mut().unwrap();
        if arr.len() >= 2 {
            arr.reverse();
        }
        let report = verify_bundle(&v);
        assert!(report.violations.iter().any(|x| x.rule_id == "BS3"));
    }
}
