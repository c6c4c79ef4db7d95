//! Intent-to-bundle assembly.
//!
//! Decomposes a normalized intent into a tree of context nodes, generates
//! clarification questions, proposes output artifacts for terminal nodes,
//! and assigns content-derived ids.
//!
//! Determinism contract:
//! - no system time, env, randomness, or I/O
//! - every container is canonically ordered before ids are computed
//! - an entity's id is the first 16 hex chars of the SHA-256 of its
//!   canonical body with `id` and `parent_id` omitted (`parent_id` is
//!   excluded so that child ids do not depend on the parent, whose own id
//!   depends on its children)

use serde_json::Value;

use crate::determinism::canonical_json::short_hash16;
use crate::determinism::stable_sort::stable_sort_by_key;
use crate::errors::PacklineResult;
use crate::metrics::{density_signal, entropy_signal, find_contradictions, find_placeholders};
use crate::model::v1::{
    Bundle, BundleStats, ContextNode, NormalizedIntent, Output, Question, Score,
};
use crate::{id_prefix, SCHEMA_VERSION_V1};

/// Hard bound on decomposition depth, enforced even if rules keep firing.
pub const MAX_DEPTH: u32 = 10;

/// A node fans out into at most this many children per decomposition step.
const FANOUT_THRESHOLD: usize = 4;

/// Question priority for contradictions.
const PRIORITY_CONTRADICTION: Score = 90;
/// Question priority for placeholders in the goal.
const PRIORITY_GOAL_PLACEHOLDER: Score = 80;
/// Question priority for placeholders in constraints.
const PRIORITY_CONSTRAINT_PLACEHOLDER: Score = 60;

/// Questions at or above this priority force a CLARIFY result.
pub const REQUIRED_QUESTION_PRIORITY: Score = 80;

/// Structured note emitted while assembling, for CLI or report display.
#[derive(Debug, Clone)]
pub struct AssembleNote {
    pub code: String,
    pub message: String,
}

/// Assembly output: the bundle plus human-facing notes.
#[derive(Debug, Clone)]
pub struct AssembleReport {
    pub bundle: Bundle,
    pub notes: Vec<AssembleNote>,
}

struct ProtoNode {
    goal: String,
    constraints: Vec<String>,
    depth: u32,
    children: Vec<ProtoNode>,
}

/// Assemble a bundle from a normalized intent.
pub fn assemble(intent: &NormalizedIntent) -> PacklineResult<AssembleReport> {
    let mut notes = Vec::new();

    let mut root = ProtoNode {
        goal: intent.goal.clone(),
        constraints: intent.constraints.clone(),
        depth: 0,
        children: Vec::new(),
    };
    decompose(&mut root, &mut notes);

    let mut terminals: Vec<ContextNode> = Vec::new();
    let mut max_depth = 0;
    let root_node = finalize(&root, &mut terminals, &mut max_depth)?;

    // A childless root is its own terminal frontier.
    if terminals.is_empty() {
        terminals.push(root_node.clone());
    }
    stable_sort_by_key(&mut terminals, |n| n.id.clone());

    let outputs = propose_outputs(&terminals)?;

    let mut questions: Vec<Question> = Vec::new();
    collect_questions(&root_node, &terminals, &mut questions);
    sort_questions(&mut questions);

    let stats = compute_stats(&terminals, &questions, max_depth);

    let mut bundle = Bundle {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        id: String::new(),
        root_node,
        terminal_nodes: terminals,
        outputs,
        unresolved_questions: questions,
        stats,
    };
    rebuild_bundle_id(&mut bundle)?;

    Ok(AssembleReport { bundle, notes })
}

/// Recompute a bundle's content-derived id from its body.
///
/// Needed whenever a caller edits bundle content (the kernel strips outputs
/// for CLARIFY results).
pub fn rebuild_bundle_id(bundle: &mut Bundle) -> PacklineResult<()> {
    bundle.id = format!(
        "{}{}",
        id_prefix::BUNDLE,
        short_hash16(&body_without_ids(bundle)?)?
    );
    Ok(())
}

fn body_without_ids<T: serde::Serialize>(entity: &T) -> PacklineResult<Value> {
    let mut v = serde_json::to_value(entity)
        .map_err(|e| crate::PacklineError::serialization(e.to_string()))?;
    if let Some(obj) = v.as_object_mut() {
        obj.remove("id");
        obj.remove("parent_id");
    }
    Ok(v)
}

fn decompose(node: &mut ProtoNode, notes: &mut Vec<AssembleNote>) {
    if node.depth >= MAX_DEPTH {
        notes.push(AssembleNote {
            code: "assemble.depth_bound".to_string(),
            message: format!("decomposition stopped at depth {MAX_DEPTH}"),
        });
        return;
    }

    let contradictions = find_contradictions(&node.constraints);
    if let Some((a, b)) = contradictions.first() {
        let (side_a, side_b) = split_by_sides(&node.constraints, a, b);
        if !side_a.is_empty() && !side_b.is_empty() {
            notes.push(AssembleNote {
                code: "assemble.split.contradiction".to_string(),
                message: format!("split on {a}/{b}"),
            });
            node.children = vec![
                ProtoNode {
                    goal: format!("{} (option {a})", node.goal),
                    constraints: side_a,
                    depth: node.depth + 1,
                    children: Vec::new(),
                },
                ProtoNode {
                    goal: format!("{} (option {b})", node.goal),
                    constraints: side_b,
                    depth: node.depth + 1,
                    children: Vec::new(),
                },
            ];
            for c in &mut node.children {
                decompose(c, notes);
            }
            return;
        }
    }

    if node.constraints.len() >= FANOUT_THRESHOLD {
        // Constraints are sorted, so halving is deterministic.
        let mid = node.constraints.len().div_ceil(2);
        notes.push(AssembleNote {
            code: "assemble.split.fanout".to_string(),
            message: format!("split {} constraints into halves", node.constraints.len()),
        });
        node.children = vec![
            ProtoNode {
                goal: format!("{} (part 1)", node.goal),
                constraints: node.constraints[..mid].to_vec(),
                depth: node.depth + 1,
                children: Vec::new(),
            },
            ProtoNode {
                goal: format!("{} (part 2)", node.goal),
                constraints: node.constraints[mid..].to_vec(),
                depth: node.depth + 1,
                children: Vec::new(),
            },
        ];
        for c in &mut node.children {
            decompose(c, notes);
        }
    }
}

fn split_by_sides(constraints: &[String], a: &str, b: &str) -> (Vec<String>, Vec<String>) {
    let mut side_a = Vec::new();
    let mut side_b = Vec::new();
    for c in constraints {
        let lower = c.to_lowercase();
        if lower.contains(b) {
            side_b.push(c.clone());
        } else if lower.contains(a) {
            side_a.push(c.clone());
        } else {
            // Neutral constraints travel with the first side.
            side_a.push(c.clone());
        }
    }
    (side_a, side_b)
}

/// Finalize a proto node bottom-up: children first, then this node's
/// questions, signals, and id. Leaves are appended to `terminals`.
fn finalize(
    node: &ProtoNode,
    terminals: &mut Vec<ContextNode>,
    max_depth: &mut u32,
) -> PacklineResult<ContextNode> {
    *max_depth = (*max_depth).max(node.depth);

    let mut child_nodes = Vec::with_capacity(node.children.len());
    for c in &node.children {
        child_nodes.push(finalize(c, terminals, max_depth)?);
    }
    let mut child_ids: Vec<String> = child_nodes.iter().map(|c| c.id.clone()).collect();
    child_ids.sort();

    let entropy = entropy_signal(&node.goal, &node.constraints);
    let density = density_signal(&node.constraints);
    let questions = build_questions(&node.goal, &node.constraints, entropy.entropy_score)?;

    let mut ctx = ContextNode {
        id: String::new(),
        parent_id: None,
        goal: node.goal.clone(),
        constraints: node.constraints.clone(),
        children: child_ids,
        unresolved_questions: questions,
        entropy,
        density,
    };
    ctx.id = format!("{}{}", id_prefix::NODE, short_hash16(&body_without_ids(&ctx)?)?);

    // Parent ids are assigned after the parent's id exists; only terminals
    // are materialized in the bundle, so only their copies need updating.
    for child in &child_nodes {
        if child.children.is_empty() {
            if let Some(t) = terminals.iter_mut().find(|t| t.id == child.id) {
                t.parent_id = Some(ctx.id.clone());
            }
        }
    }

    if node.children.is_empty() && node.depth > 0 {
        terminals.push(ctx.clone());
    }
    Ok(ctx)
}

fn build_questions(
    goal: &str,
    constraints: &[String],
    entropy_score: Score,
) -> PacklineResult<Vec<Question>> {
    let mut questions = Vec::new();

    for (a, b) in find_contradictions(constraints) {
        let mut options = vec![a.to_string(), b.to_string()];
        options.sort();
        questions.push(make_question(
            format!("Should this be {a} or {b}?"),
            format!("constraints require both {a} and {b}"),
            gain(25, entropy_score),
            PRIORITY_CONTRADICTION,
            Some(options),
        )?);
    }

    for token in find_placeholders(goal) {
        questions.push(make_question(
            format!("What should replace \"{token}\" in the goal?"),
            format!("goal contains unresolved placeholder {token}"),
            gain(15, entropy_score),
            PRIORITY_GOAL_PLACEHOLDER,
            None,
        )?);
    }

    let mut constraint_tokens: Vec<&'static str> = Vec::new();
    for c in constraints {
        for token in find_placeholders(c) {
            if !constraint_tokens.contains(&token) {
                constraint_tokens.push(token);
            }
        }
    }
    for token in constraint_tokens {
        questions.push(make_question(
            format!("What should replace \"{token}\" in the constraints?"),
            format!("constraint contains unresolved placeholder {token}"),
            gain(15, entropy_score),
            PRIORITY_CONSTRAINT_PLACEHOLDER,
            None,
        )?);
    }

    sort_questions(&mut questions);
    Ok(questions)
}

/// Expected entropy reduction, clamped to the entropy actually present.
fn gain(rule_gain: Score, entropy_score: Score) -> Score {
    rule_gain.min(entropy_score)
}

fn make_question(
    text: String,
    why_needed: String,
    information_gain: Score,
    priority: Score,
    options: Option<Vec<String>>,
) -> PacklineResult<Question> {
    let mut q = Question {
        id: String::new(),
        text,
        why_needed,
        information_gain,
        priority,
        options,
    };
    q.id = format!(
        "{}{}",
        id_prefix::QUESTION,
        short_hash16(&body_without_ids(&q)?)?
    );
    Ok(q)
}

/// Questions sort by (priority desc, id asc).
pub fn sort_questions(questions: &mut [Question]) {
    questions.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn collect_questions(
    root: &ContextNode,
    terminals: &[ContextNode],
    out: &mut Vec<Question>,
) {
    let mut push_unique = |q: &Question, out: &mut Vec<Question>| {
        if !out.iter().any(|e| e.id == q.id) {
            out.push(q.clone());
        }
    };
    for q in &root.unresolved_questions {
        push_unique(q, out);
    }
    for t in terminals {
        for q in &t.unresolved_questions {
            push_unique(q, out);
        }
    }
}

fn propose_outputs(terminals: &[ContextNode]) -> PacklineResult<Vec<Output>> {
    let mut used_paths: Vec<String> = Vec::new();
    let mut outputs = Vec::with_capacity(terminals.len());

    // Terminals are already sorted by id, so path dedup is deterministic.
    for node in terminals {
        let seed = node
            .constraints
            .iter()
            .find(|c| crate::metrics::is_concrete(c))
            .map(|c| c.as_str())
            .unwrap_or(&node.goal);
        let base = slug(seed);
        let mut path = format!("src/{base}.md");
        let mut n = 1;
        while used_paths.contains(&path) {
            n += 1;
            path = format!("src/{base}-{n}.md");
        }
        used_paths.push(path.clone());

        let confidence: Score = 100 - node.entropy.entropy_score.min(100);
        let mut output = Output {
            id: String::new(),
            path,
            source_constraints: node.constraints.clone(),
            confidence,
        };
        output.id = format!(
            "{}{}",
            id_prefix::OUTPUT,
            short_hash16(&body_without_ids(&output)?)?
        );
        outputs.push(output);
    }

    stable_sort_by_key(&mut outputs, |o| o.path.clone());
    Ok(outputs)
}

/// Reduce text to a filesystem-safe slug: lowercase alphanumeric runs joined
/// by `-`, capped at 40 chars, `notes` when nothing survives.
fn slug(text: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for c in text.chars() {
        if out.len() >= 39 {
            break;
        }
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "notes".to_string()
    } else {
        trimmed
    }
}

fn compute_stats(terminals: &[ContextNode], questions: &[Question], max_depth: u32) -> BundleStats {
    let terminal_count = terminals.len() as u32;
    let avg = |sum: u32| -> Score {
        if terminal_count == 0 {
            0
        } else {
            ((sum + terminal_count / 2) / terminal_count).min(100) as Score
        }
    };
    let entropy_sum: u32 = terminals.iter().map(|t| t.entropy.entropy_score as u32).sum();
    let density_sum: u32 = terminals.iter().map(|t| t.density.density_score as u32).sum();
    BundleStats {
        max_depth,
        terminal_count,
        question_count: questions.len() as u32,
        avg_terminal_entropy: avg(entropy_sum),
        avg_terminal_density: avg(density_sum),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn intent(goal: &str, constraints: &[&str]) -> NormalizedIntent {
        NormalizedIntent {
            goal: crate::determinism::normalize::normalize_string(goal),
            constraints: crate::determinism::normalize::normalize_constraints(
                constraints.iter().copied(),
            ),
            context: Value::Object(Map::new()),
        }
    }

    #[test]
    fn simple_intent_yields_single_terminal() {
        let rep = assemble(&intent(
            "Build a user authentication system",
            &["Must use JWT", "Session timeout 24h"],
        ))
        .unwrap();
        let b = &rep.bundle;
        assert_eq!(b.schema_version, "v1");
        assert!(b.id.starts_with("bundle_"));
        assert_eq!(b.terminal_nodes.len(), 1);
        assert_eq!(b.terminal_nodes[0].id, b.root_node.id);
        assert_eq!(b.outputs.len(), 1);
        assert!(b.outputs[0].path.starts_with("src/"));
        assert_eq!(b.stats.max_depth, 0);
    }

    #[test]
    fn assembly_is_deterministic() {
        let i = intent("Build an API", &["Must use JWT", "REST endpoints", "TODO pick db"]);
        let a = assemble(&i).unwrap().bundle;
        let b = assemble(&i).unwrap().bundle;
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn contradiction_splits_into_two_terminals() {
        let rep = assemble(&intent(
            "Build an API",
            &["Must be synchronous", "Must be asynchronous"],
        ))
        .unwrap();
        let b = &rep.bundle;
        assert_eq!(b.root_node.children.len(), 2);
        assert_eq!(b.terminal_nodes.len(), 2);
        assert!(b.root_node.entropy.contradiction_count >= 1);
        assert!(b.root_node.entropy.entropy_score >= 25);
        // Contradiction question carries both options, sorted.
        let q = b
            .unresolved_questions
            .iter()
            .find(|q| q.options.is_some())
            .unwrap();
        assert_eq!(q.options.as_ref().unwrap(), &["async", "sync"]);
        assert_eq!(q.priority, 90);
    }

    #[test]
    fn terminals_sorted_by_id_and_outputs_by_path() {
        let rep = assemble(&intent(
            "Build a platform",
            &["Use postgres", "Use redis", "Expose http API", "Ship docker image"],
        ))
        .unwrap();
        let b = &rep.bundle;
        let ids: Vec<&String> = b.terminal_nodes.iter().map(|t| &t.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        let paths: Vec<&String> = b.outputs.iter().map(|o| &o.path).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn questions_sorted_priority_desc_then_id() {
        let rep = assemble(&intent(
            "Build TODO service",
            &["Must be synchronous", "Must be asynchronous", "db is TBD"],
        ))
        .unwrap();
        let qs = &rep.bundle.unresolved_questions;
        assert!(qs.len() >= 2);
        for w in qs.windows(2) {
            assert!(
                w[0].priority > w[1].priority
                    || (w[0].priority == w[1].priority && w[0].id < w[1].id)
            );
        }
    }

    #[test]
    fn terminal_parent_ids_point_at_root() {
        let rep = assemble(&intent(
            "Build an API",
            &["Must be synchronous", "Must be asynchronous"],
        ))
        .unwrap();
        let b = &rep.bundle;
        for t in &b.terminal_nodes {
            assert_eq!(t.parent_id.as_ref(), Some(&b.root_node.id));
        }
        assert_eq!(b.root_node.parent_id, None);
    }

    #[test]
    fn large_goal_does_not_panic() {
        let goal = "a".repeat(100_000);
        let rep = assemble(&intent(&goal, &[])).unwrap();
        assert!(rep.bundle.id.starts_with("bundle_"));
    }

    #[test]
    fn slug_examples() {
        assert_eq!(slug("Must use JWT"), "must-use-jwt");
        assert_eq!(slug("  ***  "), "notes");
        assert!(slug(&"x".repeat(100)).len() <= 40);
    }
}
