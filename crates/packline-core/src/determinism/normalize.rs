//! Intent normalization.
//!
//! Deterministic normalization applied before hashing or assembly.
//!
//! Rules:
//! - strings: Unicode NFC, ASCII whitespace runs collapsed to one space, trimmed
//! - constraints: per-entry string rules, empties dropped, first-occurrence
//!   dedup, lexicographic sort
//! - context: object keys sorted recursively, array order preserved
//!
//! Zero-width characters are preserved: they are content, and bytewise
//! comparison already orders them deterministically.
//!
//! Every normalized output is a fixpoint of its own normalizer.

use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;

use crate::errors::{PacklineError, PacklineResult};
use crate::model::v1::NormalizedIntent;

/// Stable refusal reason for an absent or empty goal.
pub const EMPTY_GOAL: &str = "EMPTY_GOAL";

/// Normalize a single string: NFC, collapse ASCII whitespace runs, trim.
pub fn normalize_string(s: &str) -> String {
    let nfc: String = s.nfc().collect();
    let mut out = String::with_capacity(nfc.len());
    let mut in_ws = false;
    for c in nfc.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000b}' | '\u{000c}') {
            in_ws = true;
            continue;
        }
        if in_ws && !out.is_empty() {
            out.push(' ');
        }
        in_ws = false;
        out.push(c);
    }
    out
}

/// Normalize one constraint entry.
pub fn normalize_constraint(s: &str) -> String {
    normalize_string(s)
}

/// Normalize a constraint list: map, drop empties, dedup keeping the first
/// occurrence, sort lexicographically.
pub fn normalize_constraints<I, S>(constraints: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for c in constraints {
        let n = normalize_constraint(c.as_ref());
        if n.is_empty() {
            continue;
        }
        if seen.insert(n.clone()) {
            out.push(n);
        }
    }
    out.sort();
    out
}

/// Recursively sort object keys in a context value. Array order is preserved.
pub fn normalize_context(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), normalize_context(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_context).collect()),
        other => other.clone(),
    }
}

/// Normalize a raw intent value into a [`NormalizedIntent`].
///
/// The input may be any JSON value; shape errors and an empty goal are
/// reported as `InvalidArgument` with the stable `EMPTY_GOAL` marker where
/// applicable. The kernel maps these to `REFUSE`.
pub fn normalize_intent(raw: &Value) -> PacklineResult<NormalizedIntent> {
    let obj = raw
        .as_object()
        .ok_or_else(|| PacklineError::invalid_argument("intent must be a JSON object"))?;

    let goal_raw = match obj.get("goal") {
        Some(Value::String(s)) => s.as_str(),
        Some(_) => {
            return Err(PacklineError::invalid_argument(
                "intent.goal must be a string",
            ))
        }
        None => return Err(PacklineError::invalid_argument(EMPTY_GOAL)),
    };

    let goal = normalize_string(goal_raw);
    if goal.is_empty() {
        return Err(PacklineError::invalid_argument(EMPTY_GOAL));
    }

    let constraints = match obj.get("constraints") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut raw_entries = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => raw_entries.push(s.as_str()),
                    _ => {
                        return Err(PacklineError::invalid_argument(
                            "intent.constraints entries must be strings",
                        ))
                    }
                }
            }
            normalize_constraints(raw_entries)
        }
        Some(_) => {
            return Err(PacklineError::invalid_argument(
                "intent.constraints must be an array",
            ))
        }
    };

    let context = match obj.get("context") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(v @ Value::Object(_)) => normalize_context(v),
        Some(_) => {
            return Err(PacklineError::invalid_argument(
                "intent.context must be an object",
            ))
        }
    };

    Ok(NormalizedIntent {
        goal,
        constraints,
        context,
    })
}
