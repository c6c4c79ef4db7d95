//! Entropy and density scoring.
//!
//! Both scores are pure functions of a node's normalized goal and
//! constraints. The lexicons below are configuration content: they are kept
//! as fixed tables and must not be re-derived or reordered, because question
//! generation and scores are content-addressed downstream.

use crate::model::v1::{DensitySignal, EntropySignal, Score};

/// Antonym templates. A contradiction is counted for a template when two
/// different constraints match opposite sides.
///
/// Matching is substring-based on the lowercase form. For pairs where one
/// side is a textual substring of the other (sync/async, sql/nosql), the
/// short side only matches when the long side is absent.
pub const ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("sync", "async"),
    ("public", "private"),
    ("sql", "nosql"),
    ("rest", "graphql"),
    ("stateless", "stateful"),
    ("online", "offline"),
    ("required", "optional"),
    ("real-time", "batch"),
    ("single-tenant", "multi-tenant"),
    ("open-source", "closed-source"),
];

/// Placeholder tokens, longest first so that bracketed forms consume their
/// inner token before the bare form is tried.
pub const PLACEHOLDER_TOKENS: &[&str] = &[
    "<<INSERT HERE>>",
    "TO BE DETERMINED",
    "NEEDS_WORK",
    "PLACEHOLDER",
    "[TBD]",
    "(TBD)",
    "<TBD>",
    "{TBD}",
    "FIXME",
    "TODO",
    "TBD",
    "XXX",
    "???",
    "...",
];

/// Concrete-noun lexicon: technologies, metrics, formats, identifiers.
pub const CONCRETE_NOUNS: &[&str] = &[
    "api", "byte", "cache", "csv", "database", "docker", "endpoint", "grpc",
    "http", "https", "index", "json", "jwt", "kb", "kubernetes", "latency",
    "limit", "mb", "ms", "oauth", "port", "postgres", "queue", "rate",
    "redis", "retry", "s3", "schema", "seconds", "sha-256", "sql", "timeout",
    "throughput", "tls", "token", "url", "utf-8", "uuid", "version",
    "webhook", "yaml",
];

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Count placeholder occurrences in `text`.
///
/// Case-insensitive; word-boundary aware, so "TodoList" does not match TODO.
/// Each region of text is consumed by at most one token.
pub fn count_unresolved_refs(text: &str) -> u32 {
    scan_placeholders(text).len() as u32
}

/// Distinct placeholder tokens present in `text`, in table order.
pub fn find_placeholders(text: &str) -> Vec<&'static str> {
    let hits = scan_placeholders(text);
    let mut out = Vec::new();
    for tok in PLACEHOLDER_TOKENS {
        if hits.iter().any(|(t, _)| t == tok) && !out.contains(tok) {
            out.push(*tok);
        }
    }
    out
}

fn scan_placeholders(text: &str) -> Vec<(&'static str, usize)> {
    let hay = text.to_ascii_uppercase();
    let hay_bytes = hay.as_bytes();
    let mut taken = vec![false; hay_bytes.len()];
    let mut hits = Vec::new();

    for token in PLACEHOLDER_TOKENS {
        let tok_bytes = token.as_bytes();
        let mut start = 0;
        while let Some(rel) = hay[start..].find(token) {
            let at = start + rel;
            let end = at + tok_bytes.len();
            start = at + 1;

            if taken[at..end].iter().any(|t| *t) {
                continue;
            }
            // Boundary checks only where the token edge is a word byte.
            if is_word_byte(tok_bytes[0]) && at > 0 && is_word_byte(hay_bytes[at - 1]) {
                continue;
            }
            if is_word_byte(tok_bytes[tok_bytes.len() - 1])
                && end < hay_bytes.len()
                && is_word_byte(hay_bytes[end])
            {
                continue;
            }
            taken[at..end].iter_mut().for_each(|t| *t = true);
            hits.push((*token, at));
            start = end;
        }
    }
    hits
}

fn matches_side(constraint_lower: &str, side: &str, other: &str) -> bool {
    if !constraint_lower.contains(side) {
        return false;
    }
    // Where one side is a substring of the other, the short side only counts
    // when the long side is absent ("asynchronous" must not match "sync").
    if other.contains(side) && constraint_lower.contains(other) {
        return false;
    }
    true
}

/// Antonym templates for which two different constraints take opposite sides.
pub fn find_contradictions(constraints: &[String]) -> Vec<(&'static str, &'static str)> {
    let lowered: Vec<String> = constraints.iter().map(|c| c.to_lowercase()).collect();
    let mut out = Vec::new();
    for (a, b) in ANTONYM_PAIRS {
        let has_pair = lowered.iter().enumerate().any(|(i, ci)| {
            matches_side(ci, a, b)
                && lowered
                    .iter()
                    .enumerate()
                    .any(|(j, cj)| j != i && matches_side(cj, b, a))
        });
        if has_pair {
            out.push((*a, *b));
        }
    }
    out
}

/// True if a constraint names at least one concrete noun.
pub fn is_concrete(constraint: &str) -> bool {
    let lower = constraint.to_lowercase();
    let bytes = lower.as_bytes();
    CONCRETE_NOUNS.iter().any(|noun| {
        let mut start = 0;
        while let Some(rel) = lower[start..].find(noun) {
            let at = start + rel;
            let end = at + noun.len();
            let left_ok = at == 0 || !is_word_byte(bytes[at - 1]);
            let right_ok = end == bytes.len() || !is_word_byte(bytes[end]);
            if left_ok && right_ok {
                return true;
            }
            start = at + 1;
        }
        false
    })
}

fn clamp_score(v: u32) -> Score {
    v.min(100) as Score
}

/// Compute the entropy signal for a node.
///
/// `entropy_score = min(100, 25 * contradictions + 15 * unresolved_refs)`.
/// Monotone non-decreasing in both inputs.
pub fn entropy_signal(goal: &str, constraints: &[String]) -> EntropySignal {
    let contradiction_count = find_contradictions(constraints).len() as u32;
    let mut unresolved_refs = count_unresolved_refs(goal);
    for c in constraints {
        unresolved_refs += count_unresolved_refs(c);
    }
    EntropySignal {
        entropy_score: clamp_score(25 * contradiction_count + 15 * unresolved_refs),
        contradiction_count,
        unresolved_refs,
    }
}

/// Compute the density signal for a node.
///
/// `density_score = round(100 * concrete / total)`, 0 when there are no
/// constraints. Monotone non-decreasing in the concrete ratio.
pub fn density_signal(constraints: &[String]) -> DensitySignal {
    let total_constraints = constraints.len() as u32;
    let concrete_constraints = constraints.iter().filter(|c| is_concrete(c)).count() as u32;
    let density_score = if total_constraints == 0 {
        0
    } else {
        ((100 * concrete_constraints + total_constraints / 2) / total_constraints).min(100) as Score
    };
    DensitySignal {
        density_score,
        concrete_constraints,
        total_constraints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sync_async_pair_detected() {
        let cs = strings(&["Must be synchronous", "Must be asynchronous"]);
        let found = find_contradictions(&cs);
        assert_eq!(found, vec![("sync", "async")]);
        let e = entropy_signal("Build an API", &cs);
        assert_eq!(e.contradiction_count, 1);
        assert!(e.entropy_score >= 25);
    }

    #[test]
    fn async_alone_is_not_a_contradiction() {
        let cs = strings(&["Must be asynchronous", "Must retry on failure"]);
        assert!(find_contradictions(&cs).is_empty());
    }

    #[test]
    fn sql_nosql_containment_handled() {
        let cs = strings(&["Use SQL storage", "Use NoSQL storage"]);
        assert_eq!(find_contradictions(&cs), vec![("sql", "nosql")]);
        let only_nosql = strings(&["Use NoSQL storage", "Cache reads"]);
        assert!(find_contradictions(&only_nosql).is_empty());
    }

    #[test]
    fn placeholders_word_boundary() {
        assert_eq!(count_unresolved_refs("TODO: decide"), 1);
        assert_eq!(count_unresolved_refs("TodoList renders items"), 0);
        assert_eq!(count_unresolved_refs("field is TBD"), 1);
        assert_eq!(count_unresolved_refs("subtbd"), 0);
    }

    #[test]
    fn bracketed_tbd_counts_once() {
        assert_eq!(count_unresolved_refs("value [TBD] here"), 1);
        assert_eq!(find_placeholders("value [TBD] here"), vec!["[TBD]"]);
    }

    #[test]
    fn symbol_placeholders() {
        assert_eq!(count_unresolved_refs("wait for ???"), 1);
        assert_eq!(count_unresolved_refs("and then..."), 1);
        assert_eq!(count_unresolved_refs("TO BE DETERMINED later"), 1);
        assert_eq!(count_unresolved_refs("<<INSERT HERE>>"), 1);
    }

    #[test]
    fn entropy_monotone_in_refs() {
        let base = entropy_signal("a goal", &strings(&["c1"]));
        let more = entropy_signal("a goal TODO", &strings(&["c1 FIXME"]));
        assert!(more.entropy_score >= base.entropy_score);
        assert_eq!(more.unresolved_refs, 2);
    }

    #[test]
    fn density_ratio() {
        let d = density_signal(&strings(&["Must use JWT", "Session timeout 24h"]));
        assert_eq!(d.concrete_constraints, 2);
        assert_eq!(d.density_score, 100);

        let none = density_signal(&[]);
        assert_eq!(none.density_score, 0);

        let half = density_signal(&strings(&["Must use JWT", "be nice"]));
        assert_eq!(half.density_score, 50);
    }

    #[test]
    fn concrete_is_boundary_aware() {
        assert!(is_concrete("expose an API"));
        assert!(!is_concrete("rapid iteration"));
        assert!(is_concrete("encode as UTF-8"));
    }
}
