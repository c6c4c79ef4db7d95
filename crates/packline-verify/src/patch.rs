//! PATCH_SPEC verifier (PS1..PS10).

use serde_json::Value;

use crate::paths::check_relative_path;
use crate::violation::{Checker, SpecReport};
use crate::RULE_SCHEMA;
use packline_core::determinism::canonical_json::is_content_hash;

pub const SPEC_NAME: &str = "PATCH_SPEC";
pub const SCHEMA_VERSION: &str = "v1";

/// Verify a raw value against PATCH_SPEC.
pub fn verify_patch(value: &Value) -> SpecReport {
    let mut c = Checker::new();

    let Some(obj) = value.as_object() else {
        c.push(RULE_SCHEMA, "patch must be a JSON object");
        return c.finish(SPEC_NAME);
    };

    match obj.get("patch_schema_version").and_then(Value::as_str) {
        Some(SCHEMA_VERSION) => {}
        Some(other) => c.push(
            "PS1",
            format!("patch_schema_version must be {SCHEMA_VERSION}, got {other}"),
        ),
        None => c.push("PS1", "patch_schema_version missing"),
    }

    match obj.get("source_proposal_id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {}
        Some(_) => c.push("PS2", "source_proposal_id is empty"),
        None => c.push("PS2", "source_proposal_id missing"),
    }

    match obj.get("source_proposal_hash").and_then(Value::as_str) {
        Some(h) if is_content_hash(h) => {}
        Some(h) => c.push("PS3", format!("source_proposal_hash is malformed: {h}")),
        None => c.push("PS3", "source_proposal_hash missing"),
    }

    let operations = match obj.get("operations") {
        Some(Value::Array(ops)) => ops.as_slice(),
        Some(_) => {
            c.push(RULE_SCHEMA, "operations must be an array");
            return c.finish(SPEC_NAME);
        }
        None => {
            c.push(RULE_SCHEMA, "operations missing");
            return c.finish(SPEC_NAME);
        }
    };

    let mut keys: Vec<(u64, String)> = Vec::with_capacity(operations.len());
    let mut seen_paths: Vec<&str> = Vec::new();
    let mut size_sum: u64 = 0;

    for (i, op) in operations.iter().enumerate() {
        let Some(op_obj) = op.as_object() else {
            c.push(RULE_SCHEMA, format!("operations[{i}] must be an object"));
            continue;
        };

        let path = op_obj.get("path").and_then(Value::as_str);
        let at = path.unwrap_or("").to_string();

        let kind = match op_obj.get("op").and_then(Value::as_str) {
            Some(k @ ("create" | "modify" | "delete")) => Some(k),
            Some(other) => {
                c.push_at("PS7", &at, format!("unknown op kind: {other}"));
                None
            }
            None => {
                c.push_at("PS7", &at, "op kind missing");
                None
            }
        };

        match path {
            Some(p) => {
                if let Err(reason) = check_relative_path(p) {
                    c.push_at("PS6", p, reason);
                }
                if seen_paths.contains(&p) {
                    c.push_at("PS5", p, "duplicate operation path");
                } else {
                    seen_paths.push(p);
                }
            }
            None => c.push("PS6", format!("operations[{i}] path missing")),
        }

        let order = match op_obj.get("order").and_then(Value::as_u64) {
            Some(o) => o,
            None => {
                c.push_at("PS4", &at, "order missing or not a non-negative integer");
                0
            }
        };
        keys.push((order, at.clone()));

        let content = op_obj.get("content");
        match kind {
            Some("create") | Some("modify") => {
                match content.and_then(Value::as_str) {
                    Some(body) => {
                        if body.contains('\0') {
                            c.push_at("PS9", &at, "content contains NUL byte");
                        }
                        let declared = op_obj.get("size_bytes").and_then(Value::as_u64);
                        match declared {
                            Some(n) if n == body.len() as u64 => size_sum += n,
                            Some(n) => {
                                c.push_at(
                                    "PS8",
                                    &at,
                                    format!(
                                        "size_bytes {n} does not match content length {}",
                                        body.len()
                                    ),
                                );
                                size_sum += n;
                            }
                            None => c.push_at("PS8", &at, "size_bytes missing"),
                        }
                    }
                    None => c.push_at("PS7", &at, "create/modify requires string content"),
                }
            }
            Some("delete") => {
                if content.is_some() {
                    c.push_at("PS7", &at, "delete must not carry content");
                }
                if op_obj.get("size_bytes").is_some() {
                    c.push_at("PS7", &at, "delete must not carry size_bytes");
                }
            }
            _ => {}
        }
    }

    if !keys.windows(2).all(|w| w[0] <= w[1]) {
        c.push("PS4", "operations are not sorted by (order, path)");
    }

    match obj.get("total_bytes").and_then(Value::as_u64) {
        Some(t) if t == size_sum => {}
        Some(t) => c.push(
            "PS10",
            format!("total_bytes {t} does not match sum of size_bytes {size_sum}"),
        ),
        None => c.push("PS10", "total_bytes missing"),
    }

    c.finish(SPEC_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_patch() -> Value {
        json!({
            "patch_schema_version": "v1",
            "source_proposal_id": "out_0011223344556677",
            "source_proposal_hash": format!("sha256:{}", "a".repeat(64)),
            "operations": [
                {"op": "delete", "path": "old.txt", "order": 0},
                {"op": "create", "path": "new.txt", "content": "hi", "size_bytes": 2, "order": 1}
            ],
            "total_bytes": 2
        })
    }

    #[test]
    fn valid_patch_passes() {
        let report = verify_patch(&valid_patch());
        assert!(report.ok, "{:?}", report.violations);
    }

    #[test]
    fn non_object_is_schema_violation() {
        let report = verify_patch(&json!(42));
        assert!(!report.ok);
        assert_eq!(report.violations[0].rule_id, "SCHEMA");
    }

    #[test]
    fn duplicate_paths_flagged() {
        let mut p = valid_patch();
        p["operations"][0] = json!({"op": "delete", "path": "new.txt", "order": 0});
        let report = verify_patch(&p);
        assert!(report.violations.iter().any(|v| v.rule_id == "PS5"));
    }

    #[test]
    fn delete_with_content_flagged() {
        let mut p = valid_patch();
        p["operations"][0] = json!({
            "op": "delete", "path": "old.txt", "content": "x", "order": 0
        });
        let report = verify_patch(&p);
        assert!(report.violations.iter().any(|v| v.rule_id == "PS7"));
    }

    #[test]
    fn size_mismatch_flagged() {
        let mut p = valid_patch();
        p["operations"][1]["size_bytes"] = json!(99);
        let report = verify_patch(&p);
        assert!(report.violations.iter().any(|v| v.rule_id == "PS8"));
        assert!(report.violations.iter().any(|v| v.rule_id == "PS10"));
    }

    #[test]
    fn unsorted_operations_flagged() {
        let mut p = valid_patch();
        p["operations"][0]["order"] = json!(5);
        let report = verify_patch(&p);
        assert!(report.violations.iter().any(|v| v.rule_id == "PS4"));
    }

    #[test]
    fn traversal_path_flagged() {
        let mut p = valid_patch();
        p["operations"][0]["path"] = json!("../escape.txt");
        let report = verify_patch(&p);
        assert!(report.violations.iter().any(|v| v.rule_id == "PS6"));
    }

    #[test]
    fn nul_in_content_flagged() {
        let mut p = valid_patch();
        p["operations"][1]["content"] = json!("a\u{0}b");
        p["operations"][1]["size_bytes"] = json!(3);
        p["total_bytes"] = json!(3);
        let report = verify_patch(&p);
        assert!(report.violations.iter().any(|v| v.rule_id == "PS9"));
    }

    #[test]
    fn violations_sorted_by_rule_then_path() {
        let mut p = valid_patch();
        p["operations"][0]["path"] = json!("../b");
        p["operations"][1]["path"] = json!("../a");
        let report = verify_patch(&p);
        let ps6: Vec<&str> = report
            .violations
            .iter()
            .filter(|v| v.rule_id == "PS6")
            .map(|v| v.path.as_deref().unwrap())
            .collect();
        assert_eq!(ps6, ["../a", "../b"]);
    }
}
