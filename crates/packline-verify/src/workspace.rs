//! WORKSPACE_SPEC verifier (WS1..WS14).
//!
//! A workspace manifest describes a snapshot of files and hashed
//! environment values a run was allowed to observe.

use serde_json::Value;

use crate::paths::check_relative_path;
use crate::violation::{Checker, SpecReport};
use crate::RULE_SCHEMA;
use packline_core::config::LimitsConfig;
use packline_core::determinism::canonical_json::is_content_hash;

pub const SPEC_NAME: &str = "WORKSPACE_SPEC";
pub const SCHEMA_VERSION: &str = "v1";

/// Verify a raw value against WORKSPACE_SPEC.
pub fn verify_workspace(value: &Value, limits: &LimitsConfig) -> SpecReport {
    let mut c = Checker::new();

    let Some(obj) = value.as_object() else {
        c.push(RULE_SCHEMA, "workspace manifest must be a JSON object");
        return c.finish(SPEC_NAME);
    };

    match obj.get("workspace_schema_version").and_then(Value::as_str) {
        Some(SCHEMA_VERSION) => {}
        Some(other) => c.push(
            "WS1",
            format!("workspace_schema_version must be {SCHEMA_VERSION}, got {other}"),
        ),
        None => c.push("WS1", "workspace_schema_version missing"),
    }

    match obj.get("root").and_then(Value::as_str) {
        Some(".") => {}
        Some(root) => {
            if let Err(reason) = check_relative_path(root) {
                c.push_at("WS2", root, reason);
            }
        }
        None => c.push("WS2", "root missing"),
    }

    let mut declared_total: Option<u64> = obj.get("total_bytes").and_then(Value::as_u64);
    if declared_total.is_none() && obj.get("total_bytes").is_some() {
        c.push("WS8", "total_bytes must be a non-negative integer");
        declared_total = None;
    }

    let mut computed_total: u64 = 0;
    match obj.get("files") {
        Some(Value::Array(files)) => {
            let mut paths: Vec<&str> = Vec::new();
            for (i, f) in files.iter().enumerate() {
                let Some(fo) = f.as_object() else {
                    c.push(RULE_SCHEMA, format!("files[{i}] must be an object"));
                    continue;
                };
                let path = fo.get("path").and_then(Value::as_str).unwrap_or("");
                if path.is_empty() {
                    c.push("WS5", format!("files[{i}] path missing"));
                } else {
                    if let Err(reason) = check_relative_path(path) {
                        c.push_at("WS5", path, reason);
                    }
                    if paths.contains(&path) {
                        c.push_at("WS4", path, "duplicate file path");
                    }
                    paths.push(path);
                }
                match fo.get("sha256").and_then(Value::as_str) {
                    Some(h) if is_content_hash(h) => {}
                    Some(_) => c.push_at("WS6", path, "file sha256 is malformed"),
                    None => c.push_at("WS6", path, "file sha256 missing"),
                }
                match fo.get("size_bytes").and_then(Value::as_u64) {
                    Some(n) => {
                        computed_total += n;
                        if n > limits.max_workspace_file_bytes {
                            c.push_at(
                                "WS7",
                                path,
                                format!(
                                    "file size {n} exceeds ceiling {}",
                                    limits.max_workspace_file_bytes
                                ),
                            );
                        }
                    }
                    None => c.push_at("WS7", path, "size_bytes missing or negative"),
                }
            }
            let mut sorted = paths.clone();
            sorted.sort();
            if paths != sorted {
                c.push("WS3", "files are not sorted by path");
            }
            if files.len() > limits.max_workspace_files {
                c.push(
                    "WS13",
                    format!(
                        "{} files exceed the ceiling of {}",
                        files.len(),
                        limits.max_workspace_files
                    ),
                );
            }
        }
        Some(_) => c.push(RULE_SCHEMA, "files must be an array"),
        None => c.push(RULE_SCHEMA, "files missing"),
    }

    if let Some(declared) = declared_total {
        if declared != computed_total {
            c.push(
                "WS8",
                format!("total_bytes {declared} does not match file sum {computed_total}"),
            );
        }
    } else if obj.get("total_bytes").is_none() {
        c.push("WS8", "total_bytes missing");
    }
    if computed_total > limits.max_pack_bytes {
        c.push(
            "WS14",
            format!("workspace total {computed_total} exceeds the size ceiling"),
        );
    }

    if let Some(env) = obj.get("env") {
        let Some(env_obj) = env.as_object() else {
            c.push(RULE_SCHEMA, "env must be an object");
            return c.finish(SPEC_NAME);
        };
        let allowlist: Vec<&str> = match env_obj.get("allowlist") {
            Some(Value::Array(xs)) => xs.iter().filter_map(Value::as_str).collect(),
            _ => {
                c.push("WS9", "env.allowlist missing or not an array");
                Vec::new()
            }
        };
        if !allowlist.windows(2).all(|w| w[0] <= w[1]) {
            c.push("WS9", "env.allowlist is not sorted lexicographically");
        }
        for name in &allowlist {
            if name.is_empty() || name.contains('=') {
                c.push_at("WS10", *name, "allowlist entry is malformed");
            }
        }
        if let Some(Value::Object(hashed)) = env_obj.get("hashed") {
            for (name, digest) in hashed {
                if !allowlist.contains(&name.as_str()) {
                    c.push_at("WS11", name, "hashed variable is not in the allowlist");
                }
                match digest.as_str() {
                    Some(h) if is_content_hash(h) => {}
                    _ => c.push_at("WS12", name, "hashed value is not a content hash"),
                }
            }
        }
    }

    c.finish(SPEC_NAME)
}
