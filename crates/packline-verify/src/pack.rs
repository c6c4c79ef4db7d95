//! PACK_SPEC verifier (PK1..PK6): the end-to-end check over a pack
//! directory's contents.
//!
//! The verifier is pure: callers load the directory into a [`PackContents`]
//! map first (the engine crate provides the loader). Checks:
//! - PK1 required files, PK2 unknown names
//! - PK3 canonical round-trip of every file's bytes
//! - PK4 deep per-artifact verification (togglable)
//! - PK5 cross-file reference integrity (togglable)
//! - PK6 total size ceiling

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::violation::{Checker, SpecReport};
use crate::{bundle, ledger, model_io, patch};
use packline_core::config::LimitsConfig;
use packline_core::determinism::canonical_json::{
    canonical_json_line, content_hash, content_hash_bytes,
};
use packline_core::model::v1::{Policy, ResultKind, RunRecord, Violation};

pub const SPEC_NAME: &str = "PACK_SPEC";

/// Files that must exist in every pack. `bundle.json` is additionally
/// required unless the run record says the run was refused.
pub const REQUIRED_FILES: &[&str] = &["run.json"];

/// The complete allowed file set. Anything else is a PK2 violation.
pub const ALLOWED_FILES: &[&str] = &[
    "bundle.json",
    "evidence.json",
    "ledger.jsonl",
    "meta.json",
    "model_io.json",
    "patch.json",
    "policy.json",
    "run.json",
    "runner.json",
];

/// In-memory pack directory contents, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct PackContents {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl PackContents {
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), bytes.into());
    }
}

/// Digest of one pack file. JSON files are identified by the content hash
/// of their canonical value; `ledger.jsonl` by its raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDigest {
    pub name: String,
    pub sha256: String,
}

/// One cross-file reference comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCheck {
    pub source: String,
    pub target: String,
    pub field: String,
    pub expected: String,
    pub computed: String,
    #[serde(rename = "match")]
    pub matches: bool,
}

/// Verification toggles, mirrored by the CLI flags.
#[derive(Debug, Clone)]
pub struct PackVerifyOptions {
    pub deep: bool,
    pub check_refs: bool,
    pub limits: LimitsConfig,
}

impl Default for PackVerifyOptions {
    fn default() -> Self {
        Self {
            deep: true,
            check_refs: true,
            limits: LimitsConfig::default(),
        }
    }
}

/// Composite verification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackVerifyResult {
    pub ok: bool,
    pub files: Vec<FileDigest>,
    pub references: Vec<ReferenceCheck>,
    pub violations: Vec<Violation>,
    pub reports: Vec<SpecReport>,
}

/// Verify a pack's contents.
pub fn verify_pack(contents: &PackContents, opts: &PackVerifyOptions) -> PackVerifyResult {
    let mut c = Checker::new();
    let mut reports: Vec<SpecReport> = Vec::new();
    let mut references: Vec<ReferenceCheck> = Vec::new();

    // PK2 before anything else: unknown names are never parsed.
    for name in contents.files.keys() {
        if !ALLOWED_FILES.contains(&name.as_str()) {
            c.push_at("PK2", name, "file name is not part of the pack manifest");
        }
    }

    // Parse run.json early; PK1's bundle requirement depends on it.
    let run_record: Option<RunRecord> = contents
        .files
        .get("run.json")
        .and_then(|bytes| parse_json_file(bytes))
        .and_then(|v| serde_json::from_value(v).ok());

    for required in REQUIRED_FILES {
        if !contents.files.contains_key(*required) {
            c.push_at("PK1", *required, "required file is missing");
        }
    }
    let refused = run_record
        .as_ref()
        .map(|r| r.result_kind == ResultKind::Refuse)
        .unwrap_or(false);
    if !refused && !contents.files.contains_key("bundle.json") {
        c.push_at("PK1", "bundle.json", "required file is missing");
    }

    // PK3: canonical round-trip per file; also collect digests.
    let mut files: Vec<FileDigest> = Vec::new();
    let mut values: BTreeMap<&str, Value> = BTreeMap::new();
    let mut total_bytes: u64 = 0;
    for (name, bytes) in &contents.files {
        total_bytes += bytes.len() as u64;
        if !ALLOWED_FILES.contains(&name.as_str()) {
            continue;
        }
        if name == "ledger.jsonl" {
            check_canonical_jsonl(&mut c, name, bytes);
            files.push(FileDigest {
                name: name.clone(),
                sha256: content_hash_bytes(bytes),
            });
            continue;
        }
        match parse_json_file(bytes) {
            Some(value) => {
                match canonical_json_line(&value) {
                    Ok(canonical) if &canonical == bytes => {}
                    Ok(_) => c.push_at("PK3", name, "file is not canonical JSON"),
                    Err(e) => c.push_at("PK3", name, format!("file cannot be canonicalized: {e}")),
                }
                if let Ok(h) = content_hash(&value) {
                    files.push(FileDigest {
                        name: name.clone(),
                        sha256: h,
                    });
                }
                values.insert(name.as_str(), value);
            }
            None => c.push_at("PK3", name, "file does not parse as JSON"),
        }
    }

    if total_bytes > opts.limits.max_pack_bytes {
        c.push(
            "PK6",
            format!(
                "pack size {total_bytes} exceeds ceiling {}",
                opts.limits.max_pack_bytes
            ),
        );
    }

    // PK4: deep per-artifact verification.
    if opts.deep {
        if let Some(v) = values.get("bundle.json") {
            reports.push(bundle::verify_bundle(v));
        }
        if let Some(v) = values.get("patch.json") {
            reports.push(patch::verify_patch(v));
        }
        if let Some(v) = values.get("model_io.json") {
            reports.push(model_io::verify_model_io(
                v,
                &model_io::ModelIoOptions {
                    limits: opts.limits.clone(),
                    ..Default::default()
                },
            ));
        }
        if let Some(bytes) = contents.files.get("ledger.jsonl") {
            let text = String::from_utf8_lossy(bytes);
            reports.push(ledger::verify_ledger(&text));
        }
        if values.contains_key("run.json") && run_record.is_none() {
            c.push_at("PK4", "run.json", "run record does not parse");
        }
        if let Some(v) = values.get("policy.json") {
            if serde_json::from_value::<Policy>((*v).clone()).is_err() {
                c.push_at("PK4", "policy.json", "policy does not parse");
            }
        }
        for report in &reports {
            if !report.ok {
                c.push_at(
                    "PK4",
                    spec_file_name(&report.spec),
                    format!("{} reported {} violations", report.spec, report.violations.len()),
                );
            }
        }
    }

    // PK5: reference integrity.
    if opts.check_refs {
        if let Some(run) = &run_record {
            let refs: [(&str, &str, Option<&str>); 4] = [
                ("bundle", "bundle.json", run.bundle.as_ref().map(|r| r.sha256.as_str())),
                ("patch", "patch.json", run.patch.as_ref().map(|r| r.sha256.as_str())),
                (
                    "model_io",
                    "model_io.json",
                    run.model_io.as_ref().map(|r| r.sha256.as_str()),
                ),
                (
                    "policy_ref",
                    "policy.json",
                    run.policy_ref.as_ref().map(|r| r.sha256.as_str()),
                ),
            ];
            for (field, target, expected) in refs {
                let computed = values.get(target).and_then(|v| content_hash(v).ok());
                match (expected, computed) {
                    (Some(expected), Some(computed)) => {
                        let matches = expected == computed;
                        if !matches {
                            c.push_at(
                                "PK5",
                                target,
                                format!("run.json.{field}.sha256 does not match file content"),
                            );
                        }
                        references.push(ReferenceCheck {
                            source: "run.json".to_string(),
                            target: target.to_string(),
                            field: format!("{field}.sha256"),
                            expected: expected.to_string(),
                            computed,
                            matches,
                        });
                    }
                    (Some(_), None) => {
                        c.push_at("PK5", target, format!("run.json.{field} references a missing file"));
                    }
                    (None, Some(_)) => {
                        c.push_at(
                            "PK5",
                            target,
                            format!("file present but run.json.{field} is null"),
                        );
                    }
                    (None, None) => {}
                }
            }

            // Ledger line must agree with the run record.
            if let Some(bytes) = contents.files.get("ledger.jsonl") {
                let text = String::from_utf8_lossy(bytes);
                if let Some(entry) = text
                    .lines()
                    .last()
                    .and_then(|l| serde_json::from_str::<packline_core::model::v1::LedgerEntry>(l).ok())
                {
                    let matches = entry.run_id == run.run_id;
                    if !matches {
                        c.push_at("PK5", "ledger.jsonl", "ledger run_id does not match run.json");
                    }
                    references.push(ReferenceCheck {
                        source: "ledger.jsonl".to_string(),
                        target: "run.json".to_string(),
                        field: "run_id".to_string(),
                        expected: run.run_id.clone(),
                        computed: entry.run_id,
                        matches,
                    });
                }
            }
        } else if contents.files.contains_key("run.json") {
            c.push_at("PK5", "run.json", "run record does not parse; references unchecked");
        }
    }

    let violations = c.into_violations();
    let ok = violations.is_empty() && reports.iter().all(|r| r.ok);

    PackVerifyResult {
        ok,
        files,
        references,
        violations,
        reports,
    }
}

fn spec_file_name(spec: &str) -> &'static str {
    match spec {
        "BUNDLE_SPEC" => "bundle.json",
        "PATCH_SPEC" => "patch.json",
        "APPLY_SPEC" => "apply.json",
        "MODEL_IO_SPEC" => "model_io.json",
        "WORKSPACE_SPEC" => "workspace.json",
        "LEDGER_SPEC" => "ledger.jsonl",
        _ => "pack",
    }
}

fn parse_json_file(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice(bytes).ok()
}

fn check_canonical_jsonl(c: &mut Checker, name: &str, bytes: &[u8]) {
    let Ok(text) = std::str::from_utf8(bytes) else {
        c.push_at("PK3", name, "file is not UTF-8");
        return;
    };
    if !text.is_empty() && !text.ends_with('\n') {
        c.push_at("PK3", name, "file does not end with a newline");
    }
    for (i, line) in text.lines().enumerate() {
        match serde_json::from_str::<Value>(line) {
            Ok(v) => match canonical_json_line(&v) {
                Ok(canonical) if canonical[..canonical.len() - 1] == *line.as_bytes() => {}
                _ => c.push_at("PK3", name, format!("line {} is not canonical JSON", i + 1)),
            },
            Err(_) => c.push_at("PK3", name, format!("line {} does not parse", i + 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packline_core::model::v1::{HashRef, PolicyName, RunMode};
    use serde_json::json;

    fn canonical(v: &Value) -> Vec<u8> {
        canonical_json_line(v).unwrap()
    }

    fn minimal_refuse_pack() -> PackContents {
        let run = RunRecord {
            run_schema_version: "v1".to_string(),
            run_id: "run_0000".to_string(),
            created_at: "2026-08-01T10:00:00Z".to_string(),
            mode: RunMode::PlanOnly,
            policy: PolicyName::Default,
            result_kind: ResultKind::Refuse,
            intent: HashRef {
                sha256: content_hash_bytes(b"intent"),
            },
            bundle: None,
            patch: None,
            model_io: None,
            policy_ref: None,
            refuse_reason: Some("EMPTY_GOAL".to_string()),
        };
        let mut pack = PackContents::default();
        pack.insert("run.json", canonical(&serde_json::to_value(&run).unwrap()));
        pack
    }

    #[test]
    fn refuse_pack_without_bundle_is_ok() {
        let result = verify_pack(&minimal_refuse_pack(), &PackVerifyOptions::default());
        assert!(result.ok, "{:?}", result.violations);
    }

    #[test]
    fn missing_run_json_is_pk1() {
        let pack = PackContents::default();
        let result = verify_pack(&pack, &PackVerifyOptions::default());
        assert!(result.violations.iter().any(|v| v.rule_id == "PK1"));
    }

    #[test]
    fn unknown_file_is_pk2() {
        let mut pack = minimal_refuse_pack();
        pack.insert("notes.txt", b"hello".to_vec());
        let result = verify_pack(&pack, &PackVerifyOptions::default());
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule_id == "PK2" && v.path.as_deref() == Some("notes.txt")));
    }

    #[test]
    fn non_canonical_json_is_pk3() {
        let mut pack = minimal_refuse_pack();
        let pretty = serde_json::to_vec_pretty(&json!({"b": 1, "a": 2})).unwrap();
        pack.insert("meta.json", pretty);
        let result = verify_pack(&pack, &PackVerifyOptions::default());
        assert!(result.violations.iter().any(|v| v.rule_id == "PK3"));
    }

    #[test]
    fn missing_bundle_for_non_refuse_is_pk1() {
        let mut pack = minimal_refuse_pack();
        let mut run: Value =
            serde_json::from_slice(pack.files.get("run.json").unwrap()).unwrap();
        run["result_kind"] = json!("BUNDLE");
        run["bundle"] = json!({"sha256": content_hash_bytes(b"bundle")});
        pack.insert("run.json", canonical(&run));
        let result = verify_pack(&pack, &PackVerifyOptions::default());
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule_id == "PK1" && v.path.as_deref() == Some("bundle.json")));
    }

    #[test]
    fn reference_mismatch_is_pk5() {
        use packline_core::kernel::transform;
        let kernel = transform(&json!({"goal": "Build a widget", "constraints": ["Use JSON"]}));
        let bundle_value = serde_json::to_value(kernel.bundle.unwrap()).unwrap();

        let mut pack = minimal_refuse_pack();
        let mut run: Value =
            serde_json::from_slice(pack.files.get("run.json").unwrap()).unwrap();
        run["result_kind"] = json!("BUNDLE");
        run["bundle"] = json!({"sha256": content_hash_bytes(b"wrong")});
        pack.insert("run.json", canonical(&run));
        pack.insert("bundle.json", canonical(&bundle_value));

        let result = verify_pack(&pack, &PackVerifyOptions::default());
        assert!(result.violations.iter().any(|v| v.rule_id == "PK5"));
        let check = result
            .references
            .iter()
            .find(|r| r.field == "bundle.sha256")
            .unwrap();
        assert!(!check.matches);
    }

    #[test]
    fn refs_can_be_disabled() {
        use packline_core::kernel::transform;
        let kernel = transform(&json!({"goal": "Build a widget", "constraints": ["Use JSON"]}));
        let bundle_value = serde_json::to_value(kernel.bundle.unwrap()).unwrap();

        let mut pack = minimal_refuse_pack();
        let mut run: Value =
            serde_json::from_slice(pack.files.get("run.json").unwrap()).unwrap();
        run["result_kind"] = json!("BUNDLE");
        run["bundle"] = json!({"sha256": content_hash_bytes(b"wrong")});
        pack.insert("run.json", canonical(&run));
        pack.insert("bundle.json", canonical(&bundle_value));

        let opts = PackVerifyOptions {
            check_refs: false,
            ..Default::default()
        };
        let result = verify_pack(&pack, &opts);
        assert!(!result.violations.iter().any(|v| v.rule_id == "PK5"));
    }
}
