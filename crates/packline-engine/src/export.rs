//! Pack exporter.
//!
//! Drives one full run: load the intent, transform it, produce the artifact
//! set for the outcome, write the pack directory in canonical form, and run
//! the pack verifier as a self-check.
//!
//! Catastrophic I/O (unreadable intent, unwritable directory) surfaces as an
//! error; everything else, including verification failure, is reported in
//! the returned result with `ok: false`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use packline_core::determinism::canonical_json::{canonical_json_line, content_hash};
use packline_core::kernel::{transform, KernelResult};
use packline_core::model::v1::{
    HashRef, LedgerEntry, Policy, PolicyName, ResultKind, RunMode, RunRecord,
};
use packline_core::patch_plan::derive_patch;
use packline_core::{id_prefix, SCHEMA_VERSION_V1};
use packline_verify::model_io::{verify_model_io, ModelIoOptions};
use packline_verify::pack::{verify_pack, PackVerifyOptions, PackVerifyResult};
use packline_verify::paths::root_has_traversal;

use crate::ledger::LedgerWriter;
use crate::pack_dir::load_pack_dir;

/// Model adapter involvement for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelMode {
    #[default]
    None,
    Record,
    Replay,
}

impl ModelMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "record" => Some(Self::Record),
            "replay" => Some(Self::Replay),
            _ => None,
        }
    }
}

/// Options for [`export_pack`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub policy: PolicyName,
    pub mode: RunMode,
    pub model_mode: ModelMode,
    pub model_recording: Option<PathBuf>,
    /// Timestamp override for reproducible runs; defaults to the wall clock.
    pub created_at: Option<String>,
    /// Run id override for reproducible runs; defaults to a fresh v4 uuid.
    pub run_id: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            policy: PolicyName::Default,
            mode: RunMode::PlanOnly,
            model_mode: ModelMode::None,
            model_recording: None,
            created_at: None,
            run_id: None,
        }
    }
}

/// Exporter output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    pub ok: bool,
    pub out_dir: String,
    pub files_written: Vec<String>,
    pub run_outcome: Option<ResultKind>,
    pub pack_verify: Option<PackVerifyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResult {
    fn failed(out_dir: &str, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            out_dir: out_dir.to_string(),
            files_written: Vec::new(),
            run_outcome: None,
            pack_verify: None,
            error: Some(error.into()),
        }
    }
}

/// Export a pack for the intent at `intent_path` into `out_dir`.
pub fn export_pack(intent_path: &Path, out_dir: &str, opts: &ExportOptions) -> Result<ExportResult> {
    // Same traversal rule as the apply engines: inspect the caller's string
    // before normalization.
    if root_has_traversal(out_dir) {
        return Ok(ExportResult::failed(out_dir, "out_dir contains traversal"));
    }
    let out = Path::new(out_dir);
    if out.exists() {
        if !out.is_dir() {
            return Ok(ExportResult::failed(out_dir, "out_dir exists and is not a directory"));
        }
        let occupied = std::fs::read_dir(out)
            .with_context(|| format!("read out_dir {out_dir}"))?
            .next()
            .is_some();
        if occupied {
            return Ok(ExportResult::failed(out_dir, "out_dir exists and is non-empty"));
        }
    } else {
        std::fs::create_dir_all(out).with_context(|| format!("create out_dir {out_dir}"))?;
    }

    let intent_bytes = std::fs::read(intent_path)
        .with_context(|| format!("read intent {}", intent_path.display()))?;
    let intent_value: Value = match serde_json::from_slice(&intent_bytes) {
        Ok(v) => v,
        Err(e) => return Ok(ExportResult::failed(out_dir, format!("intent does not parse: {e}"))),
    };
    let intent_hash = content_hash(&intent_value).context("hash intent")?;

    let model_io_value = match load_model_recording(opts) {
        Ok(v) => v,
        Err(e) => return Ok(ExportResult::failed(out_dir, e)),
    };

    let kernel: KernelResult = transform(&intent_value);
    let kind = kernel.kind;

    let created_at = match &opts.created_at {
        Some(ts) => ts.clone(),
        None => OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("format timestamp")?,
    };
    let run_id = opts
        .run_id
        .clone()
        .unwrap_or_else(|| format!("{}{}", id_prefix::RUN, uuid::Uuid::new_v4().simple()));

    // Build the artifact set for the outcome.
    let bundle_value = match (&kernel.bundle, kind) {
        (Some(b), ResultKind::Bundle | ResultKind::Clarify) => {
            Some(serde_json::to_value(b).context("serialize bundle")?)
        }
        _ => None,
    };
    let patch_value = match (&kernel.bundle, kind) {
        (Some(b), ResultKind::Bundle) => {
            let patch = derive_patch(b).context("derive patch")?;
            Some(serde_json::to_value(&patch).context("serialize patch")?)
        }
        _ => None,
    };
    let policy_value =
        serde_json::to_value(Policy::by_name(opts.policy)).context("serialize policy")?;

    let bundle_hash = bundle_value.as_ref().map(|v| content_hash(v)).transpose()?;
    let patch_hash = patch_value.as_ref().map(|v| content_hash(v)).transpose()?;
    let policy_hash = content_hash(&policy_value)?;
    let model_io_hash = model_io_value.as_ref().map(|v| content_hash(v)).transpose()?;

    let run = RunRecord {
        run_schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id: run_id.clone(),
        created_at: created_at.clone(),
        mode: opts.mode,
        policy: opts.policy,
        result_kind: kind,
        intent: HashRef {
            sha256: intent_hash.clone(),
        },
        bundle: bundle_hash.clone().map(|sha256| HashRef { sha256 }),
        patch: patch_hash.map(|sha256| HashRef { sha256 }),
        model_io: model_io_hash.map(|sha256| HashRef { sha256 }),
        policy_ref: Some(HashRef {
            sha256: policy_hash,
        }),
        refuse_reason: kernel.refuse_reason.clone(),
    };
    let run_value = serde_json::to_value(&run).context("serialize run record")?;

    let mut files_written: Vec<String> = Vec::new();
    write_artifact(out, "run.json", &run_value, &mut files_written)?;
    if let Some(v) = &bundle_value {
        write_artifact(out, "bundle.json", v, &mut files_written)?;
    }
    if let Some(v) = &patch_value {
        write_artifact(out, "patch.json", v, &mut files_written)?;
    }
    write_artifact(out, "policy.json", &policy_value, &mut files_written)?;
    if let Some(v) = &model_io_value {
        write_artifact(out, "model_io.json", v, &mut files_written)?;
    }

    let ledger = LedgerWriter::new(out.join("ledger.jsonl"));
    ledger.append(&LedgerEntry {
        run_id,
        timestamp: created_at,
        intent_sha256: intent_hash,
        bundle_sha256: if kind == ResultKind::Bundle {
            bundle_hash
        } else {
            None
        },
        result_kind: kind,
        accepted: kind == ResultKind::Bundle,
        mode: opts.mode,
        policy: opts.policy,
    })?;
    files_written.push("ledger.jsonl".to_string());
    files_written.sort();

    // Self-check: the exporter's own output must verify.
    let contents = load_pack_dir(out)?;
    let pack_verify = verify_pack(&contents, &PackVerifyOptions::default());
    let ok = pack_verify.ok;
    let error = if ok {
        None
    } else {
        Some("pack verification failed".to_string())
    };

    Ok(ExportResult {
        ok,
        out_dir: out_dir.to_string(),
        files_written,
        run_outcome: Some(kind),
        pack_verify: Some(pack_verify),
        error,
    })
}

fn load_model_recording(opts: &ExportOptions) -> std::result::Result<Option<Value>, String> {
    match opts.model_mode {
        ModelMode::None => Ok(None),
        ModelMode::Record | ModelMode::Replay => {
            let Some(path) = &opts.model_recording else {
                return Err("model recording path is required for record/replay".to_string());
            };
            let bytes = std::fs::read(path)
                .map_err(|e| format!("model recording not readable: {e}"))?;
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| format!("model recording does not parse: {e}"))?;
            let report = verify_model_io(&value, &ModelIoOptions::default());
            if !report.ok {
                return Err(format!(
                    "model recording violates MODEL_IO_SPEC ({} violations)",
                    report.violations.len()
                ));
            }
            Ok(Some(value))
        }
    }
}

fn write_artifact(
    out: &Path,
    name: &str,
    value: &Value,
    files_written: &mut Vec<String>,
) -> Result<()> {
    let bytes = canonical_json_line(value)
        .map_err(|e| anyhow::anyhow!("canonicalize {name}: {e}"))?;
    std::fs::write(out.join(name), bytes).with_context(|| format!("write {name}"))?;
    files_written.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_intent(dir: &Path, intent: &Value) -> PathBuf {
        let path = dir.join("intent.json");
        std::fs::write(&path, serde_json::to_vec(intent).unwrap()).unwrap();
        path
    }

    #[test]
    fn plan_export_succeeds_and_self_verifies() {
        let tmp = tempfile::tempdir().unwrap();
        let intent = write_intent(
            tmp.path(),
            &json!({
                "goal": "Build a user authentication system",
                "constraints": ["Must use JWT", "Session timeout 24h"]
            }),
        );
        let out = tmp.path().join("pack");
        let result = export_pack(&intent, out.to_str().unwrap(), &ExportOptions::default()).unwrap();
        assert!(result.ok, "{:?}", result);
        assert_eq!(result.run_outcome, Some(ResultKind::Bundle));
        assert_eq!(
            result.files_written,
            vec!["bundle.json", "ledger.jsonl", "patch.json", "policy.json", "run.json"]
        );
        assert!(result.pack_verify.unwrap().ok);
    }

    #[test]
    fn determinism_across_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let intent = write_intent(
            tmp.path(),
            &json!({
                "goal": "Build a user authentication system",
                "constraints": ["Must use JWT", "Session timeout 24h"]
            }),
        );
        let out1 = tmp.path().join("p1");
        let out2 = tmp.path().join("p2");
        export_pack(&intent, out1.to_str().unwrap(), &ExportOptions::default()).unwrap();
        export_pack(&intent, out2.to_str().unwrap(), &ExportOptions::default()).unwrap();

        // Everything except the timestamped files is bytewise identical.
        for name in ["bundle.json", "patch.json", "policy.json"] {
            let a = std::fs::read(out1.join(name)).unwrap();
            let b = std::fs::read(out2.join(name)).unwrap();
            assert_eq!(a, b, "{name} differs between runs");
        }
    }

    #[test]
    fn non_empty_out_dir_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let intent = write_intent(tmp.path(), &json!({"goal": "Build a thing"}));
        let out = tmp.path().join("occupied");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("existing.txt"), "x").unwrap();

        let result = export_pack(&intent, out.to_str().unwrap(), &ExportOptions::default()).unwrap();
        assert!(!result.ok);
        assert!(result.error.as_deref().unwrap().contains("non-empty"));
    }

    #[test]
    fn traversal_out_dir_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let intent = write_intent(tmp.path(), &json!({"goal": "Build a thing"}));
        let result =
            export_pack(&intent, "/tmp/foo/../../etc/pack", &ExportOptions::default()).unwrap();
        assert!(!result.ok);
        assert!(result.error.as_deref().unwrap().contains("traversal"));
    }

    #[test]
    fn clarify_run_has_no_patch() {
        let tmp = tempfile::tempdir().unwrap();
        let intent = write_intent(
            tmp.path(),
            &json!({
                "goal": "Build an API",
                "constraints": ["Must be synchronous", "Must be asynchronous"]
            }),
        );
        let out = tmp.path().join("pack");
        let result = export_pack(&intent, out.to_str().unwrap(), &ExportOptions::default()).unwrap();
        assert!(result.ok, "{:?}", result);
        assert_eq!(result.run_outcome, Some(ResultKind::Clarify));
        assert_eq!(
            result.files_written,
            vec!["bundle.json", "ledger.jsonl", "policy.json", "run.json"]
        );
    }

    #[test]
    fn refuse_run_has_no_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let intent = write_intent(tmp.path(), &json!({"goal": "   "}));
        let out = tmp.path().join("pack");
        let result = export_pack(&intent, out.to_str().unwrap(), &ExportOptions::default()).unwrap();
        assert!(result.ok, "{:?}", result);
        assert_eq!(result.run_outcome, Some(ResultKind::Refuse));
        assert_eq!(
            result.files_written,
            vec!["ledger.jsonl", "policy.json", "run.json"]
        );
    }

    #[test]
    fn malformed_intent_reports_validation_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("intent.json");
        std::fs::write(&path, b"{not json").unwrap();
        let out = tmp.path().join("pack");
        let result = export_pack(&path, out.to_str().unwrap(), &ExportOptions::default()).unwrap();
        assert!(!result.ok);
        assert!(result.error.as_deref().unwrap().contains("does not parse"));
    }

    #[test]
    fn exported_patch_applies_to_fresh_target() {
        let tmp = tempfile::tempdir().unwrap();
        let intent = write_intent(
            tmp.path(),
            &json!({
                "goal": "Build a user authentication system",
                "constraints": ["Must use JWT", "Session timeout 24h"]
            }),
        );
        let out = tmp.path().join("pack");
        export_pack(&intent, out.to_str().unwrap(), &ExportOptions::default()).unwrap();

        let target = tmp.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let apply = crate::patch_apply::apply_pack(
            &out,
            target.to_str().unwrap(),
            &crate::patch_apply::PatchApplyOptions::default(),
        );
        assert_eq!(
            apply.outcome,
            packline_core::model::v1::ApplyOutcome::Success,
            "{:?}",
            apply.error
        );
        assert!(apply.summary.succeeded >= 1);
    }
}
