use std::path::{Path, PathBuf};

use anyhow::Result;

use packline_core::model::v1::{PolicyName, RunMode};
use packline_engine::{export_pack, ExportOptions, ModelMode};

use crate::output;

pub fn run(
    intent: &str,
    out: &str,
    policy: &str,
    mode: &str,
    model_mode: &str,
    model_recording: Option<String>,
) -> Result<i32> {
    let Some(policy) = PolicyName::parse(policy) else {
        output::eprintln_line(&format!("pack-export: unknown policy {policy}"));
        return Ok(2);
    };
    let mode = match mode {
        "plan" => RunMode::PlanOnly,
        "exec" => RunMode::ExecuteSandbox,
        other => {
            output::eprintln_line(&format!("pack-export: unknown mode {other}"));
            return Ok(2);
        }
    };
    let Some(model_mode) = ModelMode::parse(model_mode) else {
        output::eprintln_line(&format!("pack-export: unknown model mode {model_mode}"));
        return Ok(2);
    };

    let opts = ExportOptions {
        policy,
        mode,
        model_mode,
        model_recording: model_recording.map(PathBuf::from),
        ..Default::default()
    };

    match export_pack(Path::new(intent), out, &opts) {
        Ok(result) => {
            output::print_canonical(&result)?;
            Ok(if result.ok { 0 } else { 2 })
        }
        Err(e) => {
            output::eprintln_line(&format!("pack-export: {e:#}"));
            Ok(1)
        }
    }
}
