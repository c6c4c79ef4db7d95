use anyhow::Result;
use serde_json::Value;

use packline_verify::model_io::{verify_model_io, ModelIoOptions};

use crate::output;

pub fn run(path: &str, no_response_hashes: bool, no_size_limits: bool) -> Result<i32> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            output::eprintln_line(&format!("model-io-verify: read {path}: {e}"));
            return Ok(1);
        }
    };
    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            output::eprintln_line(&format!("model-io-verify: parse {path}: {e}"));
            return Ok(2);
        }
    };

    let opts = ModelIoOptions {
        check_response_hashes: !no_response_hashes,
        check_size_limits: !no_size_limits,
        ..Default::default()
    };
    let report = verify_model_io(&value, &opts);
    output::print_canonical(&report)?;
    Ok(if report.ok { 0 } else { 3 })
}
