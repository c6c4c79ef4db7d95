//! MODEL_IO_SPEC verifier (MI1..MI12).

use serde_json::Value;

use crate::ledger::is_iso8601_utc;
use crate::violation::{Checker, SpecReport};
use crate::RULE_SCHEMA;
use packline_core::config::LimitsConfig;
use packline_core::determinism::canonical_json::{
    canonical_json_bytes, content_hash, is_content_hash,
};
use packline_core::model::v1::ModelIoLog;

pub const SPEC_NAME: &str = "MODEL_IO_SPEC";
pub const SCHEMA_VERSION: &str = "v1";

/// Verification toggles, mirrored by the CLI flags.
#[derive(Debug, Clone)]
pub struct ModelIoOptions {
    /// Recompute response hashes against response bodies (MI7).
    pub check_response_hashes: bool,
    /// Enforce interaction and total size ceilings (MI11, MI12).
    pub check_size_limits: bool,
    pub limits: LimitsConfig,
}

impl Default for ModelIoOptions {
    fn default() -> Self {
        Self {
            check_response_hashes: true,
            check_size_limits: true,
            limits: LimitsConfig::default(),
        }
    }
}

/// Verify a raw value against MODEL_IO_SPEC.
pub fn verify_model_io(value: &Value, opts: &ModelIoOptions) -> SpecReport {
    let mut c = Checker::new();

    let log: ModelIoLog = match serde_json::from_value(value.clone()) {
        Ok(l) => l,
        Err(e) => {
            c.push(RULE_SCHEMA, format!("model io log does not parse: {e}"));
            return c.finish(SPEC_NAME);
        }
    };

    if log.model_io_schema_version != SCHEMA_VERSION {
        c.push(
            "MI1",
            format!(
                "model_io_schema_version must be {SCHEMA_VERSION}, got {}",
                log.model_io_schema_version
            ),
        );
    }

    // MI2 (mode enum) and MI3 (interactions array) are enforced by the
    // typed parse.

    if log.interactions.len() > opts.limits.max_model_interactions {
        c.push(
            "MI4",
            format!(
                "{} interactions exceed the ceiling of {}",
                log.interactions.len(),
                opts.limits.max_model_interactions
            ),
        );
    }

    let ids: Vec<&str> = log.interactions.iter().map(|i| i.id.as_str()).collect();
    if !ids.windows(2).all(|w| w[0] < w[1]) {
        c.push("MI5", "interaction ids are not strictly sorted");
    }

    let mut prev_timestamp: Option<&str> = None;
    let mut total_bytes: u64 = 0;
    for i in &log.interactions {
        let at = i.id.clone();

        for (field, h) in [
            ("request_sha256", &i.request_sha256),
            ("response_sha256", &i.response_sha256),
        ] {
            if !is_content_hash(h) {
                c.push_at("MI6", &at, format!("{field} is malformed"));
            }
        }

        if opts.check_response_hashes {
            match content_hash(&i.response) {
                Ok(h) if h == i.response_sha256 => {}
                Ok(h) => c.push_at(
                    "MI7",
                    &at,
                    format!("response_sha256 does not match response body ({h})"),
                ),
                Err(e) => c.push_at("MI7", &at, format!("response body is not hashable: {e}")),
            }
        }

        if !is_iso8601_utc(&i.timestamp) {
            c.push_at("MI8", &at, format!("timestamp is not ISO-8601 UTC: {}", i.timestamp));
        }
        if let Some(prev) = prev_timestamp {
            if i.timestamp.as_str() < prev {
                c.push_at("MI8", &at, "timestamps are not non-decreasing");
            }
        }
        prev_timestamp = Some(&i.timestamp);

        if i.provider.is_empty() || i.model.is_empty() {
            c.push_at("MI9", &at, "provider and model must be non-empty");
        }

        // MI10: token counts are unsigned by type; nothing further to check.

        if opts.check_size_limits {
            let size = canonical_json_bytes(&i.response)
                .map(|b| b.len() as u64)
                .unwrap_or(0);
            total_bytes += size;
            if size > opts.limits.max_interaction_bytes {
                c.push_at(
                    "MI11",
                    &at,
                    format!(
                        "interaction size {size} exceeds ceiling {}",
                        opts.limits.max_interaction_bytes
                    ),
                );
            }
        }
    }

    if opts.check_size_limits && total_bytes > opts.limits.max_pack_bytes {
        c.push(
            "MI12",
            format!(
                "total recorded size {total_bytes} exceeds ceiling {}",
                opts.limits.max_pack_bytes
            ),
        );
    }

    c.finish(SPEC_NAME)
}
