//! LEDGER_SPEC verifier (LD1..LD4).
//!
//! The input is the full text of a `ledger.jsonl` file: one canonical JSON
//! object per line.

use crate::violation::{Checker, SpecReport};
use packline_core::determinism::canonical_json::is_content_hash;
use packline_core::model::v1::{LedgerEntry, ResultKind};

pub const SPEC_NAME: &str = "LEDGER_SPEC";

/// Strict ISO-8601 UTC check: `YYYY-MM-DDTHH:MM:SSZ` with an optional
/// fractional-seconds part. Timestamps in this format compare
/// chronologically when compared bytewise.
pub(crate) fn is_iso8601_utc(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 20 || b[b.len() - 1] != b'Z' {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    let fixed = digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && b[10] == b'T'
        && digits(11..13)
        && b[13] == b':'
        && digits(14..16)
        && b[16] == b':'
        && digits(17..19);
    if !fixed {
        return false;
    }
    match b.len() {
        20 => b[19] == b'Z',
        len => b[19] == b'.' && len > 21 && digits(20..len - 1),
    }
}

/// Verify ledger file text against LEDGER_SPEC.
pub fn verify_ledger(text: &str) -> SpecReport {
    let mut c = Checker::new();
    let mut prev_timestamp: Option<String> = None;
    let mut run_ids: Vec<String> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let at = format!("line {}", lineno + 1);
        if line.is_empty() {
            c.push_at("LD1", &at, "empty ledger line");
            continue;
        }

        let entry: LedgerEntry = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(e) => {
                c.push_at("LD1", &at, format!("line does not parse: {e}"));
                continue;
            }
        };

        if entry.run_id.is_empty() {
            c.push_at("LD1", &at, "run_id is empty");
        }
        if !is_iso8601_utc(&entry.timestamp) {
            c.push_at(
                "LD1",
                &at,
                format!("timestamp is not ISO-8601 UTC: {}", entry.timestamp),
            );
        }

        if let Some(prev) = &prev_timestamp {
            if &entry.timestamp < prev {
                c.push_at("LD2", &at, "timestamps are not non-decreasing");
            }
        }
        prev_timestamp = Some(entry.timestamp.clone());

        if run_ids.contains(&entry.run_id) {
            c.push_at("LD3", &at, format!("duplicate run_id: {}", entry.run_id));
        } else {
            run_ids.push(entry.run_id.clone());
        }

        if !is_content_hash(&entry.intent_sha256) {
            c.push_at("LD4", &at, "intent_sha256 is malformed");
        }
        match (&entry.bundle_sha256, entry.result_kind) {
            (Some(h), ResultKind::Bundle) => {
                if !is_content_hash(h) {
                    c.push_at("LD4", &at, "bundle_sha256 is malformed");
                }
            }
            (None, ResultKind::Bundle) => {
                c.push_at("LD4", &at, "bundle_sha256 must be set for BUNDLE results");
            }
            (Some(_), _) => {
                c.push_at("LD4", &at, "bundle_sha256 must be null unless result is BUNDLE");
            }
            (None, _) => {}
        }
    }

    c.finish(SPEC_NAME)
}
