//! Run ledger writer.
//!
//! Appends one canonical JSON line per run. Before appending, the existing
//! file is scanned to enforce the ledger invariants: timestamps never go
//! backwards and run ids never repeat. The line is written with a single
//! `write_all` on an append-only handle, so concurrent readers never see a
//! partial line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use packline_core::determinism::canonical_json::canonical_json_line;
use packline_core::model::v1::LedgerEntry;

/// Append-only writer for a `ledger.jsonl` file.
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    path: PathBuf,
}

impl LedgerWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, enforcing monotonic timestamps and unique run ids
    /// against the existing file contents.
    pub fn append(&self, entry: &LedgerEntry) -> Result<()> {
        if let Ok(existing) = std::fs::read_to_string(&self.path) {
            for line in existing.lines() {
                let prior: LedgerEntry = serde_json::from_str(line)
                    .with_context(|| format!("ledger {} holds a malformed line", self.path.display()))?;
                if prior.run_id == entry.run_id {
                    anyhow::bail!("duplicate run_id in ledger: {}", entry.run_id);
                }
                if entry.timestamp < prior.timestamp {
                    anyhow::bail!(
                        "ledger timestamp would go backwards: {} < {}",
                        entry.timestamp,
                        prior.timestamp
                    );
                }
            }
        }

        let value = serde_json::to_value(entry).context("serialize ledger entry")?;
        let line = canonical_json_line(&value).context("canonicalize ledger entry")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open ledger {}", self.path.display()))?;
        file.write_all(&line)
            .with_context(|| format!("append to ledger {}", self.path.display()))?;
        file.flush().context("flush ledger")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packline_core::determinism::canonical_json::content_hash_bytes;
    use packline_core::model::v1::{PolicyName, ResultKind, RunMode};

    fn entry(run_id: &str, timestamp: &str) -> LedgerEntry {
        LedgerEntry {
            run_id: run_id.to_string(),
            timestamp: timestamp.to_string(),
            intent_sha256: content_hash_bytes(b"intent"),
            bundle_sha256: None,
            result_kind: ResultKind::Refuse,
            accepted: false,
            mode: RunMode::PlanOnly,
            policy: PolicyName::Default,
        }
    }

    #[test]
    fn appends_canonical_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = LedgerWriter::new(tmp.path().join("ledger.jsonl"));
        writer.append(&entry("run_a", "2026-08-01T10:00:00Z")).unwrap();
        writer.append(&entry("run_b", "2026-08-01T10:00:01Z")).unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));

        let report = packline_verify::ledger::verify_ledger(&text);
        assert!(report.ok, "{:?}", report.violations);
    }

    #[test]
    fn duplicate_run_id_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = LedgerWriter::new(tmp.path().join("ledger.jsonl"));
        writer.append(&entry("run_a", "2026-08-01T10:00:00Z")).unwrap();
        let err = writer
            .append(&entry("run_a", "2026-08-01T10:00:01Z"))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate run_id"));
    }

    #[test]
    fn backwards_timestamp_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = LedgerWriter::new(tmp.path().join("ledger.jsonl"));
        writer.append(&entry("run_a", "2026-08-01T10:00:01Z")).unwrap();
        let err = writer
            .append(&entry("run_b", "2026-08-01T10:00:00Z"))
            .unwrap_err();
        assert!(err.to_string().contains("backwards"));
    }

    #[test]
    fn failed_write_leaves_no_partial_line() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = LedgerWriter::new(tmp.path().join("nested/ledger.jsonl"));
        // Parent directory missing: open fails, nothing is written.
        assert!(writer.append(&entry("run_a", "2026-08-01T10:00:00Z")).is_err());
        assert!(!writer.path().exists());
    }
}
