//! Pack directory loader.
//!
//! Reads a pack directory into the in-memory map the pure pack verifier
//! operates on. Subdirectories are recorded by name with empty contents so
//! the verifier can flag them as unknown entries.

use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use packline_verify::PackContents;

/// Load the top level of `dir` into a [`PackContents`].
pub fn load_pack_dir(dir: &Path) -> Result<PackContents> {
    if !dir.is_dir() {
        anyhow::bail!("pack directory does not exist: {}", dir.display());
    }

    let mut contents = PackContents::default();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("read pack directory {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.file_type().is_file() {
            let bytes = std::fs::read(entry.path())
                .with_context(|| format!("read pack file {}", entry.path().display()))?;
            contents.insert(name, bytes);
        } else {
            contents.insert(name, Vec::new());
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_files_and_flags_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("run.json"), b"{}\n").unwrap();
        let contents = load_pack_dir(tmp.path()).unwrap();
        assert_eq!(contents.files.len(), 1);
        assert!(contents.files.contains_key("run.json"));

        assert!(load_pack_dir(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn subdirectory_recorded_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        let contents = load_pack_dir(tmp.path()).unwrap();
        assert!(contents.files.contains_key("sub"));
    }
}
