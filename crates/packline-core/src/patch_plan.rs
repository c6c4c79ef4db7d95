//! Patch derivation.
//!
//! Turns a bundle's proposed outputs into a concrete PatchSet: one `create`
//! operation per output, bound to the bundle by id and content hash. The
//! rendered stubs are placeholders a downstream generator refines; what
//! matters here is that the patch is a pure function of the bundle.

use crate::determinism::canonical_json::content_hash;
use crate::errors::{PacklineError, PacklineResult};
use crate::model::v1::{Bundle, Output, PatchOperation, PatchSet};
use crate::SCHEMA_VERSION_V1;

/// Derive the patch for a bundle's outputs.
///
/// Operations are ordered by output path (outputs are already sorted), so
/// `(order, path)` ordering holds by construction.
pub fn derive_patch(bundle: &Bundle) -> PacklineResult<PatchSet> {
    let bundle_value = serde_json::to_value(bundle)
        .map_err(|e| PacklineError::serialization(e.to_string()))?;
    let bundle_hash = content_hash(&bundle_value)?;

    let mut operations = Vec::with_capacity(bundle.outputs.len());
    let mut total_bytes: u64 = 0;
    for (i, output) in bundle.outputs.iter().enumerate() {
        let content = render_stub(output);
        let size_bytes = content.len() as u64;
        total_bytes += size_bytes;
        operations.push(PatchOperation::Create {
            path: output.path.clone(),
            content,
            size_bytes,
            order: i as u64,
        });
    }

    Ok(PatchSet {
        patch_schema_version: SCHEMA_VERSION_V1.to_string(),
        source_proposal_id: bundle.id.clone(),
        source_proposal_hash: bundle_hash,
        operations,
        total_bytes,
    })
}

fn render_stub(output: &Output) -> String {
    let title = output
        .path
        .rsplit('/')
        .next()
        .and_then(|name| name.strip_suffix(".md"))
        .unwrap_or(&output.path);

    let mut body = format!("# {title}\n\nProposed artifact ({}% confidence).\n", output.confidence);
    if !output.source_constraints.is_empty() {
        body.push_str("\nSource constraints:\n");
        for c in &output.source_constraints {
            body.push_str(&format!("- {c}\n"));
        }
    }
    body
}
