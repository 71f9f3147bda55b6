// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transfer-mode classification from path heuristics.

use wf2wf_core::{ParameterSpec, TransferMode};

const SHARED_PREFIXES: &[&str] = &[
    "/nfs/", "/shared/", "/data/", "/storage/", "/lustre/", "/gpfs/", "/beegfs/", "gs://",
    "s3://", "https://",
];

const SHARED_EXTENSIONS: &[&str] = &[".fa", ".fasta", ".gtf", ".gff", ".bam", ".sam", ".bed"];

const SCRATCH_SUFFIXES: &[&str] = &[".tmp", ".log", ".err", ".out"];

/// Classify a path under the `auto` transfer policy.
///
/// Returns `None` when no heuristic applies — the parameter stays `auto`,
/// which downstream consumers treat as "transfer".
#[must_use]
pub fn classify_transfer(path: &str) -> Option<TransferMode> {
    if SHARED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return Some(TransferMode::Shared);
    }
    let base = path.rsplit('/').next().unwrap_or(path);
    if path.starts_with("/tmp/")
        || base.starts_with("temp_")
        || SCRATCH_SUFFIXES.iter().any(|s| path.ends_with(s))
    {
        return Some(TransferMode::Never);
    }
    if SHARED_EXTENSIONS.iter().any(|e| path.ends_with(e)) {
        return Some(TransferMode::Shared);
    }
    None
}

/// Resolve `auto` transfer modes on a parameter list in place.
///
/// Returns how many parameters were reclassified.
pub fn classify_parameters(params: &mut [ParameterSpec]) -> usize {
    let mut changed = 0;
    for param in params.iter_mut() {
        if param.transfer_mode == TransferMode::Auto
            && let Some(mode) = classify_transfer(&param.id)
        {
            param.transfer_mode = mode;
            changed += 1;
        }
    }
    changed
}
