// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! snakemake-bridge
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Snakemake bridge for wf2wf.
//!
//! The importer is a static parser (multi-line blocks, includes, the full
//! directive set) with optional dry-run enrichment behind a timeout; the
//! exporter writes one rule per task.

/// Dry-run enrichment via the native tool.
pub mod dryrun;
/// Snakemake exporter.
pub mod exporter;
/// Snakemake importer.
pub mod importer;

pub use dryrun::DryRunOptions;
pub use exporter::SnakemakeExporter;
pub use importer::SnakemakeImporter;
