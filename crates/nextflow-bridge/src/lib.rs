// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! nextflow-bridge
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Nextflow bridge for wf2wf.

/// `.nf` exporter.
pub mod exporter;
/// `.nf` importer.
pub mod importer;

pub use exporter::NextflowExporter;
pub use importer::NextflowImporter;
