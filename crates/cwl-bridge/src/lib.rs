// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwl-bridge
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! CWL bridge for wf2wf.

/// `.cwl` exporter emitting `$graph` documents.
pub mod exporter;
/// `.cwl` importer for single and `$graph` forms.
pub mod importer;
/// CWL ↔ IR type mapping.
pub mod types;

pub use exporter::{CWL_VERSION, CwlExporter};
pub use importer::CwlImporter;
