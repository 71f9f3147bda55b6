// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! wdl-bridge
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! WDL bridge for wf2wf.

/// `.wdl` exporter.
pub mod exporter;
/// `.wdl` importer.
pub mod importer;

pub use exporter::WdlExporter;
pub use importer::WdlImporter;
