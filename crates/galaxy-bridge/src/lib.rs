// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! galaxy-bridge
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Galaxy bridge for wf2wf.

/// `.ga` exporter.
pub mod exporter;
/// `.ga` importer.
pub mod importer;

pub use exporter::GalaxyExporter;
pub use importer::GalaxyImporter;
