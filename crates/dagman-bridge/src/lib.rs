// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! dagman-bridge
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! HTCondor DAGMan bridge for wf2wf.

/// `.dag` exporter with inline and traditional submit modes.
pub mod exporter;
/// `.dag` importer.
pub mod importer;
/// Submit-description parsing shared by both forms.
pub mod submit;

pub use exporter::{DagmanExporter, SubmitMode};
pub use importer::DagmanImporter;
pub use submit::SubmitDescription;
