// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! wf2wf-pipeline
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The conversion orchestrator: source → importer → IR → exporter →
//! target + loss side-car.

/// The fixed conversion pipeline.
pub mod convert;
/// The IR identity bridge.
pub mod ir_bridge;
/// Conversion reports and exit-code policy.
pub mod report;

pub use convert::{
    DEFAULT_CONTAINER, PipelineError, convert, convert_with_prompter, emitter_for, importer_for,
    run_conversion,
};
pub use ir_bridge::{IrExporter, IrImporter};
pub use report::{ConversionReport, UnrecoveredLoss};
