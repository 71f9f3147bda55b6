// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! wf2wf-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract for wf2wf.
//!
//! If you only take one dependency, take this one.

/// Capability traits and bridge error types.
pub mod bridge;
/// Execution environments and environment-indexed values.
pub mod env;
/// Topological ordering utilities.
pub mod graph;
/// Loss entries and their closed enumerations.
pub mod loss;
/// Parameter, requirement, scatter, and regulatory metadata specs.
pub mod spec;
/// Tasks and the task builder.
pub mod task;
/// The workflow container and structural mutation.
pub mod workflow;

pub use bridge::{ExportError, ParseError, SourceParser, TargetEmitter};
pub use env::{Environment, EnvironmentEntry, EnvironmentSpecificValue};
pub use loss::{LossEntry, LossOrigin, LossSeverity, LossStatus, categories};
pub use spec::{
    BCOSpec, DocumentationSpec, ParameterSpec, ParameterType, ProvenanceSpec, RequirementSpec,
    ScatterMethod, ScatterSpec, TransferMode, requirement_classes,
};
pub use task::{Task, TaskBuilder};
pub use workflow::{Edge, GraphError, Workflow};

use serde::Serialize;
use sha2::{Digest, Sha256};
use wf2wf_format::WorkflowFormat;

/// Current IR schema version embedded in side-cars and schema ids.
pub const IR_VERSION: &str = "0.1";

/// The execution environment a format idiomatically assumes.
///
/// Importers bind parsed values to this environment; exporters read
/// values for it unless the caller retargets.
#[must_use]
pub fn native_environment(format: WorkflowFormat) -> Environment {
    match format {
        WorkflowFormat::Snakemake
        | WorkflowFormat::Cwl
        | WorkflowFormat::Nextflow
        | WorkflowFormat::Galaxy
        | WorkflowFormat::Ir => Environment::SharedFilesystem,
        WorkflowFormat::Dagman => Environment::DistributedComputing,
        WorkflowFormat::Wdl => Environment::CloudNative,
    }
}

/// Errors from contract-level operations (serialisation, hashing).
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// JSON serialisation or deserialisation failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a deterministic JSON string for hashing and comparison.
///
/// This is not a full JCS implementation, but it is stable for our types:
/// keys are sorted (`serde_json`'s map is a `BTreeMap` by default), unset
/// optional fields are omitted by the serde attributes on the IR types,
/// and numbers are serialised consistently.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the value cannot be serialised.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ContractError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute the side-car source checksum of a workflow.
///
/// **Gotcha:** the `loss_map` must not influence the checksum, otherwise
/// appending a loss entry would invalidate the side-car that describes it.
/// The field is removed from the canonical value before hashing.
///
/// Returns a string of the form `"sha256:" + 64 lowercase hex`.
///
/// # Examples
///
/// ```
/// use wf2wf_core::{Workflow, source_checksum};
///
/// let wf = Workflow::new("demo", "1.0");
/// let sum = source_checksum(&wf).unwrap();
/// assert!(sum.starts_with("sha256:"));
/// assert_eq!(sum.len(), "sha256:".len() + 64);
/// // Checksumming is deterministic.
/// assert_eq!(sum, source_checksum(&wf).unwrap());
/// ```
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the workflow cannot be serialised.
pub fn source_checksum(workflow: &Workflow) -> Result<String, ContractError> {
    let mut v = serde_json::to_value(workflow)?;
    if let serde_json::Value::Object(map) = &mut v {
        map.remove("loss_map");
    }
    let json = serde_json::to_string(&v)?;
    Ok(format!("sha256:{}", sha256_hex(json.as_bytes())))
}
