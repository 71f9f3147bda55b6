// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter, requirement, scatter, and regulatory metadata specs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Parameter types ─────────────────────────────────────────────────────

/// Type of a workflow or task parameter.
///
/// Primitives serialise as `{"type": "file"}` etc.; compound types carry
/// their components inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterType {
    /// The null type.
    Null,
    /// Boolean.
    Boolean,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Unicode string.
    String,
    /// A file path or reference.
    File,
    /// A directory path or reference.
    Directory,
    /// Homogeneous array.
    Array {
        /// Element type.
        items: Box<ParameterType>,
    },
    /// Named-field record.
    Record {
        /// Field name to field type.
        fields: BTreeMap<String, ParameterType>,
    },
    /// Closed symbol set.
    Enum {
        /// Allowed symbols.
        symbols: Vec<String>,
    },
    /// Any one of the member types.
    Union {
        /// Member types.
        members: Vec<ParameterType>,
    },
}

impl ParameterType {
    /// An array of `items`.
    #[must_use]
    pub fn array(items: ParameterType) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    /// An optional `inner` (union with null).
    #[must_use]
    pub fn optional(inner: ParameterType) -> Self {
        Self::Union {
            members: vec![Self::Null, inner],
        }
    }

    /// Whether this type (or any nested component) refers to files or
    /// directories, i.e. participates in file transfer.
    #[must_use]
    pub fn involves_files(&self) -> bool {
        match self {
            Self::File | Self::Directory => true,
            Self::Array { items } => items.involves_files(),
            Self::Record { fields } => fields.values().any(ParameterType::involves_files),
            Self::Union { members } => members.iter().any(ParameterType::involves_files),
            _ => false,
        }
    }
}

// ── Transfer mode ───────────────────────────────────────────────────────

/// How a parameter's files move between execution sites.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Classify from path heuristics at inference time; transfer if unknown.
    #[default]
    Auto,
    /// Always stage the file to the execution site.
    Always,
    /// Never transfer (scratch or log files).
    Never,
    /// Visible via a shared filesystem or remote store; no staging needed.
    Shared,
}

impl TransferMode {
    /// Wire name of this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
            Self::Shared => "shared",
        }
    }
}

// ── ParameterSpec ───────────────────────────────────────────────────────

/// A typed input or output of a workflow or task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterSpec {
    /// Identifier, unique within its containing collection.
    pub id: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Documentation string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// File format IRI (e.g. an EDAM identifier).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Secondary-file patterns (e.g. `".bai"`, `"^.dict"`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_files: Vec<String>,
    /// File transfer mode.
    #[serde(default, skip_serializing_if = "is_default_transfer")]
    pub transfer_mode: TransferMode,
}

fn is_default_transfer(mode: &TransferMode) -> bool {
    *mode == TransferMode::Auto
}

impl ParameterSpec {
    /// Create a parameter with the given id and type.
    #[must_use]
    pub fn new(id: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            id: id.into(),
            param_type,
            label: None,
            doc: None,
            default: None,
            format: None,
            secondary_files: Vec::new(),
            transfer_mode: TransferMode::Auto,
        }
    }

    /// A `File` parameter.
    #[must_use]
    pub fn file(id: impl Into<String>) -> Self {
        Self::new(id, ParameterType::File)
    }

    /// A `String` parameter.
    #[must_use]
    pub fn string(id: impl Into<String>) -> Self {
        Self::new(id, ParameterType::String)
    }
}

// ── RequirementSpec ─────────────────────────────────────────────────────

/// Well-known requirement class names.
pub mod requirement_classes {
    /// Container execution requirement.
    pub const DOCKER: &str = "DockerRequirement";
    /// CPU/memory/disk resource requirement.
    pub const RESOURCE: &str = "ResourceRequirement";
    /// Outbound network access requirement.
    pub const NETWORK_ACCESS: &str = "NetworkAccess";
    /// Software package requirement.
    pub const SOFTWARE: &str = "SoftwareRequirement";
    /// Directory-listing loading behaviour.
    pub const LOAD_LISTING: &str = "LoadListingRequirement";
}

/// A tagged requirement or hint: a class name plus free-form data.
///
/// Source-format requirement hierarchies are flattened to this tagged
/// shape; consumers pattern-match on `class_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequirementSpec {
    /// Requirement class (e.g. `DockerRequirement`).
    pub class_name: String,
    /// Class-specific payload.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl RequirementSpec {
    /// Create a requirement with an empty payload.
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            data: BTreeMap::new(),
        }
    }

    /// Insert a payload entry, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// A `DockerRequirement` for the given image.
    #[must_use]
    pub fn docker(image: impl Into<String>) -> Self {
        Self::new(requirement_classes::DOCKER).with("docker_pull", image.into())
    }

    /// Payload lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

// ── ScatterSpec ─────────────────────────────────────────────────────────

/// How scattered parameter arrays combine into task instantiations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ScatterMethod {
    /// Element-wise pairing of equal-length arrays.
    #[default]
    Dotproduct,
    /// Cartesian product preserving nesting.
    NestedCrossproduct,
    /// Cartesian product flattened to one level.
    FlatCrossproduct,
}

impl ScatterMethod {
    /// Wire name of this method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dotproduct => "dotproduct",
            Self::NestedCrossproduct => "nested_crossproduct",
            Self::FlatCrossproduct => "flat_crossproduct",
        }
    }
}

/// A task-level scatter directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScatterSpec {
    /// Parameter ids scattered over.
    pub scatter: Vec<String>,
    /// Combination method.
    #[serde(default)]
    pub method: ScatterMethod,
}

impl ScatterSpec {
    /// Scatter over a single parameter with the dotproduct method.
    #[must_use]
    pub fn single(param: impl Into<String>) -> Self {
        Self {
            scatter: vec![param.into()],
            method: ScatterMethod::Dotproduct,
        }
    }
}

// ── Regulatory metadata ─────────────────────────────────────────────────

/// Provenance metadata carried verbatim through the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProvenanceSpec {
    /// Workflow authors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Contributing organisations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<String>,
    /// Version string of the described workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// License identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// DOI of the associated publication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    /// Free-form keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Additional fields mirrored from external schemas.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

/// Documentation metadata carried verbatim through the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DocumentationSpec {
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Usage notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_notes: Option<String>,
    /// Intent or purpose statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Additional fields mirrored from external schemas.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

/// BioCompute Object metadata carried verbatim through the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BCOSpec {
    /// BCO object identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// IEEE 2791 schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,
    /// Domain blocks (provenance, usability, execution, ...) keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domains: BTreeMap<String, serde_json::Value>,
}
