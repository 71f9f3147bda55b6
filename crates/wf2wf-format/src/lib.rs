// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # wf2wf-format
//!
//! Format identifiers and filename auto-detection for wf2wf.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ── WorkflowFormat ──────────────────────────────────────────────────────

/// Known workflow description formats.
///
/// `Ir` is the converter's own intermediate representation, accepted and
/// emitted as plain JSON or YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowFormat {
    /// Rule-based build system (Snakemake).
    Snakemake,
    /// Distributed-job DAG language (HTCondor DAGMan).
    Dagman,
    /// Standards-based command-line workflow language (CWL).
    Cwl,
    /// Channel-based dataflow language (Nextflow).
    Nextflow,
    /// Task-based typed workflow language (WDL).
    Wdl,
    /// UI-exported workflow language (Galaxy).
    Galaxy,
    /// The wf2wf intermediate representation itself.
    Ir,
}

impl WorkflowFormat {
    /// Human-readable label for this format.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Snakemake => "Snakemake",
            Self::Dagman => "DAGMan",
            Self::Cwl => "CWL",
            Self::Nextflow => "Nextflow",
            Self::Wdl => "WDL",
            Self::Galaxy => "Galaxy",
            Self::Ir => "IR",
        }
    }

    /// Engine identifier used in side-car `target_engine` fields.
    #[must_use]
    pub fn engine(self) -> &'static str {
        match self {
            Self::Snakemake => "snakemake",
            Self::Dagman => "dagman",
            Self::Cwl => "cwl",
            Self::Nextflow => "nextflow",
            Self::Wdl => "wdl",
            Self::Galaxy => "galaxy",
            Self::Ir => "wf2wf",
        }
    }

    /// Canonical filename extension for outputs of this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Snakemake => "smk",
            Self::Dagman => "dag",
            Self::Cwl => "cwl",
            Self::Nextflow => "nf",
            Self::Wdl => "wdl",
            Self::Galaxy => "ga",
            Self::Ir => "json",
        }
    }

    /// Returns all known formats.
    #[must_use]
    pub fn all() -> &'static [WorkflowFormat] {
        &[
            Self::Snakemake,
            Self::Dagman,
            Self::Cwl,
            Self::Nextflow,
            Self::Wdl,
            Self::Galaxy,
            Self::Ir,
        ]
    }

    /// Parse an engine identifier (as produced by [`WorkflowFormat::engine`]).
    #[must_use]
    pub fn from_engine(name: &str) -> Option<Self> {
        match name {
            "snakemake" => Some(Self::Snakemake),
            "dagman" => Some(Self::Dagman),
            "cwl" => Some(Self::Cwl),
            "nextflow" => Some(Self::Nextflow),
            "wdl" => Some(Self::Wdl),
            "galaxy" => Some(Self::Galaxy),
            "wf2wf" | "ir" => Some(Self::Ir),
            _ => None,
        }
    }

    /// Detect the format of a file from its name.
    ///
    /// Extensions follow the auto-detection matrix: `.smk` and the bare
    /// filename `Snakefile` (case-insensitive) map to Snakemake; `.dag`,
    /// `.cwl`, `.nf`, `.wdl`, and `.ga` map to their respective formats;
    /// `.json`, `.yaml`, and `.yml` are the IR itself.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.eq_ignore_ascii_case("snakefile") {
            return Some(Self::Snakemake);
        }
        match path.extension()?.to_str()? {
            "smk" => Some(Self::Snakemake),
            "dag" => Some(Self::Dagman),
            "cwl" => Some(Self::Cwl),
            "nf" => Some(Self::Nextflow),
            "wdl" => Some(Self::Wdl),
            "ga" => Some(Self::Galaxy),
            "json" | "yaml" | "yml" => Some(Self::Ir),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
