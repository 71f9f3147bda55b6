// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability traits implemented by format bridges.
//!
//! Importers parse a source document into a partial [`Workflow`]; they do
//! not infer, prompt, adapt, or validate — those stages belong to the
//! conversion pipeline. Exporters detect format-specific losses and write
//! native files; they treat the workflow as read-only.

use crate::loss::LossEntry;
use crate::workflow::Workflow;
use std::path::{Path, PathBuf};
use wf2wf_format::WorkflowFormat;

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from parsing a source document. All variants are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Reading the source file failed.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The source is syntactically malformed.
    #[error("syntax error{}: {message}", fmt_line(.line))]
    Syntax {
        /// One-based line number, when known.
        line: Option<usize>,
        /// What went wrong.
        message: String,
    },
    /// A reference inside the source does not resolve (e.g. a `run:` id).
    #[error("unresolved reference `{reference}`: {message}")]
    Reference {
        /// The dangling reference.
        reference: String,
        /// What was expected.
        message: String,
    },
    /// JSON parsing failed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A structural invariant failed while assembling the workflow.
    #[error(transparent)]
    Graph(#[from] crate::workflow::GraphError),
}

fn fmt_line(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" at line {n}"),
        None => String::new(),
    }
}

impl ParseError {
    /// Syntax error with a line number.
    #[must_use]
    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line: Some(line),
            message: message.into(),
        }
    }

    /// Syntax error without a line number.
    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            line: None,
            message: message.into(),
        }
    }
}

/// Errors from emitting a target document. All variants are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Writing an output file failed.
    #[error("failed to write `{path}`: {source}")]
    Io {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Serialising the output document failed.
    #[error("serialisation failed: {0}")]
    Json(#[from] serde_json::Error),
    /// The workflow cannot be represented at all (not merely lossily).
    #[error("cannot emit workflow: {message}")]
    Invalid {
        /// What is unrepresentable.
        message: String,
    },
}

impl ExportError {
    /// I/O failure while writing `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Structural emission failure.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

// ── Capability traits ───────────────────────────────────────────────────

/// The import capability: parse one source format into a partial workflow.
pub trait SourceParser {
    /// The format this parser reads.
    fn source_format(&self) -> WorkflowFormat;

    /// Parse the document at `path` into a partial [`Workflow`].
    ///
    /// # Errors
    ///
    /// Any [`ParseError`] is fatal for the conversion.
    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError>;
}

/// The export capability: detect losses, then write native files.
pub trait TargetEmitter {
    /// The format this emitter writes.
    fn target_format(&self) -> WorkflowFormat;

    /// Record every field of `workflow` the target format cannot express.
    ///
    /// Called before [`generate_output`](Self::generate_output); the
    /// returned entries are appended to the loss registry by the pipeline.
    fn detect_losses(&self, workflow: &Workflow) -> Vec<LossEntry>;

    /// Write the native representation of `workflow` rooted at `path`.
    ///
    /// Returns the paths of all files written (some formats emit several).
    ///
    /// # Errors
    ///
    /// Any [`ExportError`] is fatal for the conversion.
    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError>;
}
