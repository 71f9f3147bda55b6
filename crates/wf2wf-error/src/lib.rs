// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Unified error taxonomy with stable error codes for wf2wf.
//!
//! Every conversion error carries an [`ErrorCode`] (a machine-readable,
//! stable string tag), a human-readable message, an optional cause chain,
//! and arbitrary key-value context. Use the builder returned by
//! [`WfError::new`] to construct errors fluently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Source parsing errors.
    Parse,
    /// IR schema or invariant violations.
    Schema,
    /// Dangling references (edge endpoints, `run:` ids, JSON pointers).
    Reference,
    /// Dependency-graph cycle violations.
    Graph,
    /// Inference-stage advisories.
    Inference,
    /// Interactive prompting outcomes.
    Prompt,
    /// Loss side-car handling.
    Loss,
    /// Environment adaptation advisories.
    Adaptation,
    /// Target emission errors.
    Export,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parse => "parse",
            Self::Schema => "schema",
            Self::Reference => "reference",
            Self::Graph => "graph",
            Self::Inference => "inference",
            Self::Prompt => "prompt",
            Self::Loss => "loss",
            Self::Adaptation => "adaptation",
            Self::Export => "export",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases. Fatal codes abort a
/// conversion; non-fatal codes surface as loss entries or log lines and
/// never alter control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed source document. Fatal.
    ParseError,
    /// The IR violates its JSON Schema or a cross-field invariant. Fatal
    /// after the repair stages have run.
    SchemaError,
    /// Dangling edge endpoint, unknown `run:` id, or unresolvable JSON
    /// pointer. Fatal.
    ReferenceError,
    /// The dependency graph acquired a cycle. Fatal.
    CycleError,
    /// No inference rule matched; a conservative default was chosen.
    /// Non-fatal.
    InferenceWarning,
    /// The user answered `quit` at a prompt. Fatal, with an exit code
    /// distinct from errors.
    PromptCancelled,
    /// Side-car `source_checksum` did not match; the side-car was ignored.
    /// Non-fatal.
    LossSideCarMismatch,
    /// A feature was unavailable in the target environment and replaced
    /// with a fallback. Non-fatal.
    AdaptationFallback,
    /// The target writer failed. Fatal.
    ExportError,
    /// Catch-all for unexpected internal errors. Fatal.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ParseError => ErrorCategory::Parse,
            Self::SchemaError => ErrorCategory::Schema,
            Self::ReferenceError => ErrorCategory::Reference,
            Self::CycleError => ErrorCategory::Graph,
            Self::InferenceWarning => ErrorCategory::Inference,
            Self::PromptCancelled => ErrorCategory::Prompt,
            Self::LossSideCarMismatch => ErrorCategory::Loss,
            Self::AdaptationFallback => ErrorCategory::Adaptation,
            Self::ExportError => ErrorCategory::Export,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns `true` when this code aborts a conversion.
    ///
    /// Non-fatal codes become loss entries or log lines.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InferenceWarning | Self::LossSideCarMismatch | Self::AdaptationFallback
        )
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"PARSE_ERROR"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseError => "PARSE_ERROR",
            Self::SchemaError => "SCHEMA_ERROR",
            Self::ReferenceError => "REFERENCE_ERROR",
            Self::CycleError => "CYCLE_ERROR",
            Self::InferenceWarning => "INFERENCE_WARNING",
            Self::PromptCancelled => "PROMPT_CANCELLED",
            Self::LossSideCarMismatch => "LOSS_SIDE_CAR_MISMATCH",
            Self::AdaptationFallback => "ADAPTATION_FALLBACK",
            Self::ExportError => "EXPORT_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    /// Process exit code for a conversion that failed with this code.
    ///
    /// `PromptCancelled` is distinguishable from ordinary errors.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PromptCancelled => 3,
            _ if self.is_fatal() => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WfError
// ---------------------------------------------------------------------------

/// Unified wf2wf error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use wf2wf_error::{ErrorCode, WfError};
///
/// let err = WfError::new(ErrorCode::ParseError, "unexpected token")
///     .with_context("line", 42)
///     .with_context("file", "Snakefile");
/// ```
pub struct WfError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl WfError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.is_fatal()`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }
}

impl fmt::Debug for WfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("WfError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for WfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for WfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`WfError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WfErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&WfError> for WfErrorDto {
    fn from(err: &WfError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<WfErrorDto> for WfError {
    fn from(dto: WfErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    /// All error codes for exhaustive iteration in tests.
    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::ParseError,
        ErrorCode::SchemaError,
        ErrorCode::ReferenceError,
        ErrorCode::CycleError,
        ErrorCode::InferenceWarning,
        ErrorCode::PromptCancelled,
        ErrorCode::LossSideCarMismatch,
        ErrorCode::AdaptationFallback,
        ErrorCode::ExportError,
        ErrorCode::Internal,
    ];

    #[test]
    fn basic_construction() {
        let err = WfError::new(ErrorCode::Internal, "boom");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = WfError::new(ErrorCode::ParseError, "bad rule block");
        assert_eq!(err.to_string(), "[PARSE_ERROR] bad rule block");
    }

    #[test]
    fn display_with_context() {
        let err = WfError::new(ErrorCode::ParseError, "bad token").with_context("line", 7);
        let s = err.to_string();
        assert!(s.starts_with("[PARSE_ERROR] bad token"));
        assert!(s.contains("line"));
        assert!(s.contains('7'));
    }

    #[test]
    fn categories_cover_all_codes() {
        assert_eq!(ErrorCode::ParseError.category(), ErrorCategory::Parse);
        assert_eq!(ErrorCode::SchemaError.category(), ErrorCategory::Schema);
        assert_eq!(
            ErrorCode::ReferenceError.category(),
            ErrorCategory::Reference
        );
        assert_eq!(ErrorCode::CycleError.category(), ErrorCategory::Graph);
        assert_eq!(
            ErrorCode::InferenceWarning.category(),
            ErrorCategory::Inference
        );
        assert_eq!(ErrorCode::PromptCancelled.category(), ErrorCategory::Prompt);
        assert_eq!(
            ErrorCode::LossSideCarMismatch.category(),
            ErrorCategory::Loss
        );
        assert_eq!(
            ErrorCode::AdaptationFallback.category(),
            ErrorCategory::Adaptation
        );
        assert_eq!(ErrorCode::ExportError.category(), ErrorCategory::Export);
        assert_eq!(ErrorCode::Internal.category(), ErrorCategory::Internal);
    }

    #[test]
    fn fatal_split_matches_taxonomy() {
        assert!(ErrorCode::ParseError.is_fatal());
        assert!(ErrorCode::SchemaError.is_fatal());
        assert!(ErrorCode::ReferenceError.is_fatal());
        assert!(ErrorCode::CycleError.is_fatal());
        assert!(ErrorCode::PromptCancelled.is_fatal());
        assert!(ErrorCode::ExportError.is_fatal());
        assert!(ErrorCode::Internal.is_fatal());
        assert!(!ErrorCode::InferenceWarning.is_fatal());
        assert!(!ErrorCode::LossSideCarMismatch.is_fatal());
        assert!(!ErrorCode::AdaptationFallback.is_fatal());
    }

    #[test]
    fn prompt_cancelled_exit_code_distinct() {
        assert_eq!(ErrorCode::PromptCancelled.exit_code(), 3);
        assert_eq!(ErrorCode::ParseError.exit_code(), 1);
        assert_eq!(ErrorCode::InferenceWarning.exit_code(), 0);
    }

    #[test]
    fn builder_with_context_multiple_keys() {
        let err = WfError::new(ErrorCode::ExportError, "write failed")
            .with_context("path", "/out/wf.dag")
            .with_context("attempt", 2);
        assert_eq!(err.context.len(), 2);
        assert_eq!(err.context["path"], serde_json::json!("/out/wf.dag"));
        assert_eq!(err.context["attempt"], serde_json::json!(2));
    }

    #[test]
    fn builder_with_source() {
        let src = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = WfError::new(ErrorCode::ExportError, "denied").with_source(src);
        assert!(err.source.is_some());
        assert_eq!(err.source.as_ref().unwrap().to_string(), "access denied");
    }

    #[test]
    fn std_error_source_chain() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = WfError::new(ErrorCode::ParseError, "open failed").with_source(inner);
        let src = std::error::Error::source(&err).unwrap();
        assert_eq!(src.to_string(), "not found");
    }

    #[test]
    fn dto_roundtrip_without_source() {
        let err = WfError::new(ErrorCode::SchemaError, "bad IR").with_context("pointer", "/tasks");
        let dto: WfErrorDto = (&err).into();
        let json = serde_json::to_string(&dto).unwrap();
        let back: WfErrorDto = serde_json::from_str(&json).unwrap();
        assert_eq!(dto, back);
        assert!(back.source_message.is_none());
    }

    #[test]
    fn dto_to_wf_error_drops_opaque_source() {
        let dto = WfErrorDto {
            code: ErrorCode::ExportError,
            message: "bad".into(),
            context: BTreeMap::new(),
            source_message: Some("inner".into()),
        };
        let err: WfError = dto.into();
        assert_eq!(err.code, ErrorCode::ExportError);
        assert!(err.source.is_none());
    }

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.as_str()), "duplicate: {}", code.as_str());
        }
        assert_eq!(seen.len(), ALL_CODES.len());
    }

    #[test]
    fn all_codes_serialize_to_as_str() {
        for code in ALL_CODES {
            let json = serde_json::to_string(code).unwrap();
            assert_eq!(json, format!(r#""{}""#, code.as_str()));
        }
    }

    #[test]
    fn error_code_count() {
        // Ensure we don't silently drop a variant from ALL_CODES.
        assert_eq!(ALL_CODES.len(), 10);
    }
}
