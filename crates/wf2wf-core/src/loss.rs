// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loss entries: records of fields a target format could not express.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Closed enumerations ─────────────────────────────────────────────────

/// Who originally supplied the lost value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LossOrigin {
    /// The value came from the user's source workflow.
    User,
    /// The value was produced by the converter itself.
    #[default]
    Wf2wf,
}

/// Lifecycle state of a loss entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LossStatus {
    /// Recorded at export; not representable in the target.
    #[default]
    Lost,
    /// Reinjection was attempted on re-import and failed.
    LostAgain,
    /// Successfully reinjected on re-import.
    Reapplied,
    /// The value was transformed rather than dropped (environment
    /// adaptation, fallback substitution).
    Adapted,
}

/// Severity of a loss entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LossSeverity {
    /// Cosmetic or fully recoverable.
    Info,
    /// Semantics degraded; review recommended.
    #[default]
    Warn,
    /// Semantics materially changed.
    Error,
}

impl LossSeverity {
    /// Wire name of this severity.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Well-known loss categories.
pub mod categories {
    /// Values rewritten by the environment adapter.
    pub const ENVIRONMENT_SPECIFIC: &str = "environment_specific";
    /// Scheduler-level knobs (priority, custom attributes).
    pub const SCHEDULING: &str = "scheduling";
    /// Retry and error-handling semantics.
    pub const ERROR_HANDLING: &str = "error_handling";
    /// GPU and accelerator specifics.
    pub const GPU: &str = "gpu";
    /// Container and software environment detail.
    pub const ENVIRONMENT: &str = "environment";
    /// File-transfer semantics.
    pub const FILE_TRANSFER: &str = "file_transfer";
    /// Interactive/UI metadata.
    pub const UI_METADATA: &str = "ui_metadata";
    /// Regulatory provenance blocks.
    pub const PROVENANCE: &str = "provenance";
    /// Advanced features (checkpointing, logging, security, networking).
    pub const ADVANCED_FEATURES: &str = "advanced_features";
}

// ── LossEntry ───────────────────────────────────────────────────────────

/// A record of a single field a target format could not express.
///
/// Entries accumulate in `Workflow::loss_map` in the order recorded and
/// are serialised into the `.loss.json` side-car next to exported output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LossEntry {
    /// JSON pointer to the affected field in the canonical IR document.
    pub json_pointer: String,
    /// Short field name (last pointer segment, for humans).
    pub field: String,
    /// The value that could not be expressed.
    pub lost_value: serde_json::Value,
    /// Why the target cannot express it.
    pub reason: String,
    /// Who supplied the value.
    #[serde(default)]
    pub origin: LossOrigin,
    /// Lifecycle state.
    #[serde(default)]
    pub status: LossStatus,
    /// Severity.
    #[serde(default)]
    pub severity: LossSeverity,
    /// Category tag (see [`categories`]).
    pub category: String,
    /// Environment the loss pertains to, if environment-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_context: Option<serde_json::Value>,
    /// Details of an adaptation (original/adapted values, method).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptation_details: Option<serde_json::Value>,
    /// Suggestions for recovering the lost semantics manually.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_suggestions: Option<Vec<String>>,
}

impl LossEntry {
    /// Create an entry with default origin (`wf2wf`), status (`lost`), and
    /// severity (`warn`).
    #[must_use]
    pub fn new(
        json_pointer: impl Into<String>,
        field: impl Into<String>,
        lost_value: serde_json::Value,
        reason: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            json_pointer: json_pointer.into(),
            field: field.into(),
            lost_value,
            reason: reason.into(),
            origin: LossOrigin::default(),
            status: LossStatus::default(),
            severity: LossSeverity::default(),
            category: category.into(),
            environment_context: None,
            adaptation_details: None,
            recovery_suggestions: None,
        }
    }

    /// Set the severity, returning `self` for chaining.
    #[must_use]
    pub fn severity(mut self, severity: LossSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the origin, returning `self` for chaining.
    #[must_use]
    pub fn origin(mut self, origin: LossOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Set the status, returning `self` for chaining.
    #[must_use]
    pub fn status(mut self, status: LossStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach adaptation details, returning `self` for chaining.
    #[must_use]
    pub fn adaptation(mut self, details: serde_json::Value) -> Self {
        self.adaptation_details = Some(details);
        self
    }

    /// Attach environment context, returning `self` for chaining.
    #[must_use]
    pub fn environment(mut self, context: serde_json::Value) -> Self {
        self.environment_context = Some(context);
        self
    }

    /// Attach recovery suggestions, returning `self` for chaining.
    #[must_use]
    pub fn suggest(mut self, suggestions: Vec<String>) -> Self {
        self.recovery_suggestions = Some(suggestions);
        self
    }

    /// Whether the entry still represents unexpressed information.
    #[must_use]
    pub fn is_unrecovered(&self) -> bool {
        matches!(self.status, LossStatus::Lost | LossStatus::LostAgain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_registry_policy() {
        let e = LossEntry::new(
            "/tasks/align/priority",
            "priority",
            serde_json::json!(10),
            "target has no job priority",
            categories::SCHEDULING,
        );
        assert_eq!(e.origin, LossOrigin::Wf2wf);
        assert_eq!(e.status, LossStatus::Lost);
        assert_eq!(e.severity, LossSeverity::Warn);
        assert!(e.is_unrecovered());
    }

    #[test]
    fn severity_ordering() {
        assert!(LossSeverity::Info < LossSeverity::Warn);
        assert!(LossSeverity::Warn < LossSeverity::Error);
    }

    #[test]
    fn builder_chain() {
        let e = LossEntry::new("/x", "x", serde_json::json!(1), "r", categories::GPU)
            .severity(LossSeverity::Error)
            .origin(LossOrigin::User)
            .status(LossStatus::Adapted)
            .suggest(vec!["re-run with --target cloud_native".into()]);
        assert_eq!(e.severity, LossSeverity::Error);
        assert_eq!(e.origin, LossOrigin::User);
        assert_eq!(e.status, LossStatus::Adapted);
        assert!(!e.is_unrecovered());
    }

    #[test]
    fn serde_roundtrip() {
        let e = LossEntry::new(
            "/tasks/align/gpu",
            "gpu",
            serde_json::json!(2),
            "format cannot express GPU counts",
            categories::GPU,
        )
        .environment(serde_json::json!({"environment": "distributed_computing"}));
        let json = serde_json::to_string(&e).unwrap();
        let back: LossEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn wire_names_snake_case() {
        assert_eq!(
            serde_json::to_string(&LossStatus::LostAgain).unwrap(),
            r#""lost_again""#
        );
        assert_eq!(
            serde_json::to_string(&LossOrigin::Wf2wf).unwrap(),
            r#""wf2wf""#
        );
        assert_eq!(
            serde_json::to_string(&LossSeverity::Warn).unwrap(),
            r#""warn""#
        );
    }
}
