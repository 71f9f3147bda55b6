// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conversion reports and exit-code policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;
use wf2wf_core::{Environment, LossEntry, LossSeverity, LossStatus};
use wf2wf_error::WfErrorDto;
use wf2wf_format::WorkflowFormat;
use wf2wf_loss::LossSummary;
use wf2wf_prompt::PromptRecord;

/// A loss entry that still represents unexpressed information, kept in
/// the report for the exit-code policy and for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrecoveredLoss {
    /// Pointer into the IR.
    pub json_pointer: String,
    /// `lost` or `lost_again`.
    pub status: LossStatus,
    /// Entry severity.
    pub severity: LossSeverity,
}

/// The record of one conversion, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Unique id of this conversion run.
    pub report_id: Uuid,
    /// Source document.
    pub source_path: PathBuf,
    /// Files written by the exporter.
    pub output_paths: Vec<PathBuf>,
    /// The side-car written next to the primary output, if any.
    pub sidecar_path: Option<PathBuf>,
    /// Detected or declared source format.
    pub source_format: WorkflowFormat,
    /// Target format.
    pub target_format: WorkflowFormat,
    /// Execution model detected for the source.
    pub source_environment: Option<Environment>,
    /// Execution model targeted by adaptation.
    pub target_environment: Environment,
    /// Detection confidence in `[0.0, 1.0]`.
    pub detection_confidence: f64,
    /// Loss counts by category/severity/status/origin.
    pub losses: LossSummary,
    /// Entries still in `lost` or `lost_again` state.
    pub unrecovered: Vec<UnrecoveredLoss>,
    /// Prompt decisions taken during the conversion.
    pub prompts: Vec<PromptRecord>,
    /// Severity threshold for [`exit_code`](Self::exit_code).
    pub fail_on_loss: Option<LossSeverity>,
    /// When the conversion started.
    pub started_at: DateTime<Utc>,
    /// When the conversion finished (successfully or not).
    pub finished_at: DateTime<Utc>,
    /// The fatal error, when the conversion failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WfErrorDto>,
}

impl ConversionReport {
    /// Collect the unrecovered subset of `entries` for the report.
    #[must_use]
    pub fn unrecovered_of(entries: &[LossEntry]) -> Vec<UnrecoveredLoss> {
        entries
            .iter()
            .filter(|e| e.is_unrecovered())
            .map(|e| UnrecoveredLoss {
                json_pointer: e.json_pointer.clone(),
                status: e.status,
                severity: e.severity,
            })
            .collect()
    }

    /// Process exit code: `0` on success, `1` on fatal error, `3` when the
    /// user cancelled at a prompt, `2` when any unrecovered loss reaches
    /// the fail-on-loss threshold.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if let Some(error) = &self.error {
            return error.code.exit_code();
        }
        if let Some(threshold) = self.fail_on_loss
            && self.unrecovered.iter().any(|u| u.severity >= threshold)
        {
            return 2;
        }
        0
    }
}
