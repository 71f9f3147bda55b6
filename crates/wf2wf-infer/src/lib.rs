// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # wf2wf-infer
//!
//! Deterministic filling of omitted but deducible workflow fields.

/// Execution-model detection.
pub mod detect;
/// Conda ↔ container conversion.
pub mod environment;
/// Command-pattern resource inference.
pub mod resources;
/// Transfer-mode classification.
pub mod transfer;

pub use detect::{ExecutionModelDetector, ModelScore};
pub use environment::{derive_conda, derive_container, infer_task_environment};
pub use resources::{MinimumProfile, infer_task_resources, match_command, minimum_profile};
pub use transfer::{classify_parameters, classify_transfer};

use wf2wf_core::{Environment, Workflow, native_environment};
use wf2wf_format::WorkflowFormat;

/// Metadata key carrying the detected execution model.
pub const EXECUTION_MODEL_KEY: &str = "execution_model";
/// Metadata key carrying the detection confidence.
pub const EXECUTION_MODEL_CONFIDENCE_KEY: &str = "execution_model_confidence";

/// Summary of one inference run.
#[derive(Debug, Clone, Default)]
pub struct InferenceReport {
    /// Detected execution model, when detection ran.
    pub detected: Option<Environment>,
    /// Detection confidence.
    pub confidence: f64,
    /// Resource fields filled from matched rules.
    pub resources_from_rules: usize,
    /// Resource fields filled from the minimum profile.
    pub resources_from_minimum: usize,
    /// Tasks whose software environment was synthesised.
    pub environments_synthesised: usize,
    /// Tasks given an inferred retry policy.
    pub retries_assigned: usize,
    /// Parameters whose transfer mode was classified.
    pub transfers_classified: usize,
    /// Advisory warnings (conservative defaults chosen).
    pub warnings: Vec<String>,
}

/// Run the full inference pass over a workflow.
///
/// Stages run in a fixed order: execution-model detection, resource
/// inference, environment inference, error-handling inference, and
/// file-transfer classification. Every inferred value binds to
/// `target_env` only; source-environment values stay intact. The pass is
/// idempotent.
pub fn run_inference(
    workflow: &mut Workflow,
    source: WorkflowFormat,
    target: WorkflowFormat,
    target_env: Environment,
) -> InferenceReport {
    let mut report = InferenceReport::default();

    // 1. Execution-model detection. The winner is the "chosen"
    //    environment later stages read source values for.
    let detection = ExecutionModelDetector::new().detect(workflow, source);
    let source_env = detection.environment;
    workflow.metadata.insert(
        EXECUTION_MODEL_KEY.into(),
        serde_json::json!(source_env.as_str()),
    );
    workflow.metadata.insert(
        EXECUTION_MODEL_CONFIDENCE_KEY.into(),
        serde_json::json!((detection.confidence * 100.0).round() / 100.0),
    );
    report.detected = Some(source_env);
    report.confidence = detection.confidence;

    // 2. Resource inference.
    for task in workflow.tasks_mut() {
        let matched = task
            .effective_command(source_env)
            .is_some_and(|cmd| match_command(cmd).is_some());
        let outcome = infer_task_resources(task, source_env, target_env, target);
        report.resources_from_rules += outcome.from_rule;
        report.resources_from_minimum += outcome.from_minimum;
        if outcome.from_minimum > 0 && !matched {
            let warning = format!(
                "no resource rule matched task `{}`; applied the {} minimum profile",
                task.id,
                target.label()
            );
            tracing::warn!(target: "wf2wf_infer", "{warning}");
            report.warnings.push(warning);
        }
    }

    // 3. Environment inference.
    for task in workflow.tasks_mut() {
        if infer_task_environment(task, source_env, target_env, target) {
            report.environments_synthesised += 1;
        }
    }

    // 4. Error-handling inference. The trigger is the target format's
    //    execution model, not where the values happen to be bound.
    let distributed_target = matches!(
        native_environment(target),
        Environment::DistributedComputing | Environment::CloudNative
    );
    if distributed_target {
        for task in workflow.tasks_mut() {
            if task.retry_count.get_with_default(source_env).is_none()
                && task.retry_count.get_with_default(target_env).is_none()
            {
                task.retry_count.set_for(target_env, 2);
                task.retry_policy
                    .set_for(target_env, "exponential".to_string());
                report.retries_assigned += 1;
            }
        }
    }

    // 5. File-transfer classification.
    report.transfers_classified += classify_parameters(&mut workflow.inputs);
    report.transfers_classified += classify_parameters(&mut workflow.outputs);
    for task in workflow.tasks_mut() {
        report.transfers_classified += classify_parameters(&mut task.inputs);
        report.transfers_classified += classify_parameters(&mut task.outputs);
    }

    report
}
