// SPDX-License-Identifier: MIT OR Apache-2.0
//! The fixed conversion pipeline.

use crate::ir_bridge::{IrExporter, IrImporter};
use crate::report::ConversionReport;
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use wf2wf_config::ConversionOptions;
use wf2wf_core::{
    Environment, ExportError, LossEntry, LossSeverity, LossStatus, ParseError, SourceParser,
    TargetEmitter, Workflow, categories, native_environment, source_checksum,
};
use wf2wf_error::{ErrorCode, WfError, WfErrorDto};
use wf2wf_format::WorkflowFormat;
use wf2wf_loss::{EnvironmentAdaptationInfo, LossRegistry, LossSummary, SideCarError};
use wf2wf_prompt::{ConsoleSource, Prompt, PromptError, PromptSource, Prompter, headless_from_env};
use wf2wf_validate::{SchemaValidator, ValidateError};

/// Container applied when an isolation-preferring target has neither a
/// container nor a conda spec to derive one from.
pub const DEFAULT_CONTAINER: &str = "docker://wf2wf/default:latest";

// ── Errors ──────────────────────────────────────────────────────────────

/// Fatal pipeline errors. Non-fatal events become loss entries or log
/// lines and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The format of a path could not be determined.
    #[error("cannot determine workflow format of `{path}`")]
    UnknownFormat {
        /// The undetectable path.
        path: PathBuf,
    },
    /// Source parsing failed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The IR failed validation after the repair stages.
    #[error(transparent)]
    Validate(#[from] ValidateError),
    /// The user cancelled at a prompt.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// Target emission failed.
    #[error(transparent)]
    Export(#[from] ExportError),
    /// Writing the loss side-car failed.
    #[error(transparent)]
    SideCar(#[from] SideCarError),
}

impl PipelineError {
    /// Stable taxonomy code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownFormat { .. } => ErrorCode::ParseError,
            Self::Parse(ParseError::Reference { .. }) => ErrorCode::ReferenceError,
            Self::Parse(ParseError::Graph(g)) => match g {
                wf2wf_core::GraphError::CycleIntroduced { .. }
                | wf2wf_core::GraphError::CycleDetected { .. } => ErrorCode::CycleError,
                _ => ErrorCode::ReferenceError,
            },
            Self::Parse(_) => ErrorCode::ParseError,
            Self::Validate(_) => ErrorCode::SchemaError,
            Self::Prompt(PromptError::Cancelled { .. }) => ErrorCode::PromptCancelled,
            Self::Prompt(_) => ErrorCode::Internal,
            Self::Export(_) => ErrorCode::ExportError,
            Self::SideCar(_) => ErrorCode::ExportError,
        }
    }

    fn to_dto(&self) -> WfErrorDto {
        (&WfError::new(self.code(), self.to_string())).into()
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────

/// The importer for a format, honouring the conversion options.
#[must_use]
pub fn importer_for(format: WorkflowFormat, options: &ConversionOptions) -> Box<dyn SourceParser> {
    match format {
        WorkflowFormat::Snakemake => Box::new(snakemake_bridge::SnakemakeImporter::with_dry_run(
            snakemake_bridge::DryRunOptions {
                enabled: options.dry_run_enrichment,
                timeout_s: options.dry_run_timeout_s,
                program: "snakemake".to_string(),
            },
        )),
        WorkflowFormat::Dagman => Box::new(dagman_bridge::DagmanImporter::new()),
        WorkflowFormat::Cwl => Box::new(cwl_bridge::CwlImporter::new()),
        WorkflowFormat::Nextflow => Box::new(nextflow_bridge::NextflowImporter::new()),
        WorkflowFormat::Wdl => Box::new(wdl_bridge::WdlImporter::new()),
        WorkflowFormat::Galaxy => Box::new(galaxy_bridge::GalaxyImporter::new()),
        WorkflowFormat::Ir => Box::new(IrImporter::new()),
    }
}

/// The emitter for a format, bound to the adaptation target environment.
#[must_use]
pub fn emitter_for(
    format: WorkflowFormat,
    environment: Environment,
    options: &ConversionOptions,
) -> Box<dyn TargetEmitter> {
    match format {
        WorkflowFormat::Snakemake => {
            Box::new(snakemake_bridge::SnakemakeExporter::for_environment(environment))
        }
        WorkflowFormat::Dagman => Box::new(
            dagman_bridge::DagmanExporter::new()
                .with_mode(if options.dagman_inline {
                    dagman_bridge::SubmitMode::Inline
                } else {
                    dagman_bridge::SubmitMode::Traditional
                })
                .for_environment(environment),
        ),
        WorkflowFormat::Cwl => Box::new(cwl_bridge::CwlExporter::for_environment(environment)),
        WorkflowFormat::Nextflow => {
            Box::new(nextflow_bridge::NextflowExporter::for_environment(environment))
        }
        WorkflowFormat::Wdl => Box::new(wdl_bridge::WdlExporter::for_environment(environment)),
        WorkflowFormat::Galaxy => {
            Box::new(galaxy_bridge::GalaxyExporter::for_environment(environment))
        }
        WorkflowFormat::Ir => Box::new(IrExporter::new()),
    }
}

// ── Conversion ──────────────────────────────────────────────────────────

/// Convert `src` to `dst`, auto-detecting both formats from filenames.
///
/// Prompts on the console unless headless; see
/// [`convert_with_prompter`] for a custom prompt source.
///
/// # Errors
///
/// Any fatal [`PipelineError`]; non-fatal events become loss entries.
pub fn convert(
    src: &Path,
    dst: &Path,
    options: &ConversionOptions,
) -> Result<ConversionReport, PipelineError> {
    let mut prompter = Prompter::new(
        ConsoleSource::new(),
        options.headless || headless_from_env(),
    );
    convert_with_prompter(src, dst, None, None, options, &mut prompter)
}

/// Convert with explicit formats and a caller-supplied prompt source.
///
/// # Errors
///
/// Any fatal [`PipelineError`].
pub fn convert_with_prompter<S: PromptSource>(
    src: &Path,
    dst: &Path,
    src_format: Option<WorkflowFormat>,
    dst_format: Option<WorkflowFormat>,
    options: &ConversionOptions,
    prompter: &mut Prompter<S>,
) -> Result<ConversionReport, PipelineError> {
    let started_at = Utc::now();
    let src_format = match src_format.or_else(|| WorkflowFormat::from_path(src)) {
        Some(format) => format,
        None => {
            return Err(PipelineError::UnknownFormat {
                path: src.to_path_buf(),
            });
        }
    };
    let dst_format = match dst_format.or_else(|| WorkflowFormat::from_path(dst)) {
        Some(format) => format,
        None => {
            return Err(PipelineError::UnknownFormat {
                path: dst.to_path_buf(),
            });
        }
    };
    // Stage 0: a fresh registry per conversion.
    let mut registry = LossRegistry::new();
    registry.reset();

    // Stage 1: import.
    let importer = importer_for(src_format, options);
    let mut workflow = importer.parse_source(src)?;

    // Stage 2: reapply an adjacent side-car. Read errors are warnings.
    reapply_sidecar(&mut registry, &mut workflow, src);

    // The environment values are emitted for: an explicit retarget when
    // the caller asked for one, otherwise the model detected for the
    // source (values pass through unscaled).
    let detection =
        wf2wf_infer::ExecutionModelDetector::new().detect(&workflow, src_format);
    let source_env = Some(detection.environment);
    let emit_env = options
        .target_environment
        .unwrap_or(detection.environment);

    // Stage 3: inference.
    let inference = wf2wf_infer::run_inference(&mut workflow, src_format, dst_format, emit_env);

    // Stage 4: prompting for gaps inference could not close. Container
    // isolation is mandatory only under a cloud-native effective target.
    let effective_target = options
        .target_environment
        .unwrap_or_else(|| native_environment(dst_format));
    apply_container_prompts(
        &mut workflow,
        &mut registry,
        dst_format,
        effective_target,
        detection.environment,
        emit_env,
        prompter,
    )?;

    // Stage 5: environment adaptation. Runs only on an explicit retarget;
    // the default flow emits source values verbatim.
    let mut adaptation_losses: Vec<LossEntry> = Vec::new();
    let adaptation = match (options.target_environment, source_env) {
        (Some(target), Some(source)) => Some(wf2wf_adapt::adapt_workflow(
            &mut workflow,
            source,
            target,
            &mut adaptation_losses,
        )),
        _ => None,
    };
    registry.record_all(adaptation_losses);

    // The IR's loss map mirrors the registry: reapplied side-car entries,
    // prompt decisions, and adaptations, in recording order. A loss map
    // carried inside an imported IR document survives when this
    // conversion recorded nothing of its own.
    if !registry.is_empty() {
        workflow.loss_map = registry.entries().to_vec();
    }

    // Stage 6: validation, fatal after the repair stages.
    let validator = SchemaValidator::new()?;
    validator.ensure_valid(&workflow)?;

    // Stage 7: export. Losses are detected before emission; the side-car
    // is written after.
    let emitter = emitter_for(dst_format, emit_env, options);
    let export_losses = emitter.detect_losses(&workflow);
    registry.record_all(export_losses.clone());
    workflow.loss_map.extend(export_losses);

    let checksum = source_checksum(&workflow)
        .map_err(|e| ExportError::invalid(format!("checksum failed: {e}")))?;
    let output_paths = emitter.generate_output(&workflow, dst)?;

    let adaptation_info = adaptation.as_ref().filter(|a| a.changed()).map(|outcome| {
        EnvironmentAdaptationInfo {
            source_environment: outcome.source.as_str().to_string(),
            target_environment: outcome.target.as_str().to_string(),
            adaptation_type: "resource_scaling".to_string(),
        }
    });
    let sidecar_path = registry.write(dst, dst_format.engine(), &checksum, adaptation_info)?;

    Ok(ConversionReport {
        report_id: Uuid::new_v4(),
        source_path: src.to_path_buf(),
        output_paths,
        sidecar_path: Some(sidecar_path),
        source_format: src_format,
        target_format: dst_format,
        source_environment: source_env,
        target_environment: emit_env,
        detection_confidence: inference.confidence,
        losses: LossSummary::of(registry.entries()),
        unrecovered: ConversionReport::unrecovered_of(registry.entries()),
        prompts: prompter.transcript().to_vec(),
        fail_on_loss: options.fail_on_loss,
        started_at,
        finished_at: Utc::now(),
        error: None,
    })
}

/// Convert, folding any fatal error into the returned report.
///
/// This is the surface outer front ends use: the report always exists and
/// `exit_code()` encodes the outcome.
#[must_use]
pub fn run_conversion(src: &Path, dst: &Path, options: &ConversionOptions) -> ConversionReport {
    let started_at = Utc::now();
    match convert(src, dst, options) {
        Ok(report) => report,
        Err(error) => ConversionReport {
            report_id: Uuid::new_v4(),
            source_path: src.to_path_buf(),
            output_paths: Vec::new(),
            sidecar_path: None,
            source_format: WorkflowFormat::from_path(src).unwrap_or(WorkflowFormat::Ir),
            target_format: WorkflowFormat::from_path(dst).unwrap_or(WorkflowFormat::Ir),
            source_environment: None,
            target_environment: WorkflowFormat::from_path(dst)
                .map(native_environment)
                .unwrap_or(Environment::Local),
            detection_confidence: 0.0,
            losses: LossSummary::default(),
            unrecovered: Vec::new(),
            prompts: Vec::new(),
            fail_on_loss: options.fail_on_loss,
            started_at,
            finished_at: Utc::now(),
            error: Some(error.to_dto()),
        },
    }
}

/// Stage 2: read `<src>.loss.json` and reinject entries.
///
/// A side-car written by an IR export can be verified against the
/// re-imported document; on checksum mismatch it is ignored without
/// mutating the workflow. Side-cars from native-format exports cannot be
/// re-derived (the export-time IR is exactly what the side-car exists to
/// reconstruct), so they are applied on adjacency.
fn reapply_sidecar(registry: &mut LossRegistry, workflow: &mut Workflow, src: &Path) {
    match LossRegistry::read_adjacent(src) {
        Ok(Some(doc)) => {
            if doc.target_engine == WorkflowFormat::Ir.engine() && !doc.matches(workflow) {
                tracing::warn!(
                    target: "wf2wf_pipeline",
                    "side-car checksum does not match the imported IR; ignoring side-car"
                );
                return;
            }
            let outcome = registry.apply(workflow, doc.entries);
            tracing::info!(
                target: "wf2wf_pipeline",
                reapplied = outcome.reapplied,
                lost_again = outcome.lost_again,
                "side-car reapplied"
            );
        }
        Ok(None) => {}
        Err(err) => {
            // Non-fatal by policy.
            tracing::warn!(target: "wf2wf_pipeline", "unreadable side-car: {err}");
        }
    }
}

/// Stage 4: isolation-preferring targets get a container on every task,
/// by consent.
fn apply_container_prompts<S: PromptSource>(
    workflow: &mut Workflow,
    registry: &mut LossRegistry,
    dst_format: WorkflowFormat,
    effective_target: Environment,
    source_env: Environment,
    target_env: Environment,
    prompter: &mut Prompter<S>,
) -> Result<(), PromptError> {
    let applicable = effective_target == Environment::CloudNative;
    let ids: Vec<String> = workflow
        .tasks()
        .filter(|t| {
            t.container.get_with_default(target_env).is_none()
                && t.container.get_with_default(source_env).is_none()
                && t.conda.get_with_default(target_env).is_none()
                && t.conda.get_with_default(source_env).is_none()
        })
        .map(|t| t.id.clone())
        .collect();
    for id in ids {
        let prompt = Prompt::new(
            "apply_default_container",
            format!(
                "{} requires container isolation but task `{id}` has none. Apply the default image?",
                dst_format.label()
            ),
            true,
        );
        if prompter.confirm_when(applicable, &prompt)? && applicable {
            if let Some(task) = workflow.task_mut(&id) {
                task.container
                    .set_for(target_env, DEFAULT_CONTAINER.to_string());
            }
            registry.record(
                LossEntry::new(
                    format!("/tasks/{id}/container"),
                    "container",
                    serde_json::Value::Null,
                    "no container specified; the documented default image was applied",
                    categories::ENVIRONMENT,
                )
                .status(LossStatus::Adapted)
                .severity(LossSeverity::Info)
                .adaptation(serde_json::json!({
                    "original_value": null,
                    "adapted_value": DEFAULT_CONTAINER,
                    "adaptation_method": "default_container",
                })),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf2wf_prompt::ScriptedSource;

    const SNAKEFILE: &str = r#"rule align:
    input:
        "r.fq"
    output:
        "r.bam"
    threads: 4
    resources:
        mem_mb=8000
    container: "docker://bwa:latest"
    shell:
        "bwa mem r.fq > r.bam"
"#;

    fn write_source(dir: &Path) -> PathBuf {
        let src = dir.join("wf.smk");
        std::fs::write(&src, SNAKEFILE).unwrap();
        src
    }

    fn headless() -> Prompter<ScriptedSource> {
        Prompter::new(ScriptedSource::new([]), true)
    }

    #[test]
    fn snakemake_to_dagman_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_source(dir.path());
        let dst = dir.path().join("wf.dag");
        let report = convert_with_prompter(
            &src,
            &dst,
            None,
            None,
            &ConversionOptions::default(),
            &mut headless(),
        )
        .unwrap();

        assert_eq!(report.source_format, WorkflowFormat::Snakemake);
        assert_eq!(report.target_format, WorkflowFormat::Dagman);
        // No explicit retarget: values are emitted for the detected model.
        assert_eq!(report.target_environment, Environment::SharedFilesystem);
        assert_eq!(report.exit_code(), 0);
        assert!(dst.exists());
        assert!(report.sidecar_path.as_ref().unwrap().exists());

        let dag = std::fs::read_to_string(&dst).unwrap();
        assert!(dag.contains("JOB align {"));
        assert!(dag.contains("request_cpus = 4"));
        // Source memory passes through unscaled in the default flow.
        assert!(dag.contains("request_memory = 8000MB"));
        assert!(dag.contains("universe = docker"));
        // Distributed target without a retry policy gets one inferred.
        assert!(dag.contains("RETRY align 2"));
    }

    #[test]
    fn explicit_retarget_scales_resources() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_source(dir.path());
        let dst = dir.path().join("wf.dag");
        let mut options = ConversionOptions::default();
        options.target_environment = Some(Environment::DistributedComputing);
        let report =
            convert_with_prompter(&src, &dst, None, None, &options, &mut headless()).unwrap();
        assert_eq!(
            report.target_environment,
            Environment::DistributedComputing
        );
        let dag = std::fs::read_to_string(&dst).unwrap();
        // 8000 × 1.10 for shared → distributed.
        assert!(dag.contains("request_memory = 8800MB"));
        // An adaptation entry landed in the side-car.
        assert!(report.losses.by_status.contains_key("adapted"));
    }

    #[test]
    fn unknown_format_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("wf.xyz");
        std::fs::write(&src, "?").unwrap();
        let err = convert(&src, &dir.path().join("wf.dag"), &ConversionOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownFormat { .. }));
        assert_eq!(err.code(), ErrorCode::ParseError);
    }

    #[test]
    fn run_conversion_folds_errors_into_report() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("missing.smk");
        let report = run_conversion(
            &src,
            &dir.path().join("wf.dag"),
            &ConversionOptions::default(),
        );
        assert!(report.error.is_some());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn fail_on_loss_threshold() {
        let dir = tempfile::tempdir().unwrap();
        // A GPU-carrying workflow exported to Snakemake loses the GPU.
        let src = dir.path().join("wf.smk");
        std::fs::write(
            &src,
            "rule train:\n    resources:\n        gpu=2\n    shell:\n        \"train.py\"\n",
        )
        .unwrap();
        let dst = dir.path().join("out.smk");
        let mut options = ConversionOptions::default();
        options.fail_on_loss = Some(LossSeverity::Warn);
        let report = convert_with_prompter(&src, &dst, None, None, &options, &mut headless())
            .unwrap();
        assert!(!report.unrecovered.is_empty());
        assert_eq!(report.exit_code(), 2);
    }
}
