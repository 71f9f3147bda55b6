// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution-model detection with scored evidence.

use wf2wf_core::{Environment, TransferMode, Workflow};
use wf2wf_format::WorkflowFormat;

/// A scored execution-model candidate.
#[derive(Debug, Clone)]
pub struct ModelScore {
    /// The candidate environment.
    pub environment: Environment,
    /// Confidence score in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Human-readable evidence strings explaining the score.
    pub evidence: Vec<String>,
}

/// Analyses a workflow and determines the most likely execution model.
#[derive(Debug, Default)]
pub struct ExecutionModelDetector {
    _priv: (),
}

impl ExecutionModelDetector {
    /// Create a new detector.
    #[must_use]
    pub fn new() -> Self {
        Self { _priv: () }
    }

    /// Detect the most likely execution model.
    ///
    /// Always returns a candidate; an empty workflow with no other signal
    /// scores `local` lowest-confidence.
    #[must_use]
    pub fn detect(&self, workflow: &Workflow, source: WorkflowFormat) -> ModelScore {
        self.detect_all(workflow, source)
            .into_iter()
            .next()
            .unwrap_or(ModelScore {
                environment: Environment::Local,
                confidence: 0.1,
                evidence: vec!["no signal; defaulting to local".into()],
            })
    }

    /// Scored results for all environments that matched at least one
    /// heuristic, sorted by descending confidence (ties broken by
    /// environment name for determinism).
    #[must_use]
    pub fn detect_all(&self, workflow: &Workflow, source: WorkflowFormat) -> Vec<ModelScore> {
        let mut results: Vec<ModelScore> = Environment::all()
            .iter()
            .filter_map(|&env| {
                let (confidence, evidence) = score(workflow, source, env);
                (confidence > 0.0).then_some(ModelScore {
                    environment: env,
                    confidence,
                    evidence,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.environment.as_str().cmp(b.environment.as_str()))
        });
        results
    }
}

type Score = (f64, Vec<String>);

fn score(workflow: &Workflow, source: WorkflowFormat, env: Environment) -> Score {
    let mut pts = 0.0_f64;
    let mut ev = Vec::new();

    // Source-format idiom.
    let idiom = match (source, env) {
        (WorkflowFormat::Snakemake, Environment::SharedFilesystem) => 0.5,
        (WorkflowFormat::Nextflow, Environment::SharedFilesystem) => 0.4,
        (WorkflowFormat::Dagman, Environment::DistributedComputing) => 0.6,
        (WorkflowFormat::Cwl, Environment::SharedFilesystem) => 0.3,
        (WorkflowFormat::Wdl, Environment::CloudNative) => 0.35,
        (WorkflowFormat::Wdl, Environment::SharedFilesystem) => 0.15,
        (WorkflowFormat::Galaxy, Environment::SharedFilesystem) => 0.4,
        _ => 0.0,
    };
    if idiom > 0.0 {
        pts += idiom;
        ev.push(format!("{} idiomatically targets {}", source.label(), env));
    }

    let total = workflow.task_count();
    if total == 0 {
        if env == Environment::Local {
            pts += 0.1;
            ev.push("empty workflow".into());
        }
        return (pts.min(1.0), ev);
    }

    // Container density favours cloud execution.
    let with_container = workflow
        .tasks()
        .filter(|t| !t.container.is_unset())
        .count();
    if env == Environment::CloudNative && with_container * 2 > total {
        pts += 0.25;
        ev.push(format!("{with_container}/{total} tasks carry containers"));
    }

    // Explicit transfer modes imply a non-shared filesystem.
    let explicit_transfer = workflow.tasks().any(|t| {
        t.inputs
            .iter()
            .chain(t.outputs.iter())
            .any(|p| matches!(p.transfer_mode, TransferMode::Always | TransferMode::Never))
    });
    if env == Environment::DistributedComputing && explicit_transfer {
        pts += 0.25;
        ev.push("explicit file-transfer modes present".into());
    }

    // Resource magnitude: very large memory suggests a scheduler.
    let big_memory = workflow.tasks().any(|t| {
        t.mem_mb
            .get_with_default(env)
            .or_else(|| t.mem_mb.default_value())
            .is_some_and(|&m| m >= 32_768)
    });
    if env == Environment::DistributedComputing && big_memory {
        pts += 0.1;
        ev.push("memory requests of 32 GB or more".into());
    }

    // GPU requests imply a scheduler that can honour them.
    let wants_gpu = workflow.tasks().any(|t| !t.gpu.is_unset());
    if env == Environment::DistributedComputing && wants_gpu {
        pts += 0.1;
        ev.push("GPU requests present".into());
    }

    (pts.min(1.0), ev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf2wf_core::{Environment, TaskBuilder};

    #[test]
    fn snakemake_defaults_to_shared() {
        let mut wf = Workflow::new("wf", "1.0");
        wf.add_task(TaskBuilder::new("t").command("echo hi").build())
            .unwrap();
        let result = ExecutionModelDetector::new().detect(&wf, WorkflowFormat::Snakemake);
        assert_eq!(result.environment, Environment::SharedFilesystem);
        assert!(result.confidence >= 0.5);
    }

    #[test]
    fn dagman_defaults_to_distributed() {
        let mut wf = Workflow::new("wf", "1.0");
        wf.add_task(TaskBuilder::new("t").command("echo hi").build())
            .unwrap();
        let result = ExecutionModelDetector::new().detect(&wf, WorkflowFormat::Dagman);
        assert_eq!(result.environment, Environment::DistributedComputing);
    }

    #[test]
    fn container_density_boosts_cloud() {
        let mut wf = Workflow::new("wf", "1.0");
        wf.add_task(
            TaskBuilder::new("t")
                .on(Environment::SharedFilesystem)
                .container("docker://alpine:3")
                .build(),
        )
        .unwrap();
        let all = ExecutionModelDetector::new().detect_all(&wf, WorkflowFormat::Ir);
        let cloud = all
            .iter()
            .find(|s| s.environment == Environment::CloudNative)
            .expect("cloud candidate present");
        assert!(cloud.confidence >= 0.25);
        assert!(!cloud.evidence.is_empty());
    }

    #[test]
    fn empty_workflow_scores_local() {
        let wf = Workflow::new("empty", "1.0");
        let result = ExecutionModelDetector::new().detect(&wf, WorkflowFormat::Ir);
        assert_eq!(result.environment, Environment::Local);
    }

    #[test]
    fn detection_is_deterministic() {
        let mut wf = Workflow::new("wf", "1.0");
        wf.add_task(TaskBuilder::new("t").command("echo hi").build())
            .unwrap();
        let detector = ExecutionModelDetector::new();
        let a = detector.detect(&wf, WorkflowFormat::Cwl);
        let b = detector.detect(&wf, WorkflowFormat::Cwl);
        assert_eq!(a.environment, b.environment);
        assert_eq!(a.confidence, b.confidence);
    }
}
