// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # wf2wf-adapt
//!
//! Retargets environment-specific values between execution models.

use wf2wf_core::{
    Environment, EnvironmentSpecificValue, LossEntry, LossSeverity, LossStatus, Task, Workflow,
    categories,
};
use wf2wf_validate::clamp_resource;

// ── Scaling table ───────────────────────────────────────────────────────

/// Resource fields the adapter scales.
const SCALED_FIELDS: &[&str] = &["mem_mb", "cpu", "disk_mb"];

/// Conservative scaling factor for `field` when moving a value from
/// `source` to `target`. Pairs without an entry copy values unscaled.
#[must_use]
pub fn scaling_factor(field: &str, source: Environment, target: Environment) -> f64 {
    use Environment::{CloudNative, DistributedComputing, SharedFilesystem};
    match (field, source, target) {
        ("mem_mb", SharedFilesystem, DistributedComputing) => 1.10,
        ("mem_mb", SharedFilesystem, CloudNative) => 1.20,
        ("mem_mb", DistributedComputing, CloudNative) => 1.10,
        ("cpu", SharedFilesystem, DistributedComputing) => 1.00,
        ("cpu", SharedFilesystem, CloudNative) => 1.10,
        ("cpu", DistributedComputing, CloudNative) => 1.10,
        ("disk_mb", SharedFilesystem, DistributedComputing) => 1.50,
        ("disk_mb", SharedFilesystem, CloudNative) => 2.00,
        ("disk_mb", DistributedComputing, CloudNative) => 1.40,
        _ => 1.00,
    }
}

/// Scale and clamp one value.
#[must_use]
fn scale_value(field: &str, value: i64, factor: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let scaled = (value as f64 * factor).round() as i64;
    clamp_resource(field, scaled)
}

// ── Adaptation ──────────────────────────────────────────────────────────

/// Summary of one adaptation pass, used for the side-car header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptationOutcome {
    /// Environment values were adapted from.
    pub source: Environment,
    /// Environment values were adapted to.
    pub target: Environment,
    /// Values scaled across the pair.
    pub scaled: usize,
    /// Feature fallbacks applied.
    pub fallbacks: usize,
}

impl AdaptationOutcome {
    /// Whether the pass changed anything.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.scaled > 0 || self.fallbacks > 0
    }
}

/// Adapt every task of `workflow` from `source` to `target`.
///
/// Policy per field: a value already carrying `target` is untouched and
/// records nothing; otherwise the source value (with default fallback) is
/// scaled, clamped to the validator bounds, and bound to `target` only.
/// Each adaptation appends an `adapted` loss entry with full details to
/// `losses`.
pub fn adapt_workflow(
    workflow: &mut Workflow,
    source: Environment,
    target: Environment,
    losses: &mut Vec<LossEntry>,
) -> AdaptationOutcome {
    let mut outcome = AdaptationOutcome {
        source,
        target,
        scaled: 0,
        fallbacks: 0,
    };
    if source == target {
        return outcome;
    }
    let ids: Vec<String> = workflow.task_ids().map(str::to_owned).collect();
    for id in ids {
        if let Some(task) = workflow.task_mut(&id) {
            adapt_task(task, source, target, losses, &mut outcome);
            copy_unscaled_fields(task, source, target);
        }
    }
    outcome
}

fn adapt_task(
    task: &mut Task,
    source: Environment,
    target: Environment,
    losses: &mut Vec<LossEntry>,
    outcome: &mut AdaptationOutcome,
) {
    for &field in SCALED_FIELDS {
        let esv = resource_field_mut(task, field);
        if esv.has_env(target) {
            continue;
        }
        let Some(&original) = esv.get_with_default(source) else {
            continue;
        };
        let factor = scaling_factor(field, source, target);
        let adapted = scale_value(field, original, factor);
        esv.set_for(target, adapted);
        outcome.scaled += 1;
        losses.push(
            LossEntry::new(
                format!("/tasks/{}/{field}", task.id),
                field,
                serde_json::json!(original),
                format!(
                    "value retargeted from {source} to {target}",
                ),
                categories::ENVIRONMENT_SPECIFIC,
            )
            .status(LossStatus::Adapted)
            .severity(LossSeverity::Info)
            .environment(serde_json::json!({
                "source_environment": source.as_str(),
                "target_environment": target.as_str(),
            }))
            .adaptation(serde_json::json!({
                "original_value": original,
                "adapted_value": adapted,
                "adaptation_method": format!("scale×{factor:.2}"),
            })),
        );
    }

    // Feature fallback: a target without GPU scheduling gets a CPU-only
    // profile in place of the GPU request.
    if !target.supports_gpu()
        && !task.gpu.has_env(target)
        && let Some(&gpus) = task.gpu.get_with_default(source)
        && gpus > 0
    {
        task.gpu.set_for(target, 0);
        outcome.fallbacks += 1;
        tracing::warn!(
            target: "wf2wf_adapt",
            task = %task.id,
            "target environment {target} cannot schedule GPUs; falling back to CPU-only"
        );
        losses.push(
            LossEntry::new(
                format!("/tasks/{}/gpu", task.id),
                "gpu",
                serde_json::json!(gpus),
                format!("{target} has no GPU scheduling; replaced with CPU-only profile"),
                categories::ENVIRONMENT_SPECIFIC,
            )
            .status(LossStatus::Adapted)
            .severity(LossSeverity::Warn)
            .environment(serde_json::json!({
                "source_environment": source.as_str(),
                "target_environment": target.as_str(),
            }))
            .adaptation(serde_json::json!({
                "original_value": gpus,
                "adapted_value": 0,
                "adaptation_method": "gpu_fallback",
            }))
            .suggest(vec![
                "re-target an environment with GPU scheduling to keep the request".to_string(),
            ]),
        );
    }
}

fn resource_field_mut<'a>(task: &'a mut Task, field: &str) -> &'a mut EnvironmentSpecificValue<i64> {
    match field {
        "mem_mb" => &mut task.mem_mb,
        "cpu" => &mut task.cpu,
        "disk_mb" => &mut task.disk_mb,
        _ => unreachable!("SCALED_FIELDS is a fixed table"),
    }
}

/// Copy a non-scaled field to the target environment when it only carries
/// a source value. Identity copies record no loss entries.
fn copy_field<T: Clone>(
    field: &mut EnvironmentSpecificValue<T>,
    source: Environment,
    target: Environment,
) {
    if field.has_env(target) {
        return;
    }
    if let Some(value) = field.get_with_default(source).cloned() {
        field.set_for(target, value);
    }
}

fn copy_unscaled_fields(task: &mut Task, source: Environment, target: Environment) {
    copy_field(&mut task.command, source, target);
    copy_field(&mut task.script, source, target);
    copy_field(&mut task.time_s, source, target);
    copy_field(&mut task.threads, source, target);
    copy_field(&mut task.gpu_mem_mb, source, target);
    copy_field(&mut task.gpu_capability, source, target);
    copy_field(&mut task.conda, source, target);
    copy_field(&mut task.container, source, target);
    copy_field(&mut task.workdir, source, target);
    copy_field(&mut task.env_vars, source, target);
    copy_field(&mut task.modules, source, target);
    copy_field(&mut task.retry_count, source, target);
    copy_field(&mut task.retry_policy, source, target);
    copy_field(&mut task.priority, source, target);
    copy_field(&mut task.file_transfer_mode, source, target);
    copy_field(&mut task.checkpointing, source, target);
    copy_field(&mut task.logging, source, target);
    copy_field(&mut task.security, source, target);
    copy_field(&mut task.networking, source, target);
    if target.supports_gpu() {
        copy_field(&mut task.gpu, source, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf2wf_core::TaskBuilder;

    fn workflow_with_mem(mem: i64) -> Workflow {
        let mut wf = Workflow::new("demo", "1.0");
        wf.add_task(
            TaskBuilder::new("align")
                .on(Environment::SharedFilesystem)
                .mem_mb(mem)
                .build(),
        )
        .unwrap();
        wf
    }

    #[test]
    fn shared_to_distributed_memory_scaling() {
        let mut wf = workflow_with_mem(10_240);
        let mut losses = Vec::new();
        let outcome = adapt_workflow(
            &mut wf,
            Environment::SharedFilesystem,
            Environment::DistributedComputing,
            &mut losses,
        );
        assert!(outcome.changed());

        let mem = &wf.task("align").unwrap().mem_mb;
        assert_eq!(mem.get_for(Environment::DistributedComputing), Some(&11_264));
        // Source value unchanged.
        assert_eq!(mem.get_for(Environment::SharedFilesystem), Some(&10_240));

        let entry = losses
            .iter()
            .find(|e| e.field == "mem_mb")
            .expect("mem_mb adaptation entry");
        assert_eq!(entry.category, categories::ENVIRONMENT_SPECIFIC);
        assert_eq!(entry.status, LossStatus::Adapted);
        let details = entry.adaptation_details.as_ref().unwrap();
        assert_eq!(details["original_value"], 10_240);
        assert_eq!(details["adapted_value"], 11_264);
        assert_eq!(details["adaptation_method"], "scale×1.10");
    }

    #[test]
    fn existing_target_value_is_untouched() {
        let mut wf = workflow_with_mem(10_240);
        wf.task_mut("align")
            .unwrap()
            .mem_mb
            .set_for(Environment::DistributedComputing, 4096);
        let mut losses = Vec::new();
        let outcome = adapt_workflow(
            &mut wf,
            Environment::SharedFilesystem,
            Environment::DistributedComputing,
            &mut losses,
        );
        assert_eq!(outcome.scaled, 0);
        assert!(losses.is_empty());
        assert_eq!(
            wf.task("align").unwrap().mem_mb.get_for(Environment::DistributedComputing),
            Some(&4096)
        );
    }

    #[test]
    fn cpu_scaling_to_cloud_clamps_to_bounds() {
        let mut wf = Workflow::new("demo", "1.0");
        wf.add_task(
            TaskBuilder::new("wide")
                .on(Environment::SharedFilesystem)
                .cpu(1000)
                .build(),
        )
        .unwrap();
        let mut losses = Vec::new();
        adapt_workflow(
            &mut wf,
            Environment::SharedFilesystem,
            Environment::CloudNative,
            &mut losses,
        );
        // 1000 × 1.10 = 1100, clamped to the cpu upper bound.
        assert_eq!(
            wf.task("wide").unwrap().cpu.get_for(Environment::CloudNative),
            Some(&1024)
        );
    }

    #[test]
    fn unlisted_pair_copies_unscaled() {
        let mut wf = workflow_with_mem(2048);
        let mut losses = Vec::new();
        adapt_workflow(
            &mut wf,
            Environment::SharedFilesystem,
            Environment::Hybrid,
            &mut losses,
        );
        assert_eq!(
            wf.task("align").unwrap().mem_mb.get_for(Environment::Hybrid),
            Some(&2048)
        );
        let entry = losses.iter().find(|e| e.field == "mem_mb").unwrap();
        assert_eq!(
            entry.adaptation_details.as_ref().unwrap()["adaptation_method"],
            "scale×1.00"
        );
    }

    #[test]
    fn gpu_fallback_for_local_target() {
        let mut wf = Workflow::new("demo", "1.0");
        wf.add_task(
            TaskBuilder::new("train")
                .on(Environment::DistributedComputing)
                .gpu(2)
                .build(),
        )
        .unwrap();
        let mut losses = Vec::new();
        let outcome = adapt_workflow(
            &mut wf,
            Environment::DistributedComputing,
            Environment::Local,
            &mut losses,
        );
        assert_eq!(outcome.fallbacks, 1);
        let task = wf.task("train").unwrap();
        assert_eq!(task.gpu.get_for(Environment::Local), Some(&0));
        assert_eq!(task.gpu.get_for(Environment::DistributedComputing), Some(&2));
        let entry = losses.iter().find(|e| e.field == "gpu").unwrap();
        assert_eq!(entry.status, LossStatus::Adapted);
        assert_eq!(entry.severity, LossSeverity::Warn);
    }

    #[test]
    fn same_environment_is_a_no_op() {
        let mut wf = workflow_with_mem(1024);
        let mut losses = Vec::new();
        let outcome = adapt_workflow(
            &mut wf,
            Environment::SharedFilesystem,
            Environment::SharedFilesystem,
            &mut losses,
        );
        assert!(!outcome.changed());
        assert!(losses.is_empty());
    }

    #[test]
    fn adaptation_is_idempotent() {
        let mut wf = workflow_with_mem(10_240);
        let mut losses = Vec::new();
        adapt_workflow(
            &mut wf,
            Environment::SharedFilesystem,
            Environment::DistributedComputing,
            &mut losses,
        );
        let snapshot = wf.clone();
        let mut second_losses = Vec::new();
        let outcome = adapt_workflow(
            &mut wf,
            Environment::SharedFilesystem,
            Environment::DistributedComputing,
            &mut second_losses,
        );
        assert_eq!(wf, snapshot);
        assert_eq!(outcome.scaled, 0);
        assert!(second_losses.is_empty());
    }
}
