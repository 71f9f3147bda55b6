// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snakemake exporter: one rule per task.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use wf2wf_core::{
    Environment, EnvironmentSpecificValue, ExportError, LossEntry, LossSeverity, TargetEmitter,
    Task, TransferMode, Workflow, categories, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Ceiling division for signed integers (`i64::div_ceil` is not yet stable).
fn div_ceil_i64(lhs: i64, rhs: i64) -> i64 {
    let d = lhs / rhs;
    let r = lhs % rhs;
    if (r > 0 && rhs > 0) || (r < 0 && rhs < 0) {
        d + 1
    } else {
        d
    }
}

/// Exporter for `.smk` files.
#[derive(Debug)]
pub struct SnakemakeExporter {
    /// Environment whose values are written into the rule file.
    pub environment: Environment,
}

impl Default for SnakemakeExporter {
    fn default() -> Self {
        Self {
            environment: native_environment(WorkflowFormat::Snakemake),
        }
    }
}

impl SnakemakeExporter {
    /// Exporter reading values for the format's native environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter reading values for `environment`.
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self { environment }
    }

    fn value<'a, T>(&self, field: &'a EnvironmentSpecificValue<T>) -> Option<&'a T> {
        field.get_with_default(self.environment)
    }
}

impl TargetEmitter for SnakemakeExporter {
    fn target_format(&self) -> WorkflowFormat {
        WorkflowFormat::Snakemake
    }

    fn detect_losses(&self, workflow: &Workflow) -> Vec<LossEntry> {
        let mut losses = Vec::new();
        for task in workflow.tasks() {
            let id = &task.id;
            for (field, esv) in [
                ("gpu", &task.gpu),
                ("gpu_mem_mb", &task.gpu_mem_mb),
            ] {
                if let Some(&v) = self.value(esv) {
                    if field == "gpu" && v == 0 {
                        continue;
                    }
                    losses.push(
                        LossEntry::new(
                            format!("/tasks/{id}/{field}"),
                            field,
                            lost_env_value(esv),
                            "Snakemake resources cannot express GPU scheduling",
                            categories::GPU,
                        )
                        .origin(wf2wf_core::LossOrigin::User),
                    );
                }
            }
            if let Some(capability) = self.value(&task.gpu_capability) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/gpu_capability"),
                        "gpu_capability",
                        lost_env_value_str(&task.gpu_capability, capability),
                        "Snakemake cannot express GPU capability constraints",
                        categories::GPU,
                    )
                    .origin(wf2wf_core::LossOrigin::User),
                );
            }
            if let Some(policy) = self.value(&task.retry_policy) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/retry_policy"),
                        "retry_policy",
                        serde_json::json!(policy),
                        "Snakemake retries are a bare count; the backoff policy is dropped",
                        categories::ERROR_HANDLING,
                    )
                    .severity(LossSeverity::Info),
                );
            }
            if task.when.is_some() {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/when"),
                    "when",
                    serde_json::json!(task.when),
                    "Snakemake rules have no conditional-execution guard",
                    categories::ADVANCED_FEATURES,
                ));
            }
            if let Some(scatter) = &task.scatter {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/scatter"),
                    "scatter",
                    serde_json::to_value(scatter).unwrap_or_default(),
                    "scatter is implicit in Snakemake wildcards; the explicit spec is dropped",
                    categories::ADVANCED_FEATURES,
                ));
            }
            for (field, esv) in [
                ("checkpointing", &task.checkpointing),
                ("logging", &task.logging),
                ("security", &task.security),
                ("networking", &task.networking),
            ] {
                if self.value(esv).is_some() {
                    losses.push(
                        LossEntry::new(
                            format!("/tasks/{id}/{field}"),
                            field,
                            self.value(esv).cloned().unwrap_or_default(),
                            format!("Snakemake has no {field} directive"),
                            categories::ADVANCED_FEATURES,
                        )
                        .severity(LossSeverity::Info),
                    );
                }
            }
            for (i, param) in task.inputs.iter().chain(task.outputs.iter()).enumerate() {
                if matches!(param.transfer_mode, TransferMode::Always | TransferMode::Never) {
                    let section = if i < task.inputs.len() { "inputs" } else { "outputs" };
                    let index = if i < task.inputs.len() { i } else { i - task.inputs.len() };
                    losses.push(
                        LossEntry::new(
                            format!("/tasks/{id}/{section}/{index}/transfer_mode"),
                            "transfer_mode",
                            serde_json::json!(param.transfer_mode.as_str()),
                            "Snakemake assumes a shared filesystem; explicit transfer modes are dropped",
                            categories::FILE_TRANSFER,
                        )
                        .severity(LossSeverity::Info),
                    );
                }
            }
        }
        losses
    }

    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let mut text = String::new();
        for (i, task) in workflow.tasks().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            self.write_rule(&mut text, workflow, task);
        }
        std::fs::write(path, text).map_err(|source| ExportError::io(path, source))?;
        Ok(vec![path.to_path_buf()])
    }
}

impl SnakemakeExporter {
    fn write_rule(&self, out: &mut String, workflow: &Workflow, task: &Task) {
        let _ = writeln!(out, "rule {}:", task.id);

        // Inputs: file parameters plus explicit references to parent rules
        // that share no files with us (keeps the dependency in the DAG).
        let mut inputs: Vec<String> = task
            .inputs
            .iter()
            .map(|p| format!("\"{}\"", p.id))
            .collect();
        for parent in workflow.parents_of(&task.id) {
            let shares_file = workflow.task(parent).is_some_and(|p| {
                p.outputs
                    .iter()
                    .any(|o| task.inputs.iter().any(|i| i.id == o.id))
            });
            if !shares_file {
                inputs.push(format!("rules.{parent}.output"));
            }
        }
        if !inputs.is_empty() {
            let _ = writeln!(out, "    input:");
            let _ = writeln!(out, "        {}", inputs.join(",\n        "));
        }
        if !task.outputs.is_empty() {
            let _ = writeln!(out, "    output:");
            let items: Vec<String> = task
                .outputs
                .iter()
                .map(|p| format!("\"{}\"", p.id))
                .collect();
            let _ = writeln!(out, "        {}", items.join(",\n        "));
        }

        if let Some(&threads) = self.value(&task.threads).or(self.value(&task.cpu)) {
            let _ = writeln!(out, "    threads: {threads}");
        }
        let mut resources = Vec::new();
        if let Some(&mem) = self.value(&task.mem_mb) {
            resources.push(format!("mem_mb={mem}"));
        }
        if let Some(&disk) = self.value(&task.disk_mb) {
            resources.push(format!("disk_mb={disk}"));
        }
        if let Some(&time) = self.value(&task.time_s) {
            resources.push(format!("runtime={}", div_ceil_i64(time, 60)));
        }
        if !resources.is_empty() {
            let _ = writeln!(out, "    resources:");
            let _ = writeln!(out, "        {}", resources.join(",\n        "));
        }
        if let Some(&priority) = self.value(&task.priority) {
            let _ = writeln!(out, "    priority: {priority}");
        }
        if let Some(&retries) = self.value(&task.retry_count) {
            let _ = writeln!(out, "    retries: {retries}");
        }
        if let Some(container) = self.value(&task.container) {
            let _ = writeln!(out, "    container: \"{container}\"");
        }
        if let Some(conda) = self.value(&task.conda) {
            let _ = writeln!(out, "    conda: \"{conda}\"");
        }
        if let Some(modules) = self.value(&task.modules) {
            let items: Vec<String> = modules.iter().map(|m| format!("\"{m}\"")).collect();
            let _ = writeln!(out, "    envmodules:");
            let _ = writeln!(out, "        {}", items.join(",\n        "));
        }
        if let Some(command) = self.value(&task.command) {
            let _ = writeln!(out, "    shell:");
            let _ = writeln!(out, "        \"{command}\"");
        } else if let Some(script) = self.value(&task.script) {
            let _ = writeln!(out, "    script:");
            let _ = writeln!(out, "        \"{script}\"");
        }
    }
}

/// Canonical lost-value payload for an environment-indexed numeric field:
/// the full map is preserved so reinjection can restore every entry.
fn lost_env_value(esv: &EnvironmentSpecificValue<i64>) -> serde_json::Value {
    serde_json::json!({
        "all_environment_values": serde_json::to_value(esv).unwrap_or_default(),
    })
}

fn lost_env_value_str(
    esv: &EnvironmentSpecificValue<String>,
    current: &str,
) -> serde_json::Value {
    serde_json::json!({
        "value": current,
        "all_environment_values": serde_json::to_value(esv).unwrap_or_default(),
    })
}
