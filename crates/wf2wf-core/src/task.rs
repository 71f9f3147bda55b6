// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tasks: the unit of execution inside a workflow.

use crate::env::{Environment, EnvironmentSpecificValue};
use crate::spec::{ParameterSpec, RequirementSpec, ScatterSpec, TransferMode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A unit of execution.
///
/// Resource, environment, command, error-handling, transfer, and
/// advanced-feature fields are all environment-indexed (see
/// [`EnvironmentSpecificValue`]); unset fields are omitted from the
/// serialised form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    /// Stable identifier, unique within the workflow.
    pub id: String,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Documentation string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,

    /// Task inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ParameterSpec>,
    /// Task outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ParameterSpec>,

    /// Shell command line.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub command: EnvironmentSpecificValue<String>,
    /// Interpreter script body (alternative to `command`).
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub script: EnvironmentSpecificValue<String>,

    /// Hard requirements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<RequirementSpec>,
    /// Soft hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<RequirementSpec>,

    /// Conditional-execution guard expression, captured verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Scatter directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scatter: Option<ScatterSpec>,

    // ── Resources ───────────────────────────────────────────────────────
    /// CPU cores.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub cpu: EnvironmentSpecificValue<i64>,
    /// Memory in megabytes.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub mem_mb: EnvironmentSpecificValue<i64>,
    /// Scratch disk in megabytes.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub disk_mb: EnvironmentSpecificValue<i64>,
    /// GPU count.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub gpu: EnvironmentSpecificValue<i64>,
    /// GPU memory in megabytes.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub gpu_mem_mb: EnvironmentSpecificValue<i64>,
    /// Minimum GPU capability (e.g. `"7.5"`).
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub gpu_capability: EnvironmentSpecificValue<String>,
    /// Wall-clock limit in seconds.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub time_s: EnvironmentSpecificValue<i64>,
    /// Thread count (distinct from scheduler CPU allocation).
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub threads: EnvironmentSpecificValue<i64>,

    // ── Software environment ────────────────────────────────────────────
    /// Conda environment (file path or inline spec).
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub conda: EnvironmentSpecificValue<String>,
    /// Container image reference.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub container: EnvironmentSpecificValue<String>,
    /// Working directory.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub workdir: EnvironmentSpecificValue<String>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub env_vars: EnvironmentSpecificValue<BTreeMap<String, String>>,
    /// Environment modules to load.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub modules: EnvironmentSpecificValue<Vec<String>>,

    // ── Error handling & scheduling ─────────────────────────────────────
    /// Retry attempts on failure. Serialised as `retry`.
    #[serde(
        rename = "retry",
        default,
        skip_serializing_if = "EnvironmentSpecificValue::is_unset"
    )]
    pub retry_count: EnvironmentSpecificValue<i64>,
    /// Retry backoff policy (`"exponential"`, `"linear"`, ...).
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub retry_policy: EnvironmentSpecificValue<String>,
    /// Scheduler priority.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub priority: EnvironmentSpecificValue<i64>,

    // ── File transfer ───────────────────────────────────────────────────
    /// Task-level default transfer mode for parameters left on `auto`.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub file_transfer_mode: EnvironmentSpecificValue<TransferMode>,

    // ── Advanced features ───────────────────────────────────────────────
    /// Checkpointing configuration.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub checkpointing: EnvironmentSpecificValue<serde_json::Value>,
    /// Log-collection configuration.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub logging: EnvironmentSpecificValue<serde_json::Value>,
    /// Security/isolation configuration.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub security: EnvironmentSpecificValue<serde_json::Value>,
    /// Network-access configuration.
    #[serde(default, skip_serializing_if = "EnvironmentSpecificValue::is_unset")]
    pub networking: EnvironmentSpecificValue<serde_json::Value>,

    /// Intent tags (ontology IRIs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intent: Vec<String>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Create an empty task with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// The effective command or script for `env`, command preferred.
    #[must_use]
    pub fn effective_command(&self, env: Environment) -> Option<&String> {
        self.command
            .get_with_default(env)
            .or_else(|| self.script.get_with_default(env))
    }
}

/// Fluent builder for [`Task`].
///
/// When constructed with [`TaskBuilder::on`], value setters bind to that
/// environment; otherwise they set defaults.
///
/// # Examples
///
/// ```
/// use wf2wf_core::{Environment, TaskBuilder};
///
/// let task = TaskBuilder::new("align")
///     .on(Environment::SharedFilesystem)
///     .command("bwa mem r.fq > r.bam")
///     .cpu(4)
///     .mem_mb(8000)
///     .container("docker://bwa:latest")
///     .build();
/// assert_eq!(task.cpu.get_for(Environment::SharedFilesystem), Some(&4));
/// ```
#[derive(Debug, Default)]
pub struct TaskBuilder {
    task: Task,
    env: Option<Environment>,
}

impl TaskBuilder {
    /// Start building a task with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            task: Task::new(id),
            env: None,
        }
    }

    /// Bind subsequent value setters to `env` instead of the default slot.
    #[must_use]
    pub fn on(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    fn set<T>(field: &mut EnvironmentSpecificValue<T>, env: Option<Environment>, value: T) {
        match env {
            Some(e) => field.set_for(e, value),
            None => field.set_default(value),
        }
    }

    /// Set the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.task.label = Some(label.into());
        self
    }

    /// Set the doc string.
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.task.doc = Some(doc.into());
        self
    }

    /// Set the shell command.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        Self::set(&mut self.task.command, self.env, command.into());
        self
    }

    /// Set the script body.
    #[must_use]
    pub fn script(mut self, script: impl Into<String>) -> Self {
        Self::set(&mut self.task.script, self.env, script.into());
        self
    }

    /// Set CPU cores.
    #[must_use]
    pub fn cpu(mut self, cpu: i64) -> Self {
        Self::set(&mut self.task.cpu, self.env, cpu);
        self
    }

    /// Set memory in MB.
    #[must_use]
    pub fn mem_mb(mut self, mem_mb: i64) -> Self {
        Self::set(&mut self.task.mem_mb, self.env, mem_mb);
        self
    }

    /// Set disk in MB.
    #[must_use]
    pub fn disk_mb(mut self, disk_mb: i64) -> Self {
        Self::set(&mut self.task.disk_mb, self.env, disk_mb);
        self
    }

    /// Set GPU count.
    #[must_use]
    pub fn gpu(mut self, gpu: i64) -> Self {
        Self::set(&mut self.task.gpu, self.env, gpu);
        self
    }

    /// Set GPU memory in MB.
    #[must_use]
    pub fn gpu_mem_mb(mut self, gpu_mem_mb: i64) -> Self {
        Self::set(&mut self.task.gpu_mem_mb, self.env, gpu_mem_mb);
        self
    }

    /// Set wall-clock limit in seconds.
    #[must_use]
    pub fn time_s(mut self, time_s: i64) -> Self {
        Self::set(&mut self.task.time_s, self.env, time_s);
        self
    }

    /// Set thread count.
    #[must_use]
    pub fn threads(mut self, threads: i64) -> Self {
        Self::set(&mut self.task.threads, self.env, threads);
        self
    }

    /// Set the conda environment.
    #[must_use]
    pub fn conda(mut self, conda: impl Into<String>) -> Self {
        Self::set(&mut self.task.conda, self.env, conda.into());
        self
    }

    /// Set the container image.
    #[must_use]
    pub fn container(mut self, container: impl Into<String>) -> Self {
        Self::set(&mut self.task.container, self.env, container.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn workdir(mut self, workdir: impl Into<String>) -> Self {
        Self::set(&mut self.task.workdir, self.env, workdir.into());
        self
    }

    /// Set the retry count.
    #[must_use]
    pub fn retry_count(mut self, retries: i64) -> Self {
        Self::set(&mut self.task.retry_count, self.env, retries);
        self
    }

    /// Set the scheduler priority.
    #[must_use]
    pub fn priority(mut self, priority: i64) -> Self {
        Self::set(&mut self.task.priority, self.env, priority);
        self
    }

    /// Add an input parameter.
    #[must_use]
    pub fn input(mut self, input: ParameterSpec) -> Self {
        self.task.inputs.push(input);
        self
    }

    /// Add an output parameter.
    #[must_use]
    pub fn output(mut self, output: ParameterSpec) -> Self {
        self.task.outputs.push(output);
        self
    }

    /// Add a requirement.
    #[must_use]
    pub fn requirement(mut self, req: RequirementSpec) -> Self {
        self.task.requirements.push(req);
        self
    }

    /// Set the `when` guard.
    #[must_use]
    pub fn when(mut self, expr: impl Into<String>) -> Self {
        self.task.when = Some(expr.into());
        self
    }

    /// Set the scatter directive.
    #[must_use]
    pub fn scatter(mut self, scatter: ScatterSpec) -> Self {
        self.task.scatter = Some(scatter);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Task {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_empty() {
        let t = Task::new("t");
        assert_eq!(t.id, "t");
        assert!(t.cpu.is_unset());
        assert!(t.command.is_unset());
        assert!(t.inputs.is_empty());
    }

    #[test]
    fn builder_without_env_sets_defaults() {
        let t = TaskBuilder::new("a").cpu(2).mem_mb(1024).build();
        assert_eq!(t.cpu.default_value(), Some(&2));
        assert_eq!(t.cpu.get_for(Environment::Local), None);
        assert_eq!(t.cpu.get_with_default(Environment::Local), Some(&2));
        assert_eq!(t.mem_mb.default_value(), Some(&1024));
    }

    #[test]
    fn builder_with_env_scopes_values() {
        let t = TaskBuilder::new("a")
            .on(Environment::DistributedComputing)
            .cpu(8)
            .build();
        assert_eq!(t.cpu.get_for(Environment::DistributedComputing), Some(&8));
        assert_eq!(t.cpu.get_for(Environment::SharedFilesystem), None);
        assert_eq!(t.cpu.default_value(), None);
    }

    #[test]
    fn effective_command_prefers_command() {
        let t = TaskBuilder::new("a")
            .command("echo hi")
            .script("print('hi')")
            .build();
        assert_eq!(
            t.effective_command(Environment::Local).map(String::as_str),
            Some("echo hi")
        );
    }

    #[test]
    fn effective_command_falls_back_to_script() {
        let t = TaskBuilder::new("a").script("print('hi')").build();
        assert_eq!(
            t.effective_command(Environment::Local).map(String::as_str),
            Some("print('hi')")
        );
    }

    #[test]
    fn unset_fields_omitted_from_json() {
        let t = Task::new("bare");
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json, serde_json::json!({"id": "bare"}));
    }

    #[test]
    fn serde_roundtrip() {
        let t = TaskBuilder::new("align")
            .on(Environment::SharedFilesystem)
            .command("bwa mem r.fq > r.bam")
            .cpu(4)
            .mem_mb(8000)
            .container("docker://bwa:latest")
            .input(ParameterSpec::file("r.fq"))
            .output(ParameterSpec::file("r.bam"))
            .build();
        let json = serde_json::to_string(&t).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn legacy_flat_resources_accepted() {
        // Older serialisations wrote bare scalars for resource fields.
        let t: Task = serde_json::from_value(serde_json::json!({
            "id": "old",
            "cpu": 4,
            "mem_mb": 2048,
            "command": "sort input.txt"
        }))
        .unwrap();
        assert_eq!(t.cpu.default_value(), Some(&4));
        assert_eq!(t.mem_mb.default_value(), Some(&2048));
        assert_eq!(
            t.command.default_value().map(String::as_str),
            Some("sort input.txt")
        );
    }
}
