// SPDX-License-Identifier: MIT OR Apache-2.0
//! `.dag` exporter: traditional (one `.sub` per job) and inline modes.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use wf2wf_core::{
    Environment, EnvironmentSpecificValue, ExportError, LossEntry, LossSeverity, TargetEmitter,
    Task, TransferMode, Workflow, categories, graph, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Submit-description placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Resource and container attributes inline in the `.dag`.
    #[default]
    Inline,
    /// One external `.sub` file per job.
    Traditional,
}

/// Exporter for DAGMan `.dag` files.
#[derive(Debug)]
pub struct DagmanExporter {
    /// Inline or traditional submit descriptions; contents are identical.
    pub mode: SubmitMode,
    /// Environment whose values are written.
    pub environment: Environment,
}

impl DagmanExporter {
    /// Inline-mode exporter for the format's native environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: SubmitMode::Inline,
            environment: native_environment(WorkflowFormat::Dagman),
        }
    }

    /// Select the submit-description mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SubmitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Select the environment values are read for.
    #[must_use]
    pub fn for_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    fn value<'a, T>(&self, field: &'a EnvironmentSpecificValue<T>) -> Option<&'a T> {
        field.get_with_default(self.environment)
    }
}

impl Default for DagmanExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetEmitter for DagmanExporter {
    fn target_format(&self) -> WorkflowFormat {
        WorkflowFormat::Dagman
    }

    fn detect_losses(&self, workflow: &Workflow) -> Vec<LossEntry> {
        let mut losses = Vec::new();
        for task in workflow.tasks() {
            let id = &task.id;
            if let Some(conda) = self.value(&task.conda) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/conda"),
                    "conda",
                    serde_json::json!(conda),
                    "HTCondor submit descriptions cannot express conda environments",
                    categories::ENVIRONMENT,
                ));
            }
            if task.when.is_some() {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/when"),
                    "when",
                    serde_json::json!(task.when),
                    "DAGMan has no conditional-execution guard",
                    categories::ADVANCED_FEATURES,
                ));
            }
            if let Some(scatter) = &task.scatter {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/scatter"),
                    "scatter",
                    serde_json::to_value(scatter).unwrap_or_default(),
                    "DAGMan jobs are concrete; the scatter spec is dropped",
                    categories::ADVANCED_FEATURES,
                ));
            }
            if let Some(modules) = self.value(&task.modules) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/modules"),
                        "modules",
                        serde_json::json!(modules),
                        "HTCondor has no environment-module directive",
                        categories::ENVIRONMENT,
                    )
                    .severity(LossSeverity::Info),
                );
            }
        }
        losses
    }

    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut written = Vec::new();
        let mut dag = String::new();

        // Companion scripts for tasks defined by a raw command line.
        let scripts_dir = dir.join("scripts");
        for task in workflow.tasks() {
            if self.needs_script(task) {
                if !scripts_dir.exists() {
                    std::fs::create_dir_all(&scripts_dir)
                        .map_err(|source| ExportError::io(&scripts_dir, source))?;
                }
                let script_path = scripts_dir.join(format!("{}.sh", task.id));
                let body = format!(
                    "#!/bin/sh\n{}\n",
                    self.value(&task.command).cloned().unwrap_or_default()
                );
                std::fs::write(&script_path, body)
                    .map_err(|source| ExportError::io(&script_path, source))?;
                written.push(script_path);
            }
        }

        for task in workflow.tasks() {
            match self.mode {
                SubmitMode::Inline => {
                    let _ = writeln!(dag, "JOB {} {{", task.id);
                    for line in self.submit_lines(task) {
                        let _ = writeln!(dag, "    {line}");
                    }
                    let _ = writeln!(dag, "}}");
                }
                SubmitMode::Traditional => {
                    let sub_name = format!("{}.sub", task.id);
                    let sub_path = dir.join(&sub_name);
                    let mut sub = String::new();
                    for line in self.submit_lines(task) {
                        let _ = writeln!(sub, "{line}");
                    }
                    std::fs::write(&sub_path, sub)
                        .map_err(|source| ExportError::io(&sub_path, source))?;
                    written.push(sub_path);
                    let _ = writeln!(dag, "JOB {} {sub_name}", task.id);
                }
            }
        }

        for edge in graph::sorted_edges(workflow)
            .map_err(|e| ExportError::invalid(e.to_string()))?
        {
            let _ = writeln!(dag, "PARENT {} CHILD {}", edge.parent, edge.child);
        }
        for task in workflow.tasks() {
            if let Some(&retries) = self.value(&task.retry_count) {
                let _ = writeln!(dag, "RETRY {} {retries}", task.id);
            }
        }
        for task in workflow.tasks() {
            if let Some(&priority) = self.value(&task.priority) {
                let _ = writeln!(dag, "PRIORITY {} {priority}", task.id);
            }
        }

        std::fs::write(path, dag).map_err(|source| ExportError::io(path, source))?;
        written.insert(0, path.to_path_buf());
        Ok(written)
    }
}

impl DagmanExporter {
    fn needs_script(&self, task: &Task) -> bool {
        self.value(&task.command)
            .is_some_and(|cmd| cmd.contains(' ') || cmd.contains('|') || cmd.contains('>'))
    }

    /// The submit-description body, identical in both modes.
    fn submit_lines(&self, task: &Task) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(&cpus) = self.value(&task.cpu) {
            lines.push(format!("request_cpus = {cpus}"));
        }
        if let Some(&mem) = self.value(&task.mem_mb) {
            lines.push(format!("request_memory = {mem}MB"));
        }
        if let Some(&disk) = self.value(&task.disk_mb) {
            lines.push(format!("request_disk = {disk}MB"));
        }
        if let Some(&gpus) = self.value(&task.gpu) {
            if gpus > 0 {
                lines.push(format!("request_gpus = {gpus}"));
            }
        }
        if let Some(&gpu_mem) = self.value(&task.gpu_mem_mb) {
            lines.push(format!("gpus_minimum_memory = {gpu_mem}"));
        }
        if let Some(capability) = self.value(&task.gpu_capability) {
            lines.push(format!("gpus_minimum_capability = {capability}"));
        }

        if let Some(container) = self.value(&task.container) {
            lines.push("universe = docker".to_string());
            let image = container.strip_prefix("docker://").unwrap_or(container);
            lines.push(format!("docker_image = {image}"));
        }

        if self.needs_script(task) {
            lines.push(format!("executable = scripts/{}.sh", task.id));
        } else if let Some(command) = self.value(&task.command) {
            let mut parts = command.splitn(2, ' ');
            if let Some(exe) = parts.next() {
                lines.push(format!("executable = {exe}"));
            }
            if let Some(args) = parts.next() {
                lines.push(format!("arguments = \"{args}\""));
            }
        } else if let Some(script) = self.value(&task.script) {
            lines.push(format!("executable = {script}"));
        }

        let transfer_in: Vec<&str> = task
            .inputs
            .iter()
            .filter(|p| matches!(p.transfer_mode, TransferMode::Auto | TransferMode::Always))
            .map(|p| p.id.as_str())
            .collect();
        if !transfer_in.is_empty() {
            lines.push(format!("transfer_input_files = {}", transfer_in.join(", ")));
            lines.push("should_transfer_files = YES".to_string());
        }
        let transfer_out: Vec<&str> = task
            .outputs
            .iter()
            .filter(|p| matches!(p.transfer_mode, TransferMode::Auto | TransferMode::Always))
            .map(|p| p.id.as_str())
            .collect();
        if !transfer_out.is_empty() {
            lines.push(format!(
                "transfer_output_files = {}",
                transfer_out.join(", ")
            ));
        }

        if let Some(vars) = self.value(&task.env_vars)
            && !vars.is_empty()
        {
            let joined: Vec<String> = vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
            lines.push(format!("environment = \"{}\"", joined.join(" ")));
        }

        // Custom ClassAd attributes round-trip through task metadata.
        for (key, value) in &task.metadata {
            if let Some(attr) = key.strip_prefix("classad:") {
                let rendered = match value {
                    serde_json::Value::String(s) => format!("\"{s}\""),
                    other => other.to_string(),
                };
                lines.push(format!("{attr} = {rendered}"));
            }
        }

        lines.push("queue".to_string());
        lines
    }
}
