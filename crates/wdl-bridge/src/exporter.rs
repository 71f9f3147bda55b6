// SPDX-License-Identifier: MIT OR Apache-2.0
//! WDL exporter.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use wf2wf_core::{
    Environment, EnvironmentSpecificValue, ExportError, LossEntry, LossSeverity, ParameterType,
    TargetEmitter, Task, Workflow, categories, graph, native_environment,
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

/// Exporter for `.wdl` files.
#[derive(Debug)]
pub struct WdlExporter {
    /// Environment whose values are written.
    pub environment: Environment,
}

impl Default for WdlExporter {
    fn default() -> Self {
        Self {
            environment: native_environment(WorkflowFormat::Wdl),
        }
    }
}

impl WdlExporter {
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

impl TargetEmitter for WdlExporter {
    fn target_format(&self) -> WorkflowFormat {
        WorkflowFormat::Wdl
    }

    fn detect_losses(&self, workflow: &Workflow) -> Vec<LossEntry> {
        let mut losses = Vec::new();
        for task in workflow.tasks() {
            let id = &task.id;
            if let Some(&priority) = self.value(&task.priority) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/priority"),
                    "priority",
                    serde_json::json!(priority),
                    "WDL runtime has no scheduler priority",
                    categories::SCHEDULING,
                ));
            }
            if let Some(policy) = self.value(&task.retry_policy) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/retry_policy"),
                        "retry_policy",
                        serde_json::json!(policy),
                        "WDL maxRetries is a bare count; the backoff policy is dropped",
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
                    "conditional guards are reshaped by WDL if-blocks; the expression is dropped",
                    categories::ADVANCED_FEATURES,
                ));
            }
            if let Some(vars) = self.value(&task.env_vars)
                && !vars.is_empty()
            {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/env_vars"),
                        "env_vars",
                        serde_json::json!(vars),
                        "WDL runtime has no environment-variable map",
                        categories::ENVIRONMENT,
                    )
                    .severity(LossSeverity::Info),
                );
            }
            if let Some(conda) = self.value(&task.conda) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/conda"),
                        "conda",
                        serde_json::json!(conda),
                        "WDL runtime expresses software environments as containers only",
                        categories::ENVIRONMENT,
                    )
                    .severity(LossSeverity::Info),
                );
            }
        }
        losses
    }

    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let mut out = String::new();
        let _ = writeln!(out, "version 1.0");

        for task in workflow.tasks() {
            out.push('\n');
            self.write_task(&mut out, task);
        }

        out.push('\n');
        let workflow_name = workflow.label.clone().unwrap_or_else(|| "main".to_string());
        let _ = writeln!(out, "workflow {workflow_name} {{");

        // Scatter sources become workflow-level array inputs.
        let mut scatter_inputs: Vec<&str> = workflow
            .tasks()
            .filter_map(|t| t.scatter.as_ref())
            .flat_map(|s| s.scatter.iter().map(String::as_str))
            .collect();
        scatter_inputs.sort_unstable();
        scatter_inputs.dedup();
        if !scatter_inputs.is_empty() {
            let _ = writeln!(out, "  input {{");
            for name in &scatter_inputs {
                let _ = writeln!(out, "    Array[File] {name}");
            }
            let _ = writeln!(out, "  }}");
        }

        let order = graph::topo_order(workflow).map_err(|e| ExportError::invalid(e.to_string()))?;
        for id in &order {
            let Some(task) = workflow.task(id) else {
                continue;
            };
            let call = self.render_call(workflow, task);
            if let Some(scatter) = &task.scatter {
                let source = scatter
                    .scatter
                    .first()
                    .map(String::as_str)
                    .unwrap_or("items");
                let _ = writeln!(out, "  scatter (item in {source}) {{");
                let _ = writeln!(out, "    {call}");
                let _ = writeln!(out, "  }}");
            } else {
                let _ = writeln!(out, "  {call}");
            }
        }
        let _ = writeln!(out, "}}");

        std::fs::write(path, out).map_err(|source| ExportError::io(path, source))?;
        Ok(vec![path.to_path_buf()])
    }
}

impl WdlExporter {
    fn write_task(&self, out: &mut String, task: &Task) {
        let _ = writeln!(out, "task {} {{", task.id);
        if !task.inputs.is_empty() {
            let _ = writeln!(out, "  input {{");
            for param in &task.inputs {
                let _ = writeln!(
                    out,
                    "    {} {}",
                    wdl_type_name(&param.param_type),
                    sanitize(&param.id)
                );
            }
            let _ = writeln!(out, "  }}");
        }

        let _ = writeln!(out, "  command <<<");
        if let Some(command) = self.value(&task.command) {
            let _ = writeln!(out, "    {command}");
        } else if let Some(script) = self.value(&task.script) {
            for line in script.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        let _ = writeln!(out, "  >>>");

        let mut runtime: Vec<String> = Vec::new();
        if let Some(&cpu) = self.value(&task.cpu) {
            runtime.push(format!("cpu: {cpu}"));
        }
        if let Some(&mem) = self.value(&task.mem_mb) {
            runtime.push(format!("memory: \"{mem} MB\""));
        }
        if let Some(&disk) = self.value(&task.disk_mb) {
            runtime.push(format!("disks: \"local-disk {} SSD\"", div_ceil_i64(disk, 1024)));
        }
        if let Some(container) = self.value(&task.container) {
            let image = container.strip_prefix("docker://").unwrap_or(container);
            runtime.push(format!("docker: \"{image}\""));
        }
        if let Some(&gpus) = self.value(&task.gpu)
            && gpus > 0
        {
            runtime.push(format!("gpu: {gpus}"));
        }
        if let Some(&retries) = self.value(&task.retry_count) {
            runtime.push(format!("maxRetries: {retries}"));
        }
        if !runtime.is_empty() {
            let _ = writeln!(out, "  runtime {{");
            for attr in runtime {
                let _ = writeln!(out, "    {attr}");
            }
            let _ = writeln!(out, "  }}");
        }

        if !task.outputs.is_empty() {
            let _ = writeln!(out, "  output {{");
            for param in &task.outputs {
                // The declaration name must be a WDL identifier; the
                // original filename survives as the bound expression.
                let path = param
                    .default
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or(&param.id);
                let _ = writeln!(
                    out,
                    "    {} {} = \"{path}\"",
                    wdl_type_name(&param.param_type),
                    sanitize(&param.id),
                );
            }
            let _ = writeln!(out, "  }}");
        }
        let _ = writeln!(out, "}}");
    }

    /// A `call` statement wiring inputs to parent outputs where ids match.
    fn render_call(&self, workflow: &Workflow, task: &Task) -> String {
        let mut mappings = Vec::new();
        for param in &task.inputs {
            let source = workflow.parents_of(&task.id).find_map(|parent| {
                let parent_task = workflow.task(parent)?;
                parent_task
                    .outputs
                    .iter()
                    .find(|o| o.id == param.id)
                    .map(|o| format!("{parent}.{}", sanitize(&o.id)))
            });
            if let Some(source) = source {
                mappings.push(format!("{} = {source}", sanitize(&param.id)));
            }
        }
        // Control-only dependencies keep an `after` clause.
        let data_parents: std::collections::BTreeSet<String> = mappings
            .iter()
            .filter_map(|m| m.split_once(" = ").map(|(_, s)| s.split('.').next().unwrap_or("").to_string()))
            .collect();
        let after: Vec<&str> = workflow
            .parents_of(&task.id)
            .filter(|p| !data_parents.contains(*p))
            .collect();

        let mut call = format!("call {}", task.id);
        if !after.is_empty() {
            let _ = write!(call, " after {}", after.join(" after "));
        }
        if !mappings.is_empty() {
            let _ = write!(call, " {{ input: {} }}", mappings.join(", "));
        }
        call
    }
}

/// Render an IR type as a WDL type name.
fn wdl_type_name(ty: &ParameterType) -> String {
    match ty {
        ParameterType::File => "File".to_string(),
        ParameterType::Directory => "Directory".to_string(),
        ParameterType::Int | ParameterType::Long => "Int".to_string(),
        ParameterType::Float | ParameterType::Double => "Float".to_string(),
        ParameterType::Boolean => "Boolean".to_string(),
        ParameterType::Array { items } => format!("Array[{}]", wdl_type_name(items)),
        ParameterType::Union { members } => {
            // Optionals render with `?`; other unions fall back to String.
            match members.as_slice() {
                [ParameterType::Null, inner] => format!("{}?", wdl_type_name(inner)),
                _ => "String".to_string(),
            }
        }
        _ => "String".to_string(),
    }
}

/// WDL identifiers cannot contain dots or dashes.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
