// SPDX-License-Identifier: MIT OR Apache-2.0
//! CWL exporter: a `$graph` document with one tool per task.

use crate::types::ir_type_to_cwl;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use wf2wf_core::{
    Environment, EnvironmentSpecificValue, ExportError, LossEntry, LossSeverity, TargetEmitter,
    Task, Workflow, categories, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// CWL version written into exported documents.
pub const CWL_VERSION: &str = "v1.2";

/// Exporter for `.cwl` documents.
#[derive(Debug)]
pub struct CwlExporter {
    /// Environment whose values are written.
    pub environment: Environment,
}

impl Default for CwlExporter {
    fn default() -> Self {
        Self {
            environment: native_environment(WorkflowFormat::Cwl),
        }
    }
}

impl CwlExporter {
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

impl TargetEmitter for CwlExporter {
    fn target_format(&self) -> WorkflowFormat {
        WorkflowFormat::Cwl
    }

    fn detect_losses(&self, workflow: &Workflow) -> Vec<LossEntry> {
        let mut losses = Vec::new();
        for task in workflow.tasks() {
            let id = &task.id;
            // No job priority in CWL.
            if let Some(&priority) = self.value(&task.priority) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/priority"),
                        "priority",
                        json!(priority),
                        "CWL has no job priority",
                        categories::SCHEDULING,
                    )
                    .origin(wf2wf_core::LossOrigin::User),
                );
            }
            // Retry survives only as a vendor hint.
            if self.value(&task.retry_count).is_some() {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/retry"),
                        "retry",
                        json!(self.value(&task.retry_count)),
                        "retry encoded as a wf2wf:retry hint",
                        categories::ERROR_HANDLING,
                    )
                    .status(wf2wf_core::LossStatus::Adapted)
                    .severity(LossSeverity::Info),
                );
            }
            if let Some(policy) = self.value(&task.retry_policy) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/retry_policy"),
                        "retry_policy",
                        json!(policy),
                        "CWL hints cannot express a backoff policy",
                        categories::ERROR_HANDLING,
                    )
                    .severity(LossSeverity::Info),
                );
            }
            // GPU specifics beyond the coarse CUDA hint.
            if let Some(&gpu_mem) = self.value(&task.gpu_mem_mb) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/gpu_mem_mb"),
                    "gpu_mem_mb",
                    json!(gpu_mem),
                    "CWL CUDA hints cannot express GPU memory",
                    categories::GPU,
                ));
            }
            if let Some(capability) = self.value(&task.gpu_capability) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/gpu_capability"),
                    "gpu_capability",
                    json!(capability),
                    "CWL CUDA hints cannot express GPU capability",
                    categories::GPU,
                ));
            }
            // Custom scheduler attributes have no CWL home.
            for key in task.metadata.keys() {
                if let Some(attr) = key.strip_prefix("classad:") {
                    losses.push(LossEntry::new(
                        format!("/tasks/{id}/metadata/{}", pointer_escape(key)),
                        attr,
                        task.metadata[key].clone(),
                        "custom scheduler attributes have no CWL equivalent",
                        categories::SCHEDULING,
                    ));
                }
            }
        }
        losses
    }

    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let doc = self.build_document(workflow);
        let yaml = serde_yaml::to_string(&doc)
            .map_err(|e| ExportError::invalid(format!("YAML serialisation failed: {e}")))?;
        std::fs::write(path, yaml).map_err(|source| ExportError::io(path, source))?;
        Ok(vec![path.to_path_buf()])
    }
}

fn pointer_escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

impl CwlExporter {
    fn build_document(&self, workflow: &Workflow) -> Value {
        let mut graph = Vec::new();
        graph.push(self.build_workflow_process(workflow));
        for task in workflow.tasks() {
            graph.push(self.build_tool(task));
        }
        json!({
            "cwlVersion": workflow.cwl_version.as_deref().unwrap_or(CWL_VERSION),
            "$graph": graph,
        })
    }

    fn build_workflow_process(&self, workflow: &Workflow) -> Value {
        let mut process = Map::new();
        process.insert("class".into(), json!("Workflow"));
        process.insert("id".into(), json!("main"));
        if let Some(label) = &workflow.label {
            process.insert("label".into(), json!(label));
        }
        if let Some(doc) = &workflow.doc {
            process.insert("doc".into(), json!(doc));
        }

        // Workflow inputs: declared ones plus any task input not fed by a
        // parent output.
        let mut inputs = Map::new();
        for param in &workflow.inputs {
            inputs.insert(param.id.clone(), parameter_value(param));
        }
        let produced: BTreeSet<&str> = workflow
            .tasks()
            .flat_map(|t| t.outputs.iter().map(|o| o.id.as_str()))
            .collect();
        for task in workflow.tasks() {
            for param in &task.inputs {
                if !produced.contains(param.id.as_str()) && !inputs.contains_key(&param.id) {
                    inputs.insert(param.id.clone(), parameter_value(param));
                }
            }
        }
        process.insert("inputs".into(), Value::Object(inputs));

        let mut outputs = Map::new();
        for param in &workflow.outputs {
            outputs.insert(param.id.clone(), parameter_value(param));
        }
        process.insert("outputs".into(), Value::Object(outputs));

        let mut steps = Map::new();
        for task in workflow.tasks() {
            steps.insert(task.id.clone(), self.build_step(workflow, task));
        }
        process.insert("steps".into(), Value::Object(steps));
        Value::Object(process)
    }

    fn build_step(&self, workflow: &Workflow, task: &Task) -> Value {
        let mut step = Map::new();
        step.insert("run".into(), json!(format!("#{}_tool", task.id)));

        let mut ins = Map::new();
        for param in &task.inputs {
            // Wire to the parent output of the same id when one exists.
            let source = workflow
                .parents_of(&task.id)
                .find_map(|parent| {
                    let parent_task = workflow.task(parent)?;
                    parent_task
                        .outputs
                        .iter()
                        .find(|o| o.id == param.id)
                        .map(|o| format!("{parent}/{}", o.id))
                })
                .unwrap_or_else(|| param.id.clone());
            ins.insert(param.id.clone(), json!(source));
        }
        step.insert("in".into(), Value::Object(ins));
        let outs: Vec<String> = task.outputs.iter().map(|o| o.id.clone()).collect();
        step.insert("out".into(), json!(outs));

        if let Some(scatter) = &task.scatter {
            if scatter.scatter.len() == 1 {
                step.insert("scatter".into(), json!(scatter.scatter[0]));
            } else {
                step.insert("scatter".into(), json!(scatter.scatter));
            }
            step.insert("scatterMethod".into(), json!(scatter.method.as_str()));
        }
        if let Some(when) = &task.when {
            step.insert("when".into(), json!(when));
        }
        Value::Object(step)
    }

    fn build_tool(&self, task: &Task) -> Value {
        let mut tool = Map::new();
        tool.insert("class".into(), json!("CommandLineTool"));
        tool.insert("id".into(), json!(format!("{}_tool", task.id)));
        if let Some(label) = &task.label {
            tool.insert("label".into(), json!(label));
        }
        if let Some(doc) = &task.doc {
            tool.insert("doc".into(), json!(doc));
        }

        if let Some(command) = self.value(&task.command) {
            let parts: Vec<&str> = command.split_whitespace().collect();
            tool.insert("baseCommand".into(), json!(parts));
        } else if let Some(script) = self.value(&task.script) {
            tool.insert("baseCommand".into(), json!([script]));
        }

        let mut requirements = Vec::new();
        if let Some(container) = self.value(&task.container) {
            let image = container.strip_prefix("docker://").unwrap_or(container);
            requirements.push(json!({
                "class": "DockerRequirement",
                "dockerPull": image,
            }));
        }
        let mut resource = Map::new();
        if let Some(&cpu) = self.value(&task.cpu) {
            resource.insert("coresMin".into(), json!(cpu));
        }
        if let Some(&mem) = self.value(&task.mem_mb) {
            resource.insert("ramMin".into(), json!(mem));
        }
        if let Some(&disk) = self.value(&task.disk_mb) {
            resource.insert("outdirMin".into(), json!(disk));
        }
        if !resource.is_empty() {
            resource.insert("class".into(), json!("ResourceRequirement"));
            requirements.push(Value::Object(resource));
        }
        for req in &task.requirements {
            let mut obj = Map::new();
            obj.insert("class".into(), json!(req.class_name));
            for (k, v) in &req.data {
                obj.insert(k.clone(), v.clone());
            }
            requirements.push(Value::Object(obj));
        }
        if !requirements.is_empty() {
            tool.insert("requirements".into(), json!(requirements));
        }

        let mut hints = Vec::new();
        if let Some(&retries) = self.value(&task.retry_count) {
            hints.push(json!({"class": "wf2wf:retry", "count": retries}));
        }
        if let Some(&gpus) = self.value(&task.gpu)
            && gpus > 0
        {
            hints.push(json!({
                "class": "cwltool:CUDARequirement",
                "cudaDeviceCountMin": gpus,
            }));
        }
        for hint in &task.hints {
            let mut obj = Map::new();
            obj.insert("class".into(), json!(hint.class_name));
            for (k, v) in &hint.data {
                obj.insert(k.clone(), v.clone());
            }
            hints.push(Value::Object(obj));
        }
        if !hints.is_empty() {
            tool.insert("hints".into(), json!(hints));
        }

        let mut inputs = Map::new();
        for param in &task.inputs {
            inputs.insert(param.id.clone(), parameter_value(param));
        }
        tool.insert("inputs".into(), Value::Object(inputs));
        let mut outputs = Map::new();
        for param in &task.outputs {
            outputs.insert(param.id.clone(), parameter_value(param));
        }
        tool.insert("outputs".into(), Value::Object(outputs));
        Value::Object(tool)
    }
}

fn parameter_value(param: &wf2wf_core::ParameterSpec) -> Value {
    let bare_type = ir_type_to_cwl(&param.param_type);
    let mut needs_object = false;
    let mut obj = Map::new();
    obj.insert("type".into(), bare_type.clone());
    if let Some(label) = &param.label {
        obj.insert("label".into(), json!(label));
        needs_object = true;
    }
    if let Some(doc) = &param.doc {
        obj.insert("doc".into(), json!(doc));
        needs_object = true;
    }
    if let Some(default) = &param.default {
        obj.insert("default".into(), default.clone());
        needs_object = true;
    }
    if let Some(format) = &param.format {
        obj.insert("format".into(), json!(format));
        needs_object = true;
    }
    if !param.secondary_files.is_empty() {
        obj.insert("secondaryFiles".into(), json!(param.secondary_files));
        needs_object = true;
    }
    if needs_object {
        Value::Object(obj)
    } else {
        bare_type
    }
}
