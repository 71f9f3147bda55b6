// SPDX-License-Identifier: MIT OR Apache-2.0
//! CWL importer: single documents and `$graph` forms, JSON or YAML.

use crate::types::cwl_type_to_ir;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use wf2wf_core::{
    Edge, Environment, ParameterSpec, ParameterType, ParseError, RequirementSpec, ScatterMethod,
    ScatterSpec, SourceParser, Task, TransferMode, Workflow, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Importer for `.cwl` documents.
#[derive(Debug, Default)]
pub struct CwlImporter {
    _priv: (),
}

impl CwlImporter {
    /// Create an importer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceParser for CwlImporter {
    fn source_format(&self) -> WorkflowFormat {
        WorkflowFormat::Cwl
    }

    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // YAML is a superset of JSON, so one parser covers both inputs.
        let doc: Value = serde_yaml::from_str(&text)
            .map_err(|e| ParseError::syntax(format!("invalid CWL document: {e}")))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow")
            .to_string();
        import_document(&doc, name, path)
    }
}

/// The environment CWL values bind to.
fn env() -> Environment {
    native_environment(WorkflowFormat::Cwl)
}

fn import_document(doc: &Value, name: String, path: &Path) -> Result<Workflow, ParseError> {
    let mut workflow = Workflow::new(name, "1.0");
    workflow.cwl_version = doc
        .get("cwlVersion")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(graph) = doc.get("$graph").and_then(Value::as_array) {
        let index: BTreeMap<String, &Value> = graph
            .iter()
            .filter_map(|p| {
                let id = p.get("id")?.as_str()?.trim_start_matches('#').to_string();
                Some((id, p))
            })
            .collect();
        let root = graph
            .iter()
            .find(|p| p.get("class").and_then(Value::as_str) == Some("Workflow"))
            .ok_or_else(|| ParseError::syntax("$graph has no Workflow process"))?;
        import_workflow(&mut workflow, root, &index, path)?;
    } else {
        match doc.get("class").and_then(Value::as_str) {
            Some("Workflow") => {
                import_workflow(&mut workflow, doc, &BTreeMap::new(), path)?;
            }
            Some("CommandLineTool") => {
                let task = tool_to_task("main", doc)?;
                workflow.add_task(task)?;
            }
            other => {
                return Err(ParseError::syntax(format!(
                    "unsupported CWL class {other:?}"
                )));
            }
        }
    }
    Ok(workflow)
}

fn import_workflow(
    workflow: &mut Workflow,
    root: &Value,
    index: &BTreeMap<String, &Value>,
    path: &Path,
) -> Result<(), ParseError> {
    if let Some(label) = root.get("label").and_then(Value::as_str) {
        workflow.label = Some(label.to_string());
    }
    if let Some(doc) = root.get("doc").and_then(Value::as_str) {
        workflow.doc = Some(doc.to_string());
    }
    workflow.inputs = parse_parameters(root.get("inputs"));
    workflow.outputs = parse_parameters(root.get("outputs"));
    for req in parse_requirements(root.get("requirements")) {
        workflow.requirements.push(req);
    }
    for hint in parse_requirements(root.get("hints")) {
        workflow.hints.push(hint);
    }

    // Steps come as a map (id → step) or a list with `id` members.
    let steps: Vec<(String, &Value)> = match root.get("steps") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(|s| {
                let id = s.get("id")?.as_str()?.trim_start_matches('#').to_string();
                Some((id, s))
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut edges: Vec<Edge> = Vec::new();
    for (step_id, step) in &steps {
        let run = step
            .get("run")
            .ok_or_else(|| ParseError::syntax(format!("step `{step_id}` has no run")))?;
        let mut task = match run {
            Value::String(reference) => {
                if let Some(id) = reference.strip_prefix('#') {
                    let tool = index.get(id).ok_or_else(|| ParseError::Reference {
                        reference: reference.clone(),
                        message: "no such process in $graph".into(),
                    })?;
                    tool_to_task(step_id, tool)?
                } else {
                    // External tool file, relative to the document.
                    let tool_path = path
                        .parent()
                        .map_or_else(|| Path::new(reference).to_path_buf(), |d| d.join(reference));
                    let text =
                        std::fs::read_to_string(&tool_path).map_err(|source| ParseError::Io {
                            path: tool_path.clone(),
                            source,
                        })?;
                    let tool: Value = serde_yaml::from_str(&text).map_err(|e| {
                        ParseError::syntax(format!("invalid tool `{reference}`: {e}"))
                    })?;
                    tool_to_task(step_id, &tool)?
                }
            }
            inline @ Value::Object(_) => tool_to_task(step_id, inline)?,
            other => {
                return Err(ParseError::syntax(format!(
                    "step `{step_id}` run must be a reference or process, got {other}"
                )));
            }
        };

        // Scatter: a parameter name or list of names.
        match step.get("scatter") {
            Some(Value::String(param)) => {
                task.scatter = Some(ScatterSpec {
                    scatter: vec![param.clone()],
                    method: parse_scatter_method(step),
                });
            }
            Some(Value::Array(params)) => {
                task.scatter = Some(ScatterSpec {
                    scatter: params
                        .iter()
                        .filter_map(|p| p.as_str().map(str::to_string))
                        .collect(),
                    method: parse_scatter_method(step),
                });
            }
            _ => {}
        }
        if let Some(when) = step.get("when").and_then(Value::as_str) {
            // Expression captured verbatim; never evaluated.
            task.when = Some(when.to_string());
        }

        // Data links: `stepName/outputId` sources become edges.
        if let Some(Value::Object(ins)) = step.get("in") {
            for source in ins.values() {
                let source_str = match source {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(o) => o.get("source").and_then(Value::as_str),
                    _ => None,
                };
                if let Some(source_str) = source_str
                    && let Some((parent, _)) = source_str.split_once('/')
                {
                    edges.push(Edge::new(parent.trim_start_matches('#'), step_id.clone()));
                }
            }
        }

        workflow.add_task(task)?;
    }

    for edge in edges {
        workflow.add_edge(edge)?;
    }
    Ok(())
}

fn parse_scatter_method(step: &Value) -> ScatterMethod {
    match step.get("scatterMethod").and_then(Value::as_str) {
        Some("nested_crossproduct") => ScatterMethod::NestedCrossproduct,
        Some("flat_crossproduct") => ScatterMethod::FlatCrossproduct,
        _ => ScatterMethod::Dotproduct,
    }
}

/// Lower a `CommandLineTool` into a task.
fn tool_to_task(id: &str, tool: &Value) -> Result<Task, ParseError> {
    if tool.get("class").and_then(Value::as_str) != Some("CommandLineTool") {
        return Err(ParseError::syntax(format!(
            "step `{id}` must run a CommandLineTool"
        )));
    }
    let mut task = Task::new(id);
    task.label = tool.get("label").and_then(Value::as_str).map(str::to_string);
    task.doc = tool.get("doc").and_then(Value::as_str).map(str::to_string);
    task.inputs = parse_parameters(tool.get("inputs"));
    task.outputs = parse_parameters(tool.get("outputs"));

    let mut command_parts: Vec<String> = match tool.get("baseCommand") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    if let Some(Value::Array(arguments)) = tool.get("arguments") {
        for arg in arguments {
            if let Some(s) = arg.as_str() {
                command_parts.push(s.to_string());
            }
        }
    }
    if !command_parts.is_empty() {
        task.command.set_for(env(), command_parts.join(" "));
    }

    for req in parse_requirements(tool.get("requirements")) {
        apply_requirement(&mut task, &req, true);
    }
    for hint in parse_requirements(tool.get("hints")) {
        apply_requirement(&mut task, &hint, false);
    }
    Ok(task)
}

/// Known requirement classes update typed task fields; everything else is
/// carried as a tagged requirement.
fn apply_requirement(task: &mut Task, req: &RequirementSpec, hard: bool) {
    match req.class_name.as_str() {
        "DockerRequirement" => {
            if let Some(image) = req
                .get("dockerPull")
                .or_else(|| req.get("docker_pull"))
                .and_then(Value::as_str)
            {
                let reference = if image.contains("://") {
                    image.to_string()
                } else {
                    format!("docker://{image}")
                };
                task.container.set_for(env(), reference);
            }
        }
        "ResourceRequirement" => {
            if let Some(cores) = req.get("coresMin").and_then(Value::as_i64) {
                task.cpu.set_for(env(), cores);
            }
            if let Some(ram) = req.get("ramMin").and_then(Value::as_i64) {
                task.mem_mb.set_for(env(), ram);
            }
            if let Some(disk) = req.get("outdirMin").and_then(Value::as_i64) {
                task.disk_mb.set_for(env(), disk);
            }
        }
        "wf2wf:retry" => {
            if let Some(count) = req.get("count").and_then(Value::as_i64) {
                task.retry_count.set_for(env(), count);
            }
        }
        "cwltool:CUDARequirement" => {
            if let Some(gpus) = req.get("cudaDeviceCountMin").and_then(Value::as_i64) {
                task.gpu.set_for(env(), gpus);
            }
        }
        _ => {
            if hard {
                task.requirements.push(req.clone());
            } else {
                task.hints.push(req.clone());
            }
        }
    }
}

/// Parse the CWL map or list form of inputs/outputs.
fn parse_parameters(value: Option<&Value>) -> Vec<ParameterSpec> {
    let mut params = Vec::new();
    match value {
        Some(Value::Object(map)) => {
            for (id, spec) in map {
                params.push(parameter_from(id, spec));
            }
        }
        Some(Value::Array(list)) => {
            for spec in list {
                if let Some(id) = spec.get("id").and_then(Value::as_str) {
                    params.push(parameter_from(id.trim_start_matches('#'), spec));
                }
            }
        }
        _ => {}
    }
    params
}

fn parameter_from(id: &str, spec: &Value) -> ParameterSpec {
    // Shorthand form: `reads: File`.
    if spec.is_string() || spec.is_array() {
        let mut p = ParameterSpec::new(id, cwl_type_to_ir(spec));
        p.transfer_mode = TransferMode::Auto;
        return p;
    }
    let ty = spec.get("type").map_or(ParameterType::String, cwl_type_to_ir);
    let mut p = ParameterSpec::new(id, ty);
    p.label = spec.get("label").and_then(Value::as_str).map(str::to_string);
    p.doc = spec.get("doc").and_then(Value::as_str).map(str::to_string);
    p.default = spec.get("default").cloned();
    p.format = spec.get("format").and_then(Value::as_str).map(str::to_string);
    match spec.get("secondaryFiles") {
        Some(Value::String(pattern)) => p.secondary_files = vec![pattern.clone()],
        Some(Value::Array(patterns)) => {
            p.secondary_files = patterns
                .iter()
                .filter_map(|s| {
                    s.as_str()
                        .map(str::to_string)
                        .or_else(|| s.get("pattern").and_then(Value::as_str).map(str::to_string))
                })
                .collect();
        }
        _ => {}
    }
    p
}

/// Parse the CWL map or list form of requirements/hints.
fn parse_requirements(value: Option<&Value>) -> Vec<RequirementSpec> {
    let mut reqs = Vec::new();
    match value {
        Some(Value::Array(list)) => {
            for item in list {
                if let Some(class) = item.get("class").and_then(Value::as_str) {
                    let mut req = RequirementSpec::new(class);
                    if let Some(obj) = item.as_object() {
                        for (k, v) in obj {
                            if k != "class" {
                                req.data.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    reqs.push(req);
                }
            }
        }
        Some(Value::Object(map)) => {
            for (class, body) in map {
                let mut req = RequirementSpec::new(class);
                if let Some(obj) = body.as_object() {
                    for (k, v) in obj {
                        req.data.insert(k.clone(), v.clone());
                    }
                }
                reqs.push(req);
            }
        }
        _ => {}
    }
    reqs
}
