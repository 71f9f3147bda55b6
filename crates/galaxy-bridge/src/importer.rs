// SPDX-License-Identifier: MIT OR Apache-2.0
//! `.ga` importer.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use wf2wf_core::{Edge, ParameterSpec, ParseError, SourceParser, Task, Workflow};
use wf2wf_format::WorkflowFormat;

/// Importer for Galaxy `.ga` JSON exports.
#[derive(Debug, Default)]
pub struct GalaxyImporter {
    _priv: (),
}

impl GalaxyImporter {
    /// Create an importer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceParser for GalaxyImporter {
    fn source_format(&self) -> WorkflowFormat {
        WorkflowFormat::Galaxy
    }

    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&text)?;

        let mut workflow = Workflow::new(
            doc.get("name")
                .and_then(Value::as_str)
                .unwrap_or("galaxy_workflow"),
            doc.get("format-version")
                .and_then(Value::as_str)
                .unwrap_or("0.1"),
        );
        if let Some(annotation) = doc.get("annotation").and_then(Value::as_str)
            && !annotation.is_empty()
        {
            workflow.doc = Some(annotation.to_string());
        }

        let steps = doc
            .get("steps")
            .and_then(Value::as_object)
            .ok_or_else(|| ParseError::syntax("Galaxy document has no steps object"))?;

        // Steps are keyed by numeric id; iterate in numeric order.
        let mut ordered: Vec<(i64, &Value)> = steps
            .iter()
            .filter_map(|(k, v)| Some((k.parse::<i64>().ok()?, v)))
            .collect();
        ordered.sort_by_key(|(id, _)| *id);

        // First pass: name every step so connections can resolve.
        let mut step_names: BTreeMap<i64, String> = BTreeMap::new();
        let mut input_steps: BTreeMap<i64, String> = BTreeMap::new();
        for (id, step) in &ordered {
            let name = step_task_id(*id, step);
            let step_type = step.get("type").and_then(Value::as_str).unwrap_or("tool");
            if step_type == "data_input" || step_type == "data_collection_input" {
                input_steps.insert(*id, name.clone());
            }
            step_names.insert(*id, name);
        }

        let mut edges = Vec::new();
        for (id, step) in &ordered {
            let step_type = step.get("type").and_then(Value::as_str).unwrap_or("tool");
            if let Some(param_name) = input_steps.get(id) {
                // Input steps surface as workflow-level parameters.
                let mut param = ParameterSpec::file(param_name.clone());
                if let Some(annotation) = step.get("annotation").and_then(Value::as_str)
                    && !annotation.is_empty()
                {
                    param.doc = Some(annotation.to_string());
                }
                workflow.inputs.push(param);
                continue;
            }

            let task_id = &step_names[id];
            let mut task = Task::new(task_id.clone());
            task.label = step
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(annotation) = step.get("annotation").and_then(Value::as_str)
                && !annotation.is_empty()
            {
                task.doc = Some(annotation.to_string());
            }
            task.metadata
                .insert("galaxy:step_id".into(), serde_json::json!(id));
            task.metadata.insert(
                "galaxy:type".into(),
                serde_json::json!(step_type),
            );
            if let Some(tool_id) = step.get("tool_id").and_then(Value::as_str) {
                task.metadata
                    .insert("galaxy:tool_id".into(), serde_json::json!(tool_id));
            }
            if let Some(tool_version) = step.get("tool_version").and_then(Value::as_str) {
                task.metadata
                    .insert("galaxy:tool_version".into(), serde_json::json!(tool_version));
            }
            if let Some(state) = step.get("tool_state") {
                task.metadata
                    .insert("galaxy:tool_state".into(), state.clone());
            }
            if let Some(position) = step.get("position") {
                task.metadata
                    .insert("galaxy:position".into(), position.clone());
            }

            // Connections: `{input_name: {id, output_name}}`, values may be
            // lists for multi-inputs.
            if let Some(connections) = step.get("input_connections").and_then(Value::as_object) {
                task.metadata.insert(
                    "galaxy:input_connections".into(),
                    Value::Object(connections.clone()),
                );
                for (input_name, connection) in connections {
                    let sources: Vec<&Value> = match connection {
                        Value::Array(list) => list.iter().collect(),
                        single => vec![single],
                    };
                    for source in sources {
                        let Some(source_id) = source.get("id").and_then(Value::as_i64) else {
                            continue;
                        };
                        if let Some(input_param) = input_steps.get(&source_id) {
                            task.inputs.push(ParameterSpec::file(input_param.clone()));
                        } else if let Some(parent) = step_names.get(&source_id) {
                            edges.push(Edge::new(parent.clone(), task_id.clone()));
                            task.inputs.push(ParameterSpec::file(input_name.clone()));
                        } else {
                            return Err(ParseError::Reference {
                                reference: source_id.to_string(),
                                message: format!(
                                    "connection of `{input_name}` names a missing step"
                                ),
                            });
                        }
                    }
                }
            }
            if let Some(outputs) = step.get("outputs").and_then(Value::as_array) {
                for output in outputs {
                    if let Some(name) = output.get("name").and_then(Value::as_str) {
                        task.outputs.push(ParameterSpec::file(name));
                    }
                }
            }

            workflow.add_task(task)?;
        }

        for edge in edges {
            workflow.add_edge(edge)?;
        }
        Ok(workflow)
    }
}

/// Stable task id for a step: its label when present, else `step_<id>`.
fn step_task_id(id: i64, step: &Value) -> String {
    step.get("label")
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .map_or_else(|| format!("step_{id}"), str::to_string)
}
