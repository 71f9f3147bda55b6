// SPDX-License-Identifier: MIT OR Apache-2.0
//! `.ga` exporter.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wf2wf_core::{
    Environment, EnvironmentSpecificValue, ExportError, LossEntry, LossSeverity, TargetEmitter,
    Workflow, categories, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Exporter for Galaxy `.ga` JSON exports.
#[derive(Debug)]
pub struct GalaxyExporter {
    /// Environment whose values are inspected for loss detection.
    pub environment: Environment,
}

impl Default for GalaxyExporter {
    fn default() -> Self {
        Self {
            environment: native_environment(WorkflowFormat::Galaxy),
        }
    }
}

impl GalaxyExporter {
    /// Exporter for the format's native environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter inspecting values for `environment`.
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self { environment }
    }

    fn value<'a, T>(&self, field: &'a EnvironmentSpecificValue<T>) -> Option<&'a T> {
        field.get_with_default(self.environment)
    }
}

impl TargetEmitter for GalaxyExporter {
    fn target_format(&self) -> WorkflowFormat {
        WorkflowFormat::Galaxy
    }

    /// The UI format loses most execution-model specifics; every concrete
    /// resource, environment, and error-handling value is recorded.
    fn detect_losses(&self, workflow: &Workflow) -> Vec<LossEntry> {
        let mut losses = Vec::new();
        for task in workflow.tasks() {
            let id = &task.id;
            for (field, esv) in [
                ("cpu", &task.cpu),
                ("mem_mb", &task.mem_mb),
                ("disk_mb", &task.disk_mb),
                ("gpu", &task.gpu),
                ("time_s", &task.time_s),
            ] {
                if let Some(&v) = self.value(esv) {
                    losses.push(
                        LossEntry::new(
                            format!("/tasks/{id}/{field}"),
                            field,
                            json!({
                                "all_environment_values":
                                    serde_json::to_value(esv).unwrap_or_default(),
                                "value": v,
                            }),
                            "Galaxy workflows carry no execution resources",
                            categories::ENVIRONMENT_SPECIFIC,
                        )
                        .origin(wf2wf_core::LossOrigin::User),
                    );
                }
            }

            if let Some(container) = self.value(&task.container) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/container"),
                    "container",
                    json!(container),
                    "Galaxy tools resolve their own containers; explicit references are dropped",
                    categories::ENVIRONMENT,
                ));
            }
            if let Some(conda) = self.value(&task.conda) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/conda"),
                    "conda",
                    json!(conda),
                    "Galaxy tools resolve their own dependencies; conda specs are dropped",
                    categories::ENVIRONMENT,
                ));
            }
            if let Some(command) = self.value(&task.command) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/command"),
                    "command",
                    json!(command),
                    "Galaxy steps reference tool ids, not raw command lines",
                    categories::ENVIRONMENT,
                ));
            }
            if let Some(&retries) = self.value(&task.retry_count) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/retry"),
                        "retry",
                        json!(retries),
                        "Galaxy has no per-step retry policy",
                        categories::ERROR_HANDLING,
                    )
                    .severity(LossSeverity::Info),
                );
            }
            if let Some(&priority) = self.value(&task.priority) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/priority"),
                        "priority",
                        json!(priority),
                        "Galaxy has no step priority",
                        categories::SCHEDULING,
                    )
                    .severity(LossSeverity::Info),
                );
            }
        }
        losses
    }

    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let mut steps = Map::new();
        let mut ordinal = 0_i64;
        let mut ordinals: BTreeMap<&str, i64> = BTreeMap::new();

        for input in &workflow.inputs {
            let mut step = Map::new();
            step.insert("id".into(), json!(ordinal));
            step.insert("type".into(), json!("data_input"));
            step.insert("label".into(), json!(input.id));
            step.insert("name".into(), json!("Input dataset"));
            step.insert(
                "annotation".into(),
                json!(input.doc.clone().unwrap_or_default()),
            );
            step.insert("input_connections".into(), json!({}));
            steps.insert(ordinal.to_string(), Value::Object(step));
            ordinals.insert(input.id.as_str(), ordinal);
            ordinal += 1;
        }

        for task in workflow.tasks() {
            ordinals.insert(task.id.as_str(), ordinal);
            ordinal += 1;
        }

        for task in workflow.tasks() {
            let mut step = Map::new();
            let id = ordinals[task.id.as_str()];
            step.insert("id".into(), json!(id));
            step.insert("type".into(), json!("tool"));
            step.insert("label".into(), json!(task.id));
            step.insert(
                "name".into(),
                json!(task.label.clone().unwrap_or_else(|| task.id.clone())),
            );
            step.insert(
                "annotation".into(),
                json!(task.doc.clone().unwrap_or_default()),
            );
            if let Some(tool_id) = task.metadata.get("galaxy:tool_id") {
                step.insert("tool_id".into(), tool_id.clone());
            } else {
                step.insert("tool_id".into(), json!(task.id));
            }
            if let Some(tool_version) = task.metadata.get("galaxy:tool_version") {
                step.insert("tool_version".into(), tool_version.clone());
            }
            if let Some(state) = task.metadata.get("galaxy:tool_state") {
                step.insert("tool_state".into(), state.clone());
            }
            if let Some(position) = task.metadata.get("galaxy:position") {
                step.insert("position".into(), position.clone());
            }

            // Reuse the imported connection map when present; otherwise
            // synthesise one entry per incoming edge and consumed input.
            let connections = match task.metadata.get("galaxy:input_connections") {
                Some(Value::Object(saved)) => {
                    remap_connections(saved, &ordinals, workflow)
                }
                _ => {
                    let mut conns = Map::new();
                    for input in &task.inputs {
                        if let Some(&source) = ordinals.get(input.id.as_str()) {
                            conns.insert(
                                input.id.clone(),
                                json!({"id": source, "output_name": "output"}),
                            );
                        }
                    }
                    for parent in workflow.parents_of(&task.id) {
                        if let Some(&source) = ordinals.get(parent) {
                            let output_name = workflow
                                .task(parent)
                                .and_then(|p| p.outputs.first())
                                .map_or("output", |o| o.id.as_str());
                            conns.insert(
                                format!("input_{parent}"),
                                json!({"id": source, "output_name": output_name}),
                            );
                        }
                    }
                    conns
                }
            };
            step.insert("input_connections".into(), Value::Object(connections));

            let outputs: Vec<Value> = task
                .outputs
                .iter()
                .map(|o| json!({"name": o.id, "type": "data"}))
                .collect();
            step.insert("outputs".into(), json!(outputs));
            steps.insert(id.to_string(), Value::Object(step));
        }

        let doc = json!({
            "a_galaxy_workflow": "true",
            "name": workflow.name,
            "annotation": workflow.doc.clone().unwrap_or_default(),
            "format-version": "0.1",
            "steps": steps,
        });
        let mut text = serde_json::to_string_pretty(&doc)?;
        text.push('\n');
        std::fs::write(path, text).map_err(|source| ExportError::io(path, source))?;
        Ok(vec![path.to_path_buf()])
    }
}

/// Rewrite a saved connection map so step ids follow the new ordinals.
fn remap_connections(
    saved: &Map<String, Value>,
    ordinals: &BTreeMap<&str, i64>,
    workflow: &Workflow,
) -> Map<String, Value> {
    // The saved map refers to original step ids; map them through the
    // original id → task/input name captured at import.
    let mut by_original: BTreeMap<i64, i64> = BTreeMap::new();
    for input in &workflow.inputs {
        // Input steps were imported in numeric order before tasks, which
        // the exporter reproduces, so positions line up.
        if let Some(&new_id) = ordinals.get(input.id.as_str()) {
            by_original.insert(new_id, new_id);
        }
    }
    for task in workflow.tasks() {
        if let (Some(original), Some(&new_id)) = (
            task.metadata
                .get("galaxy:step_id")
                .and_then(Value::as_i64),
            ordinals.get(task.id.as_str()),
        ) {
            by_original.insert(original, new_id);
        }
    }
    let mut out = Map::new();
    for (input_name, connection) in saved {
        let remapped = match connection {
            Value::Object(obj) => {
                let mut obj = obj.clone();
                if let Some(original) = obj.get("id").and_then(Value::as_i64) {
                    let mapped = by_original.get(&original).copied().unwrap_or(original);
                    obj.insert("id".into(), json!(mapped));
                }
                Value::Object(obj)
            }
            other => other.clone(),
        };
        out.insert(input_name.clone(), remapped);
    }
    out
}
