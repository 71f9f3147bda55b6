// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # wf2wf-validate
//!
//! Schema and invariant validation for the wf2wf IR.

/// Path-string classification.
pub mod paths;
/// Environment-name and resource-range rules.
pub mod rules;

pub use paths::{PathKind, classify_path};
pub use rules::{
    RESOURCE_RULES, ResourceRule, clamp_resource, is_valid_environment_name, is_valid_resource,
    resource_bounds,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use wf2wf_core::{LossStatus, Workflow, graph};

// ── Issues & errors ─────────────────────────────────────────────────────

/// One structured validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// JSON pointer to the offending location.
    pub json_pointer: String,
    /// Short rule identifier (e.g. `"schema"`, `"acyclicity"`).
    pub rule: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn new(pointer: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            json_pointer: pointer.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Errors from building or running the validator.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// The bundled schema failed to compile.
    #[error("failed to build IR schema validator: {reason}")]
    SchemaBuild {
        /// Compilation failure detail.
        reason: String,
    },
    /// The candidate could not be serialised for validation.
    #[error("failed to serialize candidate IR: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Validation found one or more issues.
    #[error("IR validation failed with {} issue(s)", .issues.len())]
    Invalid {
        /// All findings, schema issues first.
        issues: Vec<ValidationIssue>,
    },
}

// ── SchemaValidator ─────────────────────────────────────────────────────

/// Validates candidate IR documents against the bundled v0.1 schema and
/// the cross-field invariants the schema cannot express.
pub struct SchemaValidator {
    workflow_schema: jsonschema::Validator,
}

impl SchemaValidator {
    /// Build a validator from the bundled workflow schema.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::SchemaBuild`] if the generated schema does
    /// not compile (a bug, not an input error).
    pub fn new() -> Result<Self, ValidateError> {
        let schema = schemars::schema_for!(Workflow);
        let value = serde_json::to_value(&schema)?;
        let workflow_schema =
            jsonschema::validator_for(&value).map_err(|e| ValidateError::SchemaBuild {
                reason: e.to_string(),
            })?;
        Ok(Self { workflow_schema })
    }

    /// The bundled workflow schema as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::Serialize`] if schema serialisation fails.
    pub fn workflow_schema_value() -> Result<serde_json::Value, ValidateError> {
        Ok(serde_json::to_value(schemars::schema_for!(Workflow))?)
    }

    /// Validate a serialised IR document against the schema only.
    #[must_use]
    pub fn validate_value(&self, instance: &serde_json::Value) -> Vec<ValidationIssue> {
        self.workflow_schema
            .iter_errors(instance)
            .map(|err| {
                ValidationIssue::new(err.instance_path.to_string(), "schema", err.to_string())
            })
            .collect()
    }

    /// Validate a workflow against the schema and all cross-field
    /// invariants. Returns every finding; an empty result means valid.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::Serialize`] only if the workflow cannot be
    /// serialised at all.
    pub fn check_workflow(&self, workflow: &Workflow) -> Result<Vec<ValidationIssue>, ValidateError> {
        let value = serde_json::to_value(workflow)?;
        let mut issues = self.validate_value(&value);
        issues.extend(check_invariants(workflow, &value));
        Ok(issues)
    }

    /// Validate a workflow, failing if any issue is found.
    ///
    /// Validation failure is fatal at the end of import but non-fatal at
    /// the start; callers choose how to react.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::Invalid`] carrying every finding.
    pub fn ensure_valid(&self, workflow: &Workflow) -> Result<(), ValidateError> {
        let issues = self.check_workflow(workflow)?;
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidateError::Invalid { issues })
        }
    }
}

// ── Cross-field invariants ──────────────────────────────────────────────

/// Check the invariants the JSON Schema cannot express.
///
/// `value` must be the serialisation of `workflow` (used for loss-map
/// pointer resolution).
#[must_use]
pub fn check_invariants(workflow: &Workflow, value: &serde_json::Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // Invariant 1: edge endpoints resolve. Deserialised workflows bypass
    // `add_edge`, so this is re-checked here.
    for (i, edge) in workflow.edges().iter().enumerate() {
        for id in [&edge.parent, &edge.child] {
            if !workflow.has_task(id) {
                issues.push(ValidationIssue::new(
                    format!("/edges/{i}"),
                    "reference_integrity",
                    format!("edge endpoint `{id}` does not resolve to a task"),
                ));
            }
        }
    }

    // Invariant 2: acyclicity.
    if issues.is_empty()
        && let Err(err) = graph::topo_order(workflow)
    {
        issues.push(ValidationIssue::new("/edges", "acyclicity", err.to_string()));
    }

    // Invariant 3: parameter ids unique per collection.
    check_unique_params(&mut issues, "/inputs", workflow.inputs.iter().map(|p| &p.id));
    check_unique_params(&mut issues, "/outputs", workflow.outputs.iter().map(|p| &p.id));
    for task in workflow.tasks() {
        check_unique_params(
            &mut issues,
            &format!("/tasks/{}/inputs", task.id),
            task.inputs.iter().map(|p| &p.id),
        );
        check_unique_params(
            &mut issues,
            &format!("/tasks/{}/outputs", task.id),
            task.outputs.iter().map(|p| &p.id),
        );
    }

    // Invariant 4: resource ranges.
    for task in workflow.tasks() {
        check_resource(&mut issues, &task.id, "cpu", &task.cpu);
        check_resource(&mut issues, &task.id, "mem_mb", &task.mem_mb);
        check_resource(&mut issues, &task.id, "disk_mb", &task.disk_mb);
        check_resource(&mut issues, &task.id, "gpu", &task.gpu);
        check_resource(&mut issues, &task.id, "gpu_mem_mb", &task.gpu_mem_mb);
        check_resource(&mut issues, &task.id, "time_s", &task.time_s);
        check_resource(&mut issues, &task.id, "threads", &task.threads);
    }

    // Invariant 6: loss-map pointers resolve for entries that claim to
    // describe the current IR. `reapplied` and `lost_again` entries are
    // historical; their pointers may have left the document.
    for (i, entry) in workflow.loss_map.iter().enumerate() {
        if matches!(entry.status, LossStatus::Lost | LossStatus::Adapted)
            && value.pointer(&entry.json_pointer).is_none()
        {
            issues.push(ValidationIssue::new(
                format!("/loss_map/{i}"),
                "loss_pointer",
                format!(
                    "loss entry pointer `{}` does not resolve against the IR",
                    entry.json_pointer
                ),
            ));
        }
    }

    issues
}

fn check_unique_params<'a>(
    issues: &mut Vec<ValidationIssue>,
    pointer: &str,
    ids: impl Iterator<Item = &'a String>,
) {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            issues.push(ValidationIssue::new(
                pointer,
                "parameter_uniqueness",
                format!("duplicate parameter id `{id}`"),
            ));
        }
    }
}

fn check_resource(
    issues: &mut Vec<ValidationIssue>,
    task_id: &str,
    field: &'static str,
    value: &wf2wf_core::EnvironmentSpecificValue<i64>,
) {
    let mut offenders: Vec<i64> = Vec::new();
    if let Some(v) = value.default_value()
        && !is_valid_resource(field, *v)
    {
        offenders.push(*v);
    }
    for (_, v) in value.entries() {
        if !is_valid_resource(field, *v) {
            offenders.push(*v);
        }
    }
    for v in offenders {
        issues.push(ValidationIssue::new(
            format!("/tasks/{task_id}/{field}"),
            "resource_range",
            format!("value {v} outside permitted range for `{field}`"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf2wf_core::{Edge, Environment, ParameterSpec, Task, TaskBuilder};

    fn validator() -> SchemaValidator {
        SchemaValidator::new().expect("bundled schema compiles")
    }

    fn valid_workflow() -> Workflow {
        let mut wf = Workflow::new("demo", "1.0");
        wf.add_task(
            TaskBuilder::new("align")
                .on(Environment::SharedFilesystem)
                .command("bwa mem r.fq > r.bam")
                .cpu(4)
                .mem_mb(8000)
                .build(),
        )
        .unwrap();
        wf.add_task(Task::new("sort")).unwrap();
        wf.add_edge(Edge::new("align", "sort")).unwrap();
        wf
    }

    #[test]
    fn schema_compiles() {
        let _ = validator();
    }

    #[test]
    fn valid_workflow_passes() {
        let wf = valid_workflow();
        assert!(validator().check_workflow(&wf).unwrap().is_empty());
        assert!(validator().ensure_valid(&wf).is_ok());
    }

    #[test]
    fn empty_workflow_passes() {
        let wf = Workflow::new("empty", "1.0");
        assert!(validator().ensure_valid(&wf).is_ok());
    }

    #[test]
    fn dangling_edge_detected() {
        // Bypass add_edge via deserialisation of a crafted document.
        let wf: Workflow = serde_json::from_value(serde_json::json!({
            "name": "bad", "version": "1.0",
            "tasks": {"a": {"id": "a"}},
            "edges": [{"parent": "a", "child": "ghost"}]
        }))
        .unwrap();
        let issues = validator().check_workflow(&wf).unwrap();
        assert!(issues.iter().any(|i| i.rule == "reference_integrity"));
    }

    #[test]
    fn cycle_detected_in_crafted_document() {
        let wf: Workflow = serde_json::from_value(serde_json::json!({
            "name": "bad", "version": "1.0",
            "tasks": {"a": {"id": "a"}, "b": {"id": "b"}},
            "edges": [
                {"parent": "a", "child": "b"},
                {"parent": "b", "child": "a"}
            ]
        }))
        .unwrap();
        let issues = validator().check_workflow(&wf).unwrap();
        assert!(issues.iter().any(|i| i.rule == "acyclicity"));
    }

    #[test]
    fn duplicate_parameter_ids_detected() {
        let mut wf = Workflow::new("dup", "1.0");
        wf.inputs.push(ParameterSpec::file("x"));
        wf.inputs.push(ParameterSpec::file("x"));
        let issues = validator().check_workflow(&wf).unwrap();
        assert!(issues.iter().any(|i| i.rule == "parameter_uniqueness"));
    }

    #[test]
    fn zero_cpu_detected() {
        let mut wf = Workflow::new("res", "1.0");
        wf.add_task(TaskBuilder::new("t").cpu(0).build()).unwrap();
        let issues = validator().check_workflow(&wf).unwrap();
        assert!(issues.iter().any(|i| i.rule == "resource_range"
            && i.json_pointer == "/tasks/t/cpu"));
    }

    #[test]
    fn negative_memory_detected() {
        let mut wf = Workflow::new("res", "1.0");
        wf.add_task(TaskBuilder::new("t").mem_mb(-5).build()).unwrap();
        let issues = validator().check_workflow(&wf).unwrap();
        assert!(issues.iter().any(|i| i.rule == "resource_range"));
    }

    #[test]
    fn unresolvable_lost_pointer_detected() {
        let mut wf = valid_workflow();
        wf.loss_map.push(wf2wf_core::LossEntry::new(
            "/tasks/missing/priority",
            "priority",
            serde_json::json!(5),
            "target has no priority",
            wf2wf_core::categories::SCHEDULING,
        ));
        let issues = validator().check_workflow(&wf).unwrap();
        assert!(issues.iter().any(|i| i.rule == "loss_pointer"));
    }

    #[test]
    fn reapplied_pointer_not_checked() {
        let mut wf = valid_workflow();
        wf.loss_map.push(
            wf2wf_core::LossEntry::new(
                "/tasks/missing/priority",
                "priority",
                serde_json::json!(5),
                "historical",
                wf2wf_core::categories::SCHEDULING,
            )
            .status(LossStatus::Reapplied),
        );
        assert!(validator().ensure_valid(&wf).is_ok());
    }

    #[test]
    fn resolvable_lost_pointer_ok() {
        let mut wf = valid_workflow();
        wf.loss_map.push(wf2wf_core::LossEntry::new(
            "/tasks/align/mem_mb",
            "mem_mb",
            serde_json::json!(8000),
            "memory dropped by target",
            wf2wf_core::categories::ENVIRONMENT_SPECIFIC,
        ));
        assert!(validator().ensure_valid(&wf).is_ok());
    }
}
