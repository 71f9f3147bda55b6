// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nextflow DSL2 exporter.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use wf2wf_core::{
    Environment, EnvironmentSpecificValue, ExportError, LossEntry, LossSeverity, TargetEmitter,
    Task, Workflow, categories, graph, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Exporter for `.nf` files.
#[derive(Debug)]
pub struct NextflowExporter {
    /// Environment whose values are written.
    pub environment: Environment,
}

impl Default for NextflowExporter {
    fn default() -> Self {
        Self {
            environment: native_environment(WorkflowFormat::Nextflow),
        }
    }
}

impl NextflowExporter {
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

impl TargetEmitter for NextflowExporter {
    fn target_format(&self) -> WorkflowFormat {
        WorkflowFormat::Nextflow
    }

    fn detect_losses(&self, workflow: &Workflow) -> Vec<LossEntry> {
        let mut losses = Vec::new();
        if workflow.provenance.is_some() {
            losses.push(LossEntry::new(
                "/provenance",
                "provenance",
                serde_json::to_value(&workflow.provenance).unwrap_or_default(),
                "Nextflow has no regulatory provenance block",
                categories::PROVENANCE,
            ));
        }
        if workflow.bco.is_some() {
            losses.push(LossEntry::new(
                "/bco",
                "bco",
                serde_json::to_value(&workflow.bco).unwrap_or_default(),
                "Nextflow cannot carry BioCompute Object domains",
                categories::PROVENANCE,
            ));
        }
        for task in workflow.tasks() {
            let id = &task.id;
            if let Some(&priority) = self.value(&task.priority) {
                losses.push(LossEntry::new(
                    format!("/tasks/{id}/priority"),
                    "priority",
                    serde_json::json!(priority),
                    "Nextflow has no per-process scheduler priority",
                    categories::SCHEDULING,
                ));
            }
            if task.metadata.keys().any(|k| k.starts_with("galaxy:")) {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/metadata"),
                        "metadata",
                        serde_json::json!(
                            task.metadata
                                .keys()
                                .filter(|k| k.starts_with("galaxy:"))
                                .collect::<Vec<_>>()
                        ),
                        "interactive UI metadata has no Nextflow home",
                        categories::UI_METADATA,
                    )
                    .severity(LossSeverity::Info),
                );
            }
            if let Some(scatter) = &task.scatter {
                losses.push(
                    LossEntry::new(
                        format!("/tasks/{id}/scatter"),
                        "scatter",
                        serde_json::to_value(scatter).unwrap_or_default(),
                        "scatter is implicit in Nextflow channels; the explicit spec is dropped",
                        categories::ADVANCED_FEATURES,
                    )
                    .severity(LossSeverity::Info),
                );
            }
        }
        losses
    }

    fn generate_output(&self, workflow: &Workflow, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let mut out = String::new();
        let _ = writeln!(out, "nextflow.enable.dsl = 2");

        for task in workflow.tasks() {
            out.push('\n');
            self.write_process(&mut out, task);
        }

        out.push('\n');
        let _ = writeln!(out, "workflow {{");
        let order = graph::topo_order(workflow).map_err(|e| ExportError::invalid(e.to_string()))?;
        for id in &order {
            let parents: Vec<String> = workflow
                .parents_of(id)
                .map(|p| format!("{p}.out"))
                .collect();
            let _ = writeln!(out, "    {id}({})", parents.join(", "));
        }
        let _ = writeln!(out, "}}");

        std::fs::write(path, out).map_err(|source| ExportError::io(path, source))?;
        Ok(vec![path.to_path_buf()])
    }
}

impl NextflowExporter {
    fn write_process(&self, out: &mut String, task: &Task) {
        let _ = writeln!(out, "process {} {{", task.id);
        if let Some(&cpus) = self.value(&task.cpu) {
            let _ = writeln!(out, "    cpus {cpus}");
        }
        if let Some(&mem) = self.value(&task.mem_mb) {
            let _ = writeln!(out, "    memory '{mem} MB'");
        }
        if let Some(&disk) = self.value(&task.disk_mb) {
            let _ = writeln!(out, "    disk '{disk} MB'");
        }
        if let Some(&time) = self.value(&task.time_s) {
            let _ = writeln!(out, "    time '{time}s'");
        }
        if let Some(&gpus) = self.value(&task.gpu)
            && gpus > 0
        {
            let _ = writeln!(out, "    accelerator {gpus}");
        }
        if let Some(container) = self.value(&task.container) {
            let image = container.strip_prefix("docker://").unwrap_or(container);
            let _ = writeln!(out, "    container '{image}'");
        }
        if let Some(conda) = self.value(&task.conda) {
            let _ = writeln!(out, "    conda '{conda}'");
        }
        if self.value(&task.retry_count).is_some() {
            let _ = writeln!(out, "    errorStrategy 'retry'");
        }
        if let Some(&retries) = self.value(&task.retry_count) {
            let _ = writeln!(out, "    maxRetries {retries}");
        }
        if let Some(publish) = task.metadata.get("publish_dir").and_then(|v| v.as_str()) {
            let _ = writeln!(out, "    publishDir '{publish}'");
        }

        if !task.inputs.is_empty() {
            out.push('\n');
            let _ = writeln!(out, "    input:");
            for param in &task.inputs {
                if param.param_type.involves_files() {
                    let _ = writeln!(out, "    path \"{}\"", param.id);
                } else {
                    let _ = writeln!(out, "    val {}", param.id);
                }
            }
        }
        if !task.outputs.is_empty() {
            out.push('\n');
            let _ = writeln!(out, "    output:");
            for param in &task.outputs {
                if param.param_type.involves_files() {
                    let _ = writeln!(out, "    path \"{}\"", param.id);
                } else {
                    let _ = writeln!(out, "    val {}", param.id);
                }
            }
        }

        out.push('\n');
        let _ = writeln!(out, "    script:");
        let _ = writeln!(out, "    \"\"\"");
        if let Some(command) = self.value(&task.command) {
            let _ = writeln!(out, "    {command}");
        } else if let Some(script) = self.value(&task.script) {
            for line in script.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        let _ = writeln!(out, "    \"\"\"");
        let _ = writeln!(out, "}}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::NextflowImporter;
    use wf2wf_core::{Edge, ParameterSpec, SourceParser, TaskBuilder};

    const ENV: Environment = Environment::SharedFilesystem;

    fn sample() -> Workflow {
        let mut wf = Workflow::new("demo", "1.0");
        wf.add_task(
            TaskBuilder::new("ALIGN")
                .on(ENV)
                .command("bwa mem reads.fq > out.bam")
                .cpu(4)
                .mem_mb(8192)
                .container("docker://biocontainers/bwa:0.7.17")
                .retry_count(3)
                .input(ParameterSpec::file("reads.fq"))
                .output(ParameterSpec::file("out.bam"))
                .build(),
        )
        .unwrap();
        wf.add_task(
            TaskBuilder::new("SORT")
                .on(ENV)
                .command("samtools sort out.bam > sorted.bam")
                .input(ParameterSpec::file("out.bam"))
                .output(ParameterSpec::file("sorted.bam"))
                .build(),
        )
        .unwrap();
        wf.add_edge(Edge::new("ALIGN", "SORT")).unwrap();
        wf
    }

    #[test]
    fn emits_processes_and_workflow_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.nf");
        NextflowExporter::new().generate_output(&sample(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("process ALIGN {"));
        assert!(text.contains("cpus 4"));
        assert!(text.contains("memory '8192 MB'"));
        assert!(text.contains("container 'biocontainers/bwa:0.7.17'"));
        assert!(text.contains("errorStrategy 'retry'"));
        assert!(text.contains("maxRetries 3"));
        assert!(text.contains("workflow {"));
        assert!(text.contains("SORT(ALIGN.out)"));
    }

    #[test]
    fn roundtrip_preserves_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.nf");
        NextflowExporter::new().generate_output(&sample(), &path).unwrap();
        let back = NextflowImporter::new().parse_source(&path).unwrap();
        assert_eq!(back.task_count(), 2);
        let align = back.task("ALIGN").unwrap();
        assert_eq!(align.cpu.get_for(ENV), Some(&4));
        assert_eq!(align.mem_mb.get_for(ENV), Some(&8192));
        assert_eq!(align.retry_count.get_for(ENV), Some(&3));
        assert_eq!(back.edges()[0], Edge::new("ALIGN", "SORT"));
    }

    #[test]
    fn priority_loss_detected() {
        let mut wf = Workflow::new("t", "1.0");
        wf.add_task(TaskBuilder::new("X").on(ENV).command("x").priority(9).build())
            .unwrap();
        let losses = NextflowExporter::new().detect_losses(&wf);
        assert!(losses.iter().any(|l| l.field == "priority"));
    }

    #[test]
    fn provenance_loss_detected() {
        let mut wf = sample();
        wf.provenance = Some(wf2wf_core::ProvenanceSpec {
            authors: vec!["A. Author".into()],
            ..Default::default()
        });
        let losses = NextflowExporter::new().detect_losses(&wf);
        assert!(losses.iter().any(|l| l.field == "provenance"));
    }
}
