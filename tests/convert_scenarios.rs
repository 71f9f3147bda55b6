// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end conversion scenarios across the format bridges.

use std::path::{Path, PathBuf};
use wf2wf_config::ConversionOptions;
use wf2wf_core::{
    Environment, LossOrigin, LossSeverity, LossStatus, TaskBuilder, Workflow, canonical_json,
    categories,
};
use wf2wf_format::WorkflowFormat;
use wf2wf_loss::LossRegistry;
use wf2wf_pipeline::convert;
use wf2wf_prompt::{Prompter, ScriptedSource};

fn headless_options() -> ConversionOptions {
    let mut options = ConversionOptions::default();
    options.headless = true;
    options
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

// ── S1: rule-based build → DAG with inline submit ───────────────────────

#[test]
fn s1_snakemake_to_dagman_inline() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("wf.smk");
    write(
        &src,
        r#"rule align:
    input:
        "r.fq"
    output:
        "r.bam"
    resources:
        mem_mb=8000
    threads: 4
    container: "docker://bwa:latest"
    shell:
        "bwa mem r.fq > r.bam"
"#,
    );
    let dst = dir.path().join("wf.dag");
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.exit_code(), 0);

    let dag = std::fs::read_to_string(&dst).unwrap();
    assert!(dag.contains("JOB align {"));
    assert!(dag.contains("request_cpus = 4"));
    assert!(dag.contains("request_memory = 8000MB"));
    assert!(dag.contains("universe = docker"));
    assert!(dag.contains("docker_image = bwa:latest"));
    assert!(dag.contains("queue"));

    // A companion script carries the shell command.
    let script = std::fs::read_to_string(dir.path().join("scripts/align.sh")).unwrap();
    assert!(script.contains("bwa mem r.fq > r.bam"));

    // No loss entries.
    let sidecar = LossRegistry::read_adjacent(&dst).unwrap().unwrap();
    assert!(sidecar.entries.is_empty());
    assert_eq!(sidecar.target_engine, "dagman");
    assert!(sidecar.has_valid_checksum_format());
}

// ── S2: task-typed → standards-based with scatter ───────────────────────

#[test]
fn s2_wdl_scatter_to_cwl() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("wf.wdl");
    write(
        &src,
        r#"version 1.0

task align {
  input {
    File reads
  }
  command <<<
    bwa mem ~{reads} > out.bam
  >>>
  output {
    File bam = "out.bam"
  }
}

workflow pipeline {
  input {
    Array[File] samples
  }
  scatter (sample in samples) {
    call align { input: reads = sample }
  }
}
"#,
    );
    let dst = dir.path().join("wf.cwl");
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.exit_code(), 0);

    let cwl = std::fs::read_to_string(&dst).unwrap();
    assert!(cwl.contains("scatter: samples"));
    assert!(cwl.contains("scatterMethod: dotproduct"));

    let sidecar = LossRegistry::read_adjacent(&dst).unwrap().unwrap();
    assert!(sidecar.entries.is_empty());
}

// ── S3: rule-based → standards-based dropping priority ──────────────────

#[test]
fn s3_priority_dropped_retry_adapted() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("wf.smk");
    write(
        &src,
        "rule process:\n    output:\n        \"x.txt\"\n    priority: 10\n    retries: 3\n    shell:\n        \"tool x\"\n",
    );
    let dst = dir.path().join("wf.cwl");
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.exit_code(), 0);

    let cwl = std::fs::read_to_string(&dst).unwrap();
    // Priority is gone; retry survives as a hint.
    assert!(!cwl.contains("priority"));
    assert!(cwl.contains("wf2wf:retry"));

    let sidecar = LossRegistry::read_adjacent(&dst).unwrap().unwrap();
    assert_eq!(sidecar.entries.len(), 2);

    let priority = sidecar
        .entries
        .iter()
        .find(|e| e.json_pointer == "/tasks/process/priority")
        .expect("priority entry");
    assert_eq!(priority.severity, LossSeverity::Warn);
    assert_eq!(priority.status, LossStatus::Lost);

    let retry = sidecar
        .entries
        .iter()
        .find(|e| e.json_pointer == "/tasks/process/retry")
        .expect("retry entry");
    assert_eq!(retry.severity, LossSeverity::Info);
    assert_eq!(retry.status, LossStatus::Adapted);
}

// ── S5: adaptation from shared to distributed ───────────────────────────

#[test]
fn s5_shared_to_distributed_memory_scaling() {
    let mut wf = Workflow::new("wf", "1.0");
    wf.add_task(
        TaskBuilder::new("t")
            .on(Environment::SharedFilesystem)
            .mem_mb(10_240)
            .build(),
    )
    .unwrap();
    let mut losses = Vec::new();
    wf2wf_adapt::adapt_workflow(
        &mut wf,
        Environment::SharedFilesystem,
        Environment::DistributedComputing,
        &mut losses,
    );

    let mem = &wf.task("t").unwrap().mem_mb;
    assert_eq!(mem.get_for(Environment::DistributedComputing), Some(&11_264));
    assert_eq!(mem.get_for(Environment::SharedFilesystem), Some(&10_240));

    let entry = losses.iter().find(|e| e.field == "mem_mb").unwrap();
    assert_eq!(entry.category, categories::ENVIRONMENT_SPECIFIC);
    assert_eq!(entry.status, LossStatus::Adapted);
    let details = entry.adaptation_details.as_ref().unwrap();
    assert_eq!(details["original_value"], 10_240);
    assert_eq!(details["adapted_value"], 11_264);
    assert_eq!(details["adaptation_method"], "scale×1.10");
}

// ── S6: headless mode applies the documented container default ──────────

#[test]
fn s6_headless_default_containers() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("wf.smk");
    write(
        &src,
        "rule a:\n    shell:\n        \"tool a\"\n\nrule b:\n    shell:\n        \"tool b\"\n",
    );
    let dst = dir.path().join("wf.wdl");
    // Headless: the conversion must not block on a prompt.
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.exit_code(), 0);

    let wdl = std::fs::read_to_string(&dst).unwrap();
    assert!(wdl.contains("wf2wf/default:latest"));

    let sidecar = LossRegistry::read_adjacent(&dst).unwrap().unwrap();
    let container_entries: Vec<_> = sidecar
        .entries
        .iter()
        .filter(|e| e.field == "container")
        .collect();
    assert_eq!(container_entries.len(), 2);
    for entry in container_entries {
        assert_eq!(entry.origin, LossOrigin::Wf2wf);
        assert_eq!(entry.status, LossStatus::Adapted);
    }
    // Both prompt decisions were taken headlessly.
    assert!(report.prompts.iter().all(|p| p.headless));
}

// ── Boundary behaviours ─────────────────────────────────────────────────

#[test]
fn empty_workflow_exports_to_every_target() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("empty.json");
    let empty = Workflow::new("empty", "1.0");
    write(&src, &canonical_json(&empty).unwrap());

    for &target in WorkflowFormat::all() {
        let dst: PathBuf = dir
            .path()
            .join(format!("empty_out.{}", target.extension()));
        let report = convert(&src, &dst, &headless_options())
            .unwrap_or_else(|e| panic!("empty export to {target} failed: {e}"));
        assert_eq!(report.exit_code(), 0, "{target}");
        assert!(dst.exists(), "{target}");
        // The side-car needs nothing beyond its header.
        let sidecar = LossRegistry::read_adjacent(&dst).unwrap().unwrap();
        assert!(sidecar.entries.is_empty(), "{target}");
    }
}

#[test]
fn single_task_without_resources_gets_conservative_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("wf.smk");
    write(&src, "rule only:\n    shell:\n        \"./custom-tool\"\n");
    let dst = dir.path().join("wf.ga");
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.exit_code(), 0);

    // Inference applied the minimum profile, which Galaxy cannot express,
    // so the side-car is non-empty.
    let sidecar = LossRegistry::read_adjacent(&dst).unwrap().unwrap();
    assert!(!sidecar.entries.is_empty());
    assert!(sidecar.entries.iter().any(|e| e.field == "cpu"));
    assert!(sidecar.entries.iter().any(|e| e.field == "mem_mb"));
}

#[test]
fn scripted_quit_cancels_with_distinct_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("wf.smk");
    write(&src, "rule a:\n    shell:\n        \"tool a\"\n");
    let dst = dir.path().join("wf.wdl");

    let mut prompter = Prompter::new(ScriptedSource::new([wf2wf_prompt::Answer::Quit]), false);
    let err = wf2wf_pipeline::convert_with_prompter(
        &src,
        &dst,
        None,
        None,
        &ConversionOptions::default(),
        &mut prompter,
    )
    .unwrap_err();
    assert_eq!(err.code(), wf2wf_error::ErrorCode::PromptCancelled);
    assert_eq!(err.code().exit_code(), 3);
}
