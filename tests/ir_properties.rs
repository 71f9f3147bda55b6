// SPDX-License-Identifier: MIT OR Apache-2.0
//! Quantified IR invariants: acyclicity, reference integrity, canonical
//! determinism, checksum stability, environment-value preservation, and
//! inference idempotence.

use proptest::prelude::*;
use wf2wf_core::{
    Edge, Environment, GraphError, ParameterSpec, Task, TaskBuilder, Workflow, canonical_json,
    graph, source_checksum,
};
use wf2wf_format::WorkflowFormat;
use wf2wf_validate::SchemaValidator;

fn sample_workflow() -> Workflow {
    let mut wf = Workflow::new("sample", "1.0");
    wf.add_task(
        TaskBuilder::new("align")
            .on(Environment::SharedFilesystem)
            .command("bwa mem r.fq > r.bam")
            .cpu(4)
            .mem_mb(8192)
            .input(ParameterSpec::file("r.fq"))
            .output(ParameterSpec::file("r.bam"))
            .build(),
    )
    .unwrap();
    wf.add_task(
        TaskBuilder::new("sort")
            .on(Environment::SharedFilesystem)
            .command("samtools sort r.bam")
            .build(),
    )
    .unwrap();
    wf.add_edge(Edge::new("align", "sort")).unwrap();
    wf
}

// ── Property 1 & 2: acyclicity and reference integrity ──────────────────

#[test]
fn imported_workflows_are_acyclic_with_resolved_references() {
    let wf = sample_workflow();
    let order = graph::topo_order(&wf).expect("workflow is a DAG");
    assert_eq!(order.len(), wf.task_count());
    for edge in wf.edges() {
        assert!(wf.has_task(&edge.parent));
        assert!(wf.has_task(&edge.child));
    }
}

#[test]
fn cycle_introduction_is_rejected() {
    let mut wf = sample_workflow();
    let err = wf.add_edge(Edge::new("sort", "align")).unwrap_err();
    assert!(matches!(err, GraphError::CycleIntroduced { .. }));
    // The rejected edge must not have mutated the workflow.
    assert_eq!(wf.edges().len(), 1);
}

// ── Property 3: canonical determinism ───────────────────────────────────

#[test]
fn canonical_form_survives_roundtrip() {
    let wf = sample_workflow();
    let canon = canonical_json(&wf).unwrap();
    let back: Workflow = serde_json::from_str(&canon).unwrap();
    assert_eq!(canonical_json(&back).unwrap(), canon);
}

proptest! {
    #[test]
    fn canonical_determinism_for_generated_workflows(
        specs in proptest::collection::btree_map("[a-z]{1,6}", 1_i64..100_000, 1..8)
    ) {
        let mut wf = Workflow::new("generated", "1.0");
        for (id, mem) in &specs {
            wf.add_task(
                TaskBuilder::new(id.clone())
                    .on(Environment::SharedFilesystem)
                    .mem_mb(*mem)
                    .build(),
            )
            .unwrap();
        }
        let canon = canonical_json(&wf).unwrap();
        let back: Workflow = serde_json::from_str(&canon).unwrap();
        prop_assert_eq!(canonical_json(&back).unwrap(), canon);
        prop_assert_eq!(source_checksum(&wf).unwrap(), source_checksum(&back).unwrap());
    }
}

// ── Property 4: checksum stability ──────────────────────────────────────

#[test]
fn semantically_equal_workflows_share_a_checksum() {
    // Task insertion order differs; canonical form sorts map keys.
    let mut first = Workflow::new("wf", "1.0");
    first.add_task(Task::new("a")).unwrap();
    first.add_task(Task::new("b")).unwrap();
    let mut second = Workflow::new("wf", "1.0");
    second.add_task(Task::new("b")).unwrap();
    second.add_task(Task::new("a")).unwrap();
    assert_eq!(
        source_checksum(&first).unwrap(),
        source_checksum(&second).unwrap()
    );
}

#[test]
fn checksum_format_is_sha256_hex() {
    let sum = source_checksum(&sample_workflow()).unwrap();
    let hex = sum.strip_prefix("sha256:").expect("prefix");
    assert_eq!(hex.len(), 64);
    assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
}

// ── Property 6: environment-value preservation under adaptation ─────────

#[test]
fn adaptation_preserves_source_environment_values() {
    for &target in Environment::all() {
        let mut wf = Workflow::new("wf", "1.0");
        wf.add_task(
            TaskBuilder::new("t")
                .on(Environment::SharedFilesystem)
                .mem_mb(10_240)
                .cpu(8)
                .build(),
        )
        .unwrap();
        let mut losses = Vec::new();
        wf2wf_adapt::adapt_workflow(&mut wf, Environment::SharedFilesystem, target, &mut losses);
        let task = wf.task("t").unwrap();
        assert_eq!(
            task.mem_mb.get_for(Environment::SharedFilesystem),
            Some(&10_240),
            "source memory changed while adapting to {target}"
        );
        assert_eq!(task.cpu.get_for(Environment::SharedFilesystem), Some(&8));
    }
}

// ── Property 7: inference idempotence ───────────────────────────────────

#[test]
fn inference_is_idempotent_across_formats() {
    for &target in &[
        WorkflowFormat::Dagman,
        WorkflowFormat::Cwl,
        WorkflowFormat::Snakemake,
    ] {
        let mut wf = sample_workflow();
        wf2wf_infer::run_inference(
            &mut wf,
            WorkflowFormat::Snakemake,
            target,
            Environment::SharedFilesystem,
        );
        let first = canonical_json(&wf).unwrap();
        wf2wf_infer::run_inference(
            &mut wf,
            WorkflowFormat::Snakemake,
            target,
            Environment::SharedFilesystem,
        );
        assert_eq!(canonical_json(&wf).unwrap(), first, "not idempotent for {target}");
    }
}

// ── Invariant 5: applicability semantics ────────────────────────────────

#[test]
fn applicability_requires_entry_or_default() {
    let mut task = Task::new("t");
    task.mem_mb.set_for(Environment::SharedFilesystem, 1024);
    for &env in Environment::all() {
        let applicable = task.mem_mb.is_applicable_to(env);
        assert_eq!(applicable, env == Environment::SharedFilesystem);
    }
    task.mem_mb.set_default(512);
    for &env in Environment::all() {
        assert!(task.mem_mb.is_applicable_to(env));
    }
}

// ── Schema validation over the produced IR ──────────────────────────────

#[test]
fn sample_workflow_passes_schema_and_invariants() {
    let validator = SchemaValidator::new().unwrap();
    validator.ensure_valid(&sample_workflow()).unwrap();
}

#[test]
fn legacy_flat_scalars_deserialise() {
    let wf: Workflow = serde_json::from_value(serde_json::json!({
        "name": "legacy",
        "version": "1.0",
        "tasks": {
            "old": {"id": "old", "cpu": 2, "mem_mb": 4096, "command": "tool"}
        }
    }))
    .unwrap();
    let task = wf.task("old").unwrap();
    assert_eq!(task.cpu.default_value(), Some(&2));
    assert_eq!(task.mem_mb.default_value(), Some(&4096));
    SchemaValidator::new().unwrap().ensure_valid(&wf).unwrap();
}
