// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loss side-car round trips: reinjection on re-import, checksum
//! verification, and the never-stays-lost property for user values.

use std::path::Path;
use wf2wf_config::ConversionOptions;
use wf2wf_core::{
    LossEntry, LossOrigin, LossStatus, TaskBuilder, Workflow, canonical_json, categories,
    source_checksum,
};
use wf2wf_loss::{LossRegistry, SideCarDocument, sidecar_path};
use wf2wf_pipeline::convert;

fn headless_options() -> ConversionOptions {
    let mut options = ConversionOptions::default();
    options.headless = true;
    options
}

fn gpu_workflow() -> Workflow {
    let mut wf = Workflow::new("gpuflow", "1.0");
    wf.add_task(
        TaskBuilder::new("train")
            .command("train.py")
            .cpu(2)
            .mem_mb(4096)
            .gpu(2)
            .gpu_mem_mb(8192)
            .build(),
    )
    .unwrap();
    wf
}

fn write_ir(dir: &Path, name: &str, wf: &Workflow) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, canonical_json(wf).unwrap()).unwrap();
    path
}

// ── S4: GPU requirements round trip through the rule format ─────────────

#[test]
fn s4_gpu_entries_reapply_on_reimport() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_ir(dir.path(), "wf.json", &gpu_workflow());

    // Export to the rule format, which cannot express GPU scheduling.
    let smk = dir.path().join("wf.smk");
    convert(&src, &smk, &headless_options()).unwrap();
    let sidecar = LossRegistry::read_adjacent(&smk).unwrap().unwrap();
    let gpu_entries: Vec<&LossEntry> = sidecar
        .entries
        .iter()
        .filter(|e| e.category == categories::GPU)
        .collect();
    assert!(!gpu_entries.is_empty());
    for entry in &gpu_entries {
        assert_eq!(entry.status, LossStatus::Lost);
        assert_eq!(entry.origin, LossOrigin::User);
    }

    // Re-import the rule file alongside its side-car.
    let back = dir.path().join("back.json");
    let report = convert(&smk, &back, &headless_options()).unwrap();
    assert_eq!(report.exit_code(), 0);

    // Every GPU entry transitioned to reapplied.
    let reapplied = report.losses.by_status.get("reapplied").copied().unwrap_or(0);
    assert!(reapplied >= gpu_entries.len());
    let out_sidecar = LossRegistry::read_adjacent(&back).unwrap().unwrap();
    for entry in out_sidecar.entries.iter().filter(|e| e.category == categories::GPU) {
        assert_eq!(entry.status, LossStatus::Reapplied, "{}", entry.json_pointer);
    }

    // The reconstructed IR carries the GPU values again.
    let restored: Workflow =
        serde_json::from_str(&std::fs::read_to_string(&back).unwrap()).unwrap();
    let train = restored.task("train").unwrap();
    assert_eq!(train.gpu.default_value(), Some(&2));
    assert_eq!(train.gpu_mem_mb.default_value(), Some(&8192));
}

// ── Property 5: user-origin entries never end `lost` ────────────────────

#[test]
fn user_entries_never_stay_lost_after_sidecar_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_ir(dir.path(), "wf.json", &gpu_workflow());
    let smk = dir.path().join("wf.smk");
    convert(&src, &smk, &headless_options()).unwrap();
    let back = dir.path().join("back.json");
    convert(&smk, &back, &headless_options()).unwrap();

    let out_sidecar = LossRegistry::read_adjacent(&back).unwrap().unwrap();
    for entry in out_sidecar
        .entries
        .iter()
        .filter(|e| e.origin == LossOrigin::User)
    {
        assert!(
            matches!(entry.status, LossStatus::Reapplied | LossStatus::LostAgain),
            "user entry at {} ended as {:?}",
            entry.json_pointer,
            entry.status
        );
    }
}

// ── Checksum verification on IR side-cars ───────────────────────────────

fn ir_sidecar(checksum: &str, entries: Vec<LossEntry>) -> SideCarDocument {
    SideCarDocument {
        wf2wf_version: "0.1.0".into(),
        target_engine: "wf2wf".into(),
        source_checksum: checksum.into(),
        timestamp: None,
        environment_adaptation: None,
        summary: None,
        entries,
    }
}

fn priority_entry() -> LossEntry {
    LossEntry::new(
        "/tasks/train/priority",
        "priority",
        serde_json::json!({"default_value": 9}),
        "dropped by a previous export",
        categories::SCHEDULING,
    )
    .origin(LossOrigin::User)
}

#[test]
fn mismatched_checksum_ignores_sidecar_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let wf = gpu_workflow();
    let src = write_ir(dir.path(), "wf.json", &wf);
    let doc = ir_sidecar(&format!("sha256:{}", "0".repeat(64)), vec![priority_entry()]);
    std::fs::write(
        sidecar_path(&src),
        serde_json::to_string_pretty(&doc).unwrap(),
    )
    .unwrap();

    let dst = dir.path().join("out.json");
    let report = convert(&src, &dst, &headless_options()).unwrap();
    // The side-car was ignored: nothing reapplied, workflow unchanged.
    assert_eq!(report.losses.by_status.get("reapplied"), None);
    let out: Workflow = serde_json::from_str(&std::fs::read_to_string(&dst).unwrap()).unwrap();
    assert!(out.task("train").unwrap().priority.is_unset());
}

#[test]
fn matching_checksum_reapplies_ir_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let wf = gpu_workflow();
    let src = write_ir(dir.path(), "wf.json", &wf);
    let doc = ir_sidecar(&source_checksum(&wf).unwrap(), vec![priority_entry()]);
    std::fs::write(
        sidecar_path(&src),
        serde_json::to_string_pretty(&doc).unwrap(),
    )
    .unwrap();

    let dst = dir.path().join("out.json");
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.losses.by_status.get("reapplied"), Some(&1));
    let out: Workflow = serde_json::from_str(&std::fs::read_to_string(&dst).unwrap()).unwrap();
    assert_eq!(out.task("train").unwrap().priority.default_value(), Some(&9));
}

#[test]
fn unresolvable_entry_becomes_lost_again() {
    let dir = tempfile::tempdir().unwrap();
    let wf = gpu_workflow();
    let src = write_ir(dir.path(), "wf.json", &wf);
    let ghost = LossEntry::new(
        "/tasks/ghost/priority",
        "priority",
        serde_json::json!(1),
        "task no longer exists",
        categories::SCHEDULING,
    )
    .origin(LossOrigin::User);
    let doc = ir_sidecar(&source_checksum(&wf).unwrap(), vec![ghost]);
    std::fs::write(
        sidecar_path(&src),
        serde_json::to_string_pretty(&doc).unwrap(),
    )
    .unwrap();

    let dst = dir.path().join("out.json");
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.losses.by_status.get("lost_again"), Some(&1));
}

#[test]
fn corrupt_sidecar_is_non_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_ir(dir.path(), "wf.json", &gpu_workflow());
    std::fs::write(sidecar_path(&src), "{definitely not json").unwrap();
    let dst = dir.path().join("out.json");
    // The conversion proceeds; the unreadable side-car is only a warning.
    let report = convert(&src, &dst, &headless_options()).unwrap();
    assert_eq!(report.exit_code(), 0);
}
