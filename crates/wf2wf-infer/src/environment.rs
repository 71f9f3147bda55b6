// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conda ↔ container conversion.

use wf2wf_core::{Environment, Task, sha256_hex};
use wf2wf_format::WorkflowFormat;

/// Prefix of container references synthesised from conda specs.
pub const SYNTHESISED_PREFIX: &str = "docker://wf2wf/";

/// Whether the target format idiomatically requires container references.
#[must_use]
pub fn target_prefers_container(target: WorkflowFormat) -> bool {
    matches!(
        target,
        WorkflowFormat::Cwl | WorkflowFormat::Wdl | WorkflowFormat::Nextflow
    )
}

/// Whether the target format expresses software environments as conda
/// specs rather than containers.
#[must_use]
pub fn target_prefers_conda(target: WorkflowFormat) -> bool {
    matches!(target, WorkflowFormat::Snakemake)
}

/// Deterministic image tag for a conda spec.
#[must_use]
pub fn derive_container(conda_spec: &str) -> String {
    let digest = sha256_hex(conda_spec.as_bytes());
    format!("{SYNTHESISED_PREFIX}{}", &digest[..12])
}

/// Deterministic conda environment name for a synthesised container.
///
/// Returns `None` for container references that did not come from a conda
/// derivation; real images cannot be down-converted mechanically.
#[must_use]
pub fn derive_conda(container: &str) -> Option<String> {
    container
        .strip_prefix(SYNTHESISED_PREFIX)
        .map(|hash| format!("wf2wf-{hash}"))
}

/// Fill the software-environment field the target format needs.
///
/// Source values are read with a `source_env` lookup; synthesised values
/// bind to `target_env` only. Returns `true` when a value was
/// synthesised. The derivation is recorded in the task metadata so
/// exporters and audits can see it was not user-authored.
pub fn infer_task_environment(
    task: &mut Task,
    source_env: Environment,
    target_env: Environment,
    target: WorkflowFormat,
) -> bool {
    let container_missing = task.container.get_with_default(source_env).is_none()
        && task.container.get_with_default(target_env).is_none();
    let conda_missing = task.conda.get_with_default(source_env).is_none()
        && task.conda.get_with_default(target_env).is_none();

    if target_prefers_container(target)
        && container_missing
        && let Some(conda) = task
            .conda
            .get_with_default(source_env)
            .or_else(|| task.conda.get_with_default(target_env))
            .cloned()
    {
        let image = derive_container(&conda);
        task.container.set_for(target_env, image.clone());
        task.metadata.insert(
            "derived_container".into(),
            serde_json::json!({"from_conda": conda, "image": image}),
        );
        tracing::info!(target: "wf2wf_infer", task = %task.id, %image, "synthesised container from conda spec");
        return true;
    }
    if target_prefers_conda(target)
        && conda_missing
        && let Some(conda) = task
            .container
            .get_with_default(source_env)
            .or_else(|| task.container.get_with_default(target_env))
            .and_then(|c| derive_conda(c))
    {
        task.conda.set_for(target_env, conda.clone());
        task.metadata.insert(
            "derived_conda".into(),
            serde_json::json!({"environment": conda}),
        );
        return true;
    }
    false
}
