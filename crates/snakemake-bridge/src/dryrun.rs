// SPDX-License-Identifier: MIT OR Apache-2.0
//! Optional dry-run enrichment via the native tool.
//!
//! The static parse is authoritative; the dry run only refines it with
//! concrete job counts resolved from wildcards. Any failure — missing
//! binary, non-zero exit, timeout — downgrades to a warning and the
//! import proceeds unenriched.

use regex::Regex;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use wf2wf_core::Workflow;

/// Settings for dry-run enrichment.
#[derive(Debug, Clone)]
pub struct DryRunOptions {
    /// Whether to attempt the dry run at all.
    pub enabled: bool,
    /// Subprocess wall-clock budget in seconds.
    pub timeout_s: u64,
    /// Binary to invoke.
    pub program: String,
}

impl Default for DryRunOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_s: 300,
            program: "snakemake".to_string(),
        }
    }
}

fn job_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:rule|checkpoint)\s+([A-Za-z_]\w*):").expect("static regex"))
}

/// Run `snakemake --dry-run` and fold concrete job counts into task
/// metadata. Never fails the import.
pub fn enrich_with_dry_run(workflow: &mut Workflow, source: &Path, options: &DryRunOptions) {
    let Some(output) = run_bounded(source, options) else {
        return;
    };
    let mut counts: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();
    for line in output.lines() {
        if let Some(caps) = job_line_re().captures(line.trim()) {
            *counts.entry(caps[1].to_string()).or_insert(0) += 1;
        }
    }
    for (rule, count) in counts {
        if let Some(task) = workflow.task_mut(&rule) {
            task.metadata
                .insert("concrete_jobs".into(), serde_json::json!(count));
        }
    }
}

/// Spawn the dry run in a scoped temporary working directory, enforcing
/// the timeout by polling. Returns captured stdout, or `None` on any
/// failure.
fn run_bounded(source: &Path, options: &DryRunOptions) -> Option<String> {
    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            tracing::warn!(target: "snakemake_bridge", "no scratch dir for dry run: {err}");
            return None;
        }
    };

    let spawned = Command::new(&options.program)
        .arg("--snakefile")
        .arg(source)
        .arg("--dry-run")
        .arg("--quiet")
        .current_dir(scratch.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(
                target: "snakemake_bridge",
                "dry-run enrichment unavailable ({}): {err}",
                options.program
            );
            return None;
        }
    };

    let deadline = Instant::now() + Duration::from_secs(options.timeout_s);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    tracing::warn!(
                        target: "snakemake_bridge",
                        "dry run exited with {status}; skipping enrichment"
                    );
                    return None;
                }
                break;
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(
                        target: "snakemake_bridge",
                        "dry run exceeded {}s; skipping enrichment",
                        options.timeout_s
                    );
                    return None;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                tracing::warn!(target: "snakemake_bridge", "dry run poll failed: {err}");
                return None;
            }
        }
    }

    let mut stdout = String::new();
    use std::io::Read;
    if let Some(mut pipe) = child.stdout.take()
        && pipe.read_to_string(&mut stdout).is_err()
    {
        return None;
    }
    // `scratch` drops here, releasing the temporary directory on every
    // exit path above as well.
    Some(stdout)
}
