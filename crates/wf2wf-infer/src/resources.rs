// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resource inference from command patterns.

use regex::Regex;
use std::sync::OnceLock;
use wf2wf_core::{Environment, EnvironmentSpecificValue, Task};
use wf2wf_format::WorkflowFormat;

/// One inference rule: commands matching `pattern` imply the paired
/// resource values. The first matching rule wins.
pub struct ResourceRule {
    /// Regex matched against the task command.
    pub pattern: &'static str,
    /// CPU cores implied by the match.
    pub cpu: i64,
    /// Memory in MB implied by the match.
    pub mem_mb: i64,
}

/// The command-pattern rule table, first match wins.
pub const RESOURCE_RULES: &[ResourceRule] = &[
    ResourceRule {
        pattern: r"\b(bwa|bowtie2?|star|hisat2)\b",
        cpu: 4,
        mem_mb: 8192,
    },
    ResourceRule {
        pattern: r"\bsamtools\s+sort\b",
        cpu: 2,
        mem_mb: 4096,
    },
    ResourceRule {
        pattern: r"\b(gatk|picard)\b",
        cpu: 4,
        mem_mb: 16_384,
    },
    ResourceRule {
        pattern: r"\b(blastn|blastp|blastx|diamond)\b",
        cpu: 8,
        mem_mb: 8192,
    },
    ResourceRule {
        pattern: r"\b(fastqc|multiqc|cutadapt|trimmomatic)\b",
        cpu: 1,
        mem_mb: 2048,
    },
];

/// Conservative floor applied when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimumProfile {
    /// CPU cores.
    pub cpu: i64,
    /// Memory in MB.
    pub mem_mb: i64,
    /// Disk in MB, when the target schedules disk at all.
    pub disk_mb: Option<i64>,
}

/// The minimum resource profile of a target format.
#[must_use]
pub fn minimum_profile(target: WorkflowFormat) -> MinimumProfile {
    match target {
        // DAGMan submit descriptions schedule disk explicitly.
        WorkflowFormat::Dagman => MinimumProfile {
            cpu: 1,
            mem_mb: 1024,
            disk_mb: Some(1024),
        },
        _ => MinimumProfile {
            cpu: 1,
            mem_mb: 1024,
            disk_mb: None,
        },
    }
}

fn compiled_rules() -> &'static [(Regex, &'static ResourceRule)] {
    static RULES: OnceLock<Vec<(Regex, &'static ResourceRule)>> = OnceLock::new();
    RULES.get_or_init(|| {
        RESOURCE_RULES
            .iter()
            .map(|rule| (Regex::new(rule.pattern).expect("static regex"), rule))
            .collect()
    })
}

/// Find the first rule matching `command`.
#[must_use]
pub fn match_command(command: &str) -> Option<&'static ResourceRule> {
    compiled_rules()
        .iter()
        .find(|(re, _)| re.is_match(command))
        .map(|(_, rule)| *rule)
}

/// Outcome of resource inference on a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceInference {
    /// Fields filled from a matched rule.
    pub from_rule: usize,
    /// Fields filled from the minimum profile (no rule matched).
    pub from_minimum: usize,
}

/// Fill resources on one task.
///
/// A field counts as present when it is applicable to the detected
/// `source_env` or already carries `target_env`; present fields are never
/// touched (the environment adapter retargets them instead). Matched
/// rules supply missing values; absent a match the target's minimum
/// profile applies. Inferred values bind to `target_env` only.
pub fn infer_task_resources(
    task: &mut Task,
    source_env: Environment,
    target_env: Environment,
    target: WorkflowFormat,
) -> ResourceInference {
    let mut outcome = ResourceInference::default();
    let rule = task
        .effective_command(source_env)
        .and_then(|cmd| match_command(cmd));
    let minimum = minimum_profile(target);

    let missing = |field: &EnvironmentSpecificValue<i64>| {
        field.get_with_default(source_env).is_none() && field.get_with_default(target_env).is_none()
    };

    if missing(&task.cpu) {
        match rule {
            Some(r) => {
                task.cpu.set_for(target_env, r.cpu);
                outcome.from_rule += 1;
            }
            None => {
                task.cpu.set_for(target_env, minimum.cpu);
                outcome.from_minimum += 1;
            }
        }
    }
    if missing(&task.mem_mb) {
        match rule {
            Some(r) => {
                task.mem_mb.set_for(target_env, r.mem_mb);
                outcome.from_rule += 1;
            }
            None => {
                task.mem_mb.set_for(target_env, minimum.mem_mb);
                outcome.from_minimum += 1;
            }
        }
    }
    if let Some(disk) = minimum.disk_mb
        && missing(&task.disk_mb)
    {
        task.disk_mb.set_for(target_env, disk);
        outcome.from_minimum += 1;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf2wf_core::TaskBuilder;

    #[test]
    fn aligner_rule_matches() {
        let rule = match_command("bwa mem -t 4 ref.fa r.fq > r.bam").unwrap();
        assert_eq!(rule.cpu, 4);
        assert_eq!(rule.mem_mb, 8192);
        assert!(match_command("bowtie2 -x idx -U r.fq").is_some());
        assert!(match_command("STAR --runMode alignReads").is_none()); // case-sensitive
        assert!(match_command("star --runMode alignReads").is_some());
    }

    #[test]
    fn samtools_sort_rule() {
        let rule = match_command("samtools sort -o out.bam in.bam").unwrap();
        assert_eq!(rule.mem_mb, 4096);
        // Plain samtools view matches nothing.
        assert!(match_command("samtools view -b in.sam").is_none());
    }

    #[test]
    fn first_match_wins() {
        // Command mentions both an aligner and samtools sort; the aligner
        // rule is listed first.
        let rule = match_command("bwa mem r.fq | samtools sort -o r.bam").unwrap();
        assert_eq!(rule.mem_mb, 8192);
    }

    #[test]
    fn fills_missing_fields_only() {
        let mut task = TaskBuilder::new("align")
            .on(Environment::SharedFilesystem)
            .command("bwa mem r.fq > r.bam")
            .cpu(16)
            .build();
        let outcome = infer_task_resources(
            &mut task,
            Environment::SharedFilesystem,
            Environment::SharedFilesystem,
            WorkflowFormat::Cwl,
        );
        // cpu was present; only memory inferred.
        assert_eq!(outcome.from_rule, 1);
        assert_eq!(task.cpu.get_for(Environment::SharedFilesystem), Some(&16));
        assert_eq!(
            task.mem_mb.get_for(Environment::SharedFilesystem),
            Some(&8192)
        );
    }

    #[test]
    fn source_value_pre_empts_inference_for_other_targets() {
        // Memory exists for the detected environment; the adapter, not the
        // inference engine, is responsible for retargeting it.
        let mut task = TaskBuilder::new("align")
            .on(Environment::SharedFilesystem)
            .command("bwa mem r.fq")
            .mem_mb(10_240)
            .cpu(2)
            .build();
        let outcome = infer_task_resources(
            &mut task,
            Environment::SharedFilesystem,
            Environment::DistributedComputing,
            WorkflowFormat::Dagman,
        );
        assert_eq!(outcome.from_rule, 0);
        assert_eq!(task.mem_mb.get_for(Environment::DistributedComputing), None);
        // Disk was missing everywhere; the DAGMan minimum applies.
        assert_eq!(
            task.disk_mb.get_for(Environment::DistributedComputing),
            Some(&1024)
        );
    }

    #[test]
    fn minimum_profile_when_no_match() {
        let mut task = TaskBuilder::new("t").command("echo done").build();
        let outcome = infer_task_resources(
            &mut task,
            Environment::Local,
            Environment::Local,
            WorkflowFormat::Cwl,
        );
        assert_eq!(outcome.from_minimum, 2);
        assert_eq!(task.cpu.get_for(Environment::Local), Some(&1));
        assert_eq!(task.mem_mb.get_for(Environment::Local), Some(&1024));
        assert!(task.disk_mb.is_unset());
    }

    #[test]
    fn dagman_minimum_includes_disk() {
        let mut task = TaskBuilder::new("t").command("echo done").build();
        infer_task_resources(
            &mut task,
            Environment::DistributedComputing,
            Environment::DistributedComputing,
            WorkflowFormat::Dagman,
        );
        assert_eq!(
            task.disk_mb.get_for(Environment::DistributedComputing),
            Some(&1024)
        );
    }

    #[test]
    fn inference_is_idempotent() {
        let mut task = TaskBuilder::new("t").command("bwa mem r.fq").build();
        infer_task_resources(
            &mut task,
            Environment::SharedFilesystem,
            Environment::Local,
            WorkflowFormat::Cwl,
        );
        let snapshot = task.clone();
        infer_task_resources(
            &mut task,
            Environment::SharedFilesystem,
            Environment::Local,
            WorkflowFormat::Cwl,
        );
        assert_eq!(task, snapshot);
    }
}
