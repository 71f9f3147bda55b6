// SPDX-License-Identifier: MIT OR Apache-2.0
//! Submit-description parsing shared by the external-file and inline
//! forms.

use std::collections::BTreeMap;
use wf2wf_core::{Environment, ParameterSpec, Task, TransferMode};

/// A parsed submit description: ordered `key = value` pairs with ClassAd
/// `+Attributes` kept verbatim.
#[derive(Debug, Clone, Default)]
pub struct SubmitDescription {
    pairs: Vec<(String, String)>,
}

impl SubmitDescription {
    /// Parse submit-description text (one `key = value` per line, `queue`
    /// and comments ignored).
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut pairs = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.eq_ignore_ascii_case("queue") || trimmed.to_ascii_lowercase().starts_with("queue ") {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                pairs.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        Self { pairs }
    }

    /// Case-insensitive lookup (ClassAd attribute names are not
    /// case-sensitive; `+` attributes are matched verbatim).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| {
                if key.starts_with('+') {
                    k == key
                } else {
                    k.eq_ignore_ascii_case(key)
                }
            })
            .map(|(_, v)| v.as_str())
    }

    /// All `+Attribute` pairs in order.
    pub fn classads(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .filter(|(k, _)| k.starts_with('+'))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fold this description into a task, binding values to `env`.
    pub fn apply_to(&self, task: &mut Task, env: Environment) {
        if let Some(exe) = self.get("executable") {
            let command = match self.get("arguments") {
                Some(args) => format!("{exe} {}", unquote(args)),
                None => exe.to_string(),
            };
            task.command.set_for(env, command);
        }
        let universe = self.get("universe").map(str::to_ascii_lowercase);
        if let Some(image) = self.get("docker_image").or_else(|| self.get("container_image")) {
            let reference = if image.contains("://") {
                image.to_string()
            } else {
                format!("docker://{image}")
            };
            task.container.set_for(env, reference);
        } else if let Some(u) = &universe
            && (u == "docker" || u == "container")
        {
            tracing::warn!(target: "dagman_bridge", task = %task.id, "container universe without an image attribute");
        }

        if let Some(cpus) = self.get("request_cpus").and_then(|v| v.parse().ok()) {
            task.cpu.set_for(env, cpus);
        }
        if let Some(mem) = self.get("request_memory").and_then(parse_megabytes) {
            task.mem_mb.set_for(env, mem);
        }
        if let Some(disk) = self.get("request_disk").and_then(parse_megabytes) {
            task.disk_mb.set_for(env, disk);
        }
        if let Some(gpus) = self.get("request_gpus").and_then(|v| v.parse().ok()) {
            task.gpu.set_for(env, gpus);
        }
        if let Some(gpu_mem) = self.get("gpus_minimum_memory").and_then(parse_megabytes) {
            task.gpu_mem_mb.set_for(env, gpu_mem);
        }
        if let Some(capability) = self.get("gpus_minimum_capability") {
            task.gpu_capability.set_for(env, capability.to_string());
        }

        if let Some(files) = self.get("transfer_input_files") {
            for file in split_file_list(files) {
                let mut p = ParameterSpec::file(file);
                p.transfer_mode = TransferMode::Always;
                task.inputs.push(p);
            }
        }
        if let Some(files) = self.get("transfer_output_files") {
            for file in split_file_list(files) {
                let mut p = ParameterSpec::file(file);
                p.transfer_mode = TransferMode::Always;
                task.outputs.push(p);
            }
        }

        if let Some(environment) = self.get("environment") {
            let vars = parse_environment(environment);
            if !vars.is_empty() {
                task.env_vars.set_for(env, vars);
            }
        }

        for (key, value) in self.classads() {
            task.metadata.insert(
                format!("classad:{key}"),
                serde_json::json!(unquote(value)),
            );
        }
    }
}

/// Parse `8000`, `8000MB`, `8 GB` and friends into megabytes.
#[must_use]
pub fn parse_megabytes(value: &str) -> Option<i64> {
    let cleaned = value.trim().trim_matches('"');
    let digits_end = cleaned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(cleaned.len());
    let number: i64 = cleaned[..digits_end].parse().ok()?;
    let unit = cleaned[digits_end..].trim().to_ascii_uppercase();
    match unit.as_str() {
        "" | "MB" | "M" => Some(number),
        "GB" | "G" => Some(number * 1024),
        "KB" | "K" => Some(number / 1024),
        "TB" | "T" => Some(number * 1024 * 1024),
        _ => None,
    }
}

fn split_file_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse the HTCondor `environment = "A=1 B=2"` form.
fn parse_environment(value: &str) -> BTreeMap<String, String> {
    unquote(value)
        .split_whitespace()
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.to_string(), v.to_string()))
        })
        .collect()
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMIT: &str = r#"
universe = docker
docker_image = bwa:latest
executable = scripts/align.sh
arguments = "r.fq r.bam"
request_cpus = 4
request_memory = 8000MB
request_disk = 2GB
request_gpus = 1
gpus_minimum_memory = 4096
gpus_minimum_capability = 7.5
transfer_input_files = r.fq, genome.fa
transfer_output_files = r.bam
environment = "THREADS=4 TMPDIR=/scratch"
+ProjectName = "genomics"
queue
"#;

    #[test]
    fn parses_and_applies_all_fields() {
        let env = Environment::DistributedComputing;
        let desc = SubmitDescription::parse(SUBMIT);
        let mut task = Task::new("align");
        desc.apply_to(&mut task, env);

        assert_eq!(
            task.command.get_for(env).map(String::as_str),
            Some("scripts/align.sh r.fq r.bam")
        );
        assert_eq!(
            task.container.get_for(env).map(String::as_str),
            Some("docker://bwa:latest")
        );
        assert_eq!(task.cpu.get_for(env), Some(&4));
        assert_eq!(task.mem_mb.get_for(env), Some(&8000));
        assert_eq!(task.disk_mb.get_for(env), Some(&2048));
        assert_eq!(task.gpu.get_for(env), Some(&1));
        assert_eq!(task.gpu_mem_mb.get_for(env), Some(&4096));
        assert_eq!(
            task.gpu_capability.get_for(env).map(String::as_str),
            Some("7.5")
        );
        assert_eq!(task.inputs.len(), 2);
        assert_eq!(task.inputs[0].id, "r.fq");
        assert_eq!(task.inputs[0].transfer_mode, TransferMode::Always);
        assert_eq!(task.outputs[0].id, "r.bam");
        let vars = task.env_vars.get_for(env).unwrap();
        assert_eq!(vars["THREADS"], "4");
        assert_eq!(vars["TMPDIR"], "/scratch");
        assert_eq!(
            task.metadata["classad:+ProjectName"],
            serde_json::json!("genomics")
        );
    }

    #[test]
    fn memory_units() {
        assert_eq!(parse_megabytes("8000"), Some(8000));
        assert_eq!(parse_megabytes("8000MB"), Some(8000));
        assert_eq!(parse_megabytes("8 GB"), Some(8192));
        assert_eq!(parse_megabytes("2T"), Some(2_097_152));
        assert_eq!(parse_megabytes("abc"), None);
    }

    #[test]
    fn lookup_is_case_insensitive_for_plain_keys() {
        let desc = SubmitDescription::parse("Request_Cpus = 2\n+Exact = 1\n");
        assert_eq!(desc.get("request_cpus"), Some("2"));
        assert_eq!(desc.get("+Exact"), Some("1"));
        assert_eq!(desc.get("+exact"), None);
    }
}
