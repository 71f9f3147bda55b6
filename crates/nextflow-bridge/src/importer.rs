// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nextflow DSL2 importer.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use wf2wf_core::{
    Edge, Environment, ParameterSpec, ParseError, SourceParser, Task, Workflow,
    native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Importer for `.nf` files.
#[derive(Debug, Default)]
pub struct NextflowImporter {
    _priv: (),
}

impl NextflowImporter {
    /// Create an importer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn process_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^process\s+([A-Za-z_]\w*)\s*\{").expect("static regex"))
}

fn call_out_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_]\w*)\.out").expect("static regex"))
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_]\w*)\s*\(").expect("static regex"))
}

impl SourceParser for NextflowImporter {
    fn source_format(&self) -> WorkflowFormat {
        WorkflowFormat::Nextflow
    }

    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow")
            .to_string();
        let mut workflow = Workflow::new(name, "1.0");
        let env = native_environment(WorkflowFormat::Nextflow);

        let lines: Vec<&str> = text.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            if let Some(caps) = process_re().captures(trimmed) {
                let (task, next) = parse_process(&lines, i, &caps[1], env)?;
                workflow.add_task(task)?;
                i = next;
                continue;
            }
            if trimmed.starts_with("workflow") && trimmed.contains('{') {
                let (edges, next) = parse_workflow_block(&lines, i, &workflow)?;
                for edge in edges {
                    workflow.add_edge(edge)?;
                }
                i = next;
                continue;
            }
            i += 1;
        }
        Ok(workflow)
    }
}

/// Sections inside a process body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Directives,
    Input,
    Output,
    Script,
}

fn parse_process(
    lines: &[&str],
    start: usize,
    name: &str,
    env: Environment,
) -> Result<(Task, usize), ParseError> {
    let mut task = Task::new(name);
    let mut section = Section::Directives;
    let mut script_lines: Vec<String> = Vec::new();
    let mut in_heredoc = false;
    let mut depth = 1_usize;
    let mut i = start + 1;

    while i < lines.len() {
        let raw = lines[i];
        let trimmed = raw.trim();

        if in_heredoc {
            if trimmed == "\"\"\"" || trimmed == "'''" {
                in_heredoc = false;
            } else {
                script_lines.push(trimmed.to_string());
            }
            i += 1;
            continue;
        }

        depth += trimmed.matches('{').count();
        depth = depth.saturating_sub(trimmed.matches('}').count());
        if depth == 0 {
            if !script_lines.is_empty() {
                task.script.set_for(env, script_lines.join("\n"));
            }
            return Ok((task, i + 1));
        }

        if trimmed.is_empty() || trimmed.starts_with("//") {
            i += 1;
            continue;
        }

        match trimmed {
            "input:" => {
                section = Section::Input;
                i += 1;
                continue;
            }
            "output:" => {
                section = Section::Output;
                i += 1;
                continue;
            }
            "script:" | "shell:" | "exec:" => {
                section = Section::Script;
                i += 1;
                continue;
            }
            "\"\"\"" | "'''" => {
                in_heredoc = true;
                section = Section::Script;
                i += 1;
                continue;
            }
            _ => {}
        }

        match section {
            Section::Directives => apply_directive(&mut task, trimmed, env),
            Section::Input => {
                if let Some(param) = parse_io_line(trimmed) {
                    task.inputs.push(param);
                }
            }
            Section::Output => {
                if let Some(param) = parse_io_line(trimmed) {
                    task.outputs.push(param);
                }
            }
            Section::Script => script_lines.push(trimmed.to_string()),
        }
        i += 1;
    }
    Err(ParseError::at_line(
        start + 1,
        format!("unterminated process `{name}`"),
    ))
}

/// One `cpus 4`-style directive line.
fn apply_directive(task: &mut Task, line: &str, env: Environment) {
    let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
        return;
    };
    let value = rest.trim();
    match keyword {
        "cpus" => {
            if let Ok(cpus) = value.parse::<i64>() {
                task.cpu.set_for(env, cpus);
            }
        }
        "memory" => {
            if let Some(mb) = parse_size_mb(value) {
                task.mem_mb.set_for(env, mb);
            }
        }
        "disk" => {
            if let Some(mb) = parse_size_mb(value) {
                task.disk_mb.set_for(env, mb);
            }
        }
        "time" => {
            if let Some(seconds) = parse_duration_s(value) {
                task.time_s.set_for(env, seconds);
            }
        }
        "accelerator" => {
            if let Ok(gpus) = unquote(value).parse::<i64>() {
                task.gpu.set_for(env, gpus);
            }
        }
        "container" => task.container.set_for(env, unquote(value)),
        "conda" => task.conda.set_for(env, unquote(value)),
        "errorStrategy" => {
            let strategy = unquote(value);
            if strategy == "retry" {
                task.retry_policy.set_for(env, "retry".to_string());
            }
            task.metadata
                .insert("error_strategy".into(), serde_json::json!(strategy));
        }
        "maxRetries" => {
            if let Ok(retries) = value.parse::<i64>() {
                task.retry_count.set_for(env, retries);
            }
        }
        "publishDir" => {
            task.metadata
                .insert("publish_dir".into(), serde_json::json!(unquote(value)));
        }
        "tag" | "label" => {
            task.metadata
                .insert(keyword.to_string(), serde_json::json!(unquote(value)));
        }
        _ => {}
    }
}

/// `path "x.bam"` / `val sample` input and output declarations.
fn parse_io_line(line: &str) -> Option<ParameterSpec> {
    let (kind, rest) = line.split_once(char::is_whitespace)?;
    let item = unquote(rest.trim().trim_end_matches(','));
    match kind {
        "path" | "file" => Some(ParameterSpec::file(item)),
        "val" => Some(ParameterSpec::string(item)),
        "tuple" => {
            // Keep the first path component of the tuple.
            let inner = rest
                .split(',')
                .find_map(|part| part.trim().strip_prefix("path("))
                .map(|p| unquote(p.trim_end_matches(')')));
            inner.map(ParameterSpec::file)
        }
        _ => None,
    }
}

/// Derive edges from the workflow block's channel wiring.
fn parse_workflow_block(
    lines: &[&str],
    start: usize,
    workflow: &Workflow,
) -> Result<(Vec<Edge>, usize), ParseError> {
    let mut edges = Vec::new();
    let mut depth = 1_usize;
    let mut i = start + 1;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        depth += trimmed.matches('{').count();
        depth = depth.saturating_sub(trimmed.matches('}').count());
        if depth == 0 {
            return Ok((edges, i + 1));
        }
        if let Some(caps) = call_re().captures(trimmed) {
            let callee = caps[1].to_string();
            if workflow.has_task(&callee) {
                for parent in call_out_re().captures_iter(trimmed) {
                    let parent_name = parent[1].to_string();
                    if workflow.has_task(&parent_name) && parent_name != callee {
                        edges.push(Edge::new(parent_name, callee.clone()));
                    }
                }
            }
        }
        i += 1;
    }
    Err(ParseError::at_line(start + 1, "unterminated workflow block"))
}

/// `'8 GB'` / `8.GB` → megabytes.
fn parse_size_mb(value: &str) -> Option<i64> {
    let cleaned = unquote(value).replace('.', " ");
    let mut parts = cleaned.split_whitespace();
    let number: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next().unwrap_or("MB").to_ascii_uppercase();
    match unit.as_str() {
        "MB" | "M" => Some(number),
        "GB" | "G" => Some(number * 1024),
        "TB" | "T" => Some(number * 1024 * 1024),
        "KB" | "K" => Some(number / 1024),
        _ => None,
    }
}

/// `'2h'` / `'30m'` / `'45s'` → seconds.
fn parse_duration_s(value: &str) -> Option<i64> {
    let cleaned = unquote(value).replace('.', " ").replace(' ', "");
    let digits_end = cleaned.find(|c: char| !c.is_ascii_digit())?;
    let number: i64 = cleaned[..digits_end].parse().ok()?;
    match &cleaned[digits_end..] {
        "s" | "sec" => Some(number),
        "m" | "min" => Some(number * 60),
        "h" | "hour" | "hours" => Some(number * 3600),
        "d" | "day" | "days" => Some(number * 86_400),
        _ => None,
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}
