// SPDX-License-Identifier: MIT OR Apache-2.0
//! Static parser for Snakemake rule files.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use wf2wf_core::{
    Edge, Environment, ParameterSpec, ParseError, SourceParser, Task, TaskBuilder, Workflow,
    native_environment,
};
use wf2wf_format::WorkflowFormat;

use crate::dryrun::{DryRunOptions, enrich_with_dry_run};

/// Directives the static parser understands inside a rule block.
const RULE_DIRECTIVES: &[&str] = &[
    "input",
    "output",
    "log",
    "benchmark",
    "threads",
    "resources",
    "params",
    "priority",
    "retries",
    "container",
    "singularity",
    "conda",
    "envmodules",
    "shell",
    "script",
    "run",
];

fn rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(rule|checkpoint)\s+([A-Za-z_]\w*)\s*:").expect("static regex"))
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s+)([a-z_]+)\s*:\s*(.*)$").expect("static regex"))
}

fn rules_output_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^rules\.([A-Za-z_]\w*)\.output$").expect("static regex"))
}

/// Importer for `.smk` files and `Snakefile`s.
#[derive(Debug, Default)]
pub struct SnakemakeImporter {
    /// Dry-run enrichment settings; disabled by default.
    pub dry_run: DryRunOptions,
}

impl SnakemakeImporter {
    /// Importer with static parsing only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Importer that additionally runs the native tool's dry-run mode.
    #[must_use]
    pub fn with_dry_run(dry_run: DryRunOptions) -> Self {
        Self { dry_run }
    }
}

impl SourceParser for SnakemakeImporter {
    fn source_format(&self) -> WorkflowFormat {
        WorkflowFormat::Snakemake
    }

    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow")
            .to_string();
        let mut workflow = Workflow::new(name, "1.0");

        let mut visited = BTreeSet::new();
        let mut rules = Vec::new();
        collect_rules(path, &mut visited, &mut rules)?;

        let env = native_environment(WorkflowFormat::Snakemake);
        let mut explicit_edges = Vec::new();
        for rule in &rules {
            let task = rule.to_task(env, &mut explicit_edges);
            workflow.add_task(task)?;
        }
        wire_edges(&mut workflow, explicit_edges)?;

        if self.dry_run.enabled {
            // Enrichment is optional; its absence must not fail the import.
            enrich_with_dry_run(&mut workflow, path, &self.dry_run);
        }
        Ok(workflow)
    }
}

// ── Rule collection ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RawRule {
    name: String,
    directives: Vec<(String, String)>,
}

/// Parse `path` and every `include:`d file, appending rules in order.
fn collect_rules(
    path: &Path,
    visited: &mut BTreeSet<PathBuf>,
    rules: &mut Vec<RawRule>,
) -> Result<(), ParseError> {
    let canonical = path.to_path_buf();
    if !visited.insert(canonical) {
        return Ok(());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("include:") {
            let include = unquote(rest.trim());
            let target = path
                .parent()
                .map_or_else(|| PathBuf::from(&include), |dir| dir.join(&include));
            collect_rules(&target, visited, rules)?;
            i += 1;
            continue;
        }
        if let Some(caps) = rule_re().captures(line) {
            let mut rule = RawRule {
                name: caps[2].to_string(),
                directives: Vec::new(),
            };
            i += 1;
            i = parse_rule_body(&lines, i, &mut rule)?;
            rules.push(rule);
            continue;
        }
        // Top-level python statements and other workflow directives are
        // outside the static subset; skip the line.
        i += 1;
    }
    Ok(())
}

/// Parse directive lines until the block dedents. Returns the index of
/// the first line after the rule body.
fn parse_rule_body(lines: &[&str], mut i: usize, rule: &mut RawRule) -> Result<usize, ParseError> {
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }
        // A non-indented line ends the rule body.
        if !line.starts_with(' ') && !line.starts_with('\t') {
            return Ok(i);
        }
        let Some(caps) = directive_re().captures(line) else {
            return Err(ParseError::at_line(
                i + 1,
                format!("expected a rule directive, found `{trimmed}`"),
            ));
        };
        let indent = caps[1].len();
        let keyword = caps[2].to_string();
        if !RULE_DIRECTIVES.contains(&keyword.as_str()) {
            return Err(ParseError::at_line(
                i + 1,
                format!("unknown rule directive `{keyword}`"),
            ));
        }
        let mut value = caps[3].trim().to_string();
        i += 1;
        // Continuation lines are indented deeper than the directive.
        while i < lines.len() {
            let next = lines[i];
            let next_trimmed = next.trim();
            if next_trimmed.is_empty() || next_trimmed.starts_with('#') {
                i += 1;
                continue;
            }
            let next_indent = next.len() - next.trim_start().len();
            if next_indent <= indent {
                break;
            }
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(next_trimmed);
            i += 1;
        }
        rule.directives.push((keyword, value));
    }
    Ok(i)
}

// ── Rule → Task ─────────────────────────────────────────────────────────

impl RawRule {
    fn to_task(&self, env: Environment, explicit_edges: &mut Vec<Edge>) -> Task {
        let mut builder = TaskBuilder::new(&self.name).on(env);
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        for (keyword, value) in &self.directives {
            match keyword.as_str() {
                "input" => {
                    for item in split_items(value) {
                        if let Some(caps) = rules_output_re().captures(&item) {
                            explicit_edges.push(Edge::new(&caps[1], &self.name));
                        } else {
                            inputs.push(ParameterSpec::file(item));
                        }
                    }
                }
                "output" => {
                    for item in split_items(value) {
                        outputs.push(ParameterSpec::file(item));
                    }
                }
                "threads" => {
                    if let Ok(threads) = value.parse::<i64>() {
                        // Snakemake threads double as the core request.
                        builder = builder.threads(threads).cpu(threads);
                    }
                }
                "resources" => {
                    for (key, val) in split_assignments(value) {
                        builder = apply_resource(builder, &key, &val);
                    }
                }
                "priority" => {
                    if let Ok(priority) = value.parse::<i64>() {
                        builder = builder.priority(priority);
                    }
                }
                "retries" => {
                    if let Ok(retries) = value.parse::<i64>() {
                        builder = builder.retry_count(retries);
                    }
                }
                "container" | "singularity" => {
                    builder = builder.container(unquote(value));
                }
                "conda" => {
                    builder = builder.conda(unquote(value));
                }
                "shell" => {
                    builder = builder.command(unquote(value));
                }
                "script" => {
                    builder = builder.script(unquote(value));
                }
                "run" => {
                    builder = builder.script(value.clone());
                }
                _ => {}
            }
        }

        let mut task = builder.build();
        task.inputs = inputs;
        task.outputs = outputs;
        for (keyword, value) in &self.directives {
            match keyword.as_str() {
                "log" => {
                    task.metadata
                        .insert("log".into(), serde_json::json!(unquote(value)));
                }
                "benchmark" => {
                    task.metadata
                        .insert("benchmark".into(), serde_json::json!(unquote(value)));
                }
                "params" => {
                    let params: serde_json::Map<String, serde_json::Value> =
                        split_assignments(value)
                            .into_iter()
                            .map(|(k, v)| (k, serde_json::json!(unquote(&v))))
                            .collect();
                    task.metadata
                        .insert("params".into(), serde_json::Value::Object(params));
                }
                "envmodules" => {
                    let modules: Vec<String> = split_items(value);
                    task.modules.set_for(env, modules);
                }
                _ => {}
            }
        }
        task
    }
}

fn apply_resource(builder: TaskBuilder, key: &str, value: &str) -> TaskBuilder {
    let Ok(number) = value.parse::<i64>() else {
        return builder;
    };
    match key {
        "mem_mb" => builder.mem_mb(number),
        "disk_mb" => builder.disk_mb(number),
        "gpu" | "nvidia_gpu" => builder.gpu(number),
        "gpu_mem_mb" => builder.gpu_mem_mb(number),
        // Threads occasionally appear inside resources; same semantics
        // as the directive.
        "threads" => builder.threads(number).cpu(number),
        // Snakemake's runtime resource is in minutes.
        "runtime" => builder.time_s(number * 60),
        _ => builder,
    }
}

/// Wire edges: explicit `rules.X.output` references plus output→input
/// filename matching across rules.
fn wire_edges(workflow: &mut Workflow, explicit: Vec<Edge>) -> Result<(), ParseError> {
    for edge in explicit {
        workflow.add_edge(edge)?;
    }
    let mut matches = Vec::new();
    for producer in workflow.tasks() {
        for output in &producer.outputs {
            for consumer in workflow.tasks() {
                if consumer.id != producer.id
                    && consumer.inputs.iter().any(|i| i.id == output.id)
                {
                    matches.push(Edge::new(&producer.id, &consumer.id));
                }
            }
        }
    }
    for edge in matches {
        workflow.add_edge(edge)?;
    }
    Ok(())
}

// ── Lexical helpers ─────────────────────────────────────────────────────

/// Strip one layer of matching quotes.
fn unquote(s: &str) -> String {
    let s = s.trim().trim_end_matches(',');
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Split a comma-separated item list, dropping `name=` prefixes and
/// quotes. Commas inside quotes are respected.
fn split_items(value: &str) -> Vec<String> {
    split_top_level(value)
        .into_iter()
        .filter_map(|item| {
            let item = item.trim();
            if item.is_empty() {
                return None;
            }
            // Named item: `ref="genome.fa"`.
            let unnamed = match item.split_once('=') {
                Some((name, rest)) if is_identifier(name.trim()) => rest,
                _ => item,
            };
            let cleaned = unquote(unnamed);
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect()
}

/// Split `k=v, k2=v2` pairs.
fn split_assignments(value: &str) -> Vec<(String, String)> {
    split_top_level(value)
        .into_iter()
        .filter_map(|item| {
            let (k, v) = item.split_once('=')?;
            let k = k.trim().to_string();
            is_identifier(&k).then(|| (k, v.trim().to_string()))
        })
        .collect()
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split on commas outside quotes.
fn split_top_level(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in value.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                ',' => {
                    items.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        items.push(current);
    }
    items
}
