// SPDX-License-Identifier: MIT OR Apache-2.0
//! WDL importer.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use wf2wf_core::{
    Edge, Environment, ParameterSpec, ParameterType, ParseError, ScatterSpec, SourceParser, Task,
    Workflow, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Importer for `.wdl` files.
#[derive(Debug, Default)]
pub struct WdlImporter {
    _priv: (),
}

impl WdlImporter {
    /// Create an importer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn task_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^task\s+([A-Za-z_]\w*)\s*\{").expect("static regex"))
}

fn workflow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^workflow\s+([A-Za-z_]\w*)\s*\{").expect("static regex"))
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^call\s+([A-Za-z_][\w.]*)").expect("static regex"))
}

fn scatter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^scatter\s*\(\s*([A-Za-z_]\w*)\s+in\s+([A-Za-z_][\w.]*)\s*\)").expect("static regex")
    })
}

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Z][\w\[\]?+]*|[a-z]\w*[\[\]?+]*)\s+([A-Za-z_]\w*)\s*(=\s*(.+))?$")
            .expect("static regex")
    })
}

impl SourceParser for WdlImporter {
    fn source_format(&self) -> WorkflowFormat {
        WorkflowFormat::Wdl
    }

    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut workflow = Workflow::new(
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("workflow"),
            "1.0",
        );
        let env = native_environment(WorkflowFormat::Wdl);

        if let Some(version) = text
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("version "))
        {
            workflow
                .metadata
                .insert("wdl_version".into(), serde_json::json!(version["version ".len()..].trim()));
        }

        let lines: Vec<&str> = text.lines().collect();
        let mut i = 0;
        let mut workflow_block: Option<(usize, String)> = None;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            if let Some(caps) = task_re().captures(trimmed) {
                let (task, next) = parse_task(&lines, i, &caps[1], env)?;
                workflow.add_task(task)?;
                i = next;
                continue;
            }
            if let Some(caps) = workflow_re().captures(trimmed) {
                // Calls reference tasks, so the block is replayed after all
                // tasks are collected.
                workflow_block = Some((i, caps[1].to_string()));
                i = skip_block(&lines, i)?;
                continue;
            }
            i += 1;
        }

        if let Some((start, wf_name)) = workflow_block {
            workflow.label = Some(wf_name);
            parse_workflow_block(&lines, start, &mut workflow)?;
        }
        Ok(workflow)
    }
}

/// Index just past a balanced `{ ... }` block opening on line `start`.
fn skip_block(lines: &[&str], start: usize) -> Result<usize, ParseError> {
    let mut depth = 0_i64;
    let mut i = start;
    while i < lines.len() {
        depth += i64::try_from(lines[i].matches('{').count()).unwrap_or(0);
        depth -= i64::try_from(lines[i].matches('}').count()).unwrap_or(0);
        i += 1;
        if depth == 0 {
            return Ok(i);
        }
    }
    Err(ParseError::at_line(start + 1, "unterminated block"))
}

fn parse_task(
    lines: &[&str],
    start: usize,
    name: &str,
    env: Environment,
) -> Result<(Task, usize), ParseError> {
    let mut task = Task::new(name);
    let end = skip_block(lines, start)?;
    let mut i = start + 1;
    while i < end - 1 {
        let trimmed = lines[i].trim();
        match trimmed {
            "input {" => {
                let section_end = skip_block(lines, i)?;
                for line in &lines[i + 1..section_end - 1] {
                    if let Some(param) = parse_declaration(line.trim()) {
                        task.inputs.push(param);
                    }
                }
                i = section_end;
            }
            "output {" => {
                let section_end = skip_block(lines, i)?;
                for line in &lines[i + 1..section_end - 1] {
                    if let Some(param) = parse_declaration(line.trim()) {
                        task.outputs.push(param);
                    }
                }
                i = section_end;
            }
            "runtime {" => {
                let section_end = skip_block(lines, i)?;
                for line in &lines[i + 1..section_end - 1] {
                    apply_runtime(&mut task, line.trim(), env);
                }
                i = section_end;
            }
            _ if trimmed.starts_with("command") => {
                let (body, next) = parse_command(lines, i)?;
                task.command.set_for(env, body);
                i = next;
            }
            _ => i += 1,
        }
    }
    Ok((task, end))
}

/// `command <<< ... >>>` or `command { ... }`.
fn parse_command(lines: &[&str], start: usize) -> Result<(String, usize), ParseError> {
    let opening = lines[start].trim();
    let heredoc = opening.contains("<<<");
    let closer = if heredoc { ">>>" } else { "}" };
    let mut body = Vec::new();
    let mut i = start + 1;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed == closer {
            return Ok((body.join("\n"), i + 1));
        }
        body.push(trimmed.to_string());
        i += 1;
    }
    Err(ParseError::at_line(start + 1, "unterminated command section"))
}

/// `File reads` / `Array[File] samples` / `Int threads = 4`.
fn parse_declaration(line: &str) -> Option<ParameterSpec> {
    let line = line.trim().trim_end_matches(',');
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let caps = declaration_re().captures(line)?;
    let ty = wdl_type(&caps[1]);
    let mut param = ParameterSpec::new(&caps[2], ty);
    if let Some(default) = caps.get(4) {
        param.default = Some(serde_json::json!(default.as_str().trim().trim_matches('"')));
    }
    Some(param)
}

/// Map a WDL type expression to the IR.
fn wdl_type(s: &str) -> ParameterType {
    if let Some(base) = s.strip_suffix('?') {
        return ParameterType::optional(wdl_type(base));
    }
    if let Some(base) = s.strip_suffix('+') {
        // Non-empty-array marker; cardinality is not part of the IR type.
        return wdl_type(base);
    }
    if let Some(inner) = s.strip_prefix("Array[").and_then(|r| r.strip_suffix(']')) {
        return ParameterType::array(wdl_type(inner));
    }
    match s {
        "File" => ParameterType::File,
        "Directory" => ParameterType::Directory,
        "String" => ParameterType::String,
        "Int" => ParameterType::Int,
        "Float" => ParameterType::Float,
        "Boolean" => ParameterType::Boolean,
        _ => ParameterType::String,
    }
}

/// One `cpu: 4` runtime attribute.
fn apply_runtime(task: &mut Task, line: &str, env: Environment) {
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let value = value.trim().trim_matches('"');
    match key.trim() {
        "cpu" => {
            if let Ok(cpu) = value.parse::<i64>() {
                task.cpu.set_for(env, cpu);
            }
        }
        "memory" => {
            if let Some(mb) = parse_memory_mb(value) {
                task.mem_mb.set_for(env, mb);
            }
        }
        "disks" => {
            // `local-disk 20 SSD` style; the number is in GB.
            if let Some(gb) = value.split_whitespace().find_map(|tok| tok.parse::<i64>().ok()) {
                task.disk_mb.set_for(env, gb * 1024);
            }
        }
        "docker" | "container" => {
            let reference = if value.contains("://") {
                value.to_string()
            } else {
                format!("docker://{value}")
            };
            task.container.set_for(env, reference);
        }
        "gpu" => {
            if let Ok(gpus) = value.parse::<i64>() {
                task.gpu.set_for(env, gpus);
            }
        }
        "maxRetries" | "preemptible" => {
            if let Ok(retries) = value.parse::<i64>() {
                task.retry_count.set_for(env, retries);
            }
        }
        _ => {
            task.metadata
                .insert(format!("runtime:{}", key.trim()), serde_json::json!(value));
        }
    }
}

/// `"8 GB"` → megabytes.
fn parse_memory_mb(value: &str) -> Option<i64> {
    let mut parts = value.split_whitespace();
    let number: i64 = parts.next()?.parse().ok()?;
    match parts.next().map(str::to_ascii_uppercase).as_deref() {
        Some("GB") | Some("GIB") => Some(number * 1024),
        Some("MB") | Some("MIB") | None => Some(number),
        Some("TB") | Some("TIB") => Some(number * 1024 * 1024),
        _ => None,
    }
}

/// Replay the workflow block: calls become edge sources, scatter regions
/// attach scatter specs to the tasks they call.
fn parse_workflow_block(
    lines: &[&str],
    start: usize,
    workflow: &mut Workflow,
) -> Result<(), ParseError> {
    let end = skip_block(lines, start)?;
    let mut scatter_stack: Vec<ScatterSpec> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut depth_at_scatter: Vec<i64> = Vec::new();
    let mut depth = 0_i64;

    for line in &lines[start..end] {
        let trimmed = line.trim();
        depth += i64::try_from(trimmed.matches('{').count()).unwrap_or(0);

        if let Some(caps) = scatter_re().captures(trimmed) {
            scatter_stack.push(ScatterSpec::single(&caps[2]));
            depth_at_scatter.push(depth);
            let _ = &caps[1]; // bound variable name; implied by the spec
        }
        if let Some(caps) = call_re().captures(trimmed) {
            let callee = caps[1].split('.').next_back().unwrap_or(&caps[1]).to_string();
            if let Some(spec) = scatter_stack.last()
                && let Some(task) = workflow.task_mut(&callee)
            {
                task.scatter = Some(spec.clone());
            }
            // Explicit control dependencies: `call b after a`.
            let mut tokens = trimmed.split_whitespace().peekable();
            while let Some(token) = tokens.next() {
                if token == "after"
                    && let Some(&parent) = tokens.peek()
                {
                    let parent = parent.trim_matches('{').trim();
                    if workflow.has_task(parent) && parent != callee {
                        edges.push(Edge::new(parent, callee.clone()));
                    }
                }
            }
            // Input mappings like `reads = align.bam` reference upstream
            // call outputs.
            if let Some(args) = trimmed.split_once('{').map(|(_, a)| a) {
                for token in args.split([',', '}']) {
                    if let Some((_, source)) = token.split_once('=')
                        && let Some((parent, _)) = source.trim().split_once('.')
                        && workflow.has_task(parent.trim())
                        && parent.trim() != callee
                    {
                        edges.push(Edge::new(parent.trim(), callee.clone()));
                    }
                }
            }
        }

        depth -= i64::try_from(trimmed.matches('}').count()).unwrap_or(0);
        while depth_at_scatter.last().is_some_and(|&d| depth < d) {
            depth_at_scatter.pop();
            scatter_stack.pop();
        }
    }

    for edge in edges {
        workflow.add_edge(edge)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf2wf_core::ScatterMethod;

    const ENV: Environment = Environment::CloudNative;

    fn parse_str(text: &str) -> Workflow {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.wdl");
        std::fs::write(&path, text).unwrap();
        WdlImporter::new().parse_source(&path).unwrap()
    }

    const PIPELINE: &str = r#"
version 1.0

task align {
  input {
    File reads
  }
  command <<<
    bwa mem ~{reads} > out.bam
  >>>
  runtime {
    cpu: 4
    memory: "8 GB"
    docker: "biocontainers/bwa:0.7.17"
  }
  output {
    File bam = "out.bam"
  }
}

task merge {
  input {
    Array[File] bams
  }
  command {
    samtools merge merged.bam
  }
  runtime {
    memory: "4 GB"
  }
  output {
    File merged = "merged.bam"
  }
}

workflow pipeline {
  input {
    Array[File] samples
  }
  scatter (sample in samples) {
    call align { input: reads = sample }
  }
  call merge { input: bams = align.bam }
}
"#;

    #[test]
    fn parses_tasks_with_runtime() {
        let wf = parse_str(PIPELINE);
        assert_eq!(wf.task_count(), 2);
        assert_eq!(wf.label.as_deref(), Some("pipeline"));
        assert_eq!(wf.metadata["wdl_version"], serde_json::json!("1.0"));

        let align = wf.task("align").unwrap();
        assert_eq!(align.cpu.get_for(ENV), Some(&4));
        assert_eq!(align.mem_mb.get_for(ENV), Some(&8192));
        assert_eq!(
            align.container.get_for(ENV).map(String::as_str),
            Some("docker://biocontainers/bwa:0.7.17")
        );
        assert!(
            align
                .command
                .get_for(ENV)
                .is_some_and(|c| c.contains("bwa mem"))
        );
        assert_eq!(align.inputs[0].id, "reads");
        assert_eq!(align.inputs[0].param_type, ParameterType::File);
        assert_eq!(align.outputs[0].id, "bam");

        let merge = wf.task("merge").unwrap();
        assert_eq!(
            merge.inputs[0].param_type,
            ParameterType::array(ParameterType::File)
        );
    }

    #[test]
    fn scatter_region_attaches_to_called_task() {
        let wf = parse_str(PIPELINE);
        let scatter = wf.task("align").unwrap().scatter.as_ref().unwrap();
        assert_eq!(scatter.scatter, vec!["samples".to_string()]);
        assert_eq!(scatter.method, ScatterMethod::Dotproduct);
        // merge is outside the scatter region.
        assert!(wf.task("merge").unwrap().scatter.is_none());
    }

    #[test]
    fn call_references_become_edges() {
        let wf = parse_str(PIPELINE);
        assert_eq!(wf.edges().len(), 1);
        assert_eq!(wf.edges()[0], Edge::new("align", "merge"));
    }

    #[test]
    fn unterminated_task_is_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.wdl");
        std::fs::write(&path, "task x {\n  command {\n").unwrap();
        let err = WdlImporter::new().parse_source(&path).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn wdl_types() {
        assert_eq!(wdl_type("File"), ParameterType::File);
        assert_eq!(wdl_type("Array[File]"), ParameterType::array(ParameterType::File));
        assert_eq!(wdl_type("String?"), ParameterType::optional(ParameterType::String));
        assert_eq!(
            wdl_type("Array[Int]+"),
            ParameterType::array(ParameterType::Int)
        );
    }

    #[test]
    fn memory_strings() {
        assert_eq!(parse_memory_mb("8 GB"), Some(8192));
        assert_eq!(parse_memory_mb("512 MB"), Some(512));
        assert_eq!(parse_memory_mb("not memory"), None);
    }
}
