// SPDX-License-Identifier: MIT OR Apache-2.0
//! `.dag` file importer.

use crate::submit::SubmitDescription;
use std::collections::BTreeMap;
use std::path::Path;
use wf2wf_core::{
    Edge, ParseError, SourceParser, Task, Workflow, native_environment,
};
use wf2wf_format::WorkflowFormat;

/// Importer for DAGMan `.dag` files and their submit descriptions.
#[derive(Debug, Default)]
pub struct DagmanImporter {
    _priv: (),
}

impl DagmanImporter {
    /// Create an importer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceParser for DagmanImporter {
    fn source_format(&self) -> WorkflowFormat {
        WorkflowFormat::Dagman
    }

    fn parse_source(&self, path: &Path) -> Result<Workflow, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow")
            .to_string();
        let mut workflow = Workflow::new(name, "1.0");
        let env = native_environment(WorkflowFormat::Dagman);

        // First pass: named SUBMIT-DESCRIPTION blocks.
        let mut described: BTreeMap<String, SubmitDescription> = BTreeMap::new();
        let lines: Vec<&str> = text.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            if let Some(rest) = strip_keyword(trimmed, "SUBMIT-DESCRIPTION") {
                let (block_name, block, next) = read_brace_block(&lines, i, rest)?;
                described.insert(block_name, SubmitDescription::parse(&block));
                i = next;
            } else {
                i += 1;
            }
        }

        // Second pass: jobs, edges, retry/priority/vars.
        let mut edges = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                i += 1;
                continue;
            }
            if let Some(rest) = strip_keyword(trimmed, "SUBMIT-DESCRIPTION") {
                // Already collected in the first pass; skip the block.
                let (_, _, next) = read_brace_block(&lines, i, rest)?;
                i = next;
                continue;
            }
            if let Some(rest) = strip_keyword(trimmed, "JOB") {
                let mut parts = rest.split_whitespace();
                let job = parts.next().ok_or_else(|| {
                    ParseError::at_line(i + 1, "JOB requires a name")
                })?;
                let spec = rest[job.len()..].trim().to_string();
                let mut task = Task::new(job);

                if spec.starts_with('{')
                    || (spec.is_empty() && lines.get(i + 1).is_some_and(|l| l.trim().starts_with('{')))
                {
                    // Modern inline submit description.
                    let (_, block, next) = read_brace_block(&lines, i, &rest[job.len()..])?;
                    SubmitDescription::parse(&block).apply_to(&mut task, env);
                    i = next;
                } else if let Some(desc) = described.get(spec.trim()) {
                    desc.apply_to(&mut task, env);
                    i += 1;
                } else {
                    // Traditional external submit file.
                    let sub_path = dir.join(spec.trim());
                    let sub_text =
                        std::fs::read_to_string(&sub_path).map_err(|source| ParseError::Io {
                            path: sub_path.clone(),
                            source,
                        })?;
                    SubmitDescription::parse(&sub_text).apply_to(&mut task, env);
                    i += 1;
                }
                workflow.add_task(task)?;
                continue;
            }
            if let Some(rest) = strip_keyword(trimmed, "PARENT") {
                let Some((parents_part, children_part)) = split_parent_child(rest) else {
                    return Err(ParseError::at_line(i + 1, "PARENT line without CHILD"));
                };
                for parent in parents_part.split_whitespace() {
                    for child in children_part.split_whitespace() {
                        edges.push(Edge::new(parent, child));
                    }
                }
                i += 1;
                continue;
            }
            if let Some(rest) = strip_keyword(trimmed, "RETRY") {
                let mut parts = rest.split_whitespace();
                if let (Some(job), Some(count)) = (parts.next(), parts.next())
                    && let Ok(count) = count.parse::<i64>()
                    && let Some(task) = workflow.task_mut(job)
                {
                    task.retry_count.set_for(env, count);
                }
                i += 1;
                continue;
            }
            if let Some(rest) = strip_keyword(trimmed, "PRIORITY") {
                let mut parts = rest.split_whitespace();
                if let (Some(job), Some(priority)) = (parts.next(), parts.next())
                    && let Ok(priority) = priority.parse::<i64>()
                    && let Some(task) = workflow.task_mut(job)
                {
                    task.priority.set_for(env, priority);
                }
                i += 1;
                continue;
            }
            if let Some(rest) = strip_keyword(trimmed, "VARS") {
                let mut parts = rest.splitn(2, char::is_whitespace);
                if let (Some(job), Some(vars)) = (parts.next(), parts.next())
                    && let Some(task) = workflow.task_mut(job)
                {
                    task.metadata
                        .insert("dagman_vars".into(), serde_json::json!(vars.trim()));
                }
                i += 1;
                continue;
            }
            // Other DAGMan commands (CONFIG, NODE_STATUS_FILE, ...) are
            // workflow metadata.
            if let Some((keyword, rest)) = trimmed.split_once(char::is_whitespace) {
                workflow
                    .metadata
                    .insert(format!("dagman:{keyword}"), serde_json::json!(rest.trim()));
            }
            i += 1;
        }

        for edge in edges {
            workflow.add_edge(edge)?;
        }
        Ok(workflow)
    }
}

fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn split_parent_child(rest: &str) -> Option<(&str, &str)> {
    let upper_pos = rest.find("CHILD")?;
    let (parents, children) = rest.split_at(upper_pos);
    Some((parents.trim(), children["CHILD".len()..].trim()))
}

/// Read a `{ ... }` block starting on line `start` (whose remainder after
/// the keyword is `after`). Returns the block name (first token of
/// `after`, if any), the block body, and the index after the closing
/// brace.
fn read_brace_block(
    lines: &[&str],
    start: usize,
    after: &str,
) -> Result<(String, String, usize), ParseError> {
    let name = after
        .trim()
        .trim_end_matches('{')
        .trim()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    let mut i = start;
    // The opening brace is either on this line or the next.
    if !lines[i].contains('{') {
        i += 1;
        if i >= lines.len() || !lines[i].trim().starts_with('{') {
            return Err(ParseError::at_line(start + 1, "expected `{` to open a block"));
        }
    }
    let mut body = String::new();
    // Anything after `{` on the opening line belongs to the body.
    if let Some(after_brace) = lines[i].split_once('{').map(|(_, b)| b)
        && !after_brace.trim().is_empty()
        && after_brace.trim() != "}"
    {
        body.push_str(after_brace.trim_end_matches('}').trim());
        body.push('\n');
        if after_brace.trim_end().ends_with('}') {
            return Ok((name, body, i + 1));
        }
    }
    i += 1;
    while i < lines.len() {
        let line = lines[i];
        if line.trim() == "}" {
            return Ok((name, body, i + 1));
        }
        body.push_str(line.trim());
        body.push('\n');
        i += 1;
    }
    Err(ParseError::at_line(start + 1, "unterminated `{` block"))
}
