// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # wf2wf-loss
//!
//! Loss registry and `.loss.json` side-car handling.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wf2wf_core::{LossEntry, LossStatus, Workflow, source_checksum};

/// Suffix appended to an output path to name its side-car.
pub const SIDE_CAR_SUFFIX: &str = ".loss.json";

/// Side-car path for an output file: `<output>.loss.json`.
#[must_use]
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(SIDE_CAR_SUFFIX);
    PathBuf::from(name)
}

// ── Side-car document ───────────────────────────────────────────────────

/// The `environment_adaptation` header block of a side-car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentAdaptationInfo {
    /// Environment the values were adapted from.
    pub source_environment: String,
    /// Environment the values were adapted to.
    pub target_environment: String,
    /// Kind of adaptation performed (e.g. `"resource_scaling"`).
    pub adaptation_type: String,
}

/// Counts of entries by category, severity, status, and origin.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct LossSummary {
    /// Total number of entries.
    pub total: usize,
    /// Entries per category.
    pub by_category: BTreeMap<String, usize>,
    /// Entries per severity.
    pub by_severity: BTreeMap<String, usize>,
    /// Entries per status.
    pub by_status: BTreeMap<String, usize>,
    /// Entries per origin.
    pub by_origin: BTreeMap<String, usize>,
}

impl LossSummary {
    /// Summarise a slice of entries.
    #[must_use]
    pub fn of(entries: &[LossEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        for e in entries {
            *summary.by_category.entry(e.category.clone()).or_insert(0) += 1;
            *summary
                .by_severity
                .entry(json_name(&e.severity))
                .or_insert(0) += 1;
            *summary.by_status.entry(json_name(&e.status)).or_insert(0) += 1;
            *summary.by_origin.entry(json_name(&e.origin)).or_insert(0) += 1;
        }
        summary
    }
}

/// Serde wire name of an enum value (e.g. `LossStatus::LostAgain` →
/// `"lost_again"`).
fn json_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

/// The on-disk side-car document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SideCarDocument {
    /// Version of the converter that wrote the side-car.
    pub wf2wf_version: String,
    /// Target engine the accompanying output was written for.
    pub target_engine: String,
    /// `"sha256:" + 64 lowercase hex` of the canonical IR at export time.
    /// The hash excludes the IR's `loss_map`.
    pub source_checksum: String,
    /// When the side-car was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Adaptation header, present when the environment adapter ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_adaptation: Option<EnvironmentAdaptationInfo>,
    /// Entry counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<LossSummary>,
    /// The loss entries, in the order recorded.
    pub entries: Vec<LossEntry>,
}

impl SideCarDocument {
    /// Whether `source_checksum` is well-formed.
    #[must_use]
    pub fn has_valid_checksum_format(&self) -> bool {
        is_checksum_format(&self.source_checksum)
    }

    /// Whether the side-car's checksum matches `workflow`.
    #[must_use]
    pub fn matches(&self, workflow: &Workflow) -> bool {
        source_checksum(workflow).is_ok_and(|sum| sum == self.source_checksum)
    }
}

/// Whether `s` looks like `"sha256:" + 64 lowercase hex`.
#[must_use]
pub fn is_checksum_format(s: &str) -> bool {
    s.strip_prefix("sha256:").is_some_and(|hex| {
        hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from side-car I/O. Read errors are non-fatal at the call site;
/// write errors are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SideCarError {
    /// Reading or writing the side-car file failed.
    #[error("side-car I/O at `{path}`: {source}")]
    Io {
        /// The side-car path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The side-car is not valid JSON or violates its schema.
    #[error("malformed side-car: {0}")]
    Json(#[from] serde_json::Error),
    /// The workflow could not be serialised for checksumming.
    #[error(transparent)]
    Contract(#[from] wf2wf_core::ContractError),
}

// ── Registry ────────────────────────────────────────────────────────────

/// Outcome of a reinjection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// Entries successfully reinjected.
    pub reapplied: usize,
    /// Entries whose reinjection failed.
    pub lost_again: usize,
    /// Entries carried through unchanged (already reapplied or adapted).
    pub carried: usize,
}

/// Append-only buffer of loss entries for one conversion.
///
/// The registry is an explicit value owned by the conversion, reset at the
/// start of each top-level run. Callers wanting parallel conversions use
/// one registry per conversion.
#[derive(Debug, Clone, Default)]
pub struct LossRegistry {
    entries: Vec<LossEntry>,
}

impl LossRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the buffer. Called at the start of every conversion.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Append an entry.
    ///
    /// Entry defaults (status `lost`, origin `wf2wf`, severity `warn`) are
    /// applied by [`LossEntry::new`] and the serde defaults.
    pub fn record(&mut self, entry: LossEntry) {
        self.entries.push(entry);
    }

    /// Append many entries, preserving order.
    pub fn record_all(&mut self, entries: impl IntoIterator<Item = LossEntry>) {
        self.entries.extend(entries);
    }

    /// The recorded entries, in recording order.
    #[must_use]
    pub fn entries(&self) -> &[LossEntry] {
        &self.entries
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries still carrying unexpressed information.
    pub fn unrecovered(&self) -> impl Iterator<Item = &LossEntry> {
        self.entries.iter().filter(|e| e.is_unrecovered())
    }

    /// Materialise the buffer into `<output>.loss.json`.
    ///
    /// # Errors
    ///
    /// Returns [`SideCarError::Io`] on write failure (fatal for the
    /// conversion).
    pub fn write(
        &self,
        output: &Path,
        target_engine: &str,
        source_checksum: &str,
        environment_adaptation: Option<EnvironmentAdaptationInfo>,
    ) -> Result<PathBuf, SideCarError> {
        let doc = SideCarDocument {
            wf2wf_version: env!("CARGO_PKG_VERSION").to_string(),
            target_engine: target_engine.to_string(),
            source_checksum: source_checksum.to_string(),
            timestamp: Some(Utc::now()),
            environment_adaptation,
            summary: Some(LossSummary::of(&self.entries)),
            entries: self.entries.clone(),
        };
        let path = sidecar_path(output);
        let mut json = serde_json::to_string_pretty(&doc)?;
        json.push('\n');
        std::fs::write(&path, json).map_err(|source| SideCarError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Read the side-car adjacent to `input`, if one exists.
    ///
    /// Returns `Ok(None)` when no side-car file is present. Parse errors
    /// are returned but are non-fatal by policy: callers log and continue.
    ///
    /// # Errors
    ///
    /// Returns [`SideCarError::Io`] or [`SideCarError::Json`] on
    /// unreadable or malformed side-cars.
    pub fn read_adjacent(input: &Path) -> Result<Option<SideCarDocument>, SideCarError> {
        let path = sidecar_path(input);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| SideCarError::Io {
            path: path.clone(),
            source,
        })?;
        let doc: SideCarDocument = serde_json::from_str(&raw)?;
        Ok(Some(doc))
    }

    /// Reinject side-car entries into a freshly imported workflow.
    ///
    /// Each entry with status `lost` or `lost_again` has its `lost_value`
    /// written back at `json_pointer`. Reinjection is all-or-nothing per
    /// entry: the mutated document must still deserialise as a valid
    /// workflow, otherwise the entry becomes `lost_again` and the workflow
    /// is untouched. Entries already `reapplied` or `adapted` are carried
    /// through unchanged.
    ///
    /// For environment-indexed fields the full map is reconstructed: when
    /// `lost_value` is an object carrying `all_environment_values`, that
    /// canonical map is injected rather than a bare default.
    ///
    /// Updated entries are appended to this registry and to the workflow's
    /// `loss_map`.
    pub fn apply(
        &mut self,
        workflow: &mut Workflow,
        entries: Vec<LossEntry>,
    ) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        for mut entry in entries {
            match entry.status {
                LossStatus::Lost | LossStatus::LostAgain => {
                    if reinject(workflow, &entry) {
                        entry.status = LossStatus::Reapplied;
                        outcome.reapplied += 1;
                    } else {
                        entry.status = LossStatus::LostAgain;
                        outcome.lost_again += 1;
                        tracing::debug!(
                            target: "wf2wf_loss",
                            pointer = %entry.json_pointer,
                            "loss entry could not be reinjected"
                        );
                    }
                }
                LossStatus::Reapplied | LossStatus::Adapted => {
                    outcome.carried += 1;
                }
            }
            workflow.loss_map.push(entry.clone());
            self.entries.push(entry);
        }
        outcome
    }
}

/// Attempt one reinjection. Returns `true` on success; on any failure the
/// workflow is left untouched.
fn reinject(workflow: &mut Workflow, entry: &LossEntry) -> bool {
    let Ok(mut doc) = serde_json::to_value(&*workflow) else {
        return false;
    };
    let inject = match entry.lost_value.as_object() {
        Some(obj) => match obj.get("all_environment_values") {
            Some(all) => all.clone(),
            None => entry.lost_value.clone(),
        },
        None => entry.lost_value.clone(),
    };
    if !pointer_set(&mut doc, &entry.json_pointer, inject) {
        return false;
    }
    match serde_json::from_value::<Workflow>(doc) {
        Ok(updated) => {
            *workflow = updated;
            true
        }
        Err(_) => false,
    }
}

/// Set `value` at `pointer` inside `doc`, creating the final object key if
/// its parent exists. Returns `false` when the pointer cannot be resolved.
fn pointer_set(doc: &mut serde_json::Value, pointer: &str, value: serde_json::Value) -> bool {
    if pointer.is_empty() || !pointer.starts_with('/') {
        return false;
    }
    let segments: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut cursor = doc;
    for seg in parents {
        cursor = match cursor {
            serde_json::Value::Object(map) => match map.get_mut(seg.as_str()) {
                Some(next) => next,
                None => return false,
            },
            serde_json::Value::Array(items) => match seg.parse::<usize>() {
                Ok(i) if i < items.len() => &mut items[i],
                _ => return false,
            },
            _ => return false,
        };
    }

    match cursor {
        serde_json::Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        serde_json::Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items[i] = value;
                true
            }
            Ok(i) if i == items.len() => {
                items.push(value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}
