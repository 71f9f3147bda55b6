// SPDX-License-Identifier: MIT OR Apache-2.0
//! The workflow container: tasks, edges, and workflow-level metadata.

use crate::loss::LossEntry;
use crate::spec::{BCOSpec, DocumentationSpec, ParameterSpec, ProvenanceSpec, RequirementSpec};
use crate::task::Task;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Edge ────────────────────────────────────────────────────────────────

/// A directed dependency: `parent` must complete before `child` starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    /// Upstream task id.
    pub parent: String,
    /// Downstream task id.
    pub child: String,
}

impl Edge {
    /// Create an edge `parent -> child`.
    #[must_use]
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from structural workflow mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A task with the same id already exists.
    #[error("duplicate task id `{id}`")]
    DuplicateId {
        /// The offending id.
        id: String,
    },
    /// An edge endpoint does not resolve to a task.
    #[error("edge references unknown task `{id}`")]
    UnknownTaskRef {
        /// The unresolved id.
        id: String,
    },
    /// Adding the edge would create a cycle.
    #[error("edge `{parent}` -> `{child}` would introduce a cycle")]
    CycleIntroduced {
        /// Upstream id of the rejected edge.
        parent: String,
        /// Downstream id of the rejected edge.
        child: String,
    },
    /// The edge relation already contains a cycle.
    #[error("dependency graph contains a cycle through `{id}`")]
    CycleDetected {
        /// A task id on the cycle.
        id: String,
    },
}

// ── Workflow ────────────────────────────────────────────────────────────

/// Named, versioned root container of the intermediate representation.
///
/// Task iteration order is insertion order and is significant for
/// reproducible output. Structural mutation goes through
/// [`add_task`](Self::add_task) and [`add_edge`](Self::add_edge), which
/// enforce id uniqueness, reference integrity, and acyclicity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Workflow {
    /// Unique workflow name.
    pub name: String,
    /// Workflow version.
    pub version: String,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Documentation string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// CWL version tag, when the source declared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwl_version: Option<String>,
    /// Workflow-level inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ParameterSpec>,
    /// Workflow-level outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ParameterSpec>,
    /// Tasks keyed by id, iteration order = insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    tasks: IndexMap<String, Task>,
    /// Dependency edges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    edges: Vec<Edge>,
    /// Workflow-level hard requirements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<RequirementSpec>,
    /// Workflow-level soft hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<RequirementSpec>,
    /// Provenance block, carried verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ProvenanceSpec>,
    /// Documentation block, carried verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<DocumentationSpec>,
    /// BioCompute Object block, carried verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bco: Option<BCOSpec>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Loss entries in the order recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loss_map: Vec<LossEntry>,
}

impl Workflow {
    /// Create an empty workflow.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Number of tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether a task with `id` exists.
    #[must_use]
    pub fn has_task(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Look up a task by id.
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Mutable task lookup.
    #[must_use]
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Iterate tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Iterate tasks mutably in insertion order.
    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    /// Task ids in insertion order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Dependency edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Add a task.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateId`] if a task with the same id is
    /// already present.
    pub fn add_task(&mut self, task: Task) -> Result<(), GraphError> {
        if self.tasks.contains_key(&task.id) {
            return Err(GraphError::DuplicateId {
                id: task.id.clone(),
            });
        }
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Add a dependency edge.
    ///
    /// Adding an edge that is already present is a no-op. The cycle check
    /// is incremental: a single reachability walk from `child`, worst-case
    /// O(V + E).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownTaskRef`] if either endpoint is absent
    /// and [`GraphError::CycleIntroduced`] if the edge would close a cycle.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if !self.tasks.contains_key(&edge.parent) {
            return Err(GraphError::UnknownTaskRef {
                id: edge.parent.clone(),
            });
        }
        if !self.tasks.contains_key(&edge.child) {
            return Err(GraphError::UnknownTaskRef {
                id: edge.child.clone(),
            });
        }
        if self.edges.contains(&edge) {
            return Ok(());
        }
        if edge.parent == edge.child || self.reaches(&edge.child, &edge.parent) {
            return Err(GraphError::CycleIntroduced {
                parent: edge.parent.clone(),
                child: edge.child.clone(),
            });
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Parent ids of `child` in edge insertion order.
    pub fn parents_of<'a>(&'a self, child: &'a str) -> impl Iterator<Item = &'a str> {
        self.edges
            .iter()
            .filter(move |e| e.child == child)
            .map(|e| e.parent.as_str())
    }

    /// Child ids of `parent` in edge insertion order.
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a str> {
        self.edges
            .iter()
            .filter(move |e| e.parent == parent)
            .map(|e| e.child.as_str())
    }

    /// Depth-first reachability: is `to` reachable from `from`?
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for e in &self.edges {
            adjacency
                .entry(e.parent.as_str())
                .or_default()
                .push(e.child.as_str());
        }
        let mut stack = vec![from];
        let mut seen = std::collections::BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if seen.insert(node)
                && let Some(next) = adjacency.get(node)
            {
                stack.extend(next.iter().copied());
            }
        }
        false
    }
}
