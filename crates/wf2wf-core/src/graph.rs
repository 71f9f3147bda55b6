// SPDX-License-Identifier: MIT OR Apache-2.0
//! Topological ordering utilities shared by validators and exporters.

use crate::workflow::{Edge, GraphError, Workflow};
use std::collections::{BTreeMap, BTreeSet};

/// Topological order of all task ids.
///
/// Kahn's algorithm with a lexicographic tie-break, so the order is
/// deterministic for any given workflow.
///
/// # Errors
///
/// Returns [`GraphError::CycleDetected`] if the edge relation has a cycle.
pub fn topo_order(workflow: &Workflow) -> Result<Vec<String>, GraphError> {
    let mut in_degree: BTreeMap<&str, usize> =
        workflow.task_ids().map(|id| (id, 0_usize)).collect();
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in workflow.edges() {
        *in_degree.entry(edge.child.as_str()).or_insert(0) += 1;
        children
            .entry(edge.parent.as_str())
            .or_default()
            .push(edge.child.as_str());
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(&id) = ready.iter().next() {
        ready.remove(id);
        order.push(id.to_string());
        if let Some(next) = children.get(id) {
            for &child in next {
                if let Some(d) = in_degree.get_mut(child) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(child);
                    }
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        let id = in_degree
            .iter()
            .find(|(_, d)| **d > 0)
            .map(|(id, _)| (*id).to_string())
            .unwrap_or_default();
        return Err(GraphError::CycleDetected { id });
    }
    Ok(order)
}

/// Edges in stable topological emission order.
///
/// Sorted by the topological position of the child, tie-broken by child
/// id then parent id.
///
/// # Errors
///
/// Returns [`GraphError::CycleDetected`] if the edge relation has a cycle.
pub fn sorted_edges(workflow: &Workflow) -> Result<Vec<Edge>, GraphError> {
    let order = topo_order(workflow)?;
    let position: BTreeMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut edges = workflow.edges().to_vec();
    edges.sort_by(|a, b| {
        position[a.child.as_str()]
            .cmp(&position[b.child.as_str()])
            .then_with(|| a.child.cmp(&b.child))
            .then_with(|| a.parent.cmp(&b.parent))
    });
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn workflow_with(ids: &[&str], edges: &[(&str, &str)]) -> Workflow {
        let mut wf = Workflow::new("g", "1.0");
        for id in ids {
            wf.add_task(Task::new(*id)).unwrap();
        }
        for (p, c) in edges {
            wf.add_edge(Edge::new(*p, *c)).unwrap();
        }
        wf
    }

    #[test]
    fn topo_order_linear_chain() {
        let wf = workflow_with(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert_eq!(topo_order(&wf).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn topo_order_tie_break_is_lexicographic() {
        let wf = workflow_with(&["z", "a", "m"], &[]);
        assert_eq!(topo_order(&wf).unwrap(), vec!["a", "m", "z"]);
    }

    #[test]
    fn topo_order_diamond() {
        let wf = workflow_with(
            &["root", "left", "right", "sink"],
            &[
                ("root", "left"),
                ("root", "right"),
                ("left", "sink"),
                ("right", "sink"),
            ],
        );
        let order = topo_order(&wf).unwrap();
        assert_eq!(order.first().map(String::as_str), Some("root"));
        assert_eq!(order.last().map(String::as_str), Some("sink"));
    }

    #[test]
    fn topo_order_empty_workflow() {
        let wf = Workflow::new("empty", "1.0");
        assert!(topo_order(&wf).unwrap().is_empty());
    }

    #[test]
    fn sorted_edges_deterministic() {
        let wf = workflow_with(
            &["a", "b", "c", "d"],
            &[("b", "d"), ("a", "c"), ("a", "d"), ("a", "b")],
        );
        let edges = sorted_edges(&wf).unwrap();
        let pairs: Vec<(&str, &str)> = edges
            .iter()
            .map(|e| (e.parent.as_str(), e.child.as_str()))
            .collect();
        // b and c both depend only on a; b sorts before c; d last with
        // parents in lexical order.
        assert_eq!(
            pairs,
            vec![("a", "b"), ("a", "c"), ("a", "d"), ("b", "d")]
        );
    }
}
