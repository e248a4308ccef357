//! Topological scheduling (§4.C8): Kahn's algorithm over a
//! [`ValidatedGraph`], ties between simultaneously-ready nodes broken by the
//! lexicographic order of node ids so a given graph always executes in the
//! same order run to run.
//!
//! A [`ValidatedGraph`] cannot contain a cycle (`Graph::validate` rejects
//! one), so [`topological_order`] returning short of every node id would
//! mean that invariant was somehow violated — treated as a hard
//! [`ExecutorError::GraphInvalid`] rather than assumed away.

use std::collections::{BTreeSet, HashMap};

use workflow_graph::ValidatedGraph;

use crate::error::{ExecutorError, Result};

/// Returns node ids in an order where every node appears after all of its
/// upstream dependencies, breaking ties lexicographically.
pub fn topological_order(graph: &ValidatedGraph) -> Result<Vec<String>> {
    let mut remaining: HashMap<&str, usize> =
        graph.nodes().iter().map(|n| (n.id.as_str(), 0usize)).collect();
    for conn in graph.connections() {
        *remaining.get_mut(conn.to.node.as_str()).expect("validated graph has no dangling refs") += 1;
    }

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(graph.nodes().len());
    while let Some(&id) = ready.iter().next() {
        ready.remove(id);
        order.push(id.to_string());

        for conn in graph.outgoing(id) {
            let degree = remaining.get_mut(conn.to.node.as_str()).expect("validated graph has no dangling refs");
            *degree -= 1;
            if *degree == 0 {
                ready.insert(conn.to.node.as_str());
            }
        }
    }

    if order.len() != graph.nodes().len() {
        return Err(ExecutorError::GraphInvalid(workflow_graph::GraphError::new(
            workflow_graph::GraphInvalidReason::Cycle,
            "topological scheduling could not order every node; a validated graph should be acyclic".to_string(),
        )));
    }

    Ok(order)
}
