//! Scheduler - topological ordering of the pipeline DAG

use super::graph::{Graph, Node};
use crate::error::EngineError;
use std::collections::{HashMap, VecDeque};

/// Stateless scheduler over a validated graph
pub struct Scheduler;

impl Scheduler {
    /// Compute an execution order with Kahn's algorithm.
    ///
    /// Ties are broken by graph insertion order, so the same graph always
    /// yields the same order. Fails with `EngineError::Cycle` listing the
    /// nodes that could not be ordered; never returns a partial order.
    pub fn order(graph: &Graph) -> Result<Vec<&Node>, EngineError> {
        let position: HashMap<&str, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; graph.nodes.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];

        for edge in &graph.edges {
            let (Some(&from), Some(&to)) = (
                position.get(edge.source.as_str()),
                position.get(edge.target.as_str()),
            ) else {
                // Dangling edges are rejected by Graph::validate
                continue;
            };
            in_degree[to] += 1;
            successors[from].push(to);
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| i)
            .collect();

        let mut sorted = Vec::with_capacity(graph.nodes.len());

        while let Some(index) = queue.pop_front() {
            sorted.push(&graph.nodes[index]);

            for &next in &successors[index] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if sorted.len() < graph.nodes.len() {
            let nodes: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, degree)| **degree > 0)
                .map(|(i, _)| graph.nodes[i].id.clone())
                .collect();
            log::warn!("Cycle detected among nodes: {}", nodes.join(", "));
            return Err(EngineError::Cycle { nodes });
        }

        Ok(sorted)
    }

    /// Convenience wrapper returning node IDs
    pub fn order_ids(graph: &Graph) -> Result<Vec<String>, EngineError> {
        Ok(Self::order(graph)?
            .into_iter()
            .map(|node| node.id.clone())
            .collect())
    }
}
