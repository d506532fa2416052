//! Input resolver - maps upstream outputs onto a node's input ports

use super::graph::Edge;
use super::record::{ExecutionRecords, NodeStatus};
use super::value::InputBundle;
use crate::error::EngineError;

/// Collect the inputs of `node_id` from the recorded outputs of its
/// upstream neighbours.
///
/// Every upstream node must already be `completed`. Anything else means the
/// caller broke the scheduling order, and is reported as
/// `EngineError::UpstreamIncomplete` instead of substituting a default.
pub fn resolve_inputs(
    node_id: &str,
    edges: &[Edge],
    records: &ExecutionRecords,
) -> Result<InputBundle, EngineError> {
    let mut inputs = InputBundle::new();

    for edge in edges.iter().filter(|e| e.target == node_id) {
        let record = records
            .get(&edge.source)
            .filter(|r| r.status == NodeStatus::Completed)
            .ok_or_else(|| EngineError::UpstreamIncomplete {
                node_id: node_id.to_string(),
                upstream: edge.source.clone(),
            })?;

        let value = record
            .output
            .as_ref()
            .and_then(|output| output.get(&edge.source_port))
            .ok_or_else(|| EngineError::NodeExecution {
                node_id: node_id.to_string(),
                message: format!(
                    "upstream node '{}' did not produce output '{}'",
                    edge.source, edge.source_port
                ),
            })?;

        inputs.insert(edge.target_port.clone(), value.clone());
    }

    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{OutputBundle, Value};

    fn image_output(url: &str) -> OutputBundle {
        let mut out = OutputBundle::new();
        out.insert("image".to_string(), Value::Image(url.to_string()));
        out
    }

    #[test]
    fn test_maps_source_port_to_target_port() {
        let edges = vec![
            Edge::new("e1", "gen", "image", "up", "source"),
            Edge::new("e2", "gen", "image", "other", "image"),
        ];
        let mut records = ExecutionRecords::new(["gen", "up", "other"]);
        records.start("gen").unwrap();
        records.complete("gen", image_output("cat.png")).unwrap();

        let inputs = resolve_inputs("up", &edges, &records).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs["source"], Value::Image("cat.png".to_string()));
    }

    #[test]
    fn test_node_without_edges() {
        let records = ExecutionRecords::new(["solo"]);
        assert!(resolve_inputs("solo", &[], &records).unwrap().is_empty());
    }

    #[test]
    fn test_incomplete_upstream_fails_loudly() {
        let edges = vec![Edge::new("e1", "gen", "image", "up", "image")];
        let mut records = ExecutionRecords::new(["gen", "up"]);
        records.start("gen").unwrap();

        let err = resolve_inputs("up", &edges, &records).unwrap_err();
        assert_eq!(
            err,
            EngineError::UpstreamIncomplete {
                node_id: "up".to_string(),
                upstream: "gen".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_source_port() {
        let edges = vec![Edge::new("e1", "gen", "video", "up", "video")];
        let mut records = ExecutionRecords::new(["gen", "up"]);
        records.start("gen").unwrap();
        records.complete("gen", image_output("cat.png")).unwrap();

        let err = resolve_inputs("up", &edges, &records).unwrap_err();
        assert!(matches!(err, EngineError::NodeExecution { ref node_id, .. } if node_id == "up"));
    }
}
