//! Node Executor - dispatches a node to its kind's handler
//!
//! Dispatch is a pure function of the node kind, looked up in the
//! [`NodeRegistry`]. Results are normalised into a named-output bundle.

use super::graph::{Node, Parameters};
use super::value::{InputBundle, OutputBundle, Value};
use crate::collaborator::{Collaborator, GenerationRequest};
use crate::error::NodeError;
use crate::kinds::{Handler, KindSpec, NodeRegistry, PortSpec};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Runs single nodes. Cheap to clone; shares the registry.
#[derive(Clone)]
pub struct NodeExecutor {
    registry: Arc<NodeRegistry>,
}

impl NodeExecutor {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Execute one node with its resolved inputs
    pub async fn execute(&self, node: &Node, inputs: InputBundle) -> Result<OutputBundle, NodeError> {
        let unknown = || NodeError::execution(&node.id, format!("no handler for kind '{}'", node.kind));
        let spec = self.registry.spec(&node.kind).ok_or_else(unknown)?;
        let handler = self.registry.handler(&node.kind).ok_or_else(unknown)?;

        match handler {
            Handler::Source { parameter, port } => run_source(node, parameter, port),
            Handler::Sink => Ok(inputs),
            Handler::Generation(collaborator) => {
                run_generation(node, spec, inputs, collaborator.as_ref()).await
            }
        }
    }
}

fn run_source(node: &Node, parameter: &str, port: &PortSpec) -> Result<OutputBundle, NodeError> {
    let raw = node.parameters.get(parameter).ok_or_else(|| {
        NodeError::execution(&node.id, format!("missing parameter '{}'", parameter))
    })?;
    let value = Value::from_param(port.port_type, raw).ok_or_else(|| {
        NodeError::execution(
            &node.id,
            format!("parameter '{}' is not a valid {}", parameter, port.port_type),
        )
    })?;

    let mut output = OutputBundle::new();
    output.insert(port.name.clone(), value);
    Ok(output)
}

async fn run_generation(
    node: &Node,
    spec: &KindSpec,
    inputs: InputBundle,
    collaborator: &dyn Collaborator,
) -> Result<OutputBundle, NodeError> {
    let inputs = prepare_inputs(node, spec, inputs)?;

    let mut parameters: Parameters = spec
        .parameters
        .iter()
        .map(|p| (p.name.clone(), p.default.clone()))
        .collect();
    parameters.extend(node.parameters.clone());

    let request = GenerationRequest {
        node_id: node.id.clone(),
        kind: node.kind.clone(),
        inputs,
        parameters,
        outputs: spec.outputs.clone(),
    };

    log::debug!("Invoking collaborator for {} ({})", node.id, node.kind);

    // Also covers panics while the collaborator builds its future
    let result = AssertUnwindSafe(async move { collaborator.invoke(request).await })
        .catch_unwind()
        .await
        .map_err(|_| NodeError::execution(&node.id, "collaborator panicked"))?
        .map_err(|e| NodeError::execution(&node.id, format!("{:#}", e)))?;

    normalize_outputs(node, spec, result)
}

/// Fill unconnected ports from parameters or defaults, then check presence
/// and types of everything the kind declares.
fn prepare_inputs(node: &Node, spec: &KindSpec, mut inputs: InputBundle) -> Result<InputBundle, NodeError> {
    for port in &spec.inputs {
        if let Some(value) = inputs.get(&port.name) {
            if !port.port_type.accepts(value) {
                return Err(NodeError::execution(
                    &node.id,
                    format!(
                        "input '{}' expects {} but received {}",
                        port.name,
                        port.port_type,
                        value.port_type()
                    ),
                ));
            }
            continue;
        }

        if let Some(raw) = node.parameters.get(&port.name) {
            let value = Value::from_param(port.port_type, raw).ok_or_else(|| {
                NodeError::execution(
                    &node.id,
                    format!("parameter '{}' is not a valid {}", port.name, port.port_type),
                )
            })?;
            inputs.insert(port.name.clone(), value);
        } else if let Some(default) = &port.default {
            inputs.insert(port.name.clone(), default.clone());
        } else if port.required {
            return Err(NodeError::execution(
                &node.id,
                format!("missing required input '{}'", port.name),
            ));
        }
    }

    if let Some(group) = spec
        .any_of
        .iter()
        .find(|group| !group.iter().any(|p| inputs.contains_key(p)))
    {
        return Err(NodeError::execution(
            &node.id,
            format!("missing required input '{}'", group.join("|")),
        ));
    }

    inputs.retain(|name, _| {
        let declared = spec.input_port(name).is_some();
        if !declared {
            log::warn!("Dropping undeclared input '{}' of {}", name, node.id);
        }
        declared
    });

    Ok(inputs)
}

/// Keep exactly the declared output ports, each with a compatible value
fn normalize_outputs(node: &Node, spec: &KindSpec, mut result: OutputBundle) -> Result<OutputBundle, NodeError> {
    let mut output = OutputBundle::new();

    for port in &spec.outputs {
        let value = result.remove(&port.name).ok_or_else(|| {
            NodeError::execution(
                &node.id,
                format!("invalid result: missing output '{}'", port.name),
            )
        })?;
        if !port.port_type.accepts(&value) {
            return Err(NodeError::execution(
                &node.id,
                format!(
                    "invalid result: output '{}' expects {} but received {}",
                    port.name,
                    port.port_type,
                    value.port_type()
                ),
            ));
        }
        output.insert(port.name.clone(), value);
    }

    Ok(output)
}
