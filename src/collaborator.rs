//! Generation collaborators - the seam where AI services plug in
//!
//! The engine never generates anything itself. Each generation kind is bound
//! to a [`Collaborator`] that accepts typed inputs and parameters and
//! eventually returns a bundle of outputs. Polling, retries and provider
//! specifics live behind this trait.

use crate::core::{InputBundle, OutputBundle, Parameters, PortType, Value};
use crate::kinds::PortSpec;
use async_trait::async_trait;

/// Everything a collaborator needs to perform one generation step
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub node_id: String,
    pub kind: String,
    pub inputs: InputBundle,
    /// Node parameters with kind defaults filled in
    pub parameters: Parameters,
    /// Output ports the engine expects back
    pub outputs: Vec<PortSpec>,
}

/// An external generation service
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Run the generation and wait for its single final result
    async fn invoke(&self, request: GenerationRequest) -> anyhow::Result<OutputBundle>;
}

/// Collaborator that fabricates placeholder outputs without calling any
/// service. Used for dry runs of a pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunCollaborator;

#[async_trait]
impl Collaborator for DryRunCollaborator {
    async fn invoke(&self, request: GenerationRequest) -> anyhow::Result<OutputBundle> {
        log::debug!(
            "Dry run of {} ({}) with {} inputs",
            request.node_id,
            request.kind,
            request.inputs.len()
        );

        Ok(request
            .outputs
            .iter()
            .map(|port| (port.name.clone(), placeholder(&request, port)))
            .collect())
    }
}

fn placeholder(request: &GenerationRequest, port: &PortSpec) -> Value {
    let reference = format!("dryrun://{}/{}", request.node_id, port.name);
    match port.port_type {
        PortType::Image => Value::Image(format!("{}.png", reference)),
        PortType::Video => Value::Video(format!("{}.mp4", reference)),
        PortType::Audio => Value::Audio(format!("{}.wav", reference)),
        PortType::Number => Value::Number(0.0),
        PortType::Boolean => Value::Boolean(false),
        PortType::Text | PortType::Any => {
            Value::Text(format!("[{}] output of {}", request.kind, request.node_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_fills_declared_outputs() {
        let request = GenerationRequest {
            node_id: "anim".to_string(),
            kind: "image_to_video".to_string(),
            inputs: InputBundle::new(),
            parameters: Parameters::new(),
            outputs: vec![
                PortSpec::required("video", PortType::Video),
                PortSpec::required("caption", PortType::Text),
            ],
        };

        let output = DryRunCollaborator.invoke(request).await.unwrap();
        assert_eq!(
            output["video"],
            Value::Video("dryrun://anim/video.mp4".to_string())
        );
        assert_eq!(output["caption"].port_type(), PortType::Text);
        assert_eq!(output.len(), 2);
    }
}
