//! Node kind registry
//!
//! Each kind declares its input/output port schema and how it is handled:
//! sources echo a parameter, generation kinds call a bound
//! [`Collaborator`], sinks pass their inputs through. Adding a kind is
//! registering a [`KindSpec`], not adding a branch to the executor.

mod builtin;

use crate::collaborator::Collaborator;
use crate::core::{Graph, PortType, Value};
use crate::error::{EngineError, ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// What a kind does when executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindRole {
    /// Seeds the graph with user content
    Source,
    /// Delegates to a generation collaborator
    Generation,
    /// Collects final values of a branch
    Sink,
}

/// Declared input or output port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub port_type: PortType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

impl PortSpec {
    pub fn required(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            required: false,
            ..Self::required(name, port_type)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Declared parameter with its default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub default: serde_json::Value,
}

/// Schema and behaviour of one node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSpec {
    pub name: String,
    pub role: KindRole,
    #[serde(default)]
    pub inputs: Vec<PortSpec>,
    #[serde(default)]
    pub outputs: Vec<PortSpec>,
    /// Groups of input ports where at least one must be supplied
    #[serde(default)]
    pub any_of: Vec<Vec<String>>,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
    /// Parameter echoed by a source kind
    #[serde(default)]
    pub source_parameter: Option<String>,
}

impl KindSpec {
    /// Source kind echoing `parameter` on `output`
    pub fn source(name: impl Into<String>, parameter: impl Into<String>, output: PortSpec) -> Self {
        Self {
            source_parameter: Some(parameter.into()),
            outputs: vec![output],
            ..Self::empty(name, KindRole::Source)
        }
    }

    pub fn generation(name: impl Into<String>) -> Self {
        Self::empty(name, KindRole::Generation)
    }

    pub fn sink(name: impl Into<String>) -> Self {
        Self::empty(name, KindRole::Sink)
    }

    fn empty(name: impl Into<String>, role: KindRole) -> Self {
        Self {
            name: name.into(),
            role,
            inputs: Vec::new(),
            outputs: Vec::new(),
            any_of: Vec::new(),
            parameters: Vec::new(),
            source_parameter: None,
        }
    }

    pub fn input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn output(mut self, port: PortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn any_of(mut self, ports: &[&str]) -> Self {
        self.any_of
            .push(ports.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn param(mut self, name: impl Into<String>, default: serde_json::Value) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            default,
        });
        self
    }

    pub fn input_port(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_port(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Sinks take whatever is wired into them
    pub fn accepts_any_input(&self) -> bool {
        self.role == KindRole::Sink
    }

    /// Sinks re-emit their inputs, so a port may be read from them when an
    /// edge feeds that port
    pub fn emits_any_output(&self) -> bool {
        self.role == KindRole::Sink
    }
}

/// How the executor should run a node of a given kind
#[derive(Clone)]
pub enum Handler<'a> {
    Source {
        parameter: &'a str,
        port: &'a PortSpec,
    },
    Generation(Arc<dyn Collaborator>),
    Sink,
}

impl fmt::Debug for Handler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { parameter, port } => f
                .debug_struct("Source")
                .field("parameter", parameter)
                .field("port", &port.name)
                .finish(),
            Self::Generation(_) => write!(f, "Generation"),
            Self::Sink => write!(f, "Sink"),
        }
    }
}

/// Registry mapping kind names to their schema and handler
#[derive(Default, Clone)]
pub struct NodeRegistry {
    kinds: HashMap<String, KindSpec>,
    collaborators: HashMap<String, Arc<dyn Collaborator>>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the standard source, generation and sink kinds.
    /// Generation kinds still need a collaborator bound before they can run.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        for spec in builtin::kinds() {
            registry.register(spec);
        }
        registry
    }

    /// Register (or replace) a kind
    pub fn register(&mut self, spec: KindSpec) -> &mut Self {
        self.kinds.insert(spec.name.clone(), spec);
        self
    }

    /// Bind a collaborator to one generation kind
    pub fn bind(&mut self, kind: impl Into<String>, collaborator: Arc<dyn Collaborator>) -> &mut Self {
        self.collaborators.insert(kind.into(), collaborator);
        self
    }

    /// Bind one collaborator to every registered generation kind
    pub fn bind_generators(&mut self, collaborator: Arc<dyn Collaborator>) -> &mut Self {
        let names: Vec<String> = self
            .kinds
            .values()
            .filter(|spec| spec.role == KindRole::Generation)
            .map(|spec| spec.name.clone())
            .collect();
        for name in names {
            self.collaborators.insert(name, Arc::clone(&collaborator));
        }
        self
    }

    pub fn spec(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    /// Registered kind names, sorted
    pub fn kind_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the handler for a kind. `None` if the kind is unknown, or is a
    /// generation kind with no collaborator bound.
    pub fn handler(&self, kind: &str) -> Option<Handler<'_>> {
        let spec = self.kinds.get(kind)?;
        match spec.role {
            KindRole::Source => {
                let parameter = spec.source_parameter.as_deref()?;
                let port = spec.outputs.first()?;
                Some(Handler::Source { parameter, port })
            }
            KindRole::Generation => self
                .collaborators
                .get(kind)
                .map(|c| Handler::Generation(Arc::clone(c))),
            KindRole::Sink => Some(Handler::Sink),
        }
    }

    /// Pre-run checks of a structurally valid graph against the kind schemas.
    ///
    /// In order: every node has a handler (`UnknownKind`), every edge uses
    /// declared ports (`GraphValidation`), every required port or any-of group
    /// is supplied by an edge, a parameter or a default (`MissingInput`).
    pub fn check_graph(&self, graph: &Graph) -> Result<(), EngineError> {
        for node in &graph.nodes {
            if self.handler(&node.kind).is_none() {
                return Err(EngineError::UnknownKind {
                    node_id: node.id.clone(),
                    kind: node.kind.clone(),
                });
            }
        }

        let mut errors = Vec::new();
        for edge in &graph.edges {
            let location = format!("edges.{}", edge.id);

            if let Some(source) = graph.node(&edge.source).and_then(|n| self.spec(&n.kind)) {
                if source.emits_any_output() {
                    let fed = graph
                        .incoming(&edge.source)
                        .any(|e| e.target_port == edge.source_port);
                    if !fed {
                        errors.push(ValidationError::new(
                            ValidationErrorKind::UnknownPort,
                            &location,
                            format!(
                                "sink '{}' receives nothing on '{}'",
                                edge.source, edge.source_port
                            ),
                        ));
                    }
                } else if source.output_port(&edge.source_port).is_none() {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::UnknownPort,
                        &location,
                        format!("kind '{}' has no output '{}'", source.name, edge.source_port),
                    ));
                }
            }
            if let Some(target) = graph.node(&edge.target).and_then(|n| self.spec(&n.kind)) {
                if !target.accepts_any_input() && target.input_port(&edge.target_port).is_none() {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::UnknownPort,
                        &location,
                        format!("kind '{}' has no input '{}'", target.name, edge.target_port),
                    ));
                }
            }
        }
        if !errors.is_empty() {
            return Err(EngineError::GraphValidation(errors));
        }

        for node in &graph.nodes {
            let Some(spec) = self.spec(&node.kind) else {
                continue;
            };
            let connected: HashSet<&str> = graph
                .incoming(&node.id)
                .map(|e| e.target_port.as_str())
                .collect();
            let supplied = |name: &str| {
                connected.contains(name)
                    || node.parameters.contains_key(name)
                    || spec
                        .input_port(name)
                        .map(|p| p.default.is_some())
                        .unwrap_or(false)
            };

            if let Some(port) = spec
                .inputs
                .iter()
                .find(|p| p.required && !supplied(&p.name))
            {
                return Err(EngineError::MissingInput {
                    node_id: node.id.clone(),
                    port: port.name.clone(),
                });
            }
            if let Some(group) = spec
                .any_of
                .iter()
                .find(|group| !group.iter().any(|p| supplied(p)))
            {
                return Err(EngineError::MissingInput {
                    node_id: node.id.clone(),
                    port: group.join("|"),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::DryRunCollaborator;
    use crate::core::{Edge, Node};
    use serde_json::json;

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::with_builtin_kinds();
        registry.bind_generators(Arc::new(DryRunCollaborator));
        registry
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = NodeRegistry::with_builtin_kinds();
        for kind in ["prompt", "image", "video", "audio", "text_to_image", "lipsync", "preview"] {
            assert!(registry.spec(kind).is_some(), "missing kind {}", kind);
        }
        assert!(matches!(registry.handler("prompt"), Some(Handler::Source { parameter: "text", .. })));
        assert!(matches!(registry.handler("preview"), Some(Handler::Sink)));
        // Unbound generation kinds have no handler
        assert!(registry.handler("text_to_image").is_none());
    }

    #[test]
    fn test_bind_single_kind() {
        let mut registry = NodeRegistry::with_builtin_kinds();
        registry.bind("upscale", Arc::new(DryRunCollaborator));
        assert!(matches!(registry.handler("upscale"), Some(Handler::Generation(_))));
        assert!(registry.handler("inpaint").is_none());
    }

    #[test]
    fn test_unknown_kind() {
        let graph = Graph::new(vec![Node::new("x", "hologram")], vec![]);
        let err = registry().check_graph(&graph).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownKind {
                node_id: "x".to_string(),
                kind: "hologram".to_string()
            }
        );
    }

    #[test]
    fn test_lipsync_needs_image_or_video() {
        let graph = Graph::new(
            vec![
                Node::new("voice", "audio").with_param("url", json!("voice.wav")),
                Node::new("sync", "lipsync"),
            ],
            vec![Edge::new("e1", "voice", "audio", "sync", "audio")],
        );
        let err = registry().check_graph(&graph).unwrap_err();
        assert_eq!(
            err,
            EngineError::MissingInput {
                node_id: "sync".to_string(),
                port: "image|video".to_string()
            }
        );
    }

    #[test]
    fn test_lipsync_with_video_passes() {
        let graph = Graph::new(
            vec![
                Node::new("voice", "audio").with_param("url", json!("voice.wav")),
                Node::new("clip", "video").with_param("url", json!("clip.mp4")),
                Node::new("sync", "lipsync"),
            ],
            vec![
                Edge::new("e1", "voice", "audio", "sync", "audio"),
                Edge::new("e2", "clip", "video", "sync", "video"),
            ],
        );
        assert!(registry().check_graph(&graph).is_ok());
    }

    #[test]
    fn test_required_port_supplied_by_parameter() {
        let graph = Graph::new(
            vec![Node::new("t2i", "text_to_image").with_param("prompt", json!("a fox"))],
            vec![],
        );
        assert!(registry().check_graph(&graph).is_ok());

        let graph = Graph::new(vec![Node::new("t2i", "text_to_image")], vec![]);
        assert!(matches!(
            registry().check_graph(&graph),
            Err(EngineError::MissingInput { ref port, .. }) if port == "prompt"
        ));
    }

    #[test]
    fn test_undeclared_ports() {
        let graph = Graph::new(
            vec![
                Node::new("p", "prompt").with_param("text", json!("hi")),
                Node::new("t2i", "text_to_image"),
                Node::new("out", "preview"),
            ],
            vec![
                Edge::new("e1", "p", "words", "t2i", "prompt"),
                Edge::new("e2", "t2i", "image", "out", "anything"),
                Edge::new("e3", "out", "anything", "t2i", "colour"),
            ],
        );
        let Err(EngineError::GraphValidation(errors)) = registry().check_graph(&graph) else {
            panic!("expected port errors");
        };
        let locations: Vec<&str> = errors.iter().map(|e| e.location.as_str()).collect();
        assert_eq!(locations, vec!["edges.e1", "edges.e3"]);
        assert!(errors
            .iter()
            .all(|e| e.kind == ValidationErrorKind::UnknownPort));
    }

    #[test]
    fn test_sink_output_must_be_fed() {
        let graph = Graph::new(
            vec![
                Node::new("p", "prompt").with_param("text", json!("hi")),
                Node::new("t2i", "text_to_image"),
                Node::new("collect", "preview"),
                Node::new("up", "upscale"),
            ],
            vec![
                Edge::new("e1", "p", "text", "t2i", "prompt"),
                Edge::new("e2", "t2i", "image", "collect", "still"),
                Edge::new("e3", "collect", "image", "up", "image"),
            ],
        );
        let Err(EngineError::GraphValidation(errors)) = registry().check_graph(&graph) else {
            panic!("expected port errors");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::UnknownPort);
        assert_eq!(errors[0].location, "edges.e3");
        assert!(errors[0].message.contains("'image'"));

        // Reading the port that is actually fed is fine
        let mut graph = graph;
        graph.edges[2].source_port = "still".to_string();
        assert!(registry().check_graph(&graph).is_ok());
    }
}
