//! Graph model - nodes, edges, and structural validation

use crate::error::{ValidationError, ValidationErrorKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Node parameters, as supplied by the editor
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Pipeline graph - an immutable snapshot once a run starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
}

/// Connection from one node's output port to another node's input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            parameters: Parameters::new(),
        }
    }

    /// Set a parameter
    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        }
    }
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Load graph from a YAML or JSON file (picked by extension)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read graph file {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let graph = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };
        graph.with_context(|| format!("failed to parse graph file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Get node by ID
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Edges ending at the given node
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Edges starting at the given node
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Check the graph's shape. Reports every violation found, in graph order.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut node_ids: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                errors.push(ValidationError::duplicate_id(
                    format!("nodes.{}", node.id),
                    &node.id,
                ));
            }
        }

        let mut edge_ids: HashSet<&str> = HashSet::new();
        // (target node, target port) -> first edge feeding it
        let mut port_sources: HashMap<(&str, &str), &str> = HashMap::new();

        for edge in &self.edges {
            let location = format!("edges.{}", edge.id);

            if !edge_ids.insert(edge.id.as_str()) {
                errors.push(ValidationError::duplicate_id(&location, &edge.id));
            }
            if !node_ids.contains(edge.source.as_str()) {
                errors.push(ValidationError::invalid_reference(&location, &edge.source));
            }
            if !node_ids.contains(edge.target.as_str()) {
                errors.push(ValidationError::invalid_reference(&location, &edge.target));
            }
            if edge.source == edge.target {
                errors.push(ValidationError::new(
                    ValidationErrorKind::SelfLoop,
                    &location,
                    format!("node '{}' is connected to itself", edge.source),
                ));
            }

            let key = (edge.target.as_str(), edge.target_port.as_str());
            if let Some(first) = port_sources.get(&key) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MultipleSources,
                    &location,
                    format!(
                        "port '{}.{}' is already fed by edge '{}'",
                        edge.target, edge.target_port, first
                    ),
                ));
            } else {
                port_sources.insert(key, edge.id.as_str());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
