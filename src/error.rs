//! Engine error types

use std::fmt;
use thiserror::Error;

/// Errors produced while validating, scheduling, or running a graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("graph validation failed: {}", join_errors(.0))]
    GraphValidation(Vec<ValidationError>),

    #[error("cycle detected among nodes: {}", .nodes.join(", "))]
    Cycle { nodes: Vec<String> },

    #[error("node '{node_id}' is missing required input '{port}'")]
    MissingInput { node_id: String, port: String },

    #[error("node '{node_id}' references unknown kind '{kind}'")]
    UnknownKind { node_id: String, kind: String },

    #[error("node '{node_id}' failed: {message}")]
    NodeExecution { node_id: String, message: String },

    #[error("node '{node_id}' timed out after {timeout_ms}ms")]
    Timeout { node_id: String, timeout_ms: u64 },

    #[error("inputs for '{node_id}' requested before upstream '{upstream}' completed")]
    UpstreamIncomplete { node_id: String, upstream: String },

    #[error("node task could not be joined: {message}")]
    TaskJoin { message: String },

    #[error("node '{node_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        node_id: String,
        from: String,
        to: String,
    },
}

impl EngineError {
    /// Structural errors are detected before any node runs
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::GraphValidation(_)
                | Self::Cycle { .. }
                | Self::MissingInput { .. }
                | Self::UnknownKind { .. }
        )
    }

    /// Node the error is attributed to, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::MissingInput { node_id, .. }
            | Self::UnknownKind { node_id, .. }
            | Self::NodeExecution { node_id, .. }
            | Self::Timeout { node_id, .. }
            | Self::UpstreamIncomplete { node_id, .. }
            | Self::InvalidTransition { node_id, .. } => Some(node_id),
            Self::GraphValidation(_) | Self::Cycle { .. } | Self::TaskJoin { .. } => None,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single structural problem found in a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Where the problem is, e.g. "edges.e3" or "nodes.prompt"
    pub location: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    DuplicateId,
    InvalidReference,
    SelfLoop,
    MultipleSources,
    UnknownPort,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DuplicateId => "DUPLICATE_ID",
            Self::InvalidReference => "INVALID_REFERENCE",
            Self::SelfLoop => "SELF_LOOP",
            Self::MultipleSources => "MULTIPLE_SOURCES",
            Self::UnknownPort => "UNKNOWN_PORT",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn duplicate_id(location: impl Into<String>, id: &str) -> Self {
        Self::new(
            ValidationErrorKind::DuplicateId,
            location,
            format!("duplicate identifier '{}'", id),
        )
    }

    pub fn invalid_reference(location: impl Into<String>, reference: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidReference,
            location,
            format!("reference to non-existent node '{}'", reference),
        )
    }
}

/// What went wrong while executing a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeErrorKind {
    Execution,
    Timeout,
    Cancelled,
}

/// Failure of one node, as returned by the node executor
#[derive(Debug, Clone, PartialEq, Error)]
#[error("node '{node_id}': {message}")]
pub struct NodeError {
    pub node_id: String,
    pub kind: NodeErrorKind,
    pub message: String,
    /// Set for timeouts
    pub timeout_ms: Option<u64>,
}

impl NodeError {
    pub fn execution(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            kind: NodeErrorKind::Execution,
            message: message.into(),
            timeout_ms: None,
        }
    }

    pub fn timeout(node_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            node_id: node_id.into(),
            kind: NodeErrorKind::Timeout,
            message: format!("timed out after {}ms", timeout_ms),
            timeout_ms: Some(timeout_ms),
        }
    }

    pub fn cancelled(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            kind: NodeErrorKind::Cancelled,
            message: "cancelled after run aborted".to_string(),
            timeout_ms: None,
        }
    }
}

impl From<NodeError> for EngineError {
    fn from(err: NodeError) -> Self {
        match err.kind {
            NodeErrorKind::Timeout => EngineError::Timeout {
                node_id: err.node_id,
                timeout_ms: err.timeout_ms.unwrap_or_default(),
            },
            NodeErrorKind::Execution | NodeErrorKind::Cancelled => EngineError::NodeExecution {
                node_id: err.node_id,
                message: err.message,
            },
        }
    }
}
