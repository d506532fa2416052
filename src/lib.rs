//! GenFlow - graph execution engine for AI content-generation pipelines
//!
//! A pipeline is a graph of typed nodes (sources, generation steps, sinks)
//! connected port to port. The engine validates the graph, orders it
//! topologically, wires each node's inputs from upstream outputs, dispatches
//! nodes to their kind's handler and reports per-node status as it goes.

pub mod collaborator;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod kinds;

// Re-exports
pub use collaborator::{Collaborator, DryRunCollaborator, GenerationRequest};
pub use config::EngineConfig;
pub use crate::core::{
    Edge, ExecutionController, ExecutionRecord, Graph, Node, NodeExecutor, NodeStatus,
    OutputBundle, PortType, RunReport, RunStatus, Scheduler, Value,
};
pub use error::{EngineError, NodeError, NodeErrorKind, ValidationError, ValidationErrorKind};
pub use events::{ChannelSink, EventStream, NodeEvent, NoopSink, StatusSink};
pub use kinds::{KindRole, KindSpec, NodeRegistry, PortSpec};

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
