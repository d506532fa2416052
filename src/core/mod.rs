//! Core engine - graph model, scheduling, input wiring, node execution

mod controller;
mod executor;
mod graph;
mod record;
mod resolver;
mod scheduler;
mod value;

pub use controller::{ExecutionController, RunReport, RunStatus};
pub use executor::NodeExecutor;
pub use graph::{Edge, Graph, Node, Parameters};
pub use record::{ExecutionRecord, ExecutionRecords, NodeStatus};
pub use resolver::resolve_inputs;
pub use scheduler::Scheduler;
pub use value::{Bundle, InputBundle, OutputBundle, PortType, Value};
