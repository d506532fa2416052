//! Execution Controller - drives one run of a pipeline graph
//!
//! The controller validates the graph, asks the scheduler for an order, then
//! dispatches nodes whose upstream nodes have all completed. Independent
//! branches run concurrently, bounded by a semaphore. The first node failure
//! aborts the run: in-flight siblings are cancelled and nothing new starts.
//!
//! The record set and the status sink are only touched from the controller
//! loop, so every node has a single writer and events arrive in order.

use super::executor::NodeExecutor;
use super::graph::{Graph, Node};
use super::record::{ExecutionRecord, ExecutionRecords, NodeStatus};
use super::resolver::resolve_inputs;
use super::scheduler::Scheduler;
use super::value::{InputBundle, OutputBundle};
use crate::config::EngineConfig;
use crate::error::{EngineError, NodeError};
use crate::events::{NodeEvent, StatusSink};
use crate::kinds::NodeRegistry;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted,
}

/// What a run leaves behind for the caller. The engine keeps no copy.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    /// Execution order computed by the scheduler
    pub order: Vec<String>,
    /// One record per node, in execution order
    pub records: Vec<ExecutionRecord>,
    /// First error encountered, set when the run aborted
    pub error: Option<EngineError>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn record(&self, node_id: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.node_id == node_id)
    }

    pub fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.record(node_id).map(|r| r.status)
    }

    pub fn output(&self, node_id: &str) -> Option<&OutputBundle> {
        self.record(node_id).and_then(|r| r.output.as_ref())
    }
}

struct NodeOutcome {
    node_id: String,
    result: Result<OutputBundle, NodeError>,
}

/// Mutable state of one run. Only the controller loop touches it.
struct RunState<'g> {
    graph: &'g Graph,
    order: Vec<String>,
    /// Snapshot: tasks own their node, later edits to the caller's graph
    /// cannot reach a running node.
    nodes: HashMap<String, Arc<Node>>,
    semaphore: Arc<Semaphore>,
    records: ExecutionRecords,
    tasks: JoinSet<NodeOutcome>,
    first_error: Option<EngineError>,
}

impl<'g> RunState<'g> {
    fn new(graph: &'g Graph, order: Vec<String>, max_concurrent_nodes: usize) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| (n.id.clone(), Arc::new(n.clone())))
            .collect();
        let records = ExecutionRecords::new(order.iter().cloned());

        Self {
            graph,
            order,
            nodes,
            semaphore: Arc::new(Semaphore::new(max_concurrent_nodes)),
            records,
            tasks: JoinSet::new(),
            first_error: None,
        }
    }

    fn is_aborted(&self) -> bool {
        self.first_error.is_some()
    }

    /// Record a finished node and report it
    fn finish(&mut self, outcome: NodeOutcome, sink: &dyn StatusSink) -> Result<(), EngineError> {
        match outcome.result {
            Ok(output) => {
                log::info!("Node {} completed", outcome.node_id);
                self.records.complete(&outcome.node_id, output.clone())?;
                sink.emit(NodeEvent::Completed {
                    node_id: outcome.node_id,
                    output,
                });
            }
            Err(err) => {
                log::warn!("Node {} failed: {}", outcome.node_id, err.message);
                self.fail(&outcome.node_id, err.message.clone(), sink)?;
                self.first_error.get_or_insert_with(|| err.into());
            }
        }
        Ok(())
    }

    fn fail(&mut self, node_id: &str, message: String, sink: &dyn StatusSink) -> Result<(), EngineError> {
        self.records.fail(node_id, message.clone())?;
        sink.emit(NodeEvent::Failed {
            node_id: node_id.to_string(),
            error: message,
        });
        Ok(())
    }

    /// Abort every in-flight task and mark its node as cancelled. Results
    /// that were already sitting in the join set are discarded.
    fn cancel_in_flight(&mut self, sink: &dyn StatusSink) -> Result<(), EngineError> {
        self.tasks.abort_all();

        for node_id in self.records.running() {
            log::info!("Cancelling in-flight node {}", node_id);
            let err = NodeError::cancelled(&node_id);
            self.fail(&node_id, err.message, sink)?;
        }

        Ok(())
    }
}

/// Runs graphs against a node registry
#[derive(Clone)]
pub struct ExecutionController {
    executor: NodeExecutor,
    config: EngineConfig,
}

impl ExecutionController {
    /// A concurrency limit of 0 is raised to 1
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        let max = config.max_concurrent_nodes;
        Self {
            executor: NodeExecutor::new(registry),
            config: config.with_max_concurrent_nodes(max),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// All pre-run checks: shape, kinds and required inputs, then ordering.
    /// Returns the execution order.
    pub fn plan(&self, graph: &Graph) -> Result<Vec<String>, EngineError> {
        graph.validate().map_err(EngineError::GraphValidation)?;
        self.executor.registry().check_graph(graph)?;
        Scheduler::order_ids(graph)
    }

    /// Run the graph to completion or abort.
    ///
    /// Structural problems are returned as `Err` before any node runs.
    /// Runtime failures produce an `Aborted` report carrying the first error.
    pub async fn run(&self, graph: &Graph, sink: &dyn StatusSink) -> Result<RunReport, EngineError> {
        let order = self.plan(graph)?;

        log::info!(
            "Starting run: {} nodes, concurrency {}, timeout {:?}",
            order.len(),
            self.config.max_concurrent_nodes,
            self.config.node_timeout_ms
        );

        let mut state = RunState::new(graph, order, self.config.max_concurrent_nodes);

        loop {
            if !state.is_aborted() {
                self.dispatch_ready(&mut state, sink)?;
            }

            if state.is_aborted() || state.tasks.is_empty() {
                break;
            }

            let Some(joined) = state.tasks.join_next().await else {
                break;
            };

            match joined {
                Ok(outcome) => state.finish(outcome, sink)?,
                Err(join_error) => {
                    // Node tasks catch their own panics; anything else here
                    // still stops the run.
                    log::error!("Node task join error: {}", join_error);
                    state.first_error.get_or_insert_with(|| EngineError::TaskJoin {
                        message: join_error.to_string(),
                    });
                }
            }
        }

        if state.is_aborted() {
            state.cancel_in_flight(sink)?;
        }

        // Tasks that ended without reporting leave their node running
        for node_id in state.records.running() {
            let err = NodeError::execution(&node_id, "node task ended without a result");
            state.fail(&node_id, err.message.clone(), sink)?;
            state.first_error.get_or_insert_with(|| err.into());
        }

        let RunState {
            order,
            records,
            first_error,
            ..
        } = state;

        let status = if first_error.is_none() && records.all_completed() {
            RunStatus::Completed
        } else {
            RunStatus::Aborted
        };

        match &first_error {
            None => log::info!("Run completed: {} nodes", order.len()),
            Some(err) => log::warn!(
                "Run aborted: {} ({} nodes never started)",
                err,
                records.with_status(NodeStatus::Pending).len()
            ),
        }

        Ok(RunReport {
            status,
            order,
            records: records.into_vec(),
            error: first_error,
        })
    }

    /// Start every pending node whose upstream nodes have all completed, in
    /// scheduler order, while permits remain.
    fn dispatch_ready(&self, state: &mut RunState<'_>, sink: &dyn StatusSink) -> Result<(), EngineError> {
        let graph = state.graph;

        for node_id in state.order.clone() {
            if state.records.status(&node_id) != Some(NodeStatus::Pending) {
                continue;
            }
            let ready = graph
                .incoming(&node_id)
                .all(|e| state.records.status(&e.source) == Some(NodeStatus::Completed));
            if !ready {
                continue;
            }

            let Ok(permit) = Arc::clone(&state.semaphore).try_acquire_owned() else {
                // Concurrency limit reached; retry after the next completion
                break;
            };

            let Some(node) = state.nodes.get(&node_id).cloned() else {
                log::error!("Scheduled node {} is not in the graph snapshot", node_id);
                continue;
            };

            state.records.start(&node_id)?;
            sink.emit(NodeEvent::Running {
                node_id: node_id.clone(),
            });

            let inputs = match resolve_inputs(&node_id, &graph.edges, &state.records) {
                Ok(inputs) => inputs,
                Err(err) => {
                    log::error!("Input resolution failed for {}: {}", node_id, err);
                    state.fail(&node_id, err.to_string(), sink)?;
                    state.first_error = Some(err);
                    return Ok(());
                }
            };

            log::debug!("Dispatching {} ({}) with {} inputs", node.id, node.kind, inputs.len());

            let executor = self.executor.clone();
            let timeout = self.config.node_timeout();

            state.tasks.spawn(async move {
                let _permit = permit;
                let result = AssertUnwindSafe(execute_node(&executor, &node, inputs, timeout))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(NodeError::execution(&node.id, "node panicked")));

                NodeOutcome {
                    node_id: node.id.clone(),
                    result,
                }
            });
        }

        Ok(())
    }
}

/// Execute one node, bounded by the optional timeout
async fn execute_node(
    executor: &NodeExecutor,
    node: &Node,
    inputs: InputBundle,
    timeout: Option<Duration>,
) -> Result<OutputBundle, NodeError> {
    let execution = executor.execute(node, inputs);
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, execution).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::timeout(&node.id, limit.as_millis() as u64)),
        },
        None => execution.await,
    }
}
