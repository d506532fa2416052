//! Execution records - per-node state for a single run

use super::value::OutputBundle;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Node lifecycle: pending -> running -> completed | error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl NodeStatus {
    /// Transitions only move forward and are never revisited
    pub fn can_transition_to(&self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// State of one node within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub node_id: String,
    pub status: NodeStatus,
    pub output: Option<OutputBundle>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    fn new(node_id: String) -> Self {
        Self {
            node_id,
            status: NodeStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// The record set for one run. Owned by the execution controller, which is
/// the only writer.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRecords {
    order: Vec<String>,
    records: HashMap<String, ExecutionRecord>,
}

impl ExecutionRecords {
    /// Create all records as pending
    pub fn new<I, S>(node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order = Vec::new();
        let mut records = HashMap::new();
        for id in node_ids {
            let id = id.into();
            records.insert(id.clone(), ExecutionRecord::new(id.clone()));
            order.push(id);
        }
        Self { order, records }
    }

    pub fn get(&self, node_id: &str) -> Option<&ExecutionRecord> {
        self.records.get(node_id)
    }

    pub fn status(&self, node_id: &str) -> Option<NodeStatus> {
        self.records.get(node_id).map(|r| r.status)
    }

    /// Mark a pending node as running
    pub fn start(&mut self, node_id: &str) -> Result<(), EngineError> {
        let record = self.transition(node_id, NodeStatus::Running)?;
        record.started_at = Some(Utc::now());
        Ok(())
    }

    /// Store the output of a running node
    pub fn complete(&mut self, node_id: &str, output: OutputBundle) -> Result<(), EngineError> {
        let record = self.transition(node_id, NodeStatus::Completed)?;
        record.output = Some(output);
        record.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Store the error of a running node
    pub fn fail(&mut self, node_id: &str, error: impl Into<String>) -> Result<(), EngineError> {
        let record = self.transition(node_id, NodeStatus::Error)?;
        record.error = Some(error.into());
        record.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Node IDs currently running, in record order
    pub fn running(&self) -> Vec<String> {
        self.with_status(NodeStatus::Running)
    }

    pub fn with_status(&self, status: NodeStatus) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.status(id) == Some(status))
            .cloned()
            .collect()
    }

    pub fn all_completed(&self) -> bool {
        self.records
            .values()
            .all(|r| r.status == NodeStatus::Completed)
    }

    /// Consume the set, yielding records in creation order
    pub fn into_vec(mut self) -> Vec<ExecutionRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect()
    }

    fn transition(
        &mut self,
        node_id: &str,
        next: NodeStatus,
    ) -> Result<&mut ExecutionRecord, EngineError> {
        let record = self
            .records
            .get_mut(node_id)
            .ok_or_else(|| EngineError::InvalidTransition {
                node_id: node_id.to_string(),
                from: "missing".to_string(),
                to: next.to_string(),
            })?;

        if !record.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                node_id: node_id.to_string(),
                from: record.status.to_string(),
                to: next.to_string(),
            });
        }

        record.status = next;
        Ok(record)
    }
}
