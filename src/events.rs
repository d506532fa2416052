//! Node status events
//!
//! JSON-serializable lifecycle events, delivered to whatever sink the caller
//! registers (a closure, a channel, or a broadcast stream for several UIs).

use crate::core::{NodeStatus, OutputBundle};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

/// Lifecycle transition of a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// Node was dispatched
    Running { node_id: String },
    /// Node finished with an output bundle
    Completed {
        node_id: String,
        output: OutputBundle,
    },
    /// Node failed or was cancelled
    Failed { node_id: String, error: String },
}

impl NodeEvent {
    pub fn node_id(&self) -> &str {
        match self {
            Self::Running { node_id }
            | Self::Completed { node_id, .. }
            | Self::Failed { node_id, .. } => node_id,
        }
    }

    /// Status the node moved to
    pub fn status(&self) -> NodeStatus {
        match self {
            Self::Running { .. } => NodeStatus::Running,
            Self::Completed { .. } => NodeStatus::Completed,
            Self::Failed { .. } => NodeStatus::Error,
        }
    }

    pub fn output(&self) -> Option<&OutputBundle> {
        match self {
            Self::Completed { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Serialize to JSON line
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receiver of status events. Called synchronously, in event order.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: NodeEvent);
}

/// Sink that discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl StatusSink for NoopSink {
    fn emit(&self, _event: NodeEvent) {}
}

impl<F> StatusSink for F
where
    F: Fn(NodeEvent) + Send + Sync,
{
    fn emit(&self, event: NodeEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NodeEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn emit(&self, event: NodeEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Status receiver dropped");
        }
    }
}

/// Broadcast-based event stream for multiple consumers
pub struct EventStream {
    tx: broadcast::Sender<NodeEvent>,
}

impl EventStream {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StatusSink for EventStream {
    fn emit(&self, event: NodeEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use std::sync::Mutex;

    #[test]
    fn test_event_serialization() {
        let event = NodeEvent::Running {
            node_id: "t2i".to_string(),
        };
        let json = event.to_json_line();
        assert!(json.contains("\"type\":\"running\""));
        assert!(json.contains("t2i"));

        let mut output = OutputBundle::new();
        output.insert("image".to_string(), Value::Image("cat.png".to_string()));
        let event = NodeEvent::Completed {
            node_id: "t2i".to_string(),
            output,
        };
        let parsed: NodeEvent = serde_json::from_str(&event.to_json_line()).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.status(), NodeStatus::Completed);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: NodeEvent| seen.lock().unwrap().push(event.node_id().to_string());
        sink.emit(NodeEvent::Failed {
            node_id: "a".to_string(),
            error: "boom".to_string(),
        });
        assert_eq!(*seen.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_channel_sink() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(NodeEvent::Running {
            node_id: "a".to_string(),
        });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.status(), NodeStatus::Running);
        assert_eq!(event.error(), None);
    }

    #[test]
    fn test_broadcast_sink() {
        let stream = EventStream::default();
        let mut first = stream.subscribe();
        let mut second = stream.subscribe();

        stream.emit(NodeEvent::Failed {
            node_id: "a".to_string(),
            error: "boom".to_string(),
        });

        assert_eq!(first.try_recv().unwrap().error(), Some("boom"));
        assert_eq!(second.try_recv().unwrap().node_id(), "a");
    }
}
