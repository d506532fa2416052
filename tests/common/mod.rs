//! Shared helpers for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use genflow::{
    Collaborator, EngineConfig, ExecutionController, GenerationRequest, NodeEvent, NodeRegistry,
    OutputBundle, PortType, Value,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the scripted collaborator treats one node
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub delay: Duration,
    pub fail: Option<String>,
}

/// Collaborator whose behaviour is scripted per node ID. Successful calls
/// return `<kind>:<node>` references for every declared output.
#[derive(Default)]
pub struct ScriptedCollaborator {
    scripts: HashMap<String, Script>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, node_id: &str, millis: u64) -> Self {
        self.scripts.entry(node_id.to_string()).or_default().delay = Duration::from_millis(millis);
        self
    }

    pub fn fail(mut self, node_id: &str, message: &str) -> Self {
        self.scripts.entry(node_id.to_string()).or_default().fail = Some(message.to_string());
        self
    }

    pub fn invoked(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.node_id.clone())
            .collect()
    }

    pub fn request(&self, node_id: &str) -> Option<GenerationRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.node_id == node_id)
            .cloned()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl Collaborator for ScriptedCollaborator {
    async fn invoke(&self, request: GenerationRequest) -> anyhow::Result<OutputBundle> {
        let script = self.scripts.get(&request.node_id).cloned().unwrap_or_default();
        self.requests.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(request.node_id.clone());

        if let Some(message) = script.fail {
            anyhow::bail!(message);
        }

        Ok(request
            .outputs
            .iter()
            .map(|port| {
                let reference = format!("{}:{}", request.kind, request.node_id);
                let value = match port.port_type {
                    PortType::Image => Value::Image(reference),
                    PortType::Video => Value::Video(reference),
                    PortType::Audio => Value::Audio(reference),
                    _ => Value::Text(reference),
                };
                (port.name.clone(), value)
            })
            .collect())
    }
}

/// Collaborator that panics before it hands back a future
pub struct PanicsOnCall;

impl Collaborator for PanicsOnCall {
    fn invoke<'life0, 'async_trait>(
        &'life0 self,
        request: GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<OutputBundle>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        Self: 'async_trait,
    {
        panic!("client for {} was never configured", request.node_id)
    }
}

pub fn controller(collaborator: Arc<ScriptedCollaborator>, config: EngineConfig) -> ExecutionController {
    let mut registry = NodeRegistry::with_builtin_kinds();
    registry.bind_generators(collaborator);
    ExecutionController::new(Arc::new(registry), config)
}

/// Status sink that keeps every event
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<NodeEvent>>,
}

impl EventLog {
    pub fn sink(&self) -> impl Fn(NodeEvent) + Send + Sync + '_ {
        move |event| self.events.lock().unwrap().push(event)
    }

    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events as "status:node" strings
    pub fn summary(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| format!("{}:{}", e.status(), e.node_id()))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.summary().iter().position(|s| s == entry)
    }
}
