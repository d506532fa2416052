//! Engine configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_MAX_CONCURRENT_NODES: usize = 4;

/// Run-level settings for the execution controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nodes executing at once. 1 runs the graph strictly in order.
    pub max_concurrent_nodes: usize,
    /// Per-node timeout in milliseconds. `None` waits indefinitely.
    pub node_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_nodes: DEFAULT_MAX_CONCURRENT_NODES,
            node_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Read `GENFLOW_MAX_CONCURRENT_NODES` and `GENFLOW_NODE_TIMEOUT_MS`,
    /// falling back to defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let max_concurrent_nodes = std::env::var("GENFLOW_MAX_CONCURRENT_NODES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENT_NODES);

        let node_timeout_ms = std::env::var("GENFLOW_NODE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        Self::default()
            .with_max_concurrent_nodes(max_concurrent_nodes)
            .with_node_timeout(node_timeout_ms)
    }

    /// Load from a YAML file; missing fields take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        let max = config.max_concurrent_nodes;
        Ok(config.with_max_concurrent_nodes(max))
    }

    pub fn with_max_concurrent_nodes(mut self, max: usize) -> Self {
        self.max_concurrent_nodes = max.max(1);
        self
    }

    pub fn with_node_timeout_ms(self, timeout_ms: u64) -> Self {
        self.with_node_timeout(Some(timeout_ms))
    }

    fn with_node_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.node_timeout_ms = timeout_ms;
        self
    }

    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_nodes, 4);
        assert!(config.node_timeout().is_none());
    }

    #[test]
    fn test_builder_clamps_concurrency() {
        let config = EngineConfig::default()
            .with_max_concurrent_nodes(0)
            .with_node_timeout_ms(1500);
        assert_eq!(config.max_concurrent_nodes, 1);
        assert_eq!(config.node_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "node_timeout_ms: 30000").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_concurrent_nodes, 4);
        assert_eq!(config.node_timeout_ms, Some(30_000));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("GENFLOW_MAX_CONCURRENT_NODES", "0");
        std::env::set_var("GENFLOW_NODE_TIMEOUT_MS", "2500");
        let config = EngineConfig::from_env();
        assert_eq!(config.max_concurrent_nodes, 1);
        assert_eq!(config.node_timeout_ms, Some(2500));

        std::env::set_var("GENFLOW_MAX_CONCURRENT_NODES", "lots");
        std::env::remove_var("GENFLOW_NODE_TIMEOUT_MS");
        let config = EngineConfig::from_env();
        assert_eq!(config, EngineConfig::default());

        std::env::remove_var("GENFLOW_MAX_CONCURRENT_NODES");
    }

    #[test]
    fn test_from_file_missing() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/genflow.yml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
