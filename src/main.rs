//! GenFlow CLI entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genflow::{
    DryRunCollaborator, EngineConfig, ExecutionController, Graph, NodeEvent, NodeRegistry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "genflow", version, about = "Run AI generation pipeline graphs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a graph without running it
    Validate { graph: PathBuf },
    /// Print the execution order of a graph
    Order { graph: PathBuf },
    /// List registered node kinds
    Kinds,
    /// Run a graph with placeholder generation results
    Run {
        graph: PathBuf,
        /// Engine config file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_concurrency: Option<usize>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::with_builtin_kinds();
    registry.bind_generators(Arc::new(DryRunCollaborator));
    Arc::new(registry)
}

fn load_graph(path: &Path) -> Result<Graph> {
    log::info!("Loading graph from: {}", path.display());
    let graph = Graph::from_file(path)?;
    log::info!("Loaded {} nodes, {} edges", graph.nodes.len(), graph.edges.len());
    Ok(graph)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { graph } => {
            let graph = load_graph(&graph)?;
            let controller = ExecutionController::new(registry(), EngineConfig::default());
            controller.plan(&graph).context("graph is invalid")?;
            println!(
                "Graph is valid: {} nodes, {} edges",
                graph.nodes.len(),
                graph.edges.len()
            );
        }
        Command::Order { graph } => {
            let graph = load_graph(&graph)?;
            let controller = ExecutionController::new(registry(), EngineConfig::default());
            for node_id in controller.plan(&graph)? {
                println!("{}", node_id);
            }
        }
        Command::Kinds => {
            let registry = registry();
            for name in registry.kind_names() {
                if let Some(spec) = registry.spec(name) {
                    let inputs: Vec<String> = spec
                        .inputs
                        .iter()
                        .map(|p| format!("{}:{}{}", p.name, p.port_type, if p.required { "" } else { "?" }))
                        .collect();
                    let outputs: Vec<String> = spec
                        .outputs
                        .iter()
                        .map(|p| format!("{}:{}", p.name, p.port_type))
                        .collect();
                    println!(
                        "{:<16} {:?}  in [{}]  out [{}]",
                        name,
                        spec.role,
                        inputs.join(", "),
                        outputs.join(", ")
                    );
                }
            }
        }
        Command::Run {
            graph,
            config,
            max_concurrency,
            timeout_ms,
            json,
        } => {
            let graph = load_graph(&graph)?;

            let mut engine_config = match config {
                Some(path) => EngineConfig::from_file(&path)?,
                None => EngineConfig::from_env(),
            };
            if let Some(max) = max_concurrency {
                engine_config = engine_config.with_max_concurrent_nodes(max);
            }
            if let Some(ms) = timeout_ms {
                engine_config = engine_config.with_node_timeout_ms(ms);
            }

            let controller = ExecutionController::new(registry(), engine_config);
            let print_event = move |event: NodeEvent| {
                if json {
                    println!("{}", event.to_json_line());
                    return;
                }
                match &event {
                    NodeEvent::Running { node_id } => println!("▶  {}", node_id),
                    NodeEvent::Completed { node_id, output } => {
                        let values: Vec<String> =
                            output.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                        println!("✓  {} {}", node_id, values.join(" "));
                    }
                    NodeEvent::Failed { node_id, error } => println!("✗  {}: {}", node_id, error),
                }
            };

            let report = controller.run(&graph, &print_event).await?;
            if let Some(err) = report.error {
                anyhow::bail!("run aborted: {}", err);
            }
            if !report.is_completed() {
                anyhow::bail!("run aborted before every node completed");
            }
            if !json {
                println!("Run completed: {} nodes", report.records.len());
            }
        }
    }

    Ok(())
}
