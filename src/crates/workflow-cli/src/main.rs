//! Command-line surface for the workflow engine (§6).
//!
//! `workflow run` loads a graph, resolves its nodes against the built-in
//! demo kinds in [`nodes`], executes it, and exits with the code §6
//! specifies for the outcome. `workflow serve` attaches the WebSocket
//! broadcaster to a running event bus and serves it over HTTP.

mod nodes;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use workflow_config::Settings;
use workflow_events::EventBus;
use workflow_executor::{Executor, InitialInputs};
use workflow_graph::{compile_yaml, summarize, to_dot, Graph, ValidatedGraph};

/// Exit codes (§6).
const EXIT_SUCCESS: i32 = 0;
const EXIT_GRAPH_INVALID: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_RUNTIME_ERROR: i32 = 3;
const EXIT_EMERGENCY_HALTED: i32 = 4;

#[derive(Parser, Debug)]
#[command(name = "workflow")]
#[command(about = "Run or serve a workflow graph", long_about = None)]
struct Args {
    /// Environment preset: development, staging, or production.
    #[arg(long, global = true, default_value = "development")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and execute a graph file.
    Run {
        /// Path to a graph definition (`.json` or `.yaml`/`.yml`).
        graph: PathBuf,

        /// Initial input for a root node, as `node.port=<json value>`. May be
        /// repeated.
        #[arg(long = "input", value_name = "NODE.PORT=VALUE")]
        inputs: Vec<String>,

        /// Print the graph's summary (node/connection counts, provider nodes,
        /// roots, sinks) before executing it.
        #[arg(long)]
        explain: bool,
    },
    /// Serve the WebSocket event broadcaster.
    Serve {
        /// Address to bind the broadcaster's HTTP listener to.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
    /// Validate a graph file and print it as a Graphviz DOT document.
    Graph {
        /// Path to a graph definition (`.json` or `.yaml`/`.yml`).
        graph: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let settings = settings_for(&args.env).apply_env_overrides();

    let code = match args.command {
        Command::Run { graph, inputs, explain } => run_command(settings, graph, inputs, explain).await,
        Command::Serve { addr } => serve_command(settings, addr).await,
        Command::Graph { graph } => graph_command(graph),
    };

    std::process::exit(code);
}

fn settings_for(env: &str) -> Settings {
    match env {
        "staging" => Settings::staging(),
        "production" => Settings::production(),
        _ => Settings::development(),
    }
}

async fn run_command(settings: Settings, graph_path: PathBuf, raw_inputs: Vec<String>, explain: bool) -> i32 {
    let graph = match load_graph(&graph_path) {
        Ok(graph) => graph,
        Err(message) => {
            eprintln!("graph invalid: {message}");
            return EXIT_GRAPH_INVALID;
        }
    };

    let validated: ValidatedGraph = match graph.validate() {
        Ok(validated) => validated,
        Err(e) => {
            eprintln!("graph invalid: {e}");
            return EXIT_GRAPH_INVALID;
        }
    };

    if explain {
        let summary = summarize(&validated);
        eprintln!(
            "graph '{}': {} nodes, {} connections, {} provider node(s): {:?}",
            summary.graph_id, summary.node_count, summary.connection_count,
            summary.provider_node_ids.len(), summary.provider_node_ids,
        );
        eprintln!("roots: {:?}", workflow_graph::root_node_ids(&validated));
        eprintln!("sinks: {:?}", workflow_graph::sink_node_ids(&validated));
    }

    let initial_inputs = match parse_inputs(&raw_inputs) {
        Ok(inputs) => inputs,
        Err(message) => {
            eprintln!("invalid --input: {message}");
            return EXIT_GRAPH_INVALID;
        }
    };

    let infra = match workflow_config::build(settings).await {
        Ok(infra) => infra,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };

    let node_registry = match nodes::builtin_registry().build(&validated) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("configuration error: {e}");
            let _ = infra.close().await;
            return EXIT_CONFIG_ERROR;
        }
    };

    let retry_policy = infra.settings.resilience.retry.to_policy();
    let circuit_breaker_config = infra.settings.resilience.circuit_breaker.to_config();
    let default_timeout = std::time::Duration::from_millis(infra.settings.resilience.default_node_timeout_ms);

    let executor = Executor::new(
        infra.state.clone(),
        infra.events.clone(),
        infra.emergency.clone(),
        default_timeout,
        retry_policy,
        circuit_breaker_config,
    );

    let result = executor
        .execute(&validated, &node_registry, initial_inputs, serde_json::Map::new())
        .await;

    let code = match &result {
        Ok(run_result) => match run_result.status {
            workflow_executor::RunStatus::Completed => EXIT_SUCCESS,
            workflow_executor::RunStatus::Failed => EXIT_RUNTIME_ERROR,
            workflow_executor::RunStatus::Halted => EXIT_EMERGENCY_HALTED,
        },
        Err(_) => EXIT_RUNTIME_ERROR,
    };

    match result {
        Ok(run_result) => {
            let rendered = serde_json::to_string_pretty(&run_result).unwrap_or_default();
            println!("{rendered}");
        }
        Err(e) => eprintln!("runtime error: {e}"),
    }

    let _ = infra.close().await;
    code
}

fn graph_command(graph_path: PathBuf) -> i32 {
    let graph = match load_graph(&graph_path) {
        Ok(graph) => graph,
        Err(message) => {
            eprintln!("graph invalid: {message}");
            return EXIT_GRAPH_INVALID;
        }
    };

    match graph.validate() {
        Ok(validated) => {
            println!("{}", to_dot(&validated));
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("graph invalid: {e}");
            EXIT_GRAPH_INVALID
        }
    }
}

async fn serve_command(settings: Settings, addr: SocketAddr) -> i32 {
    let infra = match workflow_config::build(settings).await {
        Ok(infra) => infra,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };

    let state = workflow_broadcast::BroadcastState::new();
    let subscription = match workflow_broadcast::attach(state.clone(), infra.events.clone()).await {
        Ok(subscription) => subscription,
        Err(e) => {
            eprintln!("runtime error: {e}");
            let _ = infra.close().await;
            return EXIT_RUNTIME_ERROR;
        }
    };

    let router = workflow_broadcast::router(state);
    tracing::info!(%addr, "broadcaster listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("runtime error: failed to bind {addr}: {e}");
            let _ = infra.events.unsubscribe(subscription).await;
            let _ = infra.close().await;
            return EXIT_RUNTIME_ERROR;
        }
    };

    let code = match axum::serve(listener, router).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("runtime error: {e}");
            EXIT_RUNTIME_ERROR
        }
    };

    let _ = infra.events.unsubscribe(subscription).await;
    let _ = infra.close().await;
    code
}

/// Loads a graph definition from `path`, dispatching on extension: `.yaml`
/// and `.yml` go through the named-port authoring sugar, everything else is
/// parsed as the canonical JSON wire format (§6).
fn load_graph(path: &PathBuf) -> Result<Graph, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;

    let is_yaml = matches!(path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"));
    if is_yaml {
        compile_yaml(&contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&contents).map_err(|e| format!("parsing {}: {e}", path.display()))
    }
}

/// Parses `node.port=value` strings into [`InitialInputs`]. `value` is
/// parsed as JSON when possible, falling back to a plain JSON string so
/// `--input feed.symbol=BTC-USD` works without quoting.
fn parse_inputs(raw: &[String]) -> Result<InitialInputs, String> {
    let mut inputs: InitialInputs = HashMap::new();
    for entry in raw {
        let (target, value) = entry.split_once('=').ok_or_else(|| format!("expected 'node.port=value', got '{entry}'"))?;
        let (node, port) = target.split_once('.').ok_or_else(|| format!("expected 'node.port=value', got '{entry}'"))?;
        let parsed: Value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        inputs.entry(node.to_string()).or_default().insert(port.to_string(), parsed);
    }
    Ok(inputs)
}
