//! insight-gateway: Insight Gateway Main Binary
//!
//! Main entry point for the analysis gateway service.
//!
//! Usage:
//!   insight-gateway                  - Start the HTTP API server
//!   insight-gateway --config <path>  - Start with a specific config file
//!   insight-gateway --help           - Show help

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use insight_api::middleware::RateLimiter;
use insight_api::AppState;
use insight_core::agents::{AgentRegistry, register_builtin_agents};
use insight_core::workflow::CustomerSupportWorkflow;
use insight_core::{Config, ExecutionStore, Orchestrator, StatusTracker, WorkflowRegistry};

/// Run mode
enum RunMode {
    /// Server mode (HTTP API)
    Server { config_path: Option<String> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("insight-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { config_path } => {
            // Initialize logging
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
                .init();

            // Load .env file
            dotenvy::dotenv().ok();

            let config = Config::load(config_path.as_deref())
                .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

            run_server(config).await
        }
    }
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            "--config" | "-c" => config_path = iter.next().cloned(),
            _ => {}
        }
    }

    RunMode::Server { config_path }
}

/// Print help message
fn print_help() {
    println!("insight-gateway - Analysis Gateway");
    println!();
    println!("Usage:");
    println!("  insight-gateway                  Start the HTTP API server");
    println!("  insight-gateway --config <path>  Start with a specific config file");
    println!("  insight-gateway --help           Show this help message");
    println!("  insight-gateway --version        Show version");
    println!();
    println!("Environment Variables:");
    println!("  API_PORT          HTTP API port (default: 3000)");
    println!("  API_KEY           API key for HTTP authentication (optional)");
    println!("  DB_PATH           SQLite database path (default: data/insight-gateway.db)");
    println!("  AGENT_TIMEOUT_MS  Per-agent timeout and retry delay (default: 30000)");
    println!("  MAX_RETRIES       Retries per agent (default: 2)");
}

/// Run the HTTP API server with background maintenance
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting insight-gateway...");

    // Execution store
    let store = ExecutionStore::new(&config.storage.db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open execution store: {}", e))?;
    let store = Arc::new(Mutex::new(store));
    tracing::info!("Execution store ready at {}", config.storage.db_path);

    // Status tracker
    let tracker = Arc::new(StatusTracker::new(config.status.retention_secs));

    // Agent registry and orchestrator
    let mut registry = AgentRegistry::new();
    register_builtin_agents(&mut registry);
    tracing::info!(
        "Registered {} agents: {:?}",
        registry.len(),
        registry.kinds()
    );

    let orchestrator = Arc::new(
        Orchestrator::new(
            registry,
            config.orchestration.clone(),
            Arc::clone(&tracker),
        )
        .with_store(Arc::clone(&store)),
    );

    // Workflows
    let mut workflows = WorkflowRegistry::new().with_store(Arc::clone(&store));
    workflows.register(Arc::new(CustomerSupportWorkflow::new()));
    let workflows = Arc::new(workflows);

    let limiter = Arc::new(RateLimiter::new());

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
        workflows,
        tracker: Arc::clone(&tracker),
        limiter: Arc::clone(&limiter),
    };

    // Track running services for graceful shutdown
    let mut service_handles = Vec::new();

    // Background maintenance: evict expired status entries and idle
    // rate-limit windows. The result cache expires passively and has
    // no sweep.
    let sweep_interval = Duration::from_secs(config.status.sweep_interval_secs.max(1));
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            tracker.cleanup().await;
            limiter.cleanup().await;
        }
    });
    service_handles.push(handle);

    // Start HTTP API server
    let api_port = config.server.port;
    let handle = tokio::spawn(async move {
        if let Err(e) = insight_api::start_server(state).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });
    service_handles.push(handle);
    tracing::info!("HTTP API server started on port {}", api_port);

    tracing::info!("insight-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    for handle in service_handles {
        handle.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
