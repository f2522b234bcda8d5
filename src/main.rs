use clap::Parser;
use sealbatch::cli::{self, Cli, Commands};
use sealbatch::config::AppConfig;
use sealbatch::coordinator::ReadinessCoordinator;
use sealbatch::domain::ReadinessMessage;
use sealbatch::error::{Result, SealError};
use sealbatch::execution::BatchExecutionEngine;
use sealbatch::logging;
use sealbatch::reveal::RevealStore;
use sealbatch::services::{
    run_simulation, spawn_signal_listener, BatchPipeline, SimulationOptions,
};
use sealbatch::settlement::build_settlement_client;
use std::io::BufRead;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => {
            logging::init_quiet();
            let config = AppConfig::load_from(&cli.config)?;
            let result = config.validate();
            cli::print_config_check(&config, &result);
            result.map_err(SealError::InvalidConfig)?;
        }
        Some(Commands::Simulate {
            agents,
            intents_per_agent,
            fast,
        }) => {
            let config = load_validated(&cli.config)?;
            let _log_guard = logging::init(&config.logging);
            let options = SimulationOptions {
                agents: *agents,
                intents_per_agent: *intents_per_agent,
                fast: *fast,
            };
            let report = run_simulation(&config, &options).await?;
            cli::print_simulation_report(&report);
        }
        Some(Commands::Run { dry_run }) => {
            let mut config = load_validated(&cli.config)?;
            config.settlement.dry_run |= *dry_run;
            let _log_guard = logging::init(&config.logging);
            run(config).await?;
        }
        None => {
            let config = load_validated(&cli.config)?;
            let _log_guard = logging::init(&config.logging);
            run(config).await?;
        }
    }

    Ok(())
}

fn load_validated(config_dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(config_dir)?;
    config.validate().map_err(SealError::InvalidConfig)?;
    Ok(config)
}

async fn run(config: AppConfig) -> Result<()> {
    info!("Starting sealbatch");

    let client = build_settlement_client(&config.settlement)?;
    info!("Settlement backend: {}", client.kind());

    let reveals = Arc::new(RevealStore::new(
        client.clone(),
        config.reveals.submission_spacing(),
    ));
    let engine = BatchExecutionEngine::new(client, reveals, config.execution.clone());
    for pool in &config.pools {
        engine.add_pool(pool.pool_key, pool.pool_id()).await;
    }

    let coordinator = ReadinessCoordinator::new(config.coordinator.clone());
    for agent in &config.agents {
        coordinator.register_agent(agent.clone()).await;
    }

    let pipeline = BatchPipeline::new(
        coordinator.clone(),
        engine.clone(),
        config.execution.with_proofs,
    )
    .await;
    pipeline.start(config.execution.poll_interval()).await;

    let (bus, _) = broadcast::channel::<ReadinessMessage>(256);
    let listener = spawn_signal_listener(coordinator.clone(), bus.subscribe());
    spawn_stdin_reader(bus.clone())?;

    info!(
        "Monitoring {} pool(s) for {} agent(s); readiness messages are read from stdin as JSON lines",
        config.pools.len(),
        config.agents.len()
    );

    shutdown_signal().await;
    info!("Shutdown signal received");

    // The stdin thread may still hold a sender, so stop the listener directly
    listener.abort();
    drop(bus);
    pipeline.shutdown().await;

    let stats = engine.stats().await;
    info!(
        "Executed {} batch(es): {} ok, {} failed, success rate {}",
        stats.total_executions, stats.successful, stats.failed, stats.success_rate
    );
    Ok(())
}

/// Publish newline-delimited JSON readiness messages from stdin onto the bus.
///
/// Runs on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_reader(bus: broadcast::Sender<ReadinessMessage>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin-signals".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        return;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ReadinessMessage>(line) {
                    Ok(message) => {
                        if bus.send(message).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed readiness message: {}", e),
                }
            }
            info!("stdin closed, no further readiness messages");
        })
        .map(|_| ())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
