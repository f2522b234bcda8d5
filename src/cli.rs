use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::services::SimulationReport;

#[derive(Parser)]
#[command(name = "sealbatch")]
#[command(version)]
#[command(about = "Commit-reveal batch coordinator for multi-agent swap settlement", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml plus the $SEALBATCH_ENV overlay)
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the coordinator, reveal store and execution poller
    Run {
        /// Force the in-memory settlement backend
        #[arg(long)]
        dry_run: bool,
    },
    /// Drive a full commit, signal, reveal and execute round in memory
    Simulate {
        /// Number of agents to register
        #[arg(short, long, default_value = "3")]
        agents: usize,
        /// Intents committed by each agent
        #[arg(short, long, default_value = "2")]
        intents_per_agent: usize,
        /// Skip countdown, spacing and settle delays
        #[arg(long)]
        fast: bool,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

pub fn print_config_check(config: &AppConfig, result: &Result<(), Vec<String>>) {
    match result {
        Ok(()) => {
            println!("\x1b[32m✓ configuration is valid\x1b[0m");
            println!(
                "  quorum={} window={}ms spacing={}ms poll={}ms",
                config.coordinator.quorum_agents,
                config.coordinator.countdown_window_ms,
                config.reveals.submission_spacing_ms,
                config.execution.poll_interval_ms,
            );
            println!(
                "  agents={} pools={} settlement={}",
                config.agents.len(),
                config.pools.len(),
                config
                    .settlement
                    .endpoint
                    .as_deref()
                    .unwrap_or("simulated"),
            );
        }
        Err(errors) => {
            println!("\x1b[31m✗ configuration has {} error(s)\x1b[0m", errors.len());
            for error in errors {
                println!("  - {}", error);
            }
        }
    }
}

pub fn print_simulation_report(report: &SimulationReport) {
    let stats = &report.stats;
    println!("Pool {}", report.pool_id);
    println!("  commitments:  {}", report.commitments);
    println!(
        "  executions:   {} ({} ok, {} failed, success rate {})",
        stats.total_executions, stats.successful, stats.failed, stats.success_rate
    );
    println!("  reveals:      {}", stats.total_reveals_executed);
    println!("  total cost:   {}", stats.total_cost);
    for batch in &report.batches {
        println!(
            "  batch {} -> {} commitments, cost {}{}",
            batch.tx_ref,
            batch.commitment_hashes.len(),
            batch.cost,
            if batch.with_proofs { " (proofs)" } else { "" },
        );
    }
}
