//! hub CLI - Main entry point

use anyhow::Context;
use clap::Parser;
use hub_cli::config::Overrides;
use hub_cli::{Cli, Commands, HubConfig};
use hub_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Verbose mode logs debug to the console; otherwise only warnings
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("hub-cli")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    let mut config = HubConfig::load(cli.project.clone()).context("Failed to load configuration")?;

    match &cli.command {
        Commands::Entities => hub_cli::commands::entities::run(&config).await?,

        Commands::Flows { entity } => hub_cli::commands::flows::run(&config, entity).await?,

        Commands::Show {
            entity,
            flow,
            flow_type,
            json,
        } => hub_cli::commands::show::run(&config, entity, flow, *flow_type, *json).await?,

        Commands::Run {
            entity,
            flow,
            flow_type,
            batch_size,
            threads,
            timeout,
            json,
        } => {
            config.apply(&Overrides {
                batch_size: *batch_size,
                thread_count: *threads,
                wait_timeout_secs: *timeout,
            });
            hub_cli::commands::run::run(&config, entity, flow, *flow_type, *json).await?;
        }
    }

    Ok(())
}
