//! `hub run` command implementation
//!
//! INPUT flows read the input directory and write the staging store;
//! HARMONIZE flows read staging and write the final store.

use colored::Colorize;
use hub_flow::plugin::FsPluginStore;
use hub_flow::store::FsStore;
use hub_flow::{
    FlowCoordinator, FlowError, FlowResolver, FlowType, JobFinishedListener, JobState, JobStatus,
    ListenerSet, LoggingListener,
};
use std::sync::Arc;

use crate::config::HubConfig;
use crate::error::{CliError, Result};
use crate::progress::{summary, ProgressListener};

/// Failed documents printed after a run
const MAX_REPORTED_FAILURES: usize = 20;

/// Run a flow to completion. Ctrl-C stops the job after in-flight documents
/// finish.
pub async fn run(
    config: &HubConfig,
    entity: &str,
    flow: &str,
    flow_type: FlowType,
    json: bool,
) -> Result<JobStatus> {
    config.validate()?;

    let flow = FlowResolver::new(&config.project_dir).get_flow(entity, flow, flow_type)?;
    let (source_dir, destination_dir) = config.stores_for(flow_type);
    tokio::fs::create_dir_all(&destination_dir).await?;

    tracing::info!(
        flow = %flow.qualified_name(),
        source = %source_dir.display(),
        destination = %destination_dir.display(),
        "Running flow"
    );

    let engine = config.engine_config();
    let plugins = FsPluginStore::new(&config.project_dir).with_max_operations(engine.script_max_operations);
    let coordinator = FlowCoordinator::new(
        Arc::new(FsStore::new(source_dir)),
        Arc::new(FsStore::new(destination_dir)),
        Arc::new(plugins),
        engine,
    );

    let waiter = Arc::new(JobFinishedListener::new());
    let mut listeners = ListenerSet::new().with(Arc::new(LoggingListener));
    if !json {
        listeners.push(Arc::new(ProgressListener::new(&flow.name)));
    }
    listeners.push(waiter.clone());

    let handle = coordinator.run_flow(flow, config.batch_size, config.thread_count, Arc::new(listeners))?;

    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Stopping after in-flight documents finish...");
                handle.stop();
            }
        })
    };

    let outcome = waiter.wait_for_finish(config.wait_timeout()).await;
    interrupt.abort();

    let status = match outcome {
        Ok(status) => status,
        Err(FlowError::Timeout(limit)) => {
            handle.stop();
            return Err(CliError::Timeout(limit.as_secs()));
        }
        Err(e) => {
            if let Some(status) = waiter.final_status() {
                report(&status, json)?;
            }
            return Err(e.into());
        }
    };

    report(&status, json)?;
    Ok(status)
}

fn report(status: &JobStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    let headline = format!("{} {}: {}", status.flow_name, status.state, summary(status));
    match status.state {
        JobState::Completed if status.failed == 0 => println!("{}", headline.green()),
        JobState::Failed => println!("{}", headline.red().bold()),
        _ => println!("{}", headline.yellow()),
    }

    if let Some(reason) = &status.fatal_error {
        println!("  {} {}", "Error:".red(), reason);
    }

    for (uri, failure) in status.errors_by_uri.iter().take(MAX_REPORTED_FAILURES) {
        println!("  {} {}", uri, failure.to_string().dimmed());
    }
    if status.errors_by_uri.len() > MAX_REPORTED_FAILURES {
        println!(
            "  ... and {} more",
            status.errors_by_uri.len() - MAX_REPORTED_FAILURES
        );
    }
    Ok(())
}
