//! Data Hub CLI Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Command-line front end for the flow engine:
//!
//! - **Discovery**: list entities and flows of a project (`hub entities`,
//!   `hub flows`, `hub show`)
//! - **Execution**: run a flow with progress reporting (`hub run`)

pub mod commands;
pub mod config;
pub mod error;
pub mod progress;

// Re-export commonly used types
pub use config::HubConfig;
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use hub_flow::FlowType;
use std::path::PathBuf;

/// hub - run data hub flows
#[derive(Parser, Debug)]
#[command(name = "hub")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory (defaults to HUB_PROJECT_DIR, then the current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the entities of the project
    Entities,

    /// List the input and harmonize flows of an entity
    Flows {
        entity: String,
    },

    /// Show how a flow resolves: format, source selection and stages
    Show {
        entity: String,

        flow: String,

        /// Flow type: input or harmonize
        #[arg(short = 't', long = "type", default_value = "harmonize")]
        flow_type: FlowType,

        /// Print the resolved flow as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a flow and wait for it to finish
    Run {
        entity: String,

        flow: String,

        /// Flow type: input or harmonize
        #[arg(short = 't', long = "type", default_value = "harmonize")]
        flow_type: FlowType,

        /// Document URIs fetched per page
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Documents processed concurrently
        #[arg(long)]
        threads: Option<usize>,

        /// Seconds to wait before giving up on the job
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the final job status as JSON
        #[arg(long)]
        json: bool,
    },
}
