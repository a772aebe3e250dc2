//! Data Hub Flow Engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Runs flows, named pipelines of stages, over sets of documents.
//!
//! # Overview
//!
//! - **Resolution**: [`FlowResolver`] finds entities and flows in a project
//!   directory
//! - **Stages**: [`plugin`] resolves stages to compiled Rust stages, Rhai
//!   scripts or identity
//! - **Stores**: [`store`] provides the paged document source a job reads and
//!   the store it writes
//! - **Engine**: [`FlowCoordinator`] submits a flow as a batch job and returns
//!   a [`JobHandle`]; progress reaches a [`JobListener`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hub_flow::{EngineConfig, FlowCoordinator, FlowResolver, FlowType, JobFinishedListener};
//! use hub_flow::plugin::FsPluginStore;
//! use hub_flow::store::FsStore;
//!
//! # async fn run() -> hub_flow::Result<()> {
//! let resolver = FlowResolver::new("./project");
//! let flow = resolver.get_flow("customer", "harmonize-customers", FlowType::Harmonize)?;
//!
//! let coordinator = FlowCoordinator::new(
//!     Arc::new(FsStore::new("./data/staging")),
//!     Arc::new(FsStore::new("./data/final")),
//!     Arc::new(FsPluginStore::new("./project")),
//!     EngineConfig::default(),
//! );
//!
//! let listener = Arc::new(JobFinishedListener::new());
//! coordinator.run_flow(flow, 100, 4, listener.clone())?;
//! let status = listener.wait_for_finish(None).await?;
//! println!("{} succeeded, {} failed", status.succeeded, status.failed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod layout;
pub mod listener;
pub mod pipeline;
pub mod plugin;
pub mod resolver;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{BatchConfig, EngineConfig};
pub use engine::{FlowCoordinator, JobHandle};
pub use error::{FlowError, ListenerError, Result, StageError, StoreError};
pub use flow::{Flow, SourceSelector, StageRef};
pub use listener::{JobFinishedListener, JobListener, ListenerSet, LoggingListener};
pub use resolver::{Entity, FlowResolver};
pub use types::{Document, DocumentFailure, FailureKind, JobState, JobStatus};

pub use hub_common::types::{DataFormat, FlowType, PluginFormat};
