//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod entities;
pub mod flows;
pub mod run;
pub mod show;
