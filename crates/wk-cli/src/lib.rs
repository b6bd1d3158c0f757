//! Workclock CLI library.
//!
//! This crate provides the CLI interface for workclock.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, SiteAction, WorkerAction};
pub use config::{Config, parse_utc_offset};
