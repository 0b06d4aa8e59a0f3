//! Attendance tracker CLI library.
//!
//! This crate provides the CLI interface for the attendance tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, TotpAction};
pub use config::{Config, default_config_file};
