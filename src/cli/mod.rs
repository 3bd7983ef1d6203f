//! CLI-specific functionality for the member client
//!
//! This module contains all CLI-related code including argument parsing
//! and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, Commands, ExecutionMode};
pub use config::ConfigDiscovery;
