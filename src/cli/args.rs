//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `login`: Log in with an id number and phone
//! - `logout`: End the session locally and on the server
//! - `whoami`: Restore the saved session and print the member
//! - `refresh`: Re-fetch the member record
//! - `overview`, `subscriptions`, `payments`, `invoices`, `check-ins`, `offers`:
//!   Read member data
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default user configuration file

use crate::api::LoginCredentials;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionMode {
    Login(LoginCredentials),
    Logout,
    WhoAmI,
    Refresh,
    Overview,
    Subscriptions,
    Payments,
    Invoices,
    CheckIns,
    Offers,
    ShowConfig,
    InitConfig,
}

#[derive(Debug, Parser)]
#[command(name = "memberlink")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command line client for the gym member backend")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in with member credentials
    Login {
        /// National id number the member registered with
        #[arg(long = "id-number")]
        id_number: String,
        /// Phone number the member registered with
        #[arg(long = "phone")]
        phone: String,
    },
    /// Log out of the current session
    Logout,
    /// Show the member of the saved session
    #[command(name = "whoami")]
    WhoAmI,
    /// Re-fetch the member record from the server
    Refresh,
    /// Show the active subscription and its plan
    Overview,
    /// List subscriptions
    Subscriptions,
    /// List payments
    Payments,
    /// List invoices
    Invoices,
    /// List recent check-ins
    CheckIns,
    /// List current offers
    Offers,
    /// Show configuration discovery information
    ShowConfig,
    /// Create a default configuration file in the home directory
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Login { id_number, phone }) => {
                let id_number = id_number.trim();
                let phone = phone.trim();
                if id_number.is_empty() || phone.is_empty() {
                    return Err("Both --id-number and --phone are required".to_string());
                }
                Ok(ExecutionMode::Login(LoginCredentials {
                    id_number: id_number.to_string(),
                    phone: phone.to_string(),
                }))
            }
            Some(Commands::Logout) => Ok(ExecutionMode::Logout),
            Some(Commands::WhoAmI) => Ok(ExecutionMode::WhoAmI),
            Some(Commands::Refresh) => Ok(ExecutionMode::Refresh),
            Some(Commands::Overview) => Ok(ExecutionMode::Overview),
            Some(Commands::Subscriptions) => Ok(ExecutionMode::Subscriptions),
            Some(Commands::Payments) => Ok(ExecutionMode::Payments),
            Some(Commands::Invoices) => Ok(ExecutionMode::Invoices),
            Some(Commands::CheckIns) => Ok(ExecutionMode::CheckIns),
            Some(Commands::Offers) => Ok(ExecutionMode::Offers),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'memberlink --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}
