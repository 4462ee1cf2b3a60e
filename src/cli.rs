//! Command-line interface parsing
//!
//! A thin diagnostic surface over the library: each subcommand drives one
//! service end-to-end and prints the result as JSON.

use clap::{Parser, Subcommand};

/// Fleetwatch - camera fleet dashboard diagnostics
#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(about = "Camera fleet dashboard diagnostics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show pre-computed fleet statistics from the VMS listings
    Stats,

    /// Show the aggregated hardware-health summary from the cloud API
    Health,

    /// Inspect or manage the cloud bearer token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Ask the external token harvester to fetch a fresh token now
    RefreshToken,

    /// Verify VMS login and harvester liveness
    Check,
}

/// Token management actions
#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Report token and cached-data state
    Status,

    /// Submit a newly harvested bearer token
    Set {
        /// The raw bearer token string
        token: String,
    },

    /// Drop the stored token
    Clear,
}
