//! Command-line interface for idquery.
//!
//! This module provides the CLI structure and output rendering for the
//! `idq` binary.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, LoadCommand, LookupCommand, OutputFormat, SampleCommand, StatsCommand,
    TerminalCommand,
};

/// idq - Look up user records from tuple-per-line dumps
///
/// Loads `data_part*.txt` style dumps into memory and answers lookups by
/// user ID, suggesting similar IDs on a miss.
#[derive(Debug, Parser)]
#[command(name = "idq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Data file to load, given before the command (repeatable; skips discovery)
    #[arg(short, long, value_name = "FILE")]
    pub data: Vec<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load data files and print the ingestion report
    Load(LoadCommand),

    /// Look up a single user ID
    Lookup(LookupCommand),

    /// Show the first user IDs in the data set
    Sample(SampleCommand),

    /// Show data set statistics
    Stats(StatsCommand),

    /// Interactive lookup terminal
    Terminal(TerminalCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
