//! Command-line interface for caltrack.
//!
//! This module provides the CLI structure for the `caltrack` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    AddCommand, CheckCommand, ConfigCommand, EditCommand, IdCommand, ListCommand, OutputFormat,
};

/// caltrack - Track transducer calibration expiry
///
/// Keeps a CSV register of measurement transducers, shows how many days each
/// has left before its calibration expires, and sends alerts for the ones
/// about to expire.
#[derive(Debug, Parser)]
#[command(name = "caltrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

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
    /// List transducers, soonest expiry first
    #[command(visible_alias = "ls")]
    List(ListCommand),

    /// Register a new transducer
    Add(AddCommand),

    /// Change a transducer's details
    Edit(EditCommand),

    /// Mark a transducer as sent for calibration
    Calibrate(IdCommand),

    /// Remove a transducer
    #[command(visible_alias = "rm")]
    Delete(IdCommand),

    /// Send alerts for transducers close to expiry
    Check(CheckCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
