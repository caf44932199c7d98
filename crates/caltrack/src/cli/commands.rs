//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::record::TransducerFields;

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Description of the transducer
    #[arg(short, long)]
    pub description: String,

    /// Expiry date (YYYY-MM-DD, or YYYY-MM for the end of that month)
    #[arg(short, long)]
    pub expiry: String,

    /// Serial number
    #[arg(short, long, default_value = "")]
    pub serial: String,

    /// Physical location
    #[arg(short, long, default_value = "")]
    pub location: String,

    /// Pressure rating
    #[arg(short, long, default_value = "")]
    pub psi: String,
}

impl AddCommand {
    /// The record fields given on the command line.
    #[must_use]
    pub fn fields(&self) -> TransducerFields {
        TransducerFields {
            description: self.description.clone(),
            expiry_date: self.expiry.clone(),
            serial_number: self.serial.clone(),
            location: self.location.clone(),
            psi: self.psi.clone(),
        }
    }
}

/// Edit command arguments.
///
/// Fields that are not given keep their stored value.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Id of the transducer to edit
    pub id: u64,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New expiry date; a changed date puts a calibrating transducer back in service
    #[arg(short, long)]
    pub expiry: Option<String>,

    /// New serial number
    #[arg(short, long)]
    pub serial: Option<String>,

    /// New location
    #[arg(short, long)]
    pub location: Option<String>,

    /// New pressure rating
    #[arg(short, long)]
    pub psi: Option<String>,
}

impl EditCommand {
    /// Overlay the given flags on the stored fields.
    #[must_use]
    pub fn merge(&self, stored: TransducerFields) -> TransducerFields {
        let pick = |given: &Option<String>, current: String| given.clone().unwrap_or(current);
        TransducerFields {
            description: pick(&self.description, stored.description),
            expiry_date: pick(&self.expiry, stored.expiry_date),
            serial_number: pick(&self.serial, stored.serial_number),
            location: pick(&self.location, stored.location),
            psi: pick(&self.psi, stored.psi),
        }
    }
}

/// Arguments for commands that act on a single transducer.
#[derive(Debug, Args)]
pub struct IdCommand {
    /// Id of the transducer
    pub id: u64,
}

/// Check command arguments.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Log due transducers instead of using the configured transport
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Table,
    /// JSON array
    Json,
}
