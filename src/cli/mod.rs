//! CLI module for netres
//!
//! This module provides the command-line interface for netres,
//! including argument parsing and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// netres - declarative reconciliation of network device configuration
///
/// Parses running configuration into structured facts, diffs desired
/// configuration against it and renders the CLI commands that close the gap.
#[derive(Parser, Debug, Clone)]
#[command(name = "netres")]
#[command(version)]
#[command(about = "Reconcile network resource configuration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "NETRES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
    /// YAML output
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List available resources
    List(commands::list::ListArgs),

    /// Parse running configuration into facts
    Parse(commands::parse::ParseArgs),

    /// Render desired configuration as commands
    Render(commands::render::RenderArgs),

    /// Compute the commands that reconcile a device with desired configuration
    Reconcile(commands::reconcile::ReconcileArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}
