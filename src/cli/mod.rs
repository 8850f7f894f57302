//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `perimeter scan <domain>` - Assess one domain
//! - `perimeter config show|path|init` - Inspect or create the settings file

mod config;
mod scan;

pub use config::{ConfigAction, ConfigCommand};
pub use scan::ScanCommand;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Perimeter - external attack-surface reconnaissance for a single domain.
///
/// Probes HTTP/HTTPS reachability and TLS with repeated attempts, gathers
/// headers, technology hints, subdomains and service fingerprints, then
/// scores the exposure and emits an asset graph.
#[derive(Parser, Debug)]
#[command(name = "perimeter")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Confidence-scored attack-surface recon", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a domain
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Inspect or initialise settings
    #[command(alias = "c")]
    Config(ConfigCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// Full report as JSON
    Json,
    /// Findings as CSV
    Csv,
}

impl OutputFormat {
    /// Parse a format name as stored in the settings file.
    pub fn from_setting(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
