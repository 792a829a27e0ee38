//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use contentcal_providers::google::ShareRole;

/// contentcal - Generate a social media content calendar in Google Sheets
#[derive(Debug, Parser)]
#[command(name = "contentcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CONTENTCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Client name used in the spreadsheet title (prompted when omitted)
    #[arg(long, short = 'n')]
    pub client_name: Option<String>,

    /// Number of weeks to plan, 1 to 52 (prompted when omitted)
    #[arg(long, short = 'w', allow_negative_numbers = true)]
    pub weeks: Option<String>,

    /// Share the spreadsheet with anyone who has the link
    #[arg(long, value_parser = parse_share_role)]
    pub share: Option<ShareRole>,

    /// Print the calendar as JSON instead of creating a spreadsheet
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

fn parse_share_role(value: &str) -> Result<ShareRole, String> {
    value.parse()
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize with Google and store the token
    Auth {
        /// Discard the stored token and authorize again
        #[arg(long, short)]
        force: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Show configuration file path
    Path,
}
