//! The `contentcal` command-line interface.
//!
//! Prompts for a client name and planning horizon, then creates a content
//! calendar spreadsheet through `contentcal-providers`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod prompt;

pub use cli::Cli;
pub use config::AppConfig;
pub use error::{ClientError, ClientResult};
