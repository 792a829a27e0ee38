//! Configuration commands.

use std::path::Path;

use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the effective configuration to stdout.
pub fn dump(config: &AppConfig, path: &Path) -> ClientResult<()> {
    let toml_str = render(config)?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    let state = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("config: {}{}", path.display(), state);
    Ok(())
}

fn render(config: &AppConfig) -> ClientResult<String> {
    toml::to_string_pretty(config)
        .map_err(|e| ClientError::Render(format!("failed to serialize config: {}", e)))
}
