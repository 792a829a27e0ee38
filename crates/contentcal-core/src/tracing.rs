//! Logging setup.
//!
//! Everything is written to stderr; stdout is reserved for the spreadsheet
//! URL or the dry-run JSON. `RUST_LOG` takes precedence over the configured
//! level, and `CONTENTCAL_LOG_FORMAT` (`compact`, `pretty`, `json`) selects
//! the output format when the binary asks for it.

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Environment variable consulted by [`TracingConfig::with_format_from_env`].
pub const LOG_FORMAT_ENV: &str = "CONTENTCAL_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse log filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("unknown log format {0:?} (expected compact, pretty or json)")]
    UnknownFormat(String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    Pretty,
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl FromStr for TracingOutputFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TracingError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for contentcal's own targets when `RUST_LOG` is unset.
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Show module path, file and line.
    pub show_source: bool,
    pub show_time: bool,
    /// Explicit filter directive, used instead of `RUST_LOG` and `level`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::cli()
    }
}

impl TracingConfig {
    /// Progress messages at INFO, without timestamps or source locations.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Compact,
            show_source: false,
            show_time: false,
            filter: None,
        }
    }

    /// Everything at DEBUG, with timestamps and source locations.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            show_source: true,
            show_time: true,
            ..Self::cli()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Applies [`LOG_FORMAT_ENV`] when it is set.
    pub fn with_format_from_env(self) -> Result<Self, TracingError> {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if !value.trim().is_empty() => Ok(self.with_format(value.parse()?)),
            _ => Ok(self),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(filter) = &self.filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("contentcal={}", self.level))))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.show_source)
            .with_file(self.show_source)
            .with_line_number(self.show_source);

        match (self.format, self.show_time) {
            (TracingOutputFormat::Json, _) => base.json().boxed(),
            (TracingOutputFormat::Pretty, _) => base.pretty().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once at startup.
///
/// # Errors
///
/// Fails when a subscriber is already installed or the filter is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.env_filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
