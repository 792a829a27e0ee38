//! contentcal CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use contentcal_core::{TracingConfig, init_tracing};

use contentcal_client::cli::{Cli, Command, ConfigAction};
use contentcal_client::commands;
use contentcal_client::commands::create::CreateOptions;
use contentcal_client::config::AppConfig;
use contentcal_client::error::{ClientError, ClientResult};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    let tracing = tracing.clone().with_format_from_env().unwrap_or_else(|e| {
        eprintln!("warning: {}", e);
        tracing
    });
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    if let Some(Command::Config {
        action: ConfigAction::Path,
    }) = cli.command
    {
        return commands::config::path(&config_path);
    }

    let config = if cli.config.is_some() {
        AppConfig::load_from(&config_path).map_err(ClientError::Config)?
    } else {
        AppConfig::load().map_err(ClientError::Config)?
    };

    match cli.command {
        Some(Command::Auth { force }) => commands::auth::run(&config, force).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Path => commands::config::path(&config_path),
        },
        None => {
            let options = CreateOptions {
                client_name: cli.client_name,
                weeks: cli.weeks,
                share: cli.share,
                dry_run: cli.dry_run,
            };
            commands::create::run(options, &config).await
        }
    }
}
