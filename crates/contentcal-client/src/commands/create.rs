//! The default command: build a calendar and provision it in Google Sheets.

use std::io::{BufRead, Write};

use chrono::Local;
use contentcal_core::{CalendarSpec, ClientName, Weeks, parse_duration, validate_client_name};
use contentcal_providers::google::{ShareRole, SheetsClient};
use contentcal_providers::{Provisioner, RetryExecutor};
use tracing::{info, warn};

use crate::commands::auth;
use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};
use crate::prompt;

/// Options for a single calendar run.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub client_name: Option<String>,
    pub weeks: Option<String>,
    pub share: Option<ShareRole>,
    pub dry_run: bool,
}

/// Creates the calendar and prints its URL to stdout.
pub async fn run(options: CreateOptions, config: &AppConfig) -> ClientResult<()> {
    let (client_name, weeks) = {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut prompts = std::io::stderr();
        resolve_inputs(&options, &mut input, &mut prompts)?
    };

    let today = Local::now().date_naive();
    let spec = contentcal_core::build(&client_name, weeks, today);
    info!(
        title = %spec.title,
        weeks = weeks.get(),
        rows = spec.sample_rows.len() + spec.planning_rows.len(),
        "built calendar"
    );

    if options.dry_run {
        println!("{}", render_json(&spec)?);
        return Ok(());
    }

    let policy = config.retry.to_policy()?;
    let google = config.google.to_provider_config()?;
    let share = options.share.or(config.sharing.role);

    let mut authenticator = auth::authenticator(config, google.clone())?;
    let credential = authenticator.ensure_authorized().await?;

    let sheets = SheetsClient::new(&google, credential.access_token)?;
    let provisioner =
        Provisioner::new(sheets, RetryExecutor::new(policy)).with_renewal(authenticator);
    let calendar = provisioner.provision(&spec, share).await?;

    if !calendar.skipped.is_empty() {
        warn!(
            "spreadsheet created without: {}",
            calendar.skipped.join(", ")
        );
    }
    info!(spreadsheet_id = %calendar.spreadsheet_id, "content calendar ready");
    println!("{}", calendar.url);
    Ok(())
}

/// Takes name and duration from the options, prompting for whatever is missing.
pub fn resolve_inputs<R: BufRead, W: Write>(
    options: &CreateOptions,
    input: &mut R,
    output: &mut W,
) -> ClientResult<(ClientName, Weeks)> {
    let client_name = match options.client_name.as_deref() {
        Some(name) => validate_client_name(name)?,
        None => prompt::client_name(input, output)?,
    };
    let weeks = match options.weeks.as_deref() {
        Some(weeks) => parse_duration(weeks)?,
        None => prompt::weeks(input, output)?,
    };
    Ok((client_name, weeks))
}

fn render_json(spec: &CalendarSpec) -> ClientResult<String> {
    spec.to_json()
        .map_err(|e| ClientError::Render(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::NaiveDate;

    use super::*;

    fn options(name: Option<&str>, weeks: Option<&str>) -> CreateOptions {
        CreateOptions {
            client_name: name.map(str::to_string),
            weeks: weeks.map(str::to_string),
            ..CreateOptions::default()
        }
    }

    #[test]
    fn flags_skip_prompts() {
        let mut output = Vec::new();
        let (name, weeks) = resolve_inputs(
            &options(Some("Acme Co"), Some("6")),
            &mut Cursor::new(""),
            &mut output,
        )
        .unwrap();
        assert_eq!(name.as_str(), "Acme Co");
        assert_eq!(weeks.get(), 6);
        assert!(output.is_empty());
    }

    #[test]
    fn missing_values_are_prompted() {
        let mut output = Vec::new();
        let (name, weeks) = resolve_inputs(
            &options(None, None),
            &mut Cursor::new("Bakery <Main>\n\n"),
            &mut output,
        )
        .unwrap();
        assert_eq!(name.as_str(), "Bakery Main");
        assert_eq!(weeks.get(), 4);

        let prompts = String::from_utf8(output).unwrap();
        assert!(prompts.contains("Client name"));
        assert!(prompts.contains("weeks"));
    }

    #[test]
    fn only_weeks_prompted() {
        let mut output = Vec::new();
        let (_, weeks) = resolve_inputs(
            &options(Some("Acme"), None),
            &mut Cursor::new("12\n"),
            &mut output,
        )
        .unwrap();
        assert_eq!(weeks.get(), 12);
        assert!(!String::from_utf8(output).unwrap().contains("Client name"));
    }

    #[test]
    fn invalid_flags_fail_before_prompting() {
        let err = resolve_inputs(
            &options(Some("Acme"), Some("60")),
            &mut Cursor::new(""),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = resolve_inputs(
            &options(Some("   "), Some("4")),
            &mut Cursor::new(""),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn dry_run_json_has_title() {
        let name = validate_client_name("Acme Co").unwrap();
        let weeks = parse_duration("1").unwrap();
        let spec = contentcal_core::build(
            &name,
            weeks,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let json = render_json(&spec).unwrap();
        assert!(json.contains("\"Acme Co - Content Calendar\""));
    }
}
