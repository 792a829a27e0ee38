//! Turns a [`CalendarSpec`] into a live spreadsheet.
//!
//! Each step is a [`RemoteOperation`] run through the [`RetryExecutor`].
//! Required steps abort the run on failure. Optional ones (validation,
//! formatting, sharing) are logged and recorded in
//! [`ProvisionedCalendar::skipped`].
//!
//! When a step is refused with 401, the [`TokenRenewal`] (if any) supplies
//! a new access token and that step runs again. This happens at most once
//! per run.

use std::future::Future;
use std::sync::Mutex;

use contentcal_core::{
    CALENDAR_SHEET_TITLE, CalendarSpec, INSTRUCTIONS_SHEET_TITLE, LineStyle, VALIDATION_LAST_ROW,
};
use tracing::{info, warn};

use crate::BoxFuture;
use crate::error::{AuthError, ProviderErrorCode, ProviderResult, ProvisionError};
use crate::google::requests;
use crate::google::{
    AuthorizationProvider, Authenticator, CreatedSpreadsheet, NewSheet, SheetsApi, ShareRole,
};
use crate::retry::{RemoteOperation, RetryExecutor};

pub const CREATE_SPREADSHEET: RemoteOperation = RemoteOperation::non_idempotent("create_spreadsheet");
pub const WRITE_HEADERS: RemoteOperation = RemoteOperation::idempotent("write_headers");
pub const WRITE_DATA: RemoteOperation = RemoteOperation::idempotent("write_sample_data");
pub const APPLY_VALIDATION: RemoteOperation = RemoteOperation::idempotent("apply_validation").optional();
pub const APPLY_FORMATTING: RemoteOperation = RemoteOperation::idempotent("apply_formatting").optional();
pub const WRITE_INSTRUCTIONS: RemoteOperation = RemoteOperation::idempotent("write_instructions");
pub const FORMAT_INSTRUCTIONS: RemoteOperation =
    RemoteOperation::idempotent("format_instructions").optional();
pub const SHARE: RemoteOperation = RemoteOperation::non_idempotent("share").optional();

/// Sheet ids requested at creation time.
pub const CALENDAR_SHEET_ID: i64 = 0;
pub const INSTRUCTIONS_SHEET_ID: i64 = 1;

const CALENDAR_GRID_ROWS: u32 = VALIDATION_LAST_ROW;
const INSTRUCTIONS_GRID_ROWS: u32 = 50;
const INSTRUCTIONS_GRID_COLUMNS: u32 = 10;
const HEADER_ROW_HEIGHT_PX: u32 = 50;

/// A spreadsheet that was created and populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedCalendar {
    pub spreadsheet_id: String,
    pub url: String,
    /// Optional steps that failed and were skipped.
    pub skipped: Vec<&'static str>,
}

/// Supplies a new access token after the API rejects the current one.
pub trait TokenRenewal {
    fn renew_token(&mut self) -> BoxFuture<'_, Result<String, AuthError>>;
}

impl<P: AuthorizationProvider> TokenRenewal for Authenticator<P> {
    fn renew_token(&mut self) -> BoxFuture<'_, Result<String, AuthError>> {
        Box::pin(async move { self.renew().await.map(|credential| credential.access_token) })
    }
}

type Renewal = Box<dyn TokenRenewal + Send>;

/// Runs the provisioning sequence against a [`SheetsApi`].
pub struct Provisioner<A> {
    api: A,
    executor: RetryExecutor,
    renewal: Mutex<Option<Renewal>>,
}

impl<A: SheetsApi> Provisioner<A> {
    pub fn new(api: A, executor: RetryExecutor) -> Self {
        Self {
            api,
            executor,
            renewal: Mutex::new(None),
        }
    }

    /// Lets the run recover once from a rejected access token.
    #[must_use]
    pub fn with_renewal(self, renewal: impl TokenRenewal + Send + 'static) -> Self {
        let renewal: Renewal = Box::new(renewal);
        Self {
            renewal: Mutex::new(Some(renewal)),
            ..self
        }
    }

    /// Creates the spreadsheet described by `spec` and fills it in.
    ///
    /// Sharing by link happens only when `share` is set. A failure after
    /// creation is wrapped in [`ProvisionError::Incomplete`] with the URL of
    /// the partial spreadsheet.
    pub async fn provision(
        &self,
        spec: &CalendarSpec,
        share: Option<ShareRole>,
    ) -> Result<ProvisionedCalendar, ProvisionError> {
        let api = &self.api;

        info!(title = %spec.title, "creating spreadsheet");
        let sheets = new_sheets(spec.columns.len());
        let created = self
            .step(&CREATE_SPREADSHEET, || api.create_spreadsheet(&spec.title, &sheets))
            .await?;

        let populated = self.populate(spec, share, &created).await;
        match populated {
            Ok(skipped) => Ok(ProvisionedCalendar {
                spreadsheet_id: created.spreadsheet_id,
                url: created.url,
                skipped,
            }),
            Err(source) => {
                warn!(
                    spreadsheet_id = %created.spreadsheet_id,
                    url = %created.url,
                    "spreadsheet was created but is incomplete"
                );
                Err(ProvisionError::Incomplete {
                    url: created.url,
                    source: Box::new(source),
                })
            }
        }
    }

    async fn populate(
        &self,
        spec: &CalendarSpec,
        share: Option<ShareRole>,
        created: &CreatedSpreadsheet,
    ) -> Result<Vec<&'static str>, ProvisionError> {
        let api = &self.api;
        let columns = spec.columns.len();
        let mut skipped = Vec::new();

        let id = created.spreadsheet_id.as_str();
        let calendar_sheet = created
            .sheet_id(CALENDAR_SHEET_TITLE)
            .unwrap_or(CALENDAR_SHEET_ID);
        let instructions_sheet = created
            .sheet_id(INSTRUCTIONS_SHEET_TITLE)
            .unwrap_or(INSTRUCTIONS_SHEET_ID);

        info!("writing headers");
        let headers = vec![spec.headers()];
        let range = a1_range(CALENDAR_SHEET_TITLE, columns, 1, 1);
        self.step(&WRITE_HEADERS, || api.update_values(id, &range, &headers))
            .await?;

        let rows = spec.data_rows();
        info!(rows = rows.len(), "writing calendar rows");
        let range = a1_range(CALENDAR_SHEET_TITLE, columns, 2, rows.len() + 1);
        self.step(&WRITE_DATA, || api.update_values(id, &range, &rows))
            .await?;

        let validation = validation_requests(spec, calendar_sheet);
        if !validation.is_empty() {
            info!("adding dropdown validation");
            self.optional(&APPLY_VALIDATION, &mut skipped, || {
                api.batch_update(id, &validation)
            })
            .await;
        }

        info!("formatting calendar sheet");
        let formatting = formatting_requests(spec, calendar_sheet);
        self.optional(&APPLY_FORMATTING, &mut skipped, || {
            api.batch_update(id, &formatting)
        })
        .await;

        info!("writing instructions");
        let instructions = spec.instruction_rows();
        let width = instructions.iter().map(Vec::len).max().unwrap_or(1);
        let range = a1_range(INSTRUCTIONS_SHEET_TITLE, width, 1, instructions.len());
        self.step(&WRITE_INSTRUCTIONS, || {
            api.update_values(id, &range, &instructions)
        })
        .await?;

        let instruction_styles = instruction_format_requests(spec, instructions_sheet);
        if !instruction_styles.is_empty() {
            self.optional(&FORMAT_INSTRUCTIONS, &mut skipped, || {
                api.batch_update(id, &instruction_styles)
            })
            .await;
        }

        if let Some(role) = share {
            info!(%role, "sharing spreadsheet by link");
            self.optional(&SHARE, &mut skipped, || api.share(id, role))
                .await;
        }

        Ok(skipped)
    }

    /// Runs one step, renewing the access token once if it is rejected.
    async fn step<T, F, Fut>(
        &self,
        operation: &RemoteOperation,
        mut call: F,
    ) -> Result<T, ProvisionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let error = match self.executor.execute(operation, &mut call).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if error.last_error().code() != ProviderErrorCode::AuthenticationFailed {
            return Err(error.into());
        }
        let Some(mut renewal) = self.take_renewal() else {
            return Err(error.into());
        };

        warn!(operation = operation.name(), "access token rejected, renewing");
        let token = renewal
            .renew_token()
            .await
            .map_err(ProvisionError::Reauthorization)?;
        self.api.set_access_token(token);
        Ok(self.executor.execute(operation, call).await?)
    }

    async fn optional<F, Fut>(
        &self,
        operation: &RemoteOperation,
        skipped: &mut Vec<&'static str>,
        call: F,
    ) where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<()>>,
    {
        if let Err(e) = self.step(operation, call).await {
            warn!(operation = operation.name(), "optional step failed, continuing: {}", e);
            skipped.push(operation.name());
        }
    }

    fn take_renewal(&self) -> Option<Renewal> {
        match self.renewal.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

fn new_sheets(columns: usize) -> Vec<NewSheet> {
    vec![
        NewSheet {
            sheet_id: CALENDAR_SHEET_ID,
            title: CALENDAR_SHEET_TITLE.to_string(),
            rows: CALENDAR_GRID_ROWS,
            columns: u32::try_from(columns).unwrap_or(u32::MAX),
        },
        NewSheet {
            sheet_id: INSTRUCTIONS_SHEET_ID,
            title: INSTRUCTIONS_SHEET_TITLE.to_string(),
            rows: INSTRUCTIONS_GRID_ROWS,
            columns: INSTRUCTIONS_GRID_COLUMNS,
        },
    ]
}

fn validation_requests(spec: &CalendarSpec, sheet_id: i64) -> Vec<serde_json::Value> {
    spec.dropdown_columns()
        .map(|(column, options)| requests::dropdown(sheet_id, column, 1, VALIDATION_LAST_ROW, options))
        .collect()
}

fn formatting_requests(spec: &CalendarSpec, sheet_id: i64) -> Vec<serde_json::Value> {
    let mut out = vec![
        requests::header_style(sheet_id, spec.columns.len()),
        requests::row_height(sheet_id, 0, HEADER_ROW_HEIGHT_PX),
    ];
    out.extend(
        spec.columns
            .iter()
            .enumerate()
            .map(|(i, column)| requests::column_width(sheet_id, i, column.width_px)),
    );
    out
}

fn instruction_format_requests(spec: &CalendarSpec, sheet_id: i64) -> Vec<serde_json::Value> {
    spec.instructions
        .iter()
        .enumerate()
        .filter_map(|(row, line)| match line.style {
            LineStyle::Title => Some(requests::title_cell(sheet_id, row)),
            LineStyle::Heading => Some(requests::heading_cell(sheet_id, row)),
            LineStyle::Body | LineStyle::Blank => None,
        })
        .collect()
}

/// Column letters for a 1-based index (1 = A, 27 = AA).
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// `'Sheet'!A{first_row}:{last_col}{last_row}` covering `columns` columns.
fn a1_range(sheet: &str, columns: usize, first_row: usize, last_row: usize) -> String {
    format!(
        "'{}'!A{}:{}{}",
        sheet.replace('\'', "''"),
        first_row,
        column_letter(columns.max(1)),
        last_row.max(first_row)
    )
}
