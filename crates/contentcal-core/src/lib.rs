//! Core logic for contentcal: input validation, the content calendar
//! template and tracing setup.
//!
//! Nothing in this crate talks to the network or touches the filesystem.

pub mod template;
pub mod tracing;
pub mod validate;

pub use template::{
    CalendarSpec, ColumnDef, InstructionLine, LineStyle, Row, build, CALENDAR_SHEET_TITLE,
    INSTRUCTIONS_SHEET_TITLE, VALIDATION_LAST_ROW,
};
pub use tracing::{LOG_FORMAT_ENV, TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use validate::{
    ClientName, ValidationError, Weeks, parse_duration, validate_client_name, validate_duration,
    DEFAULT_CLIENT_NAME, DEFAULT_DURATION_WEEKS, MAX_CLIENT_NAME_LEN, MAX_DURATION_WEEKS,
};
