//! Validation of user-supplied values.
//!
//! The client name ends up in a spreadsheet title and may be used to derive
//! file names, so anything that could act as a path separator, a traversal
//! sequence or a control character is stripped before it goes anywhere.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Maximum length of a sanitized client name, in characters.
pub const MAX_CLIENT_NAME_LEN: usize = 50;

/// Longest planning horizon accepted, in weeks.
pub const MAX_DURATION_WEEKS: i64 = 52;

/// Planning horizon used when the user just presses enter.
pub const DEFAULT_DURATION_WEEKS: u32 = 4;

/// Client name used when the user just presses enter.
pub const DEFAULT_CLIENT_NAME: &str = "Sample Client";

/// Characters that are unsafe in sheet titles and file names.
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[<>:"/\\|?*\p{Cc}]"#).expect("Invalid unsafe-character regex")
});

/// Runs of two or more dots.
static DOT_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{2,}").expect("Invalid dot-run regex"));

/// Errors raised for rejected user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The client name was empty or whitespace only.
    #[error("client name must not be empty")]
    EmptyClientName,

    /// Nothing usable was left after removing unsafe characters.
    #[error("client name {0:?} contains no usable characters")]
    UnusableClientName(String),

    /// The duration was zero or negative.
    #[error("duration must be at least 1 week, got {0}")]
    DurationTooShort(i64),

    /// The duration exceeded [`MAX_DURATION_WEEKS`].
    #[error("duration must be at most {MAX_DURATION_WEEKS} weeks, got {0}")]
    DurationTooLong(i64),

    /// The duration could not be parsed as a whole number.
    #[error("duration {0:?} is not a whole number of weeks")]
    DurationNotANumber(String),
}

/// A client name that passed [`validate_client_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ClientName(String);

impl ClientName {
    /// Returns the sanitized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A planning horizon between 1 and [`MAX_DURATION_WEEKS`] weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Weeks(u32);

impl Weeks {
    /// Number of weeks.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Number of days covered by the plan.
    pub fn days(self) -> u32 {
        self.0 * 7
    }
}

impl Default for Weeks {
    fn default() -> Self {
        Self(DEFAULT_DURATION_WEEKS)
    }
}

impl fmt::Display for Weeks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 1 {
            write!(f, "1 week")
        } else {
            write!(f, "{} weeks", self.0)
        }
    }
}

/// Sanitizes a client name.
///
/// Removes `< > : " / \ | ? *`, control characters and any run of two or
/// more dots, trims surrounding whitespace and dots, and caps the result at
/// [`MAX_CLIENT_NAME_LEN`] characters.
pub fn validate_client_name(input: &str) -> Result<ClientName, ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::EmptyClientName);
    }

    // Separators go first so that "./." collapses into a run that is then dropped.
    let stripped = UNSAFE_CHARS.replace_all(input, "");
    let cleaned = DOT_RUNS.replace_all(&stripped, "");

    let trimmed = trim_name(&cleaned);
    let capped: String = trimmed.chars().take(MAX_CLIENT_NAME_LEN).collect();
    let result = trim_name(&capped);

    if result.is_empty() {
        return Err(ValidationError::UnusableClientName(input.to_string()));
    }
    Ok(ClientName(result.to_string()))
}

fn trim_name(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '.')
}

/// Checks that a planning horizon is within bounds.
pub fn validate_duration(weeks: i64) -> Result<Weeks, ValidationError> {
    if weeks <= 0 {
        return Err(ValidationError::DurationTooShort(weeks));
    }
    if weeks > MAX_DURATION_WEEKS {
        return Err(ValidationError::DurationTooLong(weeks));
    }
    // Bounded above by MAX_DURATION_WEEKS, so the cast cannot truncate.
    Ok(Weeks(weeks as u32))
}

/// Parses a duration typed at the prompt.
///
/// Empty input selects [`DEFAULT_DURATION_WEEKS`].
pub fn parse_duration(input: &str) -> Result<Weeks, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Weeks::default());
    }
    let weeks: i64 = input
        .parse()
        .map_err(|_| ValidationError::DurationNotANumber(input.to_string()))?;
    validate_duration(weeks)
}
