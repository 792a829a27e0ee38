//! Error types for Google API access and credential handling.
//!
//! [`ProviderError`] is the raw failure of a single HTTP exchange, tagged
//! with a [`ProviderErrorCode`]. The retry executor turns it into a
//! [`RemoteError`] that records which operation failed and how many attempts
//! were made. Credential handling has its own [`PathError`], [`FileError`]
//! and [`AuthError`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Authentication failed or credentials are invalid/expired (401).
    AuthenticationFailed,
    /// Authorization failed - user lacks permission (403).
    AuthorizationFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded (429, or 403 with a rate-limit reason).
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// Resource not found (404).
    NotFound,
    /// Request was invalid (400 and other 4xx).
    BadRequest,
    /// Configuration error - missing or invalid config.
    ConfigurationError,
    /// Internal error - unexpected state, bug.
    InternalError,
}

/// How the retry executor treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The server refused the request because of rate limiting.
    RateLimited,
    /// Network trouble or a server-side failure.
    Transient,
    /// Anything that will fail the same way if repeated.
    Fatal,
}

impl ProviderErrorCode {
    /// Classifies this code for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimited => ErrorClass::RateLimited,
            Self::NetworkError | Self::ServerError => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        self.class() != ErrorClass::Fatal
    }

    /// Returns a stable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a Google endpoint.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Server-requested delay before the next attempt (`Retry-After`).
    retry_after: Option<Duration>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Records the delay the server asked for before retrying.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the server-requested retry delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Returns the retry class of this error.
    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Outcome category of a failed remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// Rate limited, and not retried (non-idempotent operation with retries disabled).
    RateLimited,
    /// Transient failure on an operation that is unsafe to repeat.
    Transient,
    /// A failure that must not be retried.
    Fatal,
    /// Every allowed attempt failed with a retryable error.
    RetriesExhausted,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }
}

impl From<ErrorClass> for RemoteErrorKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::RateLimited => Self::RateLimited,
            ErrorClass::Transient => Self::Transient,
            ErrorClass::Fatal => Self::Fatal,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote operation that failed for good.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s) [{kind}]: {last}")]
pub struct RemoteError {
    kind: RemoteErrorKind,
    operation: String,
    attempts: u32,
    #[source]
    last: ProviderError,
}

impl RemoteError {
    pub fn new(
        kind: RemoteErrorKind,
        operation: impl Into<String>,
        attempts: u32,
        last: ProviderError,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            attempts,
            last,
        }
    }

    pub fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    /// Name of the operation that failed.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Number of calls made, including the first.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The failure of the final attempt.
    pub fn last_error(&self) -> &ProviderError {
        &self.last
    }
}

/// A file path that is not acceptable for credential storage.
#[derive(Debug, Error)]
pub enum PathError {
    /// The path resolves outside the project directory.
    #[error("{} is outside the project directory {}", path.display(), root.display())]
    OutsideProject { path: PathBuf, root: PathBuf },

    /// The project directory itself could not be resolved.
    #[error("cannot resolve project directory {}: {source}", root.display())]
    ProjectRoot {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reading or writing a credential file failed.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold what we expect.
    #[error("{} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Obtaining a usable credential failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The OAuth client secret file is missing or unusable.
    #[error("client secret file {}: {reason}", path.display())]
    ClientSecrets { path: PathBuf, reason: String },

    /// Token storage failed.
    #[error("token storage: {0}")]
    Store(#[from] FileError),

    /// The interactive authorization flow failed.
    #[error("authorization failed: {0}")]
    Authorization(#[source] ProviderError),

    /// Authorization already ran once in this process.
    #[error("authorization was already attempted in this run; re-run to try again")]
    AlreadyAttempted,
}

/// Provisioning a calendar failed.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The API rejected the access token and no replacement could be obtained.
    #[error("access token was rejected and could not be renewed: {0}")]
    Reauthorization(#[source] AuthError),

    /// A step failed after the spreadsheet was created.
    #[error("{source} (incomplete spreadsheet left at {url})")]
    Incomplete {
        url: String,
        #[source]
        source: Box<ProvisionError>,
    },
}

impl ProvisionError {
    /// The failure itself, without the incomplete-spreadsheet wrapper.
    pub fn cause(&self) -> &ProvisionError {
        match self {
            Self::Incomplete { source, .. } => source.cause(),
            other => other,
        }
    }

    /// The failed remote operation, if that is what went wrong.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self.cause() {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }

    /// URL of the spreadsheet that was created before the failure.
    pub fn spreadsheet_url(&self) -> Option<&str> {
        match self {
            Self::Incomplete { url, .. } => Some(url),
            _ => None,
        }
    }
}
