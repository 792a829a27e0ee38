//! Client error types.

use std::fmt;

use contentcal_core::{TracingError, ValidationError};
use contentcal_providers::{
    AuthError, FileError, PathError, ProviderError, ProviderErrorCode, ProvisionError, RemoteError,
};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Rejected client name or duration.
    Validation(ValidationError),
    /// A configured path escapes the project directory.
    Path(PathError),
    /// Authorization or token storage failed.
    Auth(AuthError),
    /// Building the spreadsheet failed.
    Provision(ProvisionError),
    /// Could not set up a provider client.
    Provider(ProviderError),
    /// Configuration error.
    Config(String),
    /// Output could not be rendered.
    Render(String),
    /// IO error.
    Io(std::io::Error),
}

impl ClientError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Path(_) => 2,
            Self::Auth(_) => 3,
            Self::Provision(err) if credentials_rejected(err) => 3,
            Self::Provision(_) => 4,
            Self::Provider(_) | Self::Config(_) | Self::Render(_) | Self::Io(_) => 1,
        }
    }
}

fn credentials_rejected(err: &ProvisionError) -> bool {
    match err.cause() {
        ProvisionError::Reauthorization(_) => true,
        ProvisionError::Remote(remote) => {
            remote.last_error().code() == ProviderErrorCode::AuthenticationFailed
        }
        ProvisionError::Incomplete { .. } => false,
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid input: {}", err),
            Self::Path(err) => write!(f, "{}", err),
            Self::Auth(err) => write!(f, "{}", err),
            Self::Provision(err) => write!(f, "{}", err),
            Self::Provider(err) => write!(f, "{}", err),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Render(msg) => write!(f, "failed to render output: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Path(err) => Some(err),
            Self::Auth(err) => Some(err),
            Self::Provision(err) => Some(err),
            Self::Provider(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Config(_) | Self::Render(_) => None,
        }
    }
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<PathError> for ClientError {
    fn from(err: PathError) -> Self {
        Self::Path(err)
    }
}

impl From<FileError> for ClientError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Path(err) => Self::Path(err),
            other => Self::Auth(AuthError::Store(other)),
        }
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(FileError::Path(err)) => Self::Path(err),
            other => Self::Auth(other),
        }
    }
}

impl From<ProvisionError> for ClientError {
    fn from(err: ProvisionError) -> Self {
        Self::Provision(err)
    }
}

impl From<RemoteError> for ClientError {
    fn from(err: RemoteError) -> Self {
        Self::Provision(err.into())
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
