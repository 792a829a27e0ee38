//! Google Sheets provisioning for contentcal.
//!
//! - [`google`] - credentials, OAuth, and the Sheets/Drive client
//! - [`retry`] - the retrying executor every remote call goes through
//! - [`provision`] - the ordered sequence of calls that builds a calendar
//! - [`error`] - error types shared by the above
//!
//! ```text
//! CalendarSpec ──► Provisioner ──► RetryExecutor ──► SheetsApi ──► Google
//!                                                       ▲
//!                   Authenticator ── CredentialStore    │
//!                        │                              │
//!                        └──── access token ────────────┘
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod google;
pub mod provision;
pub mod retry;

pub use error::{
    AuthError, ErrorClass, FileError, PathError, ProviderError, ProviderErrorCode, ProviderResult,
    ProvisionError, RemoteError, RemoteErrorKind,
};
pub use provision::{ProvisionedCalendar, Provisioner, TokenRenewal};
pub use retry::{RemoteOperation, RetryDecision, RetryExecutor, RetryPolicy};

/// A boxed future, as returned by the object-safe async traits of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
