//! Google integration.
//!
//! # Authentication flow
//!
//! 1. The client secret (`credentials.json`) is read from the project directory
//! 2. A stored token is loaded and refreshed if it has expired
//! 3. Otherwise the browser is opened for consent (PKCE, loopback redirect)
//! 4. The resulting token is written back with owner-only permissions
//!
//! The access token then authenticates a [`SheetsClient`].

mod auth;
mod config;
mod oauth;
mod sheets;
mod tokens;

pub use auth::{AuthState, AuthorizationProvider, Authenticator};
pub use config::{DRIVE_FILE_SCOPE, GoogleConfig, OAuthCredentials, SPREADSHEETS_SCOPE};
pub use oauth::{OAuthClient, PkceFlow};
pub use sheets::{
    CreatedSpreadsheet, NewSheet, SheetsApi, SheetsClient, ShareRole, classify_failure, requests,
};
pub use tokens::{Credential, CredentialStore, RefreshedToken};
