//! Google API client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Scope for creating and editing spreadsheets.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Scope for sharing files created by this application.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// OAuth 2.0 client identity from the Google Cloud Console.
#[derive(Clone)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Shape of the downloaded client secret file.
///
/// Desktop clients use an `installed` section, web clients a `web` section;
/// some tools write `client_id`/`client_secret` at the top level.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Parses a client secret JSON document.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| format!("failed to parse client secret JSON: {e}"))?;

        if let Some(section) = file.installed.or(file.web) {
            return Ok(Self::new(section.client_id, section.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err("expected an 'installed' or 'web' section, or top-level client_id/client_secret"
            .to_string())
    }

    /// Checks that the values look like a Google OAuth client.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Endpoints and limits used when talking to Google.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleConfig {
    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// Ports tried, in order, for the loopback OAuth redirect.
    pub loopback_port_range: (u16, u16),

    /// How long to wait for the browser to come back.
    pub callback_timeout: Duration,

    pub auth_url: String,
    pub token_url: String,

    /// Base URL of the Sheets v4 API, without trailing slash.
    pub sheets_base_url: String,

    /// Base URL of the Drive v3 API, without trailing slash.
    pub drive_base_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            scopes: vec![SPREADSHEETS_SCOPE.to_string(), DRIVE_FILE_SCOPE.to_string()],
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("contentcal/{}", env!("CARGO_PKG_VERSION")),
            loopback_port_range: (8080, 8090),
            callback_timeout: Duration::from_secs(300),
            auth_url: Self::DEFAULT_AUTH_URL.to_string(),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
            sheets_base_url: Self::DEFAULT_SHEETS_URL.to_string(),
            drive_base_url: Self::DEFAULT_DRIVE_URL.to_string(),
        }
    }
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub const DEFAULT_AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    pub const DEFAULT_SHEETS_URL: &'static str = "https://sheets.googleapis.com/v4";
    pub const DEFAULT_DRIVE_URL: &'static str = "https://www.googleapis.com/drive/v3";

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    /// Points every endpoint at `base` (used against a mock server).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.token_url = format!("{base}/token");
        self.sheets_base_url = format!("{base}/v4");
        self.drive_base_url = format!("{base}/drive/v3");
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err(format!(
                "invalid loopback port range {}-{}",
                self.loopback_port_range.0, self.loopback_port_range.1
            ));
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        for (name, url) in [
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("sheets_base_url", &self.sheets_base_url),
            ("drive_base_url", &self.drive_base_url),
        ] {
            url::Url::parse(url).map_err(|e| format!("invalid {name} {url:?}: {e}"))?;
        }
        Ok(())
    }
}
