//! Client configuration.
//!
//! All settings live in an optional `config.toml` file at
//! `~/.config/contentcal/config.toml` by default. Every section may be
//! omitted; missing values fall back to the built-in defaults.
//!
//! ```toml
//! [files]
//! project_dir = "/home/me/calendars"
//! credentials_file = "credentials.json"
//! token_file = "token.json"
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 1000
//!
//! [sharing]
//! role = "reader"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use contentcal_providers::RetryPolicy;
use contentcal_providers::google::{CredentialStore, GoogleConfig, ShareRole};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Configuration for the contentcal client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where credential files live.
    pub files: FileSettings,

    /// Retry behaviour for remote calls.
    pub retry: RetrySettings,

    /// Google endpoints and OAuth settings.
    pub google: GoogleSettings,

    /// Link sharing.
    pub sharing: SharingSettings,
}

/// Credential file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Directory that must contain both credential files. Defaults to the
    /// current working directory.
    pub project_dir: Option<PathBuf>,

    /// OAuth client secret downloaded from the Google Cloud Console.
    pub credentials_file: PathBuf,

    /// Stored OAuth token.
    pub token_file: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            project_dir: None,
            credentials_file: PathBuf::from("credentials.json"),
            token_file: PathBuf::from("token.json"),
        }
    }
}

impl FileSettings {
    /// The configured project directory, or the current directory.
    pub fn project_dir(&self) -> ClientResult<PathBuf> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Opens the token store rooted at the project directory.
    pub fn credential_store(&self) -> ClientResult<CredentialStore> {
        let store = CredentialStore::new(self.project_dir()?, &self.token_file)?;
        Ok(store)
    }
}

/// Retry settings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,

    /// Retry spreadsheet creation when Google reports a rate limit.
    pub retry_rate_limited_creates: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            multiplier: policy.multiplier,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            max_jitter_ms: policy.max_jitter.as_millis() as u64,
            retry_rate_limited_creates: policy.retry_rate_limited_non_idempotent,
        }
    }
}

impl RetrySettings {
    /// Converts to a validated retry policy.
    pub fn to_policy(&self) -> ClientResult<RetryPolicy> {
        let policy = RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_multiplier(self.multiplier)
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_jitter(Duration::from_millis(self.max_jitter_ms))
            .with_rate_limited_non_idempotent_retries(self.retry_rate_limited_creates);
        policy
            .validate()
            .map_err(|e| ClientError::Config(format!("[retry] {}", e)))?;
        Ok(policy)
    }
}

/// Google provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// First port tried for the OAuth loopback redirect.
    pub loopback_port_start: u16,

    /// Last port tried for the OAuth loopback redirect.
    pub loopback_port_end: u16,

    pub auth_url: String,
    pub token_url: String,
    pub sheets_url: String,
    pub drive_url: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        let config = GoogleConfig::default();
        Self {
            scopes: config.scopes,
            timeout_secs: config.timeout.as_secs(),
            loopback_port_start: config.loopback_port_range.0,
            loopback_port_end: config.loopback_port_range.1,
            auth_url: config.auth_url,
            token_url: config.token_url,
            sheets_url: config.sheets_base_url,
            drive_url: config.drive_base_url,
        }
    }
}

impl GoogleSettings {
    /// Converts to a validated provider configuration.
    pub fn to_provider_config(&self) -> ClientResult<GoogleConfig> {
        let mut config = GoogleConfig::default()
            .with_scopes(self.scopes.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_loopback_port_range(self.loopback_port_start, self.loopback_port_end);
        config.auth_url = self.auth_url.trim_end_matches('/').to_string();
        config.token_url = self.token_url.trim_end_matches('/').to_string();
        config.sheets_base_url = self.sheets_url.trim_end_matches('/').to_string();
        config.drive_base_url = self.drive_url.trim_end_matches('/').to_string();

        config
            .validate()
            .map_err(|e| ClientError::Config(format!("[google] {}", e)))?;
        Ok(config)
    }
}

/// Link sharing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingSettings {
    /// Share with anyone who has the link. Private when unset.
    pub role: Option<ShareRole>,
}

impl AppConfig {
    /// Loads configuration from the default path, if it exists.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("contentcal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.files.token_file, PathBuf::from("token.json"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.max_delay_ms, 32_000);
        assert!(config.sharing.role.is_none());
    }

    #[test]
    fn partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [files]
            project_dir = "/srv/calendars"

            [retry]
            max_attempts = 3

            [google]
            loopback_port_start = 9000
            loopback_port_end = 9005

            [sharing]
            role = "writer"
            "#,
        )
        .unwrap();

        assert_eq!(config.files.project_dir, Some(PathBuf::from("/srv/calendars")));
        assert_eq!(config.files.credentials_file, PathBuf::from("credentials.json"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.sharing.role, Some(ShareRole::Writer));

        let google = config.google.to_provider_config().unwrap();
        assert_eq!(google.loopback_port_range, (9000, 9005));
        assert_eq!(google.sheets_base_url, GoogleConfig::DEFAULT_SHEETS_URL);
    }

    #[test]
    fn unknown_share_role_is_rejected() {
        let err = toml::from_str::<AppConfig>("[sharing]\nrole = \"owner\"\n").unwrap_err();
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn retry_settings_convert() {
        let settings = RetrySettings {
            max_attempts: 2,
            base_delay_ms: 50,
            multiplier: 3.0,
            max_delay_ms: 500,
            max_jitter_ms: 0,
            retry_rate_limited_creates: false,
        };
        let policy = settings.to_policy().unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.max_jitter, Duration::ZERO);
        assert!(!policy.retry_rate_limited_non_idempotent);
    }

    #[test]
    fn invalid_retry_settings() {
        let settings = RetrySettings {
            max_attempts: 0,
            ..RetrySettings::default()
        };
        let err = settings.to_policy().unwrap_err();
        assert!(matches!(err, ClientError::Config(ref msg) if msg.contains("max_attempts")));

        let settings = RetrySettings {
            base_delay_ms: 60_000,
            ..RetrySettings::default()
        };
        assert!(settings.to_policy().is_err());
    }

    #[test]
    fn invalid_google_settings() {
        let settings = GoogleSettings {
            sheets_url: "not a url".to_string(),
            ..GoogleSettings::default()
        };
        assert!(settings.to_provider_config().is_err());

        let settings = GoogleSettings {
            scopes: Vec::new(),
            ..GoogleSettings::default()
        };
        assert!(settings.to_provider_config().is_err());
    }

    #[test]
    fn credential_store_is_rooted_in_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileSettings {
            project_dir: Some(dir.path().to_path_buf()),
            ..FileSettings::default()
        };
        let store = files.credential_store().unwrap();
        assert_eq!(
            store.path(),
            dir.path().canonicalize().unwrap().join("token.json")
        );
    }

    #[test]
    fn token_file_outside_project_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileSettings {
            project_dir: Some(dir.path().to_path_buf()),
            token_file: PathBuf::from("../token.json"),
            ..FileSettings::default()
        };
        let err = files.credential_store().unwrap_err();
        assert!(matches!(err, ClientError::Path(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nmax_jitter_ms = 0\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.retry.max_jitter_ms, 0);

        assert!(AppConfig::load_from(&dir.path().join("missing.toml")).is_err());

        std::fs::write(&path, "[retry\n").unwrap();
        assert!(AppConfig::load_from(&path).unwrap_err().contains("parse"));
    }

    #[test]
    fn dump_round_trips() {
        let mut config = AppConfig::default();
        config.sharing.role = Some(ShareRole::Reader);
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<AppConfig>(&text).unwrap(), config);
    }

    #[test]
    fn default_path_ends_with_config_toml() {
        let path = AppConfig::default_path();
        assert!(path.ends_with("contentcal/config.toml"));
    }
}
