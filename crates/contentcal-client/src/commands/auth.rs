//! Authentication commands.

use std::path::Path;

use contentcal_providers::google::{
    Authenticator, CredentialStore, GoogleConfig, OAuthClient, OAuthCredentials,
};
use contentcal_providers::{AuthError, FileError};
use tracing::info;

use crate::config::AppConfig;
use crate::error::ClientResult;

/// Authorize with Google, or re-authorize when `force` is set.
pub async fn run(config: &AppConfig, force: bool) -> ClientResult<()> {
    let google = config.google.to_provider_config()?;
    let mut authenticator = authenticator(config, google)?;

    let credential = if force {
        info!("discarding stored token");
        authenticator.reauthorize().await?
    } else {
        authenticator.ensure_authorized().await?
    };

    println!(
        "Authorized. Token stored in {}",
        authenticator.store().path().display()
    );
    if let Some(expires_at) = credential.expires_at {
        println!("Access token valid until {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

/// Builds an authenticator from the configured credential files.
pub(crate) fn authenticator(
    config: &AppConfig,
    google: GoogleConfig,
) -> ClientResult<Authenticator<OAuthClient>> {
    let store = config.files.credential_store()?;
    let secrets = load_client_secrets(&store, &config.files.credentials_file)?;
    let scopes = google.scopes.clone();
    let client = OAuthClient::new(secrets, google)?;
    Ok(Authenticator::new(store, client, scopes))
}

/// Reads the OAuth client secret file, which must live in the project directory.
pub(crate) fn load_client_secrets(
    store: &CredentialStore,
    path: &Path,
) -> Result<OAuthCredentials, AuthError> {
    let json = match store.read_file(path) {
        Ok(json) => json,
        Err(FileError::Read { path, source }) if source.kind() == std::io::ErrorKind::NotFound => {
            return Err(AuthError::ClientSecrets {
                path,
                reason: "not found; download an OAuth desktop client from the Google Cloud Console"
                    .to_string(),
            });
        }
        Err(e) => return Err(AuthError::Store(e)),
    };

    let client_secrets_error = |reason: String| AuthError::ClientSecrets {
        path: store.root().join(path),
        reason,
    };
    let credentials = OAuthCredentials::from_json(&json).map_err(client_secrets_error)?;
    credentials
        .validate()
        .map_err(|reason| client_secrets_error(reason.to_string()))?;
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::error::ClientError;

    use super::*;

    fn store_in(dir: &Path) -> CredentialStore {
        CredentialStore::new(dir, "token.json").unwrap()
    }

    #[test]
    fn loads_installed_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("credentials.json"),
            r#"{"installed": {"client_id": "cal.apps.googleusercontent.com", "client_secret": "s3cret"}}"#,
        )
        .unwrap();

        let creds = load_client_secrets(&store_in(dir.path()), Path::new("credentials.json")).unwrap();
        assert_eq!(creds.client_id, "cal.apps.googleusercontent.com");
    }

    #[test]
    fn missing_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_client_secrets(&store_in(dir.path()), Path::new("credentials.json"))
            .unwrap_err();
        match err {
            AuthError::ClientSecrets { reason, .. } => assert!(reason.contains("not found")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("credentials.json"), "{ nope").unwrap();
        let err = load_client_secrets(&store_in(dir.path()), Path::new("credentials.json"))
            .unwrap_err();
        assert!(matches!(err, AuthError::ClientSecrets { .. }));

        fs::write(
            dir.path().join("credentials.json"),
            r#"{"client_id": "not-google", "client_secret": "x"}"#,
        )
        .unwrap();
        let err = load_client_secrets(&store_in(dir.path()), Path::new("credentials.json"))
            .unwrap_err();
        assert!(err.to_string().contains("apps.googleusercontent.com"));
    }

    #[test]
    fn client_secrets_outside_project_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        fs::create_dir(&project).unwrap();
        fs::write(dir.path().join("credentials.json"), "{}").unwrap();

        let err = load_client_secrets(&store_in(&project), Path::new("../credentials.json"))
            .unwrap_err();
        let client: ClientError = err.into();
        assert!(matches!(client, ClientError::Path(_)));
    }

    #[test]
    fn authenticator_requires_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.files.project_dir = Some(PathBuf::from(dir.path()));

        let google = config.google.to_provider_config().unwrap();
        let err = authenticator(&config, google).err().unwrap();
        assert_eq!(err.exit_code(), 3);
    }
}
