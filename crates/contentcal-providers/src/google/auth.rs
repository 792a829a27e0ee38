//! Obtaining a usable credential.
//!
//! [`Authenticator`] walks the states
//! `NoCredential -> Authorizing -> Authorized` and
//! `Expired -> Refreshing -> Authorized`, falling back to `NoCredential`
//! when a refresh is rejected. The interactive flow runs at most once per
//! process.

use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::error::{AuthError, ProviderResult};

use super::tokens::{Credential, CredentialStore, RefreshedToken};

/// Source of new credentials.
pub trait AuthorizationProvider: Send + Sync {
    /// Runs the interactive consent flow for `scopes`.
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>>;

    /// Exchanges a refresh token for a new access token.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshedToken>>;
}

/// Where the authenticator currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoCredential,
    Authorizing,
    Authorized,
    Expired,
    Refreshing,
}

/// Loads, refreshes or obtains a credential and keeps the store in sync.
pub struct Authenticator<P> {
    store: CredentialStore,
    provider: P,
    scopes: Vec<String>,
    state: AuthState,
    authorization_attempted: bool,
}

impl<P: AuthorizationProvider> Authenticator<P> {
    pub fn new(store: CredentialStore, provider: P, scopes: Vec<String>) -> Self {
        Self {
            store,
            provider,
            scopes,
            state: AuthState::NoCredential,
            authorization_attempted: false,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Returns a valid credential, refreshing or authorizing as needed.
    ///
    /// Makes at most one refresh and one authorization attempt.
    pub async fn ensure_authorized(&mut self) -> Result<Credential, AuthError> {
        let cached = self.load_cached();
        if let Some(current) = &cached
            && !current.is_expired()
        {
            self.state = AuthState::Authorized;
            debug!("using stored credential");
            return Ok(current.clone());
        }
        if cached.is_some() {
            self.state = AuthState::Expired;
        }
        self.refresh_or_authorize(cached).await
    }

    /// Replaces an access token the API refused.
    ///
    /// The stored refresh token is tried first, even when the credential
    /// still looks valid, then the interactive flow.
    pub async fn renew(&mut self) -> Result<Credential, AuthError> {
        info!("access token was rejected, renewing");
        let cached = self.load_cached();
        self.refresh_or_authorize(cached).await
    }

    /// Drops any stored credential and runs the interactive flow.
    pub async fn reauthorize(&mut self) -> Result<Credential, AuthError> {
        self.store.clear()?;
        self.state = AuthState::NoCredential;
        let credential = self.authorize().await?;
        self.state = AuthState::Authorized;
        Ok(credential)
    }

    async fn refresh_or_authorize(&mut self, stale: Option<Credential>) -> Result<Credential, AuthError> {
        if let Some(credential) = stale
            && let Some(refreshed) = self.refresh(credential).await?
        {
            if refreshed.is_expired() {
                debug!("refreshed token is already inside the expiry buffer");
            }
            self.state = AuthState::Authorized;
            return Ok(refreshed);
        }

        self.state = AuthState::NoCredential;
        let credential = self.authorize().await?;
        self.state = AuthState::Authorized;
        Ok(credential)
    }

    fn load_cached(&self) -> Option<Credential> {
        match self.store.load() {
            Ok(Some(credential)) if credential.has_scopes(&self.scopes) => Some(credential),
            Ok(Some(_)) => {
                info!("stored credential lacks required scopes, authorization needed");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("ignoring stored credential: {}", e);
                None
            }
        }
    }

    /// Returns `Ok(None)` when the refresh token is missing or rejected.
    async fn refresh(&mut self, mut credential: Credential) -> Result<Option<Credential>, AuthError> {
        let Some(refresh_token) = credential.refresh_token.clone() else {
            info!("credential expired and cannot be refreshed");
            return Ok(None);
        };

        self.state = AuthState::Refreshing;
        match self.provider.refresh(&refresh_token).await {
            Ok(refreshed) => {
                credential.apply_refresh(refreshed);
                self.store.save(&credential)?;
                info!("refreshed access token");
                Ok(Some(credential))
            }
            Err(e) => {
                warn!("token refresh failed: {}", e);
                Ok(None)
            }
        }
    }

    async fn authorize(&mut self) -> Result<Credential, AuthError> {
        if self.authorization_attempted {
            return Err(AuthError::AlreadyAttempted);
        }
        self.authorization_attempted = true;
        self.state = AuthState::Authorizing;

        let credential = self
            .provider
            .authorize(&self.scopes)
            .await
            .map_err(AuthError::Authorization)?;

        if !credential.has_scopes(&self.scopes) {
            warn!("some requested scopes were not granted; later calls may be refused");
        }

        self.store.save(&credential)?;
        Ok(credential)
    }
}
