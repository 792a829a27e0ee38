//! OAuth 2.0 PKCE flow for installed applications.
//!
//! 1. Generate a code verifier and its SHA-256 challenge
//! 2. Bind a loopback listener on the first free port of the configured range
//! 3. Open the browser on Google's consent page
//! 4. Wait for the redirect carrying the authorization code
//! 5. Check the `state` parameter, then exchange the code for tokens

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::BoxFuture;
use crate::error::{ProviderError, ProviderResult};

use super::auth::AuthorizationProvider;
use super::config::{GoogleConfig, OAuthCredentials};
use super::tokens::{Credential, RefreshedToken};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Interactive OAuth client backed by Google's token endpoint.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    config: GoogleConfig,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials, config: GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            credentials,
            config,
            http_client,
        })
    }

    /// Runs the browser flow and returns a fresh credential.
    pub async fn run_flow(&self, scopes: &[String]) -> ProviderResult<Credential> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback_server(self.config.loopback_port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{port}/callback");
        let auth_url = pkce.build_auth_url(
            &self.config.auth_url,
            &self.credentials.client_id,
            &redirect_uri,
            scopes,
        );

        info!("opening browser for Google authorization");
        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{auth_url}\n");
        }

        let timeout = self.config.callback_timeout;
        let callback = tokio::task::spawn_blocking(move || wait_for_callback(listener, timeout))
            .await
            .map_err(|e| ProviderError::internal("callback listener panicked").with_source(e))?;
        let (code, received_state) = callback?;

        if received_state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch, refusing authorization code",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        self.exchange_code(&code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> ProviderResult<RefreshedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.post_token(&params, "token refresh").await?;
        debug!("refreshed access token");
        Ok(RefreshedToken {
            access_token: response.access_token,
            expires_in_secs: response.expires_in,
            refresh_token: response.refresh_token,
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<Credential> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.post_token(&params, "token exchange").await?;

        // Google echoes the granted scopes; fall back to what we asked for
        let granted = response
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|| scopes.to_vec());

        info!("authorization complete");
        Ok(Credential::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            granted,
        ))
    }

    async fn post_token(&self, params: &[(&str, &str)], what: &str) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{what} request failed")).with_source(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("{what}: failed to read response")).with_source(e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.describe())
                .unwrap_or_else(|_| "unexpected response".to_string());
            let message = format!("{what} failed ({status}): {detail}");
            return Err(if status.is_server_error() {
                ProviderError::server(message)
            } else {
                ProviderError::authentication(message)
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("invalid {what} response: {e}")))
    }
}

impl AuthorizationProvider for OAuthClient {
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(self.run_flow(scopes))
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshedToken>> {
        Box::pin(self.refresh_access_token(refresh_token))
    }
}

/// Binds the first free port in `port_range` on 127.0.0.1.
fn bind_loopback_server(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            debug!("bound loopback server on port {}", port);
            return Ok((listener, port));
        }
    }
    Err(ProviderError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

fn wait_for_callback(listener: TcpListener, timeout: Duration) -> ProviderResult<(String, String)> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::authentication(format!(
            "no authorization received within {}s",
            timeout.as_secs()
        ))),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::internal("callback listener stopped"))
        }
    }
}

/// Answers one browser request. Returns `None` for unrelated requests
/// (favicon and the like) so the listener keeps waiting.
fn handle_callback(mut stream: TcpStream) -> Option<ProviderResult<(String, String)>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = parse_callback_request(&request_line)?;

    let response = if result.is_ok() {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization Successful</h1>\
        <p>You can close this window and return to the terminal.</p></body></html>"
    } else {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization Failed</h1>\
        <p>You can close this window.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// Parses `GET /callback?code=...&state=... HTTP/1.1`.
fn parse_callback_request(request_line: &str) -> Option<ProviderResult<(String, String)>> {
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != "/callback" {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut denied = None;
    for param in query.split('&') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value).map(|v| v.into_owned()).unwrap_or_default();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => denied = Some(value),
            _ => {}
        }
    }

    if let Some(reason) = denied {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {reason}"
        ))));
    }
    match code {
        Some(code) if !code.is_empty() => Some(Ok((code, state.unwrap_or_default()))),
        _ => Some(Err(ProviderError::authentication(
            "missing authorization code in callback",
        ))),
    }
}

/// PKCE verifier, challenge and CSRF state (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the consent page URL.
    pub fn build_auth_url(
        &self,
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        format!(
            "{auth_endpoint}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Error body of the token endpoint (RFC 6749 section 5.2).
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorResponse {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OAuthClient {
        OAuthClient::new(
            OAuthCredentials::new("test.apps.googleusercontent.com", "secret"),
            GoogleConfig::default().with_base_url(&server.uri()),
        )
        .unwrap()
    }

    #[test]
    fn pkce_verifier_length() {
        // 32 bytes base64url without padding
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_matches_rfc_example() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            PkceFlow::compute_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pkce_values_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.challenge, b.challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            GoogleConfig::DEFAULT_AUTH_URL,
            "test.apps.googleusercontent.com",
            "http://127.0.0.1:8080/callback",
            &[
                "https://www.googleapis.com/auth/spreadsheets".to_string(),
                "https://www.googleapis.com/auth/drive.file".to_string(),
            ],
        );

        assert!(url.starts_with(GoogleConfig::DEFAULT_AUTH_URL));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
        assert!(url.contains("auth%2Fspreadsheets%20https"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains(&format!("state={}", flow.state)));
    }

    #[test]
    fn callback_with_code_and_state() {
        let result = parse_callback_request("GET /callback?state=abc&code=4%2F0Ab HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(result, ("4/0Ab".to_string(), "abc".to_string()));
    }

    #[test]
    fn callback_denied() {
        let err = parse_callback_request("GET /callback?error=access_denied&state=x HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn callback_without_code() {
        assert!(parse_callback_request("GET /callback?state=x HTTP/1.1")
            .unwrap()
            .is_err());
    }

    #[test]
    fn unrelated_requests_are_ignored() {
        assert!(parse_callback_request("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback_request("POST /callback?code=x HTTP/1.1").is_none());
        assert!(parse_callback_request("").is_none());
    }

    #[test]
    fn bind_reports_exhausted_range() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let err = bind_loopback_server((port, port)).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn refresh_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Fstored"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let refreshed = client(&server)
            .refresh_access_token("1//stored")
            .await
            .unwrap();
        assert_eq!(refreshed.access_token, "ya29.fresh");
        assert_eq!(refreshed.expires_in_secs, Some(3599));
        assert!(refreshed.refresh_token.is_none());
    }

    #[tokio::test]
    async fn refresh_revoked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .refresh_access_token("1//revoked")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn refresh_error_never_echoes_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>upstream ya29.leak</html>"))
            .mount(&server)
            .await;

        let err = client(&server).refresh_access_token("x").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(!err.message().contains("ya29.leak"));
    }

    #[tokio::test]
    async fn code_exchange_builds_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "refresh_token": "1//new",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.file"
            })))
            .mount(&server)
            .await;

        let credential = client(&server)
            .exchange_code(
                "code",
                "verifier",
                "http://127.0.0.1:8080/callback",
                &["ignored".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(credential.access_token, "ya29.new");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//new"));
        assert_eq!(credential.scopes.len(), 2);
        assert!(!credential.is_expired());
    }
}
