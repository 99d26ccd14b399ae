//! First-time authorization with Google's installed-app grant.
//!
//! Reads the OAuth client downloaded from the Google Cloud console
//! (`credentials.json`), sends the user to Google's consent page with a
//! loopback redirect, receives the authorization code on a one-shot local
//! HTTP listener and exchanges it for tokens. The device-code grant is not
//! available for Gmail scopes, so the loopback redirect is the only
//! installed-app option.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::auth::{AuthorizedUser, GOOGLE_TOKEN_URL};
use super::error::AuthError;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// How long to wait for the browser to come back with a code.
const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_REQUEST_SIZE: usize = 8 * 1024;

const MAX_ERROR_BODY_LENGTH: usize = 200;

/// OAuth client of type "Desktop app" (or "Web application").
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(default)]
    installed: Option<ClientSecrets>,
    #[serde(default)]
    web: Option<ClientSecrets>,
}

/// Reads the client secrets file; a missing file is `Ok(None)`.
pub fn load_client_secrets(path: &Path) -> Result<Option<ClientSecrets>, AuthError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AuthError::ReadCredentialsFile {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let invalid = |reason: String| AuthError::InvalidCredentialsFile {
        path: path.to_path_buf(),
        reason,
    };
    let file: ClientSecretsFile = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
    file.installed
        .or(file.web)
        .map(Some)
        .ok_or_else(|| invalid("expected an \"installed\" or \"web\" client".to_string()))
}

/// Consent page address for `redirect_uri`. Offline access with a forced
/// consent prompt makes Google return a refresh token every time.
pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url, AuthError> {
    let base = secrets.auth_uri.as_deref().unwrap_or(GOOGLE_AUTH_URL);
    let scope = scopes.join(" ");
    Url::parse_with_params(
        base,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| AuthError::Authorization(format!("invalid authorization URL '{}': {}", base, e)))
}

/// Extracts the authorization code from the browser's redirect request.
///
/// Requests without `code`, `error` or `state` (a favicon fetch, say) are
/// `Ok(None)` so the listener keeps waiting.
pub fn parse_callback(request: &str, expected_state: &str) -> Result<Option<String>, AuthError> {
    let target = request
        .lines()
        .next()
        .and_then(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("GET"), Some(target)) => Some(target),
                _ => None,
            }
        })
        .ok_or_else(|| AuthError::Authorization("malformed redirect request".to_string()))?;

    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .map_err(|e| AuthError::Authorization(format!("malformed redirect target: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::Authorization(format!(
            "Google declined the authorization: {}",
            error
        )));
    }
    if code.is_none() && state.is_none() {
        return Ok(None);
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::Authorization(
            "redirect state does not match the request".to_string(),
        ));
    }
    code.map(Some)
        .ok_or_else(|| AuthError::Authorization("redirect carried no code".to_string()))
}

/// Accepts connections on `listener` until one carries the authorization
/// code (or an error) and answers the browser with a short page.
pub async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| AuthError::Authorization(format!("callback listener failed: {}", e)))?;
        debug!("Authorization callback connection from {}", peer);

        let request = match read_request(&mut stream).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring unreadable callback request: {}", e);
                continue;
            }
        };

        let outcome = parse_callback(&request, expected_state);
        let (status, body) = match &outcome {
            Ok(Some(_)) => ("200 OK", "labelsort is authorized. You can close this window."),
            Ok(None) => ("404 Not Found", "Not found."),
            Err(_) => ("400 Bad Request", "Authorization failed. Check the labelsort log."),
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        if let Err(e) = stream.write_all(response.as_bytes()).await {
            debug!("Could not answer the browser: {}", e);
        }
        let _ = stream.shutdown().await;

        match outcome {
            Ok(Some(code)) => return Ok(code),
            Ok(None) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Reads up to the end of the request headers.
async fn read_request(stream: &mut tokio::net::TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_SIZE {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl AuthorizedUser {
    /// Token file contents for a fresh grant.
    pub fn from_grant(secrets: &ClientSecrets, token: TokenResponse, requested: &[String]) -> Self {
        let scopes = match token.scope.as_deref() {
            Some(granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(String::from).collect()
            }
            _ => requested.to_vec(),
        };
        Self {
            token: Some(token.access_token),
            refresh_token: token.refresh_token,
            token_uri: Some(
                secrets
                    .token_uri
                    .clone()
                    .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            ),
            client_id: Some(secrets.client_id.clone()),
            client_secret: Some(secrets.client_secret.clone()),
            scopes,
            expiry: token
                .expires_in
                .map(|secs| (Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339()),
            extra: serde_json::Map::new(),
        }
    }
}

/// Interactive installed-app authorization.
pub struct InstalledAppFlow {
    secrets: ClientSecrets,
    scopes: Vec<String>,
    http: Client,
}

impl InstalledAppFlow {
    pub fn new(secrets: ClientSecrets, scopes: Vec<String>) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Authorization(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            secrets,
            scopes,
            http,
        })
    }

    /// Prints the consent URL, waits for the redirect on a free local port
    /// and exchanges the code for tokens.
    pub async fn run_local_server(&self) -> Result<AuthorizedUser, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| AuthError::Authorization(format!("cannot open callback port: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Authorization(format!("cannot read callback port: {}", e)))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = authorization_url(&self.secrets, &redirect_uri, &self.scopes, &state)?;

        info!("Waiting for Gmail authorization on {}", redirect_uri);
        eprintln!(
            "Open this address in a browser to let labelsort access Gmail:\n\n    {}\n",
            url
        );

        let code = tokio::time::timeout(AUTHORIZATION_TIMEOUT, wait_for_code(&listener, &state))
            .await
            .map_err(|_| {
                AuthError::Authorization(format!(
                    "no authorization received within {}s",
                    AUTHORIZATION_TIMEOUT.as_secs()
                ))
            })??;

        let token = self.exchange_code(&code, &redirect_uri).await?;
        if token.refresh_token.is_none() {
            warn!("Google returned no refresh token; the next run will ask again once this token expires");
        }
        info!("Gmail authorization granted");
        Ok(AuthorizedUser::from_grant(&self.secrets, token, &self.scopes))
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse, AuthError> {
        let token_url = self.secrets.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URL);
        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Authorization(format!("code exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            return Err(AuthError::Authorization(format!(
                "code exchange failed ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Authorization(format!("failed to parse token response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "client-1.apps.googleusercontent.com".into(),
            client_secret: "shh".into(),
            auth_uri: None,
            token_uri: None,
        }
    }

    #[test]
    fn test_load_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let installed = dir.path().join("installed.json");
        std::fs::write(
            &installed,
            r#"{"installed":{"client_id":"id","client_secret":"s","token_uri":"https://oauth2.googleapis.com/token","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
        let web = dir.path().join("web.json");
        std::fs::write(&web, r#"{"web":{"client_id":"wid","client_secret":"ws"}}"#).unwrap();
        let other = dir.path().join("other.json");
        std::fs::write(&other, r#"{"type":"service_account"}"#).unwrap();

        let secrets = load_client_secrets(&installed).unwrap().unwrap();
        assert_eq!(secrets.client_id, "id");
        assert_eq!(
            secrets.token_uri.as_deref(),
            Some("https://oauth2.googleapis.com/token")
        );
        assert_eq!(load_client_secrets(&web).unwrap().unwrap().client_id, "wid");
        assert!(matches!(
            load_client_secrets(&other),
            Err(AuthError::InvalidCredentialsFile { .. })
        ));
        assert!(load_client_secrets(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_authorization_url() {
        let scopes = vec!["https://www.googleapis.com/auth/gmail.modify".to_string()];
        let url = authorization_url(&secrets(), "http://127.0.0.1:8765/", &scopes, "st4te").unwrap();

        assert!(url.as_str().starts_with(GOOGLE_AUTH_URL));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-1.apps.googleusercontent.com");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8765/");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], scopes[0]);
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["state"], "st4te");
    }

    #[test]
    fn test_parse_callback() {
        let request = |target: &str| format!("GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", target);

        assert_eq!(
            parse_callback(&request("/?state=abc&code=4%2F0Ab&scope=x"), "abc").unwrap(),
            Some("4/0Ab".to_string())
        );
        assert_eq!(parse_callback(&request("/favicon.ico"), "abc").unwrap(), None);
        assert!(parse_callback(&request("/?state=evil&code=c"), "abc").is_err());
        assert!(parse_callback(&request("/?error=access_denied&state=abc"), "abc").is_err());
        assert!(parse_callback(&request("/?state=abc"), "abc").is_err());
        assert!(parse_callback("POST / HTTP/1.1\r\n\r\n", "abc").is_err());
    }

    #[tokio::test]
    async fn test_wait_for_code_skips_unrelated_requests() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            let mut replies = Vec::new();
            for target in ["/favicon.ico", "/?state=s1&code=the-code"] {
                let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(format!("GET {} HTTP/1.1\r\nHost: x\r\n\r\n", target).as_bytes())
                    .await
                    .unwrap();
                let mut reply = String::new();
                stream.read_to_string(&mut reply).await.unwrap();
                replies.push(reply);
            }
            replies
        });

        let code = wait_for_code(&listener, "s1").await.unwrap();
        let replies = browser.await.unwrap();

        assert_eq!(code, "the-code");
        assert!(replies[0].starts_with("HTTP/1.1 404"));
        assert!(replies[1].starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn test_grant_becomes_token_file() {
        let token = TokenResponse {
            access_token: "ya29.a".into(),
            expires_in: Some(3599),
            refresh_token: Some("1//r".into()),
            scope: None,
        };
        let scopes = vec!["https://www.googleapis.com/auth/gmail.modify".to_string()];

        let user = AuthorizedUser::from_grant(&secrets(), token, &scopes);

        assert!(user.has_valid_token(Utc::now()));
        assert_eq!(user.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(user.token_uri.as_deref(), Some(GOOGLE_TOKEN_URL));
        assert_eq!(user.client_secret.as_deref(), Some("shh"));
        assert_eq!(user.scopes, scopes);
    }
}
