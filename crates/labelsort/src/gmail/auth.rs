//! OAuth2 access tokens for the Gmail API.
//!
//! Reads the authorized-user file (`token.json`), refreshes the access token
//! at the token endpoint when it is missing or about to expire, and writes
//! the refreshed file back. Without a way to refresh, the interactive
//! installed-app flow in [`authorize`](super::authorize) creates the file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::secrets::{expand_home, resolve_secret_optional};

use super::authorize::{load_client_secrets, InstalledAppFlow};
use super::error::AuthError;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed up front.
const EXPIRY_SKEW_SECS: i64 = 60;

const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Contents of an authorized-user token file. Unknown keys are preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUser {
    /// A token without an expiry never expires; an unreadable expiry is
    /// treated as expired.
    pub fn has_valid_token(&self, now: DateTime<Utc>) -> bool {
        let Some(token) = self.token.as_deref() else {
            return false;
        };
        if token.is_empty() {
            return false;
        }
        match self.expiry.as_deref() {
            None => true,
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(expiry) => {
                    expiry.with_timezone(&Utc) - Duration::seconds(EXPIRY_SKEW_SECS) > now
                }
                Err(_) => false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Produces bearer tokens for [`GmailClient`](super::GmailClient).
pub struct GmailAuthenticator {
    config: AuthConfig,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl GmailAuthenticator {
    pub fn new(config: AuthConfig, scopes: Vec<String>) -> Self {
        Self {
            config,
            scopes,
            http: reqwest::Client::new(),
        }
    }

    pub fn token_path(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.config.token_file))
    }

    pub fn credentials_path(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.config.credentials_file))
    }

    /// Returns a usable access token, refreshing and persisting it if needed.
    /// Falls back to interactive authorization when the token cannot be
    /// refreshed.
    pub async fn access_token(&self) -> Result<SecretString, AuthError> {
        let path = self.token_path();
        let mut user = match load_token_file(&path) {
            Ok(user) => user.unwrap_or_default(),
            Err(e @ AuthError::ParseTokenFile(_)) => {
                warn!("Could not load {}: {}. A new authorization will be requested.", path.display(), e);
                AuthorizedUser::default()
            }
            Err(e) => return Err(e),
        };
        self.apply_configured_secrets(&mut user)?;

        if user.has_valid_token(Utc::now()) {
            debug!("Using stored Gmail access token from {}", path.display());
            return Ok(SecretString::from(user.token.clone().unwrap_or_default()));
        }

        if let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            user.refresh_token.as_deref(),
            user.client_id.as_deref(),
            user.client_secret.as_deref(),
        ) {
            info!("Refreshing Gmail access token...");
            let token_url = user.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URL);
            let refreshed = self
                .refresh(token_url, refresh_token, client_id, client_secret)
                .await;
            match refreshed {
                Ok(refreshed) => return Ok(self.store_refreshed(&path, user, refreshed)),
                Err(e) if self.credentials_path().exists() => {
                    warn!("{}. A new authorization will be requested.", e);
                }
                Err(e) => return Err(e),
            }
        }

        self.authorize(&path).await
    }

    fn store_refreshed(&self, path: &Path, mut user: AuthorizedUser, refreshed: RefreshResponse) -> SecretString {
        user.token = Some(refreshed.access_token.clone());
        user.expiry = refreshed
            .expires_in
            .map(|secs| (Utc::now() + Duration::seconds(secs)).to_rfc3339());
        if user.scopes.is_empty() {
            user.scopes = self.scopes.clone();
        }

        if let Err(e) = save_token_file(path, &user) {
            warn!("Could not save refreshed token: {}", e);
        } else {
            info!("Gmail access token saved to {}", path.display());
        }
        SecretString::from(refreshed.access_token)
    }

    /// Runs the installed-app flow with the OAuth client file and stores the
    /// resulting token file.
    async fn authorize(&self, token_path: &Path) -> Result<SecretString, AuthError> {
        let credentials = self.credentials_path();
        let Some(secrets) = load_client_secrets(&credentials)? else {
            return Err(AuthError::MissingCredentials(format!(
                "{} has no usable access token and {} does not exist. Download the \
                 OAuth client (type Desktop app) from the Google Cloud console to {}, \
                 or set auth.refresh_token / auth.client_id / auth.client_secret \
                 (or their _file / _env_var variants).",
                token_path.display(),
                credentials.display(),
                credentials.display()
            )));
        };

        info!("No usable Gmail token; starting authorization with {}", credentials.display());
        let user = InstalledAppFlow::new(secrets, self.scopes.clone())?
            .run_local_server()
            .await?;

        if let Err(e) = save_token_file(token_path, &user) {
            warn!("Could not save Gmail token: {}", e);
        } else {
            info!("Gmail access token saved to {}", token_path.display());
        }
        Ok(SecretString::from(user.token.unwrap_or_default()))
    }

    /// Secrets given in the config take precedence over the token file.
    fn apply_configured_secrets(&self, user: &mut AuthorizedUser) -> Result<(), AuthError> {
        let c = &self.config;
        if let Some(id) = resolve_secret_optional(
            c.client_id.as_deref(),
            c.client_id_file.as_deref(),
            c.client_id_env_var.as_deref(),
        )? {
            user.client_id = Some(id.expose_secret().to_string());
        }
        if let Some(secret) = resolve_secret_optional(
            c.client_secret.as_deref(),
            c.client_secret_file.as_deref(),
            c.client_secret_env_var.as_deref(),
        )? {
            user.client_secret = Some(secret.expose_secret().to_string());
        }
        if let Some(token) = resolve_secret_optional(
            c.refresh_token.as_deref(),
            c.refresh_token_file.as_deref(),
            c.refresh_token_env_var.as_deref(),
        )? {
            user.refresh_token = Some(token.expose_secret().to_string());
        }
        Ok(())
    }

    async fn refresh(
        &self,
        token_url: &str,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<RefreshResponse, AuthError> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            return Err(AuthError::Refresh(format!("{}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Refresh(format!("failed to parse refresh response: {}", e)))
    }
}

/// Reads the token file; a missing file is `Ok(None)`.
pub fn load_token_file(path: &Path) -> Result<Option<AuthorizedUser>, AuthError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(AuthError::ReadTokenFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn save_token_file(path: &Path, user: &AuthorizedUser) -> Result<(), AuthError> {
    let json = serde_json::to_string_pretty(user)?;
    std::fs::write(path, json).map_err(|source| AuthError::WriteTokenFile {
        path: path.to_path_buf(),
        source,
    })
}
