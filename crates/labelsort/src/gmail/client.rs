//! Gmail REST API v1 client.
//!
//! Endpoints used:
//! - `users.labels.list` for the label catalog
//! - `users.messages.list` for paged message listings
//! - `users.messages.get` (`full` and `minimal` formats)
//! - `users.messages.modify` for label changes

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::MailError;
use super::message::GmailMessage;
use super::service::{
    FetchedMessage, Label, MailService, MessagePage, MessageQuery, MessageRef, Result,
};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail caps `maxResults` on message listings.
const MAX_PAGE_SIZE: usize = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 300;

#[derive(Debug, Deserialize)]
struct LabelsListResponse {
    #[serde(default)]
    labels: Vec<GmailLabel>,
}

#[derive(Debug, Deserialize)]
struct GmailLabel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageListEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageListEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinimalMessage {
    #[serde(default)]
    label_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    add_label_ids: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    remove_label_ids: &'a [String],
}

/// Authenticated Gmail API client.
pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl GmailClient {
    /// Creates a client for the signed-in user's mailbox.
    pub fn new(access_token: SecretString) -> Result<Self> {
        Self::with_base_url(GMAIL_API_BASE, access_token)
    }

    /// Creates a client against a different API root (used for proxies and tests).
    pub fn with_base_url(base_url: impl Into<String>, access_token: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.access_token.expose_secret()))
            .map_err(|e| MailError::Authentication(format!("invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {} {:?}", endpoint, query);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| MailError::Parse(format!("{}: {}", endpoint, e)))
    }

    async fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<()> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", endpoint);

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

/// Maps a non-success response to a [`MailError`].
async fn error_from_response(response: reqwest::Response) -> MailError {
    let status = response.status().as_u16();
    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();

    status_to_error(status, body, retry_after_secs)
}

fn status_to_error(status: u16, body: String, retry_after_secs: Option<u64>) -> MailError {
    match status {
        401 | 403 => MailError::Authentication(format!("HTTP {}: {}", status, body)),
        404 => MailError::NotFound(body),
        429 => MailError::RateLimited { retry_after_secs },
        _ => MailError::Api {
            status,
            message: body,
        },
    }
}

fn list_params(query: &MessageQuery) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&'static str, String)> = query
        .label_ids
        .iter()
        .map(|id| ("labelIds", id.clone()))
        .collect();
    if let Some(q) = &query.query {
        params.push(("q", q.clone()));
    }
    params.push((
        "maxResults",
        query.max_results.clamp(1, MAX_PAGE_SIZE).to_string(),
    ));
    if let Some(token) = &query.page_token {
        params.push(("pageToken", token.clone()));
    }
    params
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_labels(&self) -> Result<Vec<Label>> {
        let response: LabelsListResponse = self.get("/labels", &[]).await?;
        Ok(response
            .labels
            .into_iter()
            .map(|l| Label::new(l.id, l.name))
            .collect())
    }

    async fn list_messages(&self, query: &MessageQuery) -> Result<MessagePage> {
        let response: MessageListResponse = self.get("/messages", &list_params(query)).await?;
        Ok(MessagePage {
            messages: response
                .messages
                .into_iter()
                .map(|m| MessageRef { id: m.id })
                .collect(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn get_message(&self, id: &str) -> Result<FetchedMessage> {
        let message: GmailMessage = self
            .get(
                &format!("/messages/{}", id),
                &[("format", "full".to_string())],
            )
            .await?;
        Ok(message.into_fetched())
    }

    async fn message_labels(&self, id: &str) -> Result<Vec<String>> {
        let message: MinimalMessage = self
            .get(
                &format!("/messages/{}", id),
                &[("format", "minimal".to_string())],
            )
            .await?;
        Ok(message.label_ids)
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        let body = ModifyRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        self.post(&format!("/messages/{}/modify", id), &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_base_url() {
        let client =
            GmailClient::with_base_url("http://localhost:9000/", SecretString::from("t")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_list_params() {
        let query = MessageQuery::for_label("INBOX", 2000)
            .with_query("-in:spam -label:AI_AUTO_News")
            .with_page_token(Some("next".to_string()));
        let params = list_params(&query);
        assert_eq!(
            params,
            vec![
                ("labelIds", "INBOX".to_string()),
                ("q", "-in:spam -label:AI_AUTO_News".to_string()),
                ("maxResults", "500".to_string()),
                ("pageToken", "next".to_string()),
            ]
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_to_error(401, String::new(), None),
            MailError::Authentication(_)
        ));
        assert!(matches!(
            status_to_error(404, "gone".to_string(), None),
            MailError::NotFound(_)
        ));
        assert!(matches!(
            status_to_error(429, String::new(), Some(7)),
            MailError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
        let err = status_to_error(502, "bad gateway".to_string(), None);
        assert!(err.is_transient());
    }

    #[test]
    fn test_modify_request_omits_empty_lists() {
        let add = vec!["Label_1".to_string()];
        let body = ModifyRequest {
            add_label_ids: &add,
            remove_label_ids: &[],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"addLabelIds":["Label_1"]}"#);
    }
}
