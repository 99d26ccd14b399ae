use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use super::error::MailError;

pub type Result<T> = std::result::Result<T, MailError>;

/// A label as listed by the mail service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub name: String,
}

impl Label {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One page request of a message listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    /// Messages must carry every one of these label ids.
    pub label_ids: Vec<String>,
    /// Service-side search expression (e.g. `-in:spam -label:x`).
    pub query: Option<String>,
    pub max_results: usize,
    pub page_token: Option<String>,
}

impl MessageQuery {
    pub fn for_label(label_id: impl Into<String>, max_results: usize) -> Self {
        Self {
            label_ids: vec![label_id.into()],
            query: None,
            max_results,
            page_token: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = if query.trim().is_empty() {
            None
        } else {
            Some(query)
        };
        self
    }

    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// Reference to a listed message; details are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

/// A message with its headers and decoded body text.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    pub id: String,
    pub label_ids: Vec<String>,
    pub sender: String,
    pub subject: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub snippet: String,
    /// Full body text, whitespace-collapsed, not yet truncated.
    pub body: String,
}

/// Typed operations the engine needs from a mail service.
#[async_trait]
pub trait MailService: Send + Sync {
    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// Returns one page of messages matching the query, in service order.
    async fn list_messages(&self, query: &MessageQuery) -> Result<MessagePage>;

    async fn get_message(&self, id: &str) -> Result<FetchedMessage>;

    /// Current label ids of a message, fetched fresh.
    async fn message_labels(&self, id: &str) -> Result<Vec<String>>;

    /// Adds and removes labels in one request.
    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;
}
