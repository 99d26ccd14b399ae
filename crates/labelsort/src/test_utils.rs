//! In-memory mail service and language model for tests.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for the
//! integration tests under `tests/`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::engine::{EngineConfig, RetryPolicy};
use crate::gmail::{FetchedMessage, Label, MailError, MailService, MessagePage, MessageQuery, MessageRef};
use crate::llm::{LanguageModel, LlmError, LlmResult};

/// Engine settings with defaults and a fast retry policy.
pub fn engine_config() -> EngineConfig {
    engine_config_from(Config::default())
}

pub fn engine_config_from(config: Config) -> EngineConfig {
    let mut engine = EngineConfig::from_config(&config).expect("valid config");
    engine.retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(4));
    engine
}

/// A recorded `modify_labels` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyCall {
    pub message_id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

#[derive(Default)]
struct MailboxState {
    labels: Vec<Label>,
    messages: Vec<FetchedMessage>,
    failing_gets: HashSet<String>,
    failing_modifies: HashSet<String>,
    failing_label_listing: bool,
    failing_message_listing: bool,
    queries: Vec<MessageQuery>,
    modifies: Vec<ModifyCall>,
}

/// Mailbox held in memory. Listing returns messages in insertion order and
/// ignores the search expression, so label exclusion must happen in the
/// engine.
pub struct FakeMailbox {
    state: Mutex<MailboxState>,
    page_size: usize,
}

impl Default for FakeMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MailboxState::default()),
            page_size: 100,
        }
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.state.lock().unwrap().labels.push(Label::new(id, name));
    }

    pub fn add_message(&self, message: FetchedMessage) {
        self.state.lock().unwrap().messages.push(message);
    }

    /// Adds a plain message whose snippet is the start of `body`.
    pub fn add_text_message(&self, id: &str, labels: &[&str], sender: &str, subject: &str, body: &str) {
        self.add_message(FetchedMessage {
            id: id.to_string(),
            label_ids: labels.iter().map(|l| l.to_string()).collect(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            date: None,
            snippet: body.chars().take(40).collect(),
            body: body.to_string(),
        });
    }

    pub fn fail_get(&self, id: &str) {
        self.state.lock().unwrap().failing_gets.insert(id.to_string());
    }

    pub fn fail_modify(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_modifies
            .insert(id.to_string());
    }

    pub fn fail_label_listing(&self) {
        self.state.lock().unwrap().failing_label_listing = true;
    }

    pub fn fail_message_listing(&self) {
        self.state.lock().unwrap().failing_message_listing = true;
    }

    pub fn labels_of(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.label_ids.clone())
            .unwrap_or_default()
    }

    /// Label sets of every message, keyed by id.
    pub fn snapshot(&self) -> HashMap<String, Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .map(|m| (m.id.clone(), m.label_ids.clone()))
            .collect()
    }

    pub fn modifies(&self) -> Vec<ModifyCall> {
        self.state.lock().unwrap().modifies.clone()
    }

    pub fn modify_count(&self) -> usize {
        self.state.lock().unwrap().modifies.len()
    }

    pub fn queries(&self) -> Vec<MessageQuery> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn last_query(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .queries
            .last()
            .and_then(|q| q.query.clone())
    }
}

#[async_trait]
impl MailService for FakeMailbox {
    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        let state = self.state.lock().unwrap();
        if state.failing_label_listing {
            return Err(MailError::Authentication("token revoked".to_string()));
        }
        Ok(state.labels.clone())
    }

    async fn list_messages(&self, query: &MessageQuery) -> Result<MessagePage, MailError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());
        if state.failing_message_listing {
            return Err(MailError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }

        let matching: Vec<String> = state
            .messages
            .iter()
            .filter(|m| query.label_ids.iter().all(|l| m.label_ids.contains(l)))
            .map(|m| m.id.clone())
            .collect();
        let offset: usize = query
            .page_token
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let messages: Vec<MessageRef> = matching
            .iter()
            .skip(offset)
            .take(query.max_results.min(self.page_size))
            .map(|id| MessageRef { id: id.clone() })
            .collect();
        let next = offset + messages.len();

        Ok(MessagePage {
            messages,
            next_page_token: (next < matching.len()).then(|| next.to_string()),
        })
    }

    async fn get_message(&self, id: &str) -> Result<FetchedMessage, MailError> {
        let state = self.state.lock().unwrap();
        if state.failing_gets.contains(id) {
            return Err(MailError::NotFound(id.to_string()));
        }
        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| MailError::NotFound(id.to_string()))
    }

    async fn message_labels(&self, id: &str) -> Result<Vec<String>, MailError> {
        Ok(self.labels_of(id))
    }

    async fn modify_labels(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), MailError> {
        let mut state = self.state.lock().unwrap();
        state.modifies.push(ModifyCall {
            message_id: id.to_string(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        });
        if state.failing_modifies.contains(id) {
            return Err(MailError::Api {
                status: 500,
                message: "modify failed".to_string(),
            });
        }

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| MailError::NotFound(id.to_string()))?;
        message.label_ids.retain(|l| !remove.contains(l));
        for label in add {
            if !message.label_ids.contains(label) {
                message.label_ids.push(label.clone());
            }
        }
        Ok(())
    }
}

/// One scripted model rule: when every needle occurs in the prompt, reply.
struct Rule {
    needles: Vec<String>,
    reply: Result<String, fn() -> LlmError>,
}

/// Language model answering from scripted rules; unmatched prompts get the
/// default reply. The first matching rule wins.
pub struct ScriptedModel {
    rules: Vec<Rule>,
    default_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(default_reply: &str) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_when(mut self, needles: &[&str], reply: &str) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            reply: Ok(reply.to_string()),
        });
        self
    }

    pub fn fail_when(mut self, needles: &[&str], error: fn() -> LlmError) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            reply: Err(error),
        });
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, _model: &str) -> LlmResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let rule = self
            .rules
            .iter()
            .find(|r| r.needles.iter().all(|n| prompt.contains(n.as_str())));
        match rule {
            Some(Rule { reply: Ok(text), .. }) => Ok(text.clone()),
            Some(Rule {
                reply: Err(error), ..
            }) => Err(error()),
            None => Ok(self.default_reply.clone()),
        }
    }
}
