use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Built-in similarity prompt, used when the config file carries none.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are an email filing assistant. Decide whether a NEW email belongs in the folder \"{category_name}\".
The folder is defined only by the example emails already filed in it:

{example_emails_formatted_text}

NEW email:
  Sender: {new_email_sender}
  Subject: {new_email_subject}
  Received Date: {new_email_date}
  Body Snippet: {new_email_snippet}
  Body (first {max_body_length_for_llm} chars): {new_email_body}

Does the NEW email belong in \"{category_name}\" because it comes from the same kind of sender and is the same kind of message as the examples?
Answer with exactly one word: YES or NO.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_gmail_scopes")]
    pub gmail_scopes: Vec<String>,
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default = "default_temperature")]
    pub ollama_temperature: f32,
    #[serde(default = "default_ollama_timeout")]
    pub ollama_timeout_secs: u64,
    #[serde(default = "default_prefix")]
    pub ai_folder_prefix: String,
    #[serde(default = "default_inbox_label")]
    pub inbox_label_name: String,
    #[serde(default = "default_max_scan")]
    pub max_emails_to_scan_inbox: usize,
    #[serde(default = "default_max_examples")]
    pub max_examples_per_folder: usize,
    /// Per-category overrides of `max_examples_per_folder`, keyed by display name.
    #[serde(default)]
    pub example_limits: HashMap<String, usize>,
    #[serde(default = "default_max_body_length")]
    pub max_body_length_for_llm: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(
        rename = "similarity_prompt_v3",
        alias = "similarity_prompt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub similarity_prompt: Option<PromptLines>,
    #[serde(default = "default_base_query")]
    pub base_query: String,
    #[serde(default)]
    pub verdict: VerdictConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Returns the prompt template text, joining line arrays with newlines.
    pub fn prompt_template(&self) -> String {
        match &self.similarity_prompt {
            Some(lines) => lines.joined(),
            None => DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gmail_scopes: default_gmail_scopes(),
            ollama_host: default_ollama_host(),
            ollama_model: default_ollama_model(),
            ollama_temperature: default_temperature(),
            ollama_timeout_secs: default_ollama_timeout(),
            ai_folder_prefix: default_prefix(),
            inbox_label_name: default_inbox_label(),
            max_emails_to_scan_inbox: default_max_scan(),
            max_examples_per_folder: default_max_examples(),
            example_limits: HashMap::new(),
            max_body_length_for_llm: default_max_body_length(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            similarity_prompt: None,
            base_query: default_base_query(),
            verdict: VerdictConfig::default(),
            retry: RetryConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

fn default_gmail_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/gmail.modify".to_string()]
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen:14b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_ollama_timeout() -> u64 {
    120
}

fn default_prefix() -> String {
    "AI_AUTO_".to_string()
}

fn default_inbox_label() -> String {
    "INBOX".to_string()
}

fn default_max_scan() -> usize {
    50
}

fn default_max_examples() -> usize {
    1
}

fn default_max_body_length() -> usize {
    1000
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_base_query() -> String {
    "-in:spam -in:trash".to_string()
}

/// A prompt template given either as one string or as an array of lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptLines {
    Text(String),
    Lines(Vec<String>),
}

impl PromptLines {
    pub fn joined(&self) -> String {
        match self {
            PromptLines::Text(text) => text.clone(),
            PromptLines::Lines(lines) => lines.join("\n"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// How the raw model response is turned into a match decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictConfig {
    #[serde(default = "default_affirmative")]
    pub affirmative_token: String,
    #[serde(default = "default_negative")]
    pub negative_token: String,
    /// Accept the affirmative token as a standalone word inside a longer
    /// answer, provided the negative token does not also appear.
    #[serde(default)]
    pub allow_word_match: bool,
}

fn default_affirmative() -> String {
    "YES".to_string()
}

fn default_negative() -> String {
    "NO".to_string()
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            affirmative_token: default_affirmative(),
            negative_token: default_negative(),
            allow_word_match: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Gmail OAuth2 settings. Client credentials and the refresh token may come
/// from the token file or from direct values, files or environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_token_file")]
    pub token_file: String,
    /// OAuth client used for the first interactive authorization.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_id_file: Option<String>,
    #[serde(default)]
    pub client_id_env_var: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_secret_file: Option<String>,
    #[serde(default)]
    pub client_secret_env_var: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_token_file: Option<String>,
    #[serde(default)]
    pub refresh_token_env_var: Option<String>,
}

fn default_token_file() -> String {
    "token.json".to_string()
}

fn default_credentials_file() -> String {
    "credentials.json".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            credentials_file: default_credentials_file(),
            client_id: None,
            client_id_file: None,
            client_id_env_var: None,
            client_secret: None,
            client_secret_file: None,
            client_secret_env_var: None,
            refresh_token: None,
            refresh_token_file: None,
            refresh_token_env_var: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lines_are_joined() {
        let lines = PromptLines::Lines(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(lines.joined(), "a\nb");
        assert_eq!(PromptLines::Text("x".to_string()).joined(), "x");
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.ai_folder_prefix, "AI_AUTO_");
        assert_eq!(config.inbox_label_name, "INBOX");
        assert_eq!(config.max_examples_per_folder, 1);
        assert_eq!(config.max_body_length_for_llm, 1000);
        assert_eq!(config.verdict.affirmative_token, "YES");
        assert!(!config.verdict.allow_word_match);
        assert_eq!(config.prompt_template(), DEFAULT_PROMPT_TEMPLATE);
    }

    #[test]
    fn test_legacy_prompt_key() {
        let config: Config =
            serde_json::from_str(r#"{ "similarity_prompt_v3": ["Is {new_email_subject} ok?"] }"#)
                .unwrap();
        assert_eq!(config.prompt_template(), "Is {new_email_subject} ok?");
    }
}
