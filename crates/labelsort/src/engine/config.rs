use std::collections::HashMap;

use crate::config::{Config, VerdictConfig};
use crate::error::ConfigError;

use super::prompt::PromptTemplate;
use super::retry::RetryPolicy;

/// Settings shared by every engine component for the length of a run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub category_prefix: String,
    pub inbox_label: String,
    pub model: String,
    pub max_candidates: usize,
    pub max_examples: usize,
    /// Per-category overrides of `max_examples`, keyed by display name or
    /// full label name.
    pub example_limits: HashMap<String, usize>,
    pub max_body_length: usize,
    pub base_query: String,
    pub prompt: PromptTemplate,
    pub verdict: VerdictConfig,
    pub retry: RetryPolicy,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            category_prefix: config.ai_folder_prefix.clone(),
            inbox_label: config.inbox_label_name.clone(),
            model: config.ollama_model.clone(),
            max_candidates: config.max_emails_to_scan_inbox,
            max_examples: config.max_examples_per_folder,
            example_limits: config.example_limits.clone(),
            max_body_length: config.max_body_length_for_llm,
            base_query: config.base_query.clone(),
            prompt: PromptTemplate::parse(&config.prompt_template())?,
            verdict: config.verdict.clone(),
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// Example budget for a category, honouring per-category overrides.
    pub fn example_limit(&self, display_name: &str, label_name: &str) -> usize {
        self.example_limits
            .get(display_name)
            .or_else(|| self.example_limits.get(label_name))
            .copied()
            .unwrap_or(self.max_examples)
    }
}
