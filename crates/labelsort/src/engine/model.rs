//! Values passed between the engine stages.

use chrono::{DateTime, FixedOffset};

use crate::gmail::FetchedMessage;

pub const UNKNOWN_DATE: &str = "Unknown Date";

/// A destination label identified by the category prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    /// Full label name, prefix included.
    pub label_name: String,
    /// Label name with the prefix stripped, shown to the model.
    pub name: String,
    /// Upper bound on examples loaded for this category.
    pub example_limit: usize,
}

/// Message fields used to build prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFields {
    pub sender: String,
    pub subject: String,
    pub received: String,
    pub snippet: String,
    /// Body text cut to the configured excerpt length.
    pub body_excerpt: String,
}

impl MessageFields {
    pub fn from_fetched(message: &FetchedMessage, max_body_chars: usize) -> Self {
        Self {
            sender: message.sender.clone(),
            subject: message.subject.clone(),
            received: format_received(message.date.as_ref()),
            snippet: message.snippet.clone(),
            body_excerpt: truncate_excerpt(&message.body, max_body_chars),
        }
    }

    /// Messages with neither subject nor body carry nothing to compare.
    pub fn is_empty(&self) -> bool {
        self.subject.trim().is_empty() && self.body_excerpt.trim().is_empty()
    }
}

/// A message already filed under a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleMessage {
    pub id: String,
    pub fields: MessageFields,
}

impl ExampleMessage {
    pub fn from_fetched(message: &FetchedMessage, max_body_chars: usize) -> Self {
        Self {
            id: message.id.clone(),
            fields: MessageFields::from_fetched(message, max_body_chars),
        }
    }
}

/// An inbox message carrying no category label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    /// Label ids as seen when the candidate was fetched.
    pub label_ids: Vec<String>,
    pub fields: MessageFields,
}

impl Candidate {
    pub fn from_fetched(message: &FetchedMessage, max_body_chars: usize) -> Self {
        Self {
            id: message.id.clone(),
            label_ids: message.label_ids.clone(),
            fields: MessageFields::from_fetched(message, max_body_chars),
        }
    }
}

/// Outcome of comparing one candidate with one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub candidate_id: String,
    pub category_id: String,
    pub matched: bool,
    /// Raw model output; empty when the model was not consulted.
    pub raw_response: String,
}

/// Per-candidate progress through a run.
///
/// `Fetched -> UnderEvaluation -> (Matched -> MutationAttempted -> Moved | AlreadyFiled | MoveFailed) | NoMatch`,
/// with `Interrupted` reachable before a mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateState {
    Fetched,
    UnderEvaluation,
    Matched { category_id: String },
    MutationAttempted { category_id: String },
    Moved { category_id: String },
    AlreadyFiled { category_id: String },
    MoveFailed { category_id: String },
    NoMatch,
    Interrupted,
}

impl CandidateState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateState::Moved { .. }
                | CandidateState::AlreadyFiled { .. }
                | CandidateState::MoveFailed { .. }
                | CandidateState::NoMatch
                | CandidateState::Interrupted
        )
    }
}

/// Cuts `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

pub fn format_received(date: Option<&DateTime<FixedOffset>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M:%S %z").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}
