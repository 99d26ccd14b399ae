//! Engine error kinds. Only [`EngineError`] aborts a run; the others are
//! logged where they occur and counted in the run summary.

use thiserror::Error;

use crate::gmail::MailError;
use crate::llm::LlmError;

/// Failures that end a run early.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Catalog resolution failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Inbox scan failed: {0}")]
    Scan(#[from] ScanError),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to list labels after {attempts} attempt(s): {source}")]
    ListLabels {
        attempts: u32,
        #[source]
        source: MailError,
    },

    #[error("Inbox label '{0}' not found in the mailbox")]
    InboxNotFound(String),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to list messages in '{label}' after {attempts} attempt(s): {source}")]
    ListMessages {
        label: String,
        attempts: u32,
        #[source]
        source: MailError,
    },
}

#[derive(Error, Debug)]
pub enum CorpusFetchError {
    #[error("Failed to list examples for '{category}': {source}")]
    List {
        category: String,
        #[source]
        source: MailError,
    },

    #[error("Failed to fetch example {message_id} for '{category}': {source}")]
    Fetch {
        category: String,
        message_id: String,
        #[source]
        source: MailError,
    },
}

#[derive(Error, Debug)]
#[error("Classifying {candidate_id} against '{category}' failed after {attempts} attempt(s): {source}")]
pub struct ClassificationError {
    pub candidate_id: String,
    pub category: String,
    pub attempts: u32,
    #[source]
    pub source: LlmError,
}

#[derive(Error, Debug)]
#[error("Moving {message_id} to '{category}' failed: {source}")]
pub struct MutationError {
    pub message_id: String,
    pub category: String,
    #[source]
    pub source: MailError,
}
