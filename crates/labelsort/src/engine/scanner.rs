//! Lists unfiled inbox messages and fetches their content.

use std::collections::HashSet;
use std::sync::Arc;

use crate::gmail::{MailError, MailService, MessageQuery, MessageRef};

use super::cancel::CancellationFlag;
use super::catalog::Catalog;
use super::config::EngineConfig;
use super::error::ScanError;
use super::model::Candidate;
use super::retry::{Exhausted, RetryPolicy};

/// Follows page tokens until `limit` references are collected or the
/// listing ends. References keep the service's order.
pub(crate) async fn collect_refs(
    mail: &dyn MailService,
    retry: &RetryPolicy,
    query: MessageQuery,
    limit: usize,
) -> Result<Vec<MessageRef>, Exhausted<MailError>> {
    let mut refs: Vec<MessageRef> = Vec::new();
    let mut seen_tokens = HashSet::new();
    let mut page_token: Option<String> = None;

    while refs.len() < limit {
        let page_query = MessageQuery {
            max_results: limit - refs.len(),
            ..query.clone()
        }
        .with_page_token(page_token.clone());

        let page = retry
            .run("list messages", || mail.list_messages(&page_query))
            .await?;
        refs.extend(page.messages);

        match page.next_page_token {
            Some(token) if seen_tokens.insert(token.clone()) => page_token = Some(token),
            Some(token) => {
                log::warn!("Message listing repeated page token {}; stopping", token);
                break;
            }
            None => break,
        }
    }

    refs.truncate(limit);
    Ok(refs)
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub candidates: Vec<Candidate>,
    /// Listed messages dropped for missing content or a failed fetch.
    pub skipped: usize,
    /// Listed messages that already carry a category label.
    pub excluded: usize,
}

pub struct CandidateScanner {
    mail: Arc<dyn MailService>,
    config: Arc<EngineConfig>,
}

impl CandidateScanner {
    pub fn new(mail: Arc<dyn MailService>, config: Arc<EngineConfig>) -> Self {
        Self { mail, config }
    }

    /// Collects up to `max_candidates` unfiled messages with content. Pages
    /// are listed until that many are accepted or the listing ends, so
    /// excluded and skipped messages do not use up the budget.
    pub async fn scan(
        &self,
        catalog: &Catalog,
        cancel: &CancellationFlag,
    ) -> Result<ScanResult, ScanError> {
        let inbox = catalog.inbox();
        let limit = self.config.max_candidates;
        let query = MessageQuery::for_label(inbox.id.clone(), limit)
            .with_query(catalog.exclusion_query(&self.config.base_query));
        log::debug!("Scanning '{}' with query {:?}", inbox.name, query.query);

        let mut result = ScanResult::default();
        let mut listed = 0usize;
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;

        'pages: while result.candidates.len() < limit {
            let page_query = MessageQuery {
                max_results: limit - result.candidates.len(),
                ..query.clone()
            }
            .with_page_token(page_token.clone());

            let page = self
                .config
                .retry
                .run("list messages", || self.mail.list_messages(&page_query))
                .await
                .map_err(|e| ScanError::ListMessages {
                    label: inbox.name.clone(),
                    attempts: e.attempts,
                    source: e.error,
                })?;
            listed += page.messages.len();

            for message_ref in page.messages {
                if cancel.is_cancelled() || result.candidates.len() >= limit {
                    break 'pages;
                }
                self.consider(&message_ref, catalog, &mut result).await;
            }

            match page.next_page_token {
                Some(token) if seen_tokens.insert(token.clone()) => page_token = Some(token),
                Some(token) => {
                    log::warn!("Message listing repeated page token {}; stopping", token);
                    break;
                }
                None => break,
            }
        }

        log::info!(
            "Found {} message(s) to consider in '{}' ({} listed)",
            result.candidates.len(),
            inbox.name,
            listed
        );
        Ok(result)
    }

    async fn consider(&self, message_ref: &MessageRef, catalog: &Catalog, result: &mut ScanResult) {
        let fetched = self
            .config
            .retry
            .run("fetch message", || self.mail.get_message(&message_ref.id))
            .await;
        let message = match fetched {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Skipping {}: {}", message_ref.id, e.error);
                result.skipped += 1;
                return;
            }
        };

        if catalog.carries_category(&message.label_ids) {
            log::debug!("Skipping {}: already carries a category label", message.id);
            result.excluded += 1;
            return;
        }

        let candidate = Candidate::from_fetched(&message, self.config.max_body_length);
        if candidate.fields.is_empty() {
            log::warn!("Skipping {}: no subject or body", candidate.id);
            result.skipped += 1;
            return;
        }
        result.candidates.push(candidate);
    }
}
