//! Moves a matched candidate from the inbox into its category.

use std::sync::Arc;

use crate::gmail::MailService;

use super::config::EngineConfig;
use super::error::MutationError;
use super::model::{Candidate, Category};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// The message already carried the category label; nothing was sent.
    AlreadyFiled,
}

pub struct LabelMutator {
    mail: Arc<dyn MailService>,
    config: Arc<EngineConfig>,
}

impl LabelMutator {
    pub fn new(mail: Arc<dyn MailService>, config: Arc<EngineConfig>) -> Self {
        Self { mail, config }
    }

    /// Adds the category label and removes the inbox label in a single
    /// request. The request is never repeated, so a failure leaves the
    /// message where it was.
    pub async fn apply(
        &self,
        candidate: &Candidate,
        category: &Category,
        inbox_id: &str,
    ) -> Result<MoveOutcome, MutationError> {
        let current = match self
            .config
            .retry
            .run("read labels", || self.mail.message_labels(&candidate.id))
            .await
        {
            Ok(labels) => labels,
            Err(e) => {
                log::warn!(
                    "Could not re-read labels of {} ({}); using labels from scan",
                    candidate.id,
                    e.error
                );
                candidate.label_ids.clone()
            }
        };

        if current.iter().any(|l| *l == category.id) {
            log::info!("{} is already in '{}'", candidate.id, category.name);
            return Ok(MoveOutcome::AlreadyFiled);
        }

        self.mail
            .modify_labels(
                &candidate.id,
                std::slice::from_ref(&category.id),
                &[inbox_id.to_string()],
            )
            .await
            .map_err(|source| MutationError {
                message_id: candidate.id.clone(),
                category: category.name.clone(),
                source,
            })?;

        log::info!(
            "Moved {} ({:?}) to '{}'",
            candidate.id,
            candidate.fields.subject,
            category.label_name
        );
        Ok(MoveOutcome::Moved)
    }
}
