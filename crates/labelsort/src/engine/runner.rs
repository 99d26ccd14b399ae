//! Run coordinator.

use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::gmail::MailService;
use crate::llm::LanguageModel;

use super::cancel::CancellationFlag;
use super::catalog::{Catalog, CatalogResolver};
use super::classifier::SimilarityClassifier;
use super::config::EngineConfig;
use super::corpus::{Corpus, CorpusLoader};
use super::error::EngineError;
use super::model::{Candidate, CandidateState};
use super::mutator::{LabelMutator, MoveOutcome};
use super::scanner::CandidateScanner;
use super::summary::RunSummary;

pub struct Engine {
    config: Arc<EngineConfig>,
    resolver: CatalogResolver,
    loader: CorpusLoader,
    scanner: CandidateScanner,
    classifier: SimilarityClassifier,
    mutator: LabelMutator,
    cancel: CancellationFlag,
}

impl Engine {
    pub fn new(
        mail: Arc<dyn MailService>,
        llm: Arc<dyn LanguageModel>,
        config: EngineConfig,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            resolver: CatalogResolver::new(mail.clone(), config.clone()),
            loader: CorpusLoader::new(mail.clone(), config.clone()),
            scanner: CandidateScanner::new(mail.clone(), config.clone()),
            classifier: SimilarityClassifier::new(llm, config.clone()),
            mutator: LabelMutator::new(mail, config.clone()),
            config,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops the run at the next candidate or category boundary.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Performs one full classification and sync pass.
    ///
    /// Only catalog and scan failures abort the run; every per-message
    /// failure is counted in the summary instead.
    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let span = info_span!("run", run_id = %Uuid::new_v4(), model = %self.config.model);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::default();

        let catalog = self
            .resolver
            .resolve()
            .instrument(info_span!("resolve_catalog"))
            .await?;
        summary.categories = catalog.categories().len();
        if catalog.is_empty() {
            return Ok(summary);
        }

        let load = self
            .loader
            .load(&catalog)
            .instrument(info_span!("load_corpus"))
            .await;
        summary.examples = load.corpus.total_examples();
        summary.corpus_errors = load.errors;
        let corpus = load.corpus;

        let scan = self
            .scanner
            .scan(&catalog, &self.cancel)
            .instrument(info_span!("scan_inbox"))
            .await?;
        summary.scanned = scan.candidates.len();
        summary.skipped = scan.skipped;
        if scan.excluded > 0 {
            debug!(excluded = scan.excluded, "Dropped already-categorized messages");
        }

        for candidate in &scan.candidates {
            if self.cancel.is_cancelled() {
                summary.record(&CandidateState::Interrupted);
                break;
            }
            let span = info_span!("candidate", message_id = %candidate.id);
            let state = self
                .process(candidate, &catalog, &corpus, &mut summary)
                .instrument(span)
                .await;
            summary.record(&state);
            if state == CandidateState::Interrupted {
                break;
            }
        }
        if self.cancel.is_cancelled() && !summary.interrupted {
            summary.interrupted = true;
        }

        if summary.interrupted {
            warn!("Run stopped early on request");
        }
        info!(
            scanned = summary.scanned,
            matched = summary.matched,
            moved = summary.moved,
            failed = summary.failed,
            "Run finished"
        );
        Ok(summary)
    }

    async fn process(
        &self,
        candidate: &Candidate,
        catalog: &Catalog,
        corpus: &Corpus,
        summary: &mut RunSummary,
    ) -> CandidateState {
        debug!(state = ?CandidateState::UnderEvaluation, subject = %candidate.fields.subject);
        let classification = self
            .classifier
            .classify(candidate, catalog, corpus, &self.cancel)
            .await;
        summary.classification_errors += classification.errors;

        let Some((category, _verdict)) = classification.matched else {
            return if classification.interrupted {
                CandidateState::Interrupted
            } else {
                debug!("No category matched");
                CandidateState::NoMatch
            };
        };
        let category_id = category.id.clone();
        let matched = CandidateState::Matched {
            category_id: category_id.clone(),
        };
        debug!(state = ?matched, category = %category.name);
        let attempt = CandidateState::MutationAttempted {
            category_id: category_id.clone(),
        };
        debug!(state = ?attempt);

        match self
            .mutator
            .apply(candidate, &category, &catalog.inbox().id)
            .await
        {
            Ok(MoveOutcome::Moved) => CandidateState::Moved { category_id },
            Ok(MoveOutcome::AlreadyFiled) => CandidateState::AlreadyFiled { category_id },
            Err(e) => {
                error!("{}", e);
                CandidateState::MoveFailed { category_id }
            }
        }
    }
}
