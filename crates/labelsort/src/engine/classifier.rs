//! Asks the language model whether a candidate resembles a category.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info_span, Instrument};

use crate::config::VerdictConfig;
use crate::llm::LanguageModel;

use super::cancel::CancellationFlag;
use super::catalog::Catalog;
use super::config::EngineConfig;
use super::corpus::Corpus;
use super::error::ClassificationError;
use super::model::{Candidate, Category, ExampleMessage, Verdict};
use super::prompt::PromptFields;

static RE_THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").unwrap());

static RE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}_]+").unwrap());

/// Decides whether a raw model answer is affirmative. Anything that is not
/// recognisably affirmative counts as a non-match.
#[derive(Debug, Clone)]
pub struct VerdictParser {
    affirmative: String,
    negative: String,
    allow_word_match: bool,
}

impl VerdictParser {
    pub fn new(config: &VerdictConfig) -> Self {
        Self {
            affirmative: config.affirmative_token.trim().to_lowercase(),
            negative: config.negative_token.trim().to_lowercase(),
            allow_word_match: config.allow_word_match,
        }
    }

    pub fn is_affirmative(&self, raw: &str) -> bool {
        let answer = normalize(raw);
        if answer == self.affirmative {
            return true;
        }
        if !self.allow_word_match || answer == self.negative {
            return false;
        }

        let words: Vec<&str> = RE_WORD.find_iter(&answer).map(|m| m.as_str()).collect();
        words.contains(&self.affirmative.as_str()) && !words.contains(&self.negative.as_str())
    }
}

/// Drops reasoning blocks, surrounding quotes and trailing punctuation, then
/// case-folds.
fn normalize(raw: &str) -> String {
    let without_thinking = RE_THINK_BLOCK.replace_all(raw, "");
    without_thinking
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '“' | '”'))
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
        .trim()
        .to_lowercase()
}

/// Result of evaluating one candidate against the catalog.
#[derive(Debug, Default)]
pub struct Classification {
    /// First category whose verdict was affirmative.
    pub matched: Option<(Category, Verdict)>,
    /// Categories whose model call failed; treated as non-matches.
    pub errors: usize,
    /// Set when a stop was requested before every category was evaluated.
    pub interrupted: bool,
}

pub struct SimilarityClassifier {
    llm: Arc<dyn LanguageModel>,
    config: Arc<EngineConfig>,
    parser: VerdictParser,
}

impl SimilarityClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>, config: Arc<EngineConfig>) -> Self {
        let parser = VerdictParser::new(&config.verdict);
        Self {
            llm,
            config,
            parser,
        }
    }

    /// Compares `candidate` with one category's examples. A category
    /// without examples is a non-match and the model is not consulted.
    pub async fn evaluate(
        &self,
        candidate: &Candidate,
        category: &Category,
        examples: &[ExampleMessage],
    ) -> Result<Verdict, ClassificationError> {
        if examples.is_empty() {
            log::debug!("No examples for '{}'; skipping model call", category.name);
            return Ok(Verdict {
                candidate_id: candidate.id.clone(),
                category_id: category.id.clone(),
                matched: false,
                raw_response: String::new(),
            });
        }

        let prompt = self.config.prompt.render(&PromptFields {
            category_name: &category.name,
            examples,
            candidate: &candidate.fields,
            max_body_length: self.config.max_body_length,
        });
        log::debug!(
            "Prompting {} for '{}' / {} ({} chars)",
            self.config.model,
            category.name,
            candidate.id,
            prompt.chars().count()
        );

        let raw = self
            .config
            .retry
            .run("model call", || self.llm.generate(&prompt, &self.config.model))
            .await
            .map_err(|e| ClassificationError {
                candidate_id: candidate.id.clone(),
                category: category.name.clone(),
                attempts: e.attempts,
                source: e.error,
            })?;

        let matched = self.parser.is_affirmative(&raw);
        log::debug!("Model answered {:?} for {} (match: {})", raw.trim(), candidate.id, matched);
        Ok(Verdict {
            candidate_id: candidate.id.clone(),
            category_id: category.id.clone(),
            matched,
            raw_response: raw,
        })
    }

    /// Evaluates categories in catalog order and stops at the first match.
    pub async fn classify(
        &self,
        candidate: &Candidate,
        catalog: &Catalog,
        corpus: &Corpus,
        cancel: &CancellationFlag,
    ) -> Classification {
        let mut classification = Classification::default();

        for category in catalog.categories() {
            if cancel.is_cancelled() {
                classification.interrupted = true;
                break;
            }
            let span = info_span!("classify", category_id = %category.id, category = %category.name);
            match self
                .evaluate(candidate, category, corpus.examples_for(category))
                .instrument(span)
                .await
            {
                Ok(verdict) if verdict.matched => {
                    classification.matched = Some((category.clone(), verdict));
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("{}", e);
                    classification.errors += 1;
                }
            }
        }

        classification
    }
}
