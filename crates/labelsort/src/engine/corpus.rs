//! Loads example messages for every category.

use std::collections::HashMap;
use std::sync::Arc;

use crate::gmail::{MailService, MessageQuery};

use super::catalog::Catalog;
use super::config::EngineConfig;
use super::error::CorpusFetchError;
use super::model::{Category, ExampleMessage};
use super::scanner::collect_refs;

/// Example messages keyed by category id. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    examples: HashMap<String, Vec<ExampleMessage>>,
}

impl Corpus {
    pub fn new(examples: HashMap<String, Vec<ExampleMessage>>) -> Self {
        Self { examples }
    }

    /// Examples of `category`, at most its example limit; empty when none
    /// could be loaded.
    pub fn examples_for(&self, category: &Category) -> &[ExampleMessage] {
        self.examples
            .get(&category.id)
            .map(|examples| &examples[..examples.len().min(category.example_limit)])
            .unwrap_or(&[])
    }

    pub fn total_examples(&self) -> usize {
        self.examples.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub corpus: Corpus,
    /// Listing and fetch failures; affected categories keep fewer examples.
    pub errors: usize,
}

pub struct CorpusLoader {
    mail: Arc<dyn MailService>,
    config: Arc<EngineConfig>,
}

impl CorpusLoader {
    pub fn new(mail: Arc<dyn MailService>, config: Arc<EngineConfig>) -> Self {
        Self { mail, config }
    }

    pub async fn load(&self, catalog: &Catalog) -> CorpusLoad {
        let mut examples = HashMap::with_capacity(catalog.categories().len());
        let mut errors = 0;

        for category in catalog.categories() {
            let (loaded, failures) = self.load_category(category).await;
            errors += failures.len();
            for failure in failures {
                log::error!("{}", failure);
            }
            if loaded.is_empty() {
                log::warn!(
                    "Category '{}' has no usable examples; it will not match anything this run",
                    category.name
                );
            } else {
                log::info!("Loaded {} example(s) for '{}'", loaded.len(), category.name);
            }
            examples.insert(category.id.clone(), loaded);
        }

        CorpusLoad {
            corpus: Corpus::new(examples),
            errors,
        }
    }

    async fn load_category(
        &self,
        category: &Category,
    ) -> (Vec<ExampleMessage>, Vec<CorpusFetchError>) {
        let mut failures = Vec::new();
        if category.example_limit == 0 {
            return (Vec::new(), failures);
        }

        let query = MessageQuery::for_label(category.id.clone(), category.example_limit);
        let refs = match collect_refs(
            self.mail.as_ref(),
            &self.config.retry,
            query,
            category.example_limit,
        )
        .await
        {
            Ok(refs) => refs,
            Err(e) => {
                failures.push(CorpusFetchError::List {
                    category: category.name.clone(),
                    source: e.error,
                });
                return (Vec::new(), failures);
            }
        };

        let mut loaded = Vec::with_capacity(refs.len());
        for message_ref in refs {
            let fetched = self
                .config
                .retry
                .run("fetch example", || self.mail.get_message(&message_ref.id))
                .await;
            match fetched {
                Ok(message) => {
                    let example = ExampleMessage::from_fetched(&message, self.config.max_body_length);
                    if example.fields.is_empty() {
                        log::warn!(
                            "Example {} in '{}' ({}) has no content",
                            example.id,
                            category.name,
                            example.fields.received
                        );
                    } else {
                        loaded.push(example);
                    }
                }
                Err(e) => failures.push(CorpusFetchError::Fetch {
                    category: category.name.clone(),
                    message_id: message_ref.id.clone(),
                    source: e.error,
                }),
            }
        }

        (loaded, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::Label;
    use crate::test_utils::{engine_config, FakeMailbox};

    fn catalog(fake: &FakeMailbox, config: &EngineConfig) -> Catalog {
        fake.add_label("INBOX", "INBOX");
        fake.add_label("L1", "AI_AUTO_Receipts");
        fake.add_label("L2", "AI_AUTO_Travel");
        Catalog::from_labels(
            &[
                Label::new("INBOX", "INBOX"),
                Label::new("L1", "AI_AUTO_Receipts"),
                Label::new("L2", "AI_AUTO_Travel"),
            ],
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_respects_limit_and_skips_empty() {
        let mut cfg = engine_config();
        cfg.max_examples = 2;
        let cfg = Arc::new(cfg);
        let fake = Arc::new(FakeMailbox::new());
        let catalog = catalog(&fake, &cfg);
        fake.add_text_message("e0", &["L1"], "shop", "", "");
        fake.add_text_message("e1", &["L1"], "shop", "Receipt #1", "Thanks");
        fake.add_text_message("e2", &["L1"], "shop", "Receipt #2", "Thanks");

        let load = CorpusLoader::new(fake.clone(), cfg).load(&catalog).await;
        let receipts = &catalog.categories()[0];
        let travel = &catalog.categories()[1];

        let ids: Vec<_> = load
            .corpus
            .examples_for(receipts)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["e1"]);
        assert!(load.corpus.examples_for(travel).is_empty());
        assert_eq!(load.errors, 0);
    }

    #[tokio::test]
    async fn test_fetch_failures_are_counted() {
        let fake = Arc::new(FakeMailbox::new());
        let catalog = catalog(&fake, &engine_config());
        fake.add_text_message("e1", &["L1"], "shop", "Receipt", "Thanks");
        fake.fail_get("e1");

        let load = CorpusLoader::new(fake.clone(), Arc::new(engine_config()))
            .load(&catalog)
            .await;
        assert_eq!(load.errors, 1);
        assert_eq!(load.corpus.total_examples(), 0);
    }
}
