//! Discovers category labels and the inbox label.

use std::collections::HashSet;
use std::sync::Arc;

use crate::gmail::{Label, MailService};

use super::config::EngineConfig;
use super::error::CatalogError;
use super::model::Category;

/// Categories of one run in evaluation order, plus the resolved inbox.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
    /// Every prefixed label, including a bare prefix that names no category.
    filed_labels: Vec<Label>,
    category_ids: HashSet<String>,
    inbox: Label,
}

impl Catalog {
    /// Builds a catalog from a label listing. Categories are ordered by full
    /// label name so the first-match priority is stable across runs.
    pub fn from_labels(labels: &[Label], config: &EngineConfig) -> Result<Self, CatalogError> {
        let inbox = labels
            .iter()
            .find(|l| l.name == config.inbox_label)
            .or_else(|| labels.iter().find(|l| l.id == config.inbox_label))
            .cloned()
            .ok_or_else(|| CatalogError::InboxNotFound(config.inbox_label.clone()))?;

        let mut filed_labels: Vec<Label> = labels
            .iter()
            .filter(|l| l.id != inbox.id && l.name.starts_with(&config.category_prefix))
            .cloned()
            .collect();
        filed_labels.sort_by(|a, b| a.name.cmp(&b.name));
        filed_labels.dedup_by(|a, b| a.id == b.id);

        // a label named exactly the prefix has no display name to compare against
        let categories: Vec<Category> = filed_labels
            .iter()
            .filter_map(|l| {
                let name = l.name.strip_prefix(&config.category_prefix)?;
                if name.is_empty() {
                    log::debug!("Label '{}' is excluded from scans but not evaluated", l.name);
                    return None;
                }
                Some(Category {
                    id: l.id.clone(),
                    label_name: l.name.clone(),
                    name: name.to_string(),
                    example_limit: config.example_limit(name, &l.name),
                })
            })
            .collect();

        let category_ids = filed_labels.iter().map(|l| l.id.clone()).collect();
        Ok(Self {
            categories,
            filed_labels,
            category_ids,
            inbox,
        })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn inbox(&self) -> &Label {
        &self.inbox
    }

    /// Whether `label_id` carries the category prefix.
    pub fn is_category_label(&self, label_id: &str) -> bool {
        self.category_ids.contains(label_id)
    }

    /// Whether any of `label_ids` is a category label.
    pub fn carries_category(&self, label_ids: &[String]) -> bool {
        label_ids.iter().any(|id| self.is_category_label(id))
    }

    /// Search expression excluding every prefixed label.
    pub fn exclusion_query(&self, base_query: &str) -> String {
        let mut terms: Vec<String> = Vec::with_capacity(self.filed_labels.len() + 1);
        if !base_query.trim().is_empty() {
            terms.push(base_query.trim().to_string());
        }
        terms.extend(
            self.filed_labels
                .iter()
                .map(|l| format!("-label:{}", search_label_name(&l.name))),
        );
        terms.join(" ")
    }
}

/// Gmail search addresses labels with spaces and slashes replaced by dashes.
fn search_label_name(label_name: &str) -> String {
    label_name
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '-' } else { c })
        .collect()
}

pub struct CatalogResolver {
    mail: Arc<dyn MailService>,
    config: Arc<EngineConfig>,
}

impl CatalogResolver {
    pub fn new(mail: Arc<dyn MailService>, config: Arc<EngineConfig>) -> Self {
        Self { mail, config }
    }

    pub async fn resolve(&self) -> Result<Catalog, CatalogError> {
        let labels = self
            .config
            .retry
            .run("list labels", || self.mail.list_labels())
            .await
            .map_err(|e| CatalogError::ListLabels {
                attempts: e.attempts,
                source: e.error,
            })?;

        let catalog = Catalog::from_labels(&labels, &self.config)?;
        if catalog.is_empty() {
            log::warn!(
                "No labels start with '{}'; create at least one category label and file a few examples in it",
                self.config.category_prefix
            );
        } else {
            log::info!(
                "Found {} categor{}: {}",
                catalog.categories.len(),
                if catalog.categories.len() == 1 { "y" } else { "ies" },
                catalog
                    .categories
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(catalog)
    }
}
