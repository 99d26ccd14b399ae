//! Example-guided classification and sync engine.
//!
//! One run resolves the category catalog, loads the example corpus, scans
//! the inbox for unfiled messages, asks the language model whether each
//! candidate resembles a category's examples (first match wins, in catalog
//! order) and moves matches into their category label.

pub mod cancel;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod error;
pub mod model;
pub mod mutator;
pub mod prompt;
pub mod retry;
pub mod runner;
pub mod scanner;
pub mod summary;

pub use cancel::CancellationFlag;
pub use catalog::{Catalog, CatalogResolver};
pub use classifier::{Classification, SimilarityClassifier, VerdictParser};
pub use config::EngineConfig;
pub use corpus::{Corpus, CorpusLoader};
pub use error::{
    CatalogError, ClassificationError, CorpusFetchError, EngineError, MutationError, ScanError,
};
pub use model::{Candidate, CandidateState, Category, ExampleMessage, MessageFields, Verdict};
pub use mutator::{LabelMutator, MoveOutcome};
pub use prompt::{Placeholder, PromptFields, PromptTemplate};
pub use retry::{Exhausted, RetryPolicy, Transient};
pub use runner::Engine;
pub use scanner::CandidateScanner;
pub use summary::RunSummary;
