pub mod config;
pub mod engine;
pub mod error;
pub mod gmail;
pub mod llm;
pub mod logging;
pub mod secrets;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{load_config, Config, ConfigFormat};
pub use engine::{CancellationFlag, Engine, EngineConfig, RunSummary};
pub use error::{ConfigError, LabelsortError, Result};
pub use gmail::{GmailClient, MailError, MailService};
pub use llm::{LanguageModel, LlmError, OllamaClient};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
