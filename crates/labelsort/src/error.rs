use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelsortError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] crate::gmail::AuthError),

    #[error("Mail service error: {0}")]
    Mail(#[from] crate::gmail::MailError),

    #[error("Language model error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Run aborted: {0}")]
    Engine(#[from] crate::engine::EngineError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid prompt template: {reason}")]
    InvalidTemplate { reason: String },
}

pub type Result<T> = std::result::Result<T, LabelsortError>;
