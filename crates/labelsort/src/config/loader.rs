use std::path::Path;

use crate::config::schema::Config;
use crate::engine::prompt::PromptTemplate;
use crate::error::ConfigError;
use crate::logging::parse_level;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// On-disk config syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&value)?;

    let config: Config = serde_json::from_value(value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.ai_folder_prefix.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "ai_folder_prefix must not be empty".to_string(),
        });
    }

    if config.inbox_label_name.starts_with(&config.ai_folder_prefix) {
        return Err(ConfigError::Validation {
            message: format!(
                "inbox_label_name '{}' must not carry the category prefix '{}'",
                config.inbox_label_name, config.ai_folder_prefix
            ),
        });
    }

    if parse_level(&config.log_level).is_none() {
        return Err(ConfigError::Validation {
            message: format!("Unknown log_level: {}", config.log_level),
        });
    }

    if config.retry.max_backoff_ms < config.retry.initial_backoff_ms {
        return Err(ConfigError::Validation {
            message: "retry.max_backoff_ms must be at least retry.initial_backoff_ms".to_string(),
        });
    }

    let affirmative = config.verdict.affirmative_token.trim().to_lowercase();
    let negative = config.verdict.negative_token.trim().to_lowercase();
    if affirmative.is_empty() || affirmative == negative {
        return Err(ConfigError::Validation {
            message: "verdict tokens must be non-empty and distinct".to_string(),
        });
    }

    PromptTemplate::parse(&config.prompt_template())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str("{}", ConfigFormat::Json).unwrap();
        assert_eq!(config.ollama_model, "qwen:14b");
        assert_eq!(config.max_emails_to_scan_inbox, 50);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "gmail_scopes": ["https://www.googleapis.com/auth/gmail.modify"],
            "ollama_host": "http://127.0.0.1:11434",
            "ollama_model": "llama3.2",
            "ollama_temperature": 0.0,
            "ai_folder_prefix": "SORT/",
            "inbox_label_name": "INBOX",
            "max_emails_to_scan_inbox": 20,
            "max_examples_per_folder": 3,
            "example_limits": { "Receipts": 5 },
            "max_body_length_for_llm": 400,
            "log_level": "debug",
            "similarity_prompt_v3": [
                "Folder: {category_name}",
                "{example_emails_formatted_text}",
                "New: {new_email_subject}",
                "Answer YES or NO."
            ],
            "retry": { "max_attempts": 5, "initial_backoff_ms": 10, "max_backoff_ms": 100 }
        }
        "#;

        let config = load_config_from_str(config_json, ConfigFormat::Json).unwrap();
        assert_eq!(config.ai_folder_prefix, "SORT/");
        assert_eq!(config.max_examples_per_folder, 3);
        assert_eq!(config.example_limits.get("Receipts"), Some(&5));
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.prompt_template().starts_with("Folder: {category_name}\n"));
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml = "ollama_model: mistral\nmax_examples_per_folder: 2\n";
        let config = load_config_from_str(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.ollama_model, "mistral");
        assert_eq!(config.max_examples_per_folder, 2);
    }

    #[test]
    fn test_schema_rejects_zero_limits() {
        let result = load_config_from_str(r#"{ "max_emails_to_scan_inbox": 0 }"#, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let result = load_config_from_str(
            r#"{ "similarity_prompt_v3": "Is {new_email_colour} right?" }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::InvalidTemplate { .. })));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let result = load_config_from_str(r#"{ "log_level": "LOUD" }"#, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_identical_verdict_tokens_rejected() {
        let result = load_config_from_str(
            r#"{ "verdict": { "affirmative_token": "yes", "negative_token": "YES" } }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("c.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("c.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }
}
