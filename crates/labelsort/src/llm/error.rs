use thiserror::Error;

/// Errors that can occur while querying a language model.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Could not reach the model server: {0}")]
    Connection(String),

    #[error("Model request timed out: {0}")]
    Timeout(String),

    #[error("Model '{0}' not found on the server")]
    ModelNotFound(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Connection(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => *status >= 500 || *status == 429,
            LlmError::ModelNotFound(_) | LlmError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout("t".into()).is_transient());
        assert!(LlmError::Connection("refused".into()).is_transient());
        assert!(LlmError::Api { status: 500, message: String::new() }.is_transient());
        assert!(!LlmError::ModelNotFound("qwen:14b".into()).is_transient());
        assert!(!LlmError::InvalidResponse("{}".into()).is_transient());
    }
}
