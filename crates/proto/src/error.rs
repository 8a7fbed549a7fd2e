use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Tool registry construction error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// LLM provider errors. Any of these is fatal for the current turn.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Remote API failure.
    #[error("{0}")]
    Api(String),

    /// Provider throttled the request.
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Provider response schema/content was invalid.
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    /// The completion call did not return within the configured timeout.
    #[error("LLM call timed out after {0}s")]
    Timeout(u64),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Tool lookup and execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Requested tool is not registered.
    #[error("Tool not found: {0}")]
    UnknownTool(String),

    /// Tool body or a downstream service failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Tool exceeded allowed execution time.
    #[error("Timeout after {0}s")]
    Timeout(u64),

    /// Tool argument is invalid.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Filesystem IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tool registry construction errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two tools were registered under the same name.
    #[error("Duplicate tool name: {0}")]
    DuplicateToolName(String),
}

/// Model output parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The completion matched neither the action grammar nor the final-answer grammar.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// Short description of what was wrong.
        reason: String,
        /// The completion text exactly as received.
        raw: String,
    },
}

impl ParseError {
    /// Builds a malformed-response error carrying the raw completion.
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Returns the raw completion that failed to parse.
    pub fn raw(&self) -> &str {
        match self {
            Self::MalformedResponse { raw, .. } => raw,
        }
    }
}

/// Errors that escape a turn to the caller
#[derive(Debug, Error)]
pub enum AgentError {
    /// The language-model call itself failed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The turn was abandoned before it completed.
    #[error("Turn cancelled")]
    Cancelled,

    /// The background task running the turn panicked or was aborted.
    #[error("Turn task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_config_error_variant() {
        let err = ConfigError::MissingField("agent.api_key".to_string());
        assert!(err.to_string().contains("Missing required field"));
    }

    #[test]
    fn wraps_registry_error_into_top_level_error() {
        let err: Error = RegistryError::DuplicateToolName("respond_tool".to_string()).into();
        assert!(err.to_string().contains("Registry error"));
        assert!(err.to_string().contains("respond_tool"));
    }

    #[test]
    fn agent_error_wraps_llm_timeout() {
        let err = AgentError::from(LlmError::Timeout(60));
        assert!(err.to_string().contains("timed out after 60s"));
    }

    #[test]
    fn wraps_config_error_into_top_level_error() {
        let err: Error = ConfigError::MissingField("agent.model".to_string()).into();
        assert!(err.to_string().contains("Config error"));
    }

    #[test]
    fn malformed_response_keeps_raw_text_unchanged() {
        let raw = "  I think {maybe} the answer\n";
        let err = ParseError::malformed("no action or final answer found", raw);
        assert_eq!(err.raw(), raw);
        assert!(err.to_string().contains("no action or final answer found"));
    }
}
