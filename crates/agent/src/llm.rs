//! LLM provider abstraction and OpenAI-compatible implementation.

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, Stop,
    },
};
use async_trait::async_trait;
use proto::LlmError;
use tracing::debug;

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Completions are cut before the model starts inventing its own observation.
pub const OBSERVATION_STOP: &str = "\nObservation:";

/// LLM provider trait
///
/// One prompt in, one completion out. Any error is fatal for the turn that
/// issued the call.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends `prompt` to the model and returns the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// OpenAI-compatible provider (works with OpenAI, Azure-style proxies, Ollama, etc.)
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    /// Creates an OpenAI provider using the default API base URL.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self::from_config(config, model)
    }

    /// Creates an OpenAI provider with a custom API base URL.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self::from_config(config, model)
    }

    fn from_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: 0.0,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![user_message(prompt)?])
            .temperature(self.temperature)
            .stop(Stop::StringArray(vec![OBSERVATION_STOP.to_string()]))
            .build()
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Sending completion request to OpenAI"
        );

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI usage"
            );
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".into()))?;
        choice
            .message
            .content
            .ok_or_else(|| LlmError::InvalidResponse("Completion has no text content".into()))
    }
}

fn user_message(prompt: &str) -> Result<ChatCompletionRequestMessage, LlmError> {
    Ok(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| LlmError::Serialization(e.to_string()))?,
    ))
}

/// Maps client errors, adding a hint for the common account problems.
fn map_openai_error(err: OpenAIError) -> LlmError {
    let msg = err.to_string();
    debug!(error = %msg, "OpenAI API error");
    let lower = msg.to_lowercase();
    if lower.contains("rate limit") {
        return LlmError::RateLimit;
    }
    let hint = if msg.contains("does not exist") || msg.contains("model_not_found") {
        " Check the model name in the [agent] section of your config."
    } else if lower.contains("billing") || lower.contains("quota") {
        " Check your OpenAI billing at https://platform.openai.com."
    } else if lower.contains("api key") {
        " Set MARIA_API_KEY or OPENAI_API_KEY."
    } else {
        ""
    };
    LlmError::Api(format!("{msg}{hint}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_wraps_prompt() {
        let msg = user_message("hello").expect("user message");
        assert!(matches!(msg, ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn provider_builders_keep_model() {
        let provider = OpenAiProvider::new("k", DEFAULT_MODEL);
        assert_eq!(provider.model(), "gpt-3.5-turbo");
        let provider = OpenAiProvider::with_base_url("k", "https://example.com/v1", "m");
        assert_eq!(provider.model(), "m");
    }

    #[test]
    fn map_openai_error_adds_hints() {
        let err = map_openai_error(OpenAIError::InvalidArgument(
            "The model `gpt-9` does not exist".to_string(),
        ));
        assert!(err.to_string().contains("Check the model name"));

        let err = map_openai_error(OpenAIError::InvalidArgument(
            "You exceeded your current quota".to_string(),
        ));
        assert!(err.to_string().contains("billing"));

        let err = map_openai_error(OpenAIError::InvalidArgument("Rate limit reached".to_string()));
        assert!(matches!(err, LlmError::RateLimit));
    }
}
