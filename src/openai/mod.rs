pub mod fake;
pub mod real;

use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestMessage, CreateChatCompletionResponse, Model,
};
use async_trait::async_trait;

/// Sampling parameters passed alongside a chat completion request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 1000,
        }
    }
}

/// A record of one request made through the client
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model_name: String,
    pub messages: Vec<ChatCompletionRequestMessage>,
    pub params: CompletionParams,
}

/// A trait that abstracts OpenAI client functionality for testing
///
/// This trait provides a common interface for both real and fake OpenAI clients,
/// making it easy to swap between them for testing purposes.
///
/// Implementation notes:
/// - Uses `async-trait` to enable async methods in traits
/// - Uses the actual OpenAI API types from the async_openai crate
#[async_trait]
pub trait OpenAIClientTrait: Send + Sync {
    /// Creates a chat completion by sending messages to the language model
    ///
    /// # Arguments
    /// * `model` - The model identifier (e.g., "gpt-4o-mini", "gpt-3.5-turbo")
    /// * `messages` - A sequence of messages using OpenAI types
    /// * `params` - Temperature and output token limit
    ///
    /// # Returns
    /// The complete ChatCompletionResponse from the model, or an error
    async fn chat_completion(
        &self,
        model: String,
        messages: Vec<ChatCompletionRequestMessage>,
        params: CompletionParams,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error>;

    /// Retrieves a list of available models
    async fn list_models(&self) -> Result<Vec<Model>, anyhow::Error>;
}
