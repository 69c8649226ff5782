use anyhow::Result;
use async_openai::types::{
    ChatChoice, ChatCompletionRequestMessage, ChatCompletionResponseMessage,
    CompletionUsage, CreateChatCompletionResponse, FinishReason, Model, Role,
};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::openai::{CompletionParams, ModelRequest, OpenAIClientTrait};

enum Scripted {
    Content(Option<String>),
    Error(String),
}

/// A fake implementation of the OpenAI client for testing
///
/// This fake client allows tests to control exactly what responses are returned,
/// without making any real API calls. It provides a builder pattern for configuration
/// and tracks requests for verification in tests.
///
/// # Example
///
/// ```
/// use tubenotes::openai::{CompletionParams, OpenAIClientTrait};
/// use tubenotes::openai::fake::FakeOpenAIClient;
/// use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = FakeOpenAIClient::new()
///         .with_response("First response");
///
///     let user_msg = ChatCompletionRequestUserMessageArgs::default()
///         .content("Hello")
///         .build()?;
///     let messages = vec![ChatCompletionRequestMessage::User(user_msg)];
///
///     let response = client
///         .chat_completion("gpt-4".to_string(), messages, CompletionParams::default())
///         .await?;
///
///     let content = response.choices.first()
///         .and_then(|choice| choice.message.content.as_ref())
///         .map(String::from)
///         .unwrap_or_default();
///
///     assert_eq!(content, "First response");
///     Ok(())
/// }
/// ```
pub struct FakeOpenAIClient {
    responses: Mutex<Vec<Scripted>>,
    models: Vec<Model>,
    // Track requests for verification in tests
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl Default for FakeOpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOpenAIClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(vec![]),
            models: vec![],
            requests: Mutex::new(vec![]),
        }
    }

    /// Add a response to be returned by the fake client
    pub fn with_response(self, response: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Scripted::Content(Some(response.to_string())));
        self
    }

    /// Configure the client to return a response with None content
    pub fn with_none_content_response(self) -> Self {
        self.responses.lock().unwrap().push(Scripted::Content(None));
        self
    }

    /// Configure the next call to fail, as an unreachable API would
    pub fn with_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Scripted::Error(message.to_string()));
        self
    }

    /// Configure the models to be returned by the fake client
    pub fn with_models(mut self, models: Vec<Model>) -> Self {
        self.models = models;
        self
    }

    /// Helper method to create a simplified model from id and provider
    pub fn create_model(id: &str, provider: &str) -> Model {
        Model {
            id: id.to_string(),
            created: 0,
            object: "model".to_string(),
            owned_by: provider.to_string(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl OpenAIClientTrait for FakeOpenAIClient {
    #[allow(deprecated)]
    async fn chat_completion(
        &self,
        model: String,
        messages: Vec<ChatCompletionRequestMessage>,
        params: CompletionParams,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error> {
        // Store the request for later verification
        self.requests.lock().unwrap().push(ModelRequest {
            model_name: model.clone(),
            messages,
            params,
        });

        let scripted = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Scripted::Content(Some("Fake default response".to_string()))
            } else {
                responses.remove(0)
            }
        };

        let content_option = match scripted {
            Scripted::Content(content) => content,
            Scripted::Error(message) => return Err(anyhow::anyhow!(message)),
        };

        let message = ChatCompletionResponseMessage {
            role: Role::Assistant,
            content: content_option,
            #[allow(deprecated)]
            function_call: None,
            tool_calls: None,
            #[allow(deprecated)]
            refusal: None,
            audio: None,
        };

        let chat_choice = ChatChoice {
            index: 0,
            message,
            finish_reason: Some(FinishReason::Stop),
            logprobs: None,
        };

        let usage = CompletionUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            prompt_tokens_details: None,
            completion_tokens_details: None,
        };

        Ok(CreateChatCompletionResponse {
            id: "fake_id".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: model.clone(),
            system_fingerprint: Some("fake-fingerprint".to_string()),
            service_tier: None,
            choices: vec![chat_choice],
            usage: Some(usage),
        })
    }

    async fn list_models(&self) -> Result<Vec<Model>, anyhow::Error> {
        Ok(self.models.clone())
    }
}
