use crate::openai::{CompletionParams, OpenAIClientTrait};
use anyhow::Result;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse, Model,
};
use async_openai::Client;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

// A real implementation of the OpenAI client
pub struct RealOpenAIClient {
    client: Client<OpenAIConfig>,
}

impl RealOpenAIClient {
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }
}

/// Build a client when an API key is available. A custom base URL allows
/// pointing at any OpenAI-compatible endpoint.
pub fn maybe_create_openai_client(
    api_key: Option<String>,
    api_base: Option<String>,
) -> Result<Arc<dyn OpenAIClientTrait>> {
    let api_key = api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("OpenAI API key not configured"))?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base.filter(|b| !b.trim().is_empty()) {
        info!("Using OpenAI API base {}", base);
        config = config.with_api_base(base);
    }

    Ok(Arc::new(RealOpenAIClient::new(Client::with_config(config))))
}

#[async_trait]
impl OpenAIClientTrait for RealOpenAIClient {
    #[allow(deprecated)]
    async fn chat_completion(
        &self,
        model: String,
        messages: Vec<ChatCompletionRequestMessage>,
        params: CompletionParams,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error> {
        // Create the OpenAI request
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await?;

        Ok(response)
    }

    async fn list_models(&self) -> Result<Vec<Model>, anyhow::Error> {
        let response = self.client.models().list().await?;
        Ok(response.data)
    }
}
