use crate::fallback;
use crate::metadata::VideoMetadata;
use crate::openai::{CompletionParams, OpenAIClientTrait};
use crate::prompts::{render_user_prompt, SUMMARY_SYSTEM_PROMPT};
use crate::AppState;
use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use tracing::{info, instrument, warn};

// Roughly 16k tokens at four characters per token
pub const MAX_TRANSCRIPT_CHARS: usize = 16_000 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Llm,
    Fallback,
}

impl SummarySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarySource::Llm => "llm",
            SummarySource::Fallback => "fallback",
        }
    }

    /// Unknown values are treated as `Llm`, the column default.
    pub fn parse(value: &str) -> Self {
        match value {
            "fallback" => SummarySource::Fallback,
            _ => SummarySource::Llm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub source: SummarySource,
}

/// Cut `text` to at most `max_chars` characters without splitting one.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Summarize with the configured LLM, dropping to the extractive summarizer
/// when there is no client, the call fails, or the model returns nothing.
#[instrument(skip(state, transcript, metadata), fields(chars = transcript.len()))]
pub async fn summarize(
    state: &AppState,
    transcript: &str,
    metadata: &VideoMetadata,
) -> Summary {
    let llm_result = match &state.openai_client {
        Some(client) => {
            summarize_with_client(
                client.as_ref(),
                &state.summary_model,
                transcript,
                metadata,
            )
            .await
        }
        None => Err(anyhow::anyhow!("OpenAI client not configured")),
    };

    match llm_result {
        Ok(text) => {
            state.stats.llm_summaries.fetch_add(1, Ordering::Relaxed);
            Summary {
                text,
                source: SummarySource::Llm,
            }
        }
        Err(e) => {
            warn!("LLM summary unavailable, using fallback: {:#}", e);
            state.stats.fallback_summaries.fetch_add(1, Ordering::Relaxed);
            Summary {
                text: fallback::summarize(transcript, metadata.title.as_deref()),
                source: SummarySource::Fallback,
            }
        }
    }
}

pub async fn summarize_with_client(
    client: &dyn OpenAIClientTrait,
    model: &str,
    transcript: &str,
    metadata: &VideoMetadata,
) -> Result<String> {
    let truncated = truncate_chars(transcript, MAX_TRANSCRIPT_CHARS);
    if truncated.len() < transcript.len() {
        info!(
            "Truncated transcript from {} to {} bytes",
            transcript.len(),
            truncated.len()
        );
    }

    let system_message = ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SUMMARY_SYSTEM_PROMPT.trim())
            .build()
            .map_err(|e| {
                anyhow::anyhow!("Failed to build system message: {}", e)
            })?,
    );

    let user_message = ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(render_user_prompt(
                truncated,
                metadata.title.as_deref(),
                metadata.channel.as_deref(),
            ))
            .build()
            .map_err(|e| {
                anyhow::anyhow!("Failed to build user message: {}", e)
            })?,
    );

    info!("Requesting summary from {}", model);
    let response = client
        .chat_completion(
            model.to_string(),
            vec![system_message, user_message],
            CompletionParams::default(),
        )
        .await
        .map_err(|e| {
            anyhow::anyhow!("Failed to create chat completion: {}", e)
        })?;

    let summary = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Model returned an empty summary"))?;

    info!("Summary received: {} chars", summary.len());
    Ok(summary.to_string())
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
}

#[instrument(skip(state), err)]
pub async fn get_available_models(
    state: &AppState,
) -> Result<Vec<ModelInfo>, anyhow::Error> {
    let client = state
        .openai_client
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("OpenAI API key not configured"))?;

    info!("Fetching OpenAI models");
    let response = client.list_models().await.map_err(|e| {
        anyhow::anyhow!("Failed to fetch OpenAI models: {}", e)
    })?;

    let mut models: Vec<ModelInfo> = response
        .into_iter()
        .map(|model| ModelInfo {
            name: model.id.clone(),
            id: model.id,
            provider: model.owned_by,
        })
        .collect();

    // Sort models by provider and name
    models.sort_by(|a, b| {
        a.provider.cmp(&b.provider).then_with(|| a.name.cmp(&b.name))
    });

    Ok(models)
}
