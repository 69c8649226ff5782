use crate::searchapi::{SearchApiClient, SearchApiError, SearchApiQuery};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

const TRANSCRIPT_PATH: &str = "youtube-transcript";
const TRANSCRIPT_LANGUAGE: &str = "en";

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Transcript service is not configured (missing SEARCHAPI_KEY)")]
    NotConfigured,
    #[error("Failed to get transcript: {body}")]
    Upstream { status: u16, body: String },
    #[error("No transcript found for this video")]
    NoTranscript,
    #[error("Transcript request failed: {0}")]
    Unavailable(String),
}

impl From<SearchApiError> for TranscriptError {
    fn from(e: SearchApiError) -> Self {
        match e {
            SearchApiError::NotConfigured => TranscriptError::NotConfigured,
            SearchApiError::Status { status, body } => {
                TranscriptError::Upstream { status, body }
            }
            other => TranscriptError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptSegment {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptPayload {
    transcript: Option<Vec<TranscriptSegment>>,
}

/// Fetch the English transcript for `video_id` and flatten it into a single
/// space-separated string.
#[instrument(skip(client), err)]
pub async fn get_transcript(
    client: &SearchApiClient,
    video_id: &str,
) -> Result<String, TranscriptError> {
    let payload = client
        .get_json(
            TRANSCRIPT_PATH,
            SearchApiQuery {
                video_id: Some(video_id),
                language: Some(TRANSCRIPT_LANGUAGE),
                ..Default::default()
            },
        )
        .await?;

    let payload: TranscriptPayload = serde_json::from_value(payload)
        .map_err(|e| TranscriptError::Unavailable(e.to_string()))?;

    let Some(segments) = payload.transcript else {
        warn!("Response for {} has no transcript field", video_id);
        return Err(TranscriptError::NoTranscript);
    };

    let transcript = join_segments(
        segments.iter().filter_map(|segment| segment.text.as_deref()),
    );
    if transcript.is_empty() {
        return Err(TranscriptError::NoTranscript);
    }

    info!(
        "Fetched transcript for {}: {} segments, {} chars",
        video_id,
        segments.len(),
        transcript.len()
    );
    Ok(transcript)
}

fn join_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let joined = segments
        .map(decode_entities)
        .collect::<Vec<_>>()
        .join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Caption text arrives with a handful of HTML entities left encoded.
pub fn decode_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_and_collapses_whitespace() {
        let segments = ["  hello\nthere ", "", "general   kenobi"];
        assert_eq!(
            join_segments(segments.into_iter()),
            "hello there general kenobi"
        );
    }

    #[test]
    fn decodes_caption_entities() {
        assert_eq!(
            decode_entities("don&#39;t &quot;stop&quot; &amp;amp; go"),
            "don't \"stop\" &amp; go"
        );
    }

    #[test]
    fn maps_status_errors_to_upstream() {
        let err: TranscriptError = SearchApiError::Status {
            status: 429,
            body: "slow down".to_string(),
        }
        .into();
        match err {
            TranscriptError::Upstream { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
