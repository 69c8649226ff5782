use serde::Serialize;
use serde_json::Value;
use serde_with_macros::skip_serializing_none;
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_SEARCHAPI_BASE: &str = "https://www.searchapi.io/api/v1";

#[derive(Debug, Error)]
pub enum SearchApiError {
    #[error("SearchAPI key not configured")]
    NotConfigured,
    #[error("SearchAPI returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("SearchAPI request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("SearchAPI returned malformed JSON: {0}")]
    Decode(String),
}

// Query parameters understood by SearchAPI.io. Unset fields are left off the
// query string entirely.
#[skip_serializing_none]
#[derive(Debug, Default, Serialize)]
pub struct SearchApiQuery<'a> {
    pub engine: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub video_id: Option<&'a str>,
    pub channel_id: Option<&'a str>,
    pub language: Option<&'a str>,
}

#[derive(Clone)]
pub struct SearchApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl SearchApiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// GET `{base}/{path}` with the API key attached and decode the body as
    /// JSON. Non-2xx responses surface as `SearchApiError::Status`.
    #[instrument(skip(self, query), fields(engine = query.engine), err)]
    pub async fn get_json(
        &self,
        path: &str,
        mut query: SearchApiQuery<'_>,
    ) -> Result<Value, SearchApiError> {
        let api_key =
            self.api_key.as_deref().ok_or(SearchApiError::NotConfigured)?;
        query.api_key = Some(api_key);

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("Requesting {}", url);

        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SearchApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| SearchApiError::Decode(e.to_string()))
    }
}
