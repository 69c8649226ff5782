//! Best-effort video metadata lookup.
//!
//! Three sources are consulted in order, each only filling the fields the
//! previous ones left empty:
//!
//! 1. SearchAPI's `youtube_video` engine (only when a key is configured)
//! 2. The public watch page, scraped for OpenGraph tags and the embedded
//!    player response
//! 3. YouTube's oEmbed endpoint
//!
//! Nothing here fails the surrounding request. Errors are logged and the
//! next source is tried.

use crate::searchapi::{SearchApiClient, SearchApiQuery};
use crate::video_id::{default_thumbnail, watch_url};
use anyhow::{Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_YOUTUBE_BASE: &str = "https://www.youtube.com";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub channel: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl VideoMetadata {
    pub fn is_complete(&self) -> bool {
        self.title.is_some()
            && self.channel.is_some()
            && self.thumbnail_url.is_some()
    }

    /// Fill any empty field from `other`; fields already set win.
    pub fn merge(&mut self, other: VideoMetadata) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.channel.is_none() {
            self.channel = other.channel;
        }
        if self.thumbnail_url.is_none() {
            self.thumbnail_url = other.thumbnail_url;
        }
    }
}

#[derive(Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    searchapi: SearchApiClient,
    youtube_base: String,
}

impl MetadataClient {
    pub fn new(
        http: reqwest::Client,
        searchapi: SearchApiClient,
        youtube_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            searchapi,
            youtube_base: youtube_base.into().trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, video_id: &str) -> VideoMetadata {
        let mut metadata = VideoMetadata::default();

        if self.searchapi.is_configured() {
            match self.from_searchapi(video_id).await {
                Ok(found) => metadata.merge(found),
                Err(e) => warn!("SearchAPI metadata lookup failed: {:#}", e),
            }
        }

        if !metadata.is_complete() {
            match self.from_watch_page(video_id).await {
                Ok(found) => metadata.merge(found),
                Err(e) => warn!("Watch page scrape failed: {:#}", e),
            }
        }

        if !metadata.is_complete() {
            match self.from_oembed(video_id).await {
                Ok(found) => metadata.merge(found),
                Err(e) => warn!("oEmbed lookup failed: {:#}", e),
            }
        }

        if metadata.thumbnail_url.is_none() {
            metadata.thumbnail_url = Some(default_thumbnail(video_id));
        }

        info!(
            "Metadata for {}: title={:?} channel={:?}",
            video_id, metadata.title, metadata.channel
        );
        metadata
    }

    async fn from_searchapi(&self, video_id: &str) -> Result<VideoMetadata> {
        let payload = self
            .searchapi
            .get_json(
                "search",
                SearchApiQuery {
                    engine: Some("youtube_video"),
                    video_id: Some(video_id),
                    ..Default::default()
                },
            )
            .await?;
        Ok(parse_searchapi_video(&payload))
    }

    async fn from_watch_page(&self, video_id: &str) -> Result<VideoMetadata> {
        let url = format!("{}/watch", self.youtube_base);
        let html = self
            .http
            .get(&url)
            .query(&[("v", video_id)])
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .context("watch page request")?
            .error_for_status()
            .context("watch page status")?
            .text()
            .await
            .context("watch page body")?;
        debug!("Fetched watch page: {} bytes", html.len());
        Ok(parse_watch_page(&html))
    }

    async fn from_oembed(&self, video_id: &str) -> Result<VideoMetadata> {
        let url = format!("{}/oembed", self.youtube_base);
        let oembed: OEmbed = self
            .http
            .get(&url)
            .query(&[
                ("url", watch_url(video_id).as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .context("oEmbed request")?
            .error_for_status()
            .context("oEmbed status")?
            .json()
            .await
            .context("oEmbed body")?;
        Ok(VideoMetadata {
            title: non_empty(oembed.title),
            channel: non_empty(oembed.author_name),
            thumbnail_url: non_empty(oembed.thumbnail_url),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: Option<String>,
    author_name: Option<String>,
    thumbnail_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn string_at(payload: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| payload.pointer(p))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_searchapi_video(payload: &Value) -> VideoMetadata {
    VideoMetadata {
        title: string_at(payload, &["/video/title", "/title"]),
        channel: string_at(
            payload,
            &[
                "/video/channel/title",
                "/video/channel/name",
                "/video/author",
                "/channel/title",
            ],
        ),
        thumbnail_url: string_at(
            payload,
            &[
                "/video/thumbnail",
                "/video/thumbnail/static",
                "/video/thumbnails/0/url",
            ],
        ),
    }
}

fn owner_channel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""ownerChannelName"\s*:\s*"((?:[^"\\]|\\.)+)""#)
            .expect("owner channel pattern is valid")
    })
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_watch_page(html: &str) -> VideoMetadata {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#)
        .or_else(|| meta_content(&document, r#"meta[name="title"]"#))
        .or_else(|| {
            let selector = Selector::parse("title").ok()?;
            let text: String =
                document.select(&selector).next()?.text().collect();
            let text = text.trim().trim_end_matches("- YouTube").trim();
            (!text.is_empty() && text != "YouTube").then(|| text.to_string())
        });

    let channel = meta_content(&document, r#"link[itemprop="name"]"#)
        .or_else(|| {
            owner_channel_regex()
                .captures(html)
                .and_then(|c| c.get(1))
                .and_then(|m| {
                    serde_json::from_str::<String>(&format!("\"{}\"", m.as_str()))
                        .ok()
                })
        });

    let thumbnail_url = meta_content(&document, r#"meta[property="og:image"]"#);

    VideoMetadata {
        title,
        channel: non_empty(channel),
        thumbnail_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WATCH_PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<title>Never Gonna Give You Up - YouTube</title>
<meta property="og:title" content="Rick Astley - Never Gonna Give You Up (Official Music Video)">
<meta property="og:image" content="https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg">
</head><body>
<span itemprop="author" itemscope itemtype="http://schema.org/Person">
<link itemprop="name" content="Rick Astley"></span>
</body></html>"#;

    #[test]
    fn scrapes_open_graph_and_author() {
        let metadata = parse_watch_page(WATCH_PAGE);
        assert_eq!(
            metadata.title.as_deref(),
            Some("Rick Astley - Never Gonna Give You Up (Official Music Video)")
        );
        assert_eq!(metadata.channel.as_deref(), Some("Rick Astley"));
        assert_eq!(
            metadata.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
        );
    }

    #[test]
    fn falls_back_to_title_tag_and_player_response() {
        let html = r#"<html><head><title>Brain Surgery - YouTube</title></head>
<body><script>var ytInitialPlayerResponse = {"videoDetails":{},"microformat":{"ownerChannelName":"Mitchell & Webb"}};</script></body></html>"#;
        let metadata = parse_watch_page(html);
        assert_eq!(metadata.title.as_deref(), Some("Brain Surgery"));
        assert_eq!(metadata.channel.as_deref(), Some("Mitchell & Webb"));
        assert_eq!(metadata.thumbnail_url, None);
    }

    #[test]
    fn consent_page_yields_nothing() {
        let html = "<html><head><title>YouTube</title></head><body></body></html>";
        assert_eq!(parse_watch_page(html), VideoMetadata::default());
    }

    #[test]
    fn reads_searchapi_video_payload() {
        let payload = json!({
            "video": {
                "title": "A talk",
                "channel": {"title": "TED"},
                "thumbnail": "https://example.com/t.jpg"
            }
        });
        let metadata = parse_searchapi_video(&payload);
        assert_eq!(metadata.title.as_deref(), Some("A talk"));
        assert_eq!(metadata.channel.as_deref(), Some("TED"));
        assert_eq!(
            metadata.thumbnail_url.as_deref(),
            Some("https://example.com/t.jpg")
        );
    }

    #[test]
    fn merge_keeps_existing_fields() {
        let mut metadata = VideoMetadata {
            title: Some("first".to_string()),
            ..Default::default()
        };
        metadata.merge(VideoMetadata {
            title: Some("second".to_string()),
            channel: Some("chan".to_string()),
            thumbnail_url: None,
        });
        assert_eq!(metadata.title.as_deref(), Some("first"));
        assert_eq!(metadata.channel.as_deref(), Some("chan"));
        assert!(!metadata.is_complete());
    }
}
