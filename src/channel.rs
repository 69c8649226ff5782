//! Recent uploads for a channel.
//!
//! SearchAPI is asked first when a key is configured and the channel id is
//! known, then the channel's `/videos` page is scraped. When both come back
//! empty a fixed sample list is returned so the UI always has something to
//! show.

use crate::searchapi::{SearchApiClient, SearchApiQuery};
use crate::video_id::{default_thumbnail, watch_url, VIDEO_ID_LEN};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{info, instrument, warn};
use url::Url;

pub const DEFAULT_CHANNEL_LIMIT: usize = 6;
pub const MAX_CHANNEL_LIMIT: usize = 50;

// How far past a videoId marker to look for its title
const TITLE_WINDOW: usize = 4000;

const SAMPLE_VIDEOS: &[(&str, &str)] = &[
    (
        "dQw4w9WgXcQ",
        "Rick Astley - Never Gonna Give You Up (Official Music Video)",
    ),
    ("jNQXAC9IVRw", "Me at the zoo"),
    ("9bZkp7q19f0", "PSY - GANGNAM STYLE (강남스타일) M/V"),
    ("kJQP7kiw5Fk", "Luis Fonsi - Despacito ft. Daddy Yankee"),
    ("OPf0YbXqDm0", "Mark Ronson - Uptown Funk (Official Video) ft. Bruno Mars"),
    ("fJ9rUzIMcZQ", "Queen - Bohemian Rhapsody (Official Video Remastered)"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
}

impl ChannelVideo {
    fn new(video_id: &str, title: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: title.to_string(),
            url: watch_url(video_id),
            thumbnail_url: default_thumbnail(video_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSource {
    Api,
    Scrape,
    Sample,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVideos {
    pub channel: String,
    pub source: ChannelSource,
    pub videos: Vec<ChannelVideo>,
}

/// A channel as YouTube addresses it in URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Handle(String),
    Id(String),
}

impl ChannelRef {
    /// Accepts `@handle`, a bare handle, a `UC…` channel id, or a channel
    /// URL containing either.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let segment = if input.contains("youtube.com") {
            let with_scheme = if input.contains("://") {
                input.to_string()
            } else {
                format!("https://{}", input)
            };
            let url = Url::parse(&with_scheme).ok()?;
            let mut parts = url
                .path_segments()?
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            let first = parts.next()?;
            match first.as_str() {
                "channel" => return Some(Self::Id(parts.next()?)),
                "c" | "user" => parts.next()?,
                handle => handle.to_string(),
            }
        } else {
            input.trim_end_matches('/').to_string()
        };

        let last = segment.as_str();
        if last.is_empty() {
            return None;
        }
        if is_channel_id(last) {
            return Some(Self::Id(last.to_string()));
        }
        let handle = last.trim_start_matches('@');
        let valid = !handle.is_empty()
            && handle
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
        valid.then(|| Self::Handle(handle.to_string()))
    }

    fn videos_path(&self) -> String {
        match self {
            Self::Handle(handle) => format!("@{}/videos", handle),
            Self::Id(id) => format!("channel/{}/videos", id),
        }
    }
}

fn is_channel_id(s: &str) -> bool {
    s.len() == 24
        && s.starts_with("UC")
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[derive(Clone)]
pub struct ChannelClient {
    http: reqwest::Client,
    searchapi: SearchApiClient,
    youtube_base: String,
}

impl ChannelClient {
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

    /// Never fails; unparseable channels go straight to the sample list.
    #[instrument(skip(self))]
    pub async fn recent_videos(&self, channel: &str, limit: usize) -> ChannelVideos {
        let limit = limit.clamp(1, MAX_CHANNEL_LIMIT);
        let parsed = ChannelRef::parse(channel);
        if parsed.is_none() {
            warn!("Unrecognised channel {:?}", channel);
        }

        if let Some(ChannelRef::Id(id)) = &parsed {
            if self.searchapi.is_configured() {
                match self.from_searchapi(id).await {
                    Ok(videos) if !videos.is_empty() => {
                        return Self::listing(channel, ChannelSource::Api, videos, limit);
                    }
                    Ok(_) => info!("SearchAPI returned no videos for {}", id),
                    Err(e) => warn!("SearchAPI channel lookup failed: {:#}", e),
                }
            }
        }

        if let Some(channel_ref) = &parsed {
            match self.from_channel_page(channel_ref).await {
                Ok(videos) if !videos.is_empty() => {
                    return Self::listing(channel, ChannelSource::Scrape, videos, limit);
                }
                Ok(_) => info!("No videos found on page for {:?}", channel_ref),
                Err(e) => warn!("Channel page scrape failed: {:#}", e),
            }
        }

        let samples = SAMPLE_VIDEOS
            .iter()
            .map(|(id, title)| ChannelVideo::new(id, title))
            .collect();
        Self::listing(channel, ChannelSource::Sample, samples, limit)
    }

    fn listing(
        channel: &str,
        source: ChannelSource,
        mut videos: Vec<ChannelVideo>,
        limit: usize,
    ) -> ChannelVideos {
        videos.truncate(limit);
        info!("{} videos for {} from {:?}", videos.len(), channel, source);
        ChannelVideos {
            channel: channel.trim().to_string(),
            source,
            videos,
        }
    }

    async fn from_searchapi(&self, channel_id: &str) -> Result<Vec<ChannelVideo>> {
        let payload = self
            .searchapi
            .get_json(
                "search",
                SearchApiQuery {
                    engine: Some("youtube_channel_videos"),
                    channel_id: Some(channel_id),
                    ..Default::default()
                },
            )
            .await?;
        Ok(parse_searchapi_videos(&payload))
    }

    async fn from_channel_page(
        &self,
        channel: &ChannelRef,
    ) -> Result<Vec<ChannelVideo>> {
        let url = format!("{}/{}", self.youtube_base, channel.videos_path());
        let html = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .context("channel page request")?
            .error_for_status()
            .context("channel page status")?
            .text()
            .await
            .context("channel page body")?;
        Ok(parse_channel_page(&html))
    }
}

pub(crate) fn parse_searchapi_videos(payload: &Value) -> Vec<ChannelVideo> {
    let Some(items) = payload.get("videos").and_then(Value::as_array) else {
        return vec![];
    };
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| {
            let id = item
                .get("id")
                .or_else(|| item.get("video_id"))
                .and_then(Value::as_str)?;
            let title = item.get("title").and_then(Value::as_str)?.trim();
            if id.len() != VIDEO_ID_LEN || title.is_empty() {
                return None;
            }
            let mut video = ChannelVideo::new(id, title);
            if let Some(thumb) = item
                .pointer("/thumbnail/static")
                .or_else(|| item.get("thumbnail"))
                .and_then(Value::as_str)
            {
                video.thumbnail_url = thumb.to_string();
            }
            Some(video)
        })
        .filter(|video| seen.insert(video.video_id.clone()))
        .collect()
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""videoId"\s*:\s*"([0-9A-Za-z_-]{11})""#)
            .expect("video id pattern is valid")
    })
}

fn title_runs_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#""title"\s*:\s*\{\s*"runs"\s*:\s*\[\s*\{\s*"text"\s*:\s*"((?:[^"\\]|\\.)*)""#,
        )
        .expect("title runs pattern is valid")
    })
}

/// Pull `(videoId, title)` pairs out of the `ytInitialData` blob embedded in
/// a channel's videos tab. Each id keeps the first title that follows it.
pub(crate) fn parse_channel_page(html: &str) -> Vec<ChannelVideo> {
    let markers: Vec<(usize, usize, &str)> = video_id_regex()
        .captures_iter(html)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some((whole.start(), whole.end(), c.get(1)?.as_str()))
        })
        .collect();

    let mut seen = HashSet::new();
    let mut videos = Vec::new();
    for (i, (_, end, id)) in markers.iter().enumerate() {
        if seen.contains(id) {
            continue;
        }
        let mut stop = (*end + TITLE_WINDOW).min(html.len());
        if let Some((next_start, _, _)) = markers.get(i + 1) {
            stop = stop.min(*next_start);
        }
        while !html.is_char_boundary(stop) {
            stop -= 1;
        }
        let Some(window) = html.get(*end..stop) else {
            continue;
        };
        let Some(raw) = title_runs_regex()
            .captures(window)
            .and_then(|c| c.get(1))
        else {
            continue;
        };
        let title = serde_json::from_str::<String>(&format!("\"{}\"", raw.as_str()))
            .unwrap_or_else(|_| raw.as_str().to_string());
        let title = title.trim();
        if title.is_empty() {
            continue;
        }
        seen.insert(*id);
        videos.push(ChannelVideo::new(id, title));
    }
    videos
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_channel_inputs() {
        assert_eq!(
            ChannelRef::parse("@veritasium"),
            Some(ChannelRef::Handle("veritasium".to_string()))
        );
        assert_eq!(
            ChannelRef::parse("veritasium"),
            Some(ChannelRef::Handle("veritasium".to_string()))
        );
        assert_eq!(
            ChannelRef::parse("https://www.youtube.com/@veritasium/videos"),
            Some(ChannelRef::Handle("veritasium".to_string()))
        );
        assert_eq!(
            ChannelRef::parse("UCHnyfMqiRRG1u-2MsSQLbXA"),
            Some(ChannelRef::Id("UCHnyfMqiRRG1u-2MsSQLbXA".to_string()))
        );
        assert_eq!(
            ChannelRef::parse(
                "https://www.youtube.com/channel/UCHnyfMqiRRG1u-2MsSQLbXA"
            ),
            Some(ChannelRef::Id("UCHnyfMqiRRG1u-2MsSQLbXA".to_string()))
        );
        assert_eq!(ChannelRef::parse("   "), None);
        assert_eq!(ChannelRef::parse("not a channel!"), None);
    }

    #[test]
    fn builds_videos_paths() {
        assert_eq!(
            ChannelRef::Handle("ted".to_string()).videos_path(),
            "@ted/videos"
        );
        assert_eq!(
            ChannelRef::Id("UCAuUUnT6oDeKwE6v1NGQxug".to_string()).videos_path(),
            "channel/UCAuUUnT6oDeKwE6v1NGQxug/videos"
        );
    }

    #[test]
    fn scrapes_video_renderers() {
        let html = r#"<script>var ytInitialData = {"contents":[
{"richItemRenderer":{"content":{"videoRenderer":{"videoId":"aaaaaaaaaaa","thumbnail":{},"title":{"runs":[{"text":"First & best"}]}}}}},
{"richItemRenderer":{"content":{"videoRenderer":{"videoId":"bbbbbbbbbbb","title":{"runs":[{"text":"Second"}]}}}}},
{"navigationEndpoint":{"watchEndpoint":{"videoId":"aaaaaaaaaaa"}}},
{"richItemRenderer":{"content":{"videoRenderer":{"videoId":"ccccccccccc","title":{"simpleText":"no runs"}}}}}
]};</script>"#;

        let videos = parse_channel_page(html);
        let pairs: Vec<(&str, &str)> = videos
            .iter()
            .map(|v| (v.video_id.as_str(), v.title.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("aaaaaaaaaaa", "First & best"), ("bbbbbbbbbbb", "Second")]
        );
        assert_eq!(videos[1].url, "https://www.youtube.com/watch?v=bbbbbbbbbbb");
    }

    #[test]
    fn reads_searchapi_channel_payload() {
        let payload = json!({
            "videos": [
                {"id": "aaaaaaaaaaa", "title": "One", "thumbnail": {"static": "https://t/1.jpg"}},
                {"id": "aaaaaaaaaaa", "title": "Duplicate"},
                {"id": "short", "title": "Bad id"},
                {"id": "bbbbbbbbbbb", "title": "Two"}
            ]
        });
        let videos = parse_searchapi_videos(&payload);
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].thumbnail_url, "https://t/1.jpg");
        assert_eq!(
            videos[1].thumbnail_url,
            "https://i.ytimg.com/vi/bbbbbbbbbbb/hqdefault.jpg"
        );
        assert!(parse_searchapi_videos(&json!({"error": "x"})).is_empty());
    }

    #[tokio::test]
    async fn unreachable_sources_fall_back_to_samples() {
        let http = reqwest::Client::new();
        let searchapi =
            SearchApiClient::new(http.clone(), None, "http://127.0.0.1:9");
        let client = ChannelClient::new(http, searchapi, "http://127.0.0.1:9");

        let listing = client.recent_videos("@nobody", 3).await;
        assert_eq!(listing.source, ChannelSource::Sample);
        assert_eq!(listing.videos.len(), 3);
        assert_eq!(listing.channel, "@nobody");

        let listing = client.recent_videos("@nobody", 500).await;
        assert_eq!(listing.videos.len(), SAMPLE_VIDEOS.len());
    }
}
