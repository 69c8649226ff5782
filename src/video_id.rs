use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const VIDEO_ID_LEN: usize = 11;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VideoIdError {
    #[error("Could not extract video ID from URL")]
    NoMatch,
}

// Most specific first. The final pattern is the catch-all: any `v=` or path
// segment followed by eleven id characters, taking the first eleven when the
// run is longer.
fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"youtu\.be/([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
            r"(?:embed|shorts|live|v)/([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
            r"watch\?(?:.*&)?v=([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)",
            r"(?:v=|/)([0-9A-Za-z_-]{11})",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("video id pattern is valid"))
        .collect()
    })
}

fn is_bare_id(input: &str) -> bool {
    input.len() == VIDEO_ID_LEN
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Extract the 11-character YouTube video id from a URL or a bare id.
pub fn extract_video_id(url: &str) -> Result<String, VideoIdError> {
    let url = url.trim();
    if is_bare_id(url) {
        return Ok(url.to_string());
    }

    patterns()
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(VideoIdError::NoMatch)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn default_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id)
}
